// Copyright (c) 2025 - Cowboy AI, Inc.
//! Derivation Dispatch
//!
//! Rule and URL derivation fan out over the rayon pool and may call slow
//! resolvers. [`DerivationDispatcher`] runs that work off the async runtime
//! and hands the result back through a oneshot channel, so one long
//! derivation never stalls other jobs or their in-flight purges.
//!
//! At most `max_in_flight` derivations occupy the pool; further callers wait
//! for a permit without blocking their runtime thread.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::{oneshot, OwnedSemaphorePermit, Semaphore};

use crate::errors::{InvalidatorError, InvalidatorResult};

/// Bounded bridge from async job processing to the rayon pool
#[derive(Debug, Clone)]
pub struct DerivationDispatcher {
    permits: Arc<Semaphore>,
}

impl Default for DerivationDispatcher {
    fn default() -> Self {
        Self::new(rayon::current_num_threads())
    }
}

impl DerivationDispatcher {
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_in_flight.clamp(1, Semaphore::MAX_PERMITS))),
        }
    }

    /// Run `work` on the rayon pool and await its result
    ///
    /// A panic inside `work` is contained on the pool and reported as a
    /// [`InvalidatorError::Derivation`] error.
    pub async fn spawn<F, R>(&self, work: F) -> InvalidatorResult<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let permit = self.acquire().await?;
        let (tx, rx) = oneshot::channel();

        rayon::spawn(move || {
            if let Ok(value) = catch_unwind(AssertUnwindSafe(work)) {
                let _ = tx.send(value);
            }
            drop(permit);
        });

        rx.await
            .map_err(|_| InvalidatorError::Derivation("derivation panicked".to_string()))
    }

    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    async fn acquire(&self) -> InvalidatorResult<OwnedSemaphorePermit> {
        self.permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| InvalidatorError::Derivation("dispatcher is closed".to_string()))
    }
}
