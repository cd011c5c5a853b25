// Copyright (c) 2025 - Cowboy AI, Inc.
//! Topic routing across job consumers
//!
//! Several consumers may run side by side, each serving its own job topics
//! with its own rules and CDN client. A job goes to the consumer that lists
//! its topic; when more than one does, an enabled consumer wins over a
//! disabled one, then configuration order decides. A job no consumer serves
//! is cancelled.

use std::sync::Arc;
use tracing::warn;

use super::{InvalidationJob, InvalidationJobConsumer, JobOutcome};

#[derive(Default)]
pub struct JobRouter {
    consumers: Vec<Arc<InvalidationJobConsumer>>,
}

impl JobRouter {
    pub fn new(consumers: Vec<Arc<InvalidationJobConsumer>>) -> Self {
        Self { consumers }
    }

    pub fn consumers(&self) -> &[Arc<InvalidationJobConsumer>] {
        &self.consumers
    }

    /// Consumer serving `topic`, read from each consumer's current settings
    pub fn route(&self, topic: &str) -> Option<Arc<InvalidationJobConsumer>> {
        let serving: Vec<&Arc<InvalidationJobConsumer>> = self
            .consumers
            .iter()
            .filter(|consumer| consumer.settings().job_topics.iter().any(|t| t == topic))
            .collect();

        serving
            .iter()
            .find(|consumer| consumer.is_enabled())
            .or_else(|| serving.first())
            .map(|consumer| Arc::clone(*consumer))
    }

    /// Hand `job` to its consumer
    pub async fn process(&self, job: &InvalidationJob) -> JobOutcome {
        match self.route(&job.topic) {
            Some(consumer) => consumer.process(job).await,
            None => {
                warn!("Job {} has topic {} not served by any consumer", job.id, job.topic);
                JobOutcome::Cancel
            }
        }
    }
}
