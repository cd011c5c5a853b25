// Copyright (c) 2025 - Cowboy AI, Inc.
//! Service registry keyed by configuration id
//!
//! Components never look each other up by type; they are handed a registry at
//! construction and resolve the configured id when they need the service.
//! A service registered later becomes visible to the next lookup.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

/// Registry of shared services of one kind
pub struct ServiceRegistry<S: ?Sized> {
    entries: RwLock<HashMap<String, Arc<S>>>,
}

impl<S: ?Sized> Default for ServiceRegistry<S> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<S: ?Sized> ServiceRegistry<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the service for `id`
    pub fn register(&self, id: impl Into<String>, service: Arc<S>) {
        let id = id.into();
        info!("Registering service with configuration id {}", id);
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(id, service);
    }

    /// Remove the service for `id`
    pub fn unregister(&self, id: &str) -> Option<Arc<S>> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(id)
    }

    /// Look up the service for `id`
    pub fn get(&self, id: &str) -> Option<Arc<S>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let service = entries.get(id).cloned();
        if service.is_none() {
            warn!("No service was found - configuration id: {}", id);
        }
        service
    }

    /// Registered configuration ids, sorted
    pub fn ids(&self) -> Vec<String> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut ids: Vec<String> = entries.keys().cloned().collect();
        ids.sort();
        ids
    }
}
