// Copyright (c) 2025 - Cowboy AI, Inc.
//! Resource change event source

use async_trait::async_trait;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, RwLock};
use tracing::{debug, error, info};

use super::{is_under_root, JobOffloader};
use crate::config::ResourceChangeListenerConfig;
use crate::errors::{InvalidatorError, InvalidatorResult};
use crate::nats::MessageHandler;
use crate::paths::{PathFilter, PathSet};

/// Kind of repository change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeType {
    Added,
    Removed,
    Changed,
    ProviderAdded,
    ProviderRemoved,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Added => "ADDED",
            ChangeType::Removed => "REMOVED",
            ChangeType::Changed => "CHANGED",
            ChangeType::ProviderAdded => "PROVIDER_ADDED",
            ChangeType::ProviderRemoved => "PROVIDER_REMOVED",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeType {
    type Err = InvalidatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADDED" => Ok(ChangeType::Added),
            "REMOVED" => Ok(ChangeType::Removed),
            "CHANGED" => Ok(ChangeType::Changed),
            "PROVIDER_ADDED" => Ok(ChangeType::ProviderAdded),
            "PROVIDER_REMOVED" => Ok(ChangeType::ProviderRemoved),
            other => Err(InvalidatorError::Configuration(format!(
                "Unknown change type: {}",
                other
            ))),
        }
    }
}

/// One observed repository change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceChange {
    pub path: String,
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    /// Change originated on another cluster node
    #[serde(default)]
    pub external: bool,
}

impl ResourceChange {
    pub fn new(path: impl Into<String>, change_type: ChangeType) -> Self {
        Self {
            path: path.into(),
            change_type,
            external: false,
        }
    }
}

#[derive(Debug)]
struct ListenerState {
    enabled: bool,
    root_paths: Vec<String>,
    change_types: Vec<ChangeType>,
    job_topic: String,
    filter: PathFilter,
    subject: String,
}

impl ListenerState {
    fn disabled(subject: String) -> Self {
        Self {
            enabled: false,
            root_paths: Vec::new(),
            change_types: Vec::new(),
            job_topic: String::new(),
            filter: PathFilter::match_all(),
            subject,
        }
    }
}

/// Queues invalidation jobs for batches of resource changes
pub struct ResourceChangeListener {
    state: RwLock<Arc<ListenerState>>,
    offloader: JobOffloader,
}

impl ResourceChangeListener {
    pub fn new(offloader: JobOffloader) -> Self {
        Self {
            state: RwLock::new(Arc::new(ListenerState::disabled(String::new()))),
            offloader,
        }
    }

    /// Install configuration; an invalid filter leaves the listener disabled
    pub fn activate(&self, config: &ResourceChangeListenerConfig) -> InvalidatorResult<()> {
        let listener = &config.listener;
        let (state, result) = match PathFilter::new(&listener.filter_regex) {
            Ok(filter) => {
                info!(
                    "Activated - enabled: {}, root paths: {:?}, events: {:?}",
                    listener.enabled, listener.root_paths, config.change_types
                );
                let state = ListenerState {
                    enabled: listener.enabled,
                    root_paths: listener.root_paths.clone(),
                    change_types: config.change_types.clone(),
                    job_topic: listener.job_topic.clone(),
                    filter,
                    subject: listener.subject.clone(),
                };
                (state, Ok(()))
            }
            Err(e) => {
                error!("Resource change listener disabled: {}", e);
                (ListenerState::disabled(listener.subject.clone()), Err(e))
            }
        };
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(state);
        result
    }

    pub fn is_enabled(&self) -> bool {
        self.snapshot().enabled
    }

    fn snapshot(&self) -> Arc<ListenerState> {
        self.state.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Handle one batch; returns true iff a job was queued
    pub async fn on_change(&self, changes: &[ResourceChange]) -> bool {
        let state = self.snapshot();
        if !state.enabled {
            return false;
        }

        info!(
            "Received {} changes under root paths: {:?}",
            changes.len(),
            state.root_paths
        );
        let paths = collect_paths(&state, changes);
        let result = self
            .offloader
            .process_event(&paths, &state.filter, &state.job_topic)
            .await;
        info!("Result of processing: {}", result);
        result
    }

    /// Non-blank paths of subscribed change types below a root path
    pub fn change_paths(&self, changes: &[ResourceChange]) -> PathSet {
        collect_paths(&self.snapshot(), changes)
    }
}

fn collect_paths(state: &ListenerState, changes: &[ResourceChange]) -> PathSet {
    changes
        .par_iter()
        .filter(|change| state.change_types.contains(&change.change_type))
        .filter(|change| {
            state
                .root_paths
                .iter()
                .any(|root| is_under_root(&change.path, root))
        })
        .map(|change| {
            debug!(
                "Change type: {}, path: {}, isExternal: {}",
                change.change_type, change.path, change.external
            );
            change.path.trim().to_string()
        })
        .filter(|path| !path.is_empty())
        .collect()
}

#[async_trait]
impl MessageHandler for ResourceChangeListener {
    type Message = Vec<ResourceChange>;

    async fn handle(&self, message: Self::Message) -> InvalidatorResult<()> {
        self.on_change(&message).await;
        Ok(())
    }

    fn subject(&self) -> String {
        self.snapshot().subject.clone()
    }
}
