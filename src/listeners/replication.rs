// Copyright (c) 2025 - Cowboy AI, Inc.
//! Replication action event source

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tracing::{error, info};

use super::JobOffloader;
use crate::config::ListenerConfig;
use crate::errors::InvalidatorResult;
use crate::nats::MessageHandler;
use crate::paths::{PathFilter, PathSet};

/// Replication operation performed on a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReplicationActionType {
    Activate,
    Deactivate,
    Delete,
    Test,
    Reverse,
    InternalPoll,
}

/// A replication action as published by the repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationAction {
    #[serde(rename = "type")]
    pub action_type: ReplicationActionType,
    pub path: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default = "Utc::now")]
    pub time: DateTime<Utc>,
}

#[derive(Debug)]
struct ListenerState {
    enabled: bool,
    root_paths: Vec<String>,
    job_topic: String,
    filter: PathFilter,
    subject: String,
}

/// Queues an invalidation job per replicated path
pub struct ReplicationEventListener {
    state: RwLock<Arc<ListenerState>>,
    offloader: JobOffloader,
}

impl ReplicationEventListener {
    pub fn new(offloader: JobOffloader) -> Self {
        Self {
            state: RwLock::new(Arc::new(ListenerState {
                enabled: false,
                root_paths: Vec::new(),
                job_topic: String::new(),
                filter: PathFilter::match_all(),
                subject: String::new(),
            })),
            offloader,
        }
    }

    /// Install configuration; an invalid filter leaves the listener disabled
    pub fn activate(&self, config: &ListenerConfig) -> InvalidatorResult<()> {
        let filter = PathFilter::new(&config.filter_regex);
        let enabled = config.enabled && filter.is_ok();
        let state = ListenerState {
            enabled,
            root_paths: config.root_paths.clone(),
            job_topic: config.job_topic.clone(),
            filter: filter.as_ref().cloned().unwrap_or_else(|_| PathFilter::match_all()),
            subject: config.subject.clone(),
        };
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(state);

        match filter {
            Ok(_) => {
                info!(
                    "Activated - enabled: {}, root paths: {:?}, filterRegex: {}",
                    enabled, config.root_paths, config.filter_regex
                );
                Ok(())
            }
            Err(e) => {
                error!("Replication listener disabled: {}", e);
                Err(e)
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.snapshot().enabled
    }

    fn snapshot(&self) -> Arc<ListenerState> {
        self.state.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Handle one action; returns true iff a job was queued
    pub async fn handle_event(&self, action: &ReplicationAction) -> bool {
        if !self.is_enabled() {
            return false;
        }
        self.process_path(&action.path).await
    }

    /// Queue `path` when it contains one of the root paths
    pub async fn process_path(&self, path: &str) -> bool {
        let state = self.snapshot();
        let wanted = state
            .root_paths
            .iter()
            .any(|root| path.contains(root.as_str()));

        if !wanted {
            info!(
                "Processing skipped for path: {}, root folder: {:?}",
                path, state.root_paths
            );
            return false;
        }

        let paths = PathSet::from([path.to_string()]);
        let result = self
            .offloader
            .process_event(&paths, &state.filter, &state.job_topic)
            .await;
        info!("Result of processing: {}", result);
        result
    }
}

#[async_trait]
impl MessageHandler for ReplicationEventListener {
    type Message = ReplicationAction;

    async fn handle(&self, message: Self::Message) -> InvalidatorResult<()> {
        self.handle_event(&message).await;
        Ok(())
    }

    fn subject(&self) -> String {
        self.snapshot().subject.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_wire_format() {
        let action: ReplicationAction = serde_json::from_str(
            r#"{"type":"ACTIVATE","path":"/content/site/en","user_id":"admin","time":"2024-01-02T03:04:05Z"}"#,
        )
        .unwrap();

        assert_eq!(action.action_type, ReplicationActionType::Activate);
        assert_eq!(action.path, "/content/site/en");
        assert_eq!(action.user_id.as_deref(), Some("admin"));
    }

    #[test]
    fn test_time_defaults_to_now() {
        let action: ReplicationAction =
            serde_json::from_str(r#"{"type":"DEACTIVATE","path":"/content/a"}"#).unwrap();
        assert!(action.user_id.is_none());
        assert!(action.time <= Utc::now());
    }
}
