// Copyright (c) 2025 - Cowboy AI, Inc.
//! Event Sources
//!
//! Two independent producers turn repository activity into invalidation jobs:
//!
//! ```text
//! ResourceChange batch ──► ResourceChangeListener ──┐
//!                                                   ├─► JobOffloader ──► JobManager
//! ReplicationAction ─────► ReplicationEventListener ┘     (PathFilter)
//! ```
//!
//! Both are thin: they pick the paths they are configured for and hand them to
//! [`JobOffloader::process_event`], which filters and enqueues.

pub mod replication;
pub mod resource_change;

pub use replication::{ReplicationAction, ReplicationActionType, ReplicationEventListener};
pub use resource_change::{ChangeType, ResourceChange, ResourceChangeListener};

use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::jobs::JobManager;
use crate::paths::{PathFilter, PathSet};

/// Filters collected paths and queues a job for what remains
#[derive(Clone)]
pub struct JobOffloader {
    job_manager: Arc<dyn JobManager>,
}

impl JobOffloader {
    pub fn new(job_manager: Arc<dyn JobManager>) -> Self {
        Self { job_manager }
    }

    /// Returns true iff a job was created
    pub async fn process_event(&self, paths: &PathSet, filter: &PathFilter, job_topic: &str) -> bool {
        let resource_paths = filter.filter(paths);
        if resource_paths.is_empty() {
            warn!(
                "No resources to process for paths={:?} with filter regex={}",
                paths,
                filter.expression()
            );
            return false;
        }

        match self.job_manager.add_job(job_topic, resource_paths).await {
            Ok(job) => {
                debug!("Job {} created on topic {}", job.id, job_topic);
                true
            }
            Err(e) => {
                error!("Job could not be created: {}", e);
                false
            }
        }
    }
}

/// Whether `path` lies at or below `root`
pub(crate) fn is_under_root(path: &str, root: &str) -> bool {
    let root = root.trim().trim_end_matches('/');
    if root.is_empty() {
        return path.starts_with('/');
    }
    path == root
        || path
            .strip_prefix(root)
            .is_some_and(|rest| rest.starts_with('/'))
}
