// Copyright (c) 2025 - Cowboy AI, Inc.
//! Invalidation Jobs
//!
//! A job is one unit of asynchronous work carrying a batch of changed paths.
//! Event sources create jobs through a [`JobManager`]; the job manager later
//! hands each job to an [`InvalidationJobConsumer`], which returns exactly one
//! [`JobOutcome`]:
//!
//! | Outcome  | Meaning                                  | Job manager reaction |
//! |----------|------------------------------------------|----------------------|
//! | `Ok`     | provider accepted the purge              | acknowledge          |
//! | `Failed` | transient or processing failure          | redeliver later      |
//! | `Cancel` | retrying cannot help (disabled, no input)| drop                 |

pub mod consumer;
pub mod router;

pub use consumer::{InvalidationJobConsumer, JobConsumerSettings};
pub use router::JobRouter;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::{InvalidatorError, InvalidatorResult};
use crate::paths::PathSet;

/// Job property carrying the paths to invalidate
pub const JOB_PROPERTY_PATHS: &str = "paths";

/// A batch of changed paths queued for invalidation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationJob {
    /// Unique job ID (UUID v7 for time-ordering)
    pub id: Uuid,

    /// Topic the job was queued on
    pub topic: String,

    /// Changed repository paths
    #[serde(rename = "paths", default)]
    pub paths: PathSet,

    /// When the job was created
    pub created_at: DateTime<Utc>,
}

impl InvalidationJob {
    /// Create a new job for `topic`
    pub fn new(topic: impl Into<String>, paths: PathSet) -> Self {
        Self {
            id: Uuid::now_v7(),
            topic: topic.into(),
            paths,
            created_at: Utc::now(),
        }
    }
}

impl fmt::Display for InvalidationJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {:?}", self.id, self.topic, self.paths)
    }
}

/// Terminal disposition of one job invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobOutcome {
    /// Provider accepted the purge
    Ok,
    /// Transient or processing failure, eligible for retry
    Failed,
    /// No retry warranted
    Cancel,
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobOutcome::Ok => write!(f, "OK"),
            JobOutcome::Failed => write!(f, "FAILED"),
            JobOutcome::Cancel => write!(f, "CANCEL"),
        }
    }
}

/// Which CDN operation and pipeline branch a consumer uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidationMode {
    /// Purge by CP code
    Code,
    /// Purge by cache tag
    Tag,
    /// Purge by public URL
    Urls,
}

impl InvalidationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvalidationMode::Code => "code",
            InvalidationMode::Tag => "tag",
            InvalidationMode::Urls => "urls",
        }
    }
}

impl fmt::Display for InvalidationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvalidationMode {
    type Err = InvalidatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "code" => Ok(InvalidationMode::Code),
            "tag" => Ok(InvalidationMode::Tag),
            "urls" => Ok(InvalidationMode::Urls),
            other => Err(InvalidatorError::Configuration(format!(
                "invalidation type is not allowed: {}",
                other
            ))),
        }
    }
}

/// External job manager that queues jobs on a topic
#[async_trait]
pub trait JobManager: Send + Sync {
    /// Queue a job carrying `paths`; the job is delivered back unchanged
    async fn add_job(&self, topic: &str, paths: PathSet) -> InvalidatorResult<InvalidationJob>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("code", InvalidationMode::Code)]
    #[test_case("tag", InvalidationMode::Tag)]
    #[test_case(" urls ", InvalidationMode::Urls)]
    fn test_mode_parsing(raw: &str, expected: InvalidationMode) {
        assert_eq!(raw.parse::<InvalidationMode>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_mode_is_configuration_error() {
        let err = "purge-all".parse::<InvalidationMode>().unwrap_err();
        assert!(matches!(err, InvalidatorError::Configuration(_)));
    }

    #[test]
    fn test_job_serializes_paths_property() {
        let paths: PathSet = ["/content/a".to_string()].into_iter().collect();
        let job = InvalidationJob::new("cdn/invalidation/editorial", paths.clone());

        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json[JOB_PROPERTY_PATHS], serde_json::json!(["/content/a"]));

        let back: InvalidationJob = serde_json::from_value(json).unwrap();
        assert_eq!(back.paths, paths);
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(JobOutcome::Ok.to_string(), "OK");
        assert_eq!(JobOutcome::Failed.to_string(), "FAILED");
        assert_eq!(JobOutcome::Cancel.to_string(), "CANCEL");
    }
}
