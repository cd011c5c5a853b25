//! Rule-driven CDN cache invalidation
//!
//! Repository change events are filtered into path batches, queued as jobs,
//! turned into cache tags, CP codes or public URLs and purged through the
//! Akamai Fast Purge API.
//!
//! ```text
//! listeners ──► paths ──► jobs (JetStream) ──► pipeline (rules | links) ──► cdn
//! ```

pub mod cdn;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod jetstream;
pub mod jobs;
pub mod links;
pub mod listeners;
pub mod nats;
pub mod paths;
pub mod pipeline;
pub mod registry;
pub mod rules;
pub mod state_machine;
pub mod telemetry;

// Re-export commonly used types
pub use cdn::{AkamaiInvalidationService, CdnInvalidationService, CdnRegistry, PurgeKind};
pub use config::AppConfig;
pub use errors::{InvalidatorError, InvalidatorResult};
pub use jobs::{
    InvalidationJob, InvalidationJobConsumer, InvalidationMode, JobManager, JobOutcome, JobRouter,
};
pub use nats::{MessageHandler, NatsClient, NatsConfig};
pub use paths::{PathFilter, PathSet};
pub use pipeline::InvalidationPipeline;
pub use rules::{derive_values, RuleSet};
