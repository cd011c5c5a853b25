// Copyright (c) 2025 - Cowboy AI, Inc.

//! JetStream job transport
//!
//! Invalidation jobs travel over a work-queue stream. Event sources publish
//! jobs through [`JetStreamJobManager`]; a [`JobWorker`] pulls them, hands
//! each to the consumer serving its topic via the [`JobRouter`] and settles
//! the message from the outcome:
//!
//! | Outcome  | Ack            | Effect                                    |
//! |----------|----------------|-------------------------------------------|
//! | `OK`     | `Ack`          | removed from the stream                   |
//! | `FAILED` | `Nak(delay)`   | redelivered after `retry_delay`, up to `max_deliver` |
//! | `CANCEL` | `Term`         | removed, never redelivered                |
//!
//! # Example
//!
//! ```rust,no_run
//! use cdn_invalidator::jetstream::{create_job_stream, JobStreamConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = async_nats::connect("nats://localhost:4222").await?;
//!     let jetstream = async_nats::jetstream::new(client);
//!
//!     let config = JobStreamConfig::default();
//!     let stream = create_job_stream(&jetstream, &config).await?;
//!
//!     Ok(())
//! }
//! ```

use async_nats::jetstream::{self, consumer::PullConsumer, stream::Stream, AckKind};
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::JobStreamSection;
use crate::errors::{InvalidatorError, InvalidatorResult};
use crate::jobs::{InvalidationJob, JobManager, JobOutcome, JobRouter};
use crate::paths::PathSet;

/// Work-queue stream and consumer settings
#[derive(Debug, Clone)]
pub struct JobStreamConfig {
    /// Stream name for invalidation jobs
    pub stream_name: String,

    /// Subject prefix; a job on topic `a/b` is published to `{prefix}.a.b`
    pub subject_prefix: String,

    /// Durable pull consumer name
    pub consumer_name: String,

    /// Maximum age of unprocessed jobs
    pub max_age: Duration,

    /// Deliveries before a repeatedly failing job is dropped
    pub max_deliver: i64,

    /// Delay before a FAILED job is redelivered
    pub retry_delay: Duration,

    /// Jobs processed concurrently by one worker
    pub concurrency: usize,
}

impl Default for JobStreamConfig {
    fn default() -> Self {
        Self::from(&JobStreamSection::default())
    }
}

impl From<&JobStreamSection> for JobStreamConfig {
    fn from(section: &JobStreamSection) -> Self {
        Self {
            stream_name: section.stream_name.clone(),
            subject_prefix: section.subject_prefix.trim_end_matches('.').to_string(),
            consumer_name: section.consumer_name.clone(),
            max_age: Duration::from_secs(section.max_age_secs),
            max_deliver: i64::try_from(section.max_deliver).unwrap_or(i64::MAX),
            retry_delay: Duration::from_millis(section.retry_delay_ms),
            concurrency: usize::try_from(section.concurrency).unwrap_or(1).max(1),
        }
    }
}

impl JobStreamConfig {
    /// Subject a job on `topic` is published to
    pub fn topic_subject(&self, topic: &str) -> String {
        let tokens: Vec<String> = topic
            .split('/')
            .filter(|token| !token.trim().is_empty())
            .map(|token| {
                token
                    .chars()
                    .map(|c| match c {
                        '.' | '*' | '>' => '_',
                        c if c.is_whitespace() => '_',
                        c => c,
                    })
                    .collect()
            })
            .collect();

        if tokens.is_empty() {
            format!("{}.default", self.subject_prefix)
        } else {
            format!("{}.{}", self.subject_prefix, tokens.join("."))
        }
    }

    /// Wildcard covering every job subject
    pub fn stream_subject(&self) -> String {
        format!("{}.>", self.subject_prefix)
    }
}

/// JetStream settlement for a job outcome
pub fn ack_kind(outcome: JobOutcome, retry_delay: Duration) -> AckKind {
    match outcome {
        JobOutcome::Ok => AckKind::Ack,
        JobOutcome::Failed => AckKind::Nak(Some(retry_delay)),
        JobOutcome::Cancel => AckKind::Term,
    }
}

/// Create or update the job stream
///
/// Idempotent: an existing stream is returned as is.
pub async fn create_job_stream(
    jetstream: &jetstream::Context,
    config: &JobStreamConfig,
) -> InvalidatorResult<Stream> {
    let stream_config = jetstream::stream::Config {
        name: config.stream_name.clone(),
        subjects: vec![config.stream_subject()],
        max_age: config.max_age,
        storage: jetstream::stream::StorageType::File,
        retention: jetstream::stream::RetentionPolicy::WorkQueue,
        ..Default::default()
    };

    let stream = jetstream
        .get_or_create_stream(stream_config)
        .await
        .map_err(|e| InvalidatorError::NatsConnection(e.to_string()))?;

    info!("Job stream {} ready on {}", config.stream_name, config.stream_subject());
    Ok(stream)
}

/// Create or reuse the durable pull consumer for job workers
pub async fn create_job_consumer(
    stream: &Stream,
    config: &JobStreamConfig,
) -> InvalidatorResult<PullConsumer> {
    let consumer = stream
        .get_or_create_consumer(
            &config.consumer_name,
            jetstream::consumer::pull::Config {
                durable_name: Some(config.consumer_name.clone()),
                ack_policy: jetstream::consumer::AckPolicy::Explicit,
                max_deliver: config.max_deliver,
                filter_subject: config.stream_subject(),
                ..Default::default()
            },
        )
        .await
        .map_err(|e| InvalidatorError::NatsSubscribe(e.to_string()))?;

    info!("Job consumer {} ready", config.consumer_name);
    Ok(consumer)
}

/// Job manager publishing jobs to the work-queue stream
#[derive(Clone)]
pub struct JetStreamJobManager {
    jetstream: jetstream::Context,
    config: JobStreamConfig,
}

impl JetStreamJobManager {
    pub fn new(jetstream: jetstream::Context, config: JobStreamConfig) -> Self {
        Self { jetstream, config }
    }
}

#[async_trait]
impl JobManager for JetStreamJobManager {
    async fn add_job(&self, topic: &str, paths: PathSet) -> InvalidatorResult<InvalidationJob> {
        let job = InvalidationJob::new(topic, paths);
        let subject = self.config.topic_subject(topic);
        let payload = serde_json::to_vec(&job)?;

        self.jetstream
            .publish(subject.clone(), payload.into())
            .await
            .map_err(|e| InvalidatorError::NatsPublish(e.to_string()))?
            .await
            .map_err(|e| InvalidatorError::NatsPublish(e.to_string()))?;

        debug!("Queued job {} on {}", job.id, subject);
        Ok(job)
    }
}

/// Pulls jobs and settles them from the consumer's outcome
pub struct JobWorker {
    router: Arc<JobRouter>,
    config: JobStreamConfig,
}

impl JobWorker {
    pub fn new(router: Arc<JobRouter>, config: JobStreamConfig) -> Self {
        Self { router, config }
    }

    /// Outcome for one raw job payload
    ///
    /// Undecodable payloads and topics no consumer serves are cancelled:
    /// redelivery cannot change them.
    pub async fn handle_payload(&self, payload: &[u8]) -> JobOutcome {
        let job = match serde_json::from_slice::<InvalidationJob>(payload) {
            Ok(job) => job,
            Err(e) => {
                error!("Failed to parse job: {}", e);
                return JobOutcome::Cancel;
            }
        };

        self.router.process(&job).await
    }

    /// Process jobs until the message stream ends
    pub async fn run(&self, consumer: PullConsumer) -> InvalidatorResult<()> {
        let messages = consumer
            .stream()
            .max_messages_per_batch(self.config.concurrency * 2)
            .messages()
            .await
            .map_err(|e| InvalidatorError::NatsSubscribe(e.to_string()))?;

        info!(
            "Job worker started on {} (concurrency {})",
            self.config.stream_subject(),
            self.config.concurrency
        );

        messages
            .for_each_concurrent(self.config.concurrency, |message| async move {
                let msg = match message {
                    Ok(msg) => msg,
                    Err(e) => {
                        error!("Error receiving job: {}", e);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        return;
                    }
                };

                debug!("Received job from subject: {}", msg.subject);
                let outcome = self.handle_payload(&msg.payload).await;
                if let Err(e) = msg.ack_with(ack_kind(outcome, self.config.retry_delay)).await {
                    error!("Failed to settle job message ({}): {}", outcome, e);
                }
            })
            .await;

        warn!("Job message stream ended");
        Ok(())
    }
}
