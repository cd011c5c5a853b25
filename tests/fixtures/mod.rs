// Copyright (c) 2025 - Cowboy AI, Inc.
//! Test Fixtures for cdn-invalidator
//!
//! Deterministic jobs and in-memory collaborators shared by the integration
//! tests. Job ids and timestamps are fixed constants so failures reproduce.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use cdn_invalidator::cdn::{CdnInvalidationService, CdnRegistry, InvalidationBatch, PurgeKind};
use cdn_invalidator::config::JobConsumerConfig;
use cdn_invalidator::jobs::{InvalidationJob, InvalidationJobConsumer, JobManager};
use cdn_invalidator::links::{DomainExternalizer, StaticResolverFactory};
use cdn_invalidator::pipeline::InvalidationPipeline;
use cdn_invalidator::{InvalidatorError, InvalidatorResult, PathSet};

pub const JOB_ID_1: &str = "01934f4a-0001-7000-8000-000000000001";
pub const JOB_TOPIC: &str = "editorial/assets";
pub const CDN_ID: &str = "akamai";

// Fixed test timestamp (2026-01-19T12:00:00Z)
pub const FIXED_TIMESTAMP: &str = "2026-01-19T12:00:00Z";

pub fn fixed_timestamp() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(FIXED_TIMESTAMP)
        .expect("Invalid timestamp in test fixture")
        .with_timezone(&Utc)
}

pub fn path_set(items: &[&str]) -> PathSet {
    items.iter().map(|s| s.to_string()).collect()
}

/// Job with fixed id and timestamp
pub fn job_fixture(paths: &[&str]) -> InvalidationJob {
    InvalidationJob {
        id: Uuid::parse_str(JOB_ID_1).expect("Invalid UUID in test fixture"),
        topic: JOB_TOPIC.to_string(),
        paths: path_set(paths),
        created_at: fixed_timestamp(),
    }
}

/// Consumer configuration for `mode` with the given rule strings
pub fn consumer_config(mode: &str, rules: &[&str]) -> JobConsumerConfig {
    JobConsumerConfig {
        enabled: true,
        job_topics: vec![JOB_TOPIC.to_string()],
        cdn_configuration_id: CDN_ID.to_string(),
        invalidation_type: mode.to_string(),
        tag_code_mappings: rules.iter().map(|s| s.to_string()).collect(),
        external_link_domain: "publish".to_string(),
        external_link_scheme: "https".to_string(),
    }
}

/// Purge client that records every call and answers with a fixed result
pub struct MockCdnService {
    result: bool,
    calls: Mutex<Vec<(PurgeKind, InvalidationBatch)>>,
}

impl MockCdnService {
    pub fn answering(result: bool) -> Arc<Self> {
        Arc::new(Self {
            result,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<(PurgeKind, InvalidationBatch)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CdnInvalidationService for MockCdnService {
    async fn purge(&self, kind: PurgeKind, items: &InvalidationBatch) -> bool {
        self.calls.lock().unwrap().push((kind, items.clone()));
        self.result
    }
}

/// Registry holding `service` under [`CDN_ID`]
pub fn registry_with(service: Arc<MockCdnService>) -> Arc<CdnRegistry> {
    let registry = CdnRegistry::new();
    let service: Arc<dyn CdnInvalidationService> = service;
    registry.register(CDN_ID, service);
    Arc::new(registry)
}

/// Consumer wired to `service`, resolving `/content/site` to `/` on www.example.com
pub fn consumer_with(
    service: Arc<MockCdnService>,
    pipeline: InvalidationPipeline,
) -> InvalidationJobConsumer {
    InvalidationJobConsumer::new(
        registry_with(service),
        Arc::new(StaticResolverFactory::from_mappings(["/content/site=/"])),
        Arc::new(DomainExternalizer::default().with_domain("publish", "www.example.com")),
    )
    .with_pipeline(pipeline)
}

/// Job manager that keeps queued jobs in memory
#[derive(Default)]
pub struct RecordingJobManager {
    jobs: Mutex<Vec<InvalidationJob>>,
    unavailable: bool,
}

impl RecordingJobManager {
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn jobs(&self) -> Vec<InvalidationJob> {
        self.jobs.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobManager for RecordingJobManager {
    async fn add_job(&self, topic: &str, paths: PathSet) -> InvalidatorResult<InvalidationJob> {
        if self.unavailable {
            return Err(InvalidatorError::NatsPublish("job queue unavailable".to_string()));
        }
        let job = InvalidationJob::new(topic, paths);
        self.jobs.lock().unwrap().push(job.clone());
        Ok(job)
    }
}
