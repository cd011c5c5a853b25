// Copyright (c) 2025 - Cowboy AI, Inc.
//! Invalidation Job Consumer
//!
//! Drives one job through the [`JobState`] lifecycle:
//!
//! 1. disabled → CANCEL
//! 2. CDN client not registered → FAILED
//! 3. no paths → CANCEL
//! 4. `code`/`tag`: value branch with all hooks; no values → CANCEL
//!    `urls`: URL branch, stages 1-3 only
//!    anything else → FAILED
//! 5. purge result → OK / FAILED
//!
//! Errors and panics anywhere in the sequence complete the job with FAILED.
//! Stages 1-3 of either branch run on the [`DerivationDispatcher`], never on
//! the async runtime thread.

use chrono::Utc;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, RwLock};
use tracing::{debug, error, info};

use super::{InvalidationJob, InvalidationMode, JobOutcome};
use crate::cdn::CdnRegistry;
use crate::config::JobConsumerConfig;
use crate::dispatch::DerivationDispatcher;
use crate::errors::{InvalidatorError, InvalidatorResult};
use crate::links::{LinkExternalizer, ResolverFactory};
use crate::paths::PathSet;
use crate::pipeline::{InvalidationPipeline, LinkTarget};
use crate::rules::RuleSet;
use crate::state_machine::job_lifecycle::{JobSignal, JobState};
use crate::state_machine::{StateMachineWithHistory, TransitionError};

const DEFAULT_LINK_DOMAIN: &str = "publish";
const DEFAULT_LINK_SCHEME: &str = "https";

/// Immutable consumer configuration snapshot
#[derive(Debug, Clone)]
pub struct JobConsumerSettings {
    pub enabled: bool,
    pub job_topics: Vec<String>,
    pub cdn_configuration_id: String,
    /// Raw mode; parsed per job so an unknown value fails the job, not activation
    pub invalidation_type: String,
    pub rules: RuleSet,
    pub external_link_domain: String,
    pub external_link_scheme: String,
}

impl JobConsumerSettings {
    /// Compile rules and apply defaults
    pub fn from_config(config: &JobConsumerConfig) -> InvalidatorResult<Self> {
        let rules = RuleSet::from_mappings(&config.tag_code_mappings)?;
        let or_default = |value: &str, default: &str| {
            let value = value.trim();
            if value.is_empty() {
                default.to_string()
            } else {
                value.to_string()
            }
        };

        Ok(Self {
            enabled: config.enabled,
            job_topics: config.job_topics.clone(),
            cdn_configuration_id: config.cdn_configuration_id.trim().to_string(),
            invalidation_type: config.invalidation_type.trim().to_ascii_lowercase(),
            rules,
            external_link_domain: or_default(&config.external_link_domain, DEFAULT_LINK_DOMAIN),
            external_link_scheme: or_default(&config.external_link_scheme, DEFAULT_LINK_SCHEME),
        })
    }

    /// Snapshot that cancels every job
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            job_topics: Vec::new(),
            cdn_configuration_id: String::new(),
            invalidation_type: InvalidationMode::Tag.to_string(),
            rules: RuleSet::default(),
            external_link_domain: DEFAULT_LINK_DOMAIN.to_string(),
            external_link_scheme: DEFAULT_LINK_SCHEME.to_string(),
        }
    }
}

/// Lifecycle plus what the job produced, for the outcome log line
struct JobRun {
    lifecycle: StateMachineWithHistory<JobState>,
    values: PathSet,
}

impl JobRun {
    fn new() -> Self {
        Self {
            lifecycle: StateMachineWithHistory::new(JobState::Received),
            values: PathSet::new(),
        }
    }

    fn advance(&mut self, signal: JobSignal) -> InvalidatorResult<()> {
        self.lifecycle.transition_with_history(signal, Utc::now())?;
        Ok(())
    }

    fn complete(&mut self, signal: JobSignal) -> InvalidatorResult<JobOutcome> {
        let from = self.lifecycle.current_state().to_string();
        self.lifecycle
            .transition_with_history(signal, Utc::now())?
            .ok_or_else(|| {
                InvalidatorError::InvalidTransition(TransitionError::InvalidTransition {
                    from,
                    input: format!("{:?}", signal),
                })
            })
    }

    fn fault(&mut self) -> JobOutcome {
        self.lifecycle
            .transition_with_history(JobSignal::Fault, Utc::now())
            .ok()
            .flatten()
            .or_else(|| self.lifecycle.current_state().outcome())
            .unwrap_or(JobOutcome::Failed)
    }
}

/// Processes invalidation jobs handed over by the job manager
pub struct InvalidationJobConsumer {
    settings: RwLock<Arc<JobConsumerSettings>>,
    registry: Arc<CdnRegistry>,
    resolvers: Arc<dyn ResolverFactory>,
    externalizer: Arc<dyn LinkExternalizer>,
    pipeline: InvalidationPipeline,
    dispatcher: DerivationDispatcher,
}

impl InvalidationJobConsumer {
    /// Create a consumer that stays disabled until activated
    pub fn new(
        registry: Arc<CdnRegistry>,
        resolvers: Arc<dyn ResolverFactory>,
        externalizer: Arc<dyn LinkExternalizer>,
    ) -> Self {
        Self {
            settings: RwLock::new(Arc::new(JobConsumerSettings::disabled())),
            registry,
            resolvers,
            externalizer,
            pipeline: InvalidationPipeline::default(),
            dispatcher: DerivationDispatcher::default(),
        }
    }

    pub fn with_pipeline(mut self, pipeline: InvalidationPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Share a dispatcher between consumers so they draw from one permit pool
    pub fn with_dispatcher(mut self, dispatcher: DerivationDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Install a new settings snapshot
    ///
    /// A configuration that does not compile leaves the consumer disabled.
    pub fn activate(&self, config: &JobConsumerConfig) -> InvalidatorResult<()> {
        let (snapshot, result) = match JobConsumerSettings::from_config(config) {
            Ok(settings) => {
                info!(
                    "Job consumer activated - enabled: {}, type: {}, rules: {}, cdn: {}",
                    settings.enabled,
                    settings.invalidation_type,
                    settings.rules.len(),
                    settings.cdn_configuration_id
                );
                (settings, Ok(()))
            }
            Err(e) => {
                error!("Job consumer configuration rejected, consumer disabled: {}", e);
                (JobConsumerSettings::disabled(), Err(e))
            }
        };
        *self.settings.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(snapshot);
        result
    }

    pub fn settings(&self) -> Arc<JobConsumerSettings> {
        self.settings.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn is_enabled(&self) -> bool {
        self.settings().enabled
    }

    /// Process one job; always yields exactly one outcome
    pub async fn process(&self, job: &InvalidationJob) -> JobOutcome {
        let settings = self.settings();
        let mut run = JobRun::new();

        let result = AssertUnwindSafe(self.run(&settings, job, &mut run))
            .catch_unwind()
            .await;

        let outcome = match result {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                error!("Unexpected error while invalidating in CDN - job {}: {}", job.id, e);
                run.fault()
            }
            Err(_) => {
                error!("Invalidation pipeline panicked - job {}", job.id);
                run.fault()
            }
        };

        info!(
            job_id = %job.id,
            topic = %job.topic,
            paths = ?job.paths,
            values = ?run.values,
            outcome = %outcome,
            elapsed_ms = run.lifecycle.elapsed_ms(),
            "Invalidation job finished"
        );
        outcome
    }

    async fn run(
        &self,
        settings: &Arc<JobConsumerSettings>,
        job: &InvalidationJob,
        run: &mut JobRun,
    ) -> InvalidatorResult<JobOutcome> {
        if !settings.enabled {
            debug!("Job consumer is disabled: processing cancelled");
            return run.complete(JobSignal::Disabled);
        }

        let Some(cdn) = self.registry.get(&settings.cdn_configuration_id) else {
            error!("Impossible to call CDN Api because service retrieval failed");
            return run.complete(JobSignal::ServiceUnavailable);
        };
        run.advance(JobSignal::ClientResolved)?;
        debug!("Consuming job - topic: {}, job: {}", job.topic, job);

        if job.paths.is_empty() {
            debug!("No paths have been provided: processing cancelled");
            return run.complete(JobSignal::NoInput);
        }
        run.advance(JobSignal::PathsLoaded)?;
        info!("Paths to process: {:?}", job.paths);

        let mode = match settings.invalidation_type.parse::<InvalidationMode>() {
            Ok(mode) => mode,
            Err(_) => {
                error!("Invalidation type is not allowed: {}", settings.invalidation_type);
                return run.complete(JobSignal::UnknownMode);
            }
        };

        match mode {
            InvalidationMode::Code | InvalidationMode::Tag => {
                let pipeline = self.pipeline.clone();
                let snapshot = Arc::clone(settings);
                let paths = job.paths.clone();
                let values = self
                    .dispatcher
                    .spawn(move || pipeline.process_values(paths, &snapshot.rules))
                    .await?;
                run.values = values.clone();
                if values.is_empty() {
                    debug!("No values to invalidate: processing cancelled");
                    return run.complete(JobSignal::NothingToPurge);
                }

                let values = self.pipeline.before_invalidation(values);
                run.values = values.clone();
                run.advance(JobSignal::Dispatched)?;

                let accepted = if mode == InvalidationMode::Code {
                    cdn.purge_by_code(&values).await
                } else {
                    cdn.purge_by_tag(&values).await
                };
                let accepted = self.pipeline.after_invalidation(accepted, job);
                run.complete(JobSignal::PurgeFinished(accepted))
            }
            InvalidationMode::Urls => {
                let pipeline = self.pipeline.clone();
                let snapshot = Arc::clone(settings);
                let resolvers = Arc::clone(&self.resolvers);
                let externalizer = Arc::clone(&self.externalizer);
                let paths = job.paths.clone();
                let urls = self
                    .dispatcher
                    .spawn(move || {
                        let target = LinkTarget {
                            domain: &snapshot.external_link_domain,
                            scheme: &snapshot.external_link_scheme,
                        };
                        pipeline.process_urls(paths, target, resolvers.as_ref(), externalizer.as_ref())
                    })
                    .await?;
                run.values = urls.clone();
                run.advance(JobSignal::Dispatched)?;

                let accepted = cdn.purge_by_urls(&urls).await;
                run.complete(JobSignal::PurgeFinished(accepted))
            }
        }
    }
}
