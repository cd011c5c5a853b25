// Copyright (c) 2025 - Cowboy AI, Inc.
//! Invalidation Pipeline
//!
//! Every job runs the same fixed-shape pipeline; only the middle stage is
//! chosen by the invalidation mode:
//!
//! ```text
//!              value branch (code | tag)             url branch (urls)
//!              ─────────────────────────             ─────────────────
//! stage 1      preprocess_values                     preprocess_urls
//! stage 2      derive_values(rules)                  derive_urls(domain, scheme)
//! stage 3      postprocess_values                    postprocess_urls
//! stage 4      before_invalidation
//!              ── CDN purge ──                       ── CDN purge ──
//!              after_invalidation(result, job)
//! ```
//!
//! Hooks are plain functions supplied at construction. Each defaults to the
//! identity, so an [`InvalidationPipeline::default`] derives and purges
//! without alteration.

use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::jobs::InvalidationJob;
use crate::links::{derive_urls, LinkExternalizer, ResolverFactory};
use crate::paths::PathSet;
use crate::rules::{derive_values, RuleSet};

/// Hook transforming a set of paths, values or URLs
pub type SetHook = Arc<dyn Fn(PathSet) -> PathSet + Send + Sync>;

/// Hook that may override the CDN call result
pub type ResultHook = Arc<dyn Fn(bool, &InvalidationJob) -> bool + Send + Sync>;

/// Link target used by the URL branch
#[derive(Debug, Clone, Copy)]
pub struct LinkTarget<'a> {
    pub domain: &'a str,
    pub scheme: &'a str,
}

/// The fixed four-stage pipeline with its hooks
#[derive(Clone)]
pub struct InvalidationPipeline {
    preprocess_values: SetHook,
    postprocess_values: SetHook,
    preprocess_urls: SetHook,
    postprocess_urls: SetHook,
    before_invalidation: SetHook,
    after_invalidation: ResultHook,
}

fn identity() -> SetHook {
    Arc::new(|set: PathSet| set)
}

impl Default for InvalidationPipeline {
    fn default() -> Self {
        Self {
            preprocess_values: identity(),
            postprocess_values: identity(),
            preprocess_urls: identity(),
            postprocess_urls: identity(),
            before_invalidation: identity(),
            after_invalidation: Arc::new(|result: bool, _: &InvalidationJob| result),
        }
    }
}

impl InvalidationPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter paths before rules are applied
    pub fn with_preprocess_values<F>(mut self, hook: F) -> Self
    where
        F: Fn(PathSet) -> PathSet + Send + Sync + 'static,
    {
        self.preprocess_values = Arc::new(hook);
        self
    }

    /// Adjust derived values
    pub fn with_postprocess_values<F>(mut self, hook: F) -> Self
    where
        F: Fn(PathSet) -> PathSet + Send + Sync + 'static,
    {
        self.postprocess_values = Arc::new(hook);
        self
    }

    /// Filter paths before URL resolution
    pub fn with_preprocess_urls<F>(mut self, hook: F) -> Self
    where
        F: Fn(PathSet) -> PathSet + Send + Sync + 'static,
    {
        self.preprocess_urls = Arc::new(hook);
        self
    }

    /// Adjust resolved URLs
    pub fn with_postprocess_urls<F>(mut self, hook: F) -> Self
    where
        F: Fn(PathSet) -> PathSet + Send + Sync + 'static,
    {
        self.postprocess_urls = Arc::new(hook);
        self
    }

    /// Last change to values right before the CDN call
    pub fn with_before_invalidation<F>(mut self, hook: F) -> Self
    where
        F: Fn(PathSet) -> PathSet + Send + Sync + 'static,
    {
        self.before_invalidation = Arc::new(hook);
        self
    }

    /// Override the CDN call result
    pub fn with_after_invalidation<F>(mut self, hook: F) -> Self
    where
        F: Fn(bool, &InvalidationJob) -> bool + Send + Sync + 'static,
    {
        self.after_invalidation = Arc::new(hook);
        self
    }

    /// Stages 1-3 of the value branch
    pub fn process_values(&self, paths: PathSet, rules: &RuleSet) -> PathSet {
        let values = (self.preprocess_values)(paths);
        debug!("Invalidation values after initial processing: {:?}", values);

        let values = derive_values(Some(&values), Some(rules));
        debug!("Invalidation values after main processing: {:?}", values);

        let values = (self.postprocess_values)(values);
        debug!("Final invalidation values to send: {:?}", values);
        values
    }

    /// Stages 1-3 of the URL branch
    pub fn process_urls(
        &self,
        paths: PathSet,
        target: LinkTarget<'_>,
        resolvers: &dyn ResolverFactory,
        externalizer: &dyn LinkExternalizer,
    ) -> PathSet {
        let urls = (self.preprocess_urls)(paths);
        debug!("Paths after first processing: {:?}", urls);

        let urls = derive_urls(&urls, target.domain, target.scheme, resolvers, externalizer);
        debug!("Urls after second processing: {:?}", urls);

        let urls = (self.postprocess_urls)(urls);
        debug!("Urls after third processing: {:?}", urls);
        urls
    }

    /// Stage 4, value branch only
    pub fn before_invalidation(&self, values: PathSet) -> PathSet {
        let values = (self.before_invalidation)(values);
        debug!("beforeInvalidation - objects: {:?}", values);
        values
    }

    /// Post-purge override, value branch only
    pub fn after_invalidation(&self, result: bool, job: &InvalidationJob) -> bool {
        let result = (self.after_invalidation)(result, job);
        debug!("afterInvalidation - result: {}, job: {}", result, job.id);
        result
    }
}

impl fmt::Debug for InvalidationPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvalidationPipeline").finish_non_exhaustive()
    }
}
