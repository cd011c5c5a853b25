// Copyright (c) 2025 - Cowboy AI, Inc.
//! Change Path Filter
//!
//! Normalizes raw repository change paths before any work is enqueued:
//!
//! ```text
//! /content/site/en/home/jcr:content/par ──collapse──> /content/site/en/home
//!                                                        │
//!                                            full match against root regex
//!                                                        │
//!                                                        ▼
//!                                                 filtered PathSet
//! ```
//!
//! Changes below the `jcr:content` sub-node belong to the page that owns it,
//! so they are collapsed to that owning resource. An empty result means no
//! job should be created.

use regex::Regex;
use std::collections::BTreeSet;
use tracing::trace;

use crate::errors::{InvalidatorError, InvalidatorResult};

/// Sub-resource marker segment collapsed to its owning resource
pub const JCR_CONTENT: &str = "jcr:content";

/// Ordered, deduplicated set of repository paths or derived values
pub type PathSet = BTreeSet<String>;

/// Compiled root filter applied to change paths
///
/// A blank filter expression matches every path.
#[derive(Debug, Clone)]
pub struct PathFilter {
    expression: String,
    pattern: Option<Regex>,
}

impl PathFilter {
    /// Compile a filter expression; the expression must match the whole path
    pub fn new(expression: &str) -> InvalidatorResult<Self> {
        let expression = expression.trim();
        let pattern = if expression.is_empty() {
            None
        } else {
            let anchored = format!("^(?:{})$", expression);
            Some(
                Regex::new(&anchored).map_err(|source| InvalidatorError::InvalidPattern {
                    pattern: expression.to_string(),
                    source,
                })?,
            )
        };

        Ok(Self {
            expression: expression.to_string(),
            pattern,
        })
    }

    /// Filter that accepts every non-blank path
    pub fn match_all() -> Self {
        Self {
            expression: String::new(),
            pattern: None,
        }
    }

    /// The source expression ("" when matching everything)
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Whether `path` fully matches the filter
    pub fn matches(&self, path: &str) -> bool {
        match &self.pattern {
            Some(pattern) => pattern.is_match(path),
            None => true,
        }
    }

    /// Collapse and filter a batch of change paths
    pub fn filter(&self, paths: &PathSet) -> PathSet {
        paths
            .iter()
            .map(|path| {
                trace!("Path to check: {}", path);
                owning_resource(path)
            })
            .filter(|path| !path.trim().is_empty())
            .filter(|path| self.matches(path))
            .map(str::to_string)
            .collect()
    }
}

/// Truncate a path at the first `/jcr:content` segment
pub fn owning_resource(path: &str) -> &str {
    match path.find(&format!("/{}", JCR_CONTENT)) {
        Some(index) => &path[..index],
        None => path,
    }
}

/// One-shot convenience over [`PathFilter`]
pub fn filter_paths(paths: &PathSet, filter_regex: &str) -> InvalidatorResult<PathSet> {
    Ok(PathFilter::new(filter_regex)?.filter(paths))
}
