// Copyright (c) 2025 - Cowboy AI, Inc.
//! Public URL Derivation
//!
//! Turns repository paths into absolute URLs that the CDN caches:
//!
//! ```text
//! /content/site/en/home ──resolver.map──> /en/home ──+".html"──> /en/home.html
//!                                                                   │
//!                                   externalizer(domain, scheme) ◄──┘
//!                                                                   │
//!                                         https://www.example.com/en/home.html
//! ```
//!
//! The read-access layer and link externalization are collaborators behind
//! the [`ResolverFactory`], [`PathResolver`] and [`LinkExternalizer`] traits.
//! [`StaticResolverFactory`] and [`DomainExternalizer`] are configuration
//! driven implementations for deployments without a live repository.

use rayon::prelude::*;
use reqwest::Url;
use std::collections::HashMap;
use tracing::{debug, error, warn};

use crate::errors::{InvalidatorError, InvalidatorResult};
use crate::paths::PathSet;

/// Suffix appended to a mapped page path before externalization
pub const HTML_EXTENSION: &str = ".html";

/// Scoped read access to the repository
///
/// A resolver is released when dropped, on every exit path.
pub trait PathResolver: Send + Sync {
    /// Map a repository path to its dispatch-ready form
    fn map(&self, path: &str) -> InvalidatorResult<String>;
}

/// Provides read-access resolvers
pub trait ResolverFactory: Send + Sync {
    /// Acquire a resolver for the duration of one derivation
    fn resolver(&self) -> InvalidatorResult<Box<dyn PathResolver>>;
}

/// Builds absolute, externally reachable links
pub trait LinkExternalizer: Send + Sync {
    /// Externalize `path` for the named `domain` using `scheme`
    fn external_link(
        &self,
        resolver: &dyn PathResolver,
        domain: &str,
        scheme: &str,
        path: &str,
    ) -> InvalidatorResult<String>;
}

/// Resolve every path to a public URL
///
/// Paths that fail to resolve are logged and left out. Failing to acquire a
/// resolver yields an empty set.
pub fn derive_urls(
    paths: &PathSet,
    domain: &str,
    scheme: &str,
    resolvers: &dyn ResolverFactory,
    externalizer: &dyn LinkExternalizer,
) -> PathSet {
    let resolver = match resolvers.resolver() {
        Ok(resolver) => resolver,
        Err(e) => {
            error!("Impossible to compute public urls for paths={:?}: {}", paths, e);
            return PathSet::new();
        }
    };
    let resolver = resolver.as_ref();

    paths
        .par_iter()
        .filter_map(|path| {
            let link = resolver.map(path).and_then(|mapped| {
                let page = format!("{}{}", mapped, HTML_EXTENSION);
                externalizer.external_link(resolver, domain, scheme, &page)
            });
            match link {
                Ok(url) => Some(url),
                Err(e) => {
                    warn!("Skipping path {} without public url: {}", path, e);
                    None
                }
            }
        })
        .collect()
}

/// Resolver that rewrites configured path prefixes
///
/// The longest matching prefix wins; unmapped absolute paths pass through.
#[derive(Debug, Clone, Default)]
pub struct PrefixPathResolver {
    mappings: Vec<(String, String)>,
}

impl PrefixPathResolver {
    pub fn new(mut mappings: Vec<(String, String)>) -> Self {
        mappings.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        Self { mappings }
    }
}

impl PathResolver for PrefixPathResolver {
    fn map(&self, path: &str) -> InvalidatorResult<String> {
        if !path.starts_with('/') {
            return Err(InvalidatorError::Resolution(format!(
                "not an absolute repository path: {}",
                path
            )));
        }

        let mapped = self
            .mappings
            .iter()
            .find(|(from, _)| path == from || path.starts_with(&format!("{}/", from)))
            .map(|(from, to)| format!("{}{}", to, &path[from.len()..]))
            .unwrap_or_else(|| path.to_string());

        debug!("Mapped {} to {}", path, mapped);
        Ok(if mapped.is_empty() { "/".to_string() } else { mapped })
    }
}

/// Factory handing out [`PrefixPathResolver`]s from configured mappings
#[derive(Debug, Clone, Default)]
pub struct StaticResolverFactory {
    mappings: Vec<(String, String)>,
}

impl StaticResolverFactory {
    pub fn new(mappings: Vec<(String, String)>) -> Self {
        Self { mappings }
    }

    /// Build from `internal-prefix=public-prefix` strings, ignoring malformed ones
    pub fn from_mappings<I, S>(mappings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mappings = mappings
            .into_iter()
            .filter_map(|raw| {
                let (from, to) = raw.as_ref().split_once('=')?;
                let from = from.trim().trim_end_matches('/');
                let to = to.trim().trim_end_matches('/');
                (!from.is_empty()).then(|| (from.to_string(), to.to_string()))
            })
            .collect();
        Self::new(mappings)
    }
}

impl ResolverFactory for StaticResolverFactory {
    fn resolver(&self) -> InvalidatorResult<Box<dyn PathResolver>> {
        Ok(Box::new(PrefixPathResolver::new(self.mappings.clone())))
    }
}

/// Externalizer backed by a `domain name -> host` table
#[derive(Debug, Clone, Default)]
pub struct DomainExternalizer {
    domains: HashMap<String, String>,
}

impl DomainExternalizer {
    pub fn new(domains: HashMap<String, String>) -> Self {
        Self { domains }
    }

    pub fn with_domain(mut self, name: impl Into<String>, host: impl Into<String>) -> Self {
        self.domains.insert(name.into(), host.into());
        self
    }
}

impl LinkExternalizer for DomainExternalizer {
    fn external_link(
        &self,
        _resolver: &dyn PathResolver,
        domain: &str,
        scheme: &str,
        path: &str,
    ) -> InvalidatorResult<String> {
        let host = self.domains.get(domain).ok_or_else(|| {
            InvalidatorError::Resolution(format!("unknown externalizer domain: {}", domain))
        })?;
        let host = host.trim_end_matches('/');
        let host = host
            .split_once("://")
            .map_or(host, |(_, without_scheme)| without_scheme);

        let url = Url::parse(&format!("{}://{}{}", scheme, host, path))
            .map_err(|e| InvalidatorError::Resolution(format!("invalid link for {}: {}", path, e)))?;
        Ok(url.to_string())
    }
}
