// Copyright (c) 2025 - Cowboy AI, Inc.
//! CDN Purge Clients
//!
//! ```text
//! InvalidationBatch ──► AkamaiInvalidationService
//!                         │  body   {"objects": [...]}
//!                         │  sign   EdgeGridSigner (HMAC-SHA256, timestamp, nonce)
//!                         │  send   PooledHttpClient (shared, bounded)
//!                         ▼
//!                  POST https://{host}/ccu/v3/{purgeType}/{tag|cpcode|url}/{network}
//!                         │
//!                         ▼
//!                  200..=299 → true, anything else → false
//! ```
//!
//! A purge never returns an error: disabled clients, empty batches, missing
//! credentials, transport and signing faults all come back as `false`.

pub mod akamai;
pub mod edgegrid;
pub mod http_client;

pub use akamai::{is_success_status, AkamaiInvalidationService};
pub use edgegrid::{ClientCredential, EdgeGridSigner};
pub use http_client::{HttpClientService, HttpClientSettings, PooledHttpClient};

use async_trait::async_trait;
use std::fmt;

use crate::paths::PathSet;
use crate::registry::ServiceRegistry;

/// Immutable set of tags, codes or URLs handed to a purge client
pub type InvalidationBatch = PathSet;

/// Registry of purge clients keyed by CDN configuration id
pub type CdnRegistry = ServiceRegistry<dyn CdnInvalidationService>;

/// What a purge batch contains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PurgeKind {
    /// CP codes
    Code,
    /// Cache tags
    Tag,
    /// Public URLs
    Url,
}

impl PurgeKind {
    /// Path segment naming the purge kind in the provider URL
    pub fn service_segment(&self) -> &'static str {
        match self {
            PurgeKind::Code => "cpcode",
            PurgeKind::Tag => "tag",
            PurgeKind::Url => "url",
        }
    }
}

impl fmt::Display for PurgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.service_segment())
    }
}

/// Cache invalidation by tag, code or URL
#[async_trait]
pub trait CdnInvalidationService: Send + Sync {
    /// Purge `items`; true iff the provider accepted the request
    async fn purge(&self, kind: PurgeKind, items: &InvalidationBatch) -> bool;

    /// Purge the given cache tags
    async fn purge_by_tag(&self, tags: &InvalidationBatch) -> bool {
        self.purge(PurgeKind::Tag, tags).await
    }

    /// Purge the given CP codes
    async fn purge_by_code(&self, codes: &InvalidationBatch) -> bool {
        self.purge(PurgeKind::Code, codes).await
    }

    /// Purge the given public URLs
    async fn purge_by_urls(&self, urls: &InvalidationBatch) -> bool {
        self.purge(PurgeKind::Url, urls).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(PurgeKind::Code, "cpcode")]
    #[test_case(PurgeKind::Tag, "tag")]
    #[test_case(PurgeKind::Url, "url")]
    fn test_service_segment(kind: PurgeKind, segment: &str) {
        assert_eq!(kind.service_segment(), segment);
        assert_eq!(kind.to_string(), segment);
    }
}
