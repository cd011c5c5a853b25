// Copyright (c) 2025 - Cowboy AI, Inc.
//! Service Configuration
//!
//! [`AppConfig`] is loaded once at startup, either from the JSON file named by
//! `CDN_INVALIDATOR_CONFIG` or from individual environment variables. Each
//! section is validated by the component it configures when that component is
//! activated; an invalid section degrades the component, never the process.
//!
//! HTTP clients, Akamai clients, job consumers and both listeners may be
//! configured several times. In JSON those sections take either one object
//! or a list of objects; the environment describes a single instance of each.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::{InvalidatorError, InvalidatorResult};
use crate::listeners::resource_change::ChangeType;
use crate::nats::NatsConfig;

/// Environment variable naming a JSON configuration file
pub const CONFIG_FILE_ENV: &str = "CDN_INVALIDATOR_CONFIG";

/// Complete service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub nats: NatsSection,
    pub job_stream: JobStreamSection,
    /// HTTP client instances keyed by configuration id
    #[serde(alias = "http_client", deserialize_with = "one_or_many")]
    pub http_clients: Vec<HttpClientConfig>,
    /// Akamai client instances keyed by configuration id
    #[serde(deserialize_with = "one_or_many")]
    pub akamai: Vec<AkamaiConfig>,
    /// Job consumers, each serving its own job topics
    #[serde(alias = "job_consumer", deserialize_with = "one_or_many")]
    pub job_consumers: Vec<JobConsumerConfig>,
    #[serde(alias = "resource_change_listener", deserialize_with = "one_or_many")]
    pub resource_change_listeners: Vec<ResourceChangeListenerConfig>,
    #[serde(alias = "replication_listener", deserialize_with = "one_or_many")]
    pub replication_listeners: Vec<ListenerConfig>,
    pub links: LinkConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nats: NatsSection::default(),
            job_stream: JobStreamSection::default(),
            http_clients: vec![HttpClientConfig::default()],
            akamai: vec![AkamaiConfig::default()],
            job_consumers: vec![JobConsumerConfig::default()],
            resource_change_listeners: vec![ResourceChangeListenerConfig::default()],
            replication_listeners: vec![ListenerConfig::replication()],
            links: LinkConfig::default(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

/// Accept a single section object as a one-element list
fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::Many(items) => items,
        OneOrMany::One(item) => vec![item],
    })
}

impl AppConfig {
    /// Load from the configured JSON file, falling back to the environment
    pub fn load() -> InvalidatorResult<Self> {
        match std::env::var(CONFIG_FILE_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(path.trim()),
            _ => Ok(Self::from_env()),
        }
    }

    /// Parse a JSON configuration file
    pub fn from_file(path: &str) -> InvalidatorResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            InvalidatorError::Configuration(format!("Cannot read {}: {}", path, e))
        })?;
        Self::from_json(&raw)
    }

    /// Parse a JSON document; missing sections take their defaults
    pub fn from_json(raw: &str) -> InvalidatorResult<Self> {
        serde_json::from_str(raw)
            .map_err(|e| InvalidatorError::Configuration(format!("Invalid configuration: {}", e)))
    }

    /// Build from process environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup
    ///
    /// List values are comma separated, except `CDN_TAG_CODE_MAPPINGS` and
    /// `LINK_PATH_MAPPINGS` which are newline separated.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let string = |key: &str, default: String| get(key).unwrap_or(default);
        let flag = |key: &str, default: bool| {
            get(key)
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
                .unwrap_or(default)
        };
        let number = |key: &str, default: u64| {
            get(key)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };
        let list = |key: &str, separator: char| -> Option<Vec<String>> {
            get(key).map(|v| {
                v.split(separator)
                    .map(|item| item.trim().to_string())
                    .filter(|item| !item.is_empty())
                    .collect()
            })
        };

        let defaults = Self::default();
        let http_defaults = HttpClientConfig::default();
        let akamai_defaults = AkamaiConfig::default();
        let consumer_defaults = JobConsumerConfig::default();

        let nats = NatsSection {
            servers: list("NATS_URL", ',').unwrap_or(defaults.nats.servers),
            name: string("NATS_CLIENT_NAME", defaults.nats.name),
            connect_timeout_ms: number("NATS_CONNECT_TIMEOUT_MS", defaults.nats.connect_timeout_ms),
            request_timeout_ms: number("NATS_REQUEST_TIMEOUT_MS", defaults.nats.request_timeout_ms),
        };

        let job_stream = JobStreamSection {
            stream_name: string("JOB_STREAM", defaults.job_stream.stream_name),
            subject_prefix: string("JOB_SUBJECT_PREFIX", defaults.job_stream.subject_prefix),
            consumer_name: string("JOB_CONSUMER", defaults.job_stream.consumer_name),
            max_age_secs: number("JOB_MAX_AGE_SECS", defaults.job_stream.max_age_secs),
            max_deliver: number("JOB_MAX_DELIVER", defaults.job_stream.max_deliver),
            retry_delay_ms: number("JOB_RETRY_DELAY_MS", defaults.job_stream.retry_delay_ms),
            concurrency: number("JOB_CONCURRENCY", defaults.job_stream.concurrency),
        };

        let http_client = HttpClientConfig {
            configuration_id: string("HTTP_CLIENT_CONFIGURATION_ID", http_defaults.configuration_id),
            connection_timeout_ms: number("HTTP_CONNECTION_TIMEOUT_MS", http_defaults.connection_timeout_ms),
            connection_request_timeout_ms: number(
                "HTTP_CONNECTION_REQUEST_TIMEOUT_MS",
                http_defaults.connection_request_timeout_ms,
            ),
            socket_timeout_ms: number("HTTP_SOCKET_TIMEOUT_MS", http_defaults.socket_timeout_ms),
            max_total_connections: number("HTTP_MAX_TOTAL_CONNECTIONS", http_defaults.max_total_connections),
            max_connections_per_route: number(
                "HTTP_MAX_CONNECTIONS_PER_ROUTE",
                http_defaults.max_connections_per_route,
            ),
            trust_all_certificates: flag("HTTP_TRUST_ALL_CERTIFICATES", false),
        };

        let akamai = AkamaiConfig {
            enabled: flag("AKAMAI_ENABLED", false),
            configuration_id: string("AKAMAI_CONFIGURATION_ID", akamai_defaults.configuration_id),
            http_client_configuration_id: string(
                "AKAMAI_HTTP_CLIENT_CONFIGURATION_ID",
                akamai_defaults.http_client_configuration_id,
            ),
            hostname: string("AKAMAI_HOSTNAME", String::new()),
            access_token: string("AKAMAI_ACCESS_TOKEN", String::new()),
            client_token: string("AKAMAI_CLIENT_TOKEN", String::new()),
            client_secret: string("AKAMAI_CLIENT_SECRET", String::new()),
            network: get("AKAMAI_NETWORK")
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
            purge_type: get("AKAMAI_PURGE_TYPE")
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
            scheme: string("AKAMAI_SCHEME", akamai_defaults.scheme),
        };

        let job_consumer = JobConsumerConfig {
            enabled: flag("CDN_JOB_CONSUMER_ENABLED", false),
            job_topics: list("CDN_JOB_TOPICS", ',').unwrap_or(consumer_defaults.job_topics),
            cdn_configuration_id: string("CDN_CONFIGURATION_ID", consumer_defaults.cdn_configuration_id),
            invalidation_type: string("CDN_INVALIDATION_TYPE", consumer_defaults.invalidation_type),
            tag_code_mappings: list("CDN_TAG_CODE_MAPPINGS", '\n').unwrap_or_default(),
            external_link_domain: string("CDN_EXTERNAL_LINK_DOMAIN", consumer_defaults.external_link_domain),
            external_link_scheme: string("CDN_EXTERNAL_LINK_SCHEME", consumer_defaults.external_link_scheme),
        };

        let listener = |prefix: &str, defaults: ListenerConfig| ListenerConfig {
            enabled: flag(&format!("{}_ENABLED", prefix), false),
            root_paths: list(&format!("{}_ROOT_PATHS", prefix), ',').unwrap_or(defaults.root_paths),
            job_topic: string(&format!("{}_JOB_TOPIC", prefix), defaults.job_topic),
            filter_regex: string(&format!("{}_FILTER_REGEX", prefix), defaults.filter_regex),
            subject: string(&format!("{}_SUBJECT", prefix), defaults.subject),
        };

        let resource_change_listener = ResourceChangeListenerConfig {
            listener: listener("RESOURCE_CHANGE", ListenerConfig::default()),
            change_types: list("RESOURCE_CHANGE_TYPES", ',')
                .map(|types| types.iter().filter_map(|t| t.parse().ok()).collect())
                .unwrap_or_else(|| ResourceChangeListenerConfig::default().change_types),
        };

        let replication_listener = listener("REPLICATION", ListenerConfig::replication());

        let links = LinkConfig {
            domains: list("LINK_DOMAINS", ',')
                .map(|entries| {
                    entries
                        .iter()
                        .filter_map(|entry| entry.split_once('='))
                        .map(|(name, host)| (name.trim().to_string(), host.trim().to_string()))
                        .collect()
                })
                .unwrap_or(defaults.links.domains),
            path_mappings: list("LINK_PATH_MAPPINGS", '\n').unwrap_or_default(),
        };

        Self {
            nats,
            job_stream,
            http_clients: vec![http_client],
            akamai: vec![akamai],
            job_consumers: vec![job_consumer],
            resource_change_listeners: vec![resource_change_listener],
            replication_listeners: vec![replication_listener],
            links,
        }
    }
}

/// NATS connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NatsSection {
    pub servers: Vec<String>,
    pub name: String,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for NatsSection {
    fn default() -> Self {
        Self {
            servers: vec!["nats://localhost:4222".to_string()],
            name: "cdn-invalidator".to_string(),
            connect_timeout_ms: 10_000,
            request_timeout_ms: 5_000,
        }
    }
}

impl NatsSection {
    pub fn to_nats_config(&self) -> NatsConfig {
        NatsConfig {
            servers: self.servers.clone(),
            name: self.name.clone(),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
        }
    }
}

/// JetStream work-queue settings for invalidation jobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobStreamSection {
    pub stream_name: String,
    pub subject_prefix: String,
    pub consumer_name: String,
    pub max_age_secs: u64,
    /// Deliveries before a FAILED job is given up
    pub max_deliver: u64,
    /// Redelivery delay after a FAILED outcome
    pub retry_delay_ms: u64,
    /// Jobs processed at the same time by one worker
    pub concurrency: u64,
}

impl Default for JobStreamSection {
    fn default() -> Self {
        Self {
            stream_name: "CDN_INVALIDATION_JOBS".to_string(),
            subject_prefix: "cdn.invalidation.jobs".to_string(),
            consumer_name: "cdn-invalidation-worker".to_string(),
            max_age_secs: 7 * 24 * 60 * 60,
            max_deliver: 5,
            retry_delay_ms: 30_000,
            concurrency: 4,
        }
    }
}

/// Pooled HTTP client settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpClientConfig {
    pub configuration_id: String,
    pub connection_timeout_ms: u64,
    /// Maximum wait for a pooled connection
    pub connection_request_timeout_ms: u64,
    pub socket_timeout_ms: u64,
    pub max_total_connections: u64,
    pub max_connections_per_route: u64,
    pub trust_all_certificates: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            configuration_id: "akamai-http-client".to_string(),
            connection_timeout_ms: 5_000,
            connection_request_timeout_ms: 5_000,
            socket_timeout_ms: 5_000,
            max_total_connections: 20,
            max_connections_per_route: 20,
            trust_all_certificates: false,
        }
    }
}

/// Akamai network receiving the purge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Staging,
    Production,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Staging => "staging",
            Network::Production => "production",
        }
    }
}

impl FromStr for Network {
    type Err = InvalidatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "staging" => Ok(Network::Staging),
            "production" => Ok(Network::Production),
            other => Err(InvalidatorError::Configuration(format!("Unknown network: {}", other))),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Akamai purge semantics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurgeType {
    /// Mark content stale
    #[default]
    Invalidate,
    /// Remove content
    Delete,
}

impl PurgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurgeType::Invalidate => "invalidate",
            PurgeType::Delete => "delete",
        }
    }
}

impl FromStr for PurgeType {
    type Err = InvalidatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "invalidate" => Ok(PurgeType::Invalidate),
            "delete" => Ok(PurgeType::Delete),
            other => Err(InvalidatorError::Configuration(format!("Unknown purge type: {}", other))),
        }
    }
}

impl fmt::Display for PurgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Akamai Fast Purge client settings
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AkamaiConfig {
    pub enabled: bool,
    pub configuration_id: String,
    pub http_client_configuration_id: String,
    pub hostname: String,
    pub access_token: String,
    pub client_token: String,
    pub client_secret: String,
    pub network: Network,
    pub purge_type: PurgeType,
    pub scheme: String,
}

impl Default for AkamaiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            configuration_id: "akamai".to_string(),
            http_client_configuration_id: "akamai-http-client".to_string(),
            hostname: String::new(),
            access_token: String::new(),
            client_token: String::new(),
            client_secret: String::new(),
            network: Network::default(),
            purge_type: PurgeType::default(),
            scheme: "https".to_string(),
        }
    }
}

impl fmt::Debug for AkamaiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |secret: &str| if secret.is_empty() { "<unset>" } else { "<redacted>" };
        f.debug_struct("AkamaiConfig")
            .field("enabled", &self.enabled)
            .field("configuration_id", &self.configuration_id)
            .field("http_client_configuration_id", &self.http_client_configuration_id)
            .field("hostname", &self.hostname)
            .field("access_token", &redact(&self.access_token))
            .field("client_token", &redact(&self.client_token))
            .field("client_secret", &redact(&self.client_secret))
            .field("network", &self.network)
            .field("purge_type", &self.purge_type)
            .field("scheme", &self.scheme)
            .finish()
    }
}

/// Invalidation job consumer settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConsumerConfig {
    pub enabled: bool,
    pub job_topics: Vec<String>,
    pub cdn_configuration_id: String,
    /// `code`, `tag` or `urls`
    pub invalidation_type: String,
    /// `pattern=template` rule strings
    pub tag_code_mappings: Vec<String>,
    pub external_link_domain: String,
    pub external_link_scheme: String,
}

impl Default for JobConsumerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            job_topics: vec!["editorial/assets".to_string()],
            cdn_configuration_id: "akamai".to_string(),
            invalidation_type: "tag".to_string(),
            tag_code_mappings: Vec::new(),
            external_link_domain: "publish".to_string(),
            external_link_scheme: "https".to_string(),
        }
    }
}

/// Event source settings shared by both listeners
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    pub enabled: bool,
    pub root_paths: Vec<String>,
    pub job_topic: String,
    /// Full-match regex applied to collected paths; blank matches everything
    pub filter_regex: String,
    /// NATS subject the events arrive on
    pub subject: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            root_paths: vec!["/content".to_string()],
            job_topic: "editorial/assets".to_string(),
            filter_regex: String::new(),
            subject: "repository.resource.changes".to_string(),
        }
    }
}

impl ListenerConfig {
    /// Defaults for the replication listener
    pub fn replication() -> Self {
        Self {
            subject: "repository.replication.actions".to_string(),
            ..Self::default()
        }
    }
}

/// Resource-change listener settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceChangeListenerConfig {
    #[serde(flatten)]
    pub listener: ListenerConfig,
    pub change_types: Vec<ChangeType>,
}

impl Default for ResourceChangeListenerConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            change_types: vec![ChangeType::Changed],
        }
    }
}

/// Link externalization settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Externalizer domain name to public host
    pub domains: HashMap<String, String>,
    /// `internal-prefix=public-prefix` path mappings
    pub path_mappings: Vec<String>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            domains: HashMap::from([("publish".to_string(), "localhost:4503".to_string())]),
            path_mappings: Vec::new(),
        }
    }
}
