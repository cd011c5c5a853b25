// Copyright (c) 2025 - Cowboy AI, Inc.
//! Pooled HTTP Transport
//!
//! One [`HttpClientService`] per configuration id owns a single pooled client
//! shared by every purge call. The client is built on first use, rebuilt when
//! the service is reconfigured and closed exactly once on shutdown.
//!
//! Pool limits:
//! - `max_total_connections` caps in-flight requests (semaphore permits)
//! - `connection_request_timeout` bounds the wait for a permit
//! - `max_connections_per_route` caps idle connections kept per host

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Url};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::config::HttpClientConfig;
use crate::errors::{InvalidatorError, InvalidatorResult};

/// Validated pool settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpClientSettings {
    pub configuration_id: String,
    pub connection_timeout: Duration,
    pub connection_request_timeout: Duration,
    pub socket_timeout: Duration,
    pub max_total_connections: usize,
    pub max_connections_per_route: usize,
    pub trust_all_certificates: bool,
}

impl HttpClientSettings {
    /// Validate configuration; every numeric value must be greater than zero
    /// and the connection pool must fit in a semaphore
    pub fn from_config(config: &HttpClientConfig) -> InvalidatorResult<Self> {
        let positive = |name: &str, value: u64| {
            if value > 0 {
                Ok(value)
            } else {
                Err(InvalidatorError::Configuration(format!(
                    "{} must be greater than 0 (configuration id: {})",
                    name, config.configuration_id
                )))
            }
        };

        Ok(Self {
            configuration_id: config.configuration_id.clone(),
            connection_timeout: Duration::from_millis(positive(
                "connection_timeout",
                config.connection_timeout_ms,
            )?),
            connection_request_timeout: Duration::from_millis(positive(
                "connection_request_timeout",
                config.connection_request_timeout_ms,
            )?),
            socket_timeout: Duration::from_millis(positive(
                "socket_timeout",
                config.socket_timeout_ms,
            )?),
            max_total_connections: bounded_permits(
                config,
                positive("max_total_connections", config.max_total_connections)?,
            )?,
            max_connections_per_route: positive(
                "max_connections_per_route",
                config.max_connections_per_route,
            )? as usize,
            trust_all_certificates: config.trust_all_certificates,
        })
    }
}

/// A permit pool larger than the semaphore limit cannot be built
fn bounded_permits(config: &HttpClientConfig, value: u64) -> InvalidatorResult<usize> {
    usize::try_from(value)
        .ok()
        .filter(|permits| *permits <= Semaphore::MAX_PERMITS)
        .ok_or_else(|| {
            InvalidatorError::Configuration(format!(
                "max_total_connections must be at most {} (configuration id: {})",
                Semaphore::MAX_PERMITS,
                config.configuration_id
            ))
        })
}

/// Status and body of a completed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

/// Connection-pooled client bounded by a permit pool
#[derive(Debug)]
pub struct PooledHttpClient {
    client: Client,
    permits: Semaphore,
    acquire_timeout: Duration,
}

impl PooledHttpClient {
    pub fn build(settings: &HttpClientSettings) -> InvalidatorResult<Self> {
        let client = Client::builder()
            .connect_timeout(settings.connection_timeout)
            .timeout(settings.socket_timeout)
            .pool_max_idle_per_host(settings.max_connections_per_route)
            .danger_accept_invalid_certs(settings.trust_all_certificates)
            .build()
            .map_err(|e| InvalidatorError::Configuration(format!("Cannot build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            permits: Semaphore::new(settings.max_total_connections),
            acquire_timeout: settings.connection_request_timeout,
        })
    }

    /// POST a JSON body with an `Authorization` header
    pub async fn post_json(
        &self,
        url: &Url,
        authorization: &str,
        body: Vec<u8>,
    ) -> InvalidatorResult<HttpReply> {
        let _permit = tokio::time::timeout(self.acquire_timeout, self.permits.acquire())
            .await
            .map_err(|_| {
                InvalidatorError::Timeout(format!(
                    "No pooled connection available within {:?}",
                    self.acquire_timeout
                ))
            })?
            .map_err(|_| InvalidatorError::Transport("HTTP client is closed".to_string()))?;

        let response = self
            .client
            .post(url.clone())
            .header(AUTHORIZATION, authorization)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpReply { status, body })
    }

    /// Reject all further requests
    pub fn close(&self) {
        self.permits.close();
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }
}

/// Owner of the shared pooled client for one configuration id
#[derive(Debug)]
pub struct HttpClientService {
    settings: RwLock<Arc<HttpClientSettings>>,
    client: RwLock<Option<Arc<PooledHttpClient>>>,
    closed: AtomicBool,
}

impl HttpClientService {
    pub fn new(config: &HttpClientConfig) -> InvalidatorResult<Self> {
        let settings = HttpClientSettings::from_config(config)?;
        info!("HTTP client service {} activated", settings.configuration_id);
        Ok(Self {
            settings: RwLock::new(Arc::new(settings)),
            client: RwLock::new(None),
            closed: AtomicBool::new(false),
        })
    }

    pub fn configuration_id(&self) -> String {
        self.settings().configuration_id.clone()
    }

    pub fn settings(&self) -> Arc<HttpClientSettings> {
        self.settings
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// The shared client, built on first use
    pub fn configured_client(&self) -> InvalidatorResult<Arc<PooledHttpClient>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(InvalidatorError::Transport(format!(
                "HTTP client service {} is shut down",
                self.configuration_id()
            )));
        }

        if let Some(client) = self.client.read().unwrap_or_else(|e| e.into_inner()).as_ref() {
            return Ok(client.clone());
        }

        let mut slot = self.client.write().unwrap_or_else(|e| e.into_inner());
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }
        let settings = self.settings();
        let client = Arc::new(PooledHttpClient::build(&settings)?);
        debug!("Built pooled HTTP client for {}", settings.configuration_id);
        *slot = Some(client.clone());
        Ok(client)
    }

    /// Swap in new settings; the current client is closed and rebuilt lazily
    pub fn reconfigure(&self, config: &HttpClientConfig) -> InvalidatorResult<()> {
        let settings = HttpClientSettings::from_config(config)?;
        *self.settings.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(settings);

        let previous = self.client.write().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(client) = previous {
            client.close();
        }
        info!("HTTP client service {} reconfigured", config.configuration_id);
        Ok(())
    }

    /// Close the pooled client; returns false if already shut down
    pub fn shutdown(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        let client = self.client.write().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(client) = client {
            client.close();
        }
        info!("HTTP client service {} shut down", self.configuration_id());
        true
    }
}
