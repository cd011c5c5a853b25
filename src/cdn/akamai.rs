// Copyright (c) 2025 - Cowboy AI, Inc.
//! Akamai Fast Purge Client
//!
//! Purges by cache tag, CP code or URL through the CCU v3 API. The client
//! holds an immutable configuration snapshot that [`AkamaiInvalidationService::activate`]
//! replaces wholesale; a purge in flight keeps using the snapshot it started
//! with.

use async_trait::async_trait;
use reqwest::Url;
use serde::Serialize;
use std::sync::{Arc, RwLock};
use tracing::{error, info, trace, warn};

use super::edgegrid::{ClientCredential, EdgeGridSigner};
use super::http_client::HttpClientService;
use super::{CdnInvalidationService, InvalidationBatch, PurgeKind};
use crate::config::{AkamaiConfig, Network, PurgeType};
use crate::errors::{InvalidatorError, InvalidatorResult};
use crate::registry::ServiceRegistry;

/// Provider accepted the request iff `200 <= status < 300`
pub fn is_success_status(status: u16) -> bool {
    (200..300).contains(&status)
}

#[derive(Serialize)]
struct PurgeRequestBody<'a> {
    objects: &'a InvalidationBatch,
}

#[derive(Debug)]
struct AkamaiState {
    enabled: bool,
    configuration_id: String,
    http_client_configuration_id: String,
    scheme: String,
    network: Network,
    purge_type: PurgeType,
    credential: Option<ClientCredential>,
}

impl AkamaiState {
    fn from_config(config: &AkamaiConfig) -> Self {
        let credential = if !config.enabled {
            None
        } else if mandatory_fields_available(config) {
            Some(ClientCredential::new(
                config.access_token.trim(),
                config.client_token.trim(),
                config.client_secret.trim(),
                config.hostname.trim(),
            ))
        } else {
            error!(
                "Akamai client {} is enabled but mandatory fields are missing; purges will fail",
                config.configuration_id
            );
            None
        };

        Self {
            enabled: config.enabled,
            configuration_id: config.configuration_id.clone(),
            http_client_configuration_id: config.http_client_configuration_id.clone(),
            scheme: config.scheme.trim().to_ascii_lowercase(),
            network: config.network,
            purge_type: config.purge_type,
            credential,
        }
    }

    fn purge_url(&self, credential: &ClientCredential, kind: PurgeKind) -> InvalidatorResult<Url> {
        let raw = format!(
            "{}://{}/ccu/v3/{}/{}/{}",
            self.scheme,
            credential.host(),
            self.purge_type,
            kind.service_segment(),
            self.network
        );
        Url::parse(&raw)
            .map_err(|e| InvalidatorError::Configuration(format!("Invalid purge url {}: {}", raw, e)))
    }
}

/// Every field needed to sign and route a request is present
pub fn mandatory_fields_available(config: &AkamaiConfig) -> bool {
    [
        &config.configuration_id,
        &config.http_client_configuration_id,
        &config.hostname,
        &config.access_token,
        &config.client_token,
        &config.client_secret,
    ]
    .iter()
    .all(|field| !field.trim().is_empty())
}

/// CCU v3 purge client
pub struct AkamaiInvalidationService {
    state: RwLock<Arc<AkamaiState>>,
    http_clients: Arc<ServiceRegistry<HttpClientService>>,
    signer: EdgeGridSigner,
}

impl AkamaiInvalidationService {
    pub fn new(config: &AkamaiConfig, http_clients: Arc<ServiceRegistry<HttpClientService>>) -> Self {
        let service = Self {
            state: RwLock::new(Arc::new(AkamaiState::from_config(config))),
            http_clients,
            signer: EdgeGridSigner::new(),
        };
        info!("Akamai client {} activated (enabled: {})", config.configuration_id, config.enabled);
        service
    }

    /// Replace the configuration snapshot
    pub fn activate(&self, config: &AkamaiConfig) {
        let state = Arc::new(AkamaiState::from_config(config));
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = state;
        info!("Akamai client {} reactivated (enabled: {})", config.configuration_id, config.enabled);
    }

    pub fn configuration_id(&self) -> String {
        self.snapshot().configuration_id.clone()
    }

    pub fn is_enabled(&self) -> bool {
        self.snapshot().enabled
    }

    fn snapshot(&self) -> Arc<AkamaiState> {
        self.state.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    async fn send(
        &self,
        state: &AkamaiState,
        kind: PurgeKind,
        items: &InvalidationBatch,
    ) -> InvalidatorResult<bool> {
        let credential = state.credential.as_ref().ok_or_else(|| {
            InvalidatorError::Configuration(format!(
                "Akamai client {} has no credential",
                state.configuration_id
            ))
        })?;
        let http = self
            .http_clients
            .get(&state.http_client_configuration_id)
            .ok_or_else(|| {
                InvalidatorError::Configuration(format!(
                    "HTTP client {} is not registered",
                    state.http_client_configuration_id
                ))
            })?
            .configured_client()?;

        let url = state.purge_url(credential, kind)?;
        let body = serde_json::to_vec(&PurgeRequestBody { objects: items })?;
        let authorization = self.signer.sign(credential, "POST", &url, &body)?;

        let reply = http.post_json(&url, &authorization, body).await?;
        trace!("Akamai response - status: {}, body: {}", reply.status, reply.body);

        let accepted = is_success_status(reply.status);
        if accepted {
            info!("Akamai purge by {} accepted for {:?}", kind, items);
        } else {
            warn!(
                "Akamai purge by {} rejected with status {} for {:?}",
                kind, reply.status, items
            );
        }
        Ok(accepted)
    }
}

#[async_trait]
impl CdnInvalidationService for AkamaiInvalidationService {
    async fn purge(&self, kind: PurgeKind, items: &InvalidationBatch) -> bool {
        let state = self.snapshot();
        if !state.enabled {
            warn!("Akamai client {} is disabled, skipping purge", state.configuration_id);
            return false;
        }
        if items.is_empty() {
            warn!("Nothing to purge by {}", kind);
            return false;
        }

        match self.send(&state, kind, items).await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("Akamai purge by {} failed for {:?}: {}", kind, items, e);
                false
            }
        }
    }
}
