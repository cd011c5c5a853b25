// Copyright (c) 2025 - Cowboy AI, Inc.
//! CDN Invalidator Service
//!
//! Listens to repository change and replication events on NATS, queues
//! invalidation jobs on a JetStream work queue and purges the Akamai cache.
//!
//! - Events → NATS → Listener → JetStream job → Worker → Akamai Fast Purge
//!
//! Run with: cargo run --bin cdn-invalidator
//!
//! Prerequisites:
//! 1. NATS server with JetStream enabled (default: localhost:4222)
//! 2. Configuration in `CDN_INVALIDATOR_CONFIG` (JSON file) or environment
//!    variables (`AKAMAI_HOSTNAME`, `AKAMAI_CLIENT_SECRET`, ...)

use anyhow::{Context, Result};
use cdn_invalidator::{
    cdn::{AkamaiInvalidationService, CdnInvalidationService, CdnRegistry, HttpClientService},
    config::AppConfig,
    dispatch::DerivationDispatcher,
    jetstream::{create_job_consumer, create_job_stream, JetStreamJobManager, JobStreamConfig, JobWorker},
    jobs::{InvalidationJobConsumer, JobManager, JobRouter},
    links::{DomainExternalizer, LinkExternalizer, ResolverFactory, StaticResolverFactory},
    listeners::{JobOffloader, ReplicationEventListener, ResourceChangeListener},
    nats::{MessageProcessor, NatsClient},
    registry::ServiceRegistry,
    telemetry,
};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing();

    info!("Starting CDN Invalidator Service");

    let config = AppConfig::load().context("Failed to load configuration")?;
    info!("Configuration loaded:");
    info!("  - NATS: {:?}", config.nats.servers);
    info!("  - Job stream: {}", config.job_stream.stream_name);
    info!("  - HTTP clients: {}", config.http_clients.len());
    info!("  - Akamai: {:?}", config.akamai);
    info!("  - Job consumers: {}", config.job_consumers.len());

    // HTTP transports shared by every purge call of their Akamai clients
    let http_clients = Arc::new(ServiceRegistry::<HttpClientService>::new());
    let mut transports = Vec::with_capacity(config.http_clients.len());
    for http_config in &config.http_clients {
        let http_client = Arc::new(HttpClientService::new(http_config).with_context(|| {
            format!("Invalid HTTP client configuration {}", http_config.configuration_id)
        })?);
        http_clients.register(http_config.configuration_id.clone(), http_client.clone());
        transports.push(http_client);
    }

    let cdn_services = Arc::new(CdnRegistry::new());
    for akamai_config in &config.akamai {
        let akamai: Arc<dyn CdnInvalidationService> = Arc::new(AkamaiInvalidationService::new(
            akamai_config,
            http_clients.clone(),
        ));
        cdn_services.register(akamai_config.configuration_id.clone(), akamai);
    }

    let resolvers: Arc<dyn ResolverFactory> =
        Arc::new(StaticResolverFactory::from_mappings(&config.links.path_mappings));
    let externalizer: Arc<dyn LinkExternalizer> =
        Arc::new(DomainExternalizer::new(config.links.domains.clone()));
    let dispatcher = DerivationDispatcher::default();

    let consumers: Vec<_> = config
        .job_consumers
        .iter()
        .map(|consumer_config| {
            let consumer = InvalidationJobConsumer::new(
                cdn_services.clone(),
                resolvers.clone(),
                externalizer.clone(),
            )
            .with_dispatcher(dispatcher.clone());
            if let Err(e) = consumer.activate(consumer_config) {
                error!("Job consumer for {:?} disabled: {}", consumer_config.job_topics, e);
            }
            Arc::new(consumer)
        })
        .collect();
    let router = Arc::new(JobRouter::new(consumers));

    let nats = NatsClient::new(config.nats.to_nats_config())
        .await
        .context("Failed to connect to NATS")?;
    let jetstream = nats.jetstream();

    let job_stream = JobStreamConfig::from(&config.job_stream);
    let stream = create_job_stream(&jetstream, &job_stream)
        .await
        .context("Failed to create job stream")?;
    let pull_consumer = create_job_consumer(&stream, &job_stream)
        .await
        .context("Failed to create job consumer")?;

    let job_manager: Arc<dyn JobManager> =
        Arc::new(JetStreamJobManager::new(jetstream, job_stream.clone()));
    let offloader = JobOffloader::new(job_manager);
    let processor = MessageProcessor::new(nats.clone());

    for listener_config in &config.resource_change_listeners {
        let listener = Arc::new(ResourceChangeListener::new(offloader.clone()));
        if let Err(e) = listener.activate(listener_config) {
            error!("Resource change listener on {} disabled: {}", listener_config.listener.subject, e);
        }
        if listener.is_enabled() {
            processor
                .run_handler(listener)
                .await
                .context("Failed to subscribe resource change listener")?;
        }
    }

    for listener_config in &config.replication_listeners {
        let listener = Arc::new(ReplicationEventListener::new(offloader.clone()));
        if let Err(e) = listener.activate(listener_config) {
            error!("Replication listener on {} disabled: {}", listener_config.subject, e);
        }
        if listener.is_enabled() {
            processor
                .run_handler(listener)
                .await
                .context("Failed to subscribe replication listener")?;
        }
    }

    let worker = JobWorker::new(router, job_stream);
    info!("Starting job consumption...");

    tokio::select! {
        result = worker.run(pull_consumer) => {
            if let Err(e) = result {
                error!("Job worker stopped: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
        }
    }

    for transport in &transports {
        transport.shutdown();
    }
    info!("CDN Invalidator Service stopped");
    Ok(())
}
