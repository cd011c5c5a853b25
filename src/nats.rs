//! NATS client abstraction for event sources and job transport

use async_nats::{Client, ConnectOptions, Subscriber};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::errors::{InvalidatorError, InvalidatorResult};

/// Configuration for NATS connection
#[derive(Debug, Clone)]
pub struct NatsConfig {
    /// NATS server URLs
    pub servers: Vec<String>,
    /// Client name
    pub name: String,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Request timeout
    pub request_timeout: Duration,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            servers: vec!["nats://localhost:4222".to_string()],
            name: "cdn-invalidator".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// NATS client wrapper
#[derive(Clone)]
pub struct NatsClient {
    client: Client,
}

impl NatsClient {
    /// Connect with the given configuration
    pub async fn new(config: NatsConfig) -> InvalidatorResult<Self> {
        let connect_options = ConnectOptions::new()
            .name(&config.name)
            .connection_timeout(config.connect_timeout)
            .request_timeout(Some(config.request_timeout));

        let client = async_nats::connect_with_options(config.servers.join(","), connect_options)
            .await
            .map_err(|e| InvalidatorError::NatsConnection(e.to_string()))?;

        info!("Connected to NATS at {:?}", config.servers);

        Ok(Self { client })
    }

    /// Subscribe to a subject
    pub async fn subscribe(&self, subject: &str) -> InvalidatorResult<Subscriber> {
        let subscriber = self
            .client
            .subscribe(subject.to_string())
            .await
            .map_err(|e| InvalidatorError::NatsSubscribe(e.to_string()))?;

        info!("Subscribed to subject: {}", subject);
        Ok(subscriber)
    }

    /// JetStream context over this connection
    pub fn jetstream(&self) -> async_nats::jetstream::Context {
        async_nats::jetstream::new(self.client.clone())
    }
}

/// Trait for handling typed messages from NATS
#[async_trait::async_trait]
pub trait MessageHandler: Send + Sync {
    /// The type of message this handler processes
    type Message: DeserializeOwned + Send;

    /// Handle a message
    async fn handle(&self, message: Self::Message) -> InvalidatorResult<()>;

    /// Get the subject this handler subscribes to
    fn subject(&self) -> String;
}

/// Message processor that runs handlers for subscriptions
pub struct MessageProcessor {
    client: NatsClient,
}

impl MessageProcessor {
    /// Create a new message processor
    pub fn new(client: NatsClient) -> Self {
        Self { client }
    }

    /// Subscribe `handler` and feed it decoded messages on a background task
    pub async fn run_handler<H>(&self, handler: Arc<H>) -> InvalidatorResult<JoinHandle<()>>
    where
        H: MessageHandler + 'static,
    {
        let subject = handler.subject();
        let mut subscriber = self.client.subscribe(&subject).await?;

        let task = tokio::spawn(async move {
            while let Some(msg) = subscriber.next().await {
                match serde_json::from_slice::<H::Message>(&msg.payload) {
                    Ok(message) => {
                        if let Err(e) = handler.handle(message).await {
                            error!("Handler error for subject {}: {}", subject, e);
                        }
                    }
                    Err(e) => {
                        error!("Failed to deserialize message on {}: {}", subject, e);
                    }
                }
            }
            info!("Subscription to {} closed", subject);
        });

        Ok(task)
    }
}
