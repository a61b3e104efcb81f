use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::senders::{SenderError, create_sender, validate_destination};

/// Anything that can push a message to an opaque destination URL
#[async_trait]
pub trait DestinationBackend: Send + Sync {
    async fn send(&self, url: &str, message: &str) -> Result<(), SenderError>;

    /// Syntax check only; never sends
    fn validate(&self, url: &str) -> Result<(), SenderError> {
        validate_destination(url)
    }
}

/// Parses the URL into a provider sender and posts over one shared client
pub struct UrlDestinationBackend {
    client: Client,
}

impl UrlDestinationBackend {
    pub fn new(request_timeout: Duration) -> Result<Self, SenderError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("uptime-monitor/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(SenderError::network)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl DestinationBackend for UrlDestinationBackend {
    async fn send(&self, url: &str, message: &str) -> Result<(), SenderError> {
        let sender = create_sender(url)?;
        tracing::debug!(service = sender.service(), "Sending notification");
        sender.send(&self.client, message).await
    }
}
