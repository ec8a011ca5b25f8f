//! Download of payloads the service announced but did not inline.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use tracing::{debug, instrument};

use crate::error::TileError;

/// Fetches the body of a resolved tile from its URL.
#[async_trait]
pub trait PayloadLoader: Send + Sync {
    async fn load(&self, url: &str) -> Result<Bytes, TileError>;
}

/// [`PayloadLoader`] over HTTP.
pub struct HttpPayloadLoader {
    client: Client,
}

impl HttpPayloadLoader {
    pub fn new(timeout: Duration) -> Result<Self, TileError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PayloadLoader for HttpPayloadLoader {
    #[instrument(skip(self))]
    async fn load(&self, url: &str) -> Result<Bytes, TileError> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let body = response.bytes().await?;
        debug!(bytes = body.len(), "Downloaded payload");
        Ok(body)
    }
}
