//! Generation endpoint client.

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use futures_util::stream::BoxStream;

use crate::context::OutgoingPayload;
use crate::error::TransportError;
use crate::stream::TextFragments;

const CHAT_PATH: &str = "/api/chat";

/// Decoded text fragments of one generation response.
pub type FragmentStream = BoxStream<'static, Result<String, TransportError>>;

/// Opens a streaming generation for a payload.
///
/// Exactly one call per turn; implementations must not retry.
pub trait Generator: Send + Sync {
    fn open(
        &self,
        payload: &OutgoingPayload,
    ) -> impl Future<Output = Result<FragmentStream, TransportError>> + Send;
}

/// Streams replies from `POST {base_url}/api/chat`.
#[derive(Debug, Clone)]
pub struct HttpGenerator {
    endpoint: String,
    http: reqwest::Client,
}

impl HttpGenerator {
    /// `timeout` bounds the whole exchange, body included. `None` waits indefinitely.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            endpoint: format!("{}{CHAT_PATH}", base_url.trim_end_matches('/')),
            http,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Generator for HttpGenerator {
    async fn open(&self, payload: &OutgoingPayload) -> Result<FragmentStream, TransportError> {
        tracing::debug!(
            endpoint = %self.endpoint,
            messages = payload.messages.len(),
            is_report = payload.is_report,
            "opening generation stream"
        );

        let response = self
            .http
            .post(&self.endpoint)
            .json(payload)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(TransportError::http_status(status.as_u16(), &error_body));
        }

        Ok(TextFragments::new(response.bytes_stream()).boxed())
    }
}
