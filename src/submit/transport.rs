//! Outbound transport for document submissions.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Url};
use tracing::trace;

use crate::config::ApiConfig;
use crate::error::{CrptError, Result};

/// Header carrying the caller-supplied document signature.
pub const SIGNATURE_HEADER: &str = "Signature";

/// One prepared submission, ready to be put on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRequest {
    /// Registration endpoint URL
    pub endpoint: Url,
    /// Opaque signature sent in the [`SIGNATURE_HEADER`] header
    pub signature: HeaderValue,
    /// Serialized JSON document
    pub body: Vec<u8>,
}

/// Any HTTP response, whatever its status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

/// Sends a prepared request and returns the response.
///
/// Implementations must return `Ok` for every response that was actually
/// received, and reserve `Err` for failures where no response exists.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: SubmissionRequest) -> Result<HttpReply>;
}

/// `reqwest`-backed transport.
///
/// The client is shared by every submission; each send builds its own request.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Build a transport using the timeouts and user agent from `config`.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| {
                CrptError::InvalidConfiguration(format!("failed to build HTTP client: {}", e))
            })?;

        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: SubmissionRequest) -> Result<HttpReply> {
        trace!(endpoint = %request.endpoint, bytes = request.body.len(), "Sending request");

        let response = self
            .client
            .post(request.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(SIGNATURE_HEADER, request.signature)
            .body(request.body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| CrptError::Transport {
            status: Some(status),
            reason: format!("failed to read response body: {}", e),
        })?;

        Ok(HttpReply { status, body })
    }
}
