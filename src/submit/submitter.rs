//! Rate-limited document submission.

use std::fmt;
use std::sync::Arc;

use reqwest::header::HeaderValue;
use reqwest::Url;
use serde::Serialize;
use tracing::{debug, info, instrument, trace, warn, Span};
use uuid::Uuid;

use super::transport::{HttpTransport, SubmissionRequest, Transport};
use crate::config::ApiConfig;
use crate::error::{CrptError, Result};
use crate::ratelimit::{AdmissionControl, RateLimiter};

/// Outcome of one completed exchange with the registration API.
///
/// Any received response is a completed submission, including 4xx and 5xx.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionResult {
    /// Identifier used to correlate log lines for this submission
    pub submission_id: Uuid,
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: String,
}

impl SubmissionResult {
    /// Whether the API answered with a 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Progress of a single submission. States only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SubmissionState {
    Pending,
    Acquiring,
    Serializing,
    Sending,
    Completed,
    Failed,
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubmissionState::Pending => "pending",
            SubmissionState::Acquiring => "acquiring",
            SubmissionState::Serializing => "serializing",
            SubmissionState::Sending => "sending",
            SubmissionState::Completed => "completed",
            SubmissionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Tracks and logs state transitions for one submission.
struct Progress {
    state: SubmissionState,
}

impl Progress {
    fn new() -> Self {
        trace!(state = %SubmissionState::Pending, "Submission created");
        Self {
            state: SubmissionState::Pending,
        }
    }

    fn advance(&mut self, next: SubmissionState) {
        debug_assert!(next > self.state, "{} -> {} moves backwards", self.state, next);
        trace!(from = %self.state, to = %next, "Submission state change");
        self.state = next;
    }

    fn fail(&mut self, error: &CrptError) {
        let stage = self.state;
        self.advance(SubmissionState::Failed);
        match error {
            CrptError::Transport { .. } => warn!(stage = %stage, error = %error, "Submission failed"),
            _ => debug!(stage = %stage, error = %error, "Submission failed"),
        }
    }
}

/// Encode a document as the JSON request body.
///
/// The output is deterministic: equal documents encode to identical bytes.
pub fn encode_payload<D: Serialize + ?Sized>(document: &D) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(document)?)
}

fn parse_endpoint(endpoint: &str) -> Result<Url> {
    let url = Url::parse(endpoint).map_err(|e| {
        CrptError::InvalidConfiguration(format!("invalid endpoint '{}': {}", endpoint, e))
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(CrptError::InvalidConfiguration(format!(
            "endpoint scheme must be http or https, got '{}'",
            other
        ))),
    }
}

/// Submits signed documents, one HTTP request per admitted call.
///
/// Every submission first waits on the limiter. Failures are returned as-is
/// and never retried.
pub struct DocumentSubmitter<A: AdmissionControl, T: Transport> {
    limiter: Arc<A>,
    transport: Arc<T>,
    endpoint: Url,
}

impl<A: AdmissionControl, T: Transport> Clone for DocumentSubmitter<A, T> {
    fn clone(&self) -> Self {
        Self {
            limiter: Arc::clone(&self.limiter),
            transport: Arc::clone(&self.transport),
            endpoint: self.endpoint.clone(),
        }
    }
}

impl<A: AdmissionControl, T: Transport> fmt::Debug for DocumentSubmitter<A, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentSubmitter")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl DocumentSubmitter<RateLimiter, HttpTransport> {
    /// Create a submitter that posts over HTTP using `config`.
    pub fn from_config(config: &ApiConfig, limiter: Arc<RateLimiter>) -> Result<Self> {
        let transport = HttpTransport::new(config)?;
        Self::new(limiter, transport, &config.endpoint)
    }
}

impl<A: AdmissionControl, T: Transport> DocumentSubmitter<A, T> {
    /// Create a submitter from its parts.
    ///
    /// Fails with [`CrptError::InvalidConfiguration`] unless `endpoint` is an
    /// absolute http(s) URL.
    pub fn new(limiter: Arc<A>, transport: T, endpoint: &str) -> Result<Self> {
        let endpoint = parse_endpoint(endpoint)?;
        Ok(Self {
            limiter,
            transport: Arc::new(transport),
            endpoint,
        })
    }

    /// Get the endpoint documents are posted to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Get the limiter gating this submitter.
    pub fn limiter(&self) -> &Arc<A> {
        &self.limiter
    }

    /// Wait for admission, then post `document` with `signature` attached.
    ///
    /// A signature that cannot be sent as a header value is rejected before
    /// admission. Serialization happens after admission, so a document that
    /// cannot be encoded still uses its slot but never reaches the network.
    #[instrument(
        skip(self, document, signature),
        fields(endpoint = %self.endpoint, submission_id = tracing::field::Empty)
    )]
    pub async fn submit<D>(&self, document: &D, signature: &str) -> Result<SubmissionResult>
    where
        D: Serialize + ?Sized + Sync,
    {
        let submission_id = Uuid::new_v4();
        Span::current().record("submission_id", tracing::field::display(submission_id));

        let mut progress = Progress::new();
        let outcome = self
            .run(&mut progress, submission_id, document, signature)
            .await;

        match &outcome {
            Ok(result) => {
                progress.advance(SubmissionState::Completed);
                info!(status = result.status, "Submission completed");
            }
            Err(e) => progress.fail(e),
        }

        outcome
    }

    async fn run<D>(
        &self,
        progress: &mut Progress,
        submission_id: Uuid,
        document: &D,
        signature: &str,
    ) -> Result<SubmissionResult>
    where
        D: Serialize + ?Sized + Sync,
    {
        let signature = HeaderValue::from_str(signature).map_err(|_| {
            CrptError::InvalidSignature(
                "signature contains characters not allowed in an HTTP header".to_string(),
            )
        })?;

        progress.advance(SubmissionState::Acquiring);
        self.limiter.acquire().await?;

        progress.advance(SubmissionState::Serializing);
        let body = encode_payload(document)?;

        progress.advance(SubmissionState::Sending);
        let reply = self
            .transport
            .send(SubmissionRequest {
                endpoint: self.endpoint.clone(),
                signature,
                body,
            })
            .await?;

        Ok(SubmissionResult {
            submission_id,
            status: reply.status,
            body: reply.body,
        })
    }
}
