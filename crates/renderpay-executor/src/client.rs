//! HTTP client for the generation executor.

use std::time::Duration;

use reqwest::Client;

use crate::envelope::{ExecutorSuccess, JobEnvelope, RawResponse};
use crate::error::ExecutorError;
use crate::sign::hmac_sha256_hex;
use crate::SIGNATURE_HEADER;

/// Signed HTTP adapter for the external generation executor.
///
/// One instance is shared across all jobs; the underlying `reqwest::Client`
/// pools connections. Each invocation is bounded by the configured timeout
/// and is never retried by this adapter.
#[derive(Debug, Clone)]
pub struct ExecutorClient {
    client: Client,
    endpoint: String,
    secret: String,
    timeout: Duration,
}

impl ExecutorClient {
    /// Create a new executor client.
    ///
    /// # Arguments
    ///
    /// * `endpoint` - Full URL of the executor's generate endpoint
    /// * `secret` - Shared signing secret
    /// * `timeout` - Ceiling for one invocation (several minutes in
    ///   production; the executor renders synchronously)
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built (should not happen with
    /// default settings).
    #[must_use]
    pub fn new(endpoint: impl Into<String>, secret: impl Into<String>, timeout: Duration) -> Self {
        // No client-wide timeout: the per-request timeout below is the only
        // ceiling, and it must cover the executor's full render time.
        let client = Client::builder()
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            endpoint: endpoint.into(),
            secret: secret.into(),
            timeout,
        }
    }

    /// The configured invocation ceiling.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Invoke the executor for one job. Exactly one attempt, bounded wait.
    ///
    /// # Errors
    ///
    /// Returns an [`ExecutorError`] classifying the failure: `timeout`,
    /// `transport_error`, `http_error`, `invalid_response`, or the remote
    /// side's own `{code, message}` passed through verbatim.
    pub async fn invoke(&self, envelope: &JobEnvelope) -> Result<ExecutorSuccess, ExecutorError> {
        // Serialize once; the signature covers these exact bytes.
        let body =
            serde_json::to_vec(envelope).map_err(|e| ExecutorError::Serialization(e.to_string()))?;
        let signature = hmac_sha256_hex(&self.secret, &body);

        tracing::debug!(
            job_id = %envelope.job_id,
            model = %envelope.model,
            endpoint = %self.endpoint,
            timeout_secs = %self.timeout.as_secs(),
            "Invoking generation executor"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("content-type", "application/json")
            .header(SIGNATURE_HEADER, signature)
            .body(body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ExecutorError::Timeout {
                        seconds: self.timeout.as_secs(),
                    }
                } else {
                    ExecutorError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExecutorError::Http {
                status: status.as_u16(),
            });
        }

        let raw: RawResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ExecutorError::Timeout {
                    seconds: self.timeout.as_secs(),
                }
            } else {
                ExecutorError::InvalidResponse(e.to_string())
            }
        })?;

        match raw.ok {
            Some(true) => {
                let output_url = raw.output_url.ok_or_else(|| {
                    ExecutorError::InvalidResponse("ok=true but output_url missing".into())
                })?;
                Ok(ExecutorSuccess {
                    output_url,
                    meta: raw.meta,
                })
            }
            Some(false) => {
                let error = raw.error.ok_or_else(|| {
                    ExecutorError::InvalidResponse("ok=false but error missing".into())
                })?;
                Err(ExecutorError::Remote {
                    code: error.code,
                    message: error.message,
                })
            }
            None => Err(ExecutorError::InvalidResponse(
                "response missing 'ok' discriminator".into(),
            )),
        }
    }
}
