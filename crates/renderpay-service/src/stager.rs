//! Blob stager seam.
//!
//! Inputs are uploaded to temporary object storage before the generation
//! request is made; the executor fetches them through time-boxed signed
//! read URLs. The stager that produces those URLs is an external
//! collaborator, so it sits behind a trait the saga (and tests) can swap.

use async_trait::async_trait;

/// Error produced when an input path could not be staged.
///
/// Staging happens after the debit, so the saga treats this as an execution
/// failure: the job settles `failed` and the charge is refunded.
#[derive(Debug, Clone, thiserror::Error)]
#[error("failed to stage input '{path}': {message}")]
pub struct StageError {
    /// The input path that failed.
    pub path: String,
    /// Why staging failed.
    pub message: String,
}

/// Produces signed URLs for opaque blob paths.
#[async_trait]
pub trait BlobStager: Send + Sync {
    /// Obtain a time-boxed readable URL for a stored input path.
    ///
    /// # Errors
    ///
    /// Returns a `StageError` when the URL could not be produced.
    async fn stage_read_url(&self, path: &str) -> Result<String, StageError>;
}

/// HTTP presigner client.
///
/// Calls the storage service's presign endpoint with the blob path and
/// receives a signed read URL back.
#[derive(Debug, Clone)]
pub struct HttpStager {
    client: reqwest::Client,
    presign_url: String,
}

#[derive(Debug, serde::Serialize)]
struct PresignRequest<'a> {
    path: &'a str,
    mode: &'static str,
}

#[derive(Debug, serde::Deserialize)]
struct PresignResponse {
    url: String,
}

impl HttpStager {
    /// Create a new presigner client.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built (should not happen with
    /// default settings).
    #[must_use]
    pub fn new(presign_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            presign_url: presign_url.into(),
        }
    }
}

#[async_trait]
impl BlobStager for HttpStager {
    async fn stage_read_url(&self, path: &str) -> Result<String, StageError> {
        let response = self
            .client
            .post(&self.presign_url)
            .json(&PresignRequest { path, mode: "read" })
            .send()
            .await
            .map_err(|e| StageError {
                path: path.to_string(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(StageError {
                path: path.to_string(),
                message: format!("presign endpoint returned HTTP {}", response.status()),
            });
        }

        let body: PresignResponse = response.json().await.map_err(|e| StageError {
            path: path.to_string(),
            message: e.to_string(),
        })?;

        Ok(body.url)
    }
}

/// Passthrough stager for local setups where input paths are already URLs.
#[derive(Debug, Clone, Default)]
pub struct DirectStager;

#[async_trait]
impl BlobStager for DirectStager {
    async fn stage_read_url(&self, path: &str) -> Result<String, StageError> {
        Ok(path.to_string())
    }
}
