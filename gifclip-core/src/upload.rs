//! Hand-off of finished GIFs to the sharing service

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::UploadTarget;
use crate::error::{ClipError, Result};

/// Public location of an uploaded artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    /// Share page URL
    pub url: String,
    /// Direct CDN URL of the GIF, when the service provides one
    #[serde(default)]
    pub cdn_url: Option<String>,
    /// Service-side identifier
    #[serde(default)]
    pub id: Option<String>,
}

/// Accepts a finished artifact and returns where it can be viewed
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, artifact: &Path) -> Result<UploadReceipt>;
}

/// Multipart upload to the gif-clipper API (`POST /api/gifs`)
pub struct HttpUploader {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpUploader {
    /// Create an uploader for the service at `api_url`
    pub fn new(api_url: &str, timeout: Duration) -> Result<Self> {
        let base = api_url.trim_end_matches('/');
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ClipError::config(format!(
                "Upload API URL must be http(s): {}",
                api_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("gifclip/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/api/gifs", base),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Uploader for HttpUploader {
    async fn upload(&self, artifact: &Path) -> Result<UploadReceipt> {
        let bytes = tokio::fs::read(artifact).await?;
        let filename = artifact
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "clip.gif".to_string());

        info!("Uploading {} ({} bytes) to {}", filename, bytes.len(), self.endpoint);

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename)
            .mime_str("image/gif")?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClipError::upload(format!(
                "Server returned {}: {}",
                status,
                body.trim()
            )));
        }

        let receipt: UploadReceipt = response.json().await?;
        debug!("Upload receipt: {:?}", receipt);
        info!("Uploaded: {}", receipt.url);
        Ok(receipt)
    }
}

/// Keeps the artifact on disk and reports its `file://` URL
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalUploader;

#[async_trait]
impl Uploader for LocalUploader {
    async fn upload(&self, artifact: &Path) -> Result<UploadReceipt> {
        let absolute = tokio::fs::canonicalize(artifact).await?;
        Ok(UploadReceipt {
            url: format!("file://{}", absolute.display()),
            cdn_url: None,
            id: None,
        })
    }
}

/// Build the uploader for a configured destination
pub fn uploader_for(target: &UploadTarget) -> Result<Arc<dyn Uploader>> {
    match target {
        UploadTarget::Local => Ok(Arc::new(LocalUploader)),
        UploadTarget::Remote { api_url, .. } => {
            Ok(Arc::new(HttpUploader::new(api_url, target.timeout())?))
        }
    }
}
