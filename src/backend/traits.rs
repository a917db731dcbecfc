use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;

use crate::controller::session::SelectedFile;
use crate::error::ClientResult;

/// Raw transfer progress: `(bytes_sent, bytes_total)`.
pub type TransferProgress = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Body of `POST /upload`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub file_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Processing,
    Completed,
    Error,
}

/// Body of `GET /status/{file_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusResponse {
    pub status: ProcessingStatus,
    #[serde(default)]
    pub message: Option<String>,
    /// Relative to the backend base URL.
    #[serde(default)]
    pub download_url: Option<String>,
}

#[async_trait]
pub trait Backend: Send + Sync {
    async fn upload(
        &self,
        file: &SelectedFile,
        progress: TransferProgress,
    ) -> ClientResult<UploadResponse>;
    async fn status(&self, file_id: &str) -> ClientResult<StatusResponse>;
    async fn download(&self, url: &str) -> ClientResult<Bytes>;
    /// Turn a backend-relative path into an absolute URL.
    fn resolve_download_url(&self, relative: &str) -> String;
}
