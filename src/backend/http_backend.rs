use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use tracing::{debug, info, warn};

use super::traits::{Backend, StatusResponse, TransferProgress, UploadResponse};
use crate::config::ClientConfig;
use crate::controller::session::SelectedFile;
use crate::error::{ClientResult, TransportError};

/// Granularity of upload progress callbacks.
const UPLOAD_CHUNK_BYTES: usize = 64 * 1024;

pub struct HttpBackend {
    client: Client,
    base_url: String,
    upload_timeout: Duration,
    status_timeout: Duration,
}

impl HttpBackend {
    pub fn new(config: &ClientConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(client: Client, config: &ClientConfig) -> Self {
        Self {
            client,
            base_url: config.backend_url.trim_end_matches('/').to_string(),
            upload_timeout: config.upload_timeout(),
            status_timeout: config.status_timeout(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

/// Split the file into slices and report each one as it is handed to the
/// connection. `Bytes::slice` shares the buffer, nothing is copied.
fn progress_body(data: Bytes, progress: TransferProgress) -> Body {
    let total = data.len() as u64;
    let chunks: Vec<Bytes> = (0..data.len())
        .step_by(UPLOAD_CHUNK_BYTES)
        .map(|start| data.slice(start..(start + UPLOAD_CHUNK_BYTES).min(data.len())))
        .collect();

    let mut sent = 0u64;
    let stream = futures_util::stream::iter(chunks.into_iter().map(move |chunk| {
        sent += chunk.len() as u64;
        progress(sent, total);
        Ok::<Bytes, std::io::Error>(chunk)
    }));
    Body::wrap_stream(stream)
}

#[async_trait]
impl Backend for HttpBackend {
    async fn upload(
        &self,
        file: &SelectedFile,
        progress: TransferProgress,
    ) -> ClientResult<UploadResponse> {
        let url = self.endpoint("upload");
        let len = file.data.len() as u64;
        let part = Part::stream_with_length(progress_body(file.data.clone(), progress), len)
            .file_name(file.name.clone())
            .mime_str(&file.mime)?;
        let form = Form::new().part("file", part);

        info!("uploading {} ({} bytes) to {}", file.name, len, url);
        let resp = self
            .client
            .post(&url)
            .multipart(form)
            .timeout(self.upload_timeout)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            warn!("upload rejected status={}", status.as_u16());
            return Err(TransportError::Status(status.as_u16()).into());
        }

        let body: UploadResponse = resp.json().await?;
        debug!("upload response file_id={:?}", body.file_id);
        Ok(body)
    }

    async fn status(&self, file_id: &str) -> ClientResult<StatusResponse> {
        let resp = self
            .client
            .get(self.endpoint(&format!("status/{}", file_id)))
            .timeout(self.status_timeout)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            warn!("status check failed file_id={} status={}", file_id, status.as_u16());
            return Err(TransportError::Status(status.as_u16()).into());
        }

        let body: StatusResponse = resp.json().await?;
        debug!("status file_id={} -> {:?}", file_id, body.status);
        Ok(body)
    }

    async fn download(&self, url: &str) -> ClientResult<Bytes> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            warn!("download failed url={} status={}", url, status.as_u16());
            return Err(TransportError::Status(status.as_u16()).into());
        }
        Ok(resp.bytes().await?)
    }

    fn resolve_download_url(&self, relative: &str) -> String {
        if relative.starts_with("http://") || relative.starts_with("https://") {
            return relative.to_string();
        }
        if relative.starts_with('/') {
            format!("{}{}", self.base_url, relative)
        } else {
            format!("{}/{}", self.base_url, relative)
        }
    }
}
