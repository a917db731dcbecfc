// Upload session data: the state one upload lifecycle moves through.

use std::fmt;
use std::path::Path;

use anyhow::{anyhow, Result};
use bytes::Bytes;

use crate::detect::file_type::detect_file_kind;

/// Bytes inspected when sniffing the file type.
const SNIFF_BYTES: usize = 512;

/// A file chosen by the user. The payload is reference-counted, so cloning
/// a selection for an upload attempt does not copy it.
#[derive(Clone)]
pub struct SelectedFile {
    pub name: String,
    /// Declared type, as a browser would report it for the file.
    pub mime: String,
    pub data: Bytes,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            data: data.into(),
        }
    }

    /// Read a file from disk and derive its declared type from its content and name.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("path has no usable file name: {}", path.display()))?
            .to_string();
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| anyhow!("failed to read {}: {}", path.display(), e))?;
        let head = &data[..data.len().min(SNIFF_BYTES)];
        let mime = detect_file_kind(head, &name).mime().to_string();
        Ok(Self::new(name, mime, data))
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for SelectedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedFile")
            .field("name", &self.name)
            .field("mime", &self.mime)
            .field("len", &self.data.len())
            .finish()
    }
}

/// How the file reached the controller. Only drops are type-filtered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOrigin {
    Picker,
    DragDrop,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UploadStatus {
    #[default]
    Idle,
    Uploading,
    Processing,
    Completed,
    Error,
}

impl UploadStatus {
    /// An attempt is in flight.
    pub fn is_active(self) -> bool {
        matches!(self, UploadStatus::Uploading | UploadStatus::Processing)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, UploadStatus::Completed | UploadStatus::Error)
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UploadStatus::Idle => "idle",
            UploadStatus::Uploading => "uploading",
            UploadStatus::Processing => "processing",
            UploadStatus::Completed => "completed",
            UploadStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Mutable session owned by the controller.
#[derive(Debug, Default)]
pub(crate) struct UploadSession {
    pub(crate) selected_file: Option<SelectedFile>,
    pub(crate) file_id: Option<String>,
    pub(crate) status: UploadStatus,
    pub(crate) progress: u8,
    pub(crate) message: String,
    pub(crate) download_url: Option<String>,
    /// Identifies the current attempt; bumped by every start and reset.
    pub(crate) attempt: u64,
}

impl UploadSession {
    /// Progress only moves forward within an attempt.
    pub(crate) fn raise_progress(&mut self, value: u8) {
        let value = value.min(100);
        if value > self.progress {
            self.progress = value;
        }
    }

    pub(crate) fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            progress: self.progress,
            message: self.message.clone(),
            file_name: self.selected_file.as_ref().map(|f| f.name.clone()),
            file_id: self.file_id.clone(),
            download_url: self.download_url.clone(),
        }
    }
}

/// What the presentation layer renders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub status: UploadStatus,
    pub progress: u8,
    pub message: String,
    pub file_name: Option<String>,
    pub file_id: Option<String>,
    pub download_url: Option<String>,
}
