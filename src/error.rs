// Error taxonomy for the upload controller and the cache router.

use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

/// Failures of the upload / poll flow. Every variant ends up as the
/// session's `message`; none escapes the controller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// No file selected, or a dropped file of an unsupported type.
    #[error("{0}")]
    Validation(String),

    /// The request never produced a usable answer.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Upload succeeded but the response carried no `file_id`.
    #[error("no file ID received")]
    MissingFileId,

    /// The backend reported status `error`.
    #[error("backend reported an error: {}", .0.as_deref().unwrap_or("unknown"))]
    Backend(Option<String>),

    /// The poll budget ran out before a terminal status.
    #[error("processing timed out after {0} status checks")]
    TimeoutExhausted(u32),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_decode() {
            TransportError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            TransportError::Status(status.as_u16())
        } else {
            TransportError::Network(e.to_string())
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Transport(e.into())
    }
}

impl ClientError {
    /// Text shown to the user for this failure.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Validation(msg) => msg.clone(),
            ClientError::Transport(TransportError::Timeout) => {
                "Upload timed out. Please try again or use a smaller file.".to_string()
            }
            ClientError::Transport(_) => "Error uploading file. Please try again.".to_string(),
            ClientError::MissingFileId => "Upload failed: no file ID received.".to_string(),
            ClientError::Backend(Some(msg)) if !msg.trim().is_empty() => msg.clone(),
            ClientError::Backend(_) => "Processing failed on the server.".to_string(),
            ClientError::TimeoutExhausted(_) => {
                "Processing timed out. The file may be too large.".to_string()
            }
        }
    }
}

/// Cache router failures that callers can observe. Cache write failures
/// are only ever logged and counted.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("failed to precache {url}: {reason}")]
    Precache { url: String, reason: String },

    #[error("cache write to {cache} failed: {reason}")]
    CacheWrite { cache: String, reason: String },

    #[error("invalid worker origin {0}")]
    InvalidOrigin(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages() {
        assert!(ClientError::Transport(TransportError::Timeout)
            .user_message()
            .contains("timed out"));
        assert!(ClientError::Transport(TransportError::Status(500))
            .user_message()
            .starts_with("Error uploading file"));
        assert_eq!(
            ClientError::Backend(Some("File must have at least 100 rows".into())).user_message(),
            "File must have at least 100 rows"
        );
        assert_eq!(
            ClientError::Backend(None).user_message(),
            "Processing failed on the server."
        );
        assert!(ClientError::TimeoutExhausted(60)
            .user_message()
            .contains("too large"));
    }
}
