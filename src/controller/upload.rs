// Upload controller: drives upload, status polling and completion for one session.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::progress::{poll_progress, upload_progress, UPLOAD_PHASE_END};
use super::session::{FileOrigin, SelectedFile, SessionSnapshot, UploadSession, UploadStatus};
use crate::backend::traits::{Backend, ProcessingStatus, TransferProgress};
use crate::config::ClientConfig;
use crate::detect::file_type::is_accepted_mime;
use crate::error::{ClientError, ClientResult};

pub const NO_FILE_MESSAGE: &str = "Please select a file first.";
pub const UNSUPPORTED_DROP_MESSAGE: &str = "Please drop a CSV or Excel file (.csv, .xls, .xlsx).";
pub const UPLOADING_MESSAGE: &str = "Uploading file...";
pub const PROCESSING_MESSAGE: &str = "Processing file...";
pub const COMPLETED_MESSAGE: &str = "File processed successfully!";

pub struct UploadController {
    backend: Arc<dyn Backend>,
    poll_interval: Duration,
    max_poll_attempts: u32,
    session: Mutex<UploadSession>,
    updates: watch::Sender<SessionSnapshot>,
}

impl UploadController {
    pub fn new(backend: Arc<dyn Backend>, config: &ClientConfig) -> Self {
        let (updates, _) = watch::channel(SessionSnapshot::default());
        Self {
            backend,
            poll_interval: config.poll_interval(),
            max_poll_attempts: config.max_poll_attempts,
            session: Mutex::new(UploadSession::default()),
            updates,
        }
    }

    /// Receive every state transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.updates.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.lock().snapshot()
    }

    /// Whether the upload action should be offered right now.
    pub fn can_start(&self) -> bool {
        let session = self.session.lock();
        session.selected_file.is_some() && !session.status.is_active()
    }

    pub fn current_attempt(&self) -> u64 {
        self.session.lock().attempt
    }

    /// Select a file. Drops are restricted to spreadsheet types; a rejected
    /// drop only updates the message and keeps the previous selection.
    pub fn select_file(&self, file: SelectedFile, origin: FileOrigin) -> ClientResult<()> {
        if origin == FileOrigin::DragDrop && !is_accepted_mime(&file.mime) {
            info!("rejected dropped file {} type={}", file.name, file.mime);
            let err = ClientError::Validation(UNSUPPORTED_DROP_MESSAGE.to_string());
            self.mutate(|s| s.message = err.user_message());
            return Err(err);
        }

        debug!("selected {:?} via {:?}", file, origin);
        self.mutate(|s| {
            s.selected_file = Some(file);
            s.message.clear();
            s.download_url = None;
        });
        Ok(())
    }

    /// Run one full attempt: upload, poll until a terminal status, record the
    /// outcome. Failures end up in the session, never in the return value.
    ///
    /// Starting while another attempt is in flight supersedes it: the older
    /// attempt keeps running until its pending request settles, but none of
    /// its results are applied.
    pub async fn start_upload(self: &Arc<Self>) -> SessionSnapshot {
        let (attempt, file) = match self.begin_attempt() {
            Ok(started) => started,
            Err(e) => {
                warn!("upload not started: {}", e);
                self.mutate(|s| s.message = e.user_message());
                return self.snapshot();
            }
        };

        if let Err(e) = self.run_attempt(attempt, file).await {
            warn!("upload attempt {} failed: {}", attempt, e);
            self.apply(attempt, |s| {
                s.status = UploadStatus::Error;
                s.message = e.user_message();
                s.download_url = None;
            });
        }

        self.snapshot()
    }

    /// Back to `idle` with nothing selected. Abandons any attempt in flight.
    pub fn reset(&self) {
        self.mutate(|s| {
            let next = s.attempt + 1;
            *s = UploadSession {
                attempt: next,
                ..UploadSession::default()
            };
        });
    }

    fn begin_attempt(&self) -> ClientResult<(u64, SelectedFile)> {
        let mut session = self.session.lock();
        let file = session
            .selected_file
            .clone()
            .ok_or_else(|| ClientError::Validation(NO_FILE_MESSAGE.to_string()))?;

        if session.status.is_active() {
            info!("attempt {} superseded by a new upload", session.attempt);
        }

        session.attempt += 1;
        session.status = UploadStatus::Uploading;
        session.progress = 0;
        session.message = UPLOADING_MESSAGE.to_string();
        session.file_id = None;
        session.download_url = None;
        self.updates.send_replace(session.snapshot());

        Ok((session.attempt, file))
    }

    async fn run_attempt(self: &Arc<Self>, attempt: u64, file: SelectedFile) -> ClientResult<()> {
        let weak = Arc::downgrade(self);
        let progress: TransferProgress = Arc::new(move |sent: u64, total: u64| {
            if let Some(this) = weak.upgrade() {
                let value = upload_progress(sent, total);
                this.apply(attempt, |s| s.raise_progress(value));
            }
        });

        let response = self.backend.upload(&file, progress).await?;
        let file_id = response
            .file_id
            .filter(|id| !id.is_empty())
            .ok_or(ClientError::MissingFileId)?;
        info!("attempt {} uploaded {} as file_id={}", attempt, file.name, file_id);

        let message = response
            .message
            .unwrap_or_else(|| PROCESSING_MESSAGE.to_string());
        let current = self.apply(attempt, |s| {
            s.status = UploadStatus::Processing;
            s.file_id = Some(file_id.clone());
            s.raise_progress(UPLOAD_PHASE_END);
            s.message = message;
        });
        if !current {
            return Ok(());
        }

        self.poll(attempt, &file_id).await
    }

    /// Sequential status checks. A failed check is transient but still
    /// spends one attempt; polling ends on a terminal status, when the
    /// budget runs out, or when the attempt is no longer current.
    async fn poll(&self, attempt: u64, file_id: &str) -> ClientResult<()> {
        for checks in 1..=self.max_poll_attempts {
            if !self.is_current(attempt) {
                debug!("attempt {} abandoned, polling stopped", attempt);
                return Ok(());
            }
            self.apply(attempt, |s| s.raise_progress(poll_progress(checks)));

            match self.backend.status(file_id).await {
                Ok(resp) => match resp.status {
                    ProcessingStatus::Processing => {
                        debug!("file_id={} still processing (check {})", file_id, checks);
                    }
                    ProcessingStatus::Completed => {
                        let download_url = resp
                            .download_url
                            .filter(|u| !u.is_empty())
                            .map(|u| self.backend.resolve_download_url(&u));
                        let message = resp
                            .message
                            .unwrap_or_else(|| COMPLETED_MESSAGE.to_string());
                        info!("file_id={} completed after {} checks", file_id, checks);
                        self.apply(attempt, |s| {
                            s.status = UploadStatus::Completed;
                            s.progress = 100;
                            s.message = message;
                            s.download_url = download_url;
                        });
                        return Ok(());
                    }
                    ProcessingStatus::Error => {
                        return Err(ClientError::Backend(resp.message));
                    }
                },
                Err(e) => {
                    warn!("status check {} for file_id={} failed: {}", checks, file_id, e);
                }
            }

            if checks < self.max_poll_attempts {
                tokio::time::sleep(self.poll_interval).await;
            }
        }

        Err(ClientError::TimeoutExhausted(self.max_poll_attempts))
    }

    fn is_current(&self, attempt: u64) -> bool {
        self.session.lock().attempt == attempt
    }

    /// Mutate the session on behalf of `attempt`. Results of a stale attempt
    /// are dropped; returns whether the change was applied.
    fn apply(&self, attempt: u64, f: impl FnOnce(&mut UploadSession)) -> bool {
        let mut session = self.session.lock();
        if session.attempt != attempt {
            debug!(
                "discarding update from attempt {} (current {})",
                attempt, session.attempt
            );
            return false;
        }
        f(&mut session);
        self.updates.send_replace(session.snapshot());
        true
    }

    fn mutate(&self, f: impl FnOnce(&mut UploadSession)) {
        let mut session = self.session.lock();
        f(&mut session);
        self.updates.send_replace(session.snapshot());
    }
}
