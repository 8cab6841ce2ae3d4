//! Download job wrapping a back-end's [`DownloadBackend`] (`spec.md` §4.7).

use storage_core::domain::{JobId, PeerName, StorageError};
use storage_core::ports::DownloadBackend;
use tokio::sync::Mutex;

use super::terminal::TerminalGuard;

/// Terminal operations (`read_all`, `cancel`, `report_complete`,
/// `report_error`) are mutually exclusive, matching [`super::UploadJob`].
pub struct DownloadJob {
    id: JobId,
    peer: PeerName,
    backend: Mutex<Option<Box<dyn DownloadBackend>>>,
    guard: TerminalGuard,
}

impl DownloadJob {
    pub fn new(id: JobId, peer: PeerName, backend: Box<dyn DownloadBackend>) -> Self {
        Self {
            id,
            peer,
            backend: Mutex::new(Some(backend)),
            guard: TerminalGuard::new(),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn peer(&self) -> &PeerName {
        &self.peer
    }

    /// Reads the full content to stream to the peer (`spec.md` §4.1
    /// `Download`). Returns `Cancelled` if another terminal operation
    /// already ran for this job.
    pub async fn read_all(&self) -> Result<Vec<u8>, StorageError> {
        if !self.guard.take() {
            return Err(StorageError::Cancelled);
        }
        match self.backend.lock().await.take() {
            Some(backend) => backend.read_all().await,
            None => Err(StorageError::LogicError("download already finalized".into())),
        }
    }

    /// Cancels the download. Idempotent.
    pub async fn cancel(&self) {
        if !self.guard.take() {
            return;
        }
        if let Some(backend) = self.backend.lock().await.take() {
            backend.cancel().await;
        }
    }

    /// Reports the transfer already completed out of band (the peer
    /// drained the socket and closed) without invoking the backend again.
    pub async fn report_complete(&self) {
        if !self.guard.take() {
            return;
        }
        self.backend.lock().await.take();
    }

    pub async fn report_error(&self, _error: StorageError) {
        self.cancel().await;
    }
}
