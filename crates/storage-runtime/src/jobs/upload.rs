//! Upload job: spools a peer's bytes to a named temp file, then hands the
//! path to the backend while the file is still alive on disk (`spec.md`
//! §4.7 "Tempfile variant").
//!
//! Grounded on
//! `examples/original_source/src/provider/internal/TempfileUploadJobImpl.cpp`
//! (`on_ready_read`/`on_read_channel_finished`/`drain`): the C++ original
//! keeps its `QTemporaryFile` open and named for the whole handoff window
//! and only lets it go out of scope (which removes it) once the backend's
//! `finish`/`cancel` has run. The temp file here follows the same rule:
//! `spool.tempfile` stays `Some` until after the backend call returns.

use std::path::PathBuf;
use std::time::Duration;

use storage_core::domain::{Item, JobId, PeerName, StorageError};
use storage_core::ports::UploadBackend;
use tokio::io::AsyncRead;
use tokio::sync::{Mutex, Notify};

use super::terminal::TerminalGuard;

struct Spool {
    file: tokio::fs::File,
    tempfile: Option<tempfile::NamedTempFile>,
    closed: bool,
    io_error: Option<std::io::Error>,
}

impl Spool {
    fn path(&self) -> PathBuf {
        self.tempfile
            .as_ref()
            .expect("spool path read after finalization")
            .path()
            .to_path_buf()
    }
}

fn spool_result(spool: &Spool) -> Result<(), StorageError> {
    match &spool.io_error {
        Some(e) => Err(StorageError::Resource {
            errno: e.raw_os_error().unwrap_or(0),
            message: e.to_string(),
        }),
        None => Ok(()),
    }
}

/// A live upload: a spool file plus the backend that will consume it.
///
/// Terminal operations (`finish`, `cancel`, `report_error`) are mutually
/// exclusive — whichever runs first wins, and the others become no-ops
/// (`spec.md` §4.7).
pub struct UploadJob {
    id: JobId,
    peer: PeerName,
    drain_grace: Duration,
    spool: Mutex<Spool>,
    spool_done: Notify,
    backend: Mutex<Option<Box<dyn UploadBackend>>>,
    guard: TerminalGuard,
}

impl UploadJob {
    fn new(
        id: JobId,
        peer: PeerName,
        backend: Box<dyn UploadBackend>,
        spool_dir: Option<PathBuf>,
    ) -> std::io::Result<Self> {
        let tempfile = match spool_dir {
            Some(dir) => tempfile::NamedTempFile::new_in(dir)?,
            None => tempfile::NamedTempFile::new()?,
        };
        let cloned = tempfile.as_file().try_clone()?;

        Ok(Self {
            id,
            peer,
            drain_grace: Duration::ZERO,
            spool: Mutex::new(Spool {
                file: tokio::fs::File::from_std(cloned),
                tempfile: Some(tempfile),
                closed: false,
                io_error: None,
            }),
            spool_done: Notify::new(),
            backend: Mutex::new(Some(backend)),
            guard: TerminalGuard::new(),
        })
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn peer(&self) -> &PeerName {
        &self.peer
    }

    /// Overrides the default zero-wait `drain()` grace period (`spec.md`
    /// §9 Open Question: the original throws `LogicException` the instant
    /// `finish()` observes an open socket; a non-zero grace lets a caller
    /// tolerate a peer that's a little slow closing its write end).
    pub fn with_drain_grace(mut self, grace: Duration) -> Self {
        self.drain_grace = grace;
        self
    }

    /// Copies `reader` into the spool file until EOF, then marks the
    /// upload's write side closed. Call exactly once, from the task
    /// driving the peer's transfer pipe.
    pub async fn spool_from(&self, mut reader: impl AsyncRead + Unpin) {
        let mut spool = self.spool.lock().await;
        let result = tokio::io::copy(&mut reader, &mut spool.file).await;
        spool.closed = true;
        if let Err(e) = result {
            spool.io_error = Some(e);
        }
        drop(spool);
        self.spool_done.notify_waiters();
    }

    async fn drain(&self) -> Result<(), StorageError> {
        {
            let spool = self.spool.lock().await;
            if spool.closed {
                return spool_result(&spool);
            }
        }
        if !self.drain_grace.is_zero() {
            let _ = tokio::time::timeout(self.drain_grace, self.spool_done.notified()).await;
        }
        let spool = self.spool.lock().await;
        if !spool.closed {
            return Err(StorageError::LogicError("socket not closed".into()));
        }
        spool_result(&spool)
    }

    /// Finalizes the upload: drains the spool, then hands its path to the
    /// backend. The spool file stays on disk, named, until the backend
    /// call returns — only then is it removed. Returns `Cancelled` if
    /// another terminal operation already ran for this job.
    pub async fn finish(&self) -> Result<Item, StorageError> {
        if !self.guard.take() {
            return Err(StorageError::Cancelled);
        }
        self.drain().await?;
        let path = self.spool.lock().await.path();
        let result = match self.backend.lock().await.take() {
            Some(backend) => backend.finish(&path).await,
            None => Err(StorageError::LogicError("upload already finalized".into())),
        };
        self.spool.lock().await.tempfile.take();
        result
    }

    /// Cancels the upload. Idempotent: a later call, or a call that lost
    /// the race to `finish`, is a no-op.
    pub async fn cancel(&self) {
        if !self.guard.take() {
            return;
        }
        if let Some(backend) = self.backend.lock().await.take() {
            backend.cancel().await;
        }
        self.spool.lock().await.tempfile.take();
    }

    /// Reports an error observed before the peer ever reached
    /// `FinishUpload`/`CancelUpload`; equivalent to `cancel` from the
    /// backend's point of view (`spec.md` §4.7).
    pub async fn report_error(&self, _error: StorageError) {
        self.cancel().await;
    }
}

/// Builds the tempfile-spooling [`UploadJob`] — the only upload strategy
/// this runtime implements (`spec.md` §4.7).
pub struct TempfileUploadJob;

impl TempfileUploadJob {
    /// `spool_dir` should come from `Provider::spool_dir` so the spooled
    /// file and the eventual destination share a filesystem (`spec.md`
    /// §4.9 "Atomic update"); `None` falls back to the OS default temp
    /// directory.
    pub fn new(
        id: JobId,
        peer: PeerName,
        backend: Box<dyn UploadBackend>,
        spool_dir: Option<PathBuf>,
    ) -> std::io::Result<UploadJob> {
        UploadJob::new(id, peer, backend, spool_dir)
    }
}
