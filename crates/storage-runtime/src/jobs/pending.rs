//! Per-peer job registry (`spec.md` §4.6).
//!
//! Grounded on
//! `examples/original_source/include/unity/storage/provider/internal/PendingJobs.h`:
//! jobs are keyed by id for lookup from the dispatcher, and the registry
//! also watches each job's owning peer so a disconnect cancels every job
//! that peer still had open.

use std::sync::Arc;

use dashmap::DashMap;
use storage_core::domain::{JobId, PeerName};
use tracing::info;

use super::{DownloadJob, TempfileUploadJob, UploadJob};
use crate::disconnect::DisconnectWatcher;

pub struct PendingJobs {
    uploads: DashMap<JobId, Arc<UploadJob>>,
    downloads: DashMap<JobId, Arc<DownloadJob>>,
    disconnect: Arc<DisconnectWatcher>,
}

impl PendingJobs {
    pub fn new(disconnect: Arc<DisconnectWatcher>) -> Self {
        Self {
            uploads: DashMap::new(),
            downloads: DashMap::new(),
            disconnect,
        }
    }

    pub async fn add_upload(&self, job: Arc<UploadJob>) {
        self.disconnect.watch(job.peer()).await;
        self.uploads.insert(job.id(), job);
    }

    pub fn get_upload(&self, id: &JobId) -> Option<Arc<UploadJob>> {
        self.uploads.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub async fn remove_upload(&self, id: &JobId) -> Option<Arc<UploadJob>> {
        let job = self.uploads.remove(id).map(|(_, job)| job);
        if let Some(job) = &job {
            self.disconnect.unwatch(job.peer()).await;
        }
        job
    }

    pub async fn add_download(&self, job: Arc<DownloadJob>) {
        self.disconnect.watch(job.peer()).await;
        self.downloads.insert(job.id(), job);
    }

    pub fn get_download(&self, id: &JobId) -> Option<Arc<DownloadJob>> {
        self.downloads.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub async fn remove_download(&self, id: &JobId) -> Option<Arc<DownloadJob>> {
        let job = self.downloads.remove(id).map(|(_, job)| job);
        if let Some(job) = &job {
            self.disconnect.unwatch(job.peer()).await;
        }
        job
    }

    /// Drains disconnect notifications, cancelling and dropping every job
    /// the disconnected peer still owned. Spawn once per process.
    pub async fn run_disconnect_handler(self: Arc<Self>) {
        let mut disconnects = self.disconnect.subscribe();
        while let Ok(peer) = disconnects.recv().await {
            self.cancel_peer_jobs(&peer).await;
        }
    }

    async fn cancel_peer_jobs(&self, peer: &PeerName) {
        let upload_ids: Vec<JobId> = self
            .uploads
            .iter()
            .filter(|entry| entry.value().peer() == peer)
            .map(|entry| *entry.key())
            .collect();
        for id in upload_ids {
            if let Some(job) = self.remove_upload(&id).await {
                info!(peer = peer.as_str(), job = %id, "cancelling upload after peer disconnect");
                job.cancel().await;
            }
        }

        let download_ids: Vec<JobId> = self
            .downloads
            .iter()
            .filter(|entry| entry.value().peer() == peer)
            .map(|entry| *entry.key())
            .collect();
        for id in download_ids {
            if let Some(job) = self.remove_download(&id).await {
                info!(peer = peer.as_str(), job = %id, "cancelling download after peer disconnect");
                job.cancel().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use storage_core::domain::StorageError;
    use storage_core::ports::{DownloadBackend, UploadBackend};

    struct NoopUpload;
    #[async_trait]
    impl UploadBackend for NoopUpload {
        async fn finish(self: Box<Self>, _path: &std::path::Path) -> Result<storage_core::domain::Item, StorageError> {
            unreachable!()
        }
        async fn cancel(self: Box<Self>) {}
    }

    struct CancelTrackingDownload(Arc<AtomicBool>);
    #[async_trait]
    impl DownloadBackend for CancelTrackingDownload {
        async fn read_all(self: Box<Self>) -> Result<Vec<u8>, StorageError> {
            unreachable!()
        }
        async fn cancel(self: Box<Self>) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn add_and_remove_round_trips() {
        let registry = PendingJobs::new(Arc::new(DisconnectWatcher::new()));
        let peer = PeerName::new(":1.5").unwrap();
        let upload = Arc::new(
            TempfileUploadJob::new(JobId::new(), peer.clone(), Box::new(NoopUpload), None).unwrap(),
        );
        let id = upload.id();
        registry.add_upload(Arc::clone(&upload)).await;
        assert!(registry.get_upload(&id).is_some());
        assert!(registry.remove_upload(&id).await.is_some());
        assert!(registry.get_upload(&id).is_none());
    }

    #[tokio::test]
    async fn disconnect_cancels_and_drops_peers_downloads() {
        let disconnect = Arc::new(DisconnectWatcher::new());
        let registry = PendingJobs::new(Arc::clone(&disconnect));
        let peer = PeerName::new(":1.6").unwrap();
        let cancelled = Arc::new(AtomicBool::new(false));
        let download = Arc::new(DownloadJob::new(
            JobId::new(),
            peer.clone(),
            Box::new(CancelTrackingDownload(Arc::clone(&cancelled))),
        ));
        let id = download.id();
        registry.add_download(download).await;

        registry.cancel_peer_jobs(&peer).await;
        assert!(cancelled.load(Ordering::SeqCst));
        assert!(registry.get_download(&id).is_none());
    }
}
