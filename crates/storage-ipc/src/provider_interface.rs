//! The IPC-visible provider object (`spec.md` §4.1).
//!
//! One [`ProviderInterface`] is bound per enumerated account, at
//! `/provider/<account-id>`. It owns nothing but the [`AccountSession`]
//! it dispatches into and a side-table of in-flight download outcomes;
//! all the interesting state (jobs, peer credentials, the inactivity
//! timer) lives in the session and the runtime it was built from.

use std::collections::BTreeMap;
use std::os::fd::OwnedFd as StdOwnedFd;
use std::sync::Arc;

use dashmap::DashMap;
use storage_core::domain::{validate, Item, ItemId, ItemType, JobId, MetadataValue, PeerName, StorageError};
use storage_runtime::{AccountSession, DownloadJob, TempfileUploadJob};
use tokio::sync::oneshot;
use tracing::{info, warn};
use zbus::zvariant::{OwnedFd, OwnedValue, Type, Value};

use crate::error::ProviderError;
use crate::handler::RequestHandler;

/// Wire representation of [`Item`]: zbus needs a concrete, `Type`-derived
/// struct to marshal, so the domain type doesn't cross the boundary as-is.
/// Metadata values ride as D-Bus variants since the bus has no native
/// string-or-int union (`spec.md` §3 "mapping from string key to
/// value-of-either-string-or-int64").
#[derive(Debug, serde::Serialize, serde::Deserialize, Type)]
pub struct ItemDto {
    pub item_id: String,
    pub parent_ids: Vec<String>,
    pub name: String,
    pub etag: String,
    pub item_type: String,
    pub metadata: BTreeMap<String, OwnedValue>,
}

fn metadata_value_to_variant(value: MetadataValue) -> Result<OwnedValue, StorageError> {
    let variant: Value = match value {
        MetadataValue::Text(s) => Value::from(s),
        MetadataValue::Int(i) => Value::from(i),
    };
    OwnedValue::try_from(variant)
        .map_err(|e| StorageError::internal(format!("metadata value could not be boxed: {e}")))
}

fn item_to_dto(item: Item) -> Result<ItemDto, StorageError> {
    let item_type = match item.item_type {
        ItemType::File => "file",
        ItemType::Folder => "folder",
        ItemType::Root => "root",
    };
    let mut metadata = BTreeMap::new();
    for (key, value) in item.metadata {
        metadata.insert(key, metadata_value_to_variant(value)?);
    }
    Ok(ItemDto {
        item_id: item.item_id.as_str().to_string(),
        parent_ids: item.parent_ids.iter().map(|id| id.as_str().to_string()).collect(),
        name: item.name,
        etag: item.etag.as_str().to_string(),
        item_type: item_type.to_string(),
        metadata,
    })
}

fn parse_item_id(raw: &str) -> Result<ItemId, ProviderError> {
    ItemId::new(raw).map_err(|e| ProviderError::from(StorageError::from(e)))
}

fn checked(item: Item) -> Result<ItemDto, ProviderError> {
    validate(&item)?;
    Ok(item_to_dto(item)?)
}

/// `size < 0` on `CreateFile`/`Update` is an `InvalidArgument` boundary
/// (`spec.md` §8 Boundaries); reject it before ever constructing a job.
fn reject_negative_size(size: i64) -> Result<(), ProviderError> {
    if size < 0 {
        return Err(StorageError::InvalidArgument(format!("size must not be negative, got {size}")).into());
    }
    Ok(())
}

/// Opens a server/peer socket pair for a transfer job. The server half is
/// handed to the task driving the job; the peer half crosses the reply as
/// an `OwnedFd` (`spec.md` §6 "File descriptors are passed out-of-band").
fn open_transfer_pair() -> Result<(tokio::net::UnixStream, OwnedFd), ProviderError> {
    let (server_half, peer_half) =
        std::os::unix::net::UnixStream::pair().map_err(|e| StorageError::Resource {
            errno: e.raw_os_error().unwrap_or(0),
            message: e.to_string(),
        })?;
    server_half
        .set_nonblocking(true)
        .map_err(|e| StorageError::Resource {
            errno: e.raw_os_error().unwrap_or(0),
            message: e.to_string(),
        })?;
    let server_half =
        tokio::net::UnixStream::from_std(server_half).map_err(|e| StorageError::Resource {
            errno: e.raw_os_error().unwrap_or(0),
            message: e.to_string(),
        })?;
    let fd = OwnedFd::from(StdOwnedFd::from(peer_half));
    Ok((server_half, fd))
}

/// The `<vendor>.StorageFramework.Provider` interface, bound to one
/// account's [`AccountSession`] (`spec.md` §4.10).
pub struct ProviderInterface {
    session: Arc<AccountSession>,
    metrics: Option<Arc<storage_telemetry::MetricsRegistry>>,
    /// Outcome of each in-flight download's background write, consumed
    /// once by `FinishDownload` (`spec.md` §4.1 `FinishDownload` "Reports
    /// any deferred back-end error"). Kept here rather than inside
    /// `PendingJobs` so that struct's shape doesn't need to vary by job
    /// kind.
    download_outcomes: DashMap<JobId, oneshot::Receiver<Result<(), StorageError>>>,
}

impl ProviderInterface {
    pub fn new(
        session: Arc<AccountSession>,
        metrics: Option<Arc<storage_telemetry::MetricsRegistry>>,
    ) -> Self {
        Self {
            session,
            metrics,
            download_outcomes: DashMap::new(),
        }
    }

    fn record(&self, method: &str, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_request(method, outcome);
        }
    }

    fn handler(&self, peer: PeerName) -> RequestHandler<'_> {
        RequestHandler::new(&self.session, peer)
    }
}

#[zbus::interface(name = "com.storageframework.Provider")]
impl ProviderInterface {
    async fn roots(
        &self,
        #[zbus(header)] hdr: zbus::message::Header<'_>,
    ) -> Result<Vec<ItemDto>, ProviderError> {
        let peer = peer_of(&hdr)?;
        let provider = Arc::clone(self.session.provider());
        let handler = self.handler(peer);
        let result = handler.run(|ctx| async move { provider.roots(&ctx).await }).await;
        self.record("Roots", outcome_label(&result));
        let items = result?;
        items.into_iter().map(checked).collect()
    }

    async fn list(
        &self,
        item_id: String,
        page_token: String,
        #[zbus(header)] hdr: zbus::message::Header<'_>,
    ) -> Result<(Vec<ItemDto>, String), ProviderError> {
        let peer = peer_of(&hdr)?;
        let id = parse_item_id(&item_id)?;
        let provider = Arc::clone(self.session.provider());
        let handler = self.handler(peer);
        let result = handler
            .run(|ctx| async move { provider.list(&ctx, &id, &page_token).await })
            .await;
        self.record("List", outcome_label(&result));
        let page = result?;
        let items = page
            .items
            .into_iter()
            .map(checked)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((items, page.next_page_token))
    }

    async fn lookup(
        &self,
        parent_id: String,
        name: String,
        #[zbus(header)] hdr: zbus::message::Header<'_>,
    ) -> Result<Vec<ItemDto>, ProviderError> {
        let peer = peer_of(&hdr)?;
        let id = parse_item_id(&parent_id)?;
        let provider = Arc::clone(self.session.provider());
        let handler = self.handler(peer);
        let result = handler
            .run(|ctx| async move { provider.lookup(&ctx, &id, &name).await })
            .await;
        self.record("Lookup", outcome_label(&result));
        result?.into_iter().map(checked).collect()
    }

    async fn metadata(
        &self,
        item_id: String,
        #[zbus(header)] hdr: zbus::message::Header<'_>,
    ) -> Result<ItemDto, ProviderError> {
        let peer = peer_of(&hdr)?;
        let id = parse_item_id(&item_id)?;
        let provider = Arc::clone(self.session.provider());
        let handler = self.handler(peer);
        let result = handler.run(|ctx| async move { provider.metadata(&ctx, &id).await }).await;
        self.record("Metadata", outcome_label(&result));
        checked(result?)
    }

    async fn create_folder(
        &self,
        parent_id: String,
        name: String,
        #[zbus(header)] hdr: zbus::message::Header<'_>,
    ) -> Result<ItemDto, ProviderError> {
        let peer = peer_of(&hdr)?;
        let id = parse_item_id(&parent_id)?;
        let provider = Arc::clone(self.session.provider());
        let handler = self.handler(peer);
        let result = handler
            .run(|ctx| async move { provider.create_folder(&ctx, &id, &name).await })
            .await;
        self.record("CreateFolder", outcome_label(&result));
        checked(result?)
    }

    #[allow(clippy::too_many_arguments)]
    async fn create_file(
        &self,
        parent_id: String,
        name: String,
        size: i64,
        content_type: String,
        allow_overwrite: bool,
        #[zbus(header)] hdr: zbus::message::Header<'_>,
    ) -> Result<(String, OwnedFd), ProviderError> {
        reject_negative_size(size)?;
        let peer = peer_of(&hdr)?;
        let id = parse_item_id(&parent_id)?;
        let provider = Arc::clone(self.session.provider());
        let provider_for_call = Arc::clone(&provider);
        let handler = self.handler(peer.clone());
        let result = handler
            .run(|ctx| async move {
                provider_for_call
                    .create_file(&ctx, &id, &name, size, &content_type, allow_overwrite)
                    .await
            })
            .await;
        self.record("CreateFile", outcome_label(&result));
        let backend = result?;
        let spool_dir = provider.spool_dir();
        self.begin_upload(peer, backend, spool_dir).await
    }

    async fn update(
        &self,
        item_id: String,
        size: i64,
        old_etag: String,
        #[zbus(header)] hdr: zbus::message::Header<'_>,
    ) -> Result<(String, OwnedFd), ProviderError> {
        reject_negative_size(size)?;
        let peer = peer_of(&hdr)?;
        let id = parse_item_id(&item_id)?;
        let provider = Arc::clone(self.session.provider());
        let provider_for_call = Arc::clone(&provider);
        let handler = self.handler(peer.clone());
        let result = handler
            .run(|ctx| async move { provider_for_call.update(&ctx, &id, size, &old_etag).await })
            .await;
        self.record("Update", outcome_label(&result));
        let backend = result?;
        let spool_dir = provider.spool_dir();
        self.begin_upload(peer, backend, spool_dir).await
    }

    async fn finish_upload(&self, upload_id: String) -> Result<ItemDto, ProviderError> {
        let id: JobId = upload_id
            .parse()
            .map_err(|_| StorageError::LogicError(format!("unknown upload id: {upload_id}")))?;
        let job = self
            .session
            .jobs()
            .get_upload(&id)
            .ok_or_else(|| StorageError::LogicError(format!("unknown upload id: {upload_id}")))?;
        let result = job.finish().await;
        self.session.jobs().remove_upload(&id).await;
        self.record("FinishUpload", outcome_label(&result));
        checked(result?)
    }

    async fn cancel_upload(&self, upload_id: String) -> Result<(), ProviderError> {
        let Ok(id) = upload_id.parse::<JobId>() else {
            return Ok(());
        };
        if let Some(job) = self.session.jobs().remove_upload(&id).await {
            job.cancel().await;
        }
        self.record("CancelUpload", "ok");
        Ok(())
    }

    async fn download(
        &self,
        item_id: String,
        match_etag: String,
        #[zbus(header)] hdr: zbus::message::Header<'_>,
    ) -> Result<(String, OwnedFd), ProviderError> {
        let peer = peer_of(&hdr)?;
        let id = parse_item_id(&item_id)?;
        let provider = Arc::clone(self.session.provider());
        let handler = self.handler(peer.clone());
        let result = handler
            .run(|ctx| async move { provider.download(&ctx, &id, &match_etag).await })
            .await;
        self.record("Download", outcome_label(&result));
        let backend = result?;
        self.begin_download(peer, backend).await
    }

    async fn finish_download(&self, download_id: String) -> Result<(), ProviderError> {
        let id: JobId = download_id
            .parse()
            .map_err(|_| StorageError::LogicError(format!("unknown download id: {download_id}")))?;
        let (_, receiver) = self
            .download_outcomes
            .remove(&id)
            .ok_or_else(|| StorageError::LogicError(format!("unknown download id: {download_id}")))?;
        self.session.jobs().remove_download(&id).await;
        let outcome = receiver
            .await
            .unwrap_or_else(|_| Err(StorageError::Unknown("download task dropped".into())));
        self.record("FinishDownload", outcome_label(&outcome));
        outcome?;
        Ok(())
    }

    async fn delete(
        &self,
        item_id: String,
        #[zbus(header)] hdr: zbus::message::Header<'_>,
    ) -> Result<(), ProviderError> {
        let peer = peer_of(&hdr)?;
        let id = parse_item_id(&item_id)?;
        let provider = Arc::clone(self.session.provider());
        let handler = self.handler(peer);
        let result = handler.run(|ctx| async move { provider.delete(&ctx, &id).await }).await;
        self.record("Delete", outcome_label(&result));
        Ok(result?)
    }

    async fn r#move(
        &self,
        item_id: String,
        new_parent_id: String,
        new_name: String,
        #[zbus(header)] hdr: zbus::message::Header<'_>,
    ) -> Result<ItemDto, ProviderError> {
        let peer = peer_of(&hdr)?;
        let id = parse_item_id(&item_id)?;
        let new_parent = parse_item_id(&new_parent_id)?;
        let provider = Arc::clone(self.session.provider());
        let handler = self.handler(peer);
        let result = handler
            .run(|ctx| async move { provider.r#move(&ctx, &id, &new_parent, &new_name).await })
            .await;
        self.record("Move", outcome_label(&result));
        checked(result?)
    }

    async fn copy(
        &self,
        item_id: String,
        new_parent_id: String,
        new_name: String,
        #[zbus(header)] hdr: zbus::message::Header<'_>,
    ) -> Result<ItemDto, ProviderError> {
        let peer = peer_of(&hdr)?;
        let id = parse_item_id(&item_id)?;
        let new_parent = parse_item_id(&new_parent_id)?;
        let provider = Arc::clone(self.session.provider());
        let handler = self.handler(peer);
        let result = handler
            .run(|ctx| async move { provider.copy(&ctx, &id, &new_parent, &new_name).await })
            .await;
        self.record("Copy", outcome_label(&result));
        checked(result?)
    }
}

impl ProviderInterface {
    async fn begin_upload(
        &self,
        peer: PeerName,
        backend: Box<dyn storage_core::ports::UploadBackend>,
        spool_dir: Option<std::path::PathBuf>,
    ) -> Result<(String, OwnedFd), ProviderError> {
        let (server_half, fd) = open_transfer_pair()?;
        let job_id = JobId::new();
        let job = Arc::new(
            TempfileUploadJob::new(job_id, peer.clone(), backend, spool_dir)
                .map_err(|e| StorageError::Resource {
                    errno: e.raw_os_error().unwrap_or(0),
                    message: e.to_string(),
                })?,
        );
        self.session.jobs().add_upload(Arc::clone(&job)).await;
        tokio::spawn(async move {
            job.spool_from(server_half).await;
        });
        info!(peer = peer.as_str(), job = %job_id, "upload opened");
        Ok((job_id.to_string(), fd))
    }

    async fn begin_download(
        &self,
        peer: PeerName,
        backend: Box<dyn storage_core::ports::DownloadBackend>,
    ) -> Result<(String, OwnedFd), ProviderError> {
        let (mut server_half, fd) = open_transfer_pair()?;
        let job_id = JobId::new();
        let job = Arc::new(DownloadJob::new(job_id, peer.clone(), backend));
        self.session.jobs().add_download(Arc::clone(&job)).await;

        let (tx, rx) = oneshot::channel();
        self.download_outcomes.insert(job_id, rx);
        tokio::spawn(async move {
            let outcome = match job.read_all().await {
                Ok(bytes) => {
                    use tokio::io::AsyncWriteExt;
                    match server_half.write_all(&bytes).await {
                        Ok(()) => Ok(()),
                        Err(e) => Err(StorageError::Resource {
                            errno: e.raw_os_error().unwrap_or(0),
                            message: e.to_string(),
                        }),
                    }
                }
                Err(e) => Err(e),
            };
            if outcome.is_err() {
                warn!(job = %job_id, "download did not complete cleanly");
            }
            let _ = tx.send(outcome);
        });
        info!(peer = peer.as_str(), job = %job_id, "download opened");
        Ok((job_id.to_string(), fd))
    }
}

fn peer_of(header: &zbus::message::Header<'_>) -> Result<PeerName, ProviderError> {
    let sender = header
        .sender()
        .ok_or_else(|| StorageError::internal("method call has no sender"))?;
    PeerName::new(sender.to_string()).map_err(|e| ProviderError::from(StorageError::from(e)))
}

trait OutcomeKind {
    fn kind_label(&self) -> &'static str;
}

impl OutcomeKind for StorageError {
    fn kind_label(&self) -> &'static str {
        self.kind()
    }
}

impl OutcomeKind for ProviderError {
    fn kind_label(&self) -> &'static str {
        match self {
            ProviderError::NotExists(_) => "NotExists",
            ProviderError::Exists(_) => "Exists",
            ProviderError::Conflict(_) => "Conflict",
            ProviderError::PermissionDenied(_) => "PermissionDenied",
            ProviderError::Quota(_) => "Quota",
            ProviderError::Unauthorized(_) => "Unauthorized",
            ProviderError::InvalidArgument(_) => "InvalidArgument",
            ProviderError::LogicError(_) => "LogicError",
            ProviderError::Resource(_) => "Resource",
            ProviderError::RemoteComms(_) => "RemoteComms",
            ProviderError::Cancelled(_) => "Cancelled",
            ProviderError::Unknown(_) => "Unknown",
            ProviderError::ZBus(_) => "ZBus",
        }
    }
}

fn outcome_label<T, E: OutcomeKind>(result: &Result<T, E>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(e) => e.kind_label(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage_core::domain::{Etag, ItemType};

    #[test]
    fn parse_item_id_rejects_empty_string() {
        assert!(parse_item_id("").is_err());
        assert!(parse_item_id("/a/b").is_ok());
    }

    #[test]
    fn checked_converts_a_valid_item_into_its_dto() {
        let item = Item::new(
            ItemId::new("/a/b").unwrap(),
            vec![ItemId::new("/a").unwrap()],
            "b",
            Etag::new("etag1"),
            ItemType::File,
        );
        let dto = checked(item).unwrap();
        assert_eq!(dto.item_id, "/a/b");
        assert_eq!(dto.parent_ids, vec!["/a".to_string()]);
        assert_eq!(dto.item_type, "file");
    }

    #[test]
    fn checked_rejects_a_root_with_parents() {
        let item = Item::new(
            ItemId::new("/root").unwrap(),
            vec![ItemId::new("/elsewhere").unwrap()],
            "root",
            Etag::empty(),
            ItemType::Root,
        );
        assert!(checked(item).is_err());
    }

    #[test]
    fn outcome_label_reports_ok_or_the_error_kind() {
        let ok: Result<(), StorageError> = Ok(());
        let err: Result<(), StorageError> = Err(StorageError::Conflict("x".into()));
        assert_eq!(outcome_label(&ok), "ok");
        assert_eq!(outcome_label(&err), "Conflict");
    }

    #[test]
    fn reject_negative_size_rejects_negative_and_accepts_the_rest() {
        let err = reject_negative_size(-1).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidArgument(_)));
        assert!(reject_negative_size(0).is_ok());
        assert!(reject_negative_size(i64::MAX).is_ok());
    }

    // --- boundary/lifecycle tests (spec.md §8) ---------------------------

    use std::sync::atomic::{AtomicBool, Ordering};
    use storage_core::domain::{AccountId, Credentials};
    use storage_core::ports::{DownloadBackend, UploadBackend};
    use storage_runtime::peer_cache::{DynPeerCredentialCache, PeerCredentialSource, PeerCredentials};
    use storage_runtime::{DisconnectWatcher, InactivityTimer};
    use tokio::io::AsyncReadExt;

    struct FixedSource;
    #[async_trait::async_trait]
    impl PeerCredentialSource for FixedSource {
        async fn credentials(&self, _peer: &PeerName) -> Result<PeerCredentials, StorageError> {
            Ok(PeerCredentials {
                uid: 1,
                pid: 2,
                label: String::new(),
            })
        }
    }

    struct NoopProvider;
    #[async_trait::async_trait]
    impl storage_core::ports::Provider for NoopProvider {
        async fn roots(&self, _ctx: &storage_core::domain::Context) -> Result<Vec<Item>, StorageError> {
            unreachable!()
        }
        async fn list(
            &self,
            _ctx: &storage_core::domain::Context,
            _item_id: &ItemId,
            _page_token: &str,
        ) -> Result<storage_core::ports::ListPage, StorageError> {
            unreachable!()
        }
        async fn lookup(
            &self,
            _ctx: &storage_core::domain::Context,
            _parent_id: &ItemId,
            _name: &str,
        ) -> Result<Vec<Item>, StorageError> {
            unreachable!()
        }
        async fn metadata(
            &self,
            _ctx: &storage_core::domain::Context,
            _item_id: &ItemId,
        ) -> Result<Item, StorageError> {
            unreachable!()
        }
        async fn create_folder(
            &self,
            _ctx: &storage_core::domain::Context,
            _parent_id: &ItemId,
            _name: &str,
        ) -> Result<Item, StorageError> {
            unreachable!()
        }
        async fn create_file(
            &self,
            _ctx: &storage_core::domain::Context,
            _parent_id: &ItemId,
            _name: &str,
            _size: i64,
            _content_type: &str,
            _allow_overwrite: bool,
        ) -> Result<Box<dyn UploadBackend>, StorageError> {
            unreachable!()
        }
        async fn update(
            &self,
            _ctx: &storage_core::domain::Context,
            _item_id: &ItemId,
            _size: i64,
            _old_etag: &str,
        ) -> Result<Box<dyn UploadBackend>, StorageError> {
            unreachable!()
        }
        async fn download(
            &self,
            _ctx: &storage_core::domain::Context,
            _item_id: &ItemId,
            _match_etag: &str,
        ) -> Result<Box<dyn DownloadBackend>, StorageError> {
            unreachable!()
        }
        async fn delete(&self, _ctx: &storage_core::domain::Context, _item_id: &ItemId) -> Result<(), StorageError> {
            unreachable!()
        }
        async fn r#move(
            &self,
            _ctx: &storage_core::domain::Context,
            _item_id: &ItemId,
            _new_parent_id: &ItemId,
            _new_name: &str,
        ) -> Result<Item, StorageError> {
            unreachable!()
        }
        async fn copy(
            &self,
            _ctx: &storage_core::domain::Context,
            _item_id: &ItemId,
            _new_parent_id: &ItemId,
            _new_name: &str,
        ) -> Result<Item, StorageError> {
            unreachable!()
        }
    }

    struct FakeUploadBackend {
        cancelled: Arc<AtomicBool>,
    }
    #[async_trait::async_trait]
    impl UploadBackend for FakeUploadBackend {
        async fn finish(self: Box<Self>, spooled_path: &std::path::Path) -> Result<Item, StorageError> {
            let bytes = std::fs::read(spooled_path).unwrap();
            Ok(Item::new(
                ItemId::new("/f").unwrap(),
                vec![ItemId::new("/").unwrap()],
                "f",
                Etag::new(format!("{}", bytes.len())),
                ItemType::File,
            ))
        }
        async fn cancel(self: Box<Self>) {
            self.cancelled.store(true, Ordering::SeqCst);
        }
    }

    struct FakeDownloadBackend {
        payload: Vec<u8>,
    }
    #[async_trait::async_trait]
    impl DownloadBackend for FakeDownloadBackend {
        async fn read_all(self: Box<Self>) -> Result<Vec<u8>, StorageError> {
            Ok(self.payload)
        }
        async fn cancel(self: Box<Self>) {}
    }

    fn interface() -> ProviderInterface {
        let session = Arc::new(AccountSession::new(
            AccountId::new(),
            Arc::new(NoopProvider),
            Credentials::Absent,
            Arc::new(DynPeerCredentialCache::new(Box::new(FixedSource))),
            Arc::new(InactivityTimer::new(None)),
            Arc::new(DisconnectWatcher::new()),
        ));
        ProviderInterface::new(session, None)
    }

    #[tokio::test]
    async fn upload_round_trip_then_second_finish_is_a_logic_error() {
        let iface = interface();
        let peer = PeerName::new(":1.1").unwrap();
        let backend: Box<dyn UploadBackend> = Box::new(FakeUploadBackend {
            cancelled: Arc::new(AtomicBool::new(false)),
        });
        let (job_id, fd) = iface.begin_upload(peer, backend, None).await.unwrap();

        use std::os::fd::{FromRawFd, IntoRawFd};
        let std_socket = unsafe {
            std::os::unix::net::UnixStream::from_raw_fd(std::os::fd::OwnedFd::from(fd).into_raw_fd())
        };
        std_socket.set_nonblocking(true).unwrap();
        let mut socket = tokio::net::UnixStream::from_std(std_socket).unwrap();
        use tokio::io::AsyncWriteExt;
        socket.write_all(b"hello").await.unwrap();
        drop(socket);

        let item = iface.finish_upload(job_id.clone()).await.unwrap();
        assert_eq!(item.etag, "5");

        let err = iface.finish_upload(job_id).await.unwrap_err();
        assert!(matches!(err, ProviderError::LogicError(_)));
    }

    #[tokio::test]
    async fn cancel_upload_on_unknown_id_is_a_no_op_success() {
        let iface = interface();
        assert!(iface.cancel_upload("not-a-real-id".to_string()).await.is_ok());
    }

    #[tokio::test]
    async fn finish_download_on_unknown_id_is_a_logic_error() {
        let iface = interface();
        let err = iface.finish_download(JobId::new().to_string()).await.unwrap_err();
        assert!(matches!(err, ProviderError::LogicError(_)));
    }

    #[tokio::test]
    async fn download_round_trip_delivers_bytes_over_the_fd() {
        let iface = interface();
        let peer = PeerName::new(":1.2").unwrap();
        let backend: Box<dyn DownloadBackend> = Box::new(FakeDownloadBackend {
            payload: b"payload".to_vec(),
        });
        let (job_id, fd) = iface.begin_download(peer, backend).await.unwrap();

        use std::os::fd::{FromRawFd, IntoRawFd};
        let std_socket = unsafe {
            std::os::unix::net::UnixStream::from_raw_fd(std::os::fd::OwnedFd::from(fd).into_raw_fd())
        };
        std_socket.set_nonblocking(true).unwrap();
        let mut socket = tokio::net::UnixStream::from_std(std_socket).unwrap();
        let mut received = Vec::new();
        socket.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"payload");

        iface.finish_download(job_id).await.unwrap();
    }
}
