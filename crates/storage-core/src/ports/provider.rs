//! The `Provider` port (`spec.md` §1, §4.1, §4.7).
//!
//! This is the trait every storage back-end implements. The dispatcher
//! (`storage-ipc`) calls these methods after authenticating the caller and
//! translates the result into the IPC reply; it never talks to a back-end
//! any other way. Grounded on the shape of
//! `lnxdrive-core/src/ports/cloud_provider.rs`'s `ICloudProvider`
//! (`#[async_trait]`, `Send + Sync`, owned `&self` methods) and on
//! `examples/original_source/include/unity/storage/provider/ProviderBase.h`'s
//! method set.
//!
//! `CreateFile`/`Update`/`Download` don't return an `Item` directly:
//! per `spec.md` §4.7, the *job* (not the `Provider` call) owns
//! finalization. `create_file`/`update` return a [`UploadBackend`] the
//! `storage-runtime` job registry drives to completion once the peer
//! closes its end of the transfer socket; `download` returns a
//! [`DownloadBackend`] the registry reads from to fill the peer's socket.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::domain::{Context, Item, ItemId, StorageError};

/// A page of children returned by [`Provider::list`].
#[derive(Debug, Clone)]
pub struct ListPage {
    pub items: Vec<Item>,
    /// Empty marks the end of the listing (`spec.md` §4.1 `List`).
    pub next_page_token: String,
}

/// Back-end side of an in-progress upload (`spec.md` §4.7 "Tempfile
/// variant"). `storage-runtime::TempfileUploadJob` spools the peer's bytes
/// to an unlinked temp file and, on `FinishUpload`, hands its path here.
#[async_trait]
pub trait UploadBackend: Send + Sync {
    /// Called once the peer has closed its write end and the spooled data
    /// is fully flushed to `spooled_path`. Must not touch the destination
    /// if the implementation knows the socket was still open (the runtime
    /// enforces this before calling finish, but a defensive back-end may
    /// re-check).
    async fn finish(self: Box<Self>, spooled_path: &Path) -> Result<Item, StorageError>;

    /// Called on explicit cancellation or peer disconnect. Must be
    /// idempotent and tolerant of being invoked after `finish` already
    /// resolved (`spec.md` §5 Cancellation).
    async fn cancel(self: Box<Self>);
}

/// Back-end side of an in-progress download (`spec.md` §4.1 `Download`).
#[async_trait]
pub trait DownloadBackend: Send + Sync {
    /// Returns the full byte content to stream to the peer. A reference
    /// implementation reading the whole file into memory is acceptable;
    /// the transfer protocol (`spec.md` §6) does not require chunking.
    async fn read_all(self: Box<Self>) -> Result<Vec<u8>, StorageError>;

    /// Called on explicit cancellation or peer disconnect.
    async fn cancel(self: Box<Self>);
}

/// Port trait for storage back-end operations (`spec.md` §4.1).
///
/// Every method receives a [`Context`] carrying the caller's credentials
/// and peer identity so back-ends can perform their own ACL checks.
/// Errors are always a [`StorageError`] variant — the dispatcher relies on
/// this to pick the matching IPC error name without inspecting message
/// text (`spec.md` §7).
#[async_trait]
pub trait Provider: Send + Sync {
    /// At least one root of type=root is expected (`spec.md` §4.1 `Roots`).
    async fn roots(&self, ctx: &Context) -> Result<Vec<Item>, StorageError>;

    /// `spec.md` §4.1 `List`. An empty `next_page_token` marks the end.
    async fn list(
        &self,
        ctx: &Context,
        item_id: &ItemId,
        page_token: &str,
    ) -> Result<ListPage, StorageError>;

    /// `spec.md` §4.1 `Lookup`. Providers with case-folding may return
    /// more than one match.
    async fn lookup(
        &self,
        ctx: &Context,
        parent_id: &ItemId,
        name: &str,
    ) -> Result<Vec<Item>, StorageError>;

    /// `spec.md` §4.1 `Metadata`.
    async fn metadata(&self, ctx: &Context, item_id: &ItemId) -> Result<Item, StorageError>;

    /// `spec.md` §4.1 `CreateFolder`. The back-end may rewrite `name`.
    async fn create_folder(
        &self,
        ctx: &Context,
        parent_id: &ItemId,
        name: &str,
    ) -> Result<Item, StorageError>;

    /// `spec.md` §4.1 `CreateFile`. Returns the job's back-end half.
    /// `size` is signed on the wire so `size < 0` (`spec.md` §8 Boundaries)
    /// is representable at all; `storage-ipc` rejects it with
    /// `InvalidArgument` before this is ever called.
    async fn create_file(
        &self,
        ctx: &Context,
        parent_id: &ItemId,
        name: &str,
        size: i64,
        content_type: &str,
        allow_overwrite: bool,
    ) -> Result<Box<dyn UploadBackend>, StorageError>;

    /// `spec.md` §4.1 `Update`. An empty `old_etag` disables conflict
    /// detection. `size` is signed for the same reason as `create_file`.
    async fn update(
        &self,
        ctx: &Context,
        item_id: &ItemId,
        size: i64,
        old_etag: &str,
    ) -> Result<Box<dyn UploadBackend>, StorageError>;

    /// `spec.md` §4.1 `Download`. An empty `match_etag` disables
    /// conditional download.
    async fn download(
        &self,
        ctx: &Context,
        item_id: &ItemId,
        match_etag: &str,
    ) -> Result<Box<dyn DownloadBackend>, StorageError>;

    /// `spec.md` §4.1 `Delete`. Root deletion always fails.
    async fn delete(&self, ctx: &Context, item_id: &ItemId) -> Result<(), StorageError>;

    /// `spec.md` §4.1 `Move`. Same-parent rename is permitted.
    async fn r#move(
        &self,
        ctx: &Context,
        item_id: &ItemId,
        new_parent_id: &ItemId,
        new_name: &str,
    ) -> Result<Item, StorageError>;

    /// `spec.md` §4.1 `Copy`. No server-side read+write fallback: the
    /// back-end implements this itself.
    async fn copy(
        &self,
        ctx: &Context,
        item_id: &ItemId,
        new_parent_id: &ItemId,
        new_name: &str,
    ) -> Result<Item, StorageError>;

    /// Directory an upload job should spool into, so the spooled file and
    /// `finish`'s eventual destination share a filesystem (`spec.md` §4.9
    /// "Atomic update" — `atomic::replace_file`'s `linkat` path, and its
    /// `rename` fallback, both require that). `None` means the back-end
    /// has no filesystem locality to offer and the OS default temp
    /// directory is fine.
    fn spool_dir(&self) -> Option<PathBuf> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_page_end_marker_is_empty_string() {
        let page = ListPage {
            items: vec![],
            next_page_token: String::new(),
        };
        assert!(page.next_page_token.is_empty());
    }
}
