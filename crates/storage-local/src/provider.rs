//! [`LocalProvider`]: the reference `Provider` backed by a local directory
//! subtree (`spec.md` §4.9).

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use storage_core::domain::{Context, Etag, Item, ItemId, ItemType, StorageError};
use storage_core::ports::{DownloadBackend, ListPage, Provider, UploadBackend};
use tracing::debug;

use crate::atomic::replace_file;
use crate::path_map::{PathMap, RESERVED_DIR_NAME};

async fn run_blocking<F, T>(f: F) -> Result<T, StorageError>
where
    F: FnOnce() -> Result<T, StorageError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .unwrap_or_else(|e| Err(StorageError::internal(format!("blocking task panicked: {e}"))))
}

fn map_io_error(e: std::io::Error) -> StorageError {
    match e.kind() {
        std::io::ErrorKind::NotFound => StorageError::NotExists(e.to_string()),
        std::io::ErrorKind::PermissionDenied => StorageError::PermissionDenied(e.to_string()),
        std::io::ErrorKind::AlreadyExists => StorageError::Exists(e.to_string()),
        _ => StorageError::Resource {
            errno: e.raw_os_error().unwrap_or(0),
            message: e.to_string(),
        },
    }
}

/// Last-modified time, encoded as an opaque string. Folders and roots
/// carry an empty etag (`spec.md` §4.9 "ETag").
fn etag_for(meta: &std::fs::Metadata) -> Etag {
    if meta.is_dir() {
        return Etag::empty();
    }
    match meta.modified() {
        Ok(mtime) => {
            let duration = mtime
                .duration_since(SystemTime::UNIX_EPOCH)
                .unwrap_or_default();
            Etag::new(format!("{}.{}", duration.as_secs(), duration.subsec_nanos()))
        }
        Err(_) => Etag::empty(),
    }
}

fn item_type_for(meta: &std::fs::Metadata, is_root: bool) -> ItemType {
    if is_root {
        ItemType::Root
    } else if meta.is_dir() {
        ItemType::Folder
    } else {
        ItemType::File
    }
}

fn entry_to_item(paths: &PathMap, path: &Path, parent_id: ItemId) -> Result<Item, StorageError> {
    let meta = std::fs::symlink_metadata(path).map_err(map_io_error)?;
    let is_root = path == paths.root_path();
    let id = paths.item_id_for(path)?;
    let name = if is_root {
        "root".to_string()
    } else {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    };
    let parents = if is_root { vec![] } else { vec![parent_id] };
    Ok(Item::new(id, parents, name, etag_for(&meta), item_type_for(&meta, is_root)))
}

/// Reference `Provider` over a rooted local filesystem subtree
/// (`spec.md` §4.9).
#[derive(Clone)]
pub struct LocalProvider {
    paths: PathMap,
}

impl LocalProvider {
    /// `root` must already exist. Its canonical form becomes the
    /// provider's single root item; a reserved bookkeeping directory is
    /// created under it if missing (`spec.md` §4.9 "Reserved paths").
    pub fn new(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = std::fs::canonicalize(root.into())?;
        std::fs::create_dir_all(root.join(RESERVED_DIR_NAME))?;
        Ok(Self {
            paths: PathMap::new(root),
        })
    }

    fn root_item(&self) -> Result<Item, StorageError> {
        let root_id = self.paths.item_id_for(self.paths.root_path())?;
        entry_to_item(&self.paths, self.paths.root_path(), root_id)
    }
}

#[async_trait]
impl Provider for LocalProvider {
    async fn roots(&self, _ctx: &Context) -> Result<Vec<Item>, StorageError> {
        Ok(vec![self.root_item()?])
    }

    /// This reference implementation lists a directory's entries in one
    /// page; `page_token` is accepted but ignored and the reply's token is
    /// always empty (`spec.md` §4.1 `List`).
    async fn list(
        &self,
        _ctx: &Context,
        item_id: &ItemId,
        _page_token: &str,
    ) -> Result<ListPage, StorageError> {
        let paths = self.paths.clone();
        let dir = paths.path_for(item_id)?;
        let parent_id = item_id.clone();
        let items = run_blocking(move || {
            let mut items = Vec::new();
            for entry in std::fs::read_dir(&dir).map_err(map_io_error)? {
                let entry = entry.map_err(map_io_error)?;
                let path = entry.path();
                if paths.is_reserved(&path) {
                    continue;
                }
                items.push(entry_to_item(&paths, &path, parent_id.clone())?);
            }
            Ok(items)
        })
        .await?;
        Ok(ListPage {
            items,
            next_page_token: String::new(),
        })
    }

    async fn lookup(
        &self,
        _ctx: &Context,
        parent_id: &ItemId,
        name: &str,
    ) -> Result<Vec<Item>, StorageError> {
        let child = self.paths.child_path(parent_id, name)?;
        let paths = self.paths.clone();
        let parent_id = parent_id.clone();
        run_blocking(move || match std::fs::symlink_metadata(&child) {
            Ok(_) => Ok(vec![entry_to_item(&paths, &child, parent_id)?]),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(vec![]),
            Err(e) => Err(map_io_error(e)),
        })
        .await
    }

    async fn metadata(&self, _ctx: &Context, item_id: &ItemId) -> Result<Item, StorageError> {
        let paths = self.paths.clone();
        let path = paths.path_for(item_id)?;
        let parent_id = item_id.clone();
        run_blocking(move || {
            let parent = if path == paths.root_path() {
                parent_id
            } else {
                path.parent()
                    .map(|p| paths.item_id_for(p))
                    .transpose()?
                    .unwrap_or(parent_id)
            };
            entry_to_item(&paths, &path, parent)
        })
        .await
    }

    async fn create_folder(
        &self,
        _ctx: &Context,
        parent_id: &ItemId,
        name: &str,
    ) -> Result<Item, StorageError> {
        let child = self.paths.child_path(parent_id, name)?;
        let paths = self.paths.clone();
        let parent_id = parent_id.clone();
        run_blocking(move || {
            std::fs::create_dir(&child).map_err(map_io_error)?;
            entry_to_item(&paths, &child, parent_id)
        })
        .await
    }

    async fn create_file(
        &self,
        _ctx: &Context,
        parent_id: &ItemId,
        name: &str,
        _size: i64,
        _content_type: &str,
        allow_overwrite: bool,
    ) -> Result<Box<dyn UploadBackend>, StorageError> {
        let dest = self.paths.child_path(parent_id, name)?;
        debug!(path = %dest.display(), allow_overwrite, "create_file");
        Ok(Box::new(LocalCreateFileBackend {
            paths: self.paths.clone(),
            dest,
            parent_id: parent_id.clone(),
            allow_overwrite,
        }))
    }

    async fn update(
        &self,
        _ctx: &Context,
        item_id: &ItemId,
        _size: i64,
        old_etag: &str,
    ) -> Result<Box<dyn UploadBackend>, StorageError> {
        let dest = self.paths.path_for(item_id)?;
        debug!(path = %dest.display(), "update");
        Ok(Box::new(LocalUpdateBackend {
            paths: self.paths.clone(),
            dest,
            old_etag: old_etag.to_string(),
        }))
    }

    async fn download(
        &self,
        _ctx: &Context,
        item_id: &ItemId,
        match_etag: &str,
    ) -> Result<Box<dyn DownloadBackend>, StorageError> {
        let path = self.paths.path_for(item_id)?;
        let match_etag = match_etag.to_string();
        run_blocking({
            let path = path.clone();
            move || {
                if !match_etag.is_empty() {
                    let meta = std::fs::symlink_metadata(&path).map_err(map_io_error)?;
                    if etag_for(&meta).as_str() != match_etag {
                        return Err(StorageError::Conflict(
                            "current etag does not match match_etag".into(),
                        ));
                    }
                }
                Ok(())
            }
        })
        .await?;
        Ok(Box::new(LocalDownloadBackend { path }))
    }

    async fn delete(&self, _ctx: &Context, item_id: &ItemId) -> Result<(), StorageError> {
        let path = self.paths.path_for(item_id)?;
        if path == self.paths.root_path() {
            return Err(StorageError::PermissionDenied("the root cannot be deleted".into()));
        }
        run_blocking(move || {
            let meta = std::fs::symlink_metadata(&path).map_err(map_io_error)?;
            if meta.is_dir() {
                std::fs::remove_dir_all(&path).map_err(map_io_error)
            } else {
                std::fs::remove_file(&path).map_err(map_io_error)
            }
        })
        .await
    }

    async fn r#move(
        &self,
        _ctx: &Context,
        item_id: &ItemId,
        new_parent_id: &ItemId,
        new_name: &str,
    ) -> Result<Item, StorageError> {
        let src = self.paths.path_for(item_id)?;
        if src == self.paths.root_path() {
            return Err(StorageError::PermissionDenied("the root cannot be moved".into()));
        }
        let dest = self.paths.child_path(new_parent_id, new_name)?;
        reject_if_descendant(&src, &dest)?;
        let paths = self.paths.clone();
        let new_parent_id = new_parent_id.clone();
        run_blocking(move || {
            std::fs::rename(&src, &dest).map_err(map_io_error)?;
            entry_to_item(&paths, &dest, new_parent_id)
        })
        .await
    }

    async fn copy(
        &self,
        _ctx: &Context,
        item_id: &ItemId,
        new_parent_id: &ItemId,
        new_name: &str,
    ) -> Result<Item, StorageError> {
        let src = self.paths.path_for(item_id)?;
        let dest = self.paths.child_path(new_parent_id, new_name)?;
        reject_if_descendant(&src, &dest)?;
        let paths = self.paths.clone();
        let new_parent_id = new_parent_id.clone();
        run_blocking(move || {
            let meta = std::fs::symlink_metadata(&src).map_err(map_io_error)?;
            if meta.is_dir() {
                copy_dir_recursive(&src, &dest)?;
            } else {
                std::fs::copy(&src, &dest).map_err(map_io_error)?;
            }
            entry_to_item(&paths, &dest, new_parent_id)
        })
        .await
    }

    /// Uploads spool under the provider's own reserved directory so
    /// `replace_file`'s `linkat`/`rename` pair always stays on this
    /// filesystem (`spec.md` §4.9 "Atomic update").
    fn spool_dir(&self) -> Option<PathBuf> {
        Some(self.paths.reserved_dir())
    }
}

/// A folder may not be copied or moved into its own descendant
/// (`spec.md` §4.9 "Copy/Move").
fn reject_if_descendant(src: &Path, dest: &Path) -> Result<(), StorageError> {
    if dest.starts_with(src) {
        return Err(StorageError::InvalidArgument(
            "destination is inside the source".into(),
        ));
    }
    Ok(())
}

fn copy_dir_recursive(src: &Path, dest: &Path) -> Result<(), StorageError> {
    std::fs::create_dir(dest).map_err(map_io_error)?;
    for entry in std::fs::read_dir(src).map_err(map_io_error)? {
        let entry = entry.map_err(map_io_error)?;
        let from = entry.path();
        let to = dest.join(entry.file_name());
        let meta = entry.metadata().map_err(map_io_error)?;
        if meta.is_dir() {
            copy_dir_recursive(&from, &to)?;
        } else {
            std::fs::copy(&from, &to).map_err(map_io_error)?;
        }
    }
    Ok(())
}

struct LocalCreateFileBackend {
    paths: PathMap,
    dest: PathBuf,
    parent_id: ItemId,
    allow_overwrite: bool,
}

#[async_trait]
impl UploadBackend for LocalCreateFileBackend {
    async fn finish(self: Box<Self>, spooled_path: &Path) -> Result<Item, StorageError> {
        let spooled_path = spooled_path.to_path_buf();
        run_blocking(move || {
            if !self.allow_overwrite && self.dest.exists() {
                return Err(StorageError::Exists(format!(
                    "{} already exists",
                    self.dest.display()
                )));
            }
            replace_file(&spooled_path, &self.dest)?;
            entry_to_item(&self.paths, &self.dest, self.parent_id)
        })
        .await
    }

    async fn cancel(self: Box<Self>) {}
}

struct LocalUpdateBackend {
    paths: PathMap,
    dest: PathBuf,
    old_etag: String,
}

#[async_trait]
impl UploadBackend for LocalUpdateBackend {
    async fn finish(self: Box<Self>, spooled_path: &Path) -> Result<Item, StorageError> {
        let spooled_path = spooled_path.to_path_buf();
        run_blocking(move || {
            if !self.old_etag.is_empty() {
                let meta = std::fs::symlink_metadata(&self.dest).map_err(map_io_error)?;
                if etag_for(&meta).as_str() != self.old_etag {
                    return Err(StorageError::Conflict(format!(
                        "{} was modified since old_etag was read",
                        self.dest.display()
                    )));
                }
            }
            replace_file(&spooled_path, &self.dest)?;
            let parent_id = self
                .dest
                .parent()
                .map(|p| self.paths.item_id_for(p))
                .transpose()?
                .ok_or_else(|| StorageError::internal("update target has no parent"))?;
            entry_to_item(&self.paths, &self.dest, parent_id)
        })
        .await
    }

    async fn cancel(self: Box<Self>) {}
}

struct LocalDownloadBackend {
    path: PathBuf,
}

#[async_trait]
impl DownloadBackend for LocalDownloadBackend {
    async fn read_all(self: Box<Self>) -> Result<Vec<u8>, StorageError> {
        run_blocking(move || std::fs::read(&self.path).map_err(map_io_error)).await
    }

    async fn cancel(self: Box<Self>) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage_core::domain::Credentials;

    fn ctx() -> Context {
        Context::new(1000, 1, "unconfined", Credentials::Absent)
    }

    async fn provider() -> (tempfile::TempDir, LocalProvider) {
        let dir = tempfile::tempdir().unwrap();
        let provider = LocalProvider::new(dir.path()).unwrap();
        (dir, provider)
    }

    #[tokio::test]
    async fn roots_returns_single_root_item() {
        let (_dir, provider) = provider().await;
        let roots = provider.roots(&ctx()).await.unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].item_type, ItemType::Root);
    }

    #[tokio::test]
    async fn reserved_directory_is_excluded_from_listing() {
        let (_dir, provider) = provider().await;
        let root_id = provider.roots(&ctx()).await.unwrap().remove(0).item_id;
        let page = provider.list(&ctx(), &root_id, "").await.unwrap();
        assert!(page.items.is_empty());
    }

    #[tokio::test]
    async fn create_folder_then_list_finds_it() {
        let (_dir, provider) = provider().await;
        let root_id = provider.roots(&ctx()).await.unwrap().remove(0).item_id;
        provider.create_folder(&ctx(), &root_id, "docs").await.unwrap();
        let page = provider.list(&ctx(), &root_id, "").await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].name, "docs");
        assert_eq!(page.items[0].item_type, ItemType::Folder);
    }

    #[tokio::test]
    async fn create_folder_rejects_unsafe_name() {
        let (_dir, provider) = provider().await;
        let root_id = provider.roots(&ctx()).await.unwrap().remove(0).item_id;
        let err = provider.create_folder(&ctx(), &root_id, "a/b").await.unwrap_err();
        assert_eq!(err.kind(), "InvalidArgument");
    }

    #[tokio::test]
    async fn create_file_without_overwrite_rejects_existing_name() {
        let (dir, provider) = provider().await;
        std::fs::write(dir.path().join("f.txt"), b"x").unwrap();
        let root_id = provider.roots(&ctx()).await.unwrap().remove(0).item_id;
        let backend = provider
            .create_file(&ctx(), &root_id, "f.txt", 0, "text/plain", false)
            .await
            .unwrap();
        let spool = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(spool.path(), b"new").unwrap();
        let err = backend.finish(spool.path()).await.unwrap_err();
        assert_eq!(err.kind(), "Exists");
    }

    #[tokio::test]
    async fn create_file_materializes_spooled_bytes() {
        let (dir, provider) = provider().await;
        let root_id = provider.roots(&ctx()).await.unwrap().remove(0).item_id;
        let backend = provider
            .create_file(&ctx(), &root_id, "f.txt", 0, "text/plain", false)
            .await
            .unwrap();
        let spool = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(spool.path(), b"hello").unwrap();
        let item = backend.finish(spool.path()).await.unwrap();
        assert_eq!(item.name, "f.txt");
        assert_eq!(std::fs::read(dir.path().join("f.txt")).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn update_with_stale_etag_is_a_conflict() {
        let (dir, provider) = provider().await;
        std::fs::write(dir.path().join("f.txt"), b"orig").unwrap();
        let root_id = provider.roots(&ctx()).await.unwrap().remove(0).item_id;
        let item = provider.lookup(&ctx(), &root_id, "f.txt").await.unwrap().remove(0);

        // Touch the file so its mtime-based etag changes.
        std::thread::sleep(std::time::Duration::from_millis(10));
        std::fs::write(dir.path().join("f.txt"), b"changed-out-of-band").unwrap();

        let backend = provider
            .update(&ctx(), &item.item_id, 0, item.etag.as_str())
            .await
            .unwrap();
        let spool = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(spool.path(), b"new").unwrap();
        let err = backend.finish(spool.path()).await.unwrap_err();
        assert_eq!(err.kind(), "Conflict");
    }

    #[tokio::test]
    async fn download_reads_file_contents() {
        let (dir, provider) = provider().await;
        std::fs::write(dir.path().join("f.txt"), b"payload").unwrap();
        let root_id = provider.roots(&ctx()).await.unwrap().remove(0).item_id;
        let item = provider.lookup(&ctx(), &root_id, "f.txt").await.unwrap().remove(0);
        let backend = provider.download(&ctx(), &item.item_id, "").await.unwrap();
        assert_eq!(backend.read_all().await.unwrap(), b"payload");
    }

    #[tokio::test]
    async fn move_into_own_descendant_is_rejected() {
        let (_dir, provider) = provider().await;
        let root_id = provider.roots(&ctx()).await.unwrap().remove(0).item_id;
        let folder = provider.create_folder(&ctx(), &root_id, "parent").await.unwrap();
        let child = provider
            .create_folder(&ctx(), &folder.item_id, "child")
            .await
            .unwrap();
        let err = provider
            .r#move(&ctx(), &folder.item_id, &child.item_id, "parent")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "InvalidArgument");
    }

    #[tokio::test]
    async fn root_cannot_be_deleted() {
        let (_dir, provider) = provider().await;
        let root_id = provider.roots(&ctx()).await.unwrap().remove(0).item_id;
        let err = provider.delete(&ctx(), &root_id).await.unwrap_err();
        assert_eq!(err.kind(), "PermissionDenied");
    }
}
