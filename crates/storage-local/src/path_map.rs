//! Translates between [`ItemId`]s and real filesystem paths under a
//! provider's root (`spec.md` §4.9 "Identity").

use std::path::{Path, PathBuf};

use storage_core::domain::{validate_name, ItemId, StorageError};

/// Directory the provider uses for its own bookkeeping; never listed
/// (`spec.md` §4.9 "Reserved paths").
pub(crate) const RESERVED_DIR_NAME: &str = ".storage-framework-tmp";

#[derive(Debug, Clone)]
pub(crate) struct PathMap {
    root: PathBuf,
}

impl PathMap {
    /// `root` must already exist; callers canonicalize it once at startup.
    pub(crate) fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub(crate) fn root_path(&self) -> &Path {
        &self.root
    }

    pub(crate) fn reserved_dir(&self) -> PathBuf {
        self.root.join(RESERVED_DIR_NAME)
    }

    /// An entry is reserved if it *is* the bookkeeping directory itself —
    /// only direct children of the root can collide with it, since names
    /// may not contain `/` (`spec.md` §4.9).
    pub(crate) fn is_reserved(&self, path: &Path) -> bool {
        path == self.reserved_dir()
    }

    /// `ItemId` for an existing filesystem entry: its canonical path.
    pub(crate) fn item_id_for(&self, path: &Path) -> Result<ItemId, StorageError> {
        let canonical = std::fs::canonicalize(path).map_err(map_io_error)?;
        if !canonical.starts_with(&self.root) {
            return Err(StorageError::internal(format!(
                "{} escapes provider root {}",
                canonical.display(),
                self.root.display()
            )));
        }
        ItemId::new(canonical.to_string_lossy().into_owned()).map_err(StorageError::from)
    }

    /// The filesystem path an `ItemId` refers to. Does not require the
    /// path to currently exist (callers that need existence check it
    /// themselves with `metadata`/`symlink_metadata`).
    pub(crate) fn path_for(&self, id: &ItemId) -> Result<PathBuf, StorageError> {
        let path = PathBuf::from(id.as_str());
        if !path.starts_with(&self.root) {
            return Err(StorageError::NotExists(format!(
                "{} is not under this provider's root",
                id.as_str()
            )));
        }
        Ok(path)
    }

    /// Resolves `name` as a child of `parent_id`, rejecting unsafe names
    /// and the reserved bookkeeping directory (`spec.md` §4.9 "Name
    /// safety").
    pub(crate) fn child_path(&self, parent_id: &ItemId, name: &str) -> Result<PathBuf, StorageError> {
        validate_name(name).map_err(StorageError::from)?;
        let parent = self.path_for(parent_id)?;
        let child = parent.join(name);
        if self.is_reserved(&child) {
            return Err(StorageError::InvalidArgument(format!(
                "'{name}' is reserved"
            )));
        }
        Ok(child)
    }
}

fn map_io_error(e: std::io::Error) -> StorageError {
    match e.kind() {
        std::io::ErrorKind::NotFound => StorageError::NotExists(e.to_string()),
        std::io::ErrorKind::PermissionDenied => StorageError::PermissionDenied(e.to_string()),
        _ => StorageError::Resource {
            errno: e.raw_os_error().unwrap_or(0),
            message: e.to_string(),
        },
    }
}
