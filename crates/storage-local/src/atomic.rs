//! Atomic-replace primitives for materializing a spooled upload over its
//! destination (`spec.md` §4.9 "Atomic update").
//!
//! `linkat` gives a destination a new name for an existing inode without
//! truncating or racing a reader of the old one; `rename` then swaps that
//! staged name over the real destination, which POSIX guarantees is
//! atomic within one filesystem. When `linkat` can't bridge the spooled
//! file's filesystem to the destination's (commonly `EXDEV`), we fall
//! back to renaming the spooled file directly — `spec.md` §9 leaves
//! whether that fallback preserves atomicity across filesystems as an
//! open question, and this crate does not resolve it, only surfaces
//! whatever `rename` reports.

use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use storage_core::domain::StorageError;

static STAGING_COUNTER: AtomicU64 = AtomicU64::new(0);

fn to_cstring(path: &Path) -> Result<CString, StorageError> {
    CString::new(path.as_os_str().as_bytes())
        .map_err(|_| StorageError::internal("path contains an interior NUL byte"))
}

fn staging_path(dest_dir: &Path) -> PathBuf {
    let n = STAGING_COUNTER.fetch_add(1, Ordering::Relaxed);
    dest_dir.join(format!(".sf-tmp-{}-{n}", std::process::id()))
}

fn rename_error(from: &Path, to: &Path, e: std::io::Error) -> StorageError {
    StorageError::Resource {
        errno: e.raw_os_error().unwrap_or(0),
        message: format!("renaming {} over {}: {e}", from.display(), to.display()),
    }
}

/// Materializes `spooled` (an existing, named file) over `dest`, replacing
/// any existing file at `dest` unconditionally. Callers that must honor
/// `allow_overwrite` or an `old_etag` check do so before calling this.
pub(crate) fn replace_file(spooled: &Path, dest: &Path) -> Result<(), StorageError> {
    let dest_dir = dest
        .parent()
        .ok_or_else(|| StorageError::internal("destination has no parent directory"))?;
    let staging = staging_path(dest_dir);

    let spooled_c = to_cstring(spooled)?;
    let staging_c = to_cstring(&staging)?;

    let linked = unsafe {
        libc::linkat(
            libc::AT_FDCWD,
            spooled_c.as_ptr(),
            libc::AT_FDCWD,
            staging_c.as_ptr(),
            0,
        )
    };

    if linked == 0 {
        let result = std::fs::rename(&staging, dest).map_err(|e| rename_error(&staging, dest, e));
        if result.is_err() {
            let _ = std::fs::remove_file(&staging);
        }
        result
    } else {
        std::fs::rename(spooled, dest).map_err(|e| rename_error(spooled, dest, e))
    }
}
