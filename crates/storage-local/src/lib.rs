//! Reference storage back-end: a [`storage_core::ports::Provider`] over a
//! rooted local filesystem subtree (`spec.md` §4.9).
//!
//! Grounded on `lnxdrive-core/src/ports/local_filesystem.rs` for the
//! blocking-I/O-behind-an-async-trait shape, and on `spec.md` §4.9 itself
//! for the atomic-replace/name-safety/reserved-path rules (the original
//! C++ `LocalProvider` is not part of the filtered source set this crate
//! was built from).

mod atomic;
mod path_map;
mod provider;

pub use provider::LocalProvider;
