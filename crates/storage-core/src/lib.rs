//! Core domain logic for the storage provider runtime.
//!
//! This crate has no knowledge of D-Bus, tokio, or the filesystem. It
//! defines:
//! - **Domain entities** - `Item`, `Context`, `Credentials`, and the
//!   validated identifier newtypes (`ItemId`, `Etag`, `JobId`, `AccountId`,
//!   `PeerName`)
//! - **The wire-visible error taxonomy** - `StorageError`
//! - **Port definitions** - the `Provider` trait every back-end implements,
//!   plus the `UploadBackend`/`DownloadBackend` job-finalization traits
//! - **Configuration** - env-driven settings shared by the daemon and its
//!   back-ends
//!
//! `storage-runtime` drives back-ends through the `Provider` port;
//! `storage-ipc` translates IPC calls into `Provider` calls and `Provider`
//! errors into IPC error replies. Neither of those crates is a dependency
//! of this one.

pub mod config;
pub mod domain;
pub mod ports;
