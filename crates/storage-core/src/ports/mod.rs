//! Port definitions.
//!
//! [`provider`] is the single port this crate defines: the contract a
//! storage back-end implements, and the dispatcher consumes
//! (`spec.md` §1, §4.1).

pub mod provider;

pub use provider::{DownloadBackend, ListPage, Provider, UploadBackend};
