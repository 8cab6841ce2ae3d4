//! D-Bus IPC surface for the storage provider runtime (`spec.md` §4.1,
//! §4.10, §6).
//!
//! `storage-runtime` drives `storage-core::Provider` back-ends but knows
//! nothing about D-Bus; this crate is the other half — it maps IPC calls
//! onto that runtime and maps its errors back onto named D-Bus replies.
//!
//! - [`error::ProviderError`] — the wire error taxonomy (`spec.md` §7).
//! - [`handler::RequestHandler`] — the per-call pipeline (`spec.md` §4.2).
//! - [`provider_interface::ProviderInterface`] — the bound-per-account
//!   IPC object (`spec.md` §4.1).
//! - [`registry::RegistryInterface`] — the account lookup service
//!   (`spec.md` §6).
//! - [`server::Server`] — startup and bus-name acquisition (`spec.md`
//!   §4.10).

pub mod error;
pub mod handler;
pub mod provider_interface;
pub mod registry;
pub mod server;

pub use error::ProviderError;
pub use handler::{InFlightGuard, RequestHandler};
pub use provider_interface::ProviderInterface;
pub use registry::{AccountDetails, RegistryInterface};
pub use server::{AccountSpec, Server};
