//! Domain entities for the provider-side service runtime.
//!
//! - [`item`] — the `Item` entity and its cross-boundary validation contract.
//! - [`context`] — per-call `Context`/`Credentials`.
//! - [`newtypes`] — validated identifier wrappers.
//! - [`errors`] — the wire-visible `StorageError` taxonomy.

pub mod context;
pub mod errors;
pub mod item;
pub mod newtypes;

pub use context::{Context, Credentials};
pub use errors::{DomainError, StorageError};
pub use item::{metadata_keys, validate, Item, ItemType, MetadataValue};
pub use newtypes::{validate_name, AccountId, Etag, ItemId, JobId, PeerName};
