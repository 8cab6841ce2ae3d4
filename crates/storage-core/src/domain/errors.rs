//! Error types for the provider-side service runtime.
//!
//! Two error enums live here:
//!
//! - [`DomainError`] — parse/construction failures for the newtypes in
//!   [`super::newtypes`]. Never crosses the IPC boundary directly.
//! - [`StorageError`] — the wire-visible kind taxonomy from `spec.md` §7,
//!   produced by `Provider` methods and mapped to a named D-Bus error by
//!   the dispatcher.

use thiserror::Error;

/// Errors constructing a validated newtype (an id, a name, ...).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// ID parsing error (malformed UUID, empty id, ...).
    #[error("invalid id: {0}")]
    InvalidId(String),

    /// A name failed the provider name-safety rules (empty, contains `/`,
    /// or equal to `.`/`..`).
    #[error("invalid name: {0}")]
    InvalidName(String),
}

/// Wire-visible error kinds a `Provider` method, or the dispatcher itself,
/// can produce (`spec.md` §7).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Requested id or name has no matching item.
    #[error("not found: {0}")]
    NotExists(String),

    /// Create/Move target name already in use and overwrite disallowed.
    #[error("already exists: {0}")]
    Exists(String),

    /// ETag mismatch at finalize.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Back-end refused on ACL grounds (not authentication).
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Storage quota exceeded.
    #[error("quota exceeded: {0}")]
    Quota(String),

    /// Credentials missing/rejected; broker reauthentication required.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Rejected at validation (name with `/`, negative size, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Client-side contract violation (close socket before finish, wrong id).
    #[error("logic error: {0}")]
    LogicError(String),

    /// OS-level resource error; carries an integer sub-code (errno).
    #[error("resource error (errno {errno}): {message}")]
    Resource { errno: i32, message: String },

    /// Back-end's upstream (cloud) call failed.
    #[error("remote communication error: {0}")]
    RemoteComms(String),

    /// Job was cancelled.
    #[error("cancelled")]
    Cancelled,

    /// Fallback for unclassified back-end exceptions, and for item
    /// validation failures (never attributed to the caller).
    #[error("unknown error: {0}")]
    Unknown(String),
}

impl StorageError {
    /// Short machine-readable tag used to build the IPC error name
    /// (`com.<vendor>.StorageFramework.Provider.Error.<Kind>`).
    pub fn kind(&self) -> &'static str {
        match self {
            StorageError::NotExists(_) => "NotExists",
            StorageError::Exists(_) => "Exists",
            StorageError::Conflict(_) => "Conflict",
            StorageError::PermissionDenied(_) => "PermissionDenied",
            StorageError::Quota(_) => "Quota",
            StorageError::Unauthorized(_) => "Unauthorized",
            StorageError::InvalidArgument(_) => "InvalidArgument",
            StorageError::LogicError(_) => "LogicError",
            StorageError::Resource { .. } => "Resource",
            StorageError::RemoteComms(_) => "RemoteComms",
            StorageError::Cancelled => "Cancelled",
            StorageError::Unknown(_) => "Unknown",
        }
    }

    /// Validation failures are always reported as internal/unknown, never
    /// attributed to the caller (`spec.md` §4.1, §7).
    pub fn internal(message: impl Into<String>) -> Self {
        StorageError::Unknown(message.into())
    }
}

impl From<DomainError> for StorageError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::InvalidId(m) => StorageError::InvalidArgument(m),
            DomainError::InvalidName(m) => StorageError::InvalidArgument(m),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tags_match_variant() {
        assert_eq!(StorageError::NotExists("x".into()).kind(), "NotExists");
        assert_eq!(StorageError::Cancelled.kind(), "Cancelled");
        assert_eq!(
            StorageError::Resource {
                errno: 28,
                message: "no space".into()
            }
            .kind(),
            "Resource"
        );
    }

    #[test]
    fn internal_is_unknown() {
        assert_eq!(
            StorageError::internal("bad metadata"),
            StorageError::Unknown("bad metadata".into())
        );
    }

    #[test]
    fn domain_error_maps_to_invalid_argument() {
        let e: StorageError = DomainError::InvalidName("/bad".into()).into();
        assert_eq!(e.kind(), "InvalidArgument");
    }
}
