//! Maps a [`StorageError`] to a distinctly-named D-Bus error reply
//! (`spec.md` §7 "Each back-end exception class maps to a distinct error
//! name on the reply").

use storage_core::domain::StorageError;
use zbus::DBusError;

/// Wire-visible error, one variant per `StorageError` kind plus a
/// passthrough for errors the bus library itself raises (message
/// construction, connection loss, ...).
#[derive(Debug, DBusError)]
#[zbus(prefix = "com.storageframework.Provider.Error")]
pub enum ProviderError {
    NotExists(String),
    Exists(String),
    Conflict(String),
    PermissionDenied(String),
    Quota(String),
    Unauthorized(String),
    InvalidArgument(String),
    LogicError(String),
    Resource(String),
    RemoteComms(String),
    Cancelled(String),
    Unknown(String),
    #[zbus(error)]
    ZBus(zbus::Error),
}

impl From<StorageError> for ProviderError {
    fn from(e: StorageError) -> Self {
        let message = e.to_string();
        match e {
            StorageError::NotExists(_) => ProviderError::NotExists(message),
            StorageError::Exists(_) => ProviderError::Exists(message),
            StorageError::Conflict(_) => ProviderError::Conflict(message),
            StorageError::PermissionDenied(_) => ProviderError::PermissionDenied(message),
            StorageError::Quota(_) => ProviderError::Quota(message),
            StorageError::Unauthorized(_) => ProviderError::Unauthorized(message),
            StorageError::InvalidArgument(_) => ProviderError::InvalidArgument(message),
            StorageError::LogicError(_) => ProviderError::LogicError(message),
            StorageError::Resource { .. } => ProviderError::Resource(message),
            StorageError::RemoteComms(_) => ProviderError::RemoteComms(message),
            StorageError::Cancelled => ProviderError::Cancelled(message),
            StorageError::Unknown(_) => ProviderError::Unknown(message),
        }
    }
}

pub(crate) type ProviderResult<T> = Result<T, ProviderError>;
