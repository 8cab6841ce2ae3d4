//! Domain newtypes with validation.
//!
//! Strongly-typed wrappers for the identifiers that flow through the
//! provider contract (`spec.md` §3). Each wrapper validates at
//! construction so invalid values can't silently propagate across the
//! IPC boundary.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

/// Opaque, provider-assigned identifier for an [`super::item::Item`].
///
/// Unlike the other ids here, an `ItemId` is not a UUID: its format is
/// entirely up to the back-end (the local provider uses canonicalized
/// filesystem paths). The only invariant the core enforces is
/// non-emptiness (`spec.md` §3, §4.1 validation contract).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        if id.is_empty() {
            return Err(DomainError::InvalidId("item id must not be empty".into()));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ItemId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ItemId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Opaque ETag. Folders may carry an empty etag; files generally do not,
/// but the type does not enforce that (it would require knowing the item
/// type at construction time, which callers rarely have yet).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Etag(String);

impl Etag {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Etag {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Server-generated identifier for a live upload or download job
/// (`spec.md` §3 `PendingJob`). Unique per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for JobId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("invalid job id: {e}")))
    }
}

/// Identifier for an enumerated account (`spec.md` §3 `AccountSession`),
/// also used to build the account's IPC object path `/provider/<id>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(Uuid);

impl AccountId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Representation safe to embed in a D-Bus object path segment.
    pub fn path_segment(&self) -> String {
        self.0.simple().to_string()
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for AccountId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AccountId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("invalid account id: {e}")))
    }
}

/// An IPC peer's unique bus name (e.g. `:1.42`). Validated to be
/// non-empty; the transport is the source of truth for well-formedness.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerName(String);

impl PeerName {
    pub fn new(name: impl Into<String>) -> Result<Self, DomainError> {
        let name = name.into();
        if name.is_empty() {
            return Err(DomainError::InvalidId("peer name must not be empty".into()));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for PeerName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validates an item or upload name against the provider name-safety
/// rules (`spec.md` §4.9): non-empty, no path separator, not `.`/`..`.
/// Hidden (leading-dot) names are explicitly allowed.
pub fn validate_name(name: &str) -> Result<(), DomainError> {
    if name.is_empty() {
        return Err(DomainError::InvalidName("name must not be empty".into()));
    }
    if name.contains('/') {
        return Err(DomainError::InvalidName(format!(
            "name must not contain '/': {name}"
        )));
    }
    if name == "." || name == ".." {
        return Err(DomainError::InvalidName(format!(
            "name must not be '.' or '..': {name}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_id_rejects_empty() {
        assert!(ItemId::new("").is_err());
        assert!(ItemId::new("/a/b").is_ok());
    }

    #[test]
    fn job_id_round_trips_through_string() {
        let id = JobId::new();
        let parsed: JobId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn account_id_path_segment_has_no_dashes() {
        let id = AccountId::new();
        assert!(!id.path_segment().contains('-'));
    }

    #[test]
    fn peer_name_rejects_empty() {
        assert!(PeerName::new("").is_err());
        assert!(PeerName::new(":1.42").is_ok());
    }

    #[test]
    fn validate_name_rules() {
        assert!(validate_name("").is_err());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name(".").is_err());
        assert!(validate_name("..").is_err());
        assert!(validate_name(".hidden").is_ok());
        assert!(validate_name("report.pdf").is_ok());
    }

    #[test]
    fn etag_default_is_empty() {
        assert!(Etag::default().is_empty());
        assert!(!Etag::new("abc123").is_empty());
    }
}
