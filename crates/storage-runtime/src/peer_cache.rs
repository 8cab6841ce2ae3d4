//! Peer credential lookup and caching (`spec.md` §4.3).
//!
//! Grounded on
//! `examples/original_source/include/unity/storage/provider/internal/DBusPeerCache.h`:
//! two generations (`cache`/`old_cache`) so a peer promoted out of the
//! previous generation survives a `rotate()` without a fresh bus round
//! trip, and in-flight lookups are deduplicated so concurrent calls for
//! the same peer share one `GetConnectionCredentials` request.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use storage_core::domain::{PeerName, StorageError};
use tokio::sync::{Mutex, Notify};
use tracing::debug;

/// Security credentials for a connected IPC peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerCredentials {
    pub uid: u32,
    pub pid: u32,
    /// AppArmor (or other LSM) confinement label, empty if unconfined.
    pub label: String,
}

/// Looks up fresh credentials for a peer. Production code queries the bus
/// daemon; tests supply a fixed table.
#[async_trait]
pub trait PeerCredentialSource: Send + Sync {
    async fn credentials(&self, peer: &PeerName) -> Result<PeerCredentials, StorageError>;
}

/// Production [`PeerCredentialSource`] backed by
/// `org.freedesktop.DBus.GetConnectionCredentials`.
pub struct DbusPeerCredentialSource {
    dbus: zbus::fdo::DBusProxy<'static>,
}

impl DbusPeerCredentialSource {
    pub async fn new(connection: &zbus::Connection) -> zbus::Result<Self> {
        Ok(Self {
            dbus: zbus::fdo::DBusProxy::new(connection).await?,
        })
    }
}

#[async_trait]
impl PeerCredentialSource for DbusPeerCredentialSource {
    async fn credentials(&self, peer: &PeerName) -> Result<PeerCredentials, StorageError> {
        let unique_name = zbus::names::UniqueName::try_from(peer.as_str())
            .map_err(|e| StorageError::internal(format!("not a unique bus name: {e}")))?;
        let reply = self
            .dbus
            .get_connection_credentials(unique_name.into())
            .await
            .map_err(|e| StorageError::RemoteComms(format!("GetConnectionCredentials: {e}")))?;
        let uid = reply.unix_user_id().unwrap_or(0);
        let pid = reply.process_id().unwrap_or(0);
        let label = reply
            .linux_security_label()
            .map(|bytes| String::from_utf8_lossy(trim_nul(bytes)).into_owned())
            .unwrap_or_default();
        Ok(PeerCredentials { uid, pid, label })
    }
}

#[async_trait]
impl PeerCredentialSource for Box<dyn PeerCredentialSource> {
    async fn credentials(&self, peer: &PeerName) -> Result<PeerCredentials, StorageError> {
        (**self).credentials(peer).await
    }
}

/// A [`PeerCredentialCache`] over a type-erased source, so callers that
/// need a concrete type (e.g. [`crate::account::AccountSession`]) aren't
/// forced to be generic over which source backs it.
pub type DynPeerCredentialCache = PeerCredentialCache<Box<dyn PeerCredentialSource>>;

fn trim_nul(bytes: &[u8]) -> &[u8] {
    match bytes.last() {
        Some(0) => &bytes[..bytes.len() - 1],
        _ => bytes,
    }
}

#[derive(Default)]
struct Inner {
    cache: HashMap<PeerName, PeerCredentials>,
    old_cache: HashMap<PeerName, PeerCredentials>,
    pending: HashMap<PeerName, Arc<Notify>>,
}

/// Two-generation, deduplicating cache in front of a [`PeerCredentialSource`].
pub struct PeerCredentialCache<S> {
    source: S,
    inner: Mutex<Inner>,
}

impl<S: PeerCredentialSource> PeerCredentialCache<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Returns cached credentials for `peer`, looking them up (and caching
    /// the result) on a miss. Concurrent misses for the same peer share a
    /// single lookup.
    pub async fn get(&self, peer: &PeerName) -> Result<PeerCredentials, StorageError> {
        loop {
            let wait_on = {
                let mut inner = self.inner.lock().await;
                if let Some(creds) = inner.cache.get(peer) {
                    return Ok(creds.clone());
                }
                if let Some(creds) = inner.old_cache.remove(peer) {
                    debug!(peer = peer.as_str(), "promoting peer credentials from old generation");
                    inner.cache.insert(peer.clone(), creds.clone());
                    return Ok(creds);
                }
                if let Some(notify) = inner.pending.get(peer) {
                    Some(Arc::clone(notify))
                } else {
                    inner.pending.insert(peer.clone(), Arc::new(Notify::new()));
                    None
                }
            };
            match wait_on {
                Some(notify) => {
                    notify.notified().await;
                    // Loop back around: the owning lookup has populated the
                    // cache (or failed, in which case we'll retry it).
                }
                None => break,
            }
        }

        debug!(peer = peer.as_str(), "looking up peer credentials");
        let result = self.source.credentials(peer).await;
        let mut inner = self.inner.lock().await;
        if let Ok(creds) = &result {
            inner.cache.insert(peer.clone(), creds.clone());
        }
        if let Some(notify) = inner.pending.remove(peer) {
            notify.notify_waiters();
        }
        result
    }

    /// Ages the current generation out to `old_cache` and starts a fresh
    /// one. Call periodically so credentials for peers that reconnect
    /// under a new unique name don't accumulate forever.
    pub async fn rotate(&self) {
        let mut inner = self.inner.lock().await;
        inner.old_cache = std::mem::take(&mut inner.cache);
    }

    /// Drops a peer's cached credentials outright, e.g. on disconnect.
    pub async fn forget(&self, peer: &PeerName) {
        let mut inner = self.inner.lock().await;
        inner.cache.remove(peer);
        inner.old_cache.remove(peer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
        creds: PeerCredentials,
    }

    #[async_trait]
    impl PeerCredentialSource for CountingSource {
        async fn credentials(&self, _peer: &PeerName) -> Result<PeerCredentials, StorageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.creds.clone())
        }
    }

    fn peer(name: &str) -> PeerName {
        PeerName::new(name).unwrap()
    }

    #[tokio::test]
    async fn second_lookup_hits_cache() {
        let source = CountingSource {
            calls: AtomicUsize::new(0),
            creds: PeerCredentials { uid: 1000, pid: 42, label: "unconfined".into() },
        };
        let cache = PeerCredentialCache::new(source);
        let p = peer(":1.1");
        cache.get(&p).await.unwrap();
        cache.get(&p).await.unwrap();
        assert_eq!(cache.source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_lookups_for_same_peer_share_one_call() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
            creds: PeerCredentials { uid: 1000, pid: 42, label: String::new() },
        });
        let cache = Arc::new(PeerCredentialCache::new(SharedSource(Arc::clone(&source))));
        let p = peer(":1.2");
        let (a, b) = tokio::join!(cache.get(&p), cache.get(&p));
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    struct SharedSource(Arc<CountingSource>);

    #[async_trait]
    impl PeerCredentialSource for SharedSource {
        async fn credentials(&self, peer: &PeerName) -> Result<PeerCredentials, StorageError> {
            self.0.credentials(peer).await
        }
    }

    #[tokio::test]
    async fn rotate_promotes_instead_of_relooking_up() {
        let source = CountingSource {
            calls: AtomicUsize::new(0),
            creds: PeerCredentials { uid: 7, pid: 8, label: String::new() },
        };
        let cache = PeerCredentialCache::new(source);
        let p = peer(":1.3");
        cache.get(&p).await.unwrap();
        cache.rotate().await;
        cache.get(&p).await.unwrap();
        assert_eq!(cache.source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn forget_forces_relookup() {
        let source = CountingSource {
            calls: AtomicUsize::new(0),
            creds: PeerCredentials { uid: 7, pid: 8, label: String::new() },
        };
        let cache = PeerCredentialCache::new(source);
        let p = peer(":1.4");
        cache.get(&p).await.unwrap();
        cache.forget(&p).await;
        cache.get(&p).await.unwrap();
        assert_eq!(cache.source.calls.load(Ordering::SeqCst), 2);
    }
}
