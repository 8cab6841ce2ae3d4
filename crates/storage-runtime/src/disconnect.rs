//! Per-peer disconnect tracking (`spec.md` §4.4).
//!
//! Grounded on
//! `examples/original_source/src/provider/internal/DisconnectWatcher.cpp`:
//! a peer is watched for as long as at least one caller has registered
//! interest (refcounted `watch`/`unwatch`), and `NameOwnerChanged` with no
//! new owner is the disconnect signal.

use std::collections::HashMap;

use futures_util::StreamExt;
use storage_core::domain::PeerName;
use tokio::sync::{broadcast, Mutex};
use tracing::debug;

/// Tracks which peers the dispatcher currently cares about and fans out
/// disconnect notifications to subscribers (the job registry, in
/// practice).
pub struct DisconnectWatcher {
    refcounts: Mutex<HashMap<PeerName, u32>>,
    sender: broadcast::Sender<PeerName>,
}

impl DisconnectWatcher {
    pub fn new() -> Self {
        let (sender, _receiver) = broadcast::channel(256);
        Self {
            refcounts: Mutex::new(HashMap::new()),
            sender,
        }
    }

    /// Subscribes to disconnect events for any watched peer.
    pub fn subscribe(&self) -> broadcast::Receiver<PeerName> {
        self.sender.subscribe()
    }

    /// Registers interest in `peer`'s disconnection. Safe to call more
    /// than once per peer; `unwatch` must be called the same number of
    /// times before interest is dropped.
    pub async fn watch(&self, peer: &PeerName) {
        let mut refcounts = self.refcounts.lock().await;
        *refcounts.entry(peer.clone()).or_insert(0) += 1;
    }

    pub async fn unwatch(&self, peer: &PeerName) {
        let mut refcounts = self.refcounts.lock().await;
        if let Some(count) = refcounts.get_mut(peer) {
            *count -= 1;
            if *count == 0 {
                refcounts.remove(peer);
            }
        }
    }

    async fn is_watched(&self, peer: &PeerName) -> bool {
        self.refcounts.lock().await.contains_key(peer)
    }

    /// Drives the watcher off `NameOwnerChanged` signals until the
    /// connection closes. Spawn this once per process.
    pub async fn run(&self, connection: &zbus::Connection) -> zbus::Result<()> {
        let dbus = zbus::fdo::DBusProxy::new(connection).await?;
        let mut changes = dbus.receive_name_owner_changed().await?;
        while let Some(signal) = changes.next().await {
            let args = match signal.args() {
                Ok(args) => args,
                Err(_) => continue,
            };
            if args.new_owner().is_some() {
                continue; // a peer gained an owner, not a disconnect
            }
            let Ok(peer) = PeerName::new(args.name().to_string()) else {
                continue;
            };
            if self.is_watched(&peer).await {
                debug!(peer = peer.as_str(), "peer disconnected");
                let _ = self.sender.send(peer);
            }
        }
        Ok(())
    }
}

impl Default for DisconnectWatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(name: &str) -> PeerName {
        PeerName::new(name).unwrap()
    }

    #[tokio::test]
    async fn watch_unwatch_refcounts_independently() {
        let watcher = DisconnectWatcher::new();
        let p = peer(":1.1");
        watcher.watch(&p).await;
        watcher.watch(&p).await;
        watcher.unwatch(&p).await;
        assert!(watcher.is_watched(&p).await);
        watcher.unwatch(&p).await;
        assert!(!watcher.is_watched(&p).await);
    }

    #[tokio::test]
    async fn unwatch_without_watch_is_a_no_op() {
        let watcher = DisconnectWatcher::new();
        let p = peer(":1.2");
        watcher.unwatch(&p).await;
        assert!(!watcher.is_watched(&p).await);
    }

    #[tokio::test]
    async fn subscriber_receives_only_watched_peers() {
        let watcher = DisconnectWatcher::new();
        let watched = peer(":1.3");
        let unwatched = peer(":1.4");
        watcher.watch(&watched).await;
        let mut rx = watcher.subscribe();

        // Simulate what `run` would do on receipt of a NameOwnerChanged
        // signal with no new owner, for each peer.
        for p in [&watched, &unwatched] {
            if watcher.is_watched(p).await {
                let _ = watcher.sender.send(p.clone());
            }
        }

        let received = rx.try_recv().unwrap();
        assert_eq!(received, watched);
        assert!(rx.try_recv().is_err());
    }
}
