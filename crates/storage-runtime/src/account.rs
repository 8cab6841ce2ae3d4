//! One authenticated (back-end, user-account) pair (`spec.md` §3
//! `AccountSession`).
//!
//! Grounded on
//! `examples/original_source/include/unity/storage/provider/internal/AccountData.h`:
//! the C++ `AccountData` bundles a `ProviderBase`, the shared
//! `DBusPeerCache`, the process-wide `InactivityTimer`, and its own
//! `PendingJobs`. This is that bundle, minus the Qt ownership machinery —
//! ownership here is plain `Arc`s handed in by whatever constructs the
//! session (`storage-ipc::Server`, in production).

use std::sync::Arc;

use storage_core::domain::{AccountId, Context, Credentials, PeerName, StorageError};
use storage_core::ports::Provider;

use crate::disconnect::DisconnectWatcher;
use crate::inactivity::InactivityTimer;
use crate::jobs::PendingJobs;
use crate::peer_cache::DynPeerCredentialCache;

/// A (`Provider` back-end, user-account) pair. Owns its `PendingJobs`
/// outright; shares the peer-credential cache and inactivity timer with
/// every other session on the same connection (`spec.md` §3 ownership).
pub struct AccountSession {
    id: AccountId,
    provider: Arc<dyn Provider>,
    credentials: Credentials,
    peer_cache: Arc<DynPeerCredentialCache>,
    inactivity: Arc<InactivityTimer>,
    jobs: Arc<PendingJobs>,
}

impl AccountSession {
    pub fn new(
        id: AccountId,
        provider: Arc<dyn Provider>,
        credentials: Credentials,
        peer_cache: Arc<DynPeerCredentialCache>,
        inactivity: Arc<InactivityTimer>,
        disconnect: Arc<DisconnectWatcher>,
    ) -> Self {
        Self {
            id,
            provider,
            credentials,
            peer_cache,
            inactivity,
            jobs: Arc::new(PendingJobs::new(disconnect)),
        }
    }

    pub fn id(&self) -> AccountId {
        self.id
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    pub fn jobs(&self) -> &Arc<PendingJobs> {
        &self.jobs
    }

    pub fn inactivity(&self) -> &Arc<InactivityTimer> {
        &self.inactivity
    }

    /// Builds the per-call `Context` for `peer`, looking up its credentials
    /// through the shared cache (`spec.md` §4.2 `AwaitingCredentials`,
    /// §4.1 "Context — per-call bundle").
    pub async fn context_for(&self, peer: &PeerName) -> Result<Context, StorageError> {
        let creds = self.peer_cache.get(peer).await?;
        Ok(Context::new(
            creds.uid,
            creds.pid,
            creds.label.clone(),
            self.credentials.clone(),
        ))
    }
}
