//! Per-call pipeline: credential lookup, provider invocation, reply
//! marshal (`spec.md` §4.2).

use std::future::Future;
use std::sync::Arc;

use storage_core::domain::{Context, PeerName, StorageError};
use storage_runtime::{AccountSession, InactivityTimer};

use crate::error::ProviderError;

/// Scoped in-flight-request acquisition: increments on construction,
/// decrements on drop, covering every exit path including an early
/// `?`-return (`spec.md` §4.2 "scoped acquisition").
pub struct InFlightGuard(Arc<InactivityTimer>);

impl InFlightGuard {
    pub fn new(timer: Arc<InactivityTimer>) -> Self {
        timer.request_started();
        Self(timer)
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.request_finished();
    }
}

/// Drives one IPC call through `Created → AwaitingCredentials →
/// AwaitingProvider → Replying → Done` (`spec.md` §4.2). The states
/// aren't reified as an enum: each one is just where `run` currently is
/// in its `.await` chain, and the `InFlightGuard` makes `Done` unskippable.
pub struct RequestHandler<'a> {
    session: &'a AccountSession,
    peer: PeerName,
    _guard: InFlightGuard,
}

impl<'a> RequestHandler<'a> {
    pub fn new(session: &'a AccountSession, peer: PeerName) -> Self {
        let guard = InFlightGuard::new(Arc::clone(session.inactivity()));
        Self {
            session,
            peer,
            _guard: guard,
        }
    }

    /// `AwaitingCredentials`: a failure here short-circuits straight to
    /// `Replying` without ever calling the provider.
    async fn context(&self) -> Result<Context, StorageError> {
        self.session.context_for(&self.peer).await
    }

    pub fn session(&self) -> &AccountSession {
        self.session
    }

    pub fn peer(&self) -> &PeerName {
        &self.peer
    }

    /// Runs `body` with a freshly looked-up `Context`, mapping any
    /// `StorageError` — from the credential lookup or from `body` itself —
    /// to the wire-visible [`ProviderError`] (`spec.md` §4.2
    /// `AwaitingProvider`).
    pub async fn run<T, F, Fut>(&self, body: F) -> Result<T, ProviderError>
    where
        F: FnOnce(Context) -> Fut,
        Fut: Future<Output = Result<T, StorageError>>,
    {
        let ctx = self.context().await?;
        Ok(body(ctx).await?)
    }
}
