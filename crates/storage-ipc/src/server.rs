//! Owns the bus connection and binds one [`ProviderInterface`] per
//! account plus the registry (`spec.md` §4.10).
//!
//! Grounded on
//! `examples/original_source/src/provider/internal/ServerImpl.cpp`'s
//! startup sequence: construct the executor first, open the bus, build
//! the shared peer cache, bind an interface per enumerated account, and
//! only then claim the well-known name — a failure at that last step is
//! the only startup failure treated as fatal.

use std::sync::Arc;
use std::time::Duration;

use storage_core::domain::{AccountId, Credentials, StorageError};
use storage_core::ports::Provider;
use storage_runtime::{
    AccountSession, DbusPeerCredentialSource, DisconnectWatcher, DynPeerCredentialCache,
    InactivityTimer, MainLoopExecutor, MainLoopReceiver,
};
use tracing::{error, info};

use crate::provider_interface::ProviderInterface;
use crate::registry::{AccountDetails, RegistryInterface};

/// One account to expose, as produced by whatever enumerates installed
/// accounts (`spec.md` §4.10 "authentication-broker manager" — the
/// broker itself is an external collaborator; this crate only consumes
/// its output).
pub struct AccountSpec {
    pub id: AccountId,
    pub provider: Arc<dyn Provider>,
    pub credentials: Credentials,
    pub details: AccountDetails,
}

fn bus_error(e: zbus::Error) -> StorageError {
    StorageError::Resource {
        errno: 0,
        message: e.to_string(),
    }
}

/// The running dispatcher: a bus connection plus the main-loop receiver
/// that drains continuations posted back from worker threads.
pub struct Server {
    connection: zbus::Connection,
    main_loop: MainLoopReceiver,
    /// Kept alive for the whole process lifetime: `main_loop` only
    /// returns once every `MainLoopExecutor` handle is dropped, and this
    /// is the only one, so `run()` needs it to outlast the receiver loop
    /// it drives.
    _executor: MainLoopExecutor,
    inactivity: Arc<InactivityTimer>,
}

impl Server {
    /// Opens the session bus, binds every account's `ProviderInterface`
    /// and the registry, then claims `service_name`. Returns a
    /// `StorageError::Resource` (fatal, per `spec.md` §4.10) if the name
    /// can't be acquired.
    pub async fn start(
        service_name: &str,
        registry_object_path: &str,
        provider_idle_timeout: Option<Duration>,
        accounts: Vec<AccountSpec>,
    ) -> Result<Self, StorageError> {
        let (executor, main_loop) = MainLoopExecutor::pair();

        let connection = zbus::Connection::session().await.map_err(bus_error)?;

        let source = DbusPeerCredentialSource::new(&connection)
            .await
            .map_err(bus_error)?;
        let peer_cache = Arc::new(DynPeerCredentialCache::new(Box::new(source)));
        let disconnect = Arc::new(DisconnectWatcher::new());
        let inactivity = Arc::new(InactivityTimer::new(provider_idle_timeout));
        inactivity.start();

        {
            let disconnect = Arc::clone(&disconnect);
            let watcher_connection = connection.clone();
            tokio::spawn(async move {
                if let Err(e) = disconnect.run(&watcher_connection).await {
                    error!(error = %e, "disconnect watcher stopped");
                }
            });
        }

        let mut registry_accounts = Vec::with_capacity(accounts.len());
        for spec in accounts {
            registry_accounts.push(spec.details.clone());

            let session = Arc::new(AccountSession::new(
                spec.id,
                spec.provider,
                spec.credentials,
                Arc::clone(&peer_cache),
                Arc::clone(&inactivity),
                Arc::clone(&disconnect),
            ));
            tokio::spawn(Arc::clone(session.jobs()).run_disconnect_handler());

            let object_path = format!("/provider/{}", spec.id.path_segment());
            connection
                .object_server()
                .at(object_path.as_str(), ProviderInterface::new(session, None))
                .await
                .map_err(bus_error)?;
            info!(account = %spec.id, path = %object_path, "account bound");
        }

        connection
            .object_server()
            .at(registry_object_path, RegistryInterface::new(registry_accounts))
            .await
            .map_err(bus_error)?;

        connection.request_name(service_name).await.map_err(|e| {
            error!(service_name, error = %e, "failed to acquire well-known bus name");
            StorageError::Resource {
                errno: 0,
                message: format!("failed to acquire bus name '{service_name}': {e}"),
            }
        })?;

        info!(service_name, "server ready");
        Ok(Self {
            connection,
            main_loop,
            _executor: executor,
            inactivity,
        })
    }

    pub fn connection(&self) -> &zbus::Connection {
        &self.connection
    }

    /// Serves until the idle timer fires or the process receives a
    /// ctrl-c, whichever comes first (`spec.md` §4.10/§6). `main_loop`
    /// never finishes on its own — `self._executor` keeps its one sender
    /// alive for the whole call — so one of the other two branches is
    /// always what ends `run()`.
    pub async fn run(self) {
        let main_loop = self.main_loop.run();
        tokio::pin!(main_loop);
        tokio::select! {
            _ = &mut main_loop => {}
            _ = self.inactivity.wait_for_timeout() => {
                info!("idle timeout reached, shutting down");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("received shutdown signal");
            }
        }
    }
}
