//! Provider daemon entry point: parses flags, loads [`storage_core::config::Config`],
//! binds the bundled local-filesystem back-end, and serves it over D-Bus
//! until idle shutdown or signal (`spec.md` §4.10).
//!
//! Grounded on `lnxdrive-cli`'s `clap::Parser` verbosity convention for the
//! flag surface, and on `examples/original_source/src/provider/internal/ServerImpl.cpp`
//! for the startup order that [`storage_ipc::Server::start`] implements.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use storage_core::domain::{AccountId, Credentials};
use storage_core::config::Config;
use storage_ipc::{AccountDetails, AccountSpec, Server};
use storage_local::LocalProvider;
use storage_telemetry::init_tracing;
use tracing::info;

/// A single-account local-filesystem provider daemon.
///
/// Full account enumeration through an authentication-broker manager is
/// out of scope (`spec.md` §1 Non-goals); this binary always hosts one
/// local-filesystem account rooted at `Config::storage_framework_root`.
#[derive(Debug, Parser)]
#[command(name = "storage-providerd", version, about = "Storage provider daemon")]
struct Cli {
    /// Well-known bus name to request.
    #[arg(long, default_value = "com.storageframework.Provider.Local")]
    bus_name: String,

    /// Human-readable account name advertised through the registry.
    #[arg(long, default_value = "Local Files")]
    display_name: String,

    /// Verbose output (can be repeated: -v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::from_env().context("failed to load configuration")?;
    info!(root = %config.storage_framework_root.display(), "starting provider daemon");

    let provider = LocalProvider::new(config.storage_framework_root.clone())
        .context("failed to open local storage root")?;

    let account_id = AccountId::new();
    let details = AccountDetails::new(
        account_id,
        "local",
        cli.display_name.clone(),
        "local",
        "Local Files",
        "folder",
    );
    let account = AccountSpec {
        id: account_id,
        provider: Arc::new(provider),
        credentials: Credentials::Absent,
        details,
    };

    let server = Server::start(
        &cli.bus_name,
        &config.registry_object_path,
        config.provider_idle_timeout.as_duration(),
        vec![account],
    )
    .await
    .context("failed to start provider server")?;

    server.run().await;
    Ok(())
}
