//! metrix-server 진입점

use anyhow::Result;
use clap::Parser;
use metrix_app::cli::ServerArgs;
use metrix_app::lifecycle::{LifecycleManager, SHUTDOWN_GRACE};
use metrix_app::{logging, server, supervise_with};
use metrix_core::config::ServerConfig;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let args = ServerArgs::parse();
    let config = ServerConfig::load(args.config.as_deref(), args.overrides(), |key| {
        std::env::var(key).ok()
    })?;

    logging::init(&config.log_level);
    info!(
        address = %config.address,
        grpc_address = ?config.grpc_address,
        file_storage_path = ?config.file_storage_path,
        restore = config.restore,
        database = config.database_dsn.is_some(),
        signed = config.sign_key.is_some(),
        encrypted = config.crypto_key.is_some(),
        trusted_subnet = ?config.trusted_subnet,
        "metrix-server v{}",
        env!("CARGO_PKG_VERSION")
    );

    let lifecycle = LifecycleManager::new();
    let task = tokio::spawn(server::run(config, lifecycle.subscribe()));

    supervise_with(&lifecycle, task, Some(SHUTDOWN_GRACE)).await
}
