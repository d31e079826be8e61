//! metrix-agent 진입점

use anyhow::Result;
use clap::Parser;
use metrix_app::agent::Agent;
use metrix_app::cli::AgentArgs;
use metrix_app::lifecycle::LifecycleManager;
use metrix_app::{logging, supervise_with};
use metrix_core::config::AgentConfig;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let args = AgentArgs::parse();
    let config = AgentConfig::load(args.config.as_deref(), args.overrides(), |key| {
        std::env::var(key).ok()
    })?;

    logging::init(&config.log_level);
    info!(
        address = %config.address,
        grpc_address = ?config.grpc_address,
        poll_interval_secs = config.poll_interval_secs,
        report_interval_secs = config.report_interval_secs,
        rate_limit = config.rate_limit,
        signed = config.sign_key.is_some(),
        encrypted = config.crypto_key.is_some(),
        "metrix-agent v{}",
        env!("CARGO_PKG_VERSION")
    );

    let lifecycle = LifecycleManager::new();
    let agent = Agent::new(config)?;
    let task = tokio::spawn(agent.run(lifecycle.subscribe()));

    // 드레인이 끝날 때까지 기다린다
    supervise_with(&lifecycle, task, None).await
}
