//! tunbrmgrd - Tunnel Bridge Manager Daemon
//!
//! Entry point for the tunbrmgrd daemon.

use std::process::ExitCode;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use tunbrmgrd::{OfctlFlowExecutor, TunnelBridge};

/// Default bridge managed by this daemon.
const DEFAULT_BRIDGE: &str = "br-tun";

/// Initializes tracing/logging subsystem
fn init_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    info!("--- Starting tunbrmgrd ---");

    let executor = OfctlFlowExecutor::new(DEFAULT_BRIDGE);
    let bridge = TunnelBridge::new(DEFAULT_BRIDGE, executor);

    // TODO: drive setup_default_table and the feature managers from the
    // agent event loop once the topology RPC integration lands
    info!(bridge = bridge.name(), "tunbrmgrd initialization complete");

    ExitCode::SUCCESS
}
