//! zkattend - operator console entry point

use anyhow::{Context, Result};
use tracing::info;

use zkattend::config::{config_path, load_config};
use zkattend::console::{Console, stdin_lines};
use zkattend::interrupt::listen_for_ctrl_c;
use zkattend::logging;
use zkattend::registry::Registry;
use zkattend::scan::TcpProber;
use zkattend_gateway::ZkGateway;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let path = config_path();
    let config = load_config(&path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;

    std::fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "Failed to create output directory {}",
            config.output_dir.display()
        )
    })?;
    logging::init(&config.error_log).context("Failed to initialize logging")?;
    info!("zkattend v{}", env!("CARGO_PKG_VERSION"));

    let registry = Registry::from_config(&config.devices).context("Invalid device table")?;
    info!(devices = registry.len(), "Device registry loaded");

    let gateway = ZkGateway::new()
        .with_port(config.connection.port)
        .with_timeout(config.connection.timeout())
        .with_read_timeout(config.connection.timeout())
        .with_password(config.connection.password);
    let prober = TcpProber::new(config.connection.port, config.scan.probe_timeout());

    let interrupt = listen_for_ctrl_c();
    let input = stdin_lines().context("Failed to start the stdin reader")?;

    Console::new(
        &gateway,
        &prober,
        &config,
        &registry,
        &interrupt,
        input,
        std::io::stdout(),
    )
    .run()
    .await
    .context("Console output failed")?;

    Ok(())
}
