use anyhow::Result;
use clap::Parser;
use tracing::info;

use signal_relay::config::{Cli, Commands, ServerConfig};
use signal_relay::telemetry::Telemetry;
use signal_relay::{debug_client, server};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::DebugClient(args)) = cli.command {
        Telemetry::init("warn", false)?;
        return debug_client::run(args).await;
    }

    let config = ServerConfig::try_from(cli.serve)?;
    let telemetry = Telemetry::init(&config.log_filter, config.metrics_enabled)?;
    info!(
        listen_addr = %config.listen_addr,
        metrics_enabled = config.metrics_enabled,
        "starting signal relay"
    );

    server::run(config, telemetry.metrics_handle()).await
}
