use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const CONNECTIONS_ACTIVE: &str = "signal_relay_connections_active";
pub const CONNECTIONS_TOTAL: &str = "signal_relay_connections_total";
pub const PAIRS_FORMED_TOTAL: &str = "signal_relay_pairs_formed_total";
pub const MESSAGES_RELAYED_TOTAL: &str = "signal_relay_messages_relayed_total";
pub const MESSAGES_DROPPED_TOTAL: &str = "signal_relay_messages_dropped_total";
pub const DECODE_FAILURES_TOTAL: &str = "signal_relay_decode_failures_total";
pub const ROLE_REJECTIONS_TOTAL: &str = "signal_relay_role_rejections_total";

pub struct Telemetry {
    metrics_handle: Option<PrometheusHandle>,
}

impl Telemetry {
    /// Installs the tracing subscriber and, when enabled, the Prometheus recorder.
    ///
    /// `RUST_LOG` takes precedence over `default_filter`.
    pub fn init(default_filter: &str, metrics_enabled: bool) -> Result<Self> {
        tracing_subscriber::registry()
            .with(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new(default_filter)),
            )
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .try_init()
            .context("failed to initialise tracing subscriber")?;

        let metrics_handle = if metrics_enabled {
            Some(install_prometheus()?)
        } else {
            None
        };

        Ok(Self { metrics_handle })
    }

    pub fn metrics_handle(&self) -> Option<PrometheusHandle> {
        self.metrics_handle.clone()
    }
}

/// Installs the process-wide Prometheus recorder. Fails if one is already installed.
pub fn install_prometheus() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus metrics recorder")?;
    info!("prometheus recorder installed");
    Ok(handle)
}
