use std::net::SocketAddr;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;

/// Parses the configured metrics listen address; an empty value disables the exporter
pub fn parse_metrics_listen_addr(raw: &str) -> Result<Option<SocketAddr>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let addr = trimmed
        .parse::<SocketAddr>()
        .with_context(|| format!("invalid metrics listen address: {trimmed}"))?;
    Ok(Some(addr))
}

/// Installs the global Prometheus recorder with an HTTP scrape listener
///
/// Must be called from within a tokio runtime.
pub fn install_prometheus_exporter(addr: SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("failed to install prometheus exporter")?;

    info!(listen_addr = %addr, "prometheus exporter listening");
    Ok(())
}
