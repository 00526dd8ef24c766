use std::net::SocketAddr;

// ── RED metrics (command-driven) ────────────────────────────────

/// Counter: commands executed. Labels: command, status.
pub const COMMANDS_TOTAL: &str = "venuepulse_commands_total";

/// Counter: successful check-ins.
pub const CHECKINS_TOTAL: &str = "venuepulse_checkins_total";

/// Counter: successful check-outs.
pub const CHECKOUTS_TOTAL: &str = "venuepulse_checkouts_total";

/// Counter: recorded views.
pub const VIEWS_TOTAL: &str = "venuepulse_views_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: activities in the registry.
pub const ACTIVITIES_REGISTERED: &str = "venuepulse_activities_registered";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "venuepulse_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "venuepulse_wal_flush_batch_size";

/// Counter: completed compactions.
pub const COMPACTIONS_TOTAL: &str = "venuepulse_compactions_total";

/// Install the Prometheus exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Install a fmt subscriber. Ignored if one is already set.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt::try_init();
}

/// Count a finished command under its outcome label.
pub(crate) fn record_command<T>(command: &'static str, result: &Result<T, crate::EngineError>) {
    let status = match result {
        Ok(_) => "ok",
        Err(e) => e.label(),
    };
    metrics::counter!(COMMANDS_TOTAL, "command" => command, "status" => status).increment(1);
}
