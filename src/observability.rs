use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: bookings accepted and persisted.
pub const BOOKINGS_CREATED_TOTAL: &str = "atelier_bookings_created_total";

/// Counter: submissions refused because the date or slot was taken.
pub const SLOT_CONFLICTS_TOTAL: &str = "atelier_slot_conflicts_total";

/// Counter: gallery email dispatches that went out.
pub const GALLERY_DISPATCHES_TOTAL: &str = "atelier_gallery_dispatches_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Counter: emails handed to the relay successfully.
pub const EMAILS_SENT_TOTAL: &str = "atelier_emails_sent_total";

/// Counter: email deliveries that failed.
pub const EMAILS_FAILED_TOTAL: &str = "atelier_emails_failed_total";

/// Histogram: collection rewrite duration in seconds.
pub const STORE_FLUSH_DURATION_SECONDS: &str = "atelier_store_flush_duration_seconds";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}
