use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use atelier::engine::Engine;
use atelier::http::{self, AppState};
use atelier::mailer::{Mailer, NullMailer, SmtpConfig, SmtpMailer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let metrics_port: Option<u16> = std::env::var("ATELIER_METRICS_PORT")
        .ok()
        .and_then(|s| s.parse().ok());
    atelier::observability::init(metrics_port);

    let port = std::env::var("ATELIER_PORT").unwrap_or_else(|_| "8080".into());
    let bind = std::env::var("ATELIER_BIND").unwrap_or_else(|_| "0.0.0.0".into());
    let data_dir = std::env::var("ATELIER_DATA_DIR").unwrap_or_else(|_| "./data".into());
    let admin_token = std::env::var("ATELIER_ADMIN_TOKEN").unwrap_or_else(|_| "atelier".into());
    let contact_email = std::env::var("ATELIER_CONTACT_EMAIL").ok();

    // Ensure data directory exists
    std::fs::create_dir_all(&data_dir)?;

    let mailer: Arc<dyn Mailer> = match SmtpConfig::from_env() {
        Some(config) => Arc::new(SmtpMailer::new(config)),
        None => {
            tracing::warn!("SMTP_HOST not set, outgoing email is disabled");
            Arc::new(NullMailer)
        }
    };

    let engine = Arc::new(Engine::open(
        &PathBuf::from(&data_dir),
        mailer,
        contact_email,
    )?);
    let app = http::router(AppState {
        engine,
        admin_token: Arc::new(admin_token),
    });

    let addr = format!("{bind}:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!("atelier listening on {addr}");
    info!("  data_dir: {data_dir}");
    info!(
        "  metrics: {}",
        metrics_port.map_or("disabled".to_string(), |p| format!(
            "http://0.0.0.0:{p}/metrics"
        ))
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("atelier stopped");
    Ok(())
}

/// Resolves on SIGTERM or ctrl-c; axum then stops accepting and drains
/// in-flight requests.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to register SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
    info!("shutdown signal received");
}
