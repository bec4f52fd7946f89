use anyhow::{Context, Result};
use motomap_provisioner::{app, client, host};
use std::env::var;
use tokio::net::TcpListener;
use tracing::info;

/// Serve the upload trigger to the functions host, creating a
/// container group for every configuration file reported by the
/// invocations it receives.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .init();
    app::init()?;
    client::init(&app::current().settings)?;

    let port = match var(host::PORT_VAR) {
        Ok(port) => port
            .parse::<u16>()
            .with_context(|| format!("{} must be a port number", host::PORT_VAR))?,
        Err(_) => host::DEFAULT_PORT,
    };
    let listener = TcpListener::bind(("127.0.0.1", port))
        .await
        .with_context(|| format!("Failed to listen on port {}", port))?;
    info!(
        port,
        event_hub = %app::current().settings.event_hub_name,
        "Serving function {}",
        host::FUNCTION_NAME
    );

    let router = host::router(app::current(), client::current());
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("CTRL-C");
        })
        .await
        .context("Custom handler server failed")
}
