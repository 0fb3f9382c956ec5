mod config;
mod server;
mod setup;

use eyre::{Result, WrapErr};
use tracing_subscriber::EnvFilter;

use crate::setup::ModelContext;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let json = std::env::var("SCRIBE_LOG_FORMAT").is_ok_and(|format| format == "json");
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", error);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = config::load_config()?;
    let context = ModelContext::load(&config)
        .await
        .wrap_err("failed to load transcription model")?;

    let app = server::router(context, config.max_body_bytes);
    let addr = config.addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .wrap_err_with(|| format!("failed to bind {}", addr))?;
    tracing::info!("listening on http://{}", addr);
    tracing::info!("api docs at http://{}/docs", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
