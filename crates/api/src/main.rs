use std::sync::Arc;

use anyhow::Context;

use warehouse_api::app::{self, AuthServices};
use warehouse_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("invalid configuration")?;
    warehouse_observability::init(config.log_format);

    for name in config.insecure_defaults() {
        tracing::warn!(setting = name, "using insecure development default; set it before deploying");
    }

    let services = app::services::build_services(&config)
        .await
        .context("failed to initialize storage")?;
    let auth = AuthServices::from_config(&config);

    let app = app::build_app(Arc::new(services), Arc::new(auth));

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
