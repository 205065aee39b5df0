//! SampleForge server: HTTP front end of the job engine.

mod cli;
mod dto;
mod routes;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use sampleforge_core::EngineBuilder;
use sampleforge_core::impls::missing_tools;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::routes::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::from_default_env().add_directive("sampleforge=info".parse()?))
        .init();

    let config = args.engine_config();
    std::fs::create_dir_all(&config.work_dir)
        .with_context(|| format!("cannot create work dir {}", config.work_dir.display()))?;

    let missing = missing_tools(&config.tools);
    if !missing.is_empty() {
        warn!(tools = ?missing, "external tools not found, stages using them will fail");
    }

    let engine = Arc::new(
        EngineBuilder::new(config)
            .with_default_adapters()
            .build()?,
    );
    let app = routes::router(AppState {
        engine: Arc::clone(&engine),
    });

    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("cannot bind {}", args.bind))?;
    info!(addr = %args.bind, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    engine.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
