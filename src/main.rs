// provit - hybrid async/sync dispatch backend for a slow AI chat upstream
// Author: kelexine (https://github.com/kelexine)

use anyhow::Result;
use clap::Parser;
use provit::cli::Args;
use provit::config::AppConfig;
use provit::context::AppContext;
use provit::server::create_router;
use provit::utils::logging;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Phase 1: Load configuration
    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    // Phase 2: Initialize logging
    logging::init(&config.logging)?;
    info!("Starting provit v{}", env!("CARGO_PKG_VERSION"));

    if config.upstream.api_key.is_none() {
        warn!("No upstream API key configured (upstream.api_key / OPENAI_API_KEY)");
    }

    // Phase 3: Build the dispatch engine and start the background worker
    info!(
        "Upstream: {} (model {}, {} attempts, {}s apart)",
        config.upstream.api_base_url,
        config.upstream.model,
        config.upstream.retry_attempts,
        config.upstream.retry_delay_secs
    );
    let context = Arc::new(AppContext::from_config(config.clone())?);
    context.start_worker();
    info!(
        "Hybrid dispatch ready: gateway pool {}, upstream limit {}, queue capacity {}, cache TTL {}s",
        config.server.gateway_pool_size,
        config.dispatch.concurrency_limit,
        config.dispatch.queue_capacity,
        config.cache.ttl_secs
    );

    // Phase 4: Build and start HTTP server
    let app = create_router(context.clone());
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Phase 5: Run server with graceful shutdown
    // Peer addresses feed the per-IP chat rate limit
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    context.shutdown().await;
    info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
