//! HTTP listener for `/metrics` and the health probes.
//!
//! # Shutdown
//! Once the shutdown future resolves the server stops accepting and lets
//! open connections finish, but only for `shutdown_grace`. After that the
//! remaining connections are dropped and `serve` returns.

use std::future::{Future, IntoFuture};
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use log::{info, warn};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use querybridge_common::metrics::Metrics;
use querybridge_config::MetricsConfig;

use crate::{ApiState, routes::create_router};

pub async fn serve<F>(config: &MetricsConfig, metrics: Metrics, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = config.address();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("error binding HTTP listener to {}", addr))?;
    serve_with_listener(listener, metrics, config.shutdown_grace, shutdown).await
}

pub async fn serve_with_listener<F>(
    listener: TcpListener,
    metrics: Metrics,
    grace: Duration,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router().with_state(ApiState { metrics });
    run(listener, app, grace, shutdown).await
}

async fn run<F>(listener: TcpListener, app: Router, grace: Duration, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!(
        "HTTP server listening on http://{}",
        listener.local_addr()?
    );

    let (draining, drain_started) = oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("HTTP server shutting down...");
            let _ = draining.send(());
        })
        .into_future();

    let deadline = async move {
        match drain_started.await {
            Ok(()) => tokio::time::sleep(grace).await,
            // the server exited on its own
            Err(_) => std::future::pending().await,
        }
    };

    tokio::select! {
        result = server => result.context("HTTP server failed")?,
        _ = deadline => warn!("HTTP connections still open after {:?}, closing them", grace),
    }

    info!("HTTP server stopped");
    Ok(())
}
