//! Process orchestration.
//!
//! Three actors run in one [`Group`]:
//! - signal handler: returns on SIGINT or SIGTERM
//! - gRPC listener: Thanos query, store and info services
//! - HTTP listener: `/metrics` and health probes
//!
//! Whichever returns first stops the other two. The process exit status
//! follows that first actor's result.

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;
use tokio::sync::oneshot;

use querybridge_backend::{self as backend, Backend};
use querybridge_common::{metrics::Metrics, run::Group};
use querybridge_config::BridgeConfig;
use querybridge_grpc::Server as GrpcServer;

pub struct App {
    config: BridgeConfig,
    backend: Arc<dyn Backend>,
    metrics: Metrics,
}

impl App {
    pub fn new(config: BridgeConfig) -> Result<Self> {
        let backend = backend::connect(&config.backend).context("error creating backend client")?;
        let metrics = Metrics::new().context("error registering metrics")?;

        Ok(App {
            config,
            backend,
            metrics,
        })
    }

    pub async fn run(self) -> Result<()> {
        self.run_until(wait_for_signal()).await
    }

    /// Runs until `signal` resolves with the name of the signal received,
    /// or until any listener stops.
    pub async fn run_until<S>(self, signal: S) -> Result<()>
    where
        S: Future<Output = Result<&'static str>> + Send + 'static,
    {
        let mut group = Group::new();

        let (interrupt, interrupted) = oneshot::channel::<()>();
        group.add(
            "signal handler",
            async move {
                tokio::select! {
                    signal = signal => info!("received {}, exiting", signal?),
                    _ = interrupted => {}
                }
                Ok(())
            },
            move || {
                let _ = interrupt.send(());
            },
        );

        let (interrupt, interrupted) = oneshot::channel::<()>();
        let grpc = GrpcServer::new(
            self.backend.clone(),
            &self.config.backend.query_target,
            self.metrics.clone(),
        );
        let addr = self.config.grpc.address();
        group.add(
            "gRPC listener",
            grpc.serve(addr, async move {
                let _ = interrupted.await;
            }),
            move || {
                let _ = interrupt.send(());
            },
        );

        let (interrupt, interrupted) = oneshot::channel::<()>();
        let http = self.config.metrics.clone();
        let metrics = self.metrics.clone();
        group.add(
            "HTTP listener",
            async move {
                querybridge_api::serve(&http, metrics, async move {
                    let _ = interrupted.await;
                })
                .await
            },
            move || {
                let _ = interrupt.send(());
            },
        );

        group.run().await
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate()).context("error installing SIGTERM handler")?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("error waiting for SIGINT")?;
            Ok("SIGINT")
        }
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .context("error waiting for ctrl-c")?;
    Ok("ctrl-c")
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use querybridge_config::HostConfig;

    use super::*;

    fn config() -> BridgeConfig {
        let mut config = BridgeConfig::from_yaml(
            r#"
              query_target_url: http://127.0.0.1:1
              grpc:
                address: 127.0.0.1:0
                port: 0
            "#,
        )
        .unwrap();
        config.metrics.host = HostConfig {
            address: "127.0.0.1:0".parse().unwrap(),
            port: 0,
        };
        config.metrics.shutdown_grace = Duration::from_millis(200);
        config
    }

    #[tokio::test]
    async fn sigterm_stops_everything_cleanly() {
        let app = App::new(config()).unwrap();
        let (sigterm, received) = oneshot::channel::<()>();
        let handle = tokio::spawn(app.run_until(async move {
            let _ = received.await;
            Ok("SIGTERM")
        }));

        tokio::time::sleep(Duration::from_millis(100)).await;
        sigterm.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("app did not stop")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn failed_signal_watcher_is_an_error() {
        let app = App::new(config()).unwrap();
        let err = tokio::time::timeout(
            Duration::from_secs(5),
            app.run_until(async { Err(anyhow::anyhow!("error installing SIGTERM handler")) }),
        )
        .await
        .expect("app did not stop")
        .unwrap_err();
        assert!(format!("{:#}", err).contains("SIGTERM handler"));
    }

    #[tokio::test]
    async fn grpc_bind_failure_stops_everything() {
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut config = config();
        config.grpc = HostConfig {
            address: taken.local_addr().unwrap(),
            port: 0,
        };

        let err = tokio::time::timeout(Duration::from_secs(5), App::new(config).unwrap().run())
            .await
            .expect("app did not stop")
            .unwrap_err();
        assert!(format!("{:#}", err).contains("gRPC listener failed"));
    }
}
