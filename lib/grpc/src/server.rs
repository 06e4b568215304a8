//! gRPC listener hosting the query, store and info services.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::codec::CompressionEncoding;

use querybridge_backend::Backend;
use querybridge_common::metrics::Metrics;

use crate::proto::thanos::{
    info::info_server::InfoServer, query_server::QueryServer, store_server::StoreServer,
};
use crate::{InfoService, QueryService, StoreService};

pub struct Server {
    query: QueryService,
    store: StoreService,
    info: InfoService,
}

impl Server {
    pub fn new(backend: Arc<dyn Backend>, backend_target: &str, metrics: Metrics) -> Self {
        Self {
            query: QueryService::new(backend.clone(), metrics.clone()),
            store: StoreService::new(backend, metrics),
            info: InfoService::new(backend_target),
        }
    }

    /// Binds `addr` and serves until `shutdown` resolves. A bind failure is
    /// returned like any other serve error.
    pub async fn serve<F>(self, addr: SocketAddr, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("error binding gRPC listener to {}", addr))?;
        self.serve_with_listener(listener, shutdown).await
    }

    /// Serves on an already bound listener. In-flight calls drain before
    /// this returns; new connections are refused once `shutdown` resolves.
    pub async fn serve_with_listener<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        info!("Starting gRPC server on {}", listener.local_addr()?);

        tonic::transport::Server::builder()
            .add_service(
                QueryServer::new(self.query).accept_compressed(CompressionEncoding::Gzip),
            )
            .add_service(
                StoreServer::new(self.store).accept_compressed(CompressionEncoding::Gzip),
            )
            .add_service(InfoServer::new(self.info))
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async {
                shutdown.await;
                info!("gRPC server shutting down...");
            })
            .await
            .context("gRPC server failed")?;

        info!("gRPC server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use querybridge_common::model::{InstantSample, Labels, QueryValue, Sample};
    use tokio::sync::oneshot;

    use super::*;
    use crate::proto::thanos::info::{InfoRequest, info_client::InfoClient};
    use crate::proto::thanos::{
        LabelNamesRequest, QueryRequest, SeriesRequest, query_client::QueryClient,
        query_response, store_client::StoreClient,
    };
    use crate::testing::FakeBackend;

    #[tokio::test]
    async fn serves_all_services_until_shutdown() {
        let backend = Arc::new(FakeBackend::returning(QueryValue::Vector(vec![
            InstantSample {
                metric: Labels::from([("job".to_string(), "a".to_string())]),
                sample: Sample::new(1000, 1.0),
            },
        ])));
        let server = Server::new(
            backend.clone(),
            "http://backend.invalid:9090",
            Metrics::new().unwrap(),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());
        let (stop, stopped) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.serve_with_listener(listener, async {
            let _ = stopped.await;
        }));

        let mut query = QueryClient::connect(endpoint.clone()).await.unwrap();
        let mut stream = query
            .query(QueryRequest {
                query: "up".into(),
                time_seconds: 1,
                timeout_seconds: 0,
            })
            .await
            .unwrap()
            .into_inner();
        let first = stream.message().await.unwrap().unwrap();
        assert!(matches!(
            first.result,
            Some(query_response::Result::Timeseries(_))
        ));
        assert!(stream.message().await.unwrap().is_none());

        let mut store = StoreClient::connect(endpoint.clone()).await.unwrap();
        store
            .label_names(LabelNamesRequest::default())
            .await
            .unwrap();
        let status = store.series(SeriesRequest::default()).await.unwrap_err();
        assert_eq!(status.code(), tonic::Code::Unimplemented);

        let mut info = InfoClient::connect(endpoint).await.unwrap();
        let response = info.info(InfoRequest {}).await.unwrap().into_inner();
        assert_eq!(response.component_type, "query");

        assert_eq!(backend.calls(), 2);

        drop((query, store, info));
        stop.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn huge_backend_error_keeps_its_code() {
        let backend = Arc::new(FakeBackend::failing_with("x".repeat(64 * 1024)));
        let server = Server::new(backend, "http://localhost:9090", Metrics::new().unwrap());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());
        let (stop, stopped) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.serve_with_listener(listener, async {
            let _ = stopped.await;
        }));

        let mut query = QueryClient::connect(endpoint.clone()).await.unwrap();
        let status = query
            .query(QueryRequest {
                query: "up".into(),
                time_seconds: 1,
                timeout_seconds: 0,
            })
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::Aborted);
        assert!(status.message().len() < 2048);

        let mut store = StoreClient::connect(endpoint).await.unwrap();
        let status = store
            .label_names(LabelNamesRequest::default())
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::Internal);

        drop((query, store));
        stop.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn bind_failure_is_an_error() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap();

        let server = Server::new(
            Arc::new(FakeBackend::default()),
            "http://localhost:9090",
            Metrics::new().unwrap(),
        );
        let err = server
            .serve(addr, std::future::pending())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("error binding gRPC listener"));
    }
}
