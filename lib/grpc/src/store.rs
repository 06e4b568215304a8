//! Thanos `Store` service: label metadata only.
//!
//! Label lookups are forwarded with every matcher applied; failures surface
//! as `INTERNAL`. `Series` is not offered.

use std::sync::Arc;
use std::time::Instant;

use log::{debug, warn};
use tonic::{Request, Response, Status};

use querybridge_backend::Backend;
use querybridge_common::metrics::Metrics;
use querybridge_common::model;

use crate::convert;
use crate::proto::thanos::{
    LabelNamesRequest, LabelNamesResponse, LabelValuesRequest, LabelValuesResponse,
    SeriesRequest, SeriesResponse, store_server::Store,
};

pub struct StoreService {
    backend: Arc<dyn Backend>,
    metrics: Metrics,
}

impl StoreService {
    pub fn new(backend: Arc<dyn Backend>, metrics: Metrics) -> Self {
        Self { backend, metrics }
    }

    fn finish(
        &self,
        method: &'static str,
        started: Instant,
        result: querybridge_backend::Result<model::Response<Vec<String>>>,
    ) -> Result<model::Response<Vec<String>>, Status> {
        self.metrics.observe_backend(method, started.elapsed());
        match result {
            Ok(response) => {
                self.metrics.observe_request(method, "Ok");
                Ok(response)
            }
            Err(e) => {
                warn!("{} failed: {}", method, e);
                let status = Status::internal(convert::status_message(&e));
                self.metrics
                    .observe_request(method, &format!("{:?}", status.code()));
                Err(status)
            }
        }
    }
}

#[tonic::async_trait]
impl Store for StoreService {
    type SeriesStream = tokio_stream::Empty<Result<SeriesResponse, Status>>;

    async fn series(
        &self,
        _: Request<SeriesRequest>,
    ) -> Result<Response<Self::SeriesStream>, Status> {
        self.metrics.observe_request("series", "Unimplemented");
        Err(Status::unimplemented("series is not supported by this store"))
    }

    async fn label_names(
        &self,
        request: Request<LabelNamesRequest>,
    ) -> Result<Response<LabelNamesResponse>, Status> {
        let request = request.into_inner();
        let matchers = convert::matchers(&request.matchers);
        debug!(
            "label_names {:?} from {} to {}",
            matchers, request.start, request.end
        );

        let started = Instant::now();
        let result = self
            .backend
            .label_names(&matchers, request.start, request.end)
            .await;
        let response = self.finish("label_names", started, result)?;

        Ok(Response::new(LabelNamesResponse {
            names: response.data,
            warnings: response.warnings,
        }))
    }

    async fn label_values(
        &self,
        request: Request<LabelValuesRequest>,
    ) -> Result<Response<LabelValuesResponse>, Status> {
        let request = request.into_inner();
        let matchers = convert::matchers(&request.matchers);
        debug!(
            "label_values {:?} {:?} from {} to {}",
            request.label, matchers, request.start, request.end
        );

        let started = Instant::now();
        let result = self
            .backend
            .label_values(&request.label, &matchers, request.start, request.end)
            .await;
        let response = self.finish("label_values", started, result)?;

        Ok(Response::new(LabelValuesResponse {
            values: response.data,
            warnings: response.warnings,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::thanos::{LabelMatcher, label_matcher};
    use crate::testing::FakeBackend;

    fn service(backend: Arc<FakeBackend>) -> StoreService {
        StoreService::new(backend, Metrics::new().unwrap())
    }

    fn matcher(t: label_matcher::Type, name: &str, value: &str) -> LabelMatcher {
        LabelMatcher {
            r#type: t as i32,
            name: name.into(),
            value: value.into(),
        }
    }

    #[tokio::test]
    async fn label_names_forwards_matchers_and_window() {
        let backend = Arc::new(FakeBackend {
            labels: vec!["__name__".into(), "job".into()],
            warnings: vec!["partial".into()],
            ..Default::default()
        });
        let svc = service(backend.clone());

        let response = svc
            .label_names(Request::new(LabelNamesRequest {
                start: 100,
                end: 200,
                matchers: vec![
                    matcher(label_matcher::Type::Eq, "job", "api"),
                    matcher(label_matcher::Type::Nre, "env", "dev|test"),
                ],
                ..Default::default()
            }))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(response.names, vec!["__name__", "job"]);
        assert_eq!(response.warnings, vec!["partial"]);
        assert_eq!(
            backend.seen.lock().unwrap().as_slice(),
            [r#"label_names ["job=\"api\"", "env!~\"dev|test\""] 100 200"#]
        );
    }

    #[tokio::test]
    async fn label_values_forwards_label() {
        let backend = Arc::new(FakeBackend {
            labels: vec!["a".into(), "b".into()],
            ..Default::default()
        });
        let svc = service(backend.clone());

        let response = svc
            .label_values(Request::new(LabelValuesRequest {
                label: "job".into(),
                start: 1,
                end: 2,
                ..Default::default()
            }))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(response.values, vec!["a", "b"]);
        assert!(response.warnings.is_empty());
        assert_eq!(
            backend.seen.lock().unwrap().as_slice(),
            ["label_values job [] 1 2"]
        );
    }

    #[tokio::test]
    async fn backend_failure_is_internal() {
        let svc = service(Arc::new(FakeBackend::failing()));

        let status = svc
            .label_names(Request::new(LabelNamesRequest::default()))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::Internal);

        let status = svc
            .label_values(Request::new(LabelValuesRequest {
                label: "job".into(),
                ..Default::default()
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::Internal);
    }

    #[tokio::test]
    async fn series_is_unimplemented_without_backend_calls() {
        let backend = Arc::new(FakeBackend::default());
        let svc = service(backend.clone());

        let status = svc
            .series(Request::new(SeriesRequest {
                min_time: 0,
                max_time: 1000,
                matchers: vec![matcher(label_matcher::Type::Eq, "job", "a")],
                ..Default::default()
            }))
            .await
            .unwrap_err();

        assert_eq!(status.code(), tonic::Code::Unimplemented);
        assert_eq!(backend.calls(), 0);
    }
}
