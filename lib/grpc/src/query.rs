//! Thanos `Query` service.
//!
//! Both calls forward to the backend, then stream the result back: an
//! optional warnings message first, then one message per series in backend
//! order. Backend failures surface as `ABORTED`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, warn};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status};

use querybridge_backend::Backend;
use querybridge_common::metrics::Metrics;
use querybridge_common::model::{self, QueryValue, Range, timeout_from_seconds};

use crate::convert;
use crate::proto::prometheus_copy::TimeSeries;
use crate::proto::thanos::{
    QueryRangeRequest, QueryRangeResponse, QueryRequest, QueryResponse, query_range_response,
    query_response, query_server::Query,
};

/// Series buffered between the streaming task and tonic.
const STREAM_BUFFER: usize = 16;

/// The two streamed response types differ only in name.
trait QueryMessage: Send + 'static {
    fn warnings(warnings: String) -> Self;
    fn series(series: TimeSeries) -> Self;
}

impl QueryMessage for QueryResponse {
    fn warnings(warnings: String) -> Self {
        QueryResponse {
            result: Some(query_response::Result::Warnings(warnings)),
        }
    }

    fn series(series: TimeSeries) -> Self {
        QueryResponse {
            result: Some(query_response::Result::Timeseries(series)),
        }
    }
}

impl QueryMessage for QueryRangeResponse {
    fn warnings(warnings: String) -> Self {
        QueryRangeResponse {
            result: Some(query_range_response::Result::Warnings(warnings)),
        }
    }

    fn series(series: TimeSeries) -> Self {
        QueryRangeResponse {
            result: Some(query_range_response::Result::Timeseries(series)),
        }
    }
}

pub struct QueryService {
    backend: Arc<dyn Backend>,
    metrics: Metrics,
}

impl QueryService {
    pub fn new(backend: Arc<dyn Backend>, metrics: Metrics) -> Self {
        Self { backend, metrics }
    }

    fn finish(
        &self,
        method: &'static str,
        started: Instant,
        result: querybridge_backend::Result<model::Response<QueryValue>>,
    ) -> Result<model::Response<QueryValue>, Status> {
        self.metrics.observe_backend(method, started.elapsed());
        match result {
            Ok(response) => {
                debug!(
                    "{}: {} {} series, {} warnings",
                    method,
                    response.data.kind(),
                    response.data.series_count(),
                    response.warnings.len()
                );
                self.metrics.observe_request(method, "Ok");
                Ok(response)
            }
            Err(e) => {
                warn!("{} failed: {}", method, e);
                let status = Status::aborted(convert::status_message(&e));
                self.metrics
                    .observe_request(method, &format!("{:?}", status.code()));
                Err(status)
            }
        }
    }

    /// Feeds the translated result into a channel from a separate task.
    /// The task stops at the first failed send.
    fn stream<M: QueryMessage>(
        &self,
        method: &'static str,
        response: model::Response<QueryValue>,
    ) -> ReceiverStream<Result<M, Status>> {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let metrics = self.metrics.clone();

        tokio::spawn(async move {
            if !response.warnings.is_empty() {
                let warnings = response.warnings.join(", ");
                if tx.send(Ok(M::warnings(warnings))).await.is_err() {
                    debug!("{}: client went away before warnings were sent", method);
                    return;
                }
            }

            for series in convert::time_series(response.data) {
                if tx.send(Ok(M::series(series))).await.is_err() {
                    debug!("{}: client went away, dropping remaining series", method);
                    return;
                }
                metrics.series_sent(method);
            }
        });

        ReceiverStream::new(rx)
    }
}

#[tonic::async_trait]
impl Query for QueryService {
    type QueryStream = ReceiverStream<Result<QueryResponse, Status>>;
    type QueryRangeStream = ReceiverStream<Result<QueryRangeResponse, Status>>;

    async fn query(
        &self,
        request: Request<QueryRequest>,
    ) -> Result<Response<Self::QueryStream>, Status> {
        let request = request.into_inner();
        debug!("query {:?} at {}", request.query, request.time_seconds);

        let started = Instant::now();
        let result = self
            .backend
            .query(
                &request.query,
                request.time_seconds,
                timeout_from_seconds(request.timeout_seconds),
            )
            .await;
        let response = self.finish("query", started, result)?;

        Ok(Response::new(self.stream("query", response)))
    }

    async fn query_range(
        &self,
        request: Request<QueryRangeRequest>,
    ) -> Result<Response<Self::QueryRangeStream>, Status> {
        let request = request.into_inner();
        debug!(
            "query_range {:?} from {} to {} every {}s",
            request.query,
            request.start_time_seconds,
            request.end_time_seconds,
            request.interval_seconds
        );

        let range = Range {
            start: request.start_time_seconds,
            end: request.end_time_seconds,
            step: Duration::from_secs(request.interval_seconds.try_into().unwrap_or_default()),
        };

        let started = Instant::now();
        let result = self
            .backend
            .query_range(
                &request.query,
                range,
                timeout_from_seconds(request.timeout_seconds),
            )
            .await;
        let response = self.finish("query_range", started, result)?;

        Ok(Response::new(self.stream("query_range", response)))
    }
}
