//! Prometheus instrumentation shared by the gRPC services and exposed by
//! the HTTP listener.

use std::time::Duration;

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

const NAMESPACE: &str = "querybridge";

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    requests: IntCounterVec,
    backend_duration: HistogramVec,
    series_sent: IntCounterVec,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new("grpc_requests_total", "Handled gRPC requests by method and status code")
                .namespace(NAMESPACE),
            &["method", "code"],
        )?;
        let backend_duration = HistogramVec::new(
            HistogramOpts::new(
                "backend_request_duration_seconds",
                "Latency of calls to the query backend",
            )
            .namespace(NAMESPACE)
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
            &["method"],
        )?;
        let series_sent = IntCounterVec::new(
            Opts::new("series_sent_total", "Series streamed to gRPC clients")
                .namespace(NAMESPACE),
            &["method"],
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(backend_duration.clone()))?;
        registry.register(Box::new(series_sent.clone()))?;

        #[cfg(target_os = "linux")]
        registry.register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))?;

        Ok(Self {
            registry,
            requests,
            backend_duration,
            series_sent,
        })
    }

    pub fn observe_request(&self, method: &str, code: &str) {
        self.requests.with_label_values(&[method, code]).inc();
    }

    pub fn observe_backend(&self, method: &str, elapsed: Duration) {
        self.backend_duration
            .with_label_values(&[method])
            .observe(elapsed.as_secs_f64());
    }

    pub fn series_sent(&self, method: &str) {
        self.series_sent.with_label_values(&[method]).inc();
    }

    /// Render every registered metric in the text exposition format.
    pub fn render(&self) -> prometheus::Result<(String, Vec<u8>)> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok((encoder.format_type().to_string(), buffer))
    }
}
