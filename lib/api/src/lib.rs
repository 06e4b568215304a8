//! Operational HTTP endpoints: Prometheus metrics and health probes.

mod routes;
mod server;

use querybridge_common::metrics::Metrics;

pub use server::{serve, serve_with_listener};

#[derive(Clone)]
pub(crate) struct ApiState {
    pub metrics: Metrics,
}
