//! Client side of the bridge: forwards queries and label lookups to a
//! Prometheus-compatible HTTP API.
//!
//! # Design Notes
//! The gRPC services only see the [`Backend`] trait, so tests can swap in
//! an in-memory implementation. [`HttpBackend`] is the real one: it speaks
//! the `/api/v1` endpoints, attaches credentials and enforces per-call
//! timeouts.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use querybridge_common::model::{QueryValue, Range, Response};
use querybridge_config::BackendConfig;

mod api;
mod auth;
pub mod client;
pub mod error;

pub use client::HttpBackend;
pub use error::{BackendError, Result};

#[async_trait]
pub trait Backend: Send + Sync {
    /// Instant query evaluated at `time` (seconds since the epoch).
    async fn query(
        &self,
        query: &str,
        time: i64,
        timeout: Option<Duration>,
    ) -> Result<Response<QueryValue>>;

    async fn query_range(
        &self,
        query: &str,
        range: Range,
        timeout: Option<Duration>,
    ) -> Result<Response<QueryValue>>;

    /// `matchers` are rendered matcher expressions such as `job="api"`;
    /// a series has to satisfy all of them.
    async fn label_names(
        &self,
        matchers: &[String],
        start: i64,
        end: i64,
    ) -> Result<Response<Vec<String>>>;

    async fn label_values(
        &self,
        label: &str,
        matchers: &[String],
        start: i64,
        end: i64,
    ) -> Result<Response<Vec<String>>>;
}

/// Builds the HTTP backend described by `config`.
pub fn connect(config: &BackendConfig) -> Result<Arc<dyn Backend>> {
    log::info!("Forwarding queries to {}", config.query_target_url);
    Ok(Arc::new(HttpBackend::new(config)?))
}
