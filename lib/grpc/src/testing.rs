//! In-memory backend for service tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use querybridge_backend::{Backend, BackendError, Result};
use querybridge_common::model::{QueryValue, Range, Response};

#[derive(Default)]
pub(crate) struct FakeBackend {
    pub value: Option<QueryValue>,
    pub labels: Vec<String>,
    pub warnings: Vec<String>,
    pub fail: bool,
    pub error: Option<String>,
    pub calls: AtomicUsize,
    pub seen: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub fn returning(value: QueryValue) -> Self {
        Self {
            value: Some(value),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn failing_with(message: impl Into<String>) -> Self {
        Self {
            fail: true,
            error: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record(&self, call: String) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(call);
        if self.fail {
            return Err(BackendError::Api {
                error_type: "execution".into(),
                message: self
                    .error
                    .clone()
                    .unwrap_or_else(|| "backend unavailable".into()),
            });
        }
        Ok(())
    }

    fn query_response(&self) -> Result<Response<QueryValue>> {
        let value = self
            .value
            .clone()
            .unwrap_or(QueryValue::Vector(Vec::new()));
        Ok(Response::new(value).with_warnings(self.warnings.clone()))
    }

    fn label_response(&self) -> Result<Response<Vec<String>>> {
        Ok(Response::new(self.labels.clone()).with_warnings(self.warnings.clone()))
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn query(
        &self,
        query: &str,
        time: i64,
        timeout: Option<Duration>,
    ) -> Result<Response<QueryValue>> {
        self.record(format!("query {} {} {:?}", query, time, timeout))?;
        self.query_response()
    }

    async fn query_range(
        &self,
        query: &str,
        range: Range,
        timeout: Option<Duration>,
    ) -> Result<Response<QueryValue>> {
        self.record(format!(
            "query_range {} {} {} {:?} {:?}",
            query, range.start, range.end, range.step, timeout
        ))?;
        self.query_response()
    }

    async fn label_names(
        &self,
        matchers: &[String],
        start: i64,
        end: i64,
    ) -> Result<Response<Vec<String>>> {
        self.record(format!("label_names {:?} {} {}", matchers, start, end))?;
        self.label_response()
    }

    async fn label_values(
        &self,
        label: &str,
        matchers: &[String],
        start: i64,
        end: i64,
    ) -> Result<Response<Vec<String>>> {
        self.record(format!(
            "label_values {} {:?} {} {}",
            label, matchers, start, end
        ))?;
        self.label_response()
    }
}
