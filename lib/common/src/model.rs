//! Backend-neutral query results.
//!
//! These are the shapes the HTTP backend decodes into and the gRPC layer
//! translates out of. All of them are request scoped.

use std::collections::BTreeMap;
use std::time::Duration;

/// Label set of a single series. Names are unique by construction.
pub type Labels = BTreeMap<String, String>;

/// A single value at a point in time.
///
/// `timestamp` is milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub timestamp: i64,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: i64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// One element of an instant vector.
#[derive(Debug, Clone, PartialEq)]
pub struct InstantSample {
    pub metric: Labels,
    pub sample: Sample,
}

/// One element of a range matrix; samples keep backend order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RangeSeries {
    pub metric: Labels,
    pub samples: Vec<Sample>,
}

/// Result of an instant or range query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    Vector(Vec<InstantSample>),
    Matrix(Vec<RangeSeries>),
    Scalar(Sample),
}

impl QueryValue {
    pub fn kind(&self) -> &'static str {
        match self {
            QueryValue::Vector(_) => "vector",
            QueryValue::Matrix(_) => "matrix",
            QueryValue::Scalar(_) => "scalar",
        }
    }

    /// Number of series the translated result will contain.
    pub fn series_count(&self) -> usize {
        match self {
            QueryValue::Vector(v) => v.len(),
            QueryValue::Matrix(m) => m.len(),
            QueryValue::Scalar(_) => 1,
        }
    }
}

/// Payload of a successful backend call with the warnings the backend
/// attached to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Response<T> {
    pub data: T,
    pub warnings: Vec<String>,
}

impl<T> Response<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }
}

/// Evaluation window of a range query, all in seconds since the epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: i64,
    pub end: i64,
    pub step: Duration,
}

/// Converts a caller-supplied timeout in whole seconds. Zero or negative
/// means the caller did not ask for one.
pub fn timeout_from_seconds(seconds: i64) -> Option<Duration> {
    u64::try_from(seconds)
        .ok()
        .filter(|s| *s > 0)
        .map(Duration::from_secs)
}
