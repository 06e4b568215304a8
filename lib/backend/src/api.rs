//! Prometheus HTTP API response envelope.
//!
//! ```json
//! {"status": "success", "data": {...}, "warnings": ["..."]}
//! {"status": "error", "errorType": "bad_data", "error": "..."}
//! ```
//!
//! Sample pairs arrive as `[<unix seconds as float>, "<value as string>"]`.

use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use querybridge_common::model::{InstantSample, Labels, QueryValue, RangeSeries, Response, Sample};

use crate::error::{BackendError, Result};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<T> {
    status: String,
    data: Option<T>,
    error_type: Option<String>,
    error: Option<String>,
    #[serde(default)]
    warnings: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QueryData {
    result_type: String,
    result: Value,
}

type SamplePair = (f64, String);

#[derive(Deserialize)]
struct VectorElement {
    #[serde(default)]
    metric: Labels,
    value: Option<SamplePair>,
}

#[derive(Deserialize)]
struct MatrixElement {
    #[serde(default)]
    metric: Labels,
    #[serde(default)]
    values: Vec<SamplePair>,
    #[serde(default)]
    histograms: Vec<Value>,
}

/// Longest slice of an unexpected response body kept in an error.
const MAX_ERROR_BODY: usize = 512;

/// Status codes on which the body still carries a JSON error envelope.
fn is_api_error(status: StatusCode) -> bool {
    matches!(status.as_u16(), 400 | 422 | 503)
}

pub(crate) fn decode<T: DeserializeOwned>(status: StatusCode, body: &[u8]) -> Result<Response<T>> {
    if !status.is_success() && !is_api_error(status) {
        return Err(BackendError::Status {
            status,
            body: error_body(body),
        });
    }

    let envelope: Envelope<T> = serde_json::from_slice(body).map_err(|e| {
        if status.is_success() {
            BackendError::Decode(e.to_string())
        } else {
            BackendError::Status {
                status,
                body: error_body(body),
            }
        }
    })?;

    if envelope.status == "error" {
        return Err(BackendError::Api {
            error_type: envelope.error_type.unwrap_or_else(|| "unknown".to_string()),
            message: envelope.error.unwrap_or_default(),
        });
    }

    let data = envelope
        .data
        .ok_or_else(|| BackendError::Decode("response has no data".to_string()))?;

    Ok(Response::new(data).with_warnings(envelope.warnings))
}

/// Proxies answer with whole HTML pages; keep only the start.
fn error_body(body: &[u8]) -> String {
    let body = String::from_utf8_lossy(body);
    let body = body.trim();
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

impl TryFrom<QueryData> for QueryValue {
    type Error = BackendError;

    fn try_from(data: QueryData) -> Result<Self> {
        match data.result_type.as_str() {
            "vector" => {
                let elements: Vec<VectorElement> = serde_json::from_value(data.result)?;
                elements
                    .into_iter()
                    .map(|e| {
                        let pair = e.value.ok_or_else(|| {
                            BackendError::Decode(
                                "native histogram samples are not supported".to_string(),
                            )
                        })?;
                        Ok(InstantSample {
                            metric: e.metric,
                            sample: sample(pair)?,
                        })
                    })
                    .collect::<Result<Vec<_>>>()
                    .map(QueryValue::Vector)
            }
            "matrix" => {
                let elements: Vec<MatrixElement> = serde_json::from_value(data.result)?;
                elements
                    .into_iter()
                    .map(|e| {
                        if e.values.is_empty() && !e.histograms.is_empty() {
                            return Err(BackendError::Decode(
                                "native histogram samples are not supported".to_string(),
                            ));
                        }
                        Ok(RangeSeries {
                            metric: e.metric,
                            samples: e.values.into_iter().map(sample).collect::<Result<_>>()?,
                        })
                    })
                    .collect::<Result<Vec<_>>>()
                    .map(QueryValue::Matrix)
            }
            "scalar" => {
                let pair: SamplePair = serde_json::from_value(data.result)?;
                Ok(QueryValue::Scalar(sample(pair)?))
            }
            other => Err(BackendError::Decode(format!(
                "unsupported result type {:?}",
                other
            ))),
        }
    }
}

fn sample((seconds, value): SamplePair) -> Result<Sample> {
    let value = value
        .parse::<f64>()
        .map_err(|e| BackendError::Decode(format!("invalid sample value {:?}: {}", value, e)))?;
    Ok(Sample::new((seconds * 1000.0).round() as i64, value))
}
