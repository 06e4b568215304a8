//! Translation between backend results and wire messages.

use std::fmt::Display;

use querybridge_common::model::{Labels, QueryValue, Sample};

use crate::proto::prometheus_copy::{self, TimeSeries};
use crate::proto::thanos::{Label, LabelMatcher, label_matcher};

impl From<Sample> for prometheus_copy::Sample {
    fn from(sample: Sample) -> Self {
        prometheus_copy::Sample {
            value: sample.value,
            timestamp: sample.timestamp,
        }
    }
}

pub(crate) fn labels(metric: Labels) -> Vec<Label> {
    metric
        .into_iter()
        .map(|(name, value)| Label { name, value })
        .collect()
}

/// One wire series per backend series. A scalar becomes a single series
/// with no labels.
pub(crate) fn time_series(value: QueryValue) -> Vec<TimeSeries> {
    match value {
        QueryValue::Vector(vector) => vector
            .into_iter()
            .map(|s| TimeSeries {
                labels: labels(s.metric),
                samples: vec![s.sample.into()],
            })
            .collect(),
        QueryValue::Matrix(matrix) => matrix
            .into_iter()
            .map(|s| TimeSeries {
                labels: labels(s.metric),
                samples: s.samples.into_iter().map(Into::into).collect(),
            })
            .collect(),
        QueryValue::Scalar(sample) => vec![TimeSeries {
            labels: Vec::new(),
            samples: vec![sample.into()],
        }],
    }
}

impl LabelMatcher {
    /// PromQL form of the matcher, e.g. `job=~"api|web"`.
    pub(crate) fn prom_string(&self) -> String {
        let op = match self.r#type() {
            label_matcher::Type::Eq => "=",
            label_matcher::Type::Neq => "!=",
            label_matcher::Type::Re => "=~",
            label_matcher::Type::Nre => "!~",
        };
        format!("{}{}{}", self.name, op, quote(&self.value))
    }
}

/// Double-quoted string literal, escaped the way PromQL's Go parser expects.
fn quote(value: &str) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{07}' => out.push_str("\\a"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{0b}' => out.push_str("\\v"),
            c if printable(c) => out.push(c),
            c if (c as u32) < 0x20 || c == '\u{7f}' => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c if (c as u32) < 0x10000 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => {
                let _ = write!(out, "\\U{:08x}", c as u32);
            }
        }
    }
    out.push('"');
    out
}

/// Plain space is the only printable whitespace; controls and invisible
/// format characters are escaped.
fn printable(c: char) -> bool {
    if c == ' ' {
        return true;
    }
    !(c.is_control()
        || c.is_whitespace()
        || matches!(
            c,
            '\u{ad}'
                | '\u{200b}'..='\u{200f}'
                | '\u{2060}'..='\u{2064}'
                | '\u{feff}'
                | '\u{e0001}'
                | '\u{e0020}'..='\u{e007f}'
        ))
}

/// gRPC status messages travel in a trailer; oversized ones are replaced
/// by the transport with `RESOURCE_EXHAUSTED`.
const MAX_STATUS_MESSAGE: usize = 1024;

pub(crate) fn status_message(err: &impl Display) -> String {
    let message = err.to_string();
    if message.len() <= MAX_STATUS_MESSAGE {
        return message;
    }
    let mut end = MAX_STATUS_MESSAGE;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &message[..end])
}

pub(crate) fn matchers(matchers: &[LabelMatcher]) -> Vec<String> {
    matchers.iter().map(LabelMatcher::prom_string).collect()
}
