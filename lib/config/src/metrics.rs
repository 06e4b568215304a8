//! HTTP listener serving `/metrics`, `/-/healthy` and `/-/ready`.
//!
//! # Example
//! ```yaml
//! metrics:
//!   address: 0.0.0.0:9090
//!   shutdown_grace: 10s
//! ```

use std::{net::SocketAddr, time::Duration};

use serde::{Deserialize, Serialize};

use querybridge_common::prelude::*;

use crate::HostConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct MetricsConfig {
    pub host: HostConfig,
    /// How long open connections may take to drain once shutdown starts
    pub shutdown_grace: Duration,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct MetricsConfigHelper {
    address: Option<SocketAddr>,
    port: Option<u16>,
    #[serde(default, with = "humantime_serde")]
    shutdown_grace: Option<Duration>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        MetricsConfig {
            host: HostConfig::listen(DEFAULT_METRICS_LISTEN_PORT),
            shutdown_grace: DEFAULT_HTTP_SHUTDOWN_GRACE,
        }
    }
}

impl Serialize for MetricsConfig {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        MetricsConfigHelper {
            address: Some(self.host.address),
            port: Some(self.host.port),
            shutdown_grace: Some(self.shutdown_grace),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for MetricsConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let helper = MetricsConfigHelper::deserialize(deserializer)?;
        let host = HostConfig::from_parts(helper.address, helper.port)
            .map_err(serde::de::Error::custom)?;
        Ok(MetricsConfig {
            host,
            shutdown_grace: helper.shutdown_grace.unwrap_or(DEFAULT_HTTP_SHUTDOWN_GRACE),
        })
    }
}

impl MetricsConfig {
    pub fn address(&self) -> SocketAddr {
        self.host.address()
    }
}
