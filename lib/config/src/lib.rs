//! Configuration management for querybridge.
//!
//! Uses [Config](https://docs.rs/config/latest/config/index.html), supports loading from:
//! - Configuration files (YAML, JSON, TOML)
//! - Environment variables (QUERYBRIDGE_ prefix, `__` between nested keys)
//! - Defaults
//!
//! Environment variables override file settings, e.g.
//! `QUERYBRIDGE_QUERY_TARGET_URL` or `QUERYBRIDGE_AUTH__SCOPES=a,b`.

use std::{
    net::{Ipv4Addr, SocketAddr, SocketAddrV4},
    path::Path,
    time::Duration,
};

use anyhow::{Context, Result, anyhow};
use config::Config;
use serde::{Deserialize, Serialize};
use url::Url;

pub mod auth;
pub mod metrics;

mod tests;

pub use auth::AuthConfig;
pub use metrics::MetricsConfig;

use querybridge_common::prelude::*;

/// Listen address for one of the servers.
///
/// Accepts `address`, `port`, or both; a port given separately fills in an
/// address that has none (`0.0.0.0:0`).
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct HostConfig {
    pub address: SocketAddr,
    pub port: u16,
}

impl<'de> Deserialize<'de> for HostConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct HostConfigHelper {
            address: Option<SocketAddr>,
            port: Option<u16>,
        }

        let helper = HostConfigHelper::deserialize(deserializer)?;
        HostConfig::from_parts(helper.address, helper.port).map_err(serde::de::Error::custom)
    }
}

impl HostConfig {
    pub(crate) fn from_parts(
        address: Option<SocketAddr>,
        port: Option<u16>,
    ) -> Result<Self, &'static str> {
        let (address, port) = match (address, port) {
            (None, None) => return Err("listener requires either 'address' or 'port'"),
            (Some(address), Some(port)) => (address, port),
            (Some(address), None) => (address, address.port()),
            (None, Some(port)) => (HostConfig::unspecified(), port),
        };
        Ok(HostConfig { address, port })
    }

    /// All interfaces on `port`.
    pub fn listen(port: u16) -> Self {
        HostConfig {
            address: Self::unspecified(),
            port,
        }
    }

    fn unspecified() -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0))
    }

    pub fn address(&self) -> SocketAddr {
        if self.address.port() == 0 {
            let mut addr = self.address;
            addr.set_port(self.port);
            addr
        } else {
            self.address
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
struct BridgeConfigOptions {
    /// Base URL of the Prometheus-compatible HTTP API queries are forwarded to
    #[serde(default)]
    query_target_url: String,

    /// Credentials used to authenticate against the backend
    #[serde(default)]
    auth: AuthConfig,

    /// Default timeout for every backend HTTP request
    #[serde(default, with = "humantime_serde")]
    timeout: Option<Duration>,

    /// gRPC listener for the query, store and info services
    grpc: HostConfig,

    /// HTTP listener for /metrics and health endpoints
    metrics: MetricsConfig,
}

impl Default for BridgeConfigOptions {
    fn default() -> Self {
        BridgeConfigOptions {
            query_target_url: String::new(),
            auth: AuthConfig::default(),
            timeout: None,
            grpc: HostConfig::listen(DEFAULT_GRPC_LISTEN_PORT),
            metrics: MetricsConfig::default(),
        }
    }
}

/// Everything needed to build the backend client.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub query_target_url: Url,
    /// `query_target_url` as configured, before URL normalization.
    pub query_target: String,
    pub auth: AuthConfig,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub backend: BackendConfig,
    pub grpc: HostConfig,
    pub metrics: MetricsConfig,
}

impl BridgeConfig {
    /// Defaults overridden by environment variables only.
    pub fn new() -> Result<Self> {
        Self::load::<config::FileSourceString>(None)
    }

    pub fn from_file(file: impl AsRef<Path>) -> Result<Self> {
        let file = file.as_ref();
        Self::load(Some(config::File::from(file)))
            .with_context(|| format!("error loading config file {}", file.display()))
    }

    pub fn from_yaml(s: &str) -> Result<Self> {
        Self::load(Some(config::File::from_str(s, config::FileFormat::Yaml)))
    }

    pub fn from_json(s: &str) -> Result<Self> {
        Self::load(Some(config::File::from_str(s, config::FileFormat::Json)))
    }

    fn load<T>(file: Option<config::File<T, config::FileFormat>>) -> Result<Self>
    where
        config::File<T, config::FileFormat>: config::Source + Send + Sync + 'static,
    {
        let mut builder = Config::builder().add_source(config::File::from_str(
            serde_json::to_string(&BridgeConfigOptions::default())?.as_str(),
            config::FileFormat::Json,
        ));

        if let Some(file) = file {
            builder = builder.add_source(file);
        }

        let built = builder
            .add_source(
                config::Environment::with_prefix("QUERYBRIDGE")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("auth.scopes")
                    .try_parsing(true),
            )
            .build()?;

        let options: BridgeConfigOptions = built.try_deserialize()?;
        Self::check(options)
    }

    fn check(options: BridgeConfigOptions) -> Result<Self> {
        if options.query_target_url.trim().is_empty() {
            return Err(anyhow!("query_target_url needs to be set"));
        }

        let query_target_url = Url::parse(options.query_target_url.trim())
            .with_context(|| format!("invalid query_target_url {:?}", options.query_target_url))?;

        if !matches!(query_target_url.scheme(), "http" | "https") {
            return Err(anyhow!(
                "query_target_url must be an http or https URL, got {}",
                query_target_url
            ));
        }

        if options.auth.is_anonymous() {
            log::warn!("no credentials or scopes configured; backend requests are unauthenticated");
        }

        Ok(BridgeConfig {
            backend: BackendConfig {
                query_target_url,
                query_target: options.query_target_url.trim().to_string(),
                auth: options.auth,
                timeout: options.timeout,
            },
            grpc: options.grpc,
            metrics: options.metrics,
        })
    }
}
