//! HTTP client for the Prometheus query API.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::{debug, trace};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use querybridge_common::model::{QueryValue, Range, Response};
use querybridge_config::BackendConfig;

use crate::Backend;
use crate::api::{self, QueryData};
use crate::auth::Credentials;
use crate::error::{BackendError, Result};

pub struct HttpBackend {
    base: Url,
    http: reqwest::Client,
    credentials: Credentials,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("querybridge/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        let credentials = Credentials::from_config(&config.auth, http.clone())?;

        Ok(Self {
            base: config.query_target_url.clone(),
            http,
            credentials,
        })
    }

    /// Appends `segments` to the configured base path, keeping any prefix
    /// such as `/v1/projects/x/location/global/prometheus`.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.set_query(None);
        url.path_segments_mut()
            .map_err(|_| BackendError::Transport(format!("{} cannot be a base URL", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        params: Vec<(&str, String)>,
        timeout: Option<Duration>,
    ) -> Result<Response<T>> {
        debug!("{} {} {:?}", method, url, params);

        let request = if method == Method::GET {
            self.http.get(url).query(&params)
        } else {
            self.http.request(method, url).form(&params)
        };

        // Token fetches count against the caller's timeout too.
        let exchange = async {
            let request = self.credentials.authorize(request).await?;
            let response = request.send().await?;
            let status: StatusCode = response.status();
            let body = response.bytes().await?;
            trace!("backend answered {} with {} bytes", status, body.len());
            api::decode(status, &body)
        };

        match timeout {
            Some(limit) => tokio::time::timeout(limit, exchange)
                .await
                .map_err(|_| BackendError::Timeout(limit))?,
            None => exchange.await,
        }
    }
}

/// Combines every matcher into one selector, `{a="b",c=~"d"}`, so the
/// backend intersects them instead of returning the union.
fn selector(matchers: &[String]) -> Option<String> {
    if matchers.is_empty() {
        None
    } else {
        Some(format!("{{{}}}", matchers.join(",")))
    }
}

fn timeout_param(params: &mut Vec<(&str, String)>, timeout: Option<Duration>) {
    if let Some(timeout) = timeout {
        params.push(("timeout", format!("{}s", timeout.as_secs_f64())));
    }
}

fn window_params(params: &mut Vec<(&str, String)>, matchers: &[String], start: i64, end: i64) {
    if let Some(selector) = selector(matchers) {
        params.push(("match[]", selector));
    }
    params.push(("start", start.to_string()));
    params.push(("end", end.to_string()));
}

fn into_query_value(response: Response<QueryData>) -> Result<Response<QueryValue>> {
    let value = QueryValue::try_from(response.data)?;
    Ok(Response::new(value).with_warnings(response.warnings))
}

#[async_trait]
impl Backend for HttpBackend {
    async fn query(
        &self,
        query: &str,
        time: i64,
        timeout: Option<Duration>,
    ) -> Result<Response<QueryValue>> {
        let started = Instant::now();
        let mut params = vec![("query", query.to_string()), ("time", time.to_string())];
        timeout_param(&mut params, timeout);

        let url = self.endpoint(&["api", "v1", "query"])?;
        let response = self.call(Method::POST, url, params, timeout).await?;
        debug!("instant query answered in {:?}", started.elapsed());
        into_query_value(response)
    }

    async fn query_range(
        &self,
        query: &str,
        range: Range,
        timeout: Option<Duration>,
    ) -> Result<Response<QueryValue>> {
        let mut params = vec![
            ("query", query.to_string()),
            ("start", range.start.to_string()),
            ("end", range.end.to_string()),
            ("step", format!("{}s", range.step.as_secs_f64())),
        ];
        timeout_param(&mut params, timeout);

        let url = self.endpoint(&["api", "v1", "query_range"])?;
        into_query_value(self.call(Method::POST, url, params, timeout).await?)
    }

    async fn label_names(
        &self,
        matchers: &[String],
        start: i64,
        end: i64,
    ) -> Result<Response<Vec<String>>> {
        let mut params = Vec::new();
        window_params(&mut params, matchers, start, end);

        let url = self.endpoint(&["api", "v1", "labels"])?;
        self.call(Method::POST, url, params, None).await
    }

    async fn label_values(
        &self,
        label: &str,
        matchers: &[String],
        start: i64,
        end: i64,
    ) -> Result<Response<Vec<String>>> {
        let mut params = Vec::new();
        window_params(&mut params, matchers, start, end);

        let url = self.endpoint(&["api", "v1", "label", label, "values"])?;
        self.call(Method::GET, url, params, None).await
    }
}
