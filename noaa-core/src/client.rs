use async_trait::async_trait;
use log::{debug, error, info};
use reqwest::{Client, header::ACCEPT};
use serde_json::Value;
use std::{fmt::Debug, time::Duration};

use crate::{
    config::{ApiToken, Config},
    error::{FetchError, truncate_body},
    model::DataQuery,
};

pub const DATASETS_ENDPOINT: &str = "datasets";
pub const DATA_ENDPOINT: &str = "data";

/// Anything that can answer the probe and the observation query.
#[async_trait]
pub trait ObservationSource: Send + Sync + Debug {
    /// Cheap authenticated call used for connectivity diagnostics.
    async fn probe(&self) -> Result<Value, FetchError>;

    async fn fetch(&self, query: &DataQuery) -> Result<Value, FetchError>;
}

/// Client for the NOAA Climate Data Online v2 web services.
#[derive(Debug, Clone)]
pub struct CdoClient {
    base_url: String,
    token: ApiToken,
    http: Client,
}

impl CdoClient {
    pub fn new(
        base_url: impl Into<String>,
        token: ApiToken,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self::with_http(base_url, token, http))
    }

    /// Use a preconfigured `reqwest` client, e.g. one with custom proxy settings.
    pub fn with_http(base_url: impl Into<String>, token: ApiToken, http: Client) -> Self {
        Self { base_url: base_url.into(), token, http }
    }

    pub fn from_config(config: &Config) -> Result<Self, FetchError> {
        Self::new(config.api.base_url.as_str(), config.token.clone(), config.api.timeout())
    }

    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), endpoint.trim_start_matches('/'))
    }

    /// Authenticated GET against `endpoint`, decoded as JSON.
    pub async fn get_json(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<Value, FetchError> {
        let url = self.endpoint_url(endpoint);
        info!("Requesting: {url}");
        debug!("Params: {query:?}");

        let res = self
            .http
            .get(&url)
            .header("token", self.token.expose())
            .header(ACCEPT, "application/json")
            .query(query)
            .send()
            .await
            .inspect_err(|err| error!("Request to {url} failed: {err}"))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .inspect_err(|err| error!("Failed to read response body from {url}: {err}"))?;

        if !status.is_success() {
            error!("HTTP error occurred: {status} for {url} - {}", truncate_body(&body));
            return Err(FetchError::HttpStatus { status: status.as_u16(), body });
        }

        serde_json::from_str(&body).map_err(|err| {
            error!("Response from {url} is not JSON: {err}");
            FetchError::Decode(err)
        })
    }

    pub async fn datasets(&self) -> Result<Value, FetchError> {
        self.get_json(DATASETS_ENDPOINT, &[]).await
    }

    pub async fn data(&self, query: &DataQuery) -> Result<Value, FetchError> {
        self.get_json(DATA_ENDPOINT, &query.query_pairs()).await
    }
}

#[async_trait]
impl ObservationSource for CdoClient {
    async fn probe(&self) -> Result<Value, FetchError> {
        self.datasets().await
    }

    async fn fetch(&self, query: &DataQuery) -> Result<Value, FetchError> {
        self.data(query).await
    }
}
