use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use log::{debug, warn};
use reqwest::Client;
use url::Url;

use super::Collector;
use crate::error::{PipelensError, Result};
use crate::insights::{MetricsSnapshot, PipelineType};

const MAX_RETRIES: u32 = 3;
const RETRY_DELAY_SECONDS: u64 = 2;
const TOKEN_ENV: &str = "PIPELENS_TOKEN";

/// Fetches snapshots from an HTTP metrics endpoint.
pub struct HttpCollector {
    client: Client,
    pipeline: PipelineType,
    token: Option<String>,
    retry_delay: Duration,
}

impl HttpCollector {
    pub fn new(pipeline: PipelineType, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("pipelens/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PipelensError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            pipeline,
            token,
            retry_delay: Duration::from_secs(RETRY_DELAY_SECONDS),
        })
    }

    pub(super) fn factory(pipeline: PipelineType) -> Result<Arc<dyn Collector>> {
        let token = std::env::var(TOKEN_ENV).ok().filter(|t| !t.is_empty());
        Ok(Arc::new(Self::new(pipeline, token)?))
    }

    fn endpoint(&self, source: &str, lookback_days: u32) -> Result<Url> {
        let mut url = Url::parse(source)
            .map_err(|e| PipelensError::collection(source, format!("invalid URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("lookback_days", &lookback_days.to_string())
            .append_pair("pipeline", self.pipeline.as_str());
        Ok(url)
    }

    fn request(&self, url: Url) -> reqwest::RequestBuilder {
        let request = self.client.get(url);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// GET with retry on network errors, rate limits and server errors.
    async fn fetch(&self, source: &str, lookback_days: u32) -> Result<MetricsSnapshot> {
        let url = self.endpoint(source, lookback_days)?;
        debug!("Fetching {} snapshot from {url}", self.pipeline.label());

        let mut retry_count = 0;
        let response = loop {
            let response = match self.request(url.clone()).send().await {
                Ok(resp) => resp,
                Err(e) if (e.is_connect() || e.is_timeout()) && retry_count < MAX_RETRIES => {
                    warn!(
                        "Network error ({e}), retrying in {}s ({}/{MAX_RETRIES})...",
                        self.retry_delay.as_secs(),
                        retry_count + 1
                    );
                    tokio::time::sleep(self.retry_delay).await;
                    retry_count += 1;
                    continue;
                }
                Err(e) => return Err(PipelensError::collection(source, e.to_string())),
            };

            let status = response.status();
            if status == 429 || status.is_server_error() {
                if retry_count >= MAX_RETRIES {
                    return Err(PipelensError::collection(
                        source,
                        format!("HTTP {status} after {MAX_RETRIES} retries"),
                    ));
                }

                warn!(
                    "Metrics endpoint returned {status}. Waiting {}s before retry {}/{MAX_RETRIES}...",
                    self.retry_delay.as_secs(),
                    retry_count + 1
                );
                tokio::time::sleep(self.retry_delay).await;
                retry_count += 1;
                continue;
            }

            if !status.is_success() {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unable to read error response".to_string());
                return Err(PipelensError::collection(
                    source,
                    format!("HTTP {status}: {error_text}"),
                ));
            }

            break response;
        };

        let snapshot: MetricsSnapshot = response
            .json()
            .await
            .map_err(|e| PipelensError::collection(source, format!("invalid snapshot: {e}")))?;

        if snapshot.pipeline_type() != self.pipeline {
            return Err(PipelensError::collection(
                source,
                format!(
                    "snapshot is for the {} pipeline, expected {}",
                    snapshot.pipeline_type().label(),
                    self.pipeline.label()
                ),
            ));
        }

        Ok(snapshot)
    }
}

impl Collector for HttpCollector {
    fn kind(&self) -> &'static str {
        "http"
    }

    fn collect<'a>(
        &'a self,
        source: &'a str,
        lookback_days: u32,
    ) -> BoxFuture<'a, Result<MetricsSnapshot>> {
        Box::pin(self.fetch(source, lookback_days))
    }
}
