use async_trait::async_trait;
use chrono::Local;
use reqwest::Client;
use tracing::{debug, instrument};
use url::Url;

use super::{parse_response, FetchBatch, SeriesRequest, SeriesSource};
use crate::config::Config;
use crate::error::{Result, SyncError};

/// HTTP client for the timeseries endpoint. One POST per pull, no retries;
/// a timeout surfaces as [`SyncError::Network`].
#[derive(Debug, Clone)]
pub struct BlsClient {
    client: Client,
    api_url: Url,
    registration_key: Option<String>,
}

impl BlsClient {
    pub fn new(config: &Config) -> Result<Self> {
        let api_url = Url::parse(&config.api_url)
            .map_err(|e| SyncError::Config(format!("api_url `{}`: {}", config.api_url, e)))?;
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| SyncError::Config(format!("building HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_url,
            registration_key: config.registration_key.clone(),
        })
    }

    async fn post(&self, body: &SeriesRequest) -> Result<FetchBatch> {
        debug!(url = %self.api_url, series = body.seriesid.len(), "POST");
        let text = self
            .client
            .post(self.api_url.clone())
            .json(body)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        parse_response(&text, &body.seriesid)
    }
}

#[async_trait]
impl SeriesSource for BlsClient {
    #[instrument(level = "info", skip(self, series_ids), fields(series = series_ids.len()))]
    async fn fetch_full(&self, series_ids: &[String], lookback_months: u32) -> Result<FetchBatch> {
        let today = Local::now().date_naive();
        let body = SeriesRequest::full(
            series_ids,
            lookback_months,
            today,
            self.registration_key.as_deref(),
        );
        self.post(&body).await
    }

    #[instrument(level = "info", skip(self, series_ids), fields(series = series_ids.len()))]
    async fn fetch_latest(&self, series_ids: &[String]) -> Result<FetchBatch> {
        let body = SeriesRequest::latest(series_ids, self.registration_key.as_deref());
        self.post(&body).await
    }
}
