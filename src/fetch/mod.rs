// src/fetch/mod.rs

pub mod client;
pub mod request;
pub mod response;

pub use client::BlsClient;
pub use request::SeriesRequest;
pub use response::parse_response;

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::error::{PartialDataError, Result};
use crate::observation::Observation;

/// Rows per series from one bulk request, plus the requested series the
/// response left out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchBatch {
    pub series: BTreeMap<String, Vec<Observation>>,
    pub missing: Vec<PartialDataError>,
}

/// Anything that can answer full and latest pulls for a set of series.
#[async_trait]
pub trait SeriesSource: Send + Sync {
    /// Every observation from `lookback_months` ago through the current year.
    async fn fetch_full(&self, series_ids: &[String], lookback_months: u32) -> Result<FetchBatch>;

    /// The newest observation(s) of each series.
    async fn fetch_latest(&self, series_ids: &[String]) -> Result<FetchBatch>;
}
