use chrono::{Datelike, Months, NaiveDate};
use serde::Serialize;

/// POST body understood by the timeseries endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesRequest {
    pub seriesid: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub startyear: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endyear: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registrationkey: Option<String>,
}

impl SeriesRequest {
    /// Year range covering `lookback_months` before `today` up to this year.
    pub fn full(
        series_ids: &[String],
        lookback_months: u32,
        today: NaiveDate,
        registration_key: Option<&str>,
    ) -> Self {
        let start = today
            .checked_sub_months(Months::new(lookback_months))
            .unwrap_or(NaiveDate::MIN);
        Self {
            seriesid: series_ids.to_vec(),
            startyear: Some(start.year().to_string()),
            endyear: Some(today.year().to_string()),
            latest: None,
            registrationkey: registration_key.map(str::to_string),
        }
    }

    /// Only the newest observation of each series.
    pub fn latest(series_ids: &[String], registration_key: Option<&str>) -> Self {
        Self {
            seriesid: series_ids.to_vec(),
            startyear: None,
            endyear: None,
            latest: Some(true),
            registrationkey: registration_key.map(str::to_string),
        }
    }
}
