use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::FetchBatch;
use crate::error::{PartialDataError, Result, SyncError};
use crate::observation::{canonical_year, parse_flag, Observation};

const STATUS_OK: &str = "REQUEST_SUCCEEDED";

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Vec<String>,
    #[serde(rename = "Results", default)]
    results: Option<ApiResults>,
}

#[derive(Debug, Deserialize)]
struct ApiResults {
    #[serde(default)]
    series: Vec<ApiSeries>,
}

#[derive(Debug, Deserialize)]
struct ApiSeries {
    #[serde(rename = "seriesID")]
    series_id: String,
    #[serde(default)]
    data: Vec<ApiObservation>,
}

#[derive(Debug, Deserialize)]
struct ApiObservation {
    #[serde(deserialize_with = "text_or_number")]
    year: String,
    period: String,
    #[serde(rename = "periodName")]
    period_name: String,
    #[serde(deserialize_with = "text_or_number")]
    value: String,
    #[serde(default)]
    footnotes: Vec<Value>,
    #[serde(default, deserialize_with = "flag")]
    latest: bool,
}

impl From<ApiObservation> for Observation {
    fn from(o: ApiObservation) -> Self {
        Observation {
            year: canonical_year(&o.year),
            period: o.period,
            period_name: o.period_name,
            value: o.value,
            footnotes: flatten_footnotes(&o.footnotes),
            latest: o.latest,
        }
    }
}

fn text_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected text or number, got {}",
            other
        ))),
    }
}

fn flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Bool(b) => Ok(b),
        Value::Null => Ok(false),
        Value::String(s) => {
            parse_flag(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid flag `{}`", s)))
        }
        other => Err(serde::de::Error::custom(format!("invalid flag {}", other))),
    }
}

/// `[{"code":"P","text":"preliminary"},{}]` → `"preliminary"`.
fn flatten_footnotes(notes: &[Value]) -> String {
    notes
        .iter()
        .filter_map(|n| n.get("text").and_then(Value::as_str))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Decode a response body and split it per requested series.
///
/// A bad body or a non-success status fails the whole batch. A requested
/// series missing from an otherwise good body lands in `missing`.
pub fn parse_response(body: &str, requested: &[String]) -> Result<FetchBatch> {
    let resp: ApiResponse = serde_json::from_str(body)
        .map_err(|e| SyncError::Api(format!("undecodable response: {}", e)))?;

    let messages = resp.message.join("; ");
    if let Some(status) = resp.status.as_deref() {
        if status != STATUS_OK {
            return Err(SyncError::Api(format!("{}: {}", status, messages)));
        }
    }
    let results = resp
        .results
        .ok_or_else(|| SyncError::Api(format!("response has no Results payload: {}", messages)))?;

    for m in &resp.message {
        warn!(message = %m, "API message");
    }

    let mut by_id: BTreeMap<String, Vec<Observation>> = results
        .series
        .into_iter()
        .map(|s| {
            let rows = s.data.into_iter().map(Observation::from).collect();
            (s.series_id, rows)
        })
        .collect();

    let mut batch = FetchBatch::default();
    for id in requested {
        match by_id.remove(id) {
            Some(rows) => {
                debug!(series = %id, rows = rows.len(), "received");
                batch.series.insert(id.clone(), rows);
            }
            None => {
                let err = PartialDataError { series: id.clone() };
                warn!(series = %id, "{}", err);
                batch.missing.push(err);
            }
        }
    }
    for extra in by_id.keys() {
        debug!(series = %extra, "ignoring unrequested series in response");
    }
    Ok(batch)
}
