use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{debug, warn};
use url::Url;

use crate::error::{Result, SyncError};
use crate::series::{default_series, SeriesSpec};
use crate::store::TieBreak;

pub const DEFAULT_API_URL: &str = "https://api.bls.gov/publicAPI/v2/timeseries/data/";

const ENV_DATA_DIR: &str = "LABORSTATS_DATA_DIR";
const ENV_API_URL: &str = "BLS_API_URL";
const ENV_REGISTRATION_KEY: &str = "BLS_REGISTRATION_KEY";

/// Everything the fetcher and the store need, passed in explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_url: String,
    pub registration_key: Option<String>,
    pub data_dir: PathBuf,
    pub lookback_months: u32,
    pub request_timeout_secs: u64,
    pub tie_break: TieBreak,
    pub series: Vec<SeriesSpec>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            registration_key: None,
            data_dir: PathBuf::from("labor_statistics_api_data"),
            lookback_months: 12,
            request_timeout_secs: 30,
            tie_break: TieBreak::default(),
            series: default_series(),
        }
    }
}

impl Config {
    /// Load from an optional YAML file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(p) => Self::from_yaml_file(p)?,
            None => Self::default(),
        };
        let cfg = base.with_overrides(|key| env::var(key).ok());
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| SyncError::Config(format!("reading {}: {}", path.display(), e)))?;
        Self::from_yaml_str(&text)
            .map_err(|e| SyncError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_yaml_str(text: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    /// Apply overrides from a key lookup (the process environment in practice).
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_DATA_DIR) {
            debug!(dir = %dir, "data_dir overridden from environment");
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(url) = lookup(ENV_API_URL) {
            debug!(url = %url, "api_url overridden from environment");
            self.api_url = url;
        }
        if let Some(key) = lookup(ENV_REGISTRATION_KEY) {
            self.registration_key = Some(key);
        }
        self.registration_key = self
            .registration_key
            .take()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        self
    }

    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.api_url)
            .map_err(|e| SyncError::Config(format!("api_url `{}`: {}", self.api_url, e)))?;
        if self.lookback_months == 0 {
            return Err(SyncError::Config("lookback_months must be positive".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(SyncError::Config(
                "request_timeout_secs must be positive".into(),
            ));
        }
        if self.series.is_empty() {
            return Err(SyncError::Config("no series configured".into()));
        }
        for s in &self.series {
            if s.code.is_empty() || !s.code.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(SyncError::Config(format!(
                    "series code `{}` must be alphanumeric",
                    s.code
                )));
            }
        }
        if self.registration_key.is_none() {
            warn!("no registration key configured; the API applies its unregistered limits");
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
