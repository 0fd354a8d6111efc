use chrono::NaiveDate;
use serde::Serialize;
use std::{collections::BTreeMap, sync::Arc};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::calendar::SeriesTable;
use crate::config::Config;
use crate::error::{PartialDataError, Result, SyncError};
use crate::fetch::{BlsClient, FetchBatch, SeriesSource};
use crate::series::SeriesSpec;
use crate::store::{MergeOutcome, Synchronizer};

/// Result of bringing every tracked series onto disk.
#[derive(Debug, Default)]
pub struct InitReport {
    /// Series written by this call, with their row counts.
    pub initialized: BTreeMap<String, usize>,
    /// Series that already had a table and were left alone.
    pub already_present: Vec<String>,
    pub missing: Vec<PartialDataError>,
    pub failed: Vec<(String, SyncError)>,
}

/// Result of one latest pull merged into the store.
#[derive(Debug, Default)]
pub struct RefreshReport {
    pub merged: BTreeMap<String, MergeOutcome>,
    pub missing: Vec<PartialDataError>,
    pub failed: Vec<(String, SyncError)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeriesStatus {
    pub code: String,
    pub name: String,
    /// `None` when the series has no stored table.
    pub rows: Option<usize>,
    pub latest_date: Option<NaiveDate>,
}

/// Wires the fetcher, the store and the tracked series together.
///
/// `ensure_initialized` and `refresh_all` share one lock; a call made while
/// another is running fails with [`SyncError::RefreshInProgress`].
pub struct Dashboard {
    source: Arc<dyn SeriesSource>,
    store: Synchronizer,
    series: Vec<SeriesSpec>,
    lookback_months: u32,
    refresh_lock: Mutex<()>,
}

impl Dashboard {
    pub fn new(config: &Config, source: Arc<dyn SeriesSource>) -> Self {
        Self {
            source,
            store: Synchronizer::new(&config.data_dir, config.tie_break),
            series: config.series.clone(),
            lookback_months: config.lookback_months,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Dashboard backed by the live HTTP API.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = BlsClient::new(config)?;
        Ok(Self::new(config, Arc::new(client)))
    }

    pub fn series(&self) -> &[SeriesSpec] {
        &self.series
    }

    pub fn store(&self) -> &Synchronizer {
        &self.store
    }

    fn codes(&self) -> Vec<String> {
        self.series.iter().map(|s| s.code.clone()).collect()
    }

    /// Full pull for every tracked series without a stored table (or for all
    /// of them when `force` is set), then initialize those tables.
    pub async fn ensure_initialized(&self, force: bool) -> Result<InitReport> {
        let _guard = self
            .refresh_lock
            .try_lock()
            .map_err(|_| SyncError::RefreshInProgress)?;

        let mut report = InitReport::default();
        let mut pending = Vec::new();
        for code in self.codes() {
            if !force && self.store.has_table(&code) {
                report.already_present.push(code);
            } else {
                pending.push(code);
            }
        }
        if pending.is_empty() {
            info!("all series already initialized");
            return Ok(report);
        }

        info!(series = pending.len(), lookback_months = self.lookback_months, "full pull");
        let FetchBatch { series, missing } = self
            .source
            .fetch_full(&pending, self.lookback_months)
            .await?;
        report.missing = missing;

        for (code, rows) in series {
            match self.store.initialize(&code, &rows) {
                Ok(n) => {
                    report.initialized.insert(code, n);
                }
                Err(e) => {
                    error!(series = %code, error = %e, "initialize failed");
                    report.failed.push((code, e));
                }
            }
        }
        Ok(report)
    }

    /// Latest pull for every tracked series, merged into the stored tables.
    /// A series with no table yet is initialized from the pulled rows.
    pub async fn refresh_all(&self) -> Result<RefreshReport> {
        let _guard = self
            .refresh_lock
            .try_lock()
            .map_err(|_| SyncError::RefreshInProgress)?;

        let FetchBatch { series, missing } = self.source.fetch_latest(&self.codes()).await?;
        let mut report = RefreshReport {
            missing,
            ..RefreshReport::default()
        };

        for (code, rows) in series {
            let outcome = match self.store.merge(&code, &rows) {
                Err(SyncError::MissingSeries(_)) => {
                    warn!(series = %code, "no stored table; initializing from latest pull");
                    self.store.initialize(&code, &rows).map(|n| MergeOutcome {
                        total: n,
                        added: n,
                        ..MergeOutcome::default()
                    })
                }
                other => other,
            };
            match outcome {
                Ok(o) => {
                    report.merged.insert(code, o);
                }
                Err(e) => {
                    error!(series = %code, error = %e, "merge failed");
                    report.failed.push((code, e));
                }
            }
        }
        Ok(report)
    }

    /// Read a tracked series and derive its calendar columns.
    pub fn load_series(&self, code: &str) -> Result<SeriesTable> {
        if !self.series.iter().any(|s| s.code == code) {
            return Err(SyncError::UnknownSeries(code.to_string()));
        }
        let rows = self.store.load(code)?;
        Ok(SeriesTable::new(code, rows))
    }

    /// Every tracked series, each loaded independently.
    pub fn load_all(&self) -> Vec<(String, Result<SeriesTable>)> {
        self.series
            .iter()
            .map(|s| (s.code.clone(), self.load_series(&s.code)))
            .collect()
    }

    pub fn status(&self) -> Vec<SeriesStatus> {
        self.series
            .iter()
            .map(|s| {
                let table = self.load_series(&s.code);
                if let Err(e) = &table {
                    if !matches!(e, SyncError::MissingSeries(_)) {
                        warn!(series = %s.code, error = %e, "could not read table");
                    }
                }
                let table = table.ok();
                SeriesStatus {
                    code: s.code.clone(),
                    name: s.name.clone(),
                    rows: table.as_ref().map(|t| t.rows.len()),
                    latest_date: table.as_ref().and_then(SeriesTable::latest_date),
                }
            })
            .collect()
    }

    /// Tables in the data directory that belong to no tracked series.
    pub fn untracked_tables(&self) -> Result<Vec<String>> {
        let stored = self.store.stored_series()?;
        Ok(stored
            .into_iter()
            .filter(|code| !self.series.iter().any(|s| &s.code == code))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::{obs, Observation};
    use crate::series::default_series;
    use crate::store::TieBreak;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::tempdir;

    /// In-memory source answering from fixed batches.
    #[derive(Default)]
    struct StubSource {
        full: BTreeMap<String, Vec<Observation>>,
        latest: BTreeMap<String, Vec<Observation>>,
        delay: Option<Duration>,
        fail_latest: bool,
        calls: AtomicUsize,
    }

    impl StubSource {
        fn answer(
            table: &BTreeMap<String, Vec<Observation>>,
            ids: &[String],
        ) -> FetchBatch {
            let mut batch = FetchBatch::default();
            for id in ids {
                match table.get(id) {
                    Some(rows) => {
                        batch.series.insert(id.clone(), rows.clone());
                    }
                    None => batch.missing.push(PartialDataError { series: id.clone() }),
                }
            }
            batch
        }
    }

    #[async_trait]
    impl SeriesSource for StubSource {
        async fn fetch_full(&self, ids: &[String], _lookback: u32) -> Result<FetchBatch> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Self::answer(&self.full, ids))
        }

        async fn fetch_latest(&self, ids: &[String]) -> Result<FetchBatch> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(d) = self.delay {
                tokio::time::sleep(d).await;
            }
            if self.fail_latest {
                return Err(SyncError::Network("connection reset".into()));
            }
            Ok(Self::answer(&self.latest, ids))
        }
    }

    fn config(dir: &std::path::Path) -> Config {
        Config {
            data_dir: dir.to_path_buf(),
            tie_break: TieBreak::KeepLast,
            ..Config::default()
        }
    }

    fn monthly(year: &str, value: &str, latest: bool) -> Vec<Observation> {
        vec![
            obs(year, "M01", "January", "1", false),
            obs(year, "M02", "February", value, latest),
        ]
    }

    #[tokio::test]
    async fn test_one_missing_series_does_not_block_others() {
        let tmp = tempdir().unwrap();
        let codes: Vec<String> = default_series().into_iter().map(|s| s.code).collect();
        let mut stub = StubSource::default();
        for code in &codes[1..] {
            stub.full.insert(code.clone(), monthly("2024", "2", true));
        }
        let dash = Dashboard::new(&config(tmp.path()), Arc::new(stub));

        let report = dash.ensure_initialized(false).await.unwrap();
        assert_eq!(report.initialized.len(), 5);
        assert_eq!(report.missing, vec![PartialDataError { series: codes[0].clone() }]);
        assert!(report.failed.is_empty());
        for code in &codes[1..] {
            assert!(dash.store().has_table(code));
        }
        assert!(!dash.store().has_table(&codes[0]));
    }

    #[tokio::test]
    async fn test_initialize_skips_present_tables() {
        let tmp = tempdir().unwrap();
        let mut stub = StubSource::default();
        for s in default_series() {
            stub.full.insert(s.code, monthly("2024", "2", true));
        }
        let stub = Arc::new(stub);
        let dash = Dashboard::new(&config(tmp.path()), stub.clone());

        dash.ensure_initialized(false).await.unwrap();
        let again = dash.ensure_initialized(false).await.unwrap();
        assert_eq!(again.already_present.len(), 6);
        assert!(again.initialized.is_empty());
        // the second call never reached the network
        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refresh_merges_and_falls_back_to_initialize() {
        let tmp = tempdir().unwrap();
        let cfg = Config {
            series: vec![SeriesSpec::new("A1", "a"), SeriesSpec::new("B2", "b")],
            ..config(tmp.path())
        };
        let mut stub = StubSource::default();
        stub.latest
            .insert("A1".into(), vec![obs("2024", "M03", "March", "3", true)]);
        stub.latest
            .insert("B2".into(), vec![obs("2024", "M03", "March", "9", true)]);
        let dash = Dashboard::new(&cfg, Arc::new(stub));
        dash.store().initialize("A1", &monthly("2024", "2", true)).unwrap();

        let report = dash.refresh_all().await.unwrap();
        assert!(report.failed.is_empty());
        assert_eq!(report.merged["A1"].total, 3);
        assert_eq!(report.merged["A1"].added, 1);
        assert_eq!(report.merged["B2"].total, 1);
        assert_eq!(report.merged["B2"].added, 1);

        let table = dash.load_series("A1").unwrap();
        assert_eq!(table.rows.iter().filter(|r| r.observation.latest).count(), 1);
        assert_eq!(table.latest_date(), NaiveDate::from_ymd_opt(2024, 3, 1));

        // running it again adds nothing
        let again = dash.refresh_all().await.unwrap();
        assert_eq!(again.merged["A1"].added, 0);
        assert_eq!(again.merged["A1"].total, 3);
    }

    #[tokio::test]
    async fn test_refresh_reports_series_absent_from_latest_pull() {
        let tmp = tempdir().unwrap();
        let cfg = Config {
            series: vec![SeriesSpec::new("A1", "a"), SeriesSpec::new("B2", "b")],
            ..config(tmp.path())
        };
        let mut stub = StubSource::default();
        stub.latest
            .insert("A1".into(), vec![obs("2024", "M03", "March", "3", true)]);
        let dash = Dashboard::new(&cfg, Arc::new(stub));
        dash.store().initialize("A1", &monthly("2024", "2", true)).unwrap();
        dash.store().initialize("B2", &monthly("2024", "7", true)).unwrap();
        let b2_before = std::fs::read(dash.store().table_path("B2")).unwrap();

        let report = dash.refresh_all().await.unwrap();
        assert!(report.failed.is_empty());
        assert_eq!(report.merged.len(), 1);
        assert_eq!(report.merged["A1"].added, 1);
        assert_eq!(report.missing, vec![PartialDataError { series: "B2".into() }]);
        assert_eq!(
            std::fs::read(dash.store().table_path("B2")).unwrap(),
            b2_before
        );
    }

    #[tokio::test]
    async fn test_network_failure_surfaces_and_keeps_tables() {
        let tmp = tempdir().unwrap();
        let cfg = Config {
            series: vec![SeriesSpec::new("A1", "a")],
            ..config(tmp.path())
        };
        let stub = StubSource {
            fail_latest: true,
            ..StubSource::default()
        };
        let dash = Dashboard::new(&cfg, Arc::new(stub));
        dash.store().initialize("A1", &monthly("2024", "2", true)).unwrap();

        let err = dash.refresh_all().await.unwrap_err();
        assert!(matches!(err, SyncError::Network(_)));
        assert_eq!(dash.load_series("A1").unwrap().rows.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_refresh_is_rejected() {
        let tmp = tempdir().unwrap();
        let cfg = Config {
            series: vec![SeriesSpec::new("A1", "a")],
            ..config(tmp.path())
        };
        let mut stub = StubSource {
            delay: Some(Duration::from_millis(200)),
            ..StubSource::default()
        };
        stub.latest
            .insert("A1".into(), vec![obs("2024", "M03", "March", "3", true)]);
        let dash = Dashboard::new(&cfg, Arc::new(stub));

        let (first, second) = tokio::join!(dash.refresh_all(), dash.refresh_all());
        assert!(first.is_ok());
        assert!(matches!(second, Err(SyncError::RefreshInProgress)));
    }

    #[tokio::test]
    async fn test_load_and_status() {
        let tmp = tempdir().unwrap();
        let cfg = Config {
            series: vec![SeriesSpec::new("A1", "a"), SeriesSpec::new("B2", "b")],
            ..config(tmp.path())
        };
        let dash = Dashboard::new(&cfg, Arc::new(StubSource::default()));
        dash.store().initialize("A1", &monthly("2023", "2", true)).unwrap();

        assert!(matches!(
            dash.load_series("ZZ"),
            Err(SyncError::UnknownSeries(_))
        ));
        assert!(matches!(
            dash.load_series("B2"),
            Err(SyncError::MissingSeries(_))
        ));

        let status = dash.status();
        assert_eq!(status[0].rows, Some(2));
        assert_eq!(status[0].latest_date, NaiveDate::from_ymd_opt(2023, 2, 1));
        assert_eq!(status[1].rows, None);
    }

    #[tokio::test]
    async fn test_untracked_tables_listed() {
        let tmp = tempdir().unwrap();
        let cfg = Config {
            series: vec![SeriesSpec::new("A1", "a")],
            ..config(tmp.path())
        };
        let dash = Dashboard::new(&cfg, Arc::new(StubSource::default()));
        assert!(dash.untracked_tables().unwrap().is_empty());

        dash.store().initialize("A1", &monthly("2023", "2", true)).unwrap();
        dash.store().initialize("OLD9", &monthly("2020", "2", true)).unwrap();
        assert_eq!(dash.untracked_tables().unwrap(), vec!["OLD9".to_string()]);
    }
}
