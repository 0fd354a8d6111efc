// src/store/mod.rs

pub mod merge;

pub use merge::{merge_rows, MergeOutcome, TieBreak};

use csv::{ReaderBuilder, WriterBuilder};
use glob::glob;
use std::{
    fs,
    io::Write,
    path::PathBuf,
};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::{Result, SyncError};
use crate::observation::Observation;

/// On-disk column order for every series table.
pub const COLUMNS: [&str; 6] = ["year", "period", "periodName", "value", "footnotes", "latest"];

/// Keeps one CSV table per series under `data_dir` and merges fetched rows
/// into it. Every write goes to a temp file in the same directory and is
/// renamed over the target, so a failed write leaves the old table in place.
#[derive(Debug, Clone)]
pub struct Synchronizer {
    data_dir: PathBuf,
    tie_break: TieBreak,
}

impl Synchronizer {
    pub fn new(data_dir: impl Into<PathBuf>, tie_break: TieBreak) -> Self {
        Self {
            data_dir: data_dir.into(),
            tie_break,
        }
    }

    pub fn table_path(&self, series: &str) -> PathBuf {
        self.data_dir.join(format!("{}.csv", series))
    }

    /// `true` when a stored table exists for `series`.
    pub fn has_table(&self, series: &str) -> bool {
        self.table_path(series).is_file()
    }

    /// Persist `observations` as the whole table for `series`, replacing
    /// whatever was there. Returns the stored row count.
    pub fn initialize(&self, series: &str, observations: &[Observation]) -> Result<usize> {
        let (rows, _) = merge_rows(Vec::new(), observations.to_vec(), self.tie_break);
        self.write_table(series, &rows)?;
        info!(series = %series, rows = rows.len(), "initialized table");
        Ok(rows.len())
    }

    /// Merge `incoming` into the stored table for `series`.
    ///
    /// Fails with [`SyncError::MissingSeries`] when there is no table yet;
    /// callers fall back to [`Synchronizer::initialize`].
    pub fn merge(&self, series: &str, incoming: &[Observation]) -> Result<MergeOutcome> {
        let existing = self.load(series)?;
        let (rows, outcome) = merge_rows(existing, incoming.to_vec(), self.tie_break);

        if outcome.discarded > 0 {
            warn!(
                series = %series,
                discarded = outcome.discarded,
                "kept stored rows over revised fetched values (tie_break = keep_first)"
            );
        }

        self.write_table(series, &rows)?;
        info!(
            series = %series,
            added = outcome.added,
            replaced = outcome.replaced,
            total = outcome.total,
            "merged"
        );
        Ok(outcome)
    }

    /// Read the stored table for `series` as written, in file order.
    pub fn load(&self, series: &str) -> Result<Vec<Observation>> {
        let path = self.table_path(series);
        if !path.is_file() {
            return Err(SyncError::MissingSeries(series.to_string()));
        }
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .from_path(&path)
            .map_err(|e| SyncError::storage(&path, e))?;

        let mut rows = Vec::new();
        for record in reader.deserialize::<Observation>() {
            rows.push(record.map_err(|e| SyncError::storage(&path, e))?);
        }
        debug!(series = %series, rows = rows.len(), "loaded table");
        Ok(rows)
    }

    /// Series codes that currently have a table on disk, sorted.
    pub fn stored_series(&self) -> Result<Vec<String>> {
        let pattern = format!("{}/*.csv", self.data_dir.display());
        let entries = glob(&pattern).map_err(|e| SyncError::storage(&self.data_dir, e))?;
        let mut codes: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|p| p.is_file())
            .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(str::to_string))
            .collect();
        codes.sort();
        Ok(codes)
    }

    fn write_table(&self, series: &str, rows: &[Observation]) -> Result<()> {
        fs::create_dir_all(&self.data_dir).map_err(|e| SyncError::storage(&self.data_dir, e))?;
        let final_path = self.table_path(series);

        let mut tmp =
            NamedTempFile::new_in(&self.data_dir).map_err(|e| SyncError::storage(&self.data_dir, e))?;
        {
            let mut writer = WriterBuilder::new().has_headers(false).from_writer(&mut tmp);
            writer
                .write_record(COLUMNS)
                .map_err(|e| SyncError::storage(&final_path, e))?;
            for row in rows {
                writer
                    .serialize(row)
                    .map_err(|e| SyncError::storage(&final_path, e))?;
            }
            writer.flush().map_err(|e| SyncError::storage(&final_path, e))?;
        }
        tmp.flush().map_err(|e| SyncError::storage(&final_path, e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| SyncError::storage(&final_path, e))?;

        tmp.persist(&final_path)
            .map_err(|e| SyncError::storage(&final_path, e.error))?;
        Ok(())
    }
}
