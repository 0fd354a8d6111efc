//! Pulls a fixed set of Bureau of Labor Statistics time series, keeps one
//! CSV table per series on disk and merges incremental pulls into it.

pub mod calendar;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod fetch;
pub mod observation;
pub mod series;
pub mod store;

pub use calendar::{DateWindow, SeriesTable};
pub use config::Config;
pub use dashboard::{Dashboard, InitReport, RefreshReport, SeriesStatus};
pub use error::{PartialDataError, Result, SyncError};
pub use observation::Observation;
pub use store::{MergeOutcome, Synchronizer, TieBreak};
