use chrono::{Months, NaiveDate};
use serde::Serialize;

use crate::error::{Result, SyncError};
use crate::observation::{canonical_year, Observation};

/// Months shown before the newest observation in the default window.
pub const DEFAULT_WINDOW_MONTHS: u32 = 15;

/// Month number for a period label. Quarters land on their final month.
pub fn month_for_period(period_name: &str) -> Option<&'static str> {
    let m = match period_name.trim() {
        "January" => "01",
        "February" => "02",
        "March" => "03",
        "April" => "04",
        "May" => "05",
        "June" => "06",
        "July" => "07",
        "August" => "08",
        "September" => "09",
        "October" => "10",
        "November" => "11",
        "December" => "12",
        "1st Quarter" => "03",
        "2nd Quarter" => "06",
        "3rd Quarter" => "09",
        "4th Quarter" => "12",
        _ => return None,
    };
    Some(m)
}

/// `("2023-03", 2023-03-01)` for `("2023", "1st Quarter")`. Period names
/// outside the table (e.g. `Annual`) give `(None, None)`.
pub fn normalize(year: &str, period_name: &str) -> (Option<String>, Option<NaiveDate>) {
    let month = match month_for_period(period_name) {
        Some(m) => m,
        None => return (None, None),
    };
    let year = canonical_year(year);
    let year_month = format!("{}-{}", year, month);
    let date = NaiveDate::parse_from_str(&format!("{}-01", year_month), "%Y-%m-%d").ok();
    (Some(year_month), date)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatedObservation {
    #[serde(flatten)]
    pub observation: Observation,
    #[serde(rename = "yearMonth")]
    pub year_month: Option<String>,
    pub date: Option<NaiveDate>,
}

impl From<Observation> for DatedObservation {
    fn from(observation: Observation) -> Self {
        let (year_month, date) = normalize(&observation.year, &observation.period_name);
        Self {
            observation,
            year_month,
            date,
        }
    }
}

/// A stored series with its calendar columns derived.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesTable {
    pub code: String,
    pub rows: Vec<DatedObservation>,
}

impl SeriesTable {
    pub fn new(code: impl Into<String>, observations: Vec<Observation>) -> Self {
        Self {
            code: code.into(),
            rows: observations.into_iter().map(DatedObservation::from).collect(),
        }
    }

    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.rows.iter().filter_map(|r| r.date).max()
    }

    /// Rows dated inside `window`, oldest first. Undated rows never appear.
    pub fn between(&self, window: &DateWindow) -> Vec<&DatedObservation> {
        let mut rows: Vec<&DatedObservation> = self
            .rows
            .iter()
            .filter(|r| r.date.map_or(false, |d| window.contains(d)))
            .collect();
        rows.sort_by_key(|r| r.date);
        rows
    }
}

/// Inclusive date range used to filter tables for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(SyncError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    /// Ends at the newest date across `tables` (or `today` when nothing is
    /// dated) and starts [`DEFAULT_WINDOW_MONTHS`] earlier, never before 2000.
    pub fn default_for(tables: &[SeriesTable], today: NaiveDate) -> Self {
        let end = tables
            .iter()
            .filter_map(SeriesTable::latest_date)
            .max()
            .unwrap_or(today);
        let start = end
            .checked_sub_months(Months::new(DEFAULT_WINDOW_MONTHS))
            .unwrap_or(end)
            .max(earliest_date());
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

fn earliest_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or(NaiveDate::MIN)
}
