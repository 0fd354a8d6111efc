use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::observation::Observation;

/// Which row survives when stored and fetched rows share a natural key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// The stored row wins and the fetched revision is discarded.
    KeepFirst,
    /// The newest fetch wins.
    #[default]
    KeepLast,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeOutcome {
    /// Rows in the table after the merge.
    pub total: usize,
    /// Keys that were not in the table before.
    pub added: usize,
    /// Stored rows overwritten by a differing fetched row (`KeepLast`).
    pub replaced: usize,
    /// Fetched rows that differed from the stored row and were dropped (`KeepFirst`).
    pub discarded: usize,
}

/// Concatenate `existing` then `incoming`, normalize years and keep one row
/// per `(year, periodName)`. Each surviving key keeps the position of its
/// first occurrence.
pub fn merge_rows(
    existing: Vec<Observation>,
    incoming: Vec<Observation>,
    tie_break: TieBreak,
) -> (Vec<Observation>, MergeOutcome) {
    let latest_keys: HashSet<(String, String)> = incoming
        .iter()
        .filter(|o| o.latest)
        .map(Observation::key)
        .collect();

    let mut rows: Vec<Observation> = Vec::with_capacity(existing.len() + incoming.len());
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    let mut outcome = MergeOutcome::default();

    for mut row in existing {
        row.normalize_year();
        let key = row.key();
        // a newer fetch carries the latest flag; older flags go stale
        if !latest_keys.is_empty() && !latest_keys.contains(&key) {
            row.latest = false;
        }
        if index.contains_key(&key) {
            continue;
        }
        index.insert(key, rows.len());
        rows.push(row);
    }
    let stored = rows.len();

    for mut row in incoming {
        row.normalize_year();
        let key = row.key();
        match index.get(&key) {
            Some(&pos) => {
                if !is_revision(&rows[pos], &row) {
                    // same figure; only the latest flag can move
                    rows[pos].latest |= row.latest;
                    continue;
                }
                match tie_break {
                    TieBreak::KeepFirst => {
                        outcome.discarded += 1;
                        rows[pos].latest |= row.latest;
                    }
                    TieBreak::KeepLast => {
                        if pos < stored {
                            outcome.replaced += 1;
                        }
                        rows[pos] = row;
                    }
                }
            }
            None => {
                index.insert(key, rows.len());
                rows.push(row);
            }
        }
    }

    outcome.total = rows.len();
    outcome.added = rows.len() - stored;
    (rows, outcome)
}

/// Rows under one key carry a different figure. The `latest` flag is not
/// part of the figure.
fn is_revision(stored: &Observation, fetched: &Observation) -> bool {
    stored.value != fetched.value
        || stored.period != fetched.period
        || stored.footnotes != fetched.footnotes
}
