use serde::{Deserialize, Serialize};

/// A tracked time series: the API code plus a display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesSpec {
    pub code: String,
    pub name: String,
}

impl SeriesSpec {
    pub fn new(code: &str, name: &str) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
        }
    }
}

static DEFAULT_SERIES: &[(&str, &str)] = &[
    ("LNS11000000", "Civilian Labor Force (Seasonally Adjusted)"),
    (
        "PRS85006092",
        "Output Per Hour - Non-farm Business Productivity",
    ),
    (
        "CES0000000001",
        "Total Nonfarm Employment - Seasonally Adjusted",
    ),
    ("LNS12000000", "Civilian Employment (Seasonally Adjusted)"),
    (
        "CES0500000008",
        "Total Private Average Hourly Earnings of Prod. and Nonsup. Employees - Seasonally Adjusted",
    ),
    ("PRS85006112", "Nonfarm Business Unit Labor Costs"),
];

/// The series tracked when the configuration does not name its own.
pub fn default_series() -> Vec<SeriesSpec> {
    DEFAULT_SERIES
        .iter()
        .map(|(code, name)| SeriesSpec::new(code, name))
        .collect()
}
