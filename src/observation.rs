use serde::{Deserialize, Deserializer, Serialize};

/// One stored row of a series table.
///
/// Field order is the on-disk column order:
/// `year,period,periodName,value,footnotes,latest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub year: String,
    pub period: String,
    #[serde(rename = "periodName")]
    pub period_name: String,
    pub value: String,
    #[serde(default)]
    pub footnotes: String,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub latest: bool,
}

impl Observation {
    /// The natural key of the row, with `year` in canonical form.
    pub fn key(&self) -> (String, String) {
        (canonical_year(&self.year), self.period_name.clone())
    }

    /// Rewrite `year` into its canonical text form in place.
    pub fn normalize_year(&mut self) {
        self.year = canonical_year(&self.year);
    }
}

/// Canonical text for a year that may have been read as `2023`, `"2023"`,
/// `" 2023 "` or `2023.0` depending on where it came from.
pub fn canonical_year(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Ok(y) = trimmed.parse::<i64>() {
        return y.to_string();
    }
    match trimmed.parse::<f64>() {
        Ok(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 => (f as i64).to_string(),
        _ => trimmed.to_string(),
    }
}

/// Accepts `true`/`false` in any case, `1`/`0`, and empty as false.
fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_flag(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid flag `{}`", raw)))
}

pub(crate) fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) fn obs(year: &str, period: &str, period_name: &str, value: &str, latest: bool) -> Observation {
    Observation {
        year: year.to_string(),
        period: period.to_string(),
        period_name: period_name.to_string(),
        value: value.to_string(),
        footnotes: String::new(),
        latest,
    }
}
