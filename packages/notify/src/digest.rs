//! The numbers one county contributes to a digest.

use std::fmt;

use covid_track_database_models::{CountyRecord, CountyStatus, change_blurb};
use serde::Serialize;

/// One county's section of a digest.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DigestEntry {
    /// County name without the `" County"` suffix.
    pub name: String,
    /// Two-letter state abbreviation.
    pub state_abbr: String,
    /// Total confirmed cases.
    pub confirmed: Option<i64>,
    /// Percent change in confirmed cases over the past week.
    pub confirmed_week_change: Option<f64>,
    /// Percent change in confirmed cases since the previous update.
    pub confirmed_day_change: Option<f64>,
    /// Estimated active cases per million residents.
    pub active_per_million: Option<f64>,
    /// Percent change in active cases over the past week.
    pub active_week_change: Option<f64>,
    /// Percent change in active cases since the previous update.
    pub active_day_change: Option<f64>,
    /// Risk band.
    pub status: CountyStatus,
}

impl From<&CountyRecord> for DigestEntry {
    fn from(county: &CountyRecord) -> Self {
        Self {
            name: county.display_name().to_string(),
            state_abbr: county.state_abbr().to_string(),
            confirmed: county.confirmed_cases,
            confirmed_week_change: county.confirmed_week_change(),
            confirmed_day_change: county.confirmed_day_change(),
            active_per_million: county.active_cases_per_million(),
            active_week_change: county.active_week_change(),
            active_day_change: county.active_day_change(),
            status: county.status(),
        }
    }
}

/// Formats an integer with comma thousands separators.
#[must_use]
pub fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[allow(clippy::cast_possible_truncation)]
fn group_rounded(value: f64) -> String {
    group_thousands(value.round() as i64)
}

fn changes(week: Option<f64>, day: Option<f64>) -> String {
    let blurb = |change: Option<f64>| {
        if change.is_some() {
            change_blurb(change)
        } else {
            "?".to_string()
        }
    };
    format!("{} / {}", blurb(week), blurb(day))
}

impl fmt::Display for DigestEntry {
    /// Three lines: heading, confirmed total with week/day change, and
    /// active per million with week/day change. Unknown values print `?`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let confirmed = self.confirmed.map_or_else(|| "?".to_string(), group_thousands);
        let active = self
            .active_per_million
            .map_or_else(|| "?".to_string(), group_rounded);

        writeln!(f, "{}, {} [{}]", self.name, self.state_abbr, self.status)?;
        writeln!(
            f,
            "-{confirmed}, {}",
            changes(self.confirmed_week_change, self.confirmed_day_change)
        )?;
        write!(
            f,
            "-{active}, {}",
            changes(self.active_week_change, self.active_day_change)
        )
    }
}
