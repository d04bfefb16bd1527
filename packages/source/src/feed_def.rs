//! Config-driven case feed definition.
//!
//! [`FeedDefinition`] captures everything unique about a public case
//! dataset: where it lives, which role it plays in a run, and how its
//! columns map onto county keys, dates, and counts.

use covid_track_geography_models::CountyFips;
use serde::Deserialize;
use strum_macros::{AsRefStr, Display};

/// A complete, config-driven feed definition.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedDefinition {
    /// Unique identifier (e.g., `"jhu_confirmed_us"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Whether this feed supplies every county or overrides a few.
    pub role: FeedRole,
    /// Download URL.
    pub url: String,
    /// Column layout.
    pub layout: FeedLayout,
}

/// What a feed contributes to a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FeedRole {
    /// Supplies the baseline snapshot for every county.
    Primary,
    /// Supplies snapshots for an allowlist, replacing the primary's.
    Secondary,
}

/// How rows and columns of a feed are arranged.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedLayout {
    /// One row per county, one column per day.
    WideTimeSeries(WideTimeSeriesLayout),
    /// One row per county per day (or per event).
    LineList(LineListLayout),
}

/// Column names for a [`FeedLayout::WideTimeSeries`] feed.
///
/// Every header that parses as a date is a count column; all other headers
/// are identifier or auxiliary columns.
#[derive(Debug, Clone, Deserialize)]
pub struct WideTimeSeriesLayout {
    /// Column holding the county code (possibly as a float, e.g. `1001.0`).
    pub code_column: String,
    /// Composite identifier used when the code cell is empty.
    #[serde(default)]
    pub uid_column: Option<String>,
    /// Characters to drop from the front of the UID to reach the county
    /// code.
    #[serde(default)]
    pub uid_prefix_len: usize,
}

/// Column names and scope for a [`FeedLayout::LineList`] feed.
#[derive(Debug, Clone, Deserialize)]
pub struct LineListLayout {
    /// Column holding the row date.
    pub date_column: String,
    /// Column holding the county code.
    pub key_column: String,
    /// Column holding the count. When absent every row counts as one.
    #[serde(default)]
    pub count_column: Option<String>,
    /// Meaning of the count column.
    pub count_kind: CountKind,
    /// Counties taken from this feed. Other rows are ignored.
    pub allowlist: Vec<CountyFips>,
}

/// Meaning of a line-list count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CountKind {
    /// The value is the running total as of the row date.
    Cumulative,
    /// The value is new cases on the row date.
    Daily,
}

/// Parses a TOML string into a [`FeedDefinition`].
///
/// # Errors
///
/// Returns an error string if the TOML is malformed or missing required
/// fields.
pub fn parse_feed_toml(toml_str: &str) -> Result<FeedDefinition, String> {
    toml::de::from_str(toml_str).map_err(|e| e.to_string())
}
