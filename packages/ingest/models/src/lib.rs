#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Result types for an update run.

use std::time::Duration;

use chrono::NaiveDate;
use covid_track_geography_models::CountyFips;
use serde::{Deserialize, Serialize};

/// A county left out of a stage, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedUnit {
    /// County that was skipped.
    pub fips: CountyFips,
    /// Human-readable reason (usually the error message).
    pub reason: String,
}

impl SkippedUnit {
    /// Creates a skipped-unit entry from any displayable reason.
    #[must_use]
    pub fn new(fips: CountyFips, reason: impl ToString) -> Self {
        Self {
            fips,
            reason: reason.to_string(),
        }
    }
}

/// Outcome of writing a snapshot map onto stored county records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Records shifted and overwritten.
    pub updated: u64,
    /// Snapshot keys with no stored county.
    pub not_stored: Vec<CountyFips>,
    /// Counties whose write failed.
    pub failed: Vec<SkippedUnit>,
}

impl SyncReport {
    /// Whether every stored county in the map was written.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Outcome of a full update run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReport {
    /// Identifier of the primary feed.
    pub primary_feed: String,
    /// Last date column of the primary feed.
    pub feed_date: Option<NaiveDate>,
    /// Counties read from the primary feed.
    pub counties_read: u64,
    /// Snapshots in the final map (primary plus secondary).
    pub snapshots: u64,
    /// Counties without enough history for both windows.
    pub insufficient_history: Vec<SkippedUnit>,
    /// Counties whose snapshot came from a secondary feed.
    pub secondary_overrides: Vec<CountyFips>,
    /// Allowlisted counties the secondary feed had no data for.
    pub secondary_missing: Vec<SkippedUnit>,
    /// Persistence outcome. `None` for a dry run.
    pub sync: Option<SyncReport>,
    /// Wall-clock time of the run.
    pub duration: Duration,
}
