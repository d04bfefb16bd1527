#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Case time-series and active-case snapshot types.
//!
//! A [`CaseSeries`] is the per-county input to the estimator: cumulative
//! confirmed counts over contiguous calendar days. The estimator turns a
//! series into an [`ActiveCaseSnapshot`] per [`ReferencePoint`].

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use covid_track_geography_models::CountyFips;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Number of daily samples in one estimation window.
pub const WINDOW_DAYS: usize = 30;

/// Days between the current and prior-week reference points.
pub const PRIOR_WEEK_OFFSET_DAYS: usize = 7;

/// Minimum number of date columns a feed must provide so both windows fit.
pub const MIN_HISTORY_DAYS: usize = WINDOW_DAYS + PRIOR_WEEK_OFFSET_DAYS;

/// Errors raised while assembling a [`CaseSeries`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SeriesError {
    /// No samples were supplied.
    #[error("series for {fips} has no samples")]
    Empty {
        /// County the series belongs to.
        fips: CountyFips,
    },

    /// Two consecutive samples are not one calendar day apart.
    #[error("series for {fips} is not contiguous: expected {expected}, found {found}")]
    NonContiguous {
        /// County the series belongs to.
        fips: CountyFips,
        /// The date that should have followed.
        expected: NaiveDate,
        /// The date actually found.
        found: NaiveDate,
    },
}

/// A single `(date, cumulative confirmed)` observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyCount {
    /// Calendar day of the observation.
    pub date: NaiveDate,
    /// Cumulative confirmed cases reported as of `date`. May be negative or
    /// lower than the day before when the source publishes a correction.
    pub cumulative: i64,
}

/// Cumulative confirmed counts for one county over contiguous days.
///
/// Stored as a start date plus a dense vector, so contiguity holds by
/// construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseSeries {
    fips: CountyFips,
    start: NaiveDate,
    counts: Vec<i64>,
}

impl CaseSeries {
    /// Builds a series whose first sample falls on `start`.
    #[must_use]
    pub const fn new(fips: CountyFips, start: NaiveDate, counts: Vec<i64>) -> Self {
        Self {
            fips,
            start,
            counts,
        }
    }

    /// Builds a series from dated samples, which must be sorted and exactly
    /// one day apart.
    ///
    /// # Errors
    ///
    /// Returns [`SeriesError`] if `samples` is empty or has a gap.
    pub fn from_daily(fips: CountyFips, samples: &[DailyCount]) -> Result<Self, SeriesError> {
        let Some(first) = samples.first() else {
            return Err(SeriesError::Empty { fips });
        };

        for pair in samples.windows(2) {
            let expected = pair[0].date + Duration::days(1);
            if pair[1].date != expected {
                return Err(SeriesError::NonContiguous {
                    fips,
                    expected,
                    found: pair[1].date,
                });
            }
        }

        Ok(Self {
            start: first.date,
            counts: samples.iter().map(|s| s.cumulative).collect(),
            fips,
        })
    }

    /// County this series describes.
    #[must_use]
    pub const fn fips(&self) -> &CountyFips {
        &self.fips
    }

    /// Raw cumulative counts, oldest first.
    #[must_use]
    pub fn counts(&self) -> &[i64] {
        &self.counts
    }

    /// Number of daily samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether the series has no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Date of the first sample.
    #[must_use]
    pub const fn start_date(&self) -> NaiveDate {
        self.start
    }

    /// Date of the sample at `index`.
    #[must_use]
    pub fn date_at(&self, index: usize) -> Option<NaiveDate> {
        if index >= self.counts.len() {
            return None;
        }
        let offset = i64::try_from(index).ok()?;
        Some(self.start + Duration::days(offset))
    }

    /// Date of the most recent sample.
    #[must_use]
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.counts.len().checked_sub(1).and_then(|i| self.date_at(i))
    }

    /// Index of the last sample for `point`, or `None` if the series is too
    /// short to reach it.
    #[must_use]
    pub fn reference_index(&self, point: ReferencePoint) -> Option<usize> {
        self.counts
            .len()
            .checked_sub(1)?
            .checked_sub(point.offset_days())
    }
}

/// Which end date a snapshot is evaluated at.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferencePoint {
    /// The most recent complete date in the feed.
    Current,
    /// Seven days before [`ReferencePoint::Current`].
    PriorWeek,
}

impl ReferencePoint {
    /// Days back from the most recent sample.
    #[must_use]
    pub const fn offset_days(self) -> usize {
        match self {
            Self::Current => 0,
            Self::PriorWeek => PRIOR_WEEK_OFFSET_DAYS,
        }
    }
}

/// Estimator output for one county at one reference date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveCaseSnapshot {
    /// Modeled currently-active cases (always `>= 0`, unrounded).
    pub active_estimate: f64,
    /// Cumulative confirmed cases at the reference date (clamped to `>= 0`).
    pub confirmed_total: i64,
}

/// The two snapshots produced for a county in one run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotPair {
    /// Snapshot at the most recent date.
    pub current: ActiveCaseSnapshot,
    /// Snapshot seven days earlier.
    pub prior_week: ActiveCaseSnapshot,
}

impl SnapshotPair {
    /// Returns the snapshot for `point`.
    #[must_use]
    pub const fn get(&self, point: ReferencePoint) -> &ActiveCaseSnapshot {
        match point {
            ReferencePoint::Current => &self.current,
            ReferencePoint::PriorWeek => &self.prior_week,
        }
    }
}

/// Snapshots for every county produced by a run, keyed by FIPS.
pub type SnapshotMap = BTreeMap<CountyFips, SnapshotPair>;
