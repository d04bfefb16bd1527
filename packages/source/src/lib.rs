#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Case feed definitions, fetching, and normalization.
//!
//! Each public dataset is described by a [`feed_def::FeedDefinition`]
//! loaded from an embedded TOML file (see [`registry`]). Raw bytes are
//! obtained through a [`fetch::FeedFetcher`] and turned into per-county
//! [`covid_track_case_models::CaseSeries`] by [`primary`] (wide, one column
//! per day) or [`secondary`] (line list, one row per county-day).

pub mod feed_def;
pub mod fetch;
pub mod parsing;
pub mod primary;
pub mod progress;
pub mod registry;
pub mod retry;
pub mod secondary;

use chrono::NaiveDate;
use covid_track_geography_models::CountyFips;

/// Errors that can occur while fetching or normalizing feed data.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a status that will not succeed on retry,
    /// or kept failing after every retry.
    #[error("HTTP request to {url} failed: {message}")]
    Request {
        /// Requested URL.
        url: String,
        /// Description of what went wrong.
        message: String,
    },

    /// CSV decoding failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error (file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The feed does not have the expected shape: missing columns, too few
    /// dates, gaps between dates, or a count cell that is not a number.
    #[error("Data format error: {message}")]
    DataFormat {
        /// Description of what went wrong.
        message: String,
    },

    /// An allowlisted county has no secondary-feed rows in the window.
    #[error("no secondary data for {fips} between {from} and {to}")]
    MissingSecondaryData {
        /// County that was expected in the secondary feed.
        fips: CountyFips,
        /// First date of the required range.
        from: NaiveDate,
        /// Last date of the required range.
        to: NaiveDate,
    },
}

impl SourceError {
    pub(crate) fn data_format(message: impl Into<String>) -> Self {
        Self::DataFormat {
            message: message.into(),
        }
    }
}
