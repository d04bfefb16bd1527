#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Library for turning public case feeds into stored county estimates.
//!
//! An update run fetches every feed first, then estimates, reconciles, and
//! only then writes. A malformed feed therefore aborts the run before any
//! county is touched. A secondary feed that cannot be reached only costs
//! the counties it would have supplied.

pub mod reconcile;
pub mod seed;
pub mod snapshots;
pub mod sync;

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use covid_track_case_models::SnapshotMap;
use covid_track_database::{CountyStore, DbError};
use covid_track_estimator::{EstimateError, Kernel};
use covid_track_ingest_models::UpdateReport;
use covid_track_source::SourceError;
use covid_track_source::feed_def::{FeedDefinition, FeedLayout};
use covid_track_source::fetch::FeedFetcher;
use covid_track_source::primary::parse_wide_time_series;
use covid_track_source::progress::ProgressCallback;
use covid_track_source::registry;

/// Errors that abort an ingest command.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Fetching or parsing a feed failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Loading the kernel failed.
    #[error(transparent)]
    Estimate(#[from] EstimateError),

    /// A database operation failed.
    #[error(transparent)]
    Db(#[from] DbError),

    /// CSV decoding failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error (file read).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The feed configuration cannot drive a run.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },

    /// A county seed row is invalid.
    #[error("seed row {row}: {message}")]
    Seed {
        /// 1-based data row number.
        row: u64,
        /// Description of what went wrong.
        message: String,
    },
}

impl IngestError {
    fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// The feeds one update run reads.
#[derive(Debug, Clone)]
pub struct UpdatePlan {
    /// Feed supplying every county.
    pub primary: FeedDefinition,
    /// Feeds overriding the primary for their allowlists, applied in
    /// order.
    pub secondaries: Vec<FeedDefinition>,
}

impl UpdatePlan {
    /// Builds the plan from the embedded feed registry.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Config`] if no primary feed is configured.
    pub fn from_registry() -> Result<Self, IngestError> {
        let primary = registry::primary_feed()
            .ok_or_else(|| IngestError::config("no primary feed configured"))?;
        Ok(Self {
            primary,
            secondaries: registry::secondary_feeds(),
        })
    }
}

/// Fetches and estimates every feed in `plan`, producing the final
/// snapshot map without writing anything.
///
/// # Errors
///
/// Returns [`IngestError`] if the primary feed cannot be fetched, any
/// fetched feed is malformed, or a feed's layout does not match its role.
/// An unreachable secondary feed only marks its allowlisted counties as
/// missing.
pub async fn build_snapshots(
    fetcher: &dyn FeedFetcher,
    plan: &UpdatePlan,
    kernel: &Kernel,
) -> Result<(SnapshotMap, UpdateReport), IngestError> {
    let FeedLayout::WideTimeSeries(layout) = &plan.primary.layout else {
        return Err(IngestError::config(format!(
            "primary feed {} must be a wide time series",
            plan.primary.id
        )));
    };

    let primary_bytes = fetcher.fetch(&plan.primary.url).await?;
    let mut secondary_bytes = Vec::with_capacity(plan.secondaries.len());
    for feed in &plan.secondaries {
        secondary_bytes.push(fetcher.fetch(&feed.url).await);
    }

    let table = parse_wide_time_series(&primary_bytes, layout)?;
    let feed_date = table
        .last_date()
        .ok_or_else(|| IngestError::config(format!("{} has no date columns", plan.primary.id)))?;
    log::info!(
        "{}: {} counties through {feed_date}",
        plan.primary.id,
        table.series().len()
    );

    let counties_read = table.series().len() as u64;
    let (mut map, insufficient_history) = snapshots::estimate_all(table.series(), kernel);

    let mut report = UpdateReport {
        primary_feed: plan.primary.id.clone(),
        feed_date: Some(feed_date),
        counties_read,
        insufficient_history,
        ..UpdateReport::default()
    };

    for (feed, bytes) in plan.secondaries.iter().zip(secondary_bytes) {
        match bytes {
            Ok(bytes) => {
                let secondary = reconcile::read_secondary(feed, &bytes, feed_date)?;
                let merged = reconcile::merge_secondary(&mut map, secondary, kernel);
                report.secondary_overrides.extend(merged.overrides);
                report.secondary_missing.extend(merged.missing);
            }
            Err(e) => {
                let missing = reconcile::unavailable(feed, &e.to_string())?;
                report.secondary_missing.extend(missing);
            }
        }
    }

    report.snapshots = map.len() as u64;
    Ok((map, report))
}

/// Runs a full update: fetch, estimate, reconcile, then sync onto `store`.
///
/// Pass `None` for `store` to stop before persistence (dry run).
///
/// # Errors
///
/// Returns [`IngestError`] if any feed is unusable or the stored counties
/// cannot be read. Per-county write failures are reported in the returned
/// [`UpdateReport`] rather than as an error.
pub async fn run_update(
    fetcher: &dyn FeedFetcher,
    plan: &UpdatePlan,
    kernel: &Kernel,
    store: Option<&dyn CountyStore>,
    now: DateTime<Utc>,
    progress: Arc<dyn ProgressCallback>,
) -> Result<UpdateReport, IngestError> {
    let start = Instant::now();

    let (map, mut report) = build_snapshots(fetcher, plan, kernel).await?;

    if let Some(store) = store {
        report.sync = Some(sync::apply_snapshots(store, &map, now, progress.as_ref())?);
    } else {
        log::info!("Dry run: {} snapshots computed, nothing written", map.len());
    }

    report.duration = start.elapsed();
    Ok(report)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::BTreeMap;

    use async_trait::async_trait;
    use covid_track_source::SourceError;
    use covid_track_source::fetch::FeedFetcher;

    /// Serves fixed documents by URL.
    pub struct StaticFetcher {
        pub documents: BTreeMap<String, Vec<u8>>,
    }

    impl StaticFetcher {
        pub fn new(documents: &[(&str, String)]) -> Self {
            Self {
                documents: documents
                    .iter()
                    .map(|(url, body)| ((*url).to_string(), body.clone().into_bytes()))
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl FeedFetcher for StaticFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>, SourceError> {
            self.documents
                .get(url)
                .cloned()
                .ok_or_else(|| SourceError::Request {
                    url: url.to_string(),
                    message: "404 Not Found".to_string(),
                })
        }
    }

    /// Header of M/D/YY date columns for `days` consecutive days starting
    /// 2020-10-01.
    pub fn date_headers(days: usize) -> Vec<String> {
        let start = chrono::NaiveDate::from_ymd_opt(2020, 10, 1).unwrap();
        start
            .iter_days()
            .take(days)
            .map(|d| d.format("%-m/%-d/%y").to_string())
            .collect()
    }
}
