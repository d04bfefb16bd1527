//! Secondary-feed reconciliation.
//!
//! Some counties are reported badly (or merged with a neighbour) by the
//! primary feed. A secondary line-list feed supplies those counties on the
//! primary's date axis, and its snapshots replace the primary's.

use chrono::NaiveDate;
use covid_track_case_models::SnapshotMap;
use covid_track_estimator::{Kernel, estimate_pair};
use covid_track_geography_models::CountyFips;
use covid_track_ingest_models::SkippedUnit;
use covid_track_source::feed_def::{FeedDefinition, FeedLayout};
use covid_track_source::secondary::{SecondarySeries, aligned_range, parse_line_list};

use crate::IngestError;

/// Counties a secondary feed replaced, and those it could not supply.
#[derive(Debug, Default)]
pub struct Reconciliation {
    /// Counties whose snapshot now comes from the secondary feed.
    pub overrides: Vec<CountyFips>,
    /// Allowlisted counties left as they were.
    pub missing: Vec<SkippedUnit>,
}

/// Parses a secondary feed over the range aligned to a primary feed that
/// ends on `primary_last`.
///
/// # Errors
///
/// Returns [`IngestError::Config`] if the feed is not a line list, or
/// [`IngestError::Source`] if it is malformed.
pub fn read_secondary(
    feed: &FeedDefinition,
    bytes: &[u8],
    primary_last: NaiveDate,
) -> Result<SecondarySeries, IngestError> {
    let FeedLayout::LineList(layout) = &feed.layout else {
        return Err(IngestError::config(format!(
            "secondary feed {} must be a line list",
            feed.id
        )));
    };

    let (from, to) = aligned_range(primary_last);
    log::debug!(
        "{}: reading {} allowlisted counties from {from} to {to}",
        feed.id,
        layout.allowlist.len()
    );
    Ok(parse_line_list(bytes, layout, from, to)?)
}

/// Lists every county a secondary feed would have supplied as missing,
/// for a feed that could not be retrieved.
///
/// # Errors
///
/// Returns [`IngestError::Config`] if the feed is not a line list.
pub fn unavailable(feed: &FeedDefinition, reason: &str) -> Result<Vec<SkippedUnit>, IngestError> {
    let FeedLayout::LineList(layout) = &feed.layout else {
        return Err(IngestError::config(format!(
            "secondary feed {} must be a line list",
            feed.id
        )));
    };

    log::warn!(
        "{}: unavailable ({reason}), keeping primary data for {} counties",
        feed.id,
        layout.allowlist.len()
    );
    Ok(layout
        .allowlist
        .iter()
        .map(|fips| SkippedUnit::new(fips.clone(), reason))
        .collect())
}

/// Estimates every secondary series and writes the results over `map`.
///
/// A county with no secondary data keeps whatever the primary produced
/// (possibly nothing) and is listed in [`Reconciliation::missing`].
pub fn merge_secondary(
    map: &mut SnapshotMap,
    secondary: SecondarySeries,
    kernel: &Kernel,
) -> Reconciliation {
    let mut result = Reconciliation::default();

    for (fips, series) in secondary {
        let pair = series
            .map_err(|e| e.to_string())
            .and_then(|s| estimate_pair(&s, kernel).map_err(|e| e.to_string()));

        match pair {
            Ok(pair) => {
                if map.insert(fips.clone(), pair).is_some() {
                    log::debug!("{fips}: secondary snapshot replaces primary");
                } else {
                    log::debug!("{fips}: secondary snapshot added");
                }
                result.overrides.push(fips);
            }
            Err(reason) => {
                log::warn!("Skipping secondary data for {fips}: {reason}");
                result.missing.push(SkippedUnit::new(fips, reason));
            }
        }
    }

    result
}
