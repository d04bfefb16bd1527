//! Primary-feed estimation stage.

use std::collections::BTreeMap;

use covid_track_case_models::{CaseSeries, SnapshotMap};
use covid_track_estimator::{Kernel, estimate_pair};
use covid_track_geography_models::CountyFips;
use covid_track_ingest_models::SkippedUnit;

/// Estimates both reference points for every series.
///
/// A county whose series is too short for either window is left out of the
/// map and listed in the second element; the rest of the run continues.
#[must_use]
pub fn estimate_all(
    series: &BTreeMap<CountyFips, CaseSeries>,
    kernel: &Kernel,
) -> (SnapshotMap, Vec<SkippedUnit>) {
    let mut map = SnapshotMap::new();
    let mut skipped = Vec::new();

    for (fips, s) in series {
        match estimate_pair(s, kernel) {
            Ok(pair) => {
                map.insert(fips.clone(), pair);
            }
            Err(e) => {
                log::warn!("Skipping {fips}: {e}");
                skipped.push(SkippedUnit::new(fips.clone(), e));
            }
        }
    }

    log::debug!(
        "Estimated {} counties ({} skipped)",
        map.len(),
        skipped.len()
    );
    (map, skipped)
}
