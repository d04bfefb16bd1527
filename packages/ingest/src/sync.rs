//! Persistence sync: writes a snapshot map onto stored county records.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use covid_track_case_models::SnapshotMap;
use covid_track_database::CountyStore;
use covid_track_ingest_models::{SkippedUnit, SyncReport};
use covid_track_source::progress::ProgressCallback;

use crate::IngestError;

/// Shifts each stored county's current values into the yesterday slots,
/// overwrites current and last-week values from its snapshot, and stamps
/// `now`.
///
/// Each county is written in one statement, so a failure leaves that row
/// exactly as it was. Failures are collected and the remaining counties
/// are still written. Snapshot keys with no stored county are skipped.
///
/// # Errors
///
/// Returns [`IngestError::Db`] only if the stored counties cannot be read.
pub fn apply_snapshots(
    store: &dyn CountyStore,
    snapshots: &SnapshotMap,
    now: DateTime<Utc>,
    progress: &dyn ProgressCallback,
) -> Result<SyncReport, IngestError> {
    let stored = store.find_all_counties()?;
    let stored_keys: BTreeSet<_> = stored.iter().map(|c| c.fips.clone()).collect();

    let mut report = SyncReport {
        not_stored: snapshots
            .keys()
            .filter(|fips| !stored_keys.contains(*fips))
            .cloned()
            .collect(),
        ..SyncReport::default()
    };
    for fips in &report.not_stored {
        log::debug!("No stored county for {fips}, skipping");
    }

    let targets: Vec<_> = stored
        .into_iter()
        .filter_map(|county| snapshots.get(&county.fips).map(|pair| (county, pair)))
        .collect();

    progress.set_total(targets.len() as u64);
    progress.set_message("Writing county estimates".to_string());

    for (mut county, pair) in targets {
        county.apply_snapshots(pair, now);
        match store.update_county(&county) {
            Ok(()) => report.updated += 1,
            Err(e) => {
                log::error!("Failed to update {}: {e}", county.fips);
                report.failed.push(SkippedUnit::new(county.fips, e));
            }
        }
        progress.inc(1);
    }

    log::info!(
        "Sync complete: {} updated, {} failed, {} not stored",
        report.updated,
        report.failed.len(),
        report.not_stored.len()
    );
    progress.finish(format!(
        "{} counties updated, {} failed",
        report.updated,
        report.failed.len()
    ));

    Ok(report)
}
