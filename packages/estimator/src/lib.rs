#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Active-case estimation from cumulative confirmed counts.
//!
//! New daily cases over a trailing 30-day window are convolved with the
//! [`Kernel`] survival table (newest day weighted 1.0, oldest ~0.008), the
//! sum is clamped at zero and scaled by the under-detection multiplier.
//!
//! Everything here is a pure function of its inputs: no I/O, no shared
//! state, all arithmetic in `f64` with no intermediate rounding.

pub mod kernel;

use covid_track_case_models::{
    ActiveCaseSnapshot, CaseSeries, ReferencePoint, SnapshotPair, WINDOW_DAYS,
};
use covid_track_geography_models::CountyFips;

pub use kernel::Kernel;

/// Errors that can occur during estimation.
#[derive(Debug, thiserror::Error)]
pub enum EstimateError {
    /// The series does not cover a full window ending at the reference
    /// index. No partial estimate is produced.
    #[error(
        "insufficient history for {fips}: need {required} samples ending at the reference date, have {available}"
    )]
    InsufficientHistory {
        /// County the series belongs to.
        fips: CountyFips,
        /// Samples needed up to and including the reference index.
        required: usize,
        /// Samples actually available up to the reference index.
        available: usize,
    },

    /// A kernel override failed validation.
    #[error("invalid kernel: {message}")]
    InvalidKernel {
        /// Description of what went wrong.
        message: String,
    },

    /// Reading a kernel file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Estimates active cases for the 30-sample window ending at `end_index`.
///
/// Counts are clamped to `>= 0` before differencing and each daily
/// difference is clamped to `>= 0`, so source corrections never subtract
/// from the estimate. The oldest sample in the window is differenced
/// against the sample before it; when the window starts at the first
/// sample of the series, that day contributes nothing.
///
/// # Errors
///
/// Returns [`EstimateError::InsufficientHistory`] if `end_index` is past
/// the end of the series or fewer than [`WINDOW_DAYS`] samples end there.
#[allow(clippy::cast_precision_loss)]
pub fn estimate(
    series: &CaseSeries,
    end_index: usize,
    kernel: &Kernel,
) -> Result<ActiveCaseSnapshot, EstimateError> {
    let counts = series.counts();

    if end_index >= counts.len() || end_index + 1 < WINDOW_DAYS {
        return Err(EstimateError::InsufficientHistory {
            fips: series.fips().clone(),
            required: WINDOW_DAYS,
            available: (end_index + 1).min(counts.len()),
        });
    }

    let start = end_index + 1 - WINDOW_DAYS;
    let mut sum = 0.0_f64;

    for (offset, i) in (start..=end_index).enumerate() {
        let current = counts[i].max(0);
        let previous = if i == 0 { current } else { counts[i - 1].max(0) };
        let new_cases = (current - previous).max(0);
        sum += new_cases as f64 * kernel.weight(WINDOW_DAYS - 1 - offset);
    }

    Ok(ActiveCaseSnapshot {
        active_estimate: sum.max(0.0) * kernel.undetected_factor(),
        confirmed_total: counts[end_index].max(0),
    })
}

/// Estimates active cases at a named reference point.
///
/// # Errors
///
/// Returns [`EstimateError::InsufficientHistory`] if the series cannot
/// reach `point` with a full window.
pub fn estimate_at(
    series: &CaseSeries,
    point: ReferencePoint,
    kernel: &Kernel,
) -> Result<ActiveCaseSnapshot, EstimateError> {
    let end_index =
        series
            .reference_index(point)
            .ok_or_else(|| EstimateError::InsufficientHistory {
                fips: series.fips().clone(),
                required: WINDOW_DAYS + point.offset_days(),
                available: series.len(),
            })?;
    estimate(series, end_index, kernel)
}

/// Produces the current and prior-week snapshots for one county.
///
/// # Errors
///
/// Returns [`EstimateError::InsufficientHistory`] if either window does
/// not fit in the series.
pub fn estimate_pair(series: &CaseSeries, kernel: &Kernel) -> Result<SnapshotPair, EstimateError> {
    Ok(SnapshotPair {
        current: estimate_at(series, ReferencePoint::Current, kernel)?,
        prior_week: estimate_at(series, ReferencePoint::PriorWeek, kernel)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use covid_track_case_models::MIN_HISTORY_DAYS;

    use super::*;

    fn series(counts: Vec<i64>) -> CaseSeries {
        CaseSeries::new(
            CountyFips::new("50007").unwrap(),
            NaiveDate::from_ymd_opt(2020, 10, 1).unwrap(),
            counts,
        )
    }

    /// Seven flat days followed by +10/day for 30 days: `[0 x7, 10, 20, .., 300]`.
    fn ramp() -> Vec<i64> {
        let mut counts = vec![0; 7];
        counts.extend((1..=30).map(|k| k * 10));
        counts
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= 1e-9 * expected.abs().max(1.0),
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn ramp_matches_closed_form() {
        let kernel = Kernel::default();
        let s = series(ramp());
        assert_eq!(s.len(), MIN_HISTORY_DAYS);

        let snapshot = estimate_at(&s, ReferencePoint::Current, &kernel).unwrap();
        assert_close(snapshot.active_estimate, 10.0 * kernel.weight_sum() * 2.4);
        assert_eq!(snapshot.confirmed_total, 300);
    }

    #[test]
    fn ramp_prior_week_window() {
        let kernel = Kernel::default();
        let pair = estimate_pair(&series(ramp()), &kernel).unwrap();

        // Prior-week window is indexes 0..=29; the ramp occupies 7..=29 so
        // lags 0..=22 each see +10 and the flat days contribute nothing.
        let expected: f64 = kernel.weights()[..23].iter().sum::<f64>() * 10.0 * 2.4;
        assert_close(pair.prior_week.active_estimate, expected);
        assert_eq!(pair.prior_week.confirmed_total, 230);
        assert_eq!(pair.current.confirmed_total, 300);
    }

    #[test]
    fn newest_day_has_full_weight() {
        let mut counts = vec![50; MIN_HISTORY_DAYS];
        *counts.last_mut().unwrap() = 60;
        let snapshot = estimate_at(&series(counts), ReferencePoint::Current, &Kernel::default())
            .unwrap();
        assert_close(snapshot.active_estimate, 10.0 * 2.4);
    }

    #[test]
    fn correction_contributes_zero() {
        // +10/day, but on window day 10 the source revises the total down
        // below day 9's value and stays revised.
        let kernel = Kernel::default();
        let end = MIN_HISTORY_DAYS - 1;
        let window_start = end + 1 - WINDOW_DAYS;
        let drop_index = window_start + 10;

        let counts: Vec<i64> = (0..MIN_HISTORY_DAYS)
            .map(|i| {
                let base = i64::try_from(i).unwrap() * 10;
                if i >= drop_index { base - 25 } else { base }
            })
            .collect();
        assert!(counts[drop_index] < counts[drop_index - 1]);

        let snapshot = estimate(&series(counts), end, &kernel).unwrap();

        let dropped_lag = WINDOW_DAYS - 1 - 10;
        let expected = (kernel.weight_sum() - kernel.weight(dropped_lag)) * 10.0 * 2.4;
        assert_close(snapshot.active_estimate, expected);
    }

    #[test]
    fn never_negative() {
        let kernel = Kernel::default();
        let cases: Vec<Vec<i64>> = vec![
            (0..40).map(|i| 1000 - i * 20).collect(),
            (0..40).map(|i| if i % 2 == 0 { -50 } else { 30 }).collect(),
            vec![-5; 40],
            vec![0; 40],
        ];
        for counts in cases {
            let s = series(counts);
            let pair = estimate_pair(&s, &kernel).unwrap();
            assert!(pair.current.active_estimate >= 0.0);
            assert!(pair.prior_week.active_estimate >= 0.0);
            assert!(pair.current.confirmed_total >= 0);
            assert!(pair.prior_week.confirmed_total >= 0);
        }
    }

    #[test]
    fn negative_counts_clamp_before_differencing() {
        // -40 -> 0 then 0 -> 15: only the +15 counts.
        let mut counts = vec![-40; MIN_HISTORY_DAYS];
        *counts.last_mut().unwrap() = 15;
        let snapshot =
            estimate_at(&series(counts), ReferencePoint::Current, &Kernel::default()).unwrap();
        assert_close(snapshot.active_estimate, 15.0 * 2.4);
        assert_eq!(snapshot.confirmed_total, 15);
    }

    #[test]
    fn deterministic() {
        let kernel = Kernel::default();
        let s = series((0..45).map(|i| i * i).collect());
        let a = estimate_pair(&s, &kernel).unwrap();
        let b = estimate_pair(&s, &kernel).unwrap();
        assert_eq!(
            a.current.active_estimate.to_bits(),
            b.current.active_estimate.to_bits()
        );
        assert_eq!(
            a.prior_week.active_estimate.to_bits(),
            b.prior_week.active_estimate.to_bits()
        );
    }

    #[test]
    fn window_at_series_start_skips_first_difference() {
        // Exactly 30 samples: the oldest has no predecessor.
        let counts: Vec<i64> = (0..30).map(|i| 100 + i * 2).collect();
        let kernel = Kernel::default();
        let snapshot = estimate(&series(counts), 29, &kernel).unwrap();
        let expected = (kernel.weight_sum() - kernel.weight(29)) * 2.0 * 2.4;
        assert_close(snapshot.active_estimate, expected);
    }

    #[test]
    fn rejects_short_series() {
        let kernel = Kernel::default();
        let err = estimate(&series(vec![1; 29]), 28, &kernel).unwrap_err();
        assert!(matches!(
            err,
            EstimateError::InsufficientHistory {
                required: 30,
                available: 29,
                ..
            }
        ));

        // Current fits, prior week does not.
        let s = series(vec![1; 30]);
        assert!(estimate_at(&s, ReferencePoint::Current, &kernel).is_ok());
        assert!(estimate_pair(&s, &kernel).is_err());
    }

    #[test]
    fn rejects_index_past_end() {
        let err = estimate(&series(vec![1; 40]), 40, &Kernel::default()).unwrap_err();
        assert!(matches!(err, EstimateError::InsufficientHistory { .. }));
    }
}
