//! Line-list reader for allowlisted counties.
//!
//! A line-list feed has one row per county and date (or per event). Rows
//! for allowlisted counties are folded into a cumulative series aligned to
//! the primary feed's date axis, so the same estimator windows apply.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use covid_track_case_models::{CaseSeries, MIN_HISTORY_DAYS};
use covid_track_geography_models::CountyFips;

use crate::SourceError;
use crate::feed_def::{CountKind, LineListLayout};
use crate::parsing::{parse_count, parse_feed_date};

/// Per-county outcome of reading a secondary feed. A county with no rows in
/// range carries [`SourceError::MissingSecondaryData`].
pub type SecondarySeries = BTreeMap<CountyFips, Result<CaseSeries, SourceError>>;

/// Date range the secondary series must cover to line up with a primary
/// feed ending on `last_date`.
///
/// One day more than [`MIN_HISTORY_DAYS`] so the oldest day of the
/// prior-week window has a predecessor to difference against.
#[must_use]
pub fn aligned_range(last_date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let span = i64::try_from(MIN_HISTORY_DAYS).unwrap_or(i64::MAX);
    (last_date - Duration::days(span), last_date)
}

struct Columns {
    date: usize,
    key: usize,
    count: Option<usize>,
}

fn locate_columns(headers: &[String], layout: &LineListLayout) -> Result<Columns, SourceError> {
    let find = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| SourceError::data_format(format!("missing column {name:?}")))
    };

    Ok(Columns {
        date: find(&layout.date_column)?,
        key: find(&layout.key_column)?,
        count: layout.count_column.as_deref().map(find).transpose()?,
    })
}

/// Reads a line-list CSV and builds one series per allowlisted county
/// covering `from..=to`.
///
/// For [`CountKind::Cumulative`] the largest value reported on a date is
/// that date's total and is carried forward over days with no rows. When a
/// county has no row before `from`, its series starts at its first row in
/// range instead, and may then be too short to estimate. For
/// [`CountKind::Daily`] rows on a date are summed (one per row when there
/// is no count column) and accumulated from the start of the feed.
///
/// # Errors
///
/// Returns [`SourceError::DataFormat`] if a configured column is missing or
/// an allowlisted row has an unreadable date or count, and
/// [`SourceError::Csv`] if the CSV cannot be decoded. A county with no rows
/// between `from` and `to` is reported inside the returned map, not as an
/// error.
pub fn parse_line_list(
    bytes: &[u8],
    layout: &LineListLayout,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<SecondarySeries, SourceError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_owned())
        .collect();
    let columns = locate_columns(&headers, layout)?;

    let mut by_county: BTreeMap<CountyFips, BTreeMap<NaiveDate, i64>> = layout
        .allowlist
        .iter()
        .map(|fips| (fips.clone(), BTreeMap::new()))
        .collect();

    for (row, result) in reader.records().enumerate() {
        let record = result?;

        let Some(fips) = record.get(columns.key).and_then(CountyFips::from_raw) else {
            continue;
        };
        let Some(days) = by_county.get_mut(&fips) else {
            continue;
        };

        let date_cell = record.get(columns.date).unwrap_or_default();
        let date = parse_feed_date(date_cell).ok_or_else(|| {
            SourceError::data_format(format!(
                "row {}: {fips}: invalid date {date_cell:?}",
                row + 2
            ))
        })?;

        let value = match columns.count {
            Some(i) => {
                let cell = record.get(i).unwrap_or_default();
                parse_count(cell).ok_or_else(|| {
                    SourceError::data_format(format!(
                        "row {}: {fips}: invalid count {cell:?} for {date}",
                        row + 2
                    ))
                })?
            }
            None => 1,
        };

        let slot = days.entry(date).or_insert(match layout.count_kind {
            CountKind::Cumulative => i64::MIN,
            CountKind::Daily => 0,
        });
        *slot = match layout.count_kind {
            CountKind::Cumulative => (*slot).max(value),
            CountKind::Daily => slot.saturating_add(value),
        };
    }

    Ok(by_county
        .into_iter()
        .map(|(fips, days)| {
            let series = build_series(&fips, &days, layout.count_kind, from, to);
            (fips, series)
        })
        .collect())
}

fn build_series(
    fips: &CountyFips,
    days: &BTreeMap<NaiveDate, i64>,
    kind: CountKind,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<CaseSeries, SourceError> {
    let Some((&first_reported, _)) = days.range(from..=to).next() else {
        return Err(SourceError::MissingSecondaryData {
            fips: fips.clone(),
            from,
            to,
        });
    };

    // A cumulative feed says nothing about the total before its first row,
    // so the series cannot start earlier than that row.
    let (start, mut running) = match kind {
        CountKind::Cumulative => days
            .range(..from)
            .next_back()
            .map_or((first_reported, 0), |(_, v)| (from, *v)),
        CountKind::Daily => (
            from,
            days.range(..from)
                .fold(0_i64, |total, (_, v)| total.saturating_add(*v)),
        ),
    };
    if start > from {
        log::debug!("{fips}: cumulative rows start at {start}, after {from}");
    }

    let counts = start
        .iter_days()
        .take_while(|d| *d <= to)
        .map(|date| {
            if let Some(&v) = days.get(&date) {
                running = match kind {
                    CountKind::Cumulative => v,
                    CountKind::Daily => running.saturating_add(v),
                };
            }
            running
        })
        .collect();

    Ok(CaseSeries::new(fips.clone(), start, counts))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, m, d).unwrap()
    }

    fn fips(code: &str) -> CountyFips {
        CountyFips::new(code).unwrap()
    }

    fn cumulative_layout() -> LineListLayout {
        LineListLayout {
            date_column: "date".to_string(),
            key_column: "fips".to_string(),
            count_column: Some("cases".to_string()),
            count_kind: CountKind::Cumulative,
            allowlist: vec![fips("25019"), fips("25007")],
        }
    }

    #[test]
    fn aligned_range_covers_both_windows_plus_baseline() {
        let (from, to) = aligned_range(ymd(11, 30));
        assert_eq!(to, ymd(11, 30));
        assert_eq!(from, ymd(10, 24));
        assert_eq!((to - from).num_days() + 1, 38);
    }

    #[test]
    fn cumulative_rows_carry_forward() {
        let csv = "date,county,state,fips,cases,deaths\n\
                   2020-11-01,Nantucket,Massachusetts,25019,10,0\n\
                   2020-11-02,Nantucket,Massachusetts,25019,12,0\n\
                   2020-11-04,Nantucket,Massachusetts,25019,15,0\n\
                   2020-11-04,Suffolk,Massachusetts,25025,bogus,0\n";

        let result =
            parse_line_list(csv.as_bytes(), &cumulative_layout(), ymd(11, 2), ymd(11, 5)).unwrap();

        let series = result[&fips("25019")].as_ref().unwrap();
        assert_eq!(series.start_date(), ymd(11, 2));
        assert_eq!(series.counts(), &[12, 12, 15, 15]);
    }

    #[test]
    fn cumulative_before_range_seeds_first_day() {
        let csv = "date,fips,cases\n2020-10-30,25019,7\n2020-11-03,25019,9\n";
        let result =
            parse_line_list(csv.as_bytes(), &cumulative_layout(), ymd(11, 1), ymd(11, 3)).unwrap();
        assert_eq!(result[&fips("25019")].as_ref().unwrap().counts(), &[7, 7, 9]);
    }

    #[test]
    fn daily_rows_accumulate_from_feed_start() {
        let layout = LineListLayout {
            count_column: None,
            count_kind: CountKind::Daily,
            ..cumulative_layout()
        };
        let csv = "date,fips\n\
                   2020-10-31,25019\n\
                   2020-11-01,25019\n\
                   2020-11-01,25019\n\
                   2020-11-03,25019\n";

        let result = parse_line_list(csv.as_bytes(), &layout, ymd(11, 1), ymd(11, 3)).unwrap();
        assert_eq!(result[&fips("25019")].as_ref().unwrap().counts(), &[3, 3, 4]);
    }

    #[test]
    fn missing_rows_fail_only_that_county() {
        let csv = "date,fips,cases\n2020-11-01,25019,5\n2020-09-01,25007,1\n";
        let result =
            parse_line_list(csv.as_bytes(), &cumulative_layout(), ymd(11, 1), ymd(11, 2)).unwrap();

        assert!(result[&fips("25019")].is_ok());
        assert!(matches!(
            result[&fips("25007")],
            Err(SourceError::MissingSecondaryData { .. })
        ));
    }

    #[test]
    fn bad_count_for_listed_county_is_format_error() {
        let csv = "date,fips,cases\n2020-11-01,25019,many\n";
        let err = parse_line_list(csv.as_bytes(), &cumulative_layout(), ymd(11, 1), ymd(11, 2))
            .unwrap_err();
        assert!(matches!(err, SourceError::DataFormat { .. }));
    }

    #[test]
    fn missing_column_is_format_error() {
        let csv = "date,county,cases\n";
        let err = parse_line_list(csv.as_bytes(), &cumulative_layout(), ymd(11, 1), ymd(11, 2))
            .unwrap_err();
        assert!(err.to_string().contains("\"fips\""));
    }

    #[test]
    fn cumulative_series_starts_at_first_row_without_earlier_total() {
        let mut csv = "date,fips,cases\n".to_string();
        for (i, date) in ymd(10, 30).iter_days().take(10).enumerate() {
            csv.push_str(&format!("{date},25019,{}\n", 5000 + i));
        }

        let (from, to) = aligned_range(ymd(11, 8));
        let result = parse_line_list(csv.as_bytes(), &cumulative_layout(), from, to).unwrap();

        let series = result[&fips("25019")].as_ref().unwrap();
        assert_eq!(series.start_date(), ymd(10, 30));
        assert_eq!(series.len(), 10);
        assert_eq!(series.counts().first(), Some(&5000));
        assert_eq!(series.counts().last(), Some(&5009));
        assert!(!series.counts().contains(&0));
    }

    #[test]
    fn cumulative_gap_inside_range_still_carries_forward() {
        let csv = "date,fips,cases\n2020-11-02,25019,40\n2020-11-04,25019,46\n";
        let result =
            parse_line_list(csv.as_bytes(), &cumulative_layout(), ymd(11, 1), ymd(11, 5)).unwrap();

        let series = result[&fips("25019")].as_ref().unwrap();
        assert_eq!(series.start_date(), ymd(11, 2));
        assert_eq!(series.counts(), &[40, 40, 46, 46]);
    }

    #[test]
    fn daily_rows_without_history_start_at_range() {
        let layout = LineListLayout {
            count_kind: CountKind::Daily,
            ..cumulative_layout()
        };
        let csv = "date,fips,cases\n2020-11-03,25019,5\n";

        let result = parse_line_list(csv.as_bytes(), &layout, ymd(11, 1), ymd(11, 3)).unwrap();

        let series = result[&fips("25019")].as_ref().unwrap();
        assert_eq!(series.start_date(), ymd(11, 1));
        assert_eq!(series.counts(), &[0, 0, 5]);
    }

    #[test]
    fn daily_totals_saturate_instead_of_overflowing() {
        let layout = LineListLayout {
            count_kind: CountKind::Daily,
            ..cumulative_layout()
        };
        let csv = format!(
            "date,fips,cases\n2020-10-31,25019,{}\n2020-11-01,25019,{}\n",
            i64::MAX,
            i64::MAX
        );

        let result = parse_line_list(csv.as_bytes(), &layout, ymd(11, 1), ymd(11, 1)).unwrap();
        assert_eq!(result[&fips("25019")].as_ref().unwrap().counts(), &[i64::MAX]);
    }
}
