//! Wide time-series reader.
//!
//! Rows are counties, columns are consecutive calendar days holding
//! cumulative confirmed counts. Any header that parses as a date is a count
//! column; the rest are identifiers and auxiliary data.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use covid_track_case_models::{CaseSeries, MIN_HISTORY_DAYS};
use covid_track_geography_models::CountyFips;

use crate::SourceError;
use crate::feed_def::WideTimeSeriesLayout;
use crate::parsing::{parse_count, parse_feed_date};

/// Every county series from one wide feed, sharing a single date axis.
#[derive(Debug, Clone)]
pub struct PrimaryTable {
    dates: Vec<NaiveDate>,
    series: BTreeMap<CountyFips, CaseSeries>,
}

impl PrimaryTable {
    /// The feed's date columns, oldest first.
    #[must_use]
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Most recent date in the feed.
    #[must_use]
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Per-county series.
    #[must_use]
    pub const fn series(&self) -> &BTreeMap<CountyFips, CaseSeries> {
        &self.series
    }

    /// Consumes the table, returning the per-county series.
    #[must_use]
    pub fn into_series(self) -> BTreeMap<CountyFips, CaseSeries> {
        self.series
    }
}

struct Columns {
    code: usize,
    uid: Option<usize>,
    dates: Vec<(usize, NaiveDate)>,
}

fn locate_columns(
    headers: &[String],
    layout: &WideTimeSeriesLayout,
) -> Result<Columns, SourceError> {
    let find = |name: &str| headers.iter().position(|h| h == name);

    let code = find(&layout.code_column).ok_or_else(|| {
        SourceError::data_format(format!("missing code column {:?}", layout.code_column))
    })?;

    let uid = match &layout.uid_column {
        Some(name) => Some(
            find(name)
                .ok_or_else(|| SourceError::data_format(format!("missing UID column {name:?}")))?,
        ),
        None => None,
    };

    let dates: Vec<(usize, NaiveDate)> = headers
        .iter()
        .enumerate()
        .filter_map(|(i, h)| parse_feed_date(h).map(|d| (i, d)))
        .collect();

    if dates.len() < MIN_HISTORY_DAYS {
        return Err(SourceError::data_format(format!(
            "feed has {} date columns, need at least {MIN_HISTORY_DAYS}",
            dates.len()
        )));
    }

    for pair in dates.windows(2) {
        let expected = pair[0].1 + Duration::days(1);
        if pair[1].1 != expected {
            return Err(SourceError::data_format(format!(
                "date columns are not consecutive: {} is followed by {}",
                pair[0].1, pair[1].1
            )));
        }
    }

    Ok(Columns { code, uid, dates })
}

fn row_key(
    record: &csv::StringRecord,
    columns: &Columns,
    layout: &WideTimeSeriesLayout,
) -> Option<CountyFips> {
    let code = record.get(columns.code).unwrap_or_default().trim();
    if !code.is_empty() {
        return CountyFips::from_raw(code);
    }
    let uid = record.get(columns.uid?)?;
    CountyFips::from_uid(uid, layout.uid_prefix_len)
}

/// Parses a wide time-series CSV into per-county series.
///
/// The county key comes from the code column, or from the UID column with
/// its prefix removed when the code cell is empty. Rows with no usable key
/// are skipped with a warning; a repeated key replaces the earlier row.
///
/// # Errors
///
/// Returns [`SourceError::DataFormat`] if a configured column is missing,
/// there are fewer than [`MIN_HISTORY_DAYS`] date columns, the dates are
/// not consecutive, or a count cell is not a number. Returns
/// [`SourceError::Csv`] if the CSV itself cannot be decoded.
pub fn parse_wide_time_series(
    bytes: &[u8],
    layout: &WideTimeSeriesLayout,
) -> Result<PrimaryTable, SourceError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_owned())
        .collect();

    let columns = locate_columns(&headers, layout)?;
    let start = columns.dates[0].1;

    let mut series = BTreeMap::new();
    let mut skipped = 0_usize;

    for (row, result) in reader.records().enumerate() {
        let record = result?;

        let Some(fips) = row_key(&record, &columns, layout) else {
            log::warn!("Row {}: no usable county key, skipping", row + 2);
            skipped += 1;
            continue;
        };

        let counts = columns
            .dates
            .iter()
            .map(|&(i, date)| {
                let cell = record.get(i).unwrap_or_default();
                parse_count(cell).ok_or_else(|| {
                    SourceError::data_format(format!(
                        "{fips}: invalid count {cell:?} for {date} (column {:?})",
                        headers[i]
                    ))
                })
            })
            .collect::<Result<Vec<i64>, _>>()?;

        if series
            .insert(fips.clone(), CaseSeries::new(fips.clone(), start, counts))
            .is_some()
        {
            log::warn!("Row {}: duplicate county {fips}, later row wins", row + 2);
        }
    }

    log::info!(
        "Parsed {} counties over {} days ({} rows skipped)",
        series.len(),
        columns.dates.len(),
        skipped
    );

    Ok(PrimaryTable {
        dates: columns.dates.into_iter().map(|(_, d)| d).collect(),
        series,
    })
}
