//! County queries.
//!
//! The estimate slots of a county are always written together by
//! [`update_county`], a single `UPDATE`, so readers never observe a
//! partially shifted row.

use covid_track_database_models::{CountyRecord, NewCounty};
use covid_track_geography_models::CountyFips;
use duckdb::Connection;

use crate::{DbError, format_timestamp, parse_timestamp};

const COUNTY_COLUMNS: &str = "id, fips, name, state, population,
    confirmed_cases, confirmed_cases_yesterday, confirmed_cases_last_week,
    active_cases, active_cases_yesterday, active_cases_last_week,
    last_updated::TEXT";

/// A county row as read, before key and timestamp validation.
struct CountyRow {
    id: i64,
    fips: String,
    name: String,
    state: String,
    population: i64,
    confirmed: [Option<i64>; 3],
    active: [Option<f64>; 3],
    last_updated: Option<String>,
}

fn read_row(row: &duckdb::Row<'_>) -> duckdb::Result<CountyRow> {
    Ok(CountyRow {
        id: row.get(0)?,
        fips: row.get(1)?,
        name: row.get(2)?,
        state: row.get(3)?,
        population: row.get(4)?,
        confirmed: [row.get(5)?, row.get(6)?, row.get(7)?],
        active: [row.get(8)?, row.get(9)?, row.get(10)?],
        last_updated: row.get(11)?,
    })
}

impl TryFrom<CountyRow> for CountyRecord {
    type Error = DbError;

    fn try_from(row: CountyRow) -> Result<Self, Self::Error> {
        let fips = CountyFips::new(&row.fips).map_err(|e| DbError::Conversion {
            message: format!("county {}: {e}", row.id),
        })?;
        let [confirmed_cases, confirmed_cases_yesterday, confirmed_cases_last_week] =
            row.confirmed;
        let [active_cases, active_cases_yesterday, active_cases_last_week] = row.active;

        Ok(Self {
            id: row.id,
            fips,
            name: row.name,
            state: row.state,
            population: row.population,
            confirmed_cases,
            confirmed_cases_yesterday,
            confirmed_cases_last_week,
            active_cases,
            active_cases_yesterday,
            active_cases_last_week,
            last_updated: row.last_updated.as_deref().and_then(parse_timestamp),
        })
    }
}

fn collect_rows(
    rows: impl Iterator<Item = duckdb::Result<CountyRow>>,
) -> Result<Vec<CountyRecord>, DbError> {
    rows.map(|row| -> Result<CountyRecord, DbError> { CountyRecord::try_from(row?) })
        .collect()
}

/// Returns every county, ordered by FIPS code.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a stored FIPS code is invalid.
pub fn find_all_counties(conn: &Connection) -> Result<Vec<CountyRecord>, DbError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COUNTY_COLUMNS} FROM counties ORDER BY fips"
    ))?;
    let rows = stmt.query_map([], read_row)?;
    collect_rows(rows)
}

/// Returns the counties with the given primary keys.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn find_counties_by_ids(conn: &Connection, ids: &[i64]) -> Result<Vec<CountyRecord>, DbError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = vec!["?"; ids.len()].join(", ");
    let mut stmt = conn.prepare(&format!(
        "SELECT {COUNTY_COLUMNS} FROM counties WHERE id IN ({placeholders}) ORDER BY fips"
    ))?;
    let rows = stmt.query_map(duckdb::params_from_iter(ids), read_row)?;
    collect_rows(rows)
}

/// Returns the county with the given FIPS code, if stored.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn find_county(conn: &Connection, fips: &CountyFips) -> Result<Option<CountyRecord>, DbError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COUNTY_COLUMNS} FROM counties WHERE fips = ?"
    ))?;
    match stmt.query_row([fips.as_str()], read_row) {
        Ok(row) => CountyRecord::try_from(row).map(Some),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(DbError::DuckDb(e)),
    }
}

/// Writes the estimate slots and `last_updated` of `record`.
///
/// # Errors
///
/// Returns [`DbError::NoRowsUpdated`] if no row has the record's FIPS
/// code, or [`DbError::DuckDb`] if the statement fails.
pub fn update_county(conn: &Connection, record: &CountyRecord) -> Result<(), DbError> {
    let last_updated = record.last_updated.as_ref().map(format_timestamp);

    let rows = conn.execute(
        "UPDATE counties SET
            confirmed_cases = ?,
            confirmed_cases_yesterday = ?,
            confirmed_cases_last_week = ?,
            active_cases = ?,
            active_cases_yesterday = ?,
            active_cases_last_week = ?,
            last_updated = ?
         WHERE fips = ?",
        duckdb::params![
            record.confirmed_cases,
            record.confirmed_cases_yesterday,
            record.confirmed_cases_last_week,
            record.active_cases,
            record.active_cases_yesterday,
            record.active_cases_last_week,
            last_updated,
            record.fips.as_str(),
        ],
    )?;

    if rows == 0 {
        return Err(DbError::NoRowsUpdated {
            fips: record.fips.clone(),
        });
    }
    Ok(())
}

/// Inserts a county or refreshes its name, state, and population. Estimate
/// slots are left untouched.
///
/// # Errors
///
/// Returns [`DbError`] if the upsert fails.
pub fn upsert_county(conn: &Connection, county: &NewCounty) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO counties (fips, name, state, population) VALUES (?, ?, ?, ?)
         ON CONFLICT (fips) DO UPDATE SET
            name = EXCLUDED.name,
            state = EXCLUDED.state,
            population = EXCLUDED.population",
        duckdb::params![
            county.fips.as_str(),
            county.name,
            county.state,
            county.population
        ],
    )?;
    Ok(())
}

/// Returns the number of stored counties.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn count_counties(conn: &Connection) -> Result<u64, DbError> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM counties", [], |row| row.get(0))?;
    Ok(u64::try_from(count).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use covid_track_case_models::{ActiveCaseSnapshot, SnapshotPair};

    use super::*;
    use crate::{CountyStore, open_in_memory};

    fn fips(code: &str) -> CountyFips {
        CountyFips::new(code).unwrap()
    }

    fn seed(conn: &Connection, code: &str, name: &str) {
        upsert_county(
            conn,
            &NewCounty {
                fips: fips(code),
                name: name.to_string(),
                state: "Massachusetts".to_string(),
                population: 10_000,
            },
        )
        .unwrap();
    }

    fn pair(active: f64, confirmed: i64) -> SnapshotPair {
        SnapshotPair {
            current: ActiveCaseSnapshot {
                active_estimate: active,
                confirmed_total: confirmed,
            },
            prior_week: ActiveCaseSnapshot {
                active_estimate: active / 2.0,
                confirmed_total: confirmed / 2,
            },
        }
    }

    #[test]
    fn seeded_county_has_empty_slots() {
        let conn = open_in_memory().unwrap();
        seed(&conn, "25019", "Nantucket County");

        let county = find_county(&conn, &fips("25019")).unwrap().unwrap();
        assert_eq!(county.name, "Nantucket County");
        assert_eq!(county.population, 10_000);
        assert_eq!(county.confirmed_cases, None);
        assert_eq!(county.active_cases, None);
        assert_eq!(county.last_updated, None);

        assert!(find_county(&conn, &fips("25007")).unwrap().is_none());
    }

    #[test]
    fn upsert_refreshes_metadata_only() {
        let conn = open_in_memory().unwrap();
        seed(&conn, "25019", "Nantucket");

        let mut county = find_county(&conn, &fips("25019")).unwrap().unwrap();
        county.apply_snapshots(&pair(12.0, 40), Utc::now());
        update_county(&conn, &county).unwrap();

        seed(&conn, "25019", "Nantucket County");
        let county = find_county(&conn, &fips("25019")).unwrap().unwrap();
        assert_eq!(county.name, "Nantucket County");
        assert_eq!(county.confirmed_cases, Some(40));
        assert_eq!(count_counties(&conn).unwrap(), 1);
    }

    #[test]
    fn update_writes_every_slot() {
        let conn = open_in_memory().unwrap();
        seed(&conn, "25019", "Nantucket County");
        let now = Utc.with_ymd_and_hms(2020, 11, 7, 6, 0, 0).unwrap();

        let mut county = find_county(&conn, &fips("25019")).unwrap().unwrap();
        county.apply_snapshots(&pair(10.0, 100), now);
        conn.update_county(&county).unwrap();

        let mut county = find_county(&conn, &fips("25019")).unwrap().unwrap();
        county.apply_snapshots(&pair(30.0, 120), now);
        conn.update_county(&county).unwrap();

        let stored = find_county(&conn, &fips("25019")).unwrap().unwrap();
        assert_eq!(stored.confirmed_cases, Some(120));
        assert_eq!(stored.confirmed_cases_yesterday, Some(100));
        assert_eq!(stored.confirmed_cases_last_week, Some(60));
        assert_eq!(stored.active_cases, Some(30.0));
        assert_eq!(stored.active_cases_yesterday, Some(10.0));
        assert_eq!(stored.active_cases_last_week, Some(15.0));
        assert_eq!(stored.last_updated, Some(now));
    }

    #[test]
    fn update_of_unknown_county_fails() {
        let conn = open_in_memory().unwrap();
        seed(&conn, "25019", "Nantucket County");

        let mut county = find_county(&conn, &fips("25019")).unwrap().unwrap();
        county.fips = fips("25007");
        let err = update_county(&conn, &county).unwrap_err();
        assert!(matches!(err, DbError::NoRowsUpdated { .. }));
    }

    #[test]
    fn finds_all_and_by_id() {
        let conn = open_in_memory().unwrap();
        seed(&conn, "25019", "Nantucket County");
        seed(&conn, "25007", "Dukes County");
        seed(&conn, "01001", "Autauga County");

        let all = conn.find_all_counties().unwrap();
        let codes: Vec<&str> = all.iter().map(|c| c.fips.as_str()).collect();
        assert_eq!(codes, ["01001", "25007", "25019"]);

        let ids: Vec<i64> = all.iter().skip(1).map(|c| c.id).collect();
        let some = find_counties_by_ids(&conn, &ids).unwrap();
        assert_eq!(some.len(), 2);
        assert!(find_counties_by_ids(&conn, &[]).unwrap().is_empty());
    }
}
