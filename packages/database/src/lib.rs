#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `DuckDB` storage for county estimates and subscriptions.
//!
//! A single database file (see [`paths::db_path`]) holds the `counties`,
//! `subscribers`, and `county_subscriptions` tables. Each query shape has
//! its own typed function in [`county_db`] or [`subscriber_db`].

pub mod county_db;
pub mod paths;
pub mod subscriber_db;

use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use covid_track_database_models::CountyRecord;
use covid_track_geography_models::CountyFips;
use duckdb::Connection;

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// `DuckDB` query error.
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    /// I/O error (creating the data directory).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored value could not be converted to its model type.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },

    /// An update matched no row.
    #[error("no county row with FIPS {fips}")]
    NoRowsUpdated {
        /// Key of the record that was written.
        fips: CountyFips,
    },
}

/// Read and write access to county records, keyed by FIPS code.
pub trait CountyStore {
    /// Returns every stored county.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    fn find_all_counties(&self) -> Result<Vec<CountyRecord>, DbError>;

    /// Writes every estimate slot of `record` in one statement.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the write fails or no row matches.
    fn update_county(&self, record: &CountyRecord) -> Result<(), DbError>;
}

impl CountyStore for Connection {
    fn find_all_counties(&self) -> Result<Vec<CountyRecord>, DbError> {
        county_db::find_all_counties(self)
    }

    fn update_county(&self, record: &CountyRecord) -> Result<(), DbError> {
        county_db::update_county(self, record)
    }
}

/// Opens (or creates) the database at `path` and ensures the schema
/// exists.
///
/// # Errors
///
/// Returns [`DbError`] if the connection or schema creation fails.
pub fn open(path: &Path) -> Result<Connection, DbError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(path)?;
    create_schema(&conn)?;

    log::debug!("Opened database at {}", path.display());
    Ok(conn)
}

/// Opens the database at [`paths::db_path`].
///
/// # Errors
///
/// Returns [`DbError`] if the connection or schema creation fails.
pub fn open_default() -> Result<Connection, DbError> {
    open(&paths::db_path())
}

/// Opens a throwaway in-memory database with the schema applied.
///
/// # Errors
///
/// Returns [`DbError`] if the connection or schema creation fails.
pub fn open_in_memory() -> Result<Connection, DbError> {
    let conn = Connection::open_in_memory()?;
    create_schema(&conn)?;
    Ok(conn)
}

/// Creates all tables and sequences if they do not exist.
///
/// # Errors
///
/// Returns [`DbError`] if any statement fails.
pub fn create_schema(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE SEQUENCE IF NOT EXISTS county_id_seq START 1;
        CREATE TABLE IF NOT EXISTS counties (
            id BIGINT PRIMARY KEY DEFAULT nextval('county_id_seq'),
            fips TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            state TEXT NOT NULL,
            population BIGINT NOT NULL,
            confirmed_cases BIGINT,
            confirmed_cases_yesterday BIGINT,
            confirmed_cases_last_week BIGINT,
            active_cases DOUBLE,
            active_cases_yesterday DOUBLE,
            active_cases_last_week DOUBLE,
            last_updated TIMESTAMP
        );

        CREATE SEQUENCE IF NOT EXISTS subscriber_id_seq START 1;
        CREATE TABLE IF NOT EXISTS subscribers (
            id BIGINT PRIMARY KEY DEFAULT nextval('subscriber_id_seq'),
            handle TEXT NOT NULL,
            handle_type TEXT NOT NULL,
            verified BOOLEAN NOT NULL DEFAULT FALSE,
            notifications BIGINT NOT NULL DEFAULT 0,
            created_on TIMESTAMP NOT NULL,
            unsubscribed_on TIMESTAMP
        );

        CREATE SEQUENCE IF NOT EXISTS county_subscription_id_seq START 1;
        CREATE TABLE IF NOT EXISTS county_subscriptions (
            id BIGINT PRIMARY KEY DEFAULT nextval('county_subscription_id_seq'),
            subscriber_id BIGINT NOT NULL,
            county_id BIGINT NOT NULL,
            frequency TEXT NOT NULL,
            last_notification TIMESTAMP,
            UNIQUE (subscriber_id, county_id)
        );",
    )?;

    Ok(())
}

/// Formats a timestamp the way it is bound into `TIMESTAMP` columns.
pub(crate) fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Parses a `DuckDB` `TIMESTAMP::TEXT` value, with or without fractional
/// seconds.
pub(crate) fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(naive.and_utc());
    }

    log::warn!("Failed to parse timestamp: {s:?}");
    None
}
