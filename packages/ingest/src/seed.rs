//! Out-of-band county seeding from a `fips,name,state,population` CSV.

use covid_track_database::county_db;
use covid_track_database_models::NewCounty;
use covid_track_geography_models::CountyFips;
use duckdb::Connection;
use serde::Deserialize;

use crate::IngestError;

#[derive(Debug, Deserialize)]
struct SeedRow {
    fips: String,
    name: String,
    state: String,
    population: i64,
}

/// Parses a county seed CSV.
///
/// The `fips` column accepts the same forms as the feeds (`"1001"`,
/// `"1001.0"`, `"01001"`).
///
/// # Errors
///
/// Returns [`IngestError::Csv`] if a row cannot be decoded, or
/// [`IngestError::Seed`] if a row has an unusable FIPS code or a negative
/// population.
pub fn read_seed_csv(bytes: &[u8]) -> Result<Vec<NewCounty>, IngestError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(bytes);
    let mut counties = Vec::new();

    for (i, result) in reader.deserialize::<SeedRow>().enumerate() {
        let row = result?;
        let line = i as u64 + 1;

        let fips = CountyFips::from_raw(&row.fips).ok_or_else(|| IngestError::Seed {
            row: line,
            message: format!("invalid FIPS code {:?}", row.fips),
        })?;
        if row.population < 0 {
            return Err(IngestError::Seed {
                row: line,
                message: format!("{fips}: negative population {}", row.population),
            });
        }

        counties.push(NewCounty {
            fips,
            name: row.name,
            state: row.state,
            population: row.population,
        });
    }

    Ok(counties)
}

/// Inserts or refreshes every county, returning how many rows were
/// written.
///
/// # Errors
///
/// Returns [`IngestError::Db`] on the first failed upsert.
pub fn seed_counties(conn: &Connection, counties: &[NewCounty]) -> Result<u64, IngestError> {
    let mut written = 0;
    for county in counties {
        county_db::upsert_county(conn, county)?;
        written += 1;
    }
    log::info!("Seeded {written} counties");
    Ok(written)
}
