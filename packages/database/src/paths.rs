//! Location of the `DuckDB` database file.

use std::path::{Path, PathBuf};

/// Environment variable overriding the database file location.
pub const DB_PATH_ENV: &str = "COVID_TRACK_DB";

/// File name used inside [`data_dir`] when [`DB_PATH_ENV`] is unset.
pub const DB_FILE_NAME: &str = "covid_track.duckdb";

/// The workspace `data/` directory.
///
/// Two levels above this crate's manifest (`packages/database`), fixed at
/// compile time. Falls back to `./data` for a relocated binary whose
/// manifest path is too shallow.
#[must_use]
pub fn data_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
        .join("data")
}

/// The database file: [`DB_PATH_ENV`] if set, otherwise [`DB_FILE_NAME`]
/// in [`data_dir`].
#[must_use]
pub fn db_path() -> PathBuf {
    std::env::var_os(DB_PATH_ENV).map_or_else(|| data_dir().join(DB_FILE_NAME), PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_file_lives_in_data_dir() {
        let dir = data_dir();
        assert!(dir.ends_with("data"));
        assert!(dir.parent().unwrap().join("packages/database").exists());
    }
}
