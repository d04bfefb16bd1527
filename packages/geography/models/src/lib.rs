#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! County identifiers shared by every feed and the database.
//!
//! All feeds are reconciled onto a single key space: the five-digit county
//! FIPS code wrapped in [`CountyFips`].

pub mod fips;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when a string is not a valid five-digit county FIPS code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid county FIPS code {value:?}: expected 5 digits")]
pub struct InvalidFipsError {
    /// The rejected input.
    pub value: String,
}

/// Canonical county key: a five-character, zero-padded numeric FIPS code.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CountyFips(String);

impl CountyFips {
    /// Builds a key from an already-canonical five-digit code.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidFipsError`] unless `code` is exactly five ASCII
    /// digits.
    pub fn new(code: &str) -> Result<Self, InvalidFipsError> {
        if code.len() == fips::COUNTY_FIPS_LEN && code.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(code.to_string()))
        } else {
            Err(InvalidFipsError {
                value: code.to_string(),
            })
        }
    }

    /// Normalizes a raw feed cell (`"1001.0"`, `"25019"`) into a key.
    ///
    /// See [`fips::normalize_county_code`].
    #[must_use]
    pub fn from_raw(raw: &str) -> Option<Self> {
        fips::normalize_county_code(raw).map(Self)
    }

    /// Derives a key from a composite UID by dropping `prefix_len`
    /// leading characters.
    #[must_use]
    pub fn from_uid(uid: &str, prefix_len: usize) -> Option<Self> {
        fips::county_code_from_uid(uid, prefix_len).map(Self)
    }

    /// The five-digit code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The two-digit state prefix.
    #[must_use]
    pub fn state_fips(&self) -> &str {
        &self.0[..2]
    }

    /// Two-letter abbreviation of the county's state, `"??"` if unknown.
    #[must_use]
    pub fn state_abbr(&self) -> &'static str {
        fips::state_abbr(self.state_fips())
    }
}

impl fmt::Display for CountyFips {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CountyFips {
    type Err = InvalidFipsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for CountyFips {
    type Error = InvalidFipsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<CountyFips> for String {
    fn from(value: CountyFips) -> Self {
        value.0
    }
}

impl AsRef<str> for CountyFips {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_canonical_codes() {
        let fips = CountyFips::new("25019").unwrap();
        assert_eq!(fips.as_str(), "25019");
        assert_eq!(fips.state_fips(), "25");
        assert_eq!(fips.state_abbr(), "MA");
    }

    #[test]
    fn rejects_non_canonical_codes() {
        assert!(CountyFips::new("1001").is_err());
        assert!(CountyFips::new("1001.0").is_err());
        assert!(CountyFips::new("abcde").is_err());
    }

    #[test]
    fn from_raw_normalizes() {
        assert_eq!(CountyFips::from_raw("1001.0").unwrap().as_str(), "01001");
    }

    #[test]
    fn try_from_string_validates() {
        let ok = CountyFips::try_from("25007".to_string()).unwrap();
        assert_eq!(ok.as_str(), "25007");
        assert!(CountyFips::try_from("250".to_string()).is_err());
    }
}
