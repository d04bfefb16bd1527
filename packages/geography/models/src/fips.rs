//! US FIPS code utilities.
//!
//! Normalizes the county identifiers found in public case feeds into
//! five-digit county FIPS codes, and maps two-digit state FIPS prefixes to
//! states and territories.

/// Width of a county FIPS code (two state digits + three county digits).
pub const COUNTY_FIPS_LEN: usize = 5;

/// Normalizes a raw county code cell into a five-digit FIPS string.
///
/// Feeds that store the code as a float (`"25019.0"`) or drop leading
/// zeros (`"1001"`) are both handled: anything after a `.` is discarded and
/// the remainder is left-padded with zeros.
///
/// Returns `None` for empty cells, non-digit content, or codes longer than
/// five digits.
#[must_use]
pub fn normalize_county_code(raw: &str) -> Option<String> {
    let whole = raw.trim().split('.').next().unwrap_or_default();

    if whole.is_empty() || whole.len() > COUNTY_FIPS_LEN {
        return None;
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    Some(format!("{whole:0>COUNTY_FIPS_LEN$}"))
}

/// Derives a county FIPS code from a composite UID by dropping a fixed
/// prefix (e.g. the `840` country code in `84025019`).
///
/// Returns `None` if the UID is too short or the remainder is not a valid
/// county code.
#[must_use]
pub fn county_code_from_uid(uid: &str, prefix_len: usize) -> Option<String> {
    let uid = uid.trim();
    let rest = uid.get(prefix_len..)?;
    normalize_county_code(rest)
}

/// A state or territory keyed by its two-digit FIPS prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct State {
    /// Two-digit FIPS code.
    pub fips: &'static str,
    /// USPS abbreviation.
    pub abbr: &'static str,
    /// Full name.
    pub name: &'static str,
}

const fn st(fips: &'static str, abbr: &'static str, name: &'static str) -> State {
    State { fips, abbr, name }
}

/// The 50 states, DC, and the inhabited territories that appear in county
/// case feeds, ordered by FIPS code.
pub const STATES: &[State] = &[
    st("01", "AL", "Alabama"),
    st("02", "AK", "Alaska"),
    st("04", "AZ", "Arizona"),
    st("05", "AR", "Arkansas"),
    st("06", "CA", "California"),
    st("08", "CO", "Colorado"),
    st("09", "CT", "Connecticut"),
    st("10", "DE", "Delaware"),
    st("11", "DC", "District of Columbia"),
    st("12", "FL", "Florida"),
    st("13", "GA", "Georgia"),
    st("15", "HI", "Hawaii"),
    st("16", "ID", "Idaho"),
    st("17", "IL", "Illinois"),
    st("18", "IN", "Indiana"),
    st("19", "IA", "Iowa"),
    st("20", "KS", "Kansas"),
    st("21", "KY", "Kentucky"),
    st("22", "LA", "Louisiana"),
    st("23", "ME", "Maine"),
    st("24", "MD", "Maryland"),
    st("25", "MA", "Massachusetts"),
    st("26", "MI", "Michigan"),
    st("27", "MN", "Minnesota"),
    st("28", "MS", "Mississippi"),
    st("29", "MO", "Missouri"),
    st("30", "MT", "Montana"),
    st("31", "NE", "Nebraska"),
    st("32", "NV", "Nevada"),
    st("33", "NH", "New Hampshire"),
    st("34", "NJ", "New Jersey"),
    st("35", "NM", "New Mexico"),
    st("36", "NY", "New York"),
    st("37", "NC", "North Carolina"),
    st("38", "ND", "North Dakota"),
    st("39", "OH", "Ohio"),
    st("40", "OK", "Oklahoma"),
    st("41", "OR", "Oregon"),
    st("42", "PA", "Pennsylvania"),
    st("44", "RI", "Rhode Island"),
    st("45", "SC", "South Carolina"),
    st("46", "SD", "South Dakota"),
    st("47", "TN", "Tennessee"),
    st("48", "TX", "Texas"),
    st("49", "UT", "Utah"),
    st("50", "VT", "Vermont"),
    st("51", "VA", "Virginia"),
    st("53", "WA", "Washington"),
    st("54", "WV", "West Virginia"),
    st("55", "WI", "Wisconsin"),
    st("56", "WY", "Wyoming"),
    st("60", "AS", "American Samoa"),
    st("66", "GU", "Guam"),
    st("69", "MP", "Northern Mariana Islands"),
    st("72", "PR", "Puerto Rico"),
    st("78", "VI", "Virgin Islands"),
];

/// Looks up a state or territory by its two-digit FIPS code.
#[must_use]
pub fn state(fips: &str) -> Option<&'static State> {
    STATES
        .binary_search_by(|s| s.fips.cmp(fips))
        .ok()
        .map(|i| &STATES[i])
}

/// Two-letter abbreviation for a state FIPS code, or `"??"` when unknown.
#[must_use]
pub fn state_abbr(fips: &str) -> &'static str {
    state(fips).map_or("??", |s| s.abbr)
}
