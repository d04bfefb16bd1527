//! Cell-level parsing shared by the feed readers.

use chrono::NaiveDate;

/// Parses a date as it appears in feed headers or date cells.
///
/// Accepts `M/D/YY` (`1/22/20`), `M/D/YYYY` (`1/22/2020`) and ISO
/// `YYYY-MM-DD`. Returns `None` for anything else, which is how
/// identifier columns are told apart from date columns.
#[must_use]
pub fn parse_feed_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.contains('/') {
        NaiveDate::parse_from_str(s, "%m/%d/%y")
            .or_else(|_| NaiveDate::parse_from_str(s, "%m/%d/%Y"))
            .ok()
    } else {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
    }
}

/// Parses a count cell.
///
/// Accepts integers and integral floats (`"12"`, `"-3"`, `"12.0"`).
/// Returns `None` for empty cells, fractional values, or text.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::float_cmp
)]
pub fn parse_count(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Ok(n) = s.parse::<i64>() {
        return Some(n);
    }
    let f = s.parse::<f64>().ok()?;
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_short_year_headers() {
        assert_eq!(parse_feed_date("1/22/20"), Some(ymd(2020, 1, 22)));
        assert_eq!(parse_feed_date("12/3/21"), Some(ymd(2021, 12, 3)));
    }

    #[test]
    fn parses_long_year_headers() {
        assert_eq!(parse_feed_date("1/22/2020"), Some(ymd(2020, 1, 22)));
    }

    #[test]
    fn parses_iso_dates() {
        assert_eq!(parse_feed_date("2020-11-05"), Some(ymd(2020, 11, 5)));
        assert_eq!(parse_feed_date(" 2020-11-05 "), Some(ymd(2020, 11, 5)));
    }

    #[test]
    fn identifier_headers_are_not_dates() {
        for header in ["UID", "FIPS", "Admin2", "Lat", "Long_", "Combined_Key", ""] {
            assert_eq!(parse_feed_date(header), None, "{header}");
        }
    }

    #[test]
    fn parses_counts() {
        assert_eq!(parse_count("12"), Some(12));
        assert_eq!(parse_count(" -3 "), Some(-3));
        assert_eq!(parse_count("12.0"), Some(12));
    }

    #[test]
    fn rejects_non_counts() {
        assert_eq!(parse_count(""), None);
        assert_eq!(parse_count("n/a"), None);
        assert_eq!(parse_count("1.5"), None);
        assert_eq!(parse_count("NaN"), None);
    }
}
