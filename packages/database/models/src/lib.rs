#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Row types stored in the `DuckDB` database.
//!
//! [`CountyRecord`] keeps three slots per metric (current, yesterday, last
//! week) and exposes the derived values the digests report. Subscribers
//! and their per-county subscriptions live alongside it.

use chrono::{DateTime, Utc};
use covid_track_case_models::SnapshotPair;
use covid_track_geography_models::CountyFips;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Active cases per million below which a county is [`CountyStatus::Green`].
pub const YELLOW_THRESHOLD_PER_MILLION: f64 = 400.0;

/// Active cases per million at or above which a county is
/// [`CountyStatus::Red`].
pub const RED_THRESHOLD_PER_MILLION: f64 = 800.0;

/// A county row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountyRecord {
    /// Primary key.
    pub id: i64,
    /// Five-digit county FIPS code (unique).
    pub fips: CountyFips,
    /// County name as seeded, e.g. `"Nantucket County"`.
    pub name: String,
    /// Full state name.
    pub state: String,
    /// Census population.
    pub population: i64,
    /// Cumulative confirmed cases at the most recent reference date.
    pub confirmed_cases: Option<i64>,
    /// Value of `confirmed_cases` before the latest update.
    pub confirmed_cases_yesterday: Option<i64>,
    /// Cumulative confirmed cases one week before the reference date.
    pub confirmed_cases_last_week: Option<i64>,
    /// Estimated active cases at the most recent reference date.
    pub active_cases: Option<f64>,
    /// Value of `active_cases` before the latest update.
    pub active_cases_yesterday: Option<f64>,
    /// Estimated active cases one week before the reference date.
    pub active_cases_last_week: Option<f64>,
    /// When the estimates were last written.
    pub last_updated: Option<DateTime<Utc>>,
}

/// Fields supplied when seeding a county.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCounty {
    /// Five-digit county FIPS code.
    pub fips: CountyFips,
    /// County name.
    pub name: String,
    /// Full state name.
    pub state: String,
    /// Census population.
    pub population: i64,
}

/// Traffic-light status derived from active cases per million.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum CountyStatus {
    /// Fewer than 400 active cases per million.
    Green,
    /// 400 to 800 active cases per million.
    Yellow,
    /// 800 or more active cases per million, or unknown.
    Red,
}

impl CountyRecord {
    /// Shifts current values into the yesterday slots, then overwrites the
    /// current and last-week slots from `snapshots`.
    ///
    /// Confirmed and active are shifted independently: a county that had
    /// only one of them set keeps `None` in the other yesterday slot.
    pub fn apply_snapshots(&mut self, snapshots: &SnapshotPair, now: DateTime<Utc>) {
        self.confirmed_cases_yesterday = self.confirmed_cases;
        self.active_cases_yesterday = self.active_cases;

        self.confirmed_cases = Some(snapshots.current.confirmed_total);
        self.active_cases = Some(snapshots.current.active_estimate);

        self.confirmed_cases_last_week = Some(snapshots.prior_week.confirmed_total);
        self.active_cases_last_week = Some(snapshots.prior_week.active_estimate);

        self.last_updated = Some(now);
    }

    /// Name without a trailing `" County"`.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.strip_suffix(" County").unwrap_or(&self.name)
    }

    /// Two-letter state abbreviation derived from the FIPS prefix.
    #[must_use]
    pub fn state_abbr(&self) -> &'static str {
        self.fips.state_abbr()
    }

    /// Active cases per million residents, if known.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn active_cases_per_million(&self) -> Option<f64> {
        let active = self.active_cases?;
        if self.population == 0 {
            return None;
        }
        Some(active / self.population as f64 * 1_000_000.0)
    }

    /// Status from [`Self::active_cases_per_million`]; unknown counts as
    /// red.
    #[must_use]
    pub fn status(&self) -> CountyStatus {
        match self.active_cases_per_million() {
            Some(v) if v < YELLOW_THRESHOLD_PER_MILLION => CountyStatus::Green,
            Some(v) if v < RED_THRESHOLD_PER_MILLION => CountyStatus::Yellow,
            _ => CountyStatus::Red,
        }
    }

    /// Percent change in confirmed cases versus one week earlier.
    #[must_use]
    pub fn confirmed_week_change(&self) -> Option<f64> {
        percent_change(
            self.confirmed_cases.map(to_f64),
            self.confirmed_cases_last_week.map(to_f64),
        )
    }

    /// Percent change in confirmed cases versus the previous update.
    #[must_use]
    pub fn confirmed_day_change(&self) -> Option<f64> {
        percent_change(
            self.confirmed_cases.map(to_f64),
            self.confirmed_cases_yesterday.map(to_f64),
        )
    }

    /// Percent change in active cases versus one week earlier.
    #[must_use]
    pub fn active_week_change(&self) -> Option<f64> {
        percent_change(self.active_cases, self.active_cases_last_week)
    }

    /// Percent change in active cases versus the previous update.
    #[must_use]
    pub fn active_day_change(&self) -> Option<f64> {
        percent_change(self.active_cases, self.active_cases_yesterday)
    }
}

#[allow(clippy::cast_precision_loss)]
const fn to_f64(v: i64) -> f64 {
    v as f64
}

/// `(current - previous) / previous * 100`, or `None` when either value is
/// missing or `previous` is zero.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn percent_change(current: Option<f64>, previous: Option<f64>) -> Option<f64> {
    let current = current?;
    let previous = previous?;
    if previous == 0.0 {
        return None;
    }
    Some((current - previous) / previous * 100.0)
}

/// Short signed percentage for a digest line.
///
/// Empty when unknown, `"0%"` when the value rounds to zero, otherwise
/// `"+12%"` or `"-3%"`. Halves round to even.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn change_blurb(change: Option<f64>) -> String {
    let Some(value) = change else {
        return String::new();
    };
    let rounded = value.round_ties_even();
    if rounded == 0.0 {
        return "0%".to_string();
    }
    let sign = if value > 0.0 { '+' } else { '-' };
    format!("{sign}{:.0}%", rounded.abs())
}

/// How a notification handle is reached.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum HandleType {
    /// Ten-digit phone number (SMS).
    Phone,
    /// Email address.
    Email,
}

/// Someone who receives digests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscriber {
    /// Primary key.
    pub id: i64,
    /// Phone number or email address.
    pub handle: String,
    /// Channel the handle belongs to.
    pub handle_type: HandleType,
    /// Whether the handle has been confirmed.
    pub verified: bool,
    /// Number of digests delivered so far.
    pub notifications: i64,
    /// When the subscriber signed up.
    pub created_on: DateTime<Utc>,
    /// When the subscriber opted out, if they did.
    pub unsubscribed_on: Option<DateTime<Utc>>,
}

impl Subscriber {
    /// Whether the subscriber still wants digests.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.unsubscribed_on.is_none()
    }
}

/// How often a subscription is delivered.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
pub enum Frequency {
    /// At most once per calendar day.
    Daily,
    /// At most once per seven days.
    Weekly,
    /// At most once per calendar month.
    Monthly,
}

/// A subscriber following one county.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountySubscription {
    /// Primary key.
    pub id: i64,
    /// Owning subscriber.
    pub subscriber_id: i64,
    /// Followed county.
    pub county_id: i64,
    /// Delivery cadence.
    pub frequency: Frequency,
    /// When a digest including this county was last delivered.
    pub last_notification: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use covid_track_case_models::ActiveCaseSnapshot;

    use super::*;

    fn county() -> CountyRecord {
        CountyRecord {
            id: 1,
            fips: CountyFips::new("25019").unwrap(),
            name: "Nantucket County".to_string(),
            state: "Massachusetts".to_string(),
            population: 11_399,
            confirmed_cases: Some(100),
            confirmed_cases_yesterday: Some(90),
            confirmed_cases_last_week: Some(50),
            active_cases: Some(20.0),
            active_cases_yesterday: Some(16.0),
            active_cases_last_week: Some(10.0),
            last_updated: None,
        }
    }

    fn pair(current: (f64, i64), prior: (f64, i64)) -> SnapshotPair {
        SnapshotPair {
            current: ActiveCaseSnapshot {
                active_estimate: current.0,
                confirmed_total: current.1,
            },
            prior_week: ActiveCaseSnapshot {
                active_estimate: prior.0,
                confirmed_total: prior.1,
            },
        }
    }

    #[test]
    fn apply_shifts_then_overwrites() {
        let mut record = county();
        let now = Utc::now();
        record.apply_snapshots(&pair((30.0, 110), (12.0, 60)), now);

        assert_eq!(record.confirmed_cases_yesterday, Some(100));
        assert_eq!(record.active_cases_yesterday, Some(20.0));
        assert_eq!(record.confirmed_cases, Some(110));
        assert_eq!(record.active_cases, Some(30.0));
        assert_eq!(record.confirmed_cases_last_week, Some(60));
        assert_eq!(record.active_cases_last_week, Some(12.0));
        assert_eq!(record.last_updated, Some(now));
    }

    #[test]
    fn apply_shifts_metrics_independently() {
        let mut record = county();
        record.active_cases = None;
        record.apply_snapshots(&pair((1.0, 2), (0.5, 1)), Utc::now());
        assert_eq!(record.active_cases_yesterday, None);
        assert_eq!(record.confirmed_cases_yesterday, Some(100));
    }

    #[test]
    fn display_name_and_state() {
        let record = county();
        assert_eq!(record.display_name(), "Nantucket");
        assert_eq!(record.state_abbr(), "MA");

        let parish = CountyRecord {
            name: "Orleans Parish".to_string(),
            ..county()
        };
        assert_eq!(parish.display_name(), "Orleans Parish");
    }

    #[test]
    fn per_million_and_status() {
        let mut record = county();
        record.population = 1_000_000;

        record.active_cases = Some(399.0);
        assert_eq!(record.status(), CountyStatus::Green);
        record.active_cases = Some(400.0);
        assert_eq!(record.status(), CountyStatus::Yellow);
        record.active_cases = Some(800.0);
        assert_eq!(record.status(), CountyStatus::Red);

        record.active_cases = None;
        assert_eq!(record.active_cases_per_million(), None);
        assert_eq!(record.status(), CountyStatus::Red);

        record.active_cases = Some(5.0);
        record.population = 0;
        assert_eq!(record.active_cases_per_million(), None);
    }

    #[test]
    fn percent_changes() {
        let record = county();
        assert_eq!(record.confirmed_week_change(), Some(100.0));
        assert_eq!(record.active_day_change(), Some(25.0));
        assert_eq!(percent_change(Some(5.0), Some(0.0)), None);
        assert_eq!(percent_change(None, Some(3.0)), None);
    }

    #[test]
    fn blurbs() {
        assert_eq!(change_blurb(None), "");
        assert_eq!(change_blurb(Some(0.4)), "0%");
        assert_eq!(change_blurb(Some(-0.4)), "0%");
        assert_eq!(change_blurb(Some(12.3)), "+12%");
        assert_eq!(change_blurb(Some(-3.2)), "-3%");
        assert_eq!(change_blurb(Some(2.5)), "+2%");
    }

    #[test]
    fn enum_strings() {
        assert_eq!(HandleType::Phone.as_ref(), "PHONE");
        assert_eq!("EMAIL".parse::<HandleType>().unwrap(), HandleType::Email);
        assert_eq!(Frequency::Weekly.as_ref(), "Weekly");
        assert_eq!(CountyStatus::Yellow.to_string(), "YELLOW");
    }
}
