//! When a subscription is due.

use chrono::{DateTime, Datelike, Utc};
use covid_track_database_models::Frequency;

/// Days a weekly subscription waits between digests.
pub const WEEKLY_INTERVAL_DAYS: i64 = 7;

/// Whether a subscription with `frequency`, last delivered at `last`, is
/// due at `now`.
///
/// Intervals count calendar boundaries rather than elapsed hours: a daily
/// digest sent at 23:00 is due again at 00:00. A monthly digest is due
/// once the calendar month has advanced and today's day of month has
/// reached the last delivery's. Never-delivered subscriptions are always
/// due.
#[must_use]
pub fn is_due(frequency: Frequency, last: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    let Some(last) = last else {
        return true;
    };

    let days = (now.date_naive() - last.date_naive()).num_days();
    match frequency {
        Frequency::Daily => days >= 1,
        Frequency::Weekly => days >= WEEKLY_INTERVAL_DAYS,
        Frequency::Monthly => months_between(last, now) >= 1 && now.day() >= last.day(),
    }
}

fn months_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    let index = |d: DateTime<Utc>| i64::from(d.year()) * 12 + i64::from(d.month0());
    index(to) - index(from)
}
