//! Subscriber and subscription queries.

use chrono::{DateTime, Utc};
use covid_track_database_models::{CountySubscription, Frequency, HandleType, Subscriber};
use duckdb::Connection;

use crate::{DbError, format_timestamp, parse_timestamp};

fn conversion(message: String) -> DbError {
    DbError::Conversion { message }
}

fn parse_required_timestamp(value: &str, what: &str) -> Result<DateTime<Utc>, DbError> {
    parse_timestamp(value).ok_or_else(|| conversion(format!("invalid {what} timestamp {value:?}")))
}

/// Adds a subscriber and returns its id.
///
/// # Errors
///
/// Returns [`DbError`] if the insert fails.
pub fn insert_subscriber(
    conn: &Connection,
    handle: &str,
    handle_type: HandleType,
    verified: bool,
    created_on: DateTime<Utc>,
) -> Result<i64, DbError> {
    let id = conn.query_row(
        "INSERT INTO subscribers (handle, handle_type, verified, created_on)
         VALUES (?, ?, ?, ?)
         RETURNING id",
        duckdb::params![
            handle,
            handle_type.as_ref(),
            verified,
            format_timestamp(&created_on)
        ],
        |row| row.get(0),
    )?;
    Ok(id)
}

/// Marks a subscriber as opted out.
///
/// # Errors
///
/// Returns [`DbError`] if the update fails.
pub fn unsubscribe(conn: &Connection, subscriber_id: i64, now: DateTime<Utc>) -> Result<(), DbError> {
    conn.execute(
        "UPDATE subscribers SET unsubscribed_on = ? WHERE id = ?",
        duckdb::params![format_timestamp(&now), subscriber_id],
    )?;
    Ok(())
}

/// Subscribes a subscriber to a county (or changes the frequency of an
/// existing subscription) and returns the subscription id.
///
/// # Errors
///
/// Returns [`DbError`] if the upsert fails.
pub fn subscribe(
    conn: &Connection,
    subscriber_id: i64,
    county_id: i64,
    frequency: Frequency,
) -> Result<i64, DbError> {
    let id = conn.query_row(
        "INSERT INTO county_subscriptions (subscriber_id, county_id, frequency)
         VALUES (?, ?, ?)
         ON CONFLICT (subscriber_id, county_id) DO UPDATE SET frequency = EXCLUDED.frequency
         RETURNING id",
        duckdb::params![subscriber_id, county_id, frequency.as_ref()],
        |row| row.get(0),
    )?;
    Ok(id)
}

/// Returns every subscription whose subscriber has not opted out.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a stored value is invalid.
pub fn find_active_subscriptions(conn: &Connection) -> Result<Vec<CountySubscription>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT cs.id, cs.subscriber_id, cs.county_id, cs.frequency, cs.last_notification::TEXT
         FROM county_subscriptions cs
         JOIN subscribers s ON s.id = cs.subscriber_id
         WHERE s.unsubscribed_on IS NULL
         ORDER BY cs.subscriber_id, cs.id",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, i64>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, Option<String>>(4)?,
        ))
    })?;

    rows.map(|row| -> Result<CountySubscription, DbError> {
        let (id, subscriber_id, county_id, frequency, last_notification) = row?;
        Ok(CountySubscription {
            id,
            subscriber_id,
            county_id,
            frequency: frequency
                .parse()
                .map_err(|_| conversion(format!("subscription {id}: frequency {frequency:?}")))?,
            last_notification: last_notification.as_deref().and_then(parse_timestamp),
        })
    })
    .collect()
}

/// Returns the subscribers with the given ids.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a stored value is invalid.
pub fn find_subscribers_by_ids(conn: &Connection, ids: &[i64]) -> Result<Vec<Subscriber>, DbError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = vec!["?"; ids.len()].join(", ");
    let mut stmt = conn.prepare(&format!(
        "SELECT id, handle, handle_type, verified, notifications,
                created_on::TEXT, unsubscribed_on::TEXT
         FROM subscribers WHERE id IN ({placeholders}) ORDER BY id"
    ))?;

    let rows = stmt.query_map(duckdb::params_from_iter(ids), |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, bool>(3)?,
            row.get::<_, i64>(4)?,
            row.get::<_, String>(5)?,
            row.get::<_, Option<String>>(6)?,
        ))
    })?;

    rows.map(|row| -> Result<Subscriber, DbError> {
        let (id, handle, handle_type, verified, notifications, created_on, unsubscribed_on) = row?;
        Ok(Subscriber {
            id,
            handle,
            handle_type: handle_type
                .parse()
                .map_err(|_| conversion(format!("subscriber {id}: handle type {handle_type:?}")))?,
            verified,
            notifications,
            created_on: parse_required_timestamp(&created_on, "created_on")?,
            unsubscribed_on: unsubscribed_on.as_deref().and_then(parse_timestamp),
        })
    })
    .collect()
}

/// Records a delivered digest: stamps `last_notification` on each listed
/// subscription and increments the subscriber's delivery count, in one
/// transaction.
///
/// # Errors
///
/// Returns [`DbError`] if any statement fails; nothing is written in that
/// case.
pub fn mark_notified(
    conn: &mut Connection,
    subscriber_id: i64,
    subscription_ids: &[i64],
    now: DateTime<Utc>,
) -> Result<(), DbError> {
    let tx = conn.transaction()?;
    let stamp = format_timestamp(&now);

    {
        let mut stmt = tx.prepare(
            "UPDATE county_subscriptions SET last_notification = ?
             WHERE id = ? AND subscriber_id = ?",
        )?;
        for id in subscription_ids {
            stmt.execute(duckdb::params![stamp, id, subscriber_id])?;
        }
    }

    tx.execute(
        "UPDATE subscribers SET notifications = notifications + 1 WHERE id = ?",
        [subscriber_id],
    )?;

    tx.commit()?;
    Ok(())
}
