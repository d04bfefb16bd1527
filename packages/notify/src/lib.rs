#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Case digest dispatch.
//!
//! [`dispatch`] finds the county subscriptions that are due, groups them
//! into one digest per subscriber, hands each digest to a
//! [`DigestSender`], and records delivery only after the sender succeeds.

pub mod digest;
pub mod schedule;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use covid_track_database::{DbError, county_db, subscriber_db};
use covid_track_database_models::{CountySubscription, Subscriber};
use duckdb::Connection;
use serde::Serialize;

pub use digest::DigestEntry;

/// Errors that can occur while dispatching digests.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// A database operation failed.
    #[error(transparent)]
    Db(#[from] DbError),

    /// A sender could not deliver a digest.
    #[error("failed to deliver digest to subscriber {subscriber_id}: {message}")]
    Send {
        /// Recipient of the digest.
        subscriber_id: i64,
        /// Description of what went wrong.
        message: String,
    },
}

/// Delivers a digest over some channel.
#[async_trait::async_trait]
pub trait DigestSender: Send + Sync {
    /// Sends `entries` to `subscriber`.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Send`] if the digest was not delivered.
    async fn send(
        &self,
        subscriber: &Subscriber,
        entries: &[DigestEntry],
    ) -> Result<(), NotifyError>;
}

/// Writes each digest to the log instead of delivering it.
pub struct LogDigestSender;

#[async_trait::async_trait]
impl DigestSender for LogDigestSender {
    async fn send(
        &self,
        subscriber: &Subscriber,
        entries: &[DigestEntry],
    ) -> Result<(), NotifyError> {
        let body = entries
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n\n");
        log::info!(
            "Digest for {} {} ({} counties):\n{body}",
            subscriber.handle_type,
            subscriber.handle,
            entries.len()
        );
        Ok(())
    }
}

/// Outcome of one dispatch pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyReport {
    /// Subscriptions that were due.
    pub due_subscriptions: u64,
    /// Digests delivered and recorded.
    pub sent: u64,
    /// Subscribers whose digest failed to send or record.
    pub failed: Vec<i64>,
    /// Subscribers skipped because they opted out or none of their
    /// counties are stored.
    pub skipped: Vec<i64>,
}

/// Sends every due digest through `sender`.
///
/// For each subscriber with due subscriptions, one digest covering all of
/// their due counties is sent. After a successful send the subscriptions
/// are stamped with `now` and the subscriber's delivery count goes up by
/// one, in a single transaction. A failed send leaves both untouched so the
/// digest is due again on the next pass.
///
/// # Errors
///
/// Returns [`NotifyError::Db`] if the due subscriptions, subscribers, or
/// counties cannot be read. Per-subscriber failures are reported in
/// [`NotifyReport::failed`] instead.
pub async fn dispatch(
    conn: &mut Connection,
    sender: &dyn DigestSender,
    now: DateTime<Utc>,
) -> Result<NotifyReport, NotifyError> {
    let due: Vec<CountySubscription> = subscriber_db::find_active_subscriptions(conn)?
        .into_iter()
        .filter(|s| schedule::is_due(s.frequency, s.last_notification, now))
        .collect();

    let mut report = NotifyReport {
        due_subscriptions: due.len() as u64,
        ..NotifyReport::default()
    };
    if due.is_empty() {
        log::info!("No subscriptions due");
        return Ok(report);
    }

    let mut by_subscriber: BTreeMap<i64, Vec<CountySubscription>> = BTreeMap::new();
    for subscription in due {
        by_subscriber
            .entry(subscription.subscriber_id)
            .or_default()
            .push(subscription);
    }

    let subscriber_ids: Vec<i64> = by_subscriber.keys().copied().collect();
    let subscribers: BTreeMap<i64, Subscriber> =
        subscriber_db::find_subscribers_by_ids(conn, &subscriber_ids)?
            .into_iter()
            .map(|s| (s.id, s))
            .collect();

    let mut county_ids: Vec<i64> = by_subscriber
        .values()
        .flatten()
        .map(|s| s.county_id)
        .collect();
    county_ids.sort_unstable();
    county_ids.dedup();
    let counties: BTreeMap<i64, DigestEntry> = county_db::find_counties_by_ids(conn, &county_ids)?
        .iter()
        .map(|c| (c.id, DigestEntry::from(c)))
        .collect();

    log::info!(
        "{} subscriptions due across {} subscribers",
        report.due_subscriptions,
        by_subscriber.len()
    );

    for (subscriber_id, subscriptions) in by_subscriber {
        let Some(subscriber) = subscribers.get(&subscriber_id).filter(|s| s.is_active()) else {
            log::debug!("Subscriber {subscriber_id} is not active, skipping");
            report.skipped.push(subscriber_id);
            continue;
        };

        let entries: Vec<DigestEntry> = subscriptions
            .iter()
            .filter_map(|s| counties.get(&s.county_id).cloned())
            .collect();
        if entries.is_empty() {
            log::warn!("Subscriber {subscriber_id} follows no stored counties, skipping");
            report.skipped.push(subscriber_id);
            continue;
        }

        if let Err(e) = sender.send(subscriber, &entries).await {
            log::error!("{e}");
            report.failed.push(subscriber_id);
            continue;
        }

        let subscription_ids: Vec<i64> = subscriptions.iter().map(|s| s.id).collect();
        match subscriber_db::mark_notified(conn, subscriber_id, &subscription_ids, now) {
            Ok(()) => report.sent += 1,
            Err(e) => {
                log::error!("Sent digest to subscriber {subscriber_id} but failed to record it: {e}");
                report.failed.push(subscriber_id);
            }
        }
    }

    log::info!(
        "Dispatch complete: {} sent, {} failed, {} skipped",
        report.sent,
        report.failed.len(),
        report.skipped.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::TimeZone;
    use covid_track_case_models::{ActiveCaseSnapshot, SnapshotPair};
    use covid_track_database::open_in_memory;
    use covid_track_database_models::{Frequency, HandleType, NewCounty};
    use covid_track_geography_models::CountyFips;

    use super::*;

    /// Records every digest and fails for one handle.
    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<(String, Vec<String>)>>,
        failing_handle: Option<String>,
    }

    #[async_trait::async_trait]
    impl DigestSender for RecordingSender {
        async fn send(
            &self,
            subscriber: &Subscriber,
            entries: &[DigestEntry],
        ) -> Result<(), NotifyError> {
            if self.failing_handle.as_deref() == Some(subscriber.handle.as_str()) {
                return Err(NotifyError::Send {
                    subscriber_id: subscriber.id,
                    message: "carrier rejected message".to_string(),
                });
            }
            self.sent.lock().unwrap().push((
                subscriber.handle.clone(),
                entries.iter().map(|e| e.name.clone()).collect(),
            ));
            Ok(())
        }
    }

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 11, day, 12, 0, 0).unwrap()
    }

    fn seed_county(conn: &Connection, code: &str, name: &str) -> i64 {
        let fips = CountyFips::new(code).unwrap();
        county_db::upsert_county(
            conn,
            &NewCounty {
                fips: fips.clone(),
                name: name.to_string(),
                state: "Massachusetts".to_string(),
                population: 10_000,
            },
        )
        .unwrap();

        let mut county = county_db::find_county(conn, &fips).unwrap().unwrap();
        let snapshot = ActiveCaseSnapshot {
            active_estimate: 5.0,
            confirmed_total: 100,
        };
        county.apply_snapshots(
            &SnapshotPair {
                current: snapshot,
                prior_week: snapshot,
            },
            at(1),
        );
        county_db::update_county(conn, &county).unwrap();
        county.id
    }

    fn subscriber(conn: &Connection, handle: &str) -> i64 {
        subscriber_db::insert_subscriber(conn, handle, HandleType::Email, true, at(1)).unwrap()
    }

    fn notifications(conn: &Connection, id: i64) -> i64 {
        subscriber_db::find_subscribers_by_ids(conn, &[id]).unwrap()[0].notifications
    }

    #[tokio::test]
    async fn groups_due_counties_into_one_digest() {
        let mut conn = open_in_memory().unwrap();
        let nantucket = seed_county(&conn, "25019", "Nantucket County");
        let dukes = seed_county(&conn, "25007", "Dukes County");
        let alice = subscriber(&conn, "alice@example.com");
        subscriber_db::subscribe(&conn, alice, nantucket, Frequency::Daily).unwrap();
        subscriber_db::subscribe(&conn, alice, dukes, Frequency::Weekly).unwrap();

        let sender = RecordingSender::default();
        let report = dispatch(&mut conn, &sender, at(10)).await.unwrap();

        assert_eq!(report.due_subscriptions, 2);
        assert_eq!(report.sent, 1);
        let sent = sender.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "alice@example.com");
        assert_eq!(sent[0].1, vec!["Nantucket", "Dukes"]);
        assert_eq!(notifications(&conn, alice), 1);

        let again = dispatch(&mut conn, &sender, at(11)).await.unwrap();
        assert_eq!(again.due_subscriptions, 1);
        assert_eq!(sender.sent.lock().unwrap()[1].1, vec!["Nantucket"]);
        assert_eq!(notifications(&conn, alice), 2);
    }

    #[tokio::test]
    async fn failed_send_is_not_recorded() {
        let mut conn = open_in_memory().unwrap();
        let county = seed_county(&conn, "25019", "Nantucket County");
        let alice = subscriber(&conn, "alice@example.com");
        let bob = subscriber(&conn, "bob@example.com");
        subscriber_db::subscribe(&conn, alice, county, Frequency::Daily).unwrap();
        subscriber_db::subscribe(&conn, bob, county, Frequency::Daily).unwrap();

        let sender = RecordingSender {
            failing_handle: Some("bob@example.com".to_string()),
            ..RecordingSender::default()
        };
        let report = dispatch(&mut conn, &sender, at(10)).await.unwrap();

        assert_eq!(report.sent, 1);
        assert_eq!(report.failed, vec![bob]);
        assert_eq!(notifications(&conn, bob), 0);

        let due = subscriber_db::find_active_subscriptions(&conn).unwrap();
        let bobs = due.iter().find(|s| s.subscriber_id == bob).unwrap();
        assert_eq!(bobs.last_notification, None);
    }

    #[tokio::test]
    async fn nothing_due_sends_nothing() {
        let mut conn = open_in_memory().unwrap();
        let county = seed_county(&conn, "25019", "Nantucket County");
        let alice = subscriber(&conn, "alice@example.com");
        let id = subscriber_db::subscribe(&conn, alice, county, Frequency::Monthly).unwrap();
        subscriber_db::mark_notified(&mut conn, alice, &[id], at(2)).unwrap();

        let sender = RecordingSender::default();
        let report = dispatch(&mut conn, &sender, at(20)).await.unwrap();

        assert_eq!(report, NotifyReport::default());
        assert!(sender.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unsubscribed_are_not_notified() {
        let mut conn = open_in_memory().unwrap();
        let county = seed_county(&conn, "25019", "Nantucket County");
        let alice = subscriber(&conn, "alice@example.com");
        subscriber_db::subscribe(&conn, alice, county, Frequency::Daily).unwrap();
        subscriber_db::unsubscribe(&conn, alice, at(3)).unwrap();

        let sender = RecordingSender::default();
        let report = dispatch(&mut conn, &sender, at(10)).await.unwrap();

        assert_eq!(report.due_subscriptions, 0);
        assert!(sender.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn log_sender_always_succeeds() {
        let mut conn = open_in_memory().unwrap();
        let county = seed_county(&conn, "25019", "Nantucket County");
        let alice = subscriber(&conn, "alice@example.com");
        subscriber_db::subscribe(&conn, alice, county, Frequency::Daily).unwrap();

        let report = dispatch(&mut conn, &LogDigestSender, at(10)).await.unwrap();
        assert_eq!(report.sent, 1);
    }
}
