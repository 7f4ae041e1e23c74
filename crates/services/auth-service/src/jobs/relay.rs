//! Outbox relay: re-delivers notifications the request path could not.
//!
//! Each due entry gets one attempt per pass. Success removes it; failure
//! pushes it out by an exponential backoff until the attempt budget runs out,
//! at which point the entry is parked and left for an operator.
//!
//! A registration is only announced while the user is still active. Once the
//! user has gone dormant the Account service has already been told the later
//! state, so the stale registration is dropped instead of replayed.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use common::{AppError, AppResult, RetryConfig};
use domain::{DormancyNotice, NotificationKind, PendingNotification, UserDetail};

use crate::client::AccountNotifier;
use crate::clock::Clock;
use crate::repository::{DormantRepository, OutboxRepository, UserRepository};

/// Outcome of one relay pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RelayReport {
    pub delivered: usize,
    /// Registrations discarded because the user is no longer active
    pub dropped: usize,
    pub rescheduled: usize,
    pub parked: usize,
}

enum Delivery {
    Sent,
    Superseded,
}

/// Drains the notification outbox.
pub struct OutboxRelay {
    outbox: Arc<dyn OutboxRepository>,
    notifier: Arc<dyn AccountNotifier>,
    users: Arc<dyn UserRepository>,
    dormant: Arc<dyn DormantRepository>,
    clock: Arc<dyn Clock>,
    retry: RetryConfig,
    batch_size: u64,
    interval: Duration,
}

impl OutboxRelay {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        outbox: Arc<dyn OutboxRepository>,
        notifier: Arc<dyn AccountNotifier>,
        users: Arc<dyn UserRepository>,
        dormant: Arc<dyn DormantRepository>,
        clock: Arc<dyn Clock>,
        retry: RetryConfig,
        batch_size: u64,
        interval: Duration,
    ) -> Self {
        Self {
            outbox,
            notifier,
            users,
            dormant,
            clock,
            retry,
            batch_size,
            interval,
        }
    }

    /// Attempt every entry due now, up to the batch size.
    pub async fn run_once(&self) -> AppResult<RelayReport> {
        let due = self.outbox.due(self.clock.now(), self.batch_size).await?;
        let mut report = RelayReport::default();

        for mut entry in due {
            match self.attempt(&entry).await {
                Ok(delivery) => {
                    if let Err(e) = self.outbox.remove(entry.id).await {
                        error!(entry_id = %entry.id, error = %e, "Failed to remove settled outbox entry");
                    }
                    match delivery {
                        Delivery::Sent => {
                            info!(
                                user_id = entry.user_id,
                                kind = %entry.kind,
                                attempts = entry.attempts + 1,
                                "Pending notification delivered"
                            );
                            report.delivered += 1;
                        }
                        Delivery::Superseded => {
                            warn!(
                                user_id = entry.user_id,
                                kind = %entry.kind,
                                "Dropped registration for a user that is no longer active"
                            );
                            report.dropped += 1;
                        }
                    }
                }
                Err(cause) => {
                    let now = self.clock.now();
                    let parked = entry.attempts.saturating_add(1) >= self.retry.max_attempts;
                    if parked {
                        entry.mark_failed(cause.to_string(), now);
                        error!(
                            user_id = entry.user_id,
                            kind = %entry.kind,
                            attempts = entry.attempts,
                            error = %cause,
                            "Pending notification parked after exhausting retries"
                        );
                        report.parked += 1;
                    } else {
                        entry.schedule_retry(
                            cause.to_string(),
                            now,
                            self.retry.base_delay(),
                            self.retry.max_delay(),
                        );
                        warn!(
                            user_id = entry.user_id,
                            kind = %entry.kind,
                            attempts = entry.attempts,
                            next_attempt_at = %entry.next_attempt_at,
                            error = %cause,
                            "Pending notification rescheduled"
                        );
                        report.rescheduled += 1;
                    }

                    if let Err(e) = self.outbox.update(&entry).await {
                        error!(entry_id = %entry.id, error = %e, "Failed to record outbox attempt");
                    }
                }
            }
        }

        if report != RelayReport::default() {
            info!(
                delivered = report.delivered,
                dropped = report.dropped,
                rescheduled = report.rescheduled,
                parked = report.parked,
                "Outbox relay pass finished"
            );
        }

        Ok(report)
    }

    /// Deliver one entry and, for a dormancy notice, finish the local
    /// transition the request path left half done.
    async fn attempt(&self, entry: &PendingNotification) -> AppResult<Delivery> {
        match entry.kind {
            NotificationKind::Registration => {
                let detail: UserDetail = decode(entry)?;
                if self.users.find_by_id(detail.id).await?.is_none() {
                    return Ok(Delivery::Superseded);
                }
                self.notifier.notify_registration(&detail).await?;
            }
            NotificationKind::Dormancy => {
                let notice: DormancyNotice = decode(entry)?;
                self.notifier.notify_dormancy(notice.id).await?;
                self.finish_dormancy(notice).await?;
            }
        }
        Ok(Delivery::Sent)
    }

    async fn finish_dormancy(&self, notice: DormancyNotice) -> AppResult<()> {
        if self.dormant.find_by_id(notice.id).await?.is_none() {
            debug!(user_id = notice.id, "No dormant copy, leaving active record alone");
            return Ok(());
        }
        if self.users.delete(notice.id).await? {
            info!(user_id = notice.id, "User moved to dormancy by outbox relay");
        }
        Ok(())
    }

    /// Drain the outbox every interval until `shutdown` turns `true`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = self.interval.as_secs(), "Outbox relay started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        error!(error = %e, "Outbox relay pass failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Outbox relay stopped");
    }

    /// Spawn [`run`](Self::run) onto the runtime.
    pub fn start(self, shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

fn decode<T: serde::de::DeserializeOwned>(entry: &PendingNotification) -> AppResult<T> {
    serde_json::from_str(&entry.payload).map_err(|e| {
        AppError::internal(format!(
            "Undecodable {} payload in outbox entry {}: {}",
            entry.kind, entry.id, e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockAccountNotifier;
    use crate::repository::{MockDormantRepository, MockOutboxRepository, MockUserRepository};
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use common::NotifyError;
    use domain::DormantUser;

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
    }

    fn retry() -> RetryConfig {
        RetryConfig {
            base_delay_ms: 1000,
            max_delay_ms: 60_000,
            max_attempts: 3,
        }
    }

    fn dormancy_entry(user_id: i64, attempts: u32) -> PendingNotification {
        let mut entry = PendingNotification::new(
            user_id,
            NotificationKind::Dormancy,
            format!(r#"{{"id":{}}}"#, user_id),
            Some("No instances of AccountServer available".to_string()),
            now(),
        );
        entry.attempts = attempts;
        entry
    }

    fn relay(
        outbox: MockOutboxRepository,
        notifier: MockAccountNotifier,
        users: MockUserRepository,
        dormant: MockDormantRepository,
    ) -> OutboxRelay {
        OutboxRelay::new(
            Arc::new(outbox),
            Arc::new(notifier),
            Arc::new(users),
            Arc::new(dormant),
            Arc::new(FixedClock(now())),
            retry(),
            50,
            Duration::from_secs(30),
        )
    }

    #[tokio::test]
    async fn test_delivered_dormancy_finishes_transition() {
        let entry = dormancy_entry(8, 0);
        let entry_id = entry.id;

        let mut outbox = MockOutboxRepository::new();
        outbox
            .expect_due()
            .withf(|at, limit| *at == now() && *limit == 50)
            .returning(move |_, _| Ok(vec![entry.clone()]));
        outbox
            .expect_remove()
            .withf(move |id| *id == entry_id)
            .times(1)
            .returning(|_| Ok(()));

        let mut notifier = MockAccountNotifier::new();
        notifier
            .expect_notify_dormancy()
            .withf(|id| *id == 8)
            .times(1)
            .returning(|_| Ok(()));

        let mut dormant = MockDormantRepository::new();
        dormant.expect_find_by_id().returning(|id| {
            Ok(Some(DormantUser {
                id,
                username: "collector".to_string(),
                password_hash: "hash".to_string(),
                dormant_date: NaiveDate::from_ymd_opt(2024, 5, 30).unwrap(),
            }))
        });

        let mut users = MockUserRepository::new();
        users
            .expect_delete()
            .withf(|id| *id == 8)
            .times(1)
            .returning(|_| Ok(true));

        let report = relay(outbox, notifier, users, dormant)
            .run_once()
            .await
            .unwrap();

        assert_eq!(
            report,
            RelayReport {
                delivered: 1,
                dropped: 0,
                rescheduled: 0,
                parked: 0
            }
        );
    }

    #[tokio::test]
    async fn test_failed_delivery_reschedules_with_backoff() {
        let entry = dormancy_entry(8, 1);

        let mut outbox = MockOutboxRepository::new();
        outbox
            .expect_due()
            .returning(move |_, _| Ok(vec![entry.clone()]));
        outbox
            .expect_update()
            .withf(|updated| {
                updated.attempts == 2
                    && updated.failed_at.is_none()
                    && updated.next_attempt_at == now() + chrono::Duration::seconds(2)
                    && updated
                        .last_error
                        .as_deref()
                        .is_some_and(|e| e.contains("503"))
            })
            .times(1)
            .returning(|_| Ok(()));
        outbox.expect_remove().times(0);

        let mut notifier = MockAccountNotifier::new();
        notifier
            .expect_notify_dormancy()
            .returning(|_| Err(NotifyError::RemoteRejected(503)));

        let mut users = MockUserRepository::new();
        users.expect_delete().times(0);

        let report = relay(outbox, notifier, users, MockDormantRepository::new())
            .run_once()
            .await
            .unwrap();

        assert_eq!(report.rescheduled, 1);
    }

    #[tokio::test]
    async fn test_last_attempt_parks_entry() {
        let entry = dormancy_entry(8, 2);

        let mut outbox = MockOutboxRepository::new();
        outbox
            .expect_due()
            .returning(move |_, _| Ok(vec![entry.clone()]));
        outbox
            .expect_update()
            .withf(|updated| updated.attempts == 3 && updated.failed_at == Some(now()))
            .times(1)
            .returning(|_| Ok(()));

        let mut notifier = MockAccountNotifier::new();
        notifier
            .expect_notify_dormancy()
            .returning(|_| Err(NotifyError::transport("connection refused")));

        let report = relay(
            outbox,
            notifier,
            MockUserRepository::new(),
            MockDormantRepository::new(),
        )
        .run_once()
        .await
        .unwrap();

        assert_eq!(report.parked, 1);
        assert_eq!(report.rescheduled, 0);
    }

    fn registration_entry(user_id: i64) -> PendingNotification {
        let detail = UserDetail {
            id: user_id,
            name: "Kim Minsu".to_string(),
            postal_code: "04524".to_string(),
            road_name_address: "110 Sejong-daero".to_string(),
            detailed_address: "Apt 301".to_string(),
            email: "minsu@example.com".to_string(),
            phone_number: "010-1234-5678".to_string(),
        };
        PendingNotification::new(
            user_id,
            NotificationKind::Registration,
            serde_json::to_string(&detail).unwrap(),
            Some("Remote service rejected the request with status 502".to_string()),
            now(),
        )
    }

    #[tokio::test]
    async fn test_registration_for_departed_user_is_dropped_unsent() {
        let entry = registration_entry(8);
        let entry_id = entry.id;

        let mut outbox = MockOutboxRepository::new();
        outbox
            .expect_due()
            .returning(move |_, _| Ok(vec![entry.clone()]));
        outbox
            .expect_remove()
            .withf(move |id| *id == entry_id)
            .times(1)
            .returning(|_| Ok(()));
        outbox.expect_update().times(0);

        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .withf(|id| *id == 8)
            .times(1)
            .returning(|_| Ok(None));

        let mut notifier = MockAccountNotifier::new();
        notifier.expect_notify_registration().times(0);

        let report = relay(outbox, notifier, users, MockDormantRepository::new())
            .run_once()
            .await
            .unwrap();

        assert_eq!(report.dropped, 1);
        assert_eq!(report.delivered, 0);
    }

    #[tokio::test]
    async fn test_registration_for_active_user_is_delivered() {
        let entry = registration_entry(8);

        let mut outbox = MockOutboxRepository::new();
        outbox
            .expect_due()
            .returning(move |_, _| Ok(vec![entry.clone()]));
        outbox.expect_remove().times(1).returning(|_| Ok(()));

        let mut users = MockUserRepository::new();
        users.expect_find_by_id().returning(|id| {
            Ok(Some(domain::User {
                id,
                username: "collector".to_string(),
                password_hash: "hash".to_string(),
                created_at: Utc::now(),
            }))
        });

        let mut notifier = MockAccountNotifier::new();
        notifier
            .expect_notify_registration()
            .withf(|detail| detail.id == 8 && detail.postal_code == "04524")
            .times(1)
            .returning(|_| Ok(()));

        let report = relay(outbox, notifier, users, MockDormantRepository::new())
            .run_once()
            .await
            .unwrap();

        assert_eq!(report.delivered, 1);
        assert_eq!(report.dropped, 0);
    }

    #[tokio::test]
    async fn test_undecodable_payload_counts_as_failed_attempt() {
        let mut entry = dormancy_entry(8, 0);
        entry.kind = NotificationKind::Registration;

        let mut outbox = MockOutboxRepository::new();
        outbox
            .expect_due()
            .returning(move |_, _| Ok(vec![entry.clone()]));
        outbox.expect_update().times(1).returning(|_| Ok(()));

        let mut notifier = MockAccountNotifier::new();
        notifier.expect_notify_registration().times(0);

        let report = relay(
            outbox,
            notifier,
            MockUserRepository::new(),
            MockDormantRepository::new(),
        )
        .run_once()
        .await
        .unwrap();

        assert_eq!(report.rescheduled, 1);
    }
}
