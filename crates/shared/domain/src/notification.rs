//! Pending cross-service notifications.
//!
//! A notification that could not be delivered synchronously is parked as a
//! [`PendingNotification`] and retried with exponential backoff until it is
//! delivered or runs out of attempts.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;
use crate::user::UserId;

/// Which lifecycle event a notification carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Registration,
    Dormancy,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Registration => "registration",
            NotificationKind::Dormancy => "dormancy",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NotificationKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "registration" => Ok(NotificationKind::Registration),
            "dormancy" => Ok(NotificationKind::Dormancy),
            other => Err(DomainError::validation(format!(
                "Unknown notification kind: {}",
                other
            ))),
        }
    }
}

/// Body of a dormancy notice: `{"id": ...}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DormancyNotice {
    pub id: UserId,
}

/// Notification waiting in the outbox.
///
/// At most one entry exists per `(user_id, kind)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingNotification {
    pub id: Uuid,
    pub user_id: UserId,
    pub kind: NotificationKind,
    /// JSON body exactly as it will be posted
    pub payload: String,
    /// Delivery attempts made by the relay so far
    pub attempts: u32,
    pub next_attempt_at: DateTime<Utc>,
    pub last_error: Option<String>,
    /// Set once the entry has exhausted its attempts
    pub failed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PendingNotification {
    /// New entry, due immediately.
    pub fn new(
        user_id: UserId,
        kind: NotificationKind,
        payload: String,
        last_error: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            kind,
            payload,
            attempts: 0,
            next_attempt_at: now,
            last_error,
            failed_at: None,
            created_at: now,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failed_at.is_some()
    }

    /// Whether the relay should try this entry at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.is_failed() && self.next_attempt_at <= now
    }

    /// Delay before the next attempt: `base * 2^(attempts - 1)`, capped at `max`.
    pub fn next_backoff(&self, base: Duration, max: Duration) -> Duration {
        let exponent = self.attempts.saturating_sub(1).min(31);
        let backoff = base.saturating_mul(2u32.saturating_pow(exponent));
        std::cmp::min(backoff, max)
    }

    /// Record a failed attempt and push `next_attempt_at` out by the backoff.
    pub fn schedule_retry(
        &mut self,
        error: impl Into<String>,
        now: DateTime<Utc>,
        base: Duration,
        max: Duration,
    ) {
        self.attempts = self.attempts.saturating_add(1);
        self.last_error = Some(error.into());
        let backoff = self.next_backoff(base, max);
        self.next_attempt_at = now + chrono::Duration::from_std(backoff).unwrap_or_default();
    }

    /// Record a final failed attempt; the entry is no longer due.
    pub fn mark_failed(&mut self, error: impl Into<String>, now: DateTime<Utc>) {
        self.attempts = self.attempts.saturating_add(1);
        self.last_error = Some(error.into());
        self.failed_at = Some(now);
    }

    /// Put a parked entry back in rotation with a fresh attempt budget.
    ///
    /// Identity and `created_at` are kept; the payload and error come from the
    /// notification that was just re-parked.
    pub fn rearm(&mut self, payload: String, last_error: Option<String>, now: DateTime<Utc>) {
        self.payload = payload;
        self.attempts = 0;
        self.next_attempt_at = now;
        self.last_error = last_error;
        self.failed_at = None;
    }
}
