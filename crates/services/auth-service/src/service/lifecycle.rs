//! User lifecycle: registration, dormancy transition and dormancy expiry.
//!
//! Every transition is committed locally first and then pushed to the Account
//! service. A push that fails leaves the local change in place, parks the
//! notification in the outbox and reports a propagation failure.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use common::{AppError, AppResult, NotifyError};
use domain::{
    expiry_cutoff, DormancyNotice, DormantUser, NotificationKind, Password, PendingNotification,
    Registration, User, UserDetail, UserId, MAX_USERNAME_LENGTH,
};

use crate::client::AccountNotifier;
use crate::clock::Clock;
use crate::repository::{DormantRepository, OutboxRepository, UserRepository};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// One dormant account the sweep could not delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurgeFailure {
    pub id: UserId,
    pub username: String,
    pub error: String,
}

/// Outcome of one expiry sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    /// Expired candidates found
    pub scanned: usize,
    pub purged: Vec<UserId>,
    pub failures: Vec<PurgeFailure>,
}

impl PurgeReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Lifecycle operations exposed to the HTTP layer and the sweeper.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait UserLifecycle: Send + Sync {
    /// Create an active user and announce it to the Account service
    async fn register(&self, registration: Registration) -> AppResult<User>;

    /// Move an active user into the dormant store
    async fn transition_to_dormant(&self, username: &str) -> AppResult<DormantUser>;

    /// Delete dormant accounts past the retention window
    async fn purge_expired(&self) -> AppResult<PurgeReport>;
}

/// Store-and-notify implementation of [`UserLifecycle`].
pub struct LifecycleManager {
    users: Arc<dyn UserRepository>,
    dormant: Arc<dyn DormantRepository>,
    outbox: Arc<dyn OutboxRepository>,
    notifier: Arc<dyn AccountNotifier>,
    clock: Arc<dyn Clock>,
    retention_days: i64,
}

impl LifecycleManager {
    pub fn new(
        users: Arc<dyn UserRepository>,
        dormant: Arc<dyn DormantRepository>,
        outbox: Arc<dyn OutboxRepository>,
        notifier: Arc<dyn AccountNotifier>,
        clock: Arc<dyn Clock>,
        retention_days: i64,
    ) -> Self {
        Self {
            users,
            dormant,
            outbox,
            notifier,
            clock,
            retention_days,
        }
    }

    async fn username_taken(&self, username: &str) -> AppResult<bool> {
        if self.users.exists_by_username(username).await? {
            return Ok(true);
        }
        self.dormant.exists_by_username(username).await
    }

    /// Hand a notification that could not be delivered over to the relay.
    ///
    /// The propagation failure is what the caller sees, so an outbox error is
    /// only logged.
    async fn park<T: Serialize + Sync>(
        &self,
        user_id: UserId,
        kind: NotificationKind,
        body: &T,
        cause: &NotifyError,
    ) {
        let payload = match serde_json::to_string(body) {
            Ok(payload) => payload,
            Err(e) => {
                error!(user_id, %kind, error = %e, "Failed to serialize pending notification");
                return;
            }
        };

        let pending = PendingNotification::new(
            user_id,
            kind,
            payload,
            Some(cause.to_string()),
            self.clock.now(),
        );

        match self.outbox.enqueue(pending).await {
            Ok(entry) => debug!(user_id, %kind, entry_id = %entry.id, "Notification parked in outbox"),
            Err(e) => error!(user_id, %kind, error = %e, "Failed to park notification in outbox"),
        }
    }
}

#[async_trait]
impl UserLifecycle for LifecycleManager {
    async fn register(&self, registration: Registration) -> AppResult<User> {
        let Registration {
            username,
            password,
            profile,
        } = registration;

        let length = username.chars().count();
        if length == 0 || length > MAX_USERNAME_LENGTH {
            return Err(AppError::validation(format!(
                "Username must be 1 to {} characters",
                MAX_USERNAME_LENGTH
            )));
        }

        if self.username_taken(&username).await? {
            return Err(AppError::duplicate_username(username));
        }

        let password_hash = Password::new(&password)?.into_string();
        let user = self.users.create(username, password_hash).await?;
        info!(user_id = user.id, username = %user.username, "User registered");

        let detail = UserDetail::new(user.id, profile);
        if let Err(cause) = self.notifier.notify_registration(&detail).await {
            warn!(user_id = user.id, error = %cause, "Registration was not propagated to the Account service");
            self.park(user.id, NotificationKind::Registration, &detail, &cause)
                .await;
            return Err(AppError::RegistrationPropagationFailed {
                user_id: user.id,
                source: cause,
            });
        }

        Ok(user)
    }

    async fn transition_to_dormant(&self, username: &str) -> AppResult<DormantUser> {
        let user = self
            .users
            .find_by_username(username)
            .await?
            .ok_or_else(|| AppError::user_not_found(username))?;

        // Dormant copy first: a crash past this point duplicates, never loses
        let dormant = self
            .dormant
            .save(&DormantUser::from_active(&user, self.clock.today()))
            .await?;

        if let Err(cause) = self.notifier.notify_dormancy(user.id).await {
            warn!(user_id = user.id, error = %cause, "Dormancy was not propagated to the Account service");
            self.park(
                user.id,
                NotificationKind::Dormancy,
                &DormancyNotice { id: user.id },
                &cause,
            )
            .await;
            return Err(AppError::DormancyPropagationFailed {
                user_id: user.id,
                source: cause,
            });
        }

        self.users.delete(user.id).await?;

        if let Err(e) = self.outbox.resolve(user.id, NotificationKind::Dormancy).await {
            warn!(user_id = user.id, error = %e, "Failed to clear pending dormancy notification");
        }

        info!(
            user_id = dormant.id,
            username = %dormant.username,
            dormant_date = %dormant.dormant_date,
            "User moved to dormancy"
        );
        Ok(dormant)
    }

    async fn purge_expired(&self) -> AppResult<PurgeReport> {
        let today = self.clock.today();
        let cutoff = expiry_cutoff(today, self.retention_days).ok_or_else(|| {
            AppError::internal(format!(
                "Retention window of {} days is out of range",
                self.retention_days
            ))
        })?;

        let expired = self.dormant.find_dormant_before(cutoff).await?;
        let mut report = PurgeReport {
            scanned: expired.len(),
            ..Default::default()
        };

        for account in expired {
            match self.dormant.delete(account.id).await {
                Ok(true) => {
                    info!(
                        user_id = account.id,
                        username = %account.username,
                        days_dormant = account.days_dormant(today),
                        "Dormant account purged"
                    );
                    report.purged.push(account.id);
                }
                Ok(false) => {
                    debug!(user_id = account.id, "Dormant account already gone");
                }
                Err(e) => {
                    warn!(user_id = account.id, username = %account.username, error = %e, "Failed to purge dormant account");
                    report.failures.push(PurgeFailure {
                        id: account.id,
                        username: account.username,
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }
}
