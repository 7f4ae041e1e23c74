//! Shared fixtures for auth-service integration tests.
//!
//! In-memory stand-ins for the stores, a settable clock and a notifier that
//! records every call, so lifecycle properties can be checked end to end
//! without a database or a live Account service.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use auth_service_lib::client::AccountNotifier;
use auth_service_lib::clock::Clock;
use auth_service_lib::repository::{DormantRepository, OutboxRepository, UserRepository};
use auth_service_lib::service::LifecycleManager;
use common::{AppError, AppResult, NotifyError};
use domain::{
    DormantUser, NotificationKind, PendingNotification, Profile, Registration, User, UserDetail,
    UserId,
};

// =============================================================================
// Stores
// =============================================================================

#[derive(Default)]
pub struct InMemoryUsers {
    rows: Mutex<BTreeMap<UserId, User>>,
    next_id: AtomicI64,
}

impl InMemoryUsers {
    pub fn insert(&self, id: UserId, username: &str) -> User {
        let user = User {
            id,
            username: username.to_string(),
            password_hash: format!("$argon2id$v=19$hash-of-{}", username),
            created_at: Utc::now(),
        };
        self.rows.lock().unwrap().insert(id, user.clone());
        self.next_id.fetch_max(id, Ordering::SeqCst);
        user
    }

    pub fn all(&self) -> Vec<User> {
        self.rows.lock().unwrap().values().cloned().collect()
    }

    pub fn get(&self, username: &str) -> Option<User> {
        self.rows
            .lock()
            .unwrap()
            .values()
            .find(|u| u.username == username)
            .cloned()
    }
}

#[async_trait]
impl UserRepository for InMemoryUsers {
    async fn exists_by_username(&self, username: &str) -> AppResult<bool> {
        Ok(self.get(username).is_some())
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        Ok(self.get(username))
    }

    async fn find_by_id(&self, id: UserId) -> AppResult<Option<User>> {
        Ok(self.rows.lock().unwrap().get(&id).cloned())
    }

    async fn create(&self, username: String, password_hash: String) -> AppResult<User> {
        let mut rows = self.rows.lock().unwrap();
        // Mirrors the unique index on users.username
        if rows.values().any(|u| u.username == username) {
            return Err(AppError::duplicate_username(username));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let user = User {
            id,
            username,
            password_hash,
            created_at: Utc::now(),
        };
        rows.insert(id, user.clone());
        Ok(user)
    }

    async fn delete(&self, id: UserId) -> AppResult<bool> {
        Ok(self.rows.lock().unwrap().remove(&id).is_some())
    }
}

#[derive(Default)]
pub struct InMemoryDormant {
    rows: Mutex<BTreeMap<UserId, DormantUser>>,
    /// Ids whose delete fails, to exercise sweep isolation
    poisoned: Mutex<Vec<UserId>>,
}

impl InMemoryDormant {
    pub fn insert(&self, id: UserId, username: &str, dormant_date: NaiveDate) {
        self.rows.lock().unwrap().insert(
            id,
            DormantUser {
                id,
                username: username.to_string(),
                password_hash: format!("$argon2id$v=19$hash-of-{}", username),
                dormant_date,
            },
        );
    }

    pub fn poison(&self, id: UserId) {
        self.poisoned.lock().unwrap().push(id);
    }

    pub fn ids(&self) -> Vec<UserId> {
        self.rows.lock().unwrap().keys().copied().collect()
    }

    pub fn get(&self, id: UserId) -> Option<DormantUser> {
        self.rows.lock().unwrap().get(&id).cloned()
    }
}

#[async_trait]
impl DormantRepository for InMemoryDormant {
    async fn exists_by_username(&self, username: &str) -> AppResult<bool> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .any(|d| d.username == username))
    }

    async fn find_by_id(&self, id: UserId) -> AppResult<Option<DormantUser>> {
        Ok(self.get(id))
    }

    async fn save(&self, dormant: &DormantUser) -> AppResult<DormantUser> {
        let mut rows = self.rows.lock().unwrap();
        Ok(rows
            .entry(dormant.id)
            .or_insert_with(|| dormant.clone())
            .clone())
    }

    async fn find_dormant_before(&self, cutoff: NaiveDate) -> AppResult<Vec<DormantUser>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|d| d.dormant_date < cutoff)
            .cloned()
            .collect())
    }

    async fn delete(&self, id: UserId) -> AppResult<bool> {
        if self.poisoned.lock().unwrap().contains(&id) {
            return Err(AppError::internal(format!("row {} is locked", id)));
        }
        Ok(self.rows.lock().unwrap().remove(&id).is_some())
    }
}

#[derive(Default)]
pub struct InMemoryOutbox {
    entries: Mutex<Vec<PendingNotification>>,
}

impl InMemoryOutbox {
    pub fn all(&self) -> Vec<PendingNotification> {
        self.entries.lock().unwrap().clone()
    }

    pub fn find(&self, user_id: UserId, kind: NotificationKind) -> Option<PendingNotification> {
        self.all()
            .into_iter()
            .find(|e| e.user_id == user_id && e.kind == kind)
    }
}

#[async_trait]
impl OutboxRepository for InMemoryOutbox {
    async fn enqueue(&self, pending: PendingNotification) -> AppResult<PendingNotification> {
        let mut entries = self.entries.lock().unwrap();
        if let Some(existing) = entries
            .iter_mut()
            .find(|e| e.user_id == pending.user_id && e.kind == pending.kind)
        {
            if existing.is_failed() {
                existing.rearm(pending.payload, pending.last_error, pending.next_attempt_at);
            }
            return Ok(existing.clone());
        }
        entries.push(pending.clone());
        Ok(pending)
    }

    async fn resolve(&self, user_id: UserId, kind: NotificationKind) -> AppResult<bool> {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|e| !(e.user_id == user_id && e.kind == kind));
        Ok(entries.len() != before)
    }

    async fn due(&self, now: DateTime<Utc>, limit: u64) -> AppResult<Vec<PendingNotification>> {
        let mut due: Vec<PendingNotification> = self
            .all()
            .into_iter()
            .filter(|e| e.is_due(now))
            .collect();
        due.sort_by_key(|e| e.next_attempt_at);
        due.truncate(limit as usize);
        Ok(due)
    }

    async fn update(&self, pending: &PendingNotification) -> AppResult<()> {
        let mut entries = self.entries.lock().unwrap();
        match entries.iter_mut().find(|e| e.id == pending.id) {
            Some(entry) => {
                *entry = pending.clone();
                Ok(())
            }
            None => Err(AppError::internal("missing outbox entry")),
        }
    }

    async fn remove(&self, id: Uuid) -> AppResult<()> {
        self.entries.lock().unwrap().retain(|e| e.id != id);
        Ok(())
    }
}

// =============================================================================
// Clock and notifier
// =============================================================================

pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn at(y: i32, m: u32, d: u32) -> Self {
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Registration(UserDetail),
    Dormancy(UserId),
}

/// Records every attempted call; fails with `failure` while it is set.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Sent>>,
    failure: Mutex<Option<NotifyError>>,
}

impl RecordingNotifier {
    pub fn fail_with(&self, error: NotifyError) {
        *self.failure.lock().unwrap() = Some(error);
    }

    pub fn recover(&self) {
        *self.failure.lock().unwrap() = None;
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    fn outcome(&self, call: Sent) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(call);
        match self.failure.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl AccountNotifier for RecordingNotifier {
    async fn notify_registration(&self, detail: &UserDetail) -> Result<(), NotifyError> {
        self.outcome(Sent::Registration(detail.clone()))
    }

    async fn notify_dormancy(&self, id: UserId) -> Result<(), NotifyError> {
        self.outcome(Sent::Dormancy(id))
    }
}

// =============================================================================
// Harness
// =============================================================================

pub struct Harness {
    pub users: Arc<InMemoryUsers>,
    pub dormant: Arc<InMemoryDormant>,
    pub outbox: Arc<InMemoryOutbox>,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    /// Fresh stores with the clock at 2024-06-01.
    pub fn new() -> Self {
        Self {
            users: Arc::new(InMemoryUsers::default()),
            dormant: Arc::new(InMemoryDormant::default()),
            outbox: Arc::new(InMemoryOutbox::default()),
            notifier: Arc::new(RecordingNotifier::default()),
            clock: Arc::new(ManualClock::at(2024, 6, 1)),
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn manager(&self) -> LifecycleManager {
        self.manager_with(self.notifier.clone())
    }

    pub fn manager_with(&self, notifier: Arc<dyn AccountNotifier>) -> LifecycleManager {
        LifecycleManager::new(
            self.users.clone(),
            self.dormant.clone(),
            self.outbox.clone(),
            notifier,
            self.clock.clone(),
            90,
        )
    }
}

pub fn registration(username: &str) -> Registration {
    Registration {
        username: username.to_string(),
        password: "separate-the-plastics".to_string(),
        profile: Profile {
            name: "Lee Jiwoo".to_string(),
            postal_code: "06236".to_string(),
            road_name_address: "152 Teheran-ro".to_string(),
            detailed_address: "5F".to_string(),
            email: format!("{}@example.com", username),
            phone_number: "010-9876-5432".to_string(),
        },
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}
