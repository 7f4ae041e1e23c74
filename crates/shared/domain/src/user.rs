//! User lifecycle entities and the cross-service account payload.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Opaque numeric identity assigned when the active record is created.
pub type UserId = i64;

/// Active user, owned by the Auth service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Account set aside after prolonged inactivity, pending purge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DormantUser {
    /// Same identity as the originating active user
    pub id: UserId,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Day the account entered dormancy; never changes afterwards
    pub dormant_date: NaiveDate,
}

impl DormantUser {
    /// Build the dormant copy of an active user, stamped with `today`.
    ///
    /// The credential hash is carried over as-is.
    pub fn from_active(user: &User, today: NaiveDate) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            password_hash: user.password_hash.clone(),
            dormant_date: today,
        }
    }

    /// Whole days spent in dormancy as of `today`.
    pub fn days_dormant(&self, today: NaiveDate) -> i64 {
        (today - self.dormant_date).num_days()
    }

}

/// Oldest dormancy date still kept on `today`.
///
/// Accounts dormant strictly before the cutoff have been dormant longer than
/// `retention_days` and are expired. `None` when the window does not fit the
/// calendar.
pub fn expiry_cutoff(today: NaiveDate, retention_days: i64) -> Option<NaiveDate> {
    let window = chrono::Duration::try_days(retention_days)?;
    today.checked_sub_signed(window)
}

/// Profile fields collected at registration and forwarded to the Account
/// service. Auth never stores them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub name: String,
    pub postal_code: String,
    pub road_name_address: String,
    pub detailed_address: String,
    pub email: String,
    pub phone_number: String,
}

/// Registration request after transport-level validation.
#[derive(Clone)]
pub struct Registration {
    pub username: String,
    /// Plain text; hashed once by the lifecycle manager
    pub password: String,
    pub profile: Profile,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("profile", &self.profile)
            .finish()
    }
}

/// Account details pushed to the Account service on registration.
///
/// Serializes to `{id, name, postalCode, roadNameAddress, detailedAddress,
/// email, phoneNumber}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetail {
    pub id: UserId,
    pub name: String,
    pub postal_code: String,
    pub road_name_address: String,
    pub detailed_address: String,
    pub email: String,
    pub phone_number: String,
}

impl UserDetail {
    /// Attach the freshly assigned identity to a registration profile.
    pub fn new(id: UserId, profile: Profile) -> Self {
        Self {
            id,
            name: profile.name,
            postal_code: profile.postal_code,
            road_name_address: profile.road_name_address,
            detailed_address: profile.detailed_address,
            email: profile.email,
            phone_number: profile.phone_number,
        }
    }
}
