//! Domain layer - Core business entities and value objects.
//!
//! This crate contains pure domain logic with no infrastructure dependencies:
//! the active and dormant user records, the cross-service `UserDetail`
//! payload and the pending-notification record used by the outbox.

pub mod constants;
pub mod error;
pub mod notification;
pub mod password;
pub mod user;

pub use constants::*;
pub use error::{DomainError, DomainResult};
pub use notification::{DormancyNotice, NotificationKind, PendingNotification};
pub use password::Password;
pub use user::{expiry_cutoff, DormantUser, Profile, Registration, User, UserDetail, UserId};
