//! SeaORM entity definitions.
//!
//! These are database-specific entities separate from domain models.

pub mod dormant_user;
pub mod notification_outbox;
pub mod user;
