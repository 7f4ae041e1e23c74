//! Repository layer for data access.

pub mod entities;
mod dormant_repository;
mod outbox_repository;
mod user_repository;

pub use dormant_repository::{DormantRepository, DormantStore};
pub use outbox_repository::{OutboxRepository, OutboxStore};
pub use user_repository::{UserRepository, UserStore};

#[cfg(any(test, feature = "test-utils"))]
pub use dormant_repository::MockDormantRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use outbox_repository::MockOutboxRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use user_repository::MockUserRepository;
