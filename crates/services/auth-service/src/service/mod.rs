//! Account lifecycle business logic.

mod lifecycle;

pub use lifecycle::{LifecycleManager, PurgeFailure, PurgeReport, UserLifecycle};

#[cfg(any(test, feature = "test-utils"))]
pub use lifecycle::MockUserLifecycle;
