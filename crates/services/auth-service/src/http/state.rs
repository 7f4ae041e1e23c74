//! Application state for dependency injection.

use std::sync::Arc;

use crate::infra::Database;
use crate::service::UserLifecycle;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Arc<dyn UserLifecycle>,
    /// Checked by the health endpoint when present
    pub database: Option<Database>,
}

impl AppState {
    /// Create new app state.
    pub fn new(lifecycle: Arc<dyn UserLifecycle>, database: Option<Database>) -> Self {
        Self {
            lifecycle,
            database,
        }
    }
}
