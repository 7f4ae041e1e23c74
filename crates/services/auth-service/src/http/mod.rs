//! HTTP surface over the lifecycle operations.

mod extractors;
pub mod handlers;
mod routes;
mod state;

pub use extractors::ValidatedJson;
pub use routes::create_router;
pub use state::AppState;
