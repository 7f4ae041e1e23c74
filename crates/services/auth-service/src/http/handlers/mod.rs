//! Request handlers.

mod health_handler;
mod lifecycle_handler;

pub use health_handler::{health_check, health_routes, HealthResponse};
pub use lifecycle_handler::{
    lifecycle_routes, purge_dormant, register, transition_to_dormant, DormantResponse,
    PurgeResponse, RegisterRequest, RegisteredResponse,
};
