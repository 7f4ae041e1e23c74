//! Common utilities shared across the Auth service crates.
//!
//! This crate provides:
//! - The service-wide error type and the notification error taxonomy
//! - Shared configuration structures

pub mod config;
pub mod error;

pub use config::*;
pub use error::{AppError, AppResult, NotifyError};
