//! Clients for other services.

mod account_client;

pub use account_client::{AccountClient, AccountNotifier};

#[cfg(any(test, feature = "test-utils"))]
pub use account_client::MockAccountNotifier;
