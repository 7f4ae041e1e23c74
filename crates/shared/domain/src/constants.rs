//! Domain-level constants.
//!
//! These constants define business rules and the cross-service contract.

// =============================================================================
// Account service contract
// =============================================================================

/// Logical name the Account service registers under in service discovery
pub const ACCOUNT_SERVICE_NAME: &str = "AccountServer";

/// Resource receiving new account details
pub const ACCOUNT_RESOURCE_PATH: &str = "/api/account";

/// Resource receiving dormancy notices
pub const ACCOUNT_DORMANCY_PATH: &str = "/api/account/dormant";

// =============================================================================
// Dormancy
// =============================================================================

/// Default number of days a dormant account is kept before purge
pub const DEFAULT_DORMANCY_RETENTION_DAYS: i64 = 90;

/// Longest accepted retention window (one hundred years)
pub const MAX_DORMANCY_RETENTION_DAYS: i64 = 36_500;

// =============================================================================
// Validation
// =============================================================================

/// Minimum password length requirement
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum username length (matches the `users.username` column)
pub const MAX_USERNAME_LENGTH: usize = 50;
