//! Infrastructure layer: database connection and schema.

mod db;
pub mod migrations;

pub use db::{connect_options, Database, MigrationState};
pub use migrations::Migrator;
