//! Background jobs: the dormancy sweeper and the outbox relay.
//!
//! Both run on a fixed interval until the shutdown channel flips to `true`,
//! and both expose `run_once` for one-shot CLI use.

mod relay;
mod sweeper;

pub use relay::{OutboxRelay, RelayReport};
pub use sweeper::DormancySweeper;
