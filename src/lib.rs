//! hashnode-sync: CLI glue around `hashnode-sync-core`.
//!
//! Holds the pieces that touch the outside world: settings loading, the
//! Hashnode GraphQL client, and report output.

pub mod cli;
pub mod hashnode;
pub mod load_config;
pub mod output;

pub use cli::{run, Cli, Commands, PublishArgs};
