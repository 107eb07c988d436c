//! Collects GitHub trending repositories and keeps a time series of their popularity.
//!
//! Repository snapshots are fetched from the GitHub GraphQL API, stored as one identity
//! row per repository plus append-only stars/forks and issues/PRs samples, and ranked
//! over a trailing window to build a leaderboard.

mod infrastructure;
mod interface;
mod model;

pub use infrastructure::*;
pub use interface::*;
pub use model::*;
