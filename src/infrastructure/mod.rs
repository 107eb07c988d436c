mod collector;
mod fetcher_graphql;
mod fetcher_retrier;
mod leaderboard;
mod persister_factory;
mod persister_postgresql;
mod persister_rows;
mod persister_sqlite;

pub use collector::*;
pub use fetcher_graphql::*;
pub use fetcher_retrier::*;
pub use leaderboard::*;
pub use persister_factory::*;
pub use persister_postgresql::*;
pub use persister_sqlite::*;
