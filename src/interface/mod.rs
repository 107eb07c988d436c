mod fetcher;
mod persister;

pub use fetcher::*;
pub use persister::*;
