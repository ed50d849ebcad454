pub mod dedup;
pub mod stats;
pub mod watchlist;

pub use dedup::{DedupKey, DedupLedger};
pub use stats::{ProviderCounts, StatsAggregator, StatsSnapshot};
pub use watchlist::{DynamicWatchlist, WatchlistEntry};
