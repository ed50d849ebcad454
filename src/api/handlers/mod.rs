pub mod analyze;
pub mod control;
pub mod health;
pub mod metrics;
pub mod stats;
pub mod watchlist;
