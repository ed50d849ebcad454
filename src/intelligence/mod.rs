pub mod filter;
pub mod priority;

pub use filter::{check_candidate, is_priority_headline, passes_keyword_filter, signal_reason, Rejection};
pub use priority::classify;
