pub mod news_monitor;
pub mod rss;

pub use news_monitor::{NewsMonitor, NewsTickReport};
pub use rss::{FeedError, NewsSource, RssSource};
