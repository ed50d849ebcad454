pub mod notifier;
pub mod pipeline;
pub mod scheduler;

pub use notifier::{AlertSink, LogSink, TelegramNotifier};
pub use pipeline::SignalPipeline;
pub use scheduler::{Cadence, MarketChains, Scanner, Scheduler};
