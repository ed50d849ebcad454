use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::histogram;
use rand::Rng;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::AppConfig;
use crate::ingestion::NewsMonitor;
use crate::models::{Market, Signal, SourceMode};
use crate::providers::SourceChain;
use crate::services::pipeline::SignalPipeline;
use crate::tracking::{DedupLedger, DynamicWatchlist};

/// Chains used by the scan loops for one market.
#[derive(Clone)]
pub struct MarketChains {
    /// Single-ticker chain for watchlist polling.
    pub quotes: Arc<SourceChain>,
    /// Market-wide gainers chain.
    pub gainers: Arc<SourceChain>,
    /// Non-price feeds (program trading, themes) polled with the slow loop,
    /// each on its own chain.
    pub feeds: Vec<Arc<SourceChain>>,
}

/// Per-tick logic of the two scan loops, free of any sleeping so tests can
/// drive one tick at a time.
#[derive(Clone)]
pub struct Scanner {
    watchlist: DynamicWatchlist,
    dedup: DedupLedger,
    pipeline: SignalPipeline,
    chains: Arc<BTreeMap<Market, MarketChains>>,
}

impl Scanner {
    pub fn new(
        watchlist: DynamicWatchlist,
        dedup: DedupLedger,
        pipeline: SignalPipeline,
        chains: BTreeMap<Market, MarketChains>,
    ) -> Self {
        Self {
            watchlist,
            dedup,
            pipeline,
            chains: Arc::new(chains),
        }
    }

    pub fn markets(&self) -> Vec<Market> {
        self.chains.keys().copied().collect()
    }

    pub fn chains(&self, market: Market) -> Option<&MarketChains> {
        self.chains.get(&market)
    }

    pub fn pipeline(&self) -> &SignalPipeline {
        &self.pipeline
    }

    /// Fast pass for one market: poll only the watchlisted tickers.
    pub async fn fast_tick(&self, market: Market) -> Vec<Signal> {
        let Some(chains) = self.chains.get(&market) else {
            return Vec::new();
        };

        let tickers = self.watchlist.active_tickers(market).await;
        if tickers.is_empty() {
            tracing::trace!(market = %market, "Fast loop: watchlist empty");
            return Vec::new();
        }

        tracing::debug!(market = %market, count = tickers.len(), "Fast loop: polling watchlist");
        let candidates = chains.quotes.resolve_tickers(&tickers).await;
        self.pipeline.process(candidates, SourceMode::Watchlist).await
    }

    /// Slow pass for one market: whole-market gainers plus the non-price
    /// feeds, then ledger housekeeping.
    pub async fn slow_tick(&self, market: Market) -> Vec<Signal> {
        let Some(chains) = self.chains.get(&market) else {
            return Vec::new();
        };

        let candidates = chains.gainers.resolve_market_wide().await;
        tracing::debug!(market = %market, count = candidates.len(), "Slow loop: market-wide candidates");
        let mut signals = self.pipeline.process(candidates, SourceMode::FullMarket).await;

        for feed in &chains.feeds {
            let rows = feed.resolve_market_wide().await;
            signals.extend(self.pipeline.process(rows, SourceMode::FullMarket).await);
        }

        self.dedup.purge_expired().await;
        signals
    }
}

/// Cadence of one repeating task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    pub interval: Duration,
    pub jitter: Duration,
}

impl Cadence {
    pub fn new(interval_secs: u64, jitter_secs: u64) -> Self {
        Self {
            interval: Duration::from_secs(interval_secs),
            jitter: Duration::from_secs(jitter_secs),
        }
    }

    /// `interval ± jitter`, never below one second.
    pub fn next_sleep(&self) -> Duration {
        let base = self.interval.as_millis() as i64;
        let jitter = self.jitter.as_millis() as i64;
        let offset = if jitter > 0 {
            rand::thread_rng().gen_range(-jitter..=jitter)
        } else {
            0
        };
        Duration::from_millis((base + offset).max(1_000) as u64)
    }
}

/// Owns the named background loops. Dropping the scheduler does not stop
/// them; call [`shutdown`](Self::shutdown).
pub struct Scheduler {
    tasks: Vec<(String, JoinHandle<()>)>,
    shutdown_tx: watch::Sender<bool>,
}

impl Scheduler {
    /// Spawn the fast loop, one slow loop per market and, when configured,
    /// the news loop.
    pub fn spawn(
        scanner: Scanner,
        news: Option<Arc<NewsMonitor>>,
        pause_flag: Arc<AtomicBool>,
        config: &AppConfig,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tasks = Vec::new();

        let fast = Cadence::new(config.fast_interval_secs, config.fast_jitter_secs);
        let s = scanner.clone();
        tasks.push((
            "fast-loop".to_string(),
            tokio::spawn(run_loop("fast", fast, pause_flag.clone(), shutdown_rx.clone(), move || {
                let s = s.clone();
                async move {
                    for market in s.markets() {
                        let m = s.clone();
                        guarded("fast", market, async move { m.fast_tick(market).await }).await;
                    }
                }
            })),
        ));

        for market in scanner.markets() {
            let slow = Cadence::new(config.slow_interval_for(market), config.slow_jitter_secs);
            let s = scanner.clone();
            tasks.push((
                format!("slow-loop:{market}"),
                tokio::spawn(run_loop("slow", slow, pause_flag.clone(), shutdown_rx.clone(), move || {
                    let s = s.clone();
                    async move {
                        guarded("slow", market, async move { s.slow_tick(market).await }).await;
                    }
                })),
            ));
        }

        if let Some(news) = news {
            let cadence = Cadence::new(config.news_interval_secs, config.news_jitter_secs);
            tasks.push((
                "news-loop".to_string(),
                tokio::spawn(run_loop("news", cadence, pause_flag, shutdown_rx, move || {
                    let news = news.clone();
                    async move {
                        let report = news.tick().await;
                        if !report.promoted.is_empty() || report.fresh > 0 {
                            tracing::info!(
                                fetched = report.fetched,
                                fresh = report.fresh,
                                shortlisted = report.shortlisted,
                                analyzed = report.analyzed,
                                promoted = report.promoted.len(),
                                "News tick complete"
                            );
                        }
                    }
                })),
            ));
        }

        for (name, _) in &tasks {
            tracing::info!(task = %name, "Scheduler task spawned");
        }

        Self { tasks, shutdown_tx }
    }

    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Signal every loop to stop and wait for in-flight ticks to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for (name, handle) in self.tasks {
            match handle.await {
                Ok(()) => tracing::info!(task = %name, "Scheduler task stopped"),
                Err(e) => tracing::error!(task = %name, error = %e, "Scheduler task ended abnormally"),
            }
        }
    }
}

/// Run one market's tick on its own task so a panic is contained to that
/// market and that iteration.
async fn guarded<F>(loop_name: &'static str, market: Market, tick: F)
where
    F: Future<Output = Vec<Signal>> + Send + 'static,
{
    match tokio::spawn(tick).await {
        Ok(signals) if !signals.is_empty() => {
            tracing::info!(loop_name, market = %market, signals = signals.len(), "Tick emitted signals");
        }
        Ok(_) => {}
        Err(e) => {
            tracing::error!(loop_name, market = %market, error = %e, "Tick failed, retrying next interval");
        }
    }
}

/// Sleep/loop wrapper around a tick. Shutdown is observed only between
/// ticks; pause skips whole ticks.
async fn run_loop<F, Fut>(
    name: &'static str,
    cadence: Cadence,
    pause_flag: Arc<AtomicBool>,
    mut shutdown: watch::Receiver<bool>,
    tick: F,
) where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    loop {
        if *shutdown.borrow() {
            break;
        }

        if pause_flag.load(Ordering::Relaxed) {
            tracing::debug!(loop_name = name, "Paused, skipping tick");
        } else {
            let start = Instant::now();
            tick().await;
            histogram!("tick_duration_seconds", "loop" => name).record(start.elapsed().as_secs_f64());
        }

        tokio::select! {
            _ = tokio::time::sleep(cadence.next_sleep()) => {}
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    tracing::debug!(loop_name = name, "Loop exited");
}
