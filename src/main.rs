use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use surge_watch::api::router::create_router;
use surge_watch::classifier::HttpClassifier;
use surge_watch::config::{AppConfig, FilterRules};
use surge_watch::ingestion::{NewsMonitor, NewsSource, RssSource};
use surge_watch::models::Market;
use surge_watch::providers::{
    FinvizGainers, NaverProgramFlow, NaverSurge, NaverTheme, ParsePool, ProviderContext, RequestShaper,
    SourceChain, YahooChart, YahooScreener, YahooSweep,
};
use surge_watch::services::notifier::format_stats_summary;
use surge_watch::services::{AlertSink, LogSink, MarketChains, Scanner, Scheduler, SignalPipeline, TelegramNotifier};
use surge_watch::tracking::{DedupLedger, DynamicWatchlist, StatsAggregator};
use surge_watch::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    init_tracing(config.log_json);

    let addr = format!("{}:{}", config.host, config.port);
    let metrics_handle = surge_watch::metrics::init_metrics();

    // --- Shared state ---
    let stats = StatsAggregator::new();
    let dedup = DedupLedger::new(config.dedup_retention_days, config.title_similarity, config.title_window);
    let watchlist = DynamicWatchlist::new(
        chrono::Duration::hours(config.watchlist_ttl_hours),
        config.watchlist_capacity,
    );
    let pause_flag = Arc::new(AtomicBool::new(false));

    let http = reqwest::Client::builder()
        .timeout(config.provider_timeout())
        .build()?;
    let shaper = Arc::new(RequestShaper::new(config.request_delay_ms, config.request_jitter_ms));
    let ctx = ProviderContext::new(http.clone(), shaper.clone(), ParsePool::new(config.parse_workers));

    // --- Notification sink ---
    let sink: Arc<dyn AlertSink> = match (&config.telegram_bot_token, &config.telegram_chat_id) {
        (Some(token), Some(chat)) if config.has_telegram() => {
            tracing::info!("Telegram notifications enabled");
            Arc::new(TelegramNotifier::new(http.clone(), token.clone(), chat.clone()))
        }
        _ => {
            tracing::warn!("Telegram not configured, alerts go to the log only");
            Arc::new(LogSink)
        }
    };

    // --- Scan loops ---
    let chains = build_chains(&config, &ctx, &shaper, &stats);
    let pipeline = SignalPipeline::new(dedup.clone(), stats.clone(), sink.clone(), config.thresholds);
    let scanner = Scanner::new(watchlist.clone(), dedup.clone(), pipeline, chains);

    // --- News loop ---
    let news = if config.news_feeds.is_empty() {
        tracing::warn!("NEWS_FEEDS is empty, news loop will not start");
        None
    } else {
        let sources: Vec<Arc<dyn NewsSource>> = config
            .news_feeds
            .iter()
            .map(|feed| Arc::new(RssSource::new(ctx.clone(), feed.clone())) as Arc<dyn NewsSource>)
            .collect();
        let classifier = HttpClassifier::new(
            http.clone(),
            config.classifier_url.clone(),
            Duration::from_secs(config.classifier_timeout_secs),
        );
        tracing::info!(feeds = sources.len(), classifier = %config.classifier_url, "News monitor configured");
        Some(Arc::new(NewsMonitor::new(
            sources,
            Arc::new(classifier),
            dedup.clone(),
            watchlist.clone(),
            sink.clone(),
            Arc::new(FilterRules::default()),
            config.quick_score_threshold,
            config.promotion_score_threshold,
            config.provider_timeout(),
        )))
    };

    let scheduler = Scheduler::spawn(scanner.clone(), news, pause_flag.clone(), &config);
    tracing::info!(tasks = ?scheduler.task_names(), "Scheduler started");

    let state = AppState {
        config,
        watchlist,
        stats: stats.clone(),
        scanner,
        pause_flag,
        metrics_handle,
    };
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await?;

    tracing::info!("Shutting down, waiting for in-flight ticks");
    scheduler.shutdown().await;
    tracing::info!(summary = %format_stats_summary(&stats.summary().await, chrono::Utc::now()), "Session stats");
    Ok(())
}

/// Provider chains per market, in fallback order.
fn build_chains(
    config: &AppConfig,
    ctx: &ProviderContext,
    shaper: &Arc<RequestShaper>,
    stats: &StatsAggregator,
) -> BTreeMap<Market, MarketChains> {
    let timeout = config.provider_timeout();
    let chain = |name: &str, market: Market| SourceChain::new(name, market, timeout, shaper.clone(), stats.clone());
    let quotes = Arc::new(YahooChart::new(ctx.clone()));

    let mut chains = BTreeMap::new();
    chains.insert(
        Market::Us,
        MarketChains {
            quotes: Arc::new(chain("us-quotes", Market::Us).with_quotes(quotes.clone())),
            gainers: Arc::new(
                chain("us-gainers", Market::Us)
                    .with_gainers(Arc::new(FinvizGainers::new(ctx.clone())))
                    .with_gainers(Arc::new(YahooScreener::new(ctx.clone())))
                    .with_gainers(Arc::new(YahooSweep::new(ctx.clone(), config.us_sweep_tickers.clone()))),
            ),
            feeds: Vec::new(),
        },
    );
    chains.insert(
        Market::Kr,
        MarketChains {
            quotes: Arc::new(chain("kr-quotes", Market::Kr).with_quotes(quotes)),
            gainers: Arc::new(
                chain("kr-gainers", Market::Kr)
                    .with_gainers(Arc::new(NaverSurge::new(ctx.clone())))
                    .with_gainers(Arc::new(YahooSweep::new(ctx.clone(), config.kr_sweep_tickers.clone()))),
            ),
            feeds: vec![
                Arc::new(chain("kr-program", Market::Kr).with_gainers(Arc::new(NaverProgramFlow::new(ctx.clone())))),
                Arc::new(
                    chain("kr-theme", Market::Kr)
                        .with_gainers(Arc::new(NaverTheme::new(ctx.clone(), &config.thresholds))),
                ),
            ],
        },
    );
    chains
}

fn init_tracing(json: bool) {
    use tracing_subscriber::{fmt, EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}
