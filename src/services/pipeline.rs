use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;

use crate::config::ScanThresholds;
use crate::intelligence::{check_candidate, classify, signal_reason};
use crate::models::{Candidate, Signal, SourceMode};
use crate::services::notifier::{format_momentum_alert, AlertSink};
use crate::tracking::{DedupKey, DedupLedger, StatsAggregator};

/// Shared tail of both scan loops: filter → classify → dedup gate → stats → emit.
#[derive(Clone)]
pub struct SignalPipeline {
    dedup: DedupLedger,
    stats: StatsAggregator,
    sink: Arc<dyn AlertSink>,
    thresholds: ScanThresholds,
}

impl SignalPipeline {
    pub fn new(
        dedup: DedupLedger,
        stats: StatsAggregator,
        sink: Arc<dyn AlertSink>,
        thresholds: ScanThresholds,
    ) -> Self {
        Self {
            dedup,
            stats,
            sink,
            thresholds,
        }
    }

    pub fn thresholds(&self) -> &ScanThresholds {
        &self.thresholds
    }

    /// Run a batch of candidates through the gates and emit what survives.
    /// Returns the emitted signals.
    pub async fn process(&self, candidates: Vec<Candidate>, mode: SourceMode) -> Vec<Signal> {
        self.process_at(candidates, mode, Utc::now()).await
    }

    pub async fn process_at(
        &self,
        candidates: Vec<Candidate>,
        mode: SourceMode,
        now: DateTime<Utc>,
    ) -> Vec<Signal> {
        let mut emitted = Vec::new();

        for candidate in candidates {
            if let Err(rejection) = check_candidate(&candidate, &self.thresholds) {
                counter!("signals_suppressed_total", "reason" => rejection.as_str()).increment(1);
                tracing::trace!(ticker = %candidate.ticker, reason = rejection.as_str(), "Candidate filtered");
                continue;
            }

            let tier = classify(&candidate, mode == SourceMode::Watchlist);

            let key = DedupKey::alert(candidate.market, candidate.kind, candidate.dedup_subject(), now.date_naive());
            if !self.dedup.check_and_register_at(key, now).await {
                counter!("signals_suppressed_total", "reason" => "duplicate").increment(1);
                tracing::debug!(ticker = %candidate.ticker, market = %candidate.market, "Already alerted today, suppressing");
                continue;
            }

            let signal = Signal {
                reason: signal_reason(&candidate, mode),
                candidate,
                tier,
                timestamp: now,
                source_mode: mode,
            };

            self.stats.record(&signal).await;
            counter!(
                "signals_emitted_total",
                "market" => signal.candidate.market.as_str(),
                "tier" => signal.tier.as_str()
            )
            .increment(1);

            tracing::info!(
                ticker = %signal.candidate.ticker,
                market = %signal.candidate.market,
                tier = %signal.tier,
                change = signal.candidate.change_percent,
                mode = %mode,
                "Signal emitted"
            );

            self.sink.emit(&format_momentum_alert(&signal)).await;
            emitted.push(signal);
        }

        emitted
    }
}
