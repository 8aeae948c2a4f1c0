//! Prometheus metrics for the ladder service

use crate::types::{GameMode, MatchKind, QueueMode};
use anyhow::Result;
use prometheus::{IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry};
use std::sync::Arc;

/// Counters and gauges the service exports on `/metrics`
#[derive(Clone)]
pub struct MetricsCollector {
    registry: Arc<Registry>,

    /// Total players enqueued
    pub players_queued_total: IntCounter,
    /// Total matches created, by kind
    pub matches_created_total: IntCounterVec,
    /// Total results verified
    pub results_verified_total: IntCounter,
    /// Total disputes escalated to a moderator
    pub disputes_total: IntCounter,
    /// Total reports filed
    pub reports_total: IntCounter,
    /// Total technical losses applied
    pub technical_losses_total: IntCounter,
    /// Total matches closed by the expiry sweep
    pub matches_expired_total: IntCounter,

    /// Players currently waiting, by queue
    pub queue_depth: IntGaugeVec,
    /// Drafts currently in flight
    pub active_drafts: IntGauge,
    /// Results awaiting confirmation or adjudication
    pub pending_results: IntGauge,
    /// Brackets currently in memory
    pub active_tournaments: IntGauge,
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,
}

impl MetricsCollector {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let players_queued_total = IntCounter::with_opts(Opts::new(
            "ladder_players_queued_total",
            "Total players enqueued",
        ))?;
        let matches_created_total = IntCounterVec::new(
            Opts::new("ladder_matches_created_total", "Total matches created"),
            &["kind"],
        )?;
        let results_verified_total = IntCounter::with_opts(Opts::new(
            "ladder_results_verified_total",
            "Total results verified",
        ))?;
        let disputes_total = IntCounter::with_opts(Opts::new(
            "ladder_disputes_total",
            "Total disputes escalated to a moderator",
        ))?;
        let reports_total =
            IntCounter::with_opts(Opts::new("ladder_reports_total", "Total reports filed"))?;
        let technical_losses_total = IntCounter::with_opts(Opts::new(
            "ladder_technical_losses_total",
            "Total technical losses applied",
        ))?;
        let matches_expired_total = IntCounter::with_opts(Opts::new(
            "ladder_matches_expired_total",
            "Total matches closed by the expiry sweep",
        ))?;

        let queue_depth = IntGaugeVec::new(
            Opts::new("ladder_queue_depth", "Players currently waiting"),
            &["queue"],
        )?;
        let active_drafts = IntGauge::with_opts(Opts::new(
            "ladder_active_drafts",
            "Drafts currently in flight",
        ))?;
        let pending_results = IntGauge::with_opts(Opts::new(
            "ladder_pending_results",
            "Results awaiting confirmation or adjudication",
        ))?;
        let active_tournaments = IntGauge::with_opts(Opts::new(
            "ladder_active_tournaments",
            "Brackets currently in memory",
        ))?;
        let uptime_seconds = IntGauge::with_opts(Opts::new(
            "ladder_uptime_seconds",
            "Service uptime in seconds",
        ))?;

        registry.register(Box::new(players_queued_total.clone()))?;
        registry.register(Box::new(matches_created_total.clone()))?;
        registry.register(Box::new(results_verified_total.clone()))?;
        registry.register(Box::new(disputes_total.clone()))?;
        registry.register(Box::new(reports_total.clone()))?;
        registry.register(Box::new(technical_losses_total.clone()))?;
        registry.register(Box::new(matches_expired_total.clone()))?;
        registry.register(Box::new(queue_depth.clone()))?;
        registry.register(Box::new(active_drafts.clone()))?;
        registry.register(Box::new(pending_results.clone()))?;
        registry.register(Box::new(active_tournaments.clone()))?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            players_queued_total,
            matches_created_total,
            results_verified_total,
            disputes_total,
            reports_total,
            technical_losses_total,
            matches_expired_total,
            queue_depth,
            active_drafts,
            pending_results,
            active_tournaments,
            uptime_seconds,
        })
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn record_match_created(&self, kind: MatchKind) {
        let label = match kind {
            MatchKind::Ladder => "ladder",
            MatchKind::Tournament => "tournament",
        };
        self.matches_created_total.with_label_values(&[label]).inc();
    }

    pub fn set_queue_depth(&self, mode: QueueMode, depth: usize) {
        let label = match mode {
            QueueMode::Any => "any".to_string(),
            QueueMode::Mode(GameMode::Flags) => "flags".to_string(),
            QueueMode::Mode(GameMode::Duel) => "duel".to_string(),
            QueueMode::Mode(GameMode::Blitz) => "blitz".to_string(),
        };
        self.queue_depth
            .with_label_values(&[&label])
            .set(depth as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_registers_metrics() {
        let collector = MetricsCollector::new().unwrap();
        collector.players_queued_total.inc();
        collector.record_match_created(MatchKind::Ladder);
        collector.set_queue_depth(QueueMode::Any, 3);

        let families = collector.registry().gather();
        assert!(!families.is_empty());
        let names: Vec<String> = families.iter().map(|f| f.get_name().to_string()).collect();
        assert!(names.iter().any(|n| n == "ladder_players_queued_total"));
        assert!(names.iter().any(|n| n == "ladder_queue_depth"));
    }
}
