//! Operational counters for the engine.
//!
//! This module provides metrics collection for validation and evaluation
//! monitoring.

use std::sync::atomic::{AtomicU64, Ordering};

/// Engine activity metrics
#[derive(Debug, Default)]
pub struct EngineMetrics {
    /// Events that passed validation cleanly
    events_validated: AtomicU64,
    /// Events that passed validation with warnings
    events_warned: AtomicU64,
    /// Events rejected by a Drop outcome
    events_dropped: AtomicU64,
    /// Campaigns whose triggers matched an event
    campaigns_matched: AtomicU64,
    /// Matched campaigns held back by their limits
    campaigns_suppressed: AtomicU64,
    /// Impressions recorded by the host
    impressions_recorded: AtomicU64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_event_validated(&self) {
        self.events_validated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_event_warned(&self) {
        self.events_warned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_event_dropped(&self) {
        self.events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_campaign_matched(&self) {
        self.campaigns_matched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_campaign_suppressed(&self) {
        self.campaigns_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_impression(&self) {
        self.impressions_recorded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn events_validated(&self) -> u64 {
        self.events_validated.load(Ordering::Relaxed)
    }

    pub fn events_warned(&self) -> u64 {
        self.events_warned.load(Ordering::Relaxed)
    }

    pub fn events_dropped(&self) -> u64 {
        self.events_dropped.load(Ordering::Relaxed)
    }

    pub fn campaigns_matched(&self) -> u64 {
        self.campaigns_matched.load(Ordering::Relaxed)
    }

    pub fn campaigns_suppressed(&self) -> u64 {
        self.campaigns_suppressed.load(Ordering::Relaxed)
    }

    pub fn impressions_recorded(&self) -> u64 {
        self.impressions_recorded.load(Ordering::Relaxed)
    }

    /// Total events seen, whatever the outcome
    pub fn total_events(&self) -> u64 {
        self.events_validated() + self.events_warned() + self.events_dropped()
    }

    /// Reset all metrics to zero
    pub fn reset(&self) {
        self.events_validated.store(0, Ordering::Relaxed);
        self.events_warned.store(0, Ordering::Relaxed);
        self.events_dropped.store(0, Ordering::Relaxed);
        self.campaigns_matched.store(0, Ordering::Relaxed);
        self.campaigns_suppressed.store(0, Ordering::Relaxed);
        self.impressions_recorded.store(0, Ordering::Relaxed);
    }

    /// Get a snapshot of the counters
    pub fn summary(&self) -> EngineMetricsSummary {
        EngineMetricsSummary {
            events_validated: self.events_validated(),
            events_warned: self.events_warned(),
            events_dropped: self.events_dropped(),
            total_events: self.total_events(),
            campaigns_matched: self.campaigns_matched(),
            campaigns_suppressed: self.campaigns_suppressed(),
            impressions_recorded: self.impressions_recorded(),
        }
    }
}

/// A point-in-time snapshot for reporting
#[derive(Debug, Clone)]
pub struct EngineMetricsSummary {
    pub events_validated: u64,
    pub events_warned: u64,
    pub events_dropped: u64,
    pub total_events: u64,
    pub campaigns_matched: u64,
    pub campaigns_suppressed: u64,
    pub impressions_recorded: u64,
}

impl std::fmt::Display for EngineMetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Engine Metrics: {} events ({} clean, {} warned, {} dropped), {} campaigns matched, {} suppressed, {} impressions",
            self.total_events,
            self.events_validated,
            self.events_warned,
            self.events_dropped,
            self.campaigns_matched,
            self.campaigns_suppressed,
            self.impressions_recorded
        )
    }
}
