// ABOUTME: Metrics engine state owned by the control loop
// ABOUTME: Combines adapter selection, rate sampling, smoothing, history, and probe counters into one view

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::adapters::{list_adapters, pick_active_adapter, resolve_adapter, AdapterSelector, NO_NETWORK};
use crate::config::Config;
use crate::history::{History, RateSample, SmoothingWindow};
use crate::probe::{LatencyProbeResult, ProbeEvent};
use crate::quality::{classify, split_by_tier, Direction, QualityTier, Thresholds, TierSeries};
use crate::sampler::{RateSampler, Rates};
use crate::source::{GlobalCounters, SourceError, StatsSnapshot};

const MIB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeCounters {
    pub sent: u64,
    pub ok: u64,
    pub fail: u64,
}

/// One row of the per-adapter table.
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterRow {
    pub name: String,
    pub rates: Rates,
    pub sent_mib: f64,
    pub received_mib: f64,
}

pub struct Engine {
    config: Arc<Config>,
    sampler: RateSampler,
    snapshot: StatsSnapshot,
    active_adapter: String,
    smooth_total: SmoothingWindow,
    smooth_down: SmoothingWindow,
    smooth_up: SmoothingWindow,
    simple_latest: Rates,
    graph_latest: Rates,
    history: History,
    latency_ms: LatencyProbeResult,
    probes: ProbeCounters,
    global: GlobalCounters,
}

impl Engine {
    pub fn new(config: Arc<Config>, created_at: DateTime<Utc>) -> Self {
        let window = config.monitor.smoothing_window;
        let capacity = config.monitor.history_size;
        Self {
            config,
            sampler: RateSampler::new(),
            snapshot: StatsSnapshot::default(),
            active_adapter: NO_NETWORK.to_string(),
            smooth_total: SmoothingWindow::new(window),
            smooth_down: SmoothingWindow::new(window),
            smooth_up: SmoothingWindow::new(window),
            simple_latest: Rates::default(),
            graph_latest: Rates::default(),
            history: History::new(capacity, created_at),
            latency_ms: None,
            probes: ProbeCounters::default(),
            global: GlobalCounters::default(),
        }
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    /// Swap in a new configuration snapshot. Accumulated state is kept; the
    /// history and smoothing rings are resized if their lengths changed.
    pub fn reconfigure(&mut self, config: Arc<Config>) {
        let window = config.monitor.smoothing_window;
        if window != self.smooth_total.len() {
            self.smooth_total.resize(window);
            self.smooth_down.resize(window);
            self.smooth_up.resize(window);
        }
        if config.monitor.history_size != self.history.capacity() {
            self.history.resize(config.monitor.history_size);
        }
        info!(
            stats_interval_ms = config.monitor.stats_interval_ms,
            probe_interval_ms = config.monitor.probe_interval_ms,
            ping_host = %config.monitor.ping_host,
            "engine reconfigured"
        );
        self.config = config;
    }

    /// Run one stats tick over a freshly polled snapshot.
    pub fn tick_stats(
        &mut self,
        polled: Result<StatsSnapshot, SourceError>,
        now: Instant,
        wall: DateTime<Utc>,
    ) {
        let snapshot = polled.unwrap_or_else(|e| {
            warn!(error = %e, "interface statistics unavailable");
            StatsSnapshot::default()
        });

        let active = pick_active_adapter(&snapshot.interfaces);
        if active != self.active_adapter {
            info!(from = %self.active_adapter, to = %active, "active adapter changed");
            self.active_adapter = active;
        }

        let created = self.sampler.sample(&snapshot.interfaces, now);
        if !created.is_empty() {
            debug!(adapters = ?created, "new adapters seen");
        }
        if !self.config.monitor.retain_stale_adapters {
            let removed = self.sampler.prune(&snapshot.interfaces);
            if removed > 0 {
                debug!(removed, "pruned stale adapters");
            }
        }

        self.global = snapshot.global;
        self.snapshot = snapshot;

        // An adapter that vanished this tick reads as zero instead of its stale rate.
        let simple = self.resolve(&self.config.adapters.simple);
        self.simple_latest = self.current_rates(&simple);
        self.smooth_total.push(self.simple_latest.total_mbps);
        self.smooth_down.push(self.simple_latest.down_mbps);
        self.smooth_up.push(self.simple_latest.up_mbps);

        let graph = self.resolve(&self.config.adapters.graph);
        self.graph_latest = self.current_rates(&graph);

        self.history.push(RateSample {
            timestamp: wall,
            total_mbps: self.graph_latest.total_mbps,
            latency_ms: self.latency_ms,
        });
    }

    fn current_rates(&self, name: &str) -> Rates {
        if self.snapshot.contains(name) {
            self.sampler.rates(name)
        } else {
            Rates::default()
        }
    }

    pub fn record_dispatch(&mut self) {
        self.probes.sent += 1;
    }

    /// Merge a finished probe. The newest arrival wins, even when it was dispatched earlier.
    pub fn apply_probe(&mut self, event: &ProbeEvent) {
        match event.result {
            Some(ms) => {
                self.probes.ok += 1;
                debug!(host = %event.host, latency_ms = ms, "probe ok");
            }
            None => {
                self.probes.fail += 1;
                debug!(
                    host = %event.host,
                    after_ms = event.dispatched_at.elapsed().as_millis() as u64,
                    "probe failed"
                );
            }
        }
        self.latency_ms = event.result;
    }

    pub fn resolve(&self, selector: &AdapterSelector) -> String {
        resolve_adapter(selector, &self.active_adapter, &self.snapshot)
    }

    #[allow(dead_code)]
    pub fn active_adapter(&self) -> &str {
        &self.active_adapter
    }

    #[allow(dead_code)]
    pub fn latency_ms(&self) -> LatencyProbeResult {
        self.latency_ms
    }

    #[allow(dead_code)]
    pub fn probes(&self) -> ProbeCounters {
        self.probes
    }

    #[allow(dead_code)]
    pub fn history(&self) -> &History {
        &self.history
    }

    #[allow(dead_code)]
    pub fn sampler(&self) -> &RateSampler {
        &self.sampler
    }

    pub fn smoothed(&self) -> Rates {
        Rates {
            up_mbps: self.smooth_up.mean(),
            down_mbps: self.smooth_down.mean(),
            total_mbps: self.smooth_total.mean(),
        }
    }

    fn monitored_rows(&self) -> Vec<AdapterRow> {
        let selected: Vec<String> = if self.config.adapters.monitored.is_empty() {
            vec![self.active_adapter.clone()]
        } else {
            self.config
                .adapters
                .monitored
                .iter()
                .map(|s| self.resolve(s))
                .collect()
        };

        let mut rows: Vec<AdapterRow> = Vec::with_capacity(selected.len());
        for name in selected {
            if rows.iter().any(|r| r.name == name) {
                continue;
            }
            if let Some(entry) = self.sampler.get(&name) {
                rows.push(AdapterRow {
                    name: entry.name.clone(),
                    rates: entry.rates,
                    sent_mib: entry.sent_mib(),
                    received_mib: entry.received_mib(),
                });
            }
        }
        rows
    }

    /// Everything a renderer needs, copied out so drawing never sees a tick half-applied.
    pub fn view(&self) -> EngineView {
        let config = &self.config;
        let smoothed = self.smoothed();
        let rate_thresholds = config.rate_thresholds();
        let ping_thresholds = config.ping_thresholds();
        let timestamps = self.history.timestamps();

        EngineView {
            active_adapter: self.active_adapter.clone(),
            simple_adapter: self.resolve(&config.adapters.simple),
            graph_adapter: self.resolve(&config.adapters.graph),
            ping_host: config.monitor.ping_host.clone(),
            adapters: list_adapters(&self.snapshot),
            smoothed,
            simple_latest: self.simple_latest,
            graph_latest: self.graph_latest,
            latency_ms: self.latency_ms,
            rate_tier: classify(Some(smoothed.total_mbps), rate_thresholds, Direction::HigherIsBetter),
            latency_tier: classify(self.latency_ms.map(f64::from), ping_thresholds, Direction::LowerIsBetter),
            probes: self.probes,
            total_sent_mib: self.global.bytes_sent as f64 / MIB,
            total_received_mib: self.global.bytes_received as f64 / MIB,
            rows: self.monitored_rows(),
            rate_series: split_by_tier(
                &timestamps,
                &self.history.rate_series(),
                rate_thresholds,
                Direction::HigherIsBetter,
            ),
            latency_series: split_by_tier(
                &timestamps,
                &self.history.latency_series(),
                ping_thresholds,
                Direction::LowerIsBetter,
            ),
            rate_thresholds,
            ping_thresholds,
        }
    }
}

/// Read-only copy of the engine state for rendering.
#[derive(Debug, Clone)]
pub struct EngineView {
    pub active_adapter: String,
    pub simple_adapter: String,
    pub graph_adapter: String,
    pub ping_host: String,
    pub adapters: Vec<String>,
    pub smoothed: Rates,
    pub simple_latest: Rates,
    pub graph_latest: Rates,
    pub latency_ms: LatencyProbeResult,
    pub rate_tier: QualityTier,
    pub latency_tier: QualityTier,
    pub probes: ProbeCounters,
    pub total_sent_mib: f64,
    pub total_received_mib: f64,
    pub rows: Vec<AdapterRow>,
    pub rate_series: TierSeries,
    pub latency_series: TierSeries,
    pub rate_thresholds: Thresholds,
    pub ping_thresholds: Thresholds,
}

impl EngineView {
    pub fn latency_label(&self) -> String {
        match self.latency_ms {
            Some(ms) => format!("{ms} ms"),
            None => "— ms".to_string(),
        }
    }

    /// Multi-line status text, the same summary a tray tooltip would show.
    pub fn summary(&self) -> String {
        format!(
            "Adapter: {}\nRate: {}\nPing: {} -> {}\nRequests: {} (ok {} / fail {})\nSent {:.2} MB  Recv {:.2} MB",
            self.simple_adapter,
            format_rate(self.smoothed.total_mbps),
            self.latency_label(),
            self.ping_host,
            self.probes.sent,
            self.probes.ok,
            self.probes.fail,
            self.total_sent_mib,
            self.total_received_mib,
        )
    }
}

/// Human-readable rate: Kbps below 1 Mbps, otherwise one decimal of Mbps.
pub fn format_rate(mbps: f64) -> String {
    if mbps < 1.0 {
        format!("{:.0} Kbps", mbps * 1000.0)
    } else {
        format!("{mbps:.1} Mbps")
    }
}
