// ABOUTME: Configuration management for netpulse
// ABOUTME: Handles loading/saving TOML config files and clamping values before they reach the engine

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::adapters::AdapterSelector;
use crate::quality::Thresholds;

pub const DEFAULT_PING_HOST: &str = "1.1.1.1";

const STATS_INTERVAL_RANGE_MS: (u64, u64) = (250, 10_000);
const PROBE_INTERVAL_RANGE_MS: (u64, u64) = (500, 20_000);
const PROBE_TIMEOUT_RANGE_MS: (u64, u64) = (100, 5_000);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub monitor: MonitorConfig,
    pub thresholds: ThresholdConfig,
    pub adapters: AdapterConfig,
    pub ui: UiConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Host or address the latency probe pings
    pub ping_host: String,
    /// Stats tick interval in milliseconds
    pub stats_interval_ms: u64,
    /// Probe tick interval in milliseconds
    pub probe_interval_ms: u64,
    /// Timeout handed to each ping invocation
    pub probe_timeout_ms: u64,
    /// Number of samples kept for the graphs
    pub history_size: usize,
    /// Samples averaged for the simple view
    pub smoothing_window: usize,
    /// Keep adapters the OS stopped reporting (e.g. an unplugged USB NIC)
    pub retain_stale_adapters: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub good_ping_ms: f64,
    pub ok_ping_ms: f64,
    pub good_mbps: f64,
    pub ok_mbps: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AdapterConfig {
    /// Adapter shown in the simple view
    pub simple: AdapterSelector,
    /// Adapter plotted in the advanced view
    pub graph: AdapterSelector,
    /// Adapters listed in the per-adapter table
    pub monitored: Vec<AdapterSelector>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Simple,
    Advanced,
}

impl ViewMode {
    pub fn toggled(self) -> Self {
        match self {
            ViewMode::Simple => ViewMode::Advanced,
            ViewMode::Advanced => ViewMode::Simple,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub mode: ViewMode,
    /// Refresh rate for the UI in milliseconds
    pub refresh_rate: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            ping_host: DEFAULT_PING_HOST.to_string(),
            stats_interval_ms: 1000,
            probe_interval_ms: 1500,
            probe_timeout_ms: 800,
            history_size: 240, // 4 minutes at 1s intervals
            smoothing_window: 10,
            retain_stale_adapters: true,
        }
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            good_ping_ms: 60.0,
            ok_ping_ms: 150.0,
            good_mbps: 5.0,
            ok_mbps: 0.5,
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            mode: ViewMode::Simple,
            refresh_rate: 100, // 10 FPS
        }
    }
}

/// Command-line values layered over the file, reapplied on every reload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub ping_host: Option<String>,
    pub stats_interval_ms: Option<u64>,
    pub probe_interval_ms: Option<u64>,
    pub mode: Option<ViewMode>,
}

impl Overrides {
    pub fn apply(&self, config: &mut Config) {
        if let Some(host) = &self.ping_host {
            config.set_ping_host(host.clone());
        }
        if let Some(ms) = self.stats_interval_ms {
            config.monitor.stats_interval_ms = ms;
        }
        if let Some(ms) = self.probe_interval_ms {
            config.monitor.probe_interval_ms = ms;
        }
        if let Some(mode) = self.mode {
            config.ui.mode = mode;
        }
    }
}

fn clamp_ms(value: u64, (lo, hi): (u64, u64)) -> u64 {
    value.clamp(lo, hi)
}

fn positive_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        fallback
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        if let Some(parent) = path.as_ref().parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config dir: {}", parent.display()))?;
        }

        fs::write(&path, content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))
    }

    /// Load the file, writing the defaults first when it does not exist yet.
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            return Self::load(path);
        }
        let config = Self::default();
        config.save(&path)?;
        Ok(config)
    }

    /// Clamp every value into the range the engine accepts.
    pub fn validated(mut self) -> Self {
        let defaults = Config::default();

        let m = &mut self.monitor;
        m.ping_host = m.ping_host.trim().to_string();
        if m.ping_host.is_empty() {
            m.ping_host = DEFAULT_PING_HOST.to_string();
        }
        m.stats_interval_ms = clamp_ms(m.stats_interval_ms, STATS_INTERVAL_RANGE_MS);
        m.probe_interval_ms = clamp_ms(m.probe_interval_ms, PROBE_INTERVAL_RANGE_MS);
        m.probe_timeout_ms = clamp_ms(m.probe_timeout_ms, PROBE_TIMEOUT_RANGE_MS);
        m.history_size = m.history_size.clamp(2, 3600);
        m.smoothing_window = m.smoothing_window.clamp(1, 120);

        let t = &mut self.thresholds;
        let d = &defaults.thresholds;
        t.good_ping_ms = positive_or(t.good_ping_ms, d.good_ping_ms);
        t.ok_ping_ms = positive_or(t.ok_ping_ms, d.ok_ping_ms).max(t.good_ping_ms);
        t.good_mbps = positive_or(t.good_mbps, d.good_mbps);
        t.ok_mbps = positive_or(t.ok_mbps, d.ok_mbps).min(t.good_mbps);

        self.ui.refresh_rate = self.ui.refresh_rate.clamp(16, 1000);

        self
    }

    pub fn set_ping_host(&mut self, host: String) {
        self.monitor.ping_host = host;
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_millis(self.monitor.stats_interval_ms)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.monitor.probe_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.monitor.probe_timeout_ms)
    }

    pub fn ping_thresholds(&self) -> Thresholds {
        Thresholds::new(self.thresholds.good_ping_ms, self.thresholds.ok_ping_ms)
    }

    pub fn rate_thresholds(&self) -> Thresholds {
        Thresholds::new(self.thresholds.good_mbps, self.thresholds.ok_mbps)
    }
}
