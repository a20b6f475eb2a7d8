// ABOUTME: Per-adapter rate sampling from cumulative byte counters
// ABOUTME: Keeps a running derivative per adapter and reports up/down/total Mbps for each tick

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::source::InterfaceSnapshot;

/// Elapsed time between samples is never taken as less than this.
pub const MIN_SAMPLE_INTERVAL: Duration = Duration::from_millis(50);

const MIB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rates {
    pub up_mbps: f64,
    pub down_mbps: f64,
    pub total_mbps: f64,
}

impl Rates {
    pub fn from_deltas(delta_sent: u64, delta_recv: u64, elapsed: Duration) -> Self {
        let dt = elapsed.max(MIN_SAMPLE_INTERVAL).as_secs_f64();
        let up_mbps = (delta_sent as f64 * 8.0) / dt / 1_000_000.0;
        let down_mbps = (delta_recv as f64 * 8.0) / dt / 1_000_000.0;
        Self {
            up_mbps,
            down_mbps,
            total_mbps: up_mbps + down_mbps,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdapterSnapshot {
    pub name: String,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub observed_at: Instant,
    pub rates: Rates,
}

impl AdapterSnapshot {
    pub fn sent_mib(&self) -> f64 {
        self.bytes_sent as f64 / MIB
    }

    pub fn received_mib(&self) -> f64 {
        self.bytes_received as f64 / MIB
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// First sighting; rates are zero until the next tick.
    Created,
    Updated,
}

#[derive(Debug, Default)]
pub struct RateSampler {
    adapters: HashMap<String, AdapterSnapshot>,
}

impl RateSampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&mut self, name: &str, sent: u64, recv: u64, now: Instant) -> Upsert {
        match self.adapters.get_mut(name) {
            Some(entry) => {
                let elapsed = now.saturating_duration_since(entry.observed_at);
                // Counters that went backwards (reset, wrap) contribute nothing this tick.
                let delta_sent = sent.saturating_sub(entry.bytes_sent);
                let delta_recv = recv.saturating_sub(entry.bytes_received);

                entry.rates = Rates::from_deltas(delta_sent, delta_recv, elapsed);
                entry.bytes_sent = sent;
                entry.bytes_received = recv;
                entry.observed_at = now;
                Upsert::Updated
            }
            None => {
                self.adapters.insert(
                    name.to_string(),
                    AdapterSnapshot {
                        name: name.to_string(),
                        bytes_sent: sent,
                        bytes_received: recv,
                        observed_at: now,
                        rates: Rates::default(),
                    },
                );
                Upsert::Created
            }
        }
    }

    /// Feed one tick of interface counters. Returns names seen for the first time.
    pub fn sample(&mut self, interfaces: &[InterfaceSnapshot], now: Instant) -> Vec<String> {
        interfaces
            .iter()
            .filter_map(|i| {
                match self.upsert(&i.name, i.bytes_sent, i.bytes_received, now) {
                    Upsert::Created => Some(i.name.clone()),
                    Upsert::Updated => None,
                }
            })
            .collect()
    }

    /// Drop adapters the OS no longer reports. Returns how many were removed.
    pub fn prune(&mut self, keep: &[InterfaceSnapshot]) -> usize {
        let before = self.adapters.len();
        self.adapters
            .retain(|name, _| keep.iter().any(|i| &i.name == name));
        before - self.adapters.len()
    }

    pub fn get(&self, name: &str) -> Option<&AdapterSnapshot> {
        self.adapters.get(name)
    }

    /// Latest rates, zero for adapters never sampled.
    pub fn rates(&self, name: &str) -> Rates {
        self.adapters.get(name).map(|a| a.rates).unwrap_or_default()
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.adapters.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::testing::iface;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_first_sight_emits_zero_rates() {
        let mut sampler = RateSampler::new();
        let now = Instant::now();

        assert_eq!(sampler.upsert("eth0", 500, 300, now), Upsert::Created);
        let entry = sampler.get("eth0").unwrap();
        assert_eq!(entry.rates, Rates::default());
        assert_eq!(entry.bytes_sent, 500);
        assert_eq!(entry.bytes_received, 300);
    }

    #[test]
    fn test_one_second_delta() {
        let mut sampler = RateSampler::new();
        let t0 = Instant::now();
        sampler.upsert("eth0", 1_000_000, 5_000_000, t0);
        let outcome = sampler.upsert("eth0", 2_000_000, 7_000_000, t0 + Duration::from_secs(1));

        assert_eq!(outcome, Upsert::Updated);
        let rates = sampler.rates("eth0");
        assert!(approx(rates.up_mbps, 8.0));
        assert!(approx(rates.down_mbps, 16.0));
        assert!(approx(rates.total_mbps, 24.0));
        assert_eq!(rates.total_mbps, rates.up_mbps + rates.down_mbps);
    }

    #[test]
    fn test_counter_decrease_clamps_to_zero() {
        let mut sampler = RateSampler::new();
        let t0 = Instant::now();
        sampler.upsert("eth0", 10_000, 10_000, t0);
        sampler.upsert("eth0", 5, 20_000, t0 + Duration::from_secs(1));

        let rates = sampler.rates("eth0");
        assert_eq!(rates.up_mbps, 0.0);
        assert!(rates.down_mbps > 0.0);

        // baseline moved to the reset value
        sampler.upsert("eth0", 125_005, 20_000, t0 + Duration::from_secs(2));
        assert!(approx(sampler.rates("eth0").up_mbps, 1.0));
    }

    #[test]
    fn test_elapsed_is_floored() {
        let mut sampler = RateSampler::new();
        let t0 = Instant::now();
        sampler.upsert("eth0", 0, 0, t0);
        // same instant: dt floors to 50ms
        sampler.upsert("eth0", 6_250, 0, t0);
        assert!(approx(sampler.rates("eth0").up_mbps, 1.0));
    }

    #[test]
    fn test_total_is_sum_every_tick() {
        let mut sampler = RateSampler::new();
        let t0 = Instant::now();
        let mut sent = 0u64;
        let mut recv = 0u64;
        for tick in 0..20u64 {
            sent += tick * 1_337;
            recv += tick * 7_919;
            sampler.upsert("wlan0", sent, recv, t0 + Duration::from_millis(tick * 733));
            let r = sampler.rates("wlan0");
            assert_eq!(r.total_mbps, r.up_mbps + r.down_mbps);
            assert!(r.up_mbps >= 0.0 && r.down_mbps >= 0.0);
        }
    }

    #[test]
    fn test_sample_reports_new_adapters_and_retains_stale() {
        let mut sampler = RateSampler::new();
        let t0 = Instant::now();

        let created = sampler.sample(&[iface("eth0", 1, 1), iface("usb0", 1, 1)], t0);
        assert_eq!(created, vec!["eth0".to_string(), "usb0".to_string()]);

        let created = sampler.sample(&[iface("eth0", 2, 2)], t0 + Duration::from_secs(1));
        assert!(created.is_empty());
        assert_eq!(sampler.len(), 2);

        assert_eq!(sampler.prune(&[iface("eth0", 2, 2)]), 1);
        assert!(sampler.get("usb0").is_none());
    }

    #[test]
    fn test_unknown_adapter_reads_zero() {
        let sampler = RateSampler::new();
        assert_eq!(sampler.rates("nope"), Rates::default());
    }

    #[test]
    fn test_mib_conversion() {
        let mut sampler = RateSampler::new();
        sampler.upsert("eth0", 2 * 1024 * 1024, 1024 * 1024, Instant::now());
        let entry = sampler.get("eth0").unwrap();
        assert_eq!(entry.sent_mib(), 2.0);
        assert_eq!(entry.received_mib(), 1.0);
    }
}
