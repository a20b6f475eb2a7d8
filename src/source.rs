// ABOUTME: Interface statistics source backed by sysinfo and Linux sysfs
// ABOUTME: Produces one snapshot of per-adapter counters, link state, and IPv4 bindings per poll

use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use sysinfo::Networks;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("no network interfaces reported by the OS")]
    NoInterfaces,
}

/// One interface as seen during a single poll.
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceSnapshot {
    pub name: String,
    pub is_up: bool,
    /// Reported link speed in Mbps, 0 when unknown.
    pub link_speed_mbps: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub ipv4: Vec<Ipv4Addr>,
}

/// Machine-wide cumulative byte counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GlobalCounters {
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsSnapshot {
    /// Interfaces in enumeration order.
    pub interfaces: Vec<InterfaceSnapshot>,
    pub global: GlobalCounters,
}

impl StatsSnapshot {
    pub fn contains(&self, name: &str) -> bool {
        self.interfaces.iter().any(|i| i.name == name)
    }
}

pub trait StatsSource: Send {
    fn poll(&mut self) -> Result<StatsSnapshot, SourceError>;
}

pub struct SysinfoSource {
    networks: Networks,
}

impl SysinfoSource {
    pub fn new() -> Self {
        Self {
            networks: Networks::new_with_refreshed_list(),
        }
    }
}

impl Default for SysinfoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsSource for SysinfoSource {
    fn poll(&mut self) -> Result<StatsSnapshot, SourceError> {
        // Picks up interfaces that appeared since the last poll and refreshes counters.
        self.networks.refresh_list();
        self.networks.refresh();

        let mut interfaces: Vec<InterfaceSnapshot> = self
            .networks
            .list()
            .iter()
            .map(|(name, data)| {
                let ipv4: Vec<Ipv4Addr> = data
                    .ip_networks()
                    .iter()
                    .filter_map(|net| match net.addr {
                        IpAddr::V4(v4) => Some(v4),
                        IpAddr::V6(_) => None,
                    })
                    .collect();
                let (is_up, link_speed_mbps) = link_state(name, !ipv4.is_empty());

                InterfaceSnapshot {
                    name: name.clone(),
                    is_up,
                    link_speed_mbps,
                    bytes_sent: data.total_transmitted(),
                    bytes_received: data.total_received(),
                    ipv4,
                }
            })
            .collect();

        if interfaces.is_empty() {
            return Err(SourceError::NoInterfaces);
        }

        // sysinfo hands back a hash map; sort so enumeration order is stable between polls.
        interfaces.sort_by(|a, b| a.name.cmp(&b.name));

        let global = interfaces.iter().fold(GlobalCounters::default(), |acc, i| {
            GlobalCounters {
                bytes_sent: acc.bytes_sent.saturating_add(i.bytes_sent),
                bytes_received: acc.bytes_received.saturating_add(i.bytes_received),
            }
        });

        Ok(StatsSnapshot { interfaces, global })
    }
}

/// Link state and speed from `/sys/class/net/<iface>`.
///
/// Where sysfs is missing, an interface counts as up when it has an IPv4
/// address bound and its speed is unknown.
fn link_state(iface: &str, has_ipv4: bool) -> (bool, u64) {
    let base = Path::new("/sys/class/net").join(iface);
    if !base.exists() {
        return (has_ipv4, 0);
    }

    let operstate = read_sysfs(&base.join("operstate")).unwrap_or_default();
    let carrier = read_sysfs(&base.join("carrier")).unwrap_or_default();
    let is_up = parse_operstate(&operstate, &carrier);

    let speed = read_sysfs(&base.join("speed"))
        .as_deref()
        .map(parse_link_speed)
        .unwrap_or(0);

    (is_up, speed)
}

fn read_sysfs(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(s) => Some(s.trim().to_string()),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "sysfs attribute unavailable");
            None
        }
    }
}

/// Loopback and many virtual devices report `unknown` with a live carrier.
pub(crate) fn parse_operstate(operstate: &str, carrier: &str) -> bool {
    operstate == "up" || (operstate == "unknown" && carrier == "1")
}

/// sysfs reports Mbps, or -1 when the driver does not know (e.g. Wi-Fi).
pub(crate) fn parse_link_speed(raw: &str) -> u64 {
    match raw.trim().parse::<i64>() {
        Ok(v) if v > 0 && v < 1_000_000 => v as u64,
        _ => 0,
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Replays queued snapshots; an empty queue polls as `NoInterfaces`.
    #[derive(Clone, Default)]
    pub struct ScriptedSource {
        queue: Arc<Mutex<VecDeque<StatsSnapshot>>>,
    }

    impl ScriptedSource {
        pub fn push(&self, snapshot: StatsSnapshot) {
            self.queue.lock().unwrap().push_back(snapshot);
        }
    }

    impl StatsSource for ScriptedSource {
        fn poll(&mut self) -> Result<StatsSnapshot, SourceError> {
            self.queue
                .lock()
                .unwrap()
                .pop_front()
                .ok_or(SourceError::NoInterfaces)
        }
    }

    pub fn iface(name: &str, sent: u64, recv: u64) -> InterfaceSnapshot {
        InterfaceSnapshot {
            name: name.to_string(),
            is_up: true,
            link_speed_mbps: 1000,
            bytes_sent: sent,
            bytes_received: recv,
            ipv4: vec![Ipv4Addr::new(192, 168, 1, 10)],
        }
    }

    pub fn snapshot(interfaces: Vec<InterfaceSnapshot>) -> StatsSnapshot {
        let global = GlobalCounters {
            bytes_sent: interfaces.iter().map(|i| i.bytes_sent).sum(),
            bytes_received: interfaces.iter().map(|i| i.bytes_received).sum(),
        };
        StatsSnapshot { interfaces, global }
    }
}
