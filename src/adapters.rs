// ABOUTME: Adapter enumeration and active-adapter selection
// ABOUTME: Scores up interfaces by bound IPv4 addresses and link speed, skipping loopback and virtual devices

use std::fmt;
use std::net::Ipv4Addr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::source::{InterfaceSnapshot, StatsSnapshot};

/// Reported when no interface is up.
pub const NO_NETWORK: &str = "no network";

const DENY_SUBSTRINGS: &[&str] = &[
    "virtual",
    "vmware",
    "hyper-v",
    "vbox",
    "loopback",
    "tunnel",
    "tap",
    "tun",
    "vpn",
    "wintun",
    "wireguard",
];

/// All adapter names in the snapshot, sorted for stable listing.
pub fn list_adapters(snapshot: &StatsSnapshot) -> Vec<String> {
    let mut names: Vec<String> = snapshot.interfaces.iter().map(|i| i.name.clone()).collect();
    names.sort();
    names.dedup();
    names
}

pub fn is_excluded(name: &str) -> bool {
    let low = name.to_lowercase();
    low.starts_with("lo") || DENY_SUBSTRINGS.iter().any(|d| low.contains(d))
}

fn score(iface: &InterfaceSnapshot) -> f64 {
    let bound = iface
        .ipv4
        .iter()
        .filter(|ip| **ip != Ipv4Addr::LOCALHOST)
        .count();
    10.0 * bound as f64 + iface.link_speed_mbps as f64 / 10.0
}

/// Pick the interface most likely to carry internet traffic.
pub fn pick_active_adapter(interfaces: &[InterfaceSnapshot]) -> String {
    let mut best: Option<(f64, &InterfaceSnapshot)> = None;

    for iface in interfaces.iter().filter(|i| i.is_up && !is_excluded(&i.name)) {
        let s = score(iface);
        // Strictly greater keeps the earlier interface on ties.
        if best.map_or(true, |(top, _)| s > top) {
            best = Some((s, iface));
        }
    }

    if let Some((_, iface)) = best {
        return iface.name.clone();
    }

    interfaces
        .iter()
        .find(|i| i.is_up)
        .map(|i| i.name.clone())
        .unwrap_or_else(|| NO_NETWORK.to_string())
}

/// A configured adapter choice: the current active adapter or a literal name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AdapterSelector {
    #[default]
    Active,
    Named(String),
}

impl AdapterSelector {
    pub fn parse(value: &str) -> Self {
        let v = value.trim();
        if v.is_empty() || v.eq_ignore_ascii_case("active") {
            AdapterSelector::Active
        } else {
            AdapterSelector::Named(v.to_string())
        }
    }
}

impl fmt::Display for AdapterSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterSelector::Active => f.write_str("active"),
            AdapterSelector::Named(name) => f.write_str(name),
        }
    }
}

impl Serialize for AdapterSelector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AdapterSelector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(AdapterSelector::parse(&raw))
    }
}

/// Resolve a selector against the adapters currently reported.
///
/// Names the OS no longer reports (renamed or unplugged since the config was
/// written) fall back to the active adapter.
pub fn resolve_adapter(selector: &AdapterSelector, active: &str, snapshot: &StatsSnapshot) -> String {
    match selector {
        AdapterSelector::Named(name) if snapshot.contains(name) => name.clone(),
        _ => active.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::testing::{iface, snapshot};

    fn up(name: &str, speed: u64, ips: &[Ipv4Addr]) -> InterfaceSnapshot {
        InterfaceSnapshot {
            name: name.to_string(),
            is_up: true,
            link_speed_mbps: speed,
            bytes_sent: 0,
            bytes_received: 0,
            ipv4: ips.to_vec(),
        }
    }

    const LAN: Ipv4Addr = Ipv4Addr::new(192, 168, 0, 2);

    #[test]
    fn test_list_adapters_sorted() {
        let snap = snapshot(vec![iface("wlan0", 0, 0), iface("eth0", 0, 0), iface("docker0", 0, 0)]);
        assert_eq!(list_adapters(&snap), vec!["docker0", "eth0", "wlan0"]);
    }

    #[test]
    fn test_loopback_never_wins() {
        let ifaces = vec![
            up("Loopback Pseudo-Interface 1", 100_000, &[Ipv4Addr::LOCALHOST, LAN]),
            up("eth0", 0, &[]),
        ];
        assert_eq!(pick_active_adapter(&ifaces), "eth0");

        let ifaces = vec![up("lo", 10_000, &[LAN]), up("wlan0", 1, &[])];
        assert_eq!(pick_active_adapter(&ifaces), "wlan0");
    }

    #[test]
    fn test_deny_list_is_case_insensitive() {
        for name in ["VMware Network Adapter", "vEthernet (Hyper-V)", "tun0", "WireGuard", "OpenVPN TAP"] {
            assert!(is_excluded(name), "{name} should be excluded");
        }
        assert!(!is_excluded("eth0"));
        assert!(!is_excluded("Wi-Fi"));
    }

    #[test]
    fn test_ipv4_count_dominates_small_speed_gap() {
        let ifaces = vec![up("eth0", 100, &[]), up("wlan0", 0, &[LAN])];
        // eth0: 10.0, wlan0: 10.0 -> tie, enumeration order wins
        assert_eq!(pick_active_adapter(&ifaces), "eth0");

        let ifaces = vec![up("eth0", 90, &[]), up("wlan0", 0, &[LAN])];
        assert_eq!(pick_active_adapter(&ifaces), "wlan0");
    }

    #[test]
    fn test_localhost_address_not_scored() {
        let ifaces = vec![up("eth0", 0, &[Ipv4Addr::LOCALHOST]), up("eth1", 0, &[LAN])];
        assert_eq!(pick_active_adapter(&ifaces), "eth1");
    }

    #[test]
    fn test_fallback_to_any_up_then_sentinel() {
        let mut down = up("eth0", 1000, &[LAN]);
        down.is_up = false;
        let ifaces = vec![down.clone(), up("tun0", 0, &[])];
        assert_eq!(pick_active_adapter(&ifaces), "tun0");

        assert_eq!(pick_active_adapter(&[down]), NO_NETWORK);
        assert_eq!(pick_active_adapter(&[]), NO_NETWORK);
    }

    #[test]
    fn test_selector_parse_and_display() {
        assert_eq!(AdapterSelector::parse("active"), AdapterSelector::Active);
        assert_eq!(AdapterSelector::parse(""), AdapterSelector::Active);
        assert_eq!(AdapterSelector::parse(" eth0 "), AdapterSelector::Named("eth0".into()));
        assert_eq!(AdapterSelector::Named("eth0".into()).to_string(), "eth0");
        assert_eq!(AdapterSelector::Active.to_string(), "active");
    }

    #[test]
    fn test_resolve_unknown_name_falls_back_to_active() {
        let snap = snapshot(vec![iface("eth0", 0, 0), iface("wlan0", 0, 0)]);
        assert_eq!(resolve_adapter(&AdapterSelector::Active, "eth0", &snap), "eth0");
        assert_eq!(
            resolve_adapter(&AdapterSelector::Named("wlan0".into()), "eth0", &snap),
            "wlan0"
        );
        assert_eq!(
            resolve_adapter(&AdapterSelector::Named("usb0".into()), "eth0", &snap),
            "eth0"
        );
    }
}
