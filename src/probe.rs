// ABOUTME: Out-of-process latency probing through the system ping utility
// ABOUTME: Spawns one ping per probe on the runtime and reports results back over a bounded channel

use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::debug;

/// Round-trip milliseconds, or `None` for timeout, failure, or unparseable output.
pub type LatencyProbeResult = Option<u32>;

pub const PROBE_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeEvent {
    pub host: String,
    pub result: LatencyProbeResult,
    pub dispatched_at: Instant,
}

/// Fires probes without waiting on them.
#[derive(Debug, Clone)]
pub struct LatencyProber {
    event_tx: mpsc::Sender<ProbeEvent>,
}

impl LatencyProber {
    pub fn new(event_tx: mpsc::Sender<ProbeEvent>) -> Self {
        Self { event_tx }
    }

    pub fn channel() -> (Self, mpsc::Receiver<ProbeEvent>) {
        let (tx, rx) = mpsc::channel(PROBE_CHANNEL_CAPACITY);
        (Self::new(tx), rx)
    }

    /// Start one probe in the background. Earlier probes still in flight are
    /// left alone; whichever result arrives last is the one the engine keeps.
    pub fn dispatch(&self, host: &str, timeout: Duration) {
        let host = host.to_string();
        let event_tx = self.event_tx.clone();
        let dispatched_at = Instant::now();

        tokio::spawn(async move {
            let result = probe(&host, timeout).await;
            let event = ProbeEvent {
                host,
                result,
                dispatched_at,
            };
            if event_tx.send(event).await.is_err() {
                debug!("probe receiver dropped, discarding result");
            }
        });
    }
}

/// Run the platform ping once and parse its output.
pub async fn probe(host: &str, timeout: Duration) -> LatencyProbeResult {
    let mut cmd = ping_command(host, timeout);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            debug!(host, error = %e, "failed to launch ping");
            return None;
        }
    };

    // The ping flags bound the wait too, but some platforms only honour them loosely.
    let grace = timeout + Duration::from_millis(500);
    let output = match tokio::time::timeout(grace, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            debug!(host, error = %e, "ping did not complete");
            return None;
        }
        Err(_) => {
            debug!(host, timeout_ms = grace.as_millis() as u64, "ping timed out");
            return None;
        }
    };

    if !output.status.success() {
        debug!(host, status = %output.status, "ping exited unsuccessfully");
        return None;
    }

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));

    let parsed = parse_ping_output(&text);
    if parsed.is_none() {
        debug!(host, "no round-trip time in ping output");
    }
    parsed
}

fn ping_command(host: &str, timeout: Duration) -> Command {
    let timeout_ms = timeout.as_millis().max(1);
    let mut cmd = Command::new("ping");

    if cfg!(windows) {
        cmd.args(["-n", "1", "-w"]).arg(timeout_ms.to_string());
    } else if cfg!(target_os = "macos") {
        // -t is a whole-second deadline on BSD ping
        let secs = timeout_ms.div_ceil(1000).max(1);
        cmd.args(["-c", "1", "-t"]).arg(secs.to_string());
    } else {
        let secs = timeout_ms.div_ceil(1000).max(1);
        cmd.args(["-c", "1", "-W"]).arg(secs.to_string());
    }

    cmd.arg(host);
    cmd
}

/// Round-trip tokens: (prefix, unit). Matched after lowercasing and removing spaces.
const RTT_TOKENS: &[(&str, &str)] = &[("time=", "ms"), ("время=", "мс"), ("time<", "ms")];

/// Extract the first round-trip time from ping output, rounded to whole ms.
pub fn parse_ping_output(output: &str) -> LatencyProbeResult {
    let normalized: String = output
        .to_lowercase()
        .chars()
        .filter(|c| *c != ' ')
        .collect();

    for (prefix, unit) in RTT_TOKENS {
        let Some(idx) = normalized.find(prefix) else {
            continue;
        };
        let rest = &normalized[idx + prefix.len()..];
        let Some(end) = rest.find(unit) else {
            continue;
        };
        let value = rest[..end].replace('<', "");
        return match value.parse::<f64>() {
            Ok(ms) if ms.is_finite() && ms >= 0.0 => Some(ms.round() as u32),
            _ => None,
        };
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_linux_output() {
        let out = "PING 1.1.1.1 (1.1.1.1) 56(84) bytes of data.\n\
                   64 bytes from 1.1.1.1: icmp_seq=1 ttl=57 time=23 ms\n\n\
                   --- 1.1.1.1 ping statistics ---\n";
        assert_eq!(parse_ping_output(out), Some(23));
    }

    #[test]
    fn test_parse_compact_token() {
        assert_eq!(parse_ping_output("time=23ms"), Some(23));
    }

    #[test]
    fn test_parse_rounds_fractional_ms() {
        assert_eq!(parse_ping_output("64 bytes: time=12.6 ms"), Some(13));
        assert_eq!(parse_ping_output("64 bytes: time=0.041 ms"), Some(0));
    }

    #[test]
    fn test_parse_windows_output() {
        let out = "Reply from 1.1.1.1: bytes=32 time=14ms TTL=57";
        assert_eq!(parse_ping_output(out), Some(14));
        let out = "Reply from 127.0.0.1: bytes=32 time<1ms TTL=128";
        assert_eq!(parse_ping_output(out), Some(1));
    }

    #[test]
    fn test_parse_russian_output() {
        let out = "Ответ от 1.1.1.1: число байт=32 время=31мс TTL=57";
        assert_eq!(parse_ping_output(out), Some(31));
    }

    #[test]
    fn test_missing_token_is_absent_not_zero() {
        let out = "PING 10.255.255.1 (10.255.255.1) 56(84) bytes of data.\n\
                   --- 10.255.255.1 ping statistics ---\n\
                   1 packets transmitted, 0 received, 100% packet loss";
        assert_eq!(parse_ping_output(out), None);
        assert_eq!(parse_ping_output(""), None);
    }

    #[test]
    fn test_garbage_value_is_absent() {
        assert_eq!(parse_ping_output("time=abcms"), None);
        assert_eq!(parse_ping_output("time=12"), None);
    }

    #[test]
    fn test_command_has_single_count() {
        let cmd = ping_command("1.1.1.1", Duration::from_millis(800));
        let args: Vec<_> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args.last().map(String::as_str), Some("1.1.1.1"));
        assert!(args.iter().any(|a| a == "1"));
        assert_eq!(cmd.as_std().get_program(), "ping");
    }

    #[tokio::test]
    async fn test_probe_unresolvable_host_is_absent() {
        // Either ping is missing or the lookup fails; both must read as no result.
        let result = probe("host.invalid", Duration::from_millis(300)).await;
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_dispatch_delivers_event() {
        let (prober, mut rx) = LatencyProber::channel();
        prober.dispatch("host.invalid", Duration::from_millis(300));

        let event = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("probe event within deadline")
            .expect("channel open");
        assert_eq!(event.host, "host.invalid");
        assert_eq!(event.result, None);
    }
}
