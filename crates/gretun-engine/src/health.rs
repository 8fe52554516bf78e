//! Three-step tunnel health probe
//!
//! Run on one endpoint at a time: kernel module loaded, peer address bound
//! on the GRE interface, then a four-packet ping across the inner /30.
//! A probe failure on an early step skips the rest.

use regex_lite::Regex;
use tracing::debug;

use gretun_core::types::{Endpoint, Role};
use gretun_remote::RemoteExecutor;

/// Outcome of probing one side of a tunnel
#[derive(Debug, Clone, PartialEq)]
pub enum HealthStatus {
    /// All three steps passed with zero packet loss and a parsed average RTT
    Connected { rtt_ms: f64 },
    /// The ping ran but showed loss, or its output could not be parsed
    Disconnected { detail: String },
    /// A probe step could not run or a precondition failed
    Error { detail: String },
}

/// Probe one endpoint. Steps run in order and the first failure decides the
/// status.
pub async fn check_endpoint(
    executor: &dyn RemoteExecutor,
    endpoint: &Endpoint,
    role: Role,
) -> HealthStatus {
    let peer_v4 = role.peer().inner_v4();

    // Step 1: the ip6gre module must be loaded
    let out = match run(executor, endpoint, "lsmod | grep ip6gre").await {
        Ok(out) => out,
        Err(detail) => return HealthStatus::Error { detail },
    };
    if out.trim().is_empty() {
        return HealthStatus::Error {
            detail: format!("ip6gre module not loaded on {}", endpoint.host),
        };
    }

    // Step 2: the GRE interface must carry a route to the peer address
    let iface_cmd = format!("ip addr show {} | grep {}", role.gre_interface(), peer_v4);
    let out = match run(executor, endpoint, &iface_cmd).await {
        Ok(out) => out,
        Err(detail) => return HealthStatus::Error { detail },
    };
    if out.trim().is_empty() {
        return HealthStatus::Error {
            detail: format!(
                "interface {} has no peer {} on {}",
                role.gre_interface(),
                peer_v4,
                endpoint.host
            ),
        };
    }

    // Step 3: ping the peer across the tunnel
    let ping_cmd = format!("ping -c 4 {}", peer_v4);
    match run(executor, endpoint, &ping_cmd).await {
        Ok(out) => parse_ping(&out),
        Err(detail) => HealthStatus::Error { detail },
    }
}

async fn run(
    executor: &dyn RemoteExecutor,
    endpoint: &Endpoint,
    command: &str,
) -> Result<String, String> {
    debug!(host = %endpoint.host, command, "Health probe step");
    executor
        .execute(&endpoint.host, &endpoint.username, &endpoint.password, command)
        .await
        .map_err(|e| e.to_string())
}

/// Interpret ping output. Connected requires both zero loss and a parsed
/// average RTT; zero loss with unparsable timings still reads as
/// disconnected.
pub(crate) fn parse_ping(output: &str) -> HealthStatus {
    if output.trim().is_empty() {
        return HealthStatus::Error {
            detail: "ping produced no output".to_string(),
        };
    }

    // Patterns are fixed literals, compilation cannot fail.
    let loss_re = match Regex::new(r"(\d+)% packet loss") {
        Ok(re) => re,
        Err(_) => {
            return HealthStatus::Error {
                detail: "internal pattern error".to_string(),
            }
        }
    };

    let loss: Option<u32> = loss_re
        .captures(output)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok());

    match loss {
        Some(0) => match parse_avg_rtt(output) {
            Some(rtt_ms) => HealthStatus::Connected { rtt_ms },
            None => HealthStatus::Disconnected {
                detail: "zero loss but no rtt summary".to_string(),
            },
        },
        Some(pct) => HealthStatus::Disconnected {
            detail: format!("{}% packet loss", pct),
        },
        None => HealthStatus::Disconnected {
            detail: "unrecognized ping output".to_string(),
        },
    }
}

fn parse_avg_rtt(output: &str) -> Option<f64> {
    let rtt_re = Regex::new(r"rtt min/avg/max/mdev = [0-9.]+/([0-9.]+)/").ok()?;
    rtt_re
        .captures(output)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PING_OK: &str = "\
PING 172.20.40.2 (172.20.40.2) 56(84) bytes of data.
64 bytes from 172.20.40.2: icmp_seq=1 ttl=64 time=12.1 ms
64 bytes from 172.20.40.2: icmp_seq=4 ttl=64 time=12.5 ms

--- 172.20.40.2 ping statistics ---
4 packets transmitted, 4 received, 0% packet loss, time 3004ms
rtt min/avg/max/mdev = 11.918/12.310/12.877/0.361 ms
";

    const PING_LOSS: &str = "\
--- 172.20.40.2 ping statistics ---
4 packets transmitted, 1 received, 75% packet loss, time 3052ms
rtt min/avg/max/mdev = 11.918/11.918/11.918/0.000 ms
";

    const PING_TOTAL_LOSS: &str = "\
--- 172.20.40.2 ping statistics ---
4 packets transmitted, 0 received, 100% packet loss, time 3101ms
";

    #[test]
    fn test_parse_clean_ping() {
        assert_eq!(
            parse_ping(PING_OK),
            HealthStatus::Connected { rtt_ms: 12.310 }
        );
    }

    #[test]
    fn test_parse_partial_loss() {
        assert_eq!(
            parse_ping(PING_LOSS),
            HealthStatus::Disconnected {
                detail: "75% packet loss".to_string()
            }
        );
    }

    #[test]
    fn test_parse_total_loss() {
        assert_eq!(
            parse_ping(PING_TOTAL_LOSS),
            HealthStatus::Disconnected {
                detail: "100% packet loss".to_string()
            }
        );
    }

    #[test]
    fn test_zero_loss_without_rtt_is_disconnected() {
        let out = "4 packets transmitted, 4 received, 0% packet loss, time 3004ms\n";
        assert!(matches!(
            parse_ping(out),
            HealthStatus::Disconnected { .. }
        ));
    }

    #[test]
    fn test_garbage_output_is_disconnected() {
        assert!(matches!(
            parse_ping("connect: Network is unreachable\n"),
            HealthStatus::Disconnected { .. }
        ));
    }

    #[test]
    fn test_empty_output_is_error() {
        assert!(matches!(parse_ping("  \n"), HealthStatus::Error { .. }));
    }
}
