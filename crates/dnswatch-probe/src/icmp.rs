//! ICMP echo probe over a raw socket.
//!
//! Needs `CAP_NET_RAW` (or root). Failing to open the socket is a transient
//! error like any other network fault, so an unprivileged watcher reports
//! ICMP targets dead instead of stopping.

use async_trait::async_trait;
use dnswatch_core::TargetSpec;
use socket2::{Domain, Protocol as SocketProtocol, Socket, Type};
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{ProbeError, ProbeResult};
use crate::prober::{Prober, Verdict};

/// Payload carried by every echo request
pub const ECHO_PAYLOAD: &[u8] = b"dnswatch liveness probe";

const ECHO_REQUEST_V4: u8 = 8;
const ECHO_REPLY_V4: u8 = 0;
const ECHO_REQUEST_V6: u8 = 128;
const ECHO_REPLY_V6: u8 = 129;
const RECV_BUFFER: usize = 1500;

/// Process-wide echo sequence counter shared by every ICMP probe
static SEQUENCE: AtomicU32 = AtomicU32::new(0);

#[allow(clippy::cast_possible_truncation)]
fn next_sequence() -> u16 {
    (SEQUENCE.fetch_add(1, Ordering::Relaxed) & 0xFFFF) as u16
}

/// Prober for `icmp` targets; `dest` is an IP address or host name
#[derive(Debug, Clone, Copy)]
pub struct IcmpProber {
    identifier: u16,
}

impl Default for IcmpProber {
    fn default() -> Self {
        Self::new()
    }
}

impl IcmpProber {
    /// Create a prober identifying its echoes with the process id
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn new() -> Self {
        Self {
            identifier: (std::process::id() & 0xFFFF) as u16,
        }
    }

    /// Echo identifier used by this prober
    #[must_use]
    pub const fn identifier(&self) -> u16 {
        self.identifier
    }
}

#[async_trait]
impl Prober for IcmpProber {
    async fn attempt(&self, spec: &TargetSpec, deadline: Instant) -> ProbeResult<Verdict> {
        let ip = resolve(&spec.dest).await?;
        let socket = open(ip)?;
        let sequence = next_sequence();
        let request = encode_echo(ip, self.identifier, sequence, ECHO_PAYLOAD);
        socket.send_to(&request, SocketAddr::new(ip, 0)).await?;

        let mut buf = [0u8; RECV_BUFFER];
        loop {
            let (len, _peer) = tokio::time::timeout_at(deadline, socket.recv_from(&mut buf))
                .await
                .map_err(|_| ProbeError::Timeout(spec.timeout))??;
            match parse_echo_reply(ip, &buf[..len]) {
                Some(echo) if echo == (self.identifier, sequence) => {
                    debug!(target_name = %spec.name, %ip, sequence, "echo reply");
                    return Ok(Verdict::Alive);
                }
                // Someone else's reply or another ICMP type; keep reading.
                _ => continue,
            }
        }
    }
}

async fn resolve(dest: &str) -> ProbeResult<IpAddr> {
    if let Ok(ip) = dest.parse::<IpAddr>() {
        return Ok(ip);
    }
    tokio::net::lookup_host((dest, 0))
        .await
        .map_err(|_| ProbeError::Resolve(dest.to_string()))?
        .next()
        .map(|addr| addr.ip())
        .ok_or_else(|| ProbeError::Resolve(dest.to_string()))
}

fn open(ip: IpAddr) -> ProbeResult<UdpSocket> {
    let (domain, protocol) = match ip {
        IpAddr::V4(_) => (Domain::IPV4, SocketProtocol::ICMPV4),
        IpAddr::V6(_) => (Domain::IPV6, SocketProtocol::ICMPV6),
    };
    let socket = Socket::new(domain, Type::RAW, Some(protocol))
        .map_err(|e| ProbeError::Socket(e.to_string()))?;
    socket
        .set_nonblocking(true)
        .map_err(|e| ProbeError::Socket(e.to_string()))?;
    let socket: std::net::UdpSocket = socket.into();
    Ok(UdpSocket::from_std(socket)?)
}

/// Build an echo request for the address family of `ip`.
///
/// The ICMPv6 checksum covers a pseudo-header and is filled in by the
/// kernel; the ICMPv4 checksum is computed here.
fn encode_echo(ip: IpAddr, identifier: u16, sequence: u16, payload: &[u8]) -> Vec<u8> {
    let kind = if ip.is_ipv6() {
        ECHO_REQUEST_V6
    } else {
        ECHO_REQUEST_V4
    };
    let mut packet = Vec::with_capacity(8 + payload.len());
    packet.extend_from_slice(&[kind, 0, 0, 0]);
    packet.extend_from_slice(&identifier.to_be_bytes());
    packet.extend_from_slice(&sequence.to_be_bytes());
    packet.extend_from_slice(payload);
    if ip.is_ipv4() {
        let sum = checksum(&packet);
        packet[2..4].copy_from_slice(&sum.to_be_bytes());
    }
    packet
}

/// Extract `(identifier, sequence)` from an echo reply.
///
/// Raw ICMPv4 sockets deliver the IP header in front of the message.
fn parse_echo_reply(ip: IpAddr, datagram: &[u8]) -> Option<(u16, u16)> {
    let (message, reply) = if ip.is_ipv4() {
        let first = *datagram.first()?;
        let header = if first >> 4 == 4 {
            usize::from(first & 0x0f) * 4
        } else {
            0
        };
        (datagram.get(header..)?, ECHO_REPLY_V4)
    } else {
        (datagram, ECHO_REPLY_V6)
    };
    if message.len() < 8 || message[0] != reply || message[1] != 0 {
        return None;
    }
    Some((
        u16::from_be_bytes([message[4], message[5]]),
        u16::from_be_bytes([message[6], message[7]]),
    ))
}

/// RFC 1071 internet checksum
#[allow(clippy::cast_possible_truncation)]
fn checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = data
        .chunks(2)
        .map(|pair| match pair {
            [hi, lo] => u32::from(u16::from_be_bytes([*hi, *lo])),
            [hi] => u32::from(*hi) << 8,
            _ => 0,
        })
        .sum();
    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dnswatch_core::Protocol;
    use std::net::{Ipv4Addr, Ipv6Addr};
    use std::time::Duration;

    const V4: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
    const V6: IpAddr = IpAddr::V6(Ipv6Addr::LOCALHOST);

    #[test]
    fn test_checksum_verifies() {
        let packet = encode_echo(V4, 0x1234, 7, b"abc");
        assert_eq!(packet[0], ECHO_REQUEST_V4);
        assert_eq!(checksum(&packet), 0);
    }

    #[test]
    fn test_checksum_known_value() {
        // Type 8, id 1, seq 1, no payload.
        let packet = encode_echo(V4, 1, 1, b"");
        assert_eq!(&packet[2..4], &[0xf7, 0xfd]);
    }

    #[test]
    fn test_v6_request_leaves_checksum_to_kernel() {
        let packet = encode_echo(V6, 1, 2, b"x");
        assert_eq!(packet[0], ECHO_REQUEST_V6);
        assert_eq!(&packet[2..4], &[0, 0]);
        assert_eq!(&packet[4..8], &[0, 1, 0, 2]);
    }

    #[test]
    fn test_parse_v4_reply_strips_ip_header() {
        let mut reply = encode_echo(V4, 0xbeef, 42, b"payload");
        reply[0] = ECHO_REPLY_V4;
        let mut datagram = vec![0x45u8];
        datagram.extend_from_slice(&[0; 19]);
        datagram.extend_from_slice(&reply);
        assert_eq!(parse_echo_reply(V4, &datagram), Some((0xbeef, 42)));
    }

    #[test]
    fn test_parse_ignores_other_types() {
        let request = encode_echo(V4, 1, 1, b"");
        assert_eq!(parse_echo_reply(V4, &request), None);

        let mut unreachable = encode_echo(V6, 1, 1, b"");
        unreachable[0] = 1;
        assert_eq!(parse_echo_reply(V6, &unreachable), None);

        let mut reply = encode_echo(V6, 9, 10, b"");
        reply[0] = ECHO_REPLY_V6;
        assert_eq!(parse_echo_reply(V6, &reply), Some((9, 10)));
        assert_eq!(parse_echo_reply(V6, &reply[..6]), None);
    }

    #[test]
    fn test_sequence_is_shared_and_increasing() {
        let a = next_sequence();
        let b = next_sequence();
        assert_eq!(b, a.wrapping_add(1));
    }

    #[tokio::test]
    async fn test_unresolvable_host_is_dead() {
        let spec = TargetSpec::new("a", Protocol::Icmp, "host.invalid")
            .timeout(Duration::from_millis(200));
        assert!(!IcmpProber::new().is_alive(&spec).await);
    }

    #[tokio::test]
    #[ignore = "needs CAP_NET_RAW"]
    async fn test_ping_loopback() {
        let spec = TargetSpec::new("lo", Protocol::Icmp, "127.0.0.1").timeout(Duration::from_secs(1));
        assert!(IcmpProber::new().is_alive(&spec).await);
    }
}
