//! Protocol classification over a decoded header stack

use wirelens_core::{Protocol, UNKNOWN_ADDRESS};

use crate::decode::{ArpHeader, HeaderStack};

/// Classifier output for one frame, consumed by the snapshot builder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedHeaders {
    pub protocol: Protocol,
    pub source: String,
    pub destination: String,
    pub description: String,
}

/// Classify a decoded frame.
///
/// IPv4 wins over IPv6, which wins over ARP. Anything else is reported under
/// the name of its highest layer (`RAW` for trailing undecoded bytes) with
/// unknown addresses.
pub fn classify(stack: &HeaderStack) -> ClassifiedHeaders {
    if let Some(ip) = stack.first_ipv4() {
        let (protocol, description) = describe_transport(stack, ip.protocol);
        return ClassifiedHeaders {
            protocol,
            source: ip.source.to_string(),
            destination: ip.destination.to_string(),
            description,
        };
    }

    if let Some(ip) = stack.first_ipv6() {
        let (protocol, description) = describe_transport(stack, ip.next_header);
        return ClassifiedHeaders {
            protocol,
            source: ip.source.to_string(),
            destination: ip.destination.to_string(),
            description,
        };
    }

    if let Some(arp) = stack.arp() {
        return ClassifiedHeaders {
            protocol: Protocol::Arp,
            source: arp.sender_proto.to_string(),
            destination: arp.target_proto.to_string(),
            description: describe_arp(arp),
        };
    }

    let protocol = stack
        .highest_layer()
        .map(|l| Protocol::Other(l.name().to_string()))
        .unwrap_or_default();

    ClassifiedHeaders {
        protocol,
        source: UNKNOWN_ADDRESS.to_string(),
        destination: UNKNOWN_ADDRESS.to_string(),
        description: stack.summary(),
    }
}

/// Describe the transport layer of an IP frame.
///
/// Priority is TCP, then UDP, then ICMP. With none of them decoded the
/// protocol comes from `fallback` (the IP protocol / next-header number) and
/// the description is the generic stack rendering.
pub fn describe_transport(stack: &HeaderStack, fallback: u8) -> (Protocol, String) {
    if let Some(tcp) = stack.tcp() {
        return (
            Protocol::Tcp,
            format!(
                "TCP {} -> {} len={} flags={}",
                tcp.source_port,
                tcp.destination_port,
                tcp.segment_len,
                format_tcp_flags(tcp.flags)
            ),
        );
    }

    if let Some(udp) = stack.udp() {
        return (
            Protocol::Udp,
            format!(
                "UDP {} -> {} len={}",
                udp.source_port, udp.destination_port, udp.datagram_len
            ),
        );
    }

    if let Some(icmp) = stack.icmp() {
        return (
            Protocol::Icmp,
            format!("ICMP type={} code={}", icmp.icmp_type, icmp.code),
        );
    }

    (Protocol::from_ip_number(fallback), stack.summary())
}

fn describe_arp(arp: &ArpHeader) -> String {
    let operation = match arp.operation {
        1 => "request".to_string(),
        2 => "reply".to_string(),
        op => op.to_string(),
    };
    format!(
        "ARP {} {} ({}) -> {} ({})",
        operation, arp.sender_hw, arp.sender_proto, arp.target_hw, arp.target_proto
    )
}

// ── TCP Flag Formatting ──────────────────────────────────────────────────────

/// Render TCP flag bits as letters, lowest bit first. No flags renders empty.
pub fn format_tcp_flags(raw: u8) -> String {
    const LETTERS: [(u8, char); 8] = [
        (0x01, 'F'), // FIN
        (0x02, 'S'), // SYN
        (0x04, 'R'), // RST
        (0x08, 'P'), // PSH
        (0x10, 'A'), // ACK
        (0x20, 'U'), // URG
        (0x40, 'E'), // ECE
        (0x80, 'C'), // CWR
    ];

    LETTERS
        .iter()
        .filter(|(bit, _)| raw & bit != 0)
        .map(|(_, letter)| *letter)
        .collect()
}
