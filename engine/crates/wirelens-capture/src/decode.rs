//! Layered frame decoding
//!
//! A captured Ethernet frame is parsed once into a [`HeaderStack`]: the ordered
//! list of headers found in it, outermost first. Classification and filtering
//! both work from the stack and never re-parse the raw bytes.
//!
//! Decoding never fails. A truncated or malformed header ends the stack and
//! whatever bytes remain are recorded as a [`Layer::Payload`].

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use pnet::packet::arp::ArpPacket;
use pnet::packet::ethernet::{EtherTypes, EthernetPacket};
use pnet::packet::icmp::IcmpPacket;
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::ipv6::Ipv6Packet;
use pnet::packet::tcp::TcpPacket;
use pnet::packet::udp::UdpPacket;
use pnet::packet::vlan::VlanPacket;
use pnet::packet::Packet;
use pnet::util::MacAddr;

/// Nested IP-in-IP headers decoded before giving up
const MAX_IP_DEPTH: usize = 4;

/// Stacked 802.1Q / 802.1ad tags decoded before giving up
const MAX_VLAN_DEPTH: usize = 2;

/// IPv6 extension headers walked before giving up
const MAX_IPV6_EXTENSIONS: usize = 8;

const ETHERTYPE_QINQ: u16 = 0x88a8;
const IPV4_MIN_HEADER_LEN: usize = 20;
const TCP_MIN_HEADER_LEN: usize = 20;

// ── Header types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthernetHeader {
    pub source: MacAddr,
    pub destination: MacAddr,
    pub ethertype: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VlanHeader {
    pub id: u16,
    pub ethertype: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Header {
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
    /// Protocol number field, used as the fallback identity
    pub protocol: u8,
    pub ttl: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv6Header {
    pub source: Ipv6Addr,
    pub destination: Ipv6Addr,
    /// Next-header field of the fixed header (before extension headers)
    pub next_header: u8,
    pub hop_limit: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpHeader {
    pub operation: u16,
    pub sender_hw: MacAddr,
    pub sender_proto: Ipv4Addr,
    pub target_hw: MacAddr,
    pub target_proto: Ipv4Addr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpHeader {
    pub source_port: u16,
    pub destination_port: u16,
    pub flags: u8,
    /// Header plus payload
    pub segment_len: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpHeader {
    pub source_port: u16,
    pub destination_port: u16,
    /// Header plus payload
    pub datagram_len: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IcmpHeader {
    pub icmp_type: u8,
    pub code: u8,
}

/// One decoded protocol layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layer {
    Ethernet(EthernetHeader),
    Vlan(VlanHeader),
    Ipv4(Ipv4Header),
    Ipv6(Ipv6Header),
    Arp(ArpHeader),
    Tcp(TcpHeader),
    Udp(UdpHeader),
    Icmp(IcmpHeader),
    /// Bytes that were not decoded further
    Payload { len: usize },
}

impl Layer {
    /// Short layer name as shown in generic summaries
    pub fn name(&self) -> &'static str {
        match self {
            Layer::Ethernet(_) => "Ether",
            Layer::Vlan(_) => "802.1Q",
            Layer::Ipv4(_) => "IP",
            Layer::Ipv6(_) => "IPv6",
            Layer::Arp(_) => "ARP",
            Layer::Tcp(_) => "TCP",
            Layer::Udp(_) => "UDP",
            Layer::Icmp(_) => "ICMP",
            Layer::Payload { .. } => "Raw",
        }
    }

    fn render(&self) -> String {
        match self {
            Layer::Ethernet(h) => format!(
                "Ether {} > {} type=0x{:04x}",
                h.source, h.destination, h.ethertype
            ),
            Layer::Vlan(h) => format!("802.1Q vlan={} type=0x{:04x}", h.id, h.ethertype),
            Layer::Ipv4(h) => format!("IP {} > {} proto={}", h.source, h.destination, h.protocol),
            Layer::Ipv6(h) => format!("IPv6 {} > {} nh={}", h.source, h.destination, h.next_header),
            Layer::Arp(h) => format!(
                "ARP op={} {} > {}",
                h.operation, h.sender_proto, h.target_proto
            ),
            Layer::Tcp(h) => format!("TCP {} > {}", h.source_port, h.destination_port),
            Layer::Udp(h) => format!("UDP {} > {}", h.source_port, h.destination_port),
            Layer::Icmp(h) => format!("ICMP type={} code={}", h.icmp_type, h.code),
            Layer::Payload { len } => format!("Raw {} bytes", len),
        }
    }
}

// ── Header stack ─────────────────────────────────────────────────────────────

/// Ordered decode result of one frame, outermost layer first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderStack {
    layers: Vec<Layer>,
    captured_len: usize,
}

impl HeaderStack {
    /// Build a stack from already-decoded layers.
    pub fn from_layers(layers: Vec<Layer>, captured_len: usize) -> Self {
        Self {
            layers,
            captured_len,
        }
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn captured_len(&self) -> usize {
        self.captured_len
    }

    pub fn highest_layer(&self) -> Option<&Layer> {
        self.layers.last()
    }

    pub fn first_ipv4(&self) -> Option<&Ipv4Header> {
        self.layers.iter().find_map(|l| match l {
            Layer::Ipv4(h) => Some(h),
            _ => None,
        })
    }

    pub fn first_ipv6(&self) -> Option<&Ipv6Header> {
        self.layers.iter().find_map(|l| match l {
            Layer::Ipv6(h) => Some(h),
            _ => None,
        })
    }

    pub fn arp(&self) -> Option<&ArpHeader> {
        self.layers.iter().find_map(|l| match l {
            Layer::Arp(h) => Some(h),
            _ => None,
        })
    }

    pub fn tcp(&self) -> Option<&TcpHeader> {
        self.layers.iter().find_map(|l| match l {
            Layer::Tcp(h) => Some(h),
            _ => None,
        })
    }

    pub fn udp(&self) -> Option<&UdpHeader> {
        self.layers.iter().find_map(|l| match l {
            Layer::Udp(h) => Some(h),
            _ => None,
        })
    }

    pub fn icmp(&self) -> Option<&IcmpHeader> {
        self.layers.iter().find_map(|l| match l {
            Layer::Icmp(h) => Some(h),
            _ => None,
        })
    }

    pub fn has_vlan(&self) -> bool {
        self.layers.iter().any(|l| matches!(l, Layer::Vlan(_)))
    }

    /// Source and destination of the outermost IP header
    pub fn ip_endpoints(&self) -> Option<(IpAddr, IpAddr)> {
        self.layers.iter().find_map(|l| match l {
            Layer::Ipv4(h) => Some((IpAddr::V4(h.source), IpAddr::V4(h.destination))),
            Layer::Ipv6(h) => Some((IpAddr::V6(h.source), IpAddr::V6(h.destination))),
            _ => None,
        })
    }

    /// Source and destination ports of the first TCP or UDP header
    pub fn ports(&self) -> Option<(u16, u16)> {
        self.layers.iter().find_map(|l| match l {
            Layer::Tcp(h) => Some((h.source_port, h.destination_port)),
            Layer::Udp(h) => Some((h.source_port, h.destination_port)),
            _ => None,
        })
    }

    /// Generic one-line rendering of every layer
    pub fn summary(&self) -> String {
        if self.layers.is_empty() {
            return format!("Frame {} bytes", self.captured_len);
        }
        self.layers
            .iter()
            .map(Layer::render)
            .collect::<Vec<_>>()
            .join(" / ")
    }
}

// ── Decoder ──────────────────────────────────────────────────────────────────

/// Decode an Ethernet II frame into its header stack.
pub fn decode(data: &[u8]) -> HeaderStack {
    let mut layers = Vec::with_capacity(4);

    if let Some(eth) = EthernetPacket::new(data) {
        let ethertype = eth.get_ethertype();
        layers.push(Layer::Ethernet(EthernetHeader {
            source: eth.get_source(),
            destination: eth.get_destination(),
            ethertype: ethertype.0,
        }));
        decode_ethertype(ethertype.0, eth.payload(), &mut layers, 0);
    }

    HeaderStack {
        layers,
        captured_len: data.len(),
    }
}

fn push_payload(data: &[u8], layers: &mut Vec<Layer>) {
    if !data.is_empty() {
        layers.push(Layer::Payload { len: data.len() });
    }
}

fn decode_ethertype(ethertype: u16, data: &[u8], layers: &mut Vec<Layer>, vlan_depth: usize) {
    match ethertype {
        t if t == EtherTypes::Ipv4.0 => decode_ipv4(data, layers, 0),
        t if t == EtherTypes::Ipv6.0 => decode_ipv6(data, layers, 0),
        t if t == EtherTypes::Arp.0 => decode_arp(data, layers),
        t if (t == EtherTypes::Vlan.0 || t == ETHERTYPE_QINQ) && vlan_depth < MAX_VLAN_DEPTH => {
            match VlanPacket::new(data) {
                Some(vlan) => {
                    let inner = vlan.get_ethertype().0;
                    layers.push(Layer::Vlan(VlanHeader {
                        id: vlan.get_vlan_identifier(),
                        ethertype: inner,
                    }));
                    decode_ethertype(inner, vlan.payload(), layers, vlan_depth + 1);
                }
                None => push_payload(data, layers),
            }
        }
        _ => push_payload(data, layers),
    }
}

fn decode_ipv4(data: &[u8], layers: &mut Vec<Layer>, depth: usize) {
    let ip = match Ipv4Packet::new(data) {
        Some(ip) => ip,
        None => return push_payload(data, layers),
    };

    let header_len = ip.get_header_length() as usize * 4;
    if ip.get_version() != 4 || header_len < IPV4_MIN_HEADER_LEN || header_len > data.len() {
        return push_payload(data, layers);
    }

    let protocol = ip.get_next_level_protocol().0;
    layers.push(Layer::Ipv4(Ipv4Header {
        source: ip.get_source(),
        destination: ip.get_destination(),
        protocol,
        ttl: ip.get_ttl(),
    }));

    // Non-first fragments carry no transport header
    if ip.get_fragment_offset() != 0 {
        return push_payload(ip.payload(), layers);
    }

    decode_ip_payload(protocol, ip.payload(), layers, depth);
}

fn decode_ipv6(data: &[u8], layers: &mut Vec<Layer>, depth: usize) {
    let ip = match Ipv6Packet::new(data) {
        Some(ip) => ip,
        None => return push_payload(data, layers),
    };
    if ip.get_version() != 6 {
        return push_payload(data, layers);
    }

    let next_header = ip.get_next_header().0;
    layers.push(Layer::Ipv6(Ipv6Header {
        source: ip.get_source(),
        destination: ip.get_destination(),
        next_header,
        hop_limit: ip.get_hop_limit(),
    }));

    let mut next = next_header;
    let mut rest = ip.payload();
    for _ in 0..MAX_IPV6_EXTENSIONS {
        match next {
            // Hop-by-Hop, Routing, Destination Options
            0 | 43 | 60 => {
                if rest.len() < 8 {
                    return push_payload(rest, layers);
                }
                let ext_len = (rest[1] as usize + 1) * 8;
                if ext_len > rest.len() {
                    return push_payload(rest, layers);
                }
                next = rest[0];
                rest = &rest[ext_len..];
            }
            // Fragment
            44 => {
                if rest.len() < 8 {
                    return push_payload(rest, layers);
                }
                let offset = u16::from_be_bytes([rest[2], rest[3]]) >> 3;
                next = rest[0];
                rest = &rest[8..];
                if offset != 0 {
                    return push_payload(rest, layers);
                }
            }
            _ => break,
        }
    }

    decode_ip_payload(next, rest, layers, depth);
}

fn decode_ip_payload(protocol: u8, data: &[u8], layers: &mut Vec<Layer>, depth: usize) {
    match pnet::packet::ip::IpNextHeaderProtocol(protocol) {
        IpNextHeaderProtocols::Tcp => decode_tcp(data, layers),
        IpNextHeaderProtocols::Udp => decode_udp(data, layers),
        IpNextHeaderProtocols::Icmp => decode_icmp(data, layers),
        IpNextHeaderProtocols::Ipv4 if depth + 1 < MAX_IP_DEPTH => {
            decode_ipv4(data, layers, depth + 1)
        }
        IpNextHeaderProtocols::Ipv6 if depth + 1 < MAX_IP_DEPTH => {
            decode_ipv6(data, layers, depth + 1)
        }
        _ => push_payload(data, layers),
    }
}

fn decode_tcp(data: &[u8], layers: &mut Vec<Layer>) {
    let tcp = match TcpPacket::new(data) {
        Some(tcp) => tcp,
        None => return push_payload(data, layers),
    };
    let header_len = tcp.get_data_offset() as usize * 4;
    if header_len < TCP_MIN_HEADER_LEN || header_len > data.len() {
        return push_payload(data, layers);
    }

    layers.push(Layer::Tcp(TcpHeader {
        source_port: tcp.get_source(),
        destination_port: tcp.get_destination(),
        flags: (tcp.get_flags() & 0xff) as u8,
        segment_len: data.len(),
    }));
    push_payload(&data[header_len..], layers);
}

fn decode_udp(data: &[u8], layers: &mut Vec<Layer>) {
    let udp = match UdpPacket::new(data) {
        Some(udp) => udp,
        None => return push_payload(data, layers),
    };
    layers.push(Layer::Udp(UdpHeader {
        source_port: udp.get_source(),
        destination_port: udp.get_destination(),
        datagram_len: data.len(),
    }));
    push_payload(udp.payload(), layers);
}

fn decode_icmp(data: &[u8], layers: &mut Vec<Layer>) {
    let icmp = match IcmpPacket::new(data) {
        Some(icmp) => icmp,
        None => return push_payload(data, layers),
    };
    layers.push(Layer::Icmp(IcmpHeader {
        icmp_type: icmp.get_icmp_type().0,
        code: icmp.get_icmp_code().0,
    }));
    push_payload(icmp.payload(), layers);
}

fn decode_arp(data: &[u8], layers: &mut Vec<Layer>) {
    match ArpPacket::new(data) {
        Some(arp) => layers.push(Layer::Arp(ArpHeader {
            operation: arp.get_operation().0,
            sender_hw: arp.get_sender_hw_addr(),
            sender_proto: arp.get_sender_proto_addr(),
            target_hw: arp.get_target_hw_addr(),
            target_proto: arp.get_target_proto_addr(),
        })),
        None => push_payload(data, layers),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn test_decode_ipv4_tcp() {
        let frame = tcp_frame([10, 0, 0, 1], 51000, [10, 0, 0, 2], 443, TCP_SYN, b"");
        let stack = decode(&frame);

        let names: Vec<&str> = stack.layers().iter().map(Layer::name).collect();
        assert_eq!(names, vec!["Ether", "IP", "TCP"]);

        let ip = stack.first_ipv4().unwrap();
        assert_eq!(ip.source, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(ip.protocol, 6);

        let tcp = stack.tcp().unwrap();
        assert_eq!((tcp.source_port, tcp.destination_port), (51000, 443));
        assert_eq!(tcp.flags, TCP_SYN);
        assert_eq!(tcp.segment_len, 20);
        assert_eq!(stack.captured_len(), frame.len());
    }

    #[test]
    fn test_decode_udp_with_payload() {
        let frame = udp_frame([10, 0, 0, 1], 53000, [8, 8, 8, 8], 53, &[0u8; 12]);
        let stack = decode(&frame);

        let udp = stack.udp().unwrap();
        assert_eq!(udp.datagram_len, 20);
        assert!(matches!(stack.highest_layer(), Some(Layer::Payload { len: 12 })));
        assert_eq!(stack.ports(), Some((53000, 53)));
    }

    #[test]
    fn test_decode_arp() {
        let frame = arp_frame(
            1,
            [0x02, 0, 0, 0, 0, 0x01],
            [10, 0, 0, 1],
            [0, 0, 0, 0, 0, 0],
            [10, 0, 0, 5],
        );
        let stack = decode(&frame);
        let arp = stack.arp().unwrap();
        assert_eq!(arp.operation, 1);
        assert_eq!(arp.sender_proto, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(arp.target_proto, Ipv4Addr::new(10, 0, 0, 5));
        assert!(stack.ip_endpoints().is_none());
    }

    #[test]
    fn test_decode_vlan_tagged_ipv4() {
        let inner = Ipv4Builder::new()
            .protocol(1)
            .src_ip([192, 168, 0, 1])
            .dst_ip([192, 168, 0, 2])
            .payload(icmp_echo(8))
            .build();
        let frame = EthernetBuilder::new().vlan(42).ipv4().payload(inner).build();
        let stack = decode(&frame);

        assert!(stack.has_vlan());
        assert!(matches!(stack.layers()[1], Layer::Vlan(VlanHeader { id: 42, .. })));
        let icmp = stack.icmp().unwrap();
        assert_eq!((icmp.icmp_type, icmp.code), (8, 0));
    }

    #[test]
    fn test_decode_ipv6_with_extension_header() {
        let tcp = TcpBuilder::new().ports(40000, 22).flags(TCP_ACK).build();
        // Hop-by-Hop header: next=TCP, len=0 (8 bytes), padding
        let mut payload = vec![6, 0, 1, 4, 0, 0, 0, 0];
        payload.extend_from_slice(&tcp);
        let ip = Ipv6Builder::new().next_header(0).payload(payload).build();
        let frame = EthernetBuilder::new().ipv6().payload(ip).build();

        let stack = decode(&frame);
        let ipv6 = stack.first_ipv6().unwrap();
        assert_eq!(ipv6.next_header, 0);
        assert_eq!(stack.ports(), Some((40000, 22)));
    }

    #[test]
    fn test_decode_ip_in_ip() {
        let inner = Ipv4Builder::new()
            .protocol(17)
            .src_ip([172, 16, 0, 1])
            .dst_ip([172, 16, 0, 2])
            .payload(UdpBuilder::new().ports(5000, 6000).build())
            .build();
        let outer = Ipv4Builder::new().protocol(4).payload(inner).build();
        let frame = EthernetBuilder::new().ipv4().payload(outer).build();

        let stack = decode(&frame);
        let names: Vec<&str> = stack.layers().iter().map(Layer::name).collect();
        assert_eq!(names, vec!["Ether", "IP", "IP", "UDP"]);
        // Outermost header wins
        assert_eq!(stack.first_ipv4().unwrap().protocol, 4);
    }

    #[test]
    fn test_decode_truncated_tcp() {
        let ip = Ipv4Builder::new().protocol(6).payload(vec![0u8; 10]).build();
        let frame = EthernetBuilder::new().ipv4().payload(ip).build();
        let stack = decode(&frame);

        assert!(stack.first_ipv4().is_some());
        assert!(stack.tcp().is_none());
        assert!(matches!(stack.highest_layer(), Some(Layer::Payload { len: 10 })));
    }

    #[test]
    fn test_decode_short_frame() {
        let stack = decode(&[0xde, 0xad]);
        assert!(stack.is_empty());
        assert_eq!(stack.summary(), "Frame 2 bytes");
    }

    #[test]
    fn test_decode_unknown_ethertype() {
        let frame = EthernetBuilder::new()
            .ethertype(0x88cc)
            .payload(vec![0u8; 30])
            .build();
        let stack = decode(&frame);
        let names: Vec<&str> = stack.layers().iter().map(Layer::name).collect();
        assert_eq!(names, vec!["Ether", "Raw"]);
        assert!(stack.summary().contains("type=0x88cc"));
        assert!(stack.summary().ends_with("Raw 30 bytes"));
    }

    #[test]
    fn test_decode_is_deterministic() {
        let frame = tcp_frame([1, 2, 3, 4], 1, [5, 6, 7, 8], 2, TCP_SYN | TCP_ACK, b"hello");
        assert_eq!(decode(&frame), decode(&frame));
    }
}
