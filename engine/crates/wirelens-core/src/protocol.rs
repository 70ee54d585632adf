//! Protocol tags reported for captured frames

use serde::{Deserialize, Serialize};

/// Protocol identity assigned to a frame by the classifier
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    Ipv4,
    Ipv6,
    Arp,
    Tcp,
    Udp,
    Icmp,
    /// IP protocol number with no well-known name
    Number(u8),
    /// Name of the highest decoded layer of a non-IP, non-ARP frame
    Other(String),
    /// Nothing could be decoded
    #[default]
    Unknown,
}

impl Protocol {
    /// Map a well-known IP protocol number to its tag.
    ///
    /// Only ICMP, TCP and UDP have names; every other number stays numeric.
    pub fn from_ip_number(number: u8) -> Self {
        match number {
            1 => Protocol::Icmp,
            6 => Protocol::Tcp,
            17 => Protocol::Udp,
            n => Protocol::Number(n),
        }
    }

    /// Get the display tag
    pub fn as_tag(&self) -> String {
        match self {
            Protocol::Ipv4 => "IPV4".into(),
            Protocol::Ipv6 => "IPV6".into(),
            Protocol::Arp => "ARP".into(),
            Protocol::Tcp => "TCP".into(),
            Protocol::Udp => "UDP".into(),
            Protocol::Icmp => "ICMP".into(),
            Protocol::Number(n) => n.to_string(),
            Protocol::Other(name) => name.to_uppercase(),
            Protocol::Unknown => "unknown".into(),
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_tag())
    }
}
