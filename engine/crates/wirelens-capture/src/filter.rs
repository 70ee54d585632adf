//! Software frame filter
//!
//! Accepts a small BPF-like language and evaluates it against a decoded
//! [`HeaderStack`]:
//!
//! ```text
//! expr    := term ("or" term)*
//! term    := factor (["and"] factor)*
//! factor  := "not" factor | "(" expr ")" | primary
//! primary := [src|dst] host IP | [src|dst] port N | [src|dst] net CIDR
//!          | tcp | udp | icmp | arp | ip | ip6 | vlan
//! ```
//!
//! `&&`, `||` and `!` are accepted for `and`, `or` and `not`. Two primitives
//! written side by side are joined with `and`, so `tcp port 443` reads as
//! `tcp and port 443`. Keywords are case-insensitive and an empty expression
//! matches every frame.

use std::fmt;
use std::net::IpAddr;

use crate::decode::HeaderStack;
use crate::error::{CaptureError, CaptureResult};

/// Parsed filter expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameFilter {
    rule: FilterRule,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Either,
    Src,
    Dst,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FilterRule {
    Any,
    Host(Direction, IpAddr),
    Port(Direction, u16),
    Net(Direction, IpNet),
    Tcp,
    Udp,
    Icmp,
    Arp,
    Ip,
    Ip6,
    Vlan,
    Not(Box<FilterRule>),
    And(Box<FilterRule>, Box<FilterRule>),
    Or(Box<FilterRule>, Box<FilterRule>),
}

impl FrameFilter {
    /// Filter that accepts every frame.
    pub fn any() -> Self {
        Self {
            rule: FilterRule::Any,
        }
    }

    /// Parse a filter expression.
    pub fn parse(expr: &str) -> CaptureResult<Self> {
        let tokens = tokenize(expr);
        if tokens.is_empty() {
            return Ok(Self::any());
        }

        let mut parser = Parser { tokens, pos: 0 };
        let rule = parser.expr()?;
        if let Some(extra) = parser.peek() {
            return Err(CaptureError::InvalidFilter(format!(
                "unexpected '{}' in '{}'",
                extra,
                expr.trim()
            )));
        }
        Ok(Self { rule })
    }

    /// Whether this filter accepts every frame.
    pub fn is_any(&self) -> bool {
        self.rule == FilterRule::Any
    }

    /// Test whether a decoded frame matches this filter.
    pub fn matches(&self, stack: &HeaderStack) -> bool {
        eval(&self.rule, stack)
    }
}

impl Default for FrameFilter {
    fn default() -> Self {
        Self::any()
    }
}

fn eval(rule: &FilterRule, stack: &HeaderStack) -> bool {
    match rule {
        FilterRule::Any => true,
        FilterRule::Host(dir, ip) => endpoints(stack)
            .map(|(src, dst)| dir.select(src == *ip, dst == *ip))
            .unwrap_or(false),
        FilterRule::Port(dir, port) => stack
            .ports()
            .map(|(src, dst)| dir.select(src == *port, dst == *port))
            .unwrap_or(false),
        FilterRule::Net(dir, net) => endpoints(stack)
            .map(|(src, dst)| dir.select(net.contains(src), net.contains(dst)))
            .unwrap_or(false),
        FilterRule::Tcp => stack.tcp().is_some(),
        FilterRule::Udp => stack.udp().is_some(),
        FilterRule::Icmp => stack.icmp().is_some(),
        FilterRule::Arp => stack.arp().is_some(),
        FilterRule::Ip => stack.first_ipv4().is_some(),
        FilterRule::Ip6 => stack.first_ipv6().is_some(),
        FilterRule::Vlan => stack.has_vlan(),
        FilterRule::Not(inner) => !eval(inner, stack),
        FilterRule::And(a, b) => eval(a, stack) && eval(b, stack),
        FilterRule::Or(a, b) => eval(a, stack) || eval(b, stack),
    }
}

/// Network-layer endpoints: outermost IP header, or ARP protocol addresses
fn endpoints(stack: &HeaderStack) -> Option<(IpAddr, IpAddr)> {
    stack.ip_endpoints().or_else(|| {
        stack
            .arp()
            .map(|arp| (IpAddr::V4(arp.sender_proto), IpAddr::V4(arp.target_proto)))
    })
}

impl Direction {
    fn select(self, src: bool, dst: bool) -> bool {
        match self {
            Direction::Either => src || dst,
            Direction::Src => src,
            Direction::Dst => dst,
        }
    }
}

// ── CIDR ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct IpNet {
    addr: IpAddr,
    prefix: u8,
}

impl IpNet {
    fn parse(s: &str) -> Option<Self> {
        let (addr, prefix) = match s.split_once('/') {
            Some((addr, prefix)) => (addr.parse::<IpAddr>().ok()?, Some(prefix.parse::<u8>().ok()?)),
            None => (s.parse::<IpAddr>().ok()?, None),
        };
        let max = if addr.is_ipv4() { 32 } else { 128 };
        let prefix = prefix.unwrap_or(max);
        (prefix <= max).then_some(Self { addr, prefix })
    }

    fn contains(&self, ip: IpAddr) -> bool {
        match (self.addr, ip) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = u32::MAX.checked_shl(32 - self.prefix as u32).unwrap_or(0);
                u32::from(net) & mask == u32::from(ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = u128::MAX.checked_shl(128 - self.prefix as u32).unwrap_or(0);
                u128::from(net) & mask == u128::from(ip) & mask
            }
            _ => false,
        }
    }
}

// ── Parser ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Open,
    Close,
    And,
    Or,
    Not,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Word(w) => write!(f, "{}", w),
            Token::Open => write!(f, "("),
            Token::Close => write!(f, ")"),
            Token::And => write!(f, "and"),
            Token::Or => write!(f, "or"),
            Token::Not => write!(f, "not"),
        }
    }
}

fn tokenize(expr: &str) -> Vec<Token> {
    let spaced = expr
        .replace('(', " ( ")
        .replace(')', " ) ")
        .replace("&&", " && ")
        .replace("||", " || ");

    let mut tokens = Vec::new();
    for word in spaced.split_whitespace() {
        // A leading '!' binds to the word that follows it
        let mut word = word;
        while let Some(rest) = word.strip_prefix('!') {
            tokens.push(Token::Not);
            word = rest;
        }
        if word.is_empty() {
            continue;
        }
        let token = match word.to_ascii_lowercase().as_str() {
            "(" => Token::Open,
            ")" => Token::Close,
            "and" | "&&" => Token::And,
            "or" | "||" => Token::Or,
            "not" => Token::Not,
            other => Token::Word(other.to_string()),
        };
        tokens.push(token);
    }
    tokens
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expr(&mut self) -> CaptureResult<FilterRule> {
        let mut rule = self.term()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.term()?;
            rule = FilterRule::Or(Box::new(rule), Box::new(right));
        }
        Ok(rule)
    }

    fn term(&mut self) -> CaptureResult<FilterRule> {
        let mut rule = self.factor()?;
        loop {
            if self.peek() == Some(&Token::And) {
                self.pos += 1;
            } else if !matches!(self.peek(), Some(Token::Word(_))) {
                // A bare word continues the term: `tcp port 443`
                break;
            }
            let right = self.factor()?;
            rule = FilterRule::And(Box::new(rule), Box::new(right));
        }
        Ok(rule)
    }

    fn factor(&mut self) -> CaptureResult<FilterRule> {
        match self.next() {
            Some(Token::Not) => Ok(FilterRule::Not(Box::new(self.factor()?))),
            Some(Token::Open) => {
                let rule = self.expr()?;
                match self.next() {
                    Some(Token::Close) => Ok(rule),
                    _ => Err(CaptureError::InvalidFilter("missing ')'".into())),
                }
            }
            Some(Token::Word(word)) => self.primary(&word),
            Some(other) => Err(CaptureError::InvalidFilter(format!(
                "unexpected '{}'",
                other
            ))),
            None => Err(CaptureError::InvalidFilter(
                "unexpected end of expression".into(),
            )),
        }
    }

    fn primary(&mut self, word: &str) -> CaptureResult<FilterRule> {
        match word {
            "tcp" => Ok(FilterRule::Tcp),
            "udp" => Ok(FilterRule::Udp),
            "icmp" => Ok(FilterRule::Icmp),
            "arp" => Ok(FilterRule::Arp),
            "ip" => Ok(FilterRule::Ip),
            "ip6" => Ok(FilterRule::Ip6),
            "vlan" => Ok(FilterRule::Vlan),
            "src" | "dst" => {
                let dir = if word == "src" {
                    Direction::Src
                } else {
                    Direction::Dst
                };
                match self.next() {
                    Some(Token::Word(kind)) => self.qualified(dir, &kind),
                    _ => Err(CaptureError::InvalidFilter(format!(
                        "'{}' must be followed by host, port or net",
                        word
                    ))),
                }
            }
            "host" | "port" | "net" => self.qualified(Direction::Either, word),
            other => Err(CaptureError::InvalidFilter(format!(
                "unsupported primitive '{}'",
                other
            ))),
        }
    }

    fn qualified(&mut self, dir: Direction, kind: &str) -> CaptureResult<FilterRule> {
        let value = match self.next() {
            Some(Token::Word(value)) => value,
            _ => {
                return Err(CaptureError::InvalidFilter(format!(
                    "'{}' needs a value",
                    kind
                )))
            }
        };

        match kind {
            "host" => value
                .parse::<IpAddr>()
                .map(|ip| FilterRule::Host(dir, ip))
                .map_err(|_| CaptureError::InvalidFilter(format!("Invalid IP: {}", value))),
            "port" => value
                .parse::<u16>()
                .map(|p| FilterRule::Port(dir, p))
                .map_err(|_| CaptureError::InvalidFilter(format!("Invalid port: {}", value))),
            "net" => IpNet::parse(&value)
                .map(|net| FilterRule::Net(dir, net))
                .ok_or_else(|| CaptureError::InvalidFilter(format!("Invalid network: {}", value))),
            other => Err(CaptureError::InvalidFilter(format!(
                "expected host, port or net, found '{}'",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode;
    use crate::test_utils::*;

    fn tcp_443() -> HeaderStack {
        decode(&tcp_frame([10, 0, 0, 1], 51000, [10, 0, 0, 2], 443, TCP_SYN, b""))
    }

    fn dns() -> HeaderStack {
        decode(&udp_frame([10, 0, 0, 1], 53000, [8, 8, 8, 8], 53, b""))
    }

    fn arp() -> HeaderStack {
        decode(&arp_frame(1, [2, 0, 0, 0, 0, 1], [10, 0, 0, 1], [0; 6], [10, 0, 0, 5]))
    }

    #[test]
    fn test_filter_empty() {
        let filter = FrameFilter::parse("   ").unwrap();
        assert!(filter.is_any());
        assert!(filter.matches(&tcp_443()));
        assert!(filter.matches(&decode(&[0u8; 3])));
    }

    #[test]
    fn test_filter_host() {
        let filter = FrameFilter::parse("host 10.0.0.2").unwrap();
        assert!(filter.matches(&tcp_443()));
        assert!(!filter.matches(&dns()));

        let src = FrameFilter::parse("src host 10.0.0.2").unwrap();
        assert!(!src.matches(&tcp_443()));
        let dst = FrameFilter::parse("dst host 10.0.0.2").unwrap();
        assert!(dst.matches(&tcp_443()));
    }

    #[test]
    fn test_filter_host_matches_arp_addresses() {
        let filter = FrameFilter::parse("host 10.0.0.5").unwrap();
        assert!(filter.matches(&arp()));
    }

    #[test]
    fn test_filter_port() {
        let filter = FrameFilter::parse("port 53").unwrap();
        assert!(filter.matches(&dns()));
        assert!(!filter.matches(&tcp_443()));
        assert!(!filter.matches(&arp()));

        let filter = FrameFilter::parse("src port 51000").unwrap();
        assert!(filter.matches(&tcp_443()));
    }

    #[test]
    fn test_filter_net() {
        let filter = FrameFilter::parse("net 8.8.0.0/16").unwrap();
        assert!(filter.matches(&dns()));
        assert!(!filter.matches(&tcp_443()));

        let all = FrameFilter::parse("net 0.0.0.0/0").unwrap();
        assert!(all.matches(&tcp_443()));
    }

    #[test]
    fn test_filter_protocols() {
        assert!(FrameFilter::parse("tcp").unwrap().matches(&tcp_443()));
        assert!(!FrameFilter::parse("TCP").unwrap().matches(&dns()));
        assert!(FrameFilter::parse("arp").unwrap().matches(&arp()));
        assert!(FrameFilter::parse("ip").unwrap().matches(&dns()));
        assert!(!FrameFilter::parse("ip").unwrap().matches(&arp()));
        assert!(!FrameFilter::parse("ip6").unwrap().matches(&dns()));
    }

    #[test]
    fn test_filter_and_or_precedence() {
        // and binds tighter: arp or (tcp and port 53)
        let filter = FrameFilter::parse("arp or tcp and port 53").unwrap();
        assert!(filter.matches(&arp()));
        assert!(!filter.matches(&tcp_443()));

        let filter = FrameFilter::parse("(arp or tcp) and port 443").unwrap();
        assert!(filter.matches(&tcp_443()));
        assert!(!filter.matches(&arp()));
    }

    #[test]
    fn test_filter_not_and_aliases() {
        let filter = FrameFilter::parse("not arp").unwrap();
        assert!(!filter.matches(&arp()));
        assert!(filter.matches(&dns()));

        let filter = FrameFilter::parse("!arp && (udp || tcp)").unwrap();
        assert!(filter.matches(&dns()));
        assert!(filter.matches(&tcp_443()));
        assert!(!filter.matches(&arp()));
    }

    #[test]
    fn test_filter_protocol_before_port() {
        let filter = FrameFilter::parse("tcp port 443").unwrap();
        assert!(filter.matches(&tcp_443()));
        assert!(!filter.matches(&dns()));
        assert_eq!(filter, FrameFilter::parse("tcp and port 443").unwrap());

        assert!(FrameFilter::parse("udp dst port 53").unwrap().matches(&dns()));
        assert!(!FrameFilter::parse("tcp port 53").unwrap().matches(&dns()));

        // Implicit and still binds tighter than or
        let filter = FrameFilter::parse("arp or tcp port 53").unwrap();
        assert!(filter.matches(&arp()));
        assert!(!filter.matches(&tcp_443()));
    }

    #[test]
    fn test_filter_vlan() {
        let ip = Ipv4Builder::new().protocol(1).payload(icmp_echo(8)).build();
        let tagged = decode(&EthernetBuilder::new().vlan(7).ipv4().payload(ip).build());
        let filter = FrameFilter::parse("vlan and icmp").unwrap();
        assert!(filter.matches(&tagged));
        assert!(!filter.matches(&tcp_443()));
    }

    #[test]
    fn test_filter_invalid() {
        for expr in [
            "host",
            "host not-an-ip",
            "port 70000",
            "net 10.0.0.0/33",
            "tcp and",
            "(tcp",
            "tcp)",
            "src tcp",
            "tcp port",
            "tcp frobnicate",
            "frobnicate",
        ] {
            let err = FrameFilter::parse(expr).unwrap_err();
            assert!(
                matches!(err, CaptureError::InvalidFilter(_)),
                "expected InvalidFilter for {expr:?}"
            );
        }
    }
}
