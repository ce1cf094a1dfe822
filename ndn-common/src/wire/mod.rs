// Wire Grammar Module
//
// INTENTION:
// One place for every message that crosses a socket in the overlay, with
// parsing and rendering kept side by side so the two cannot drift. All three
// families are ASCII and space-separated: UDP registration datagrams,
// TCP topology lines, and TCP named-data lines.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use thiserror::Error;

/// Maximum size of a UDP datagram or a single TCP line, in bytes.
pub const MAX_MSG_LEN: usize = 512;

/// Maximum length of an object name.
pub const MAX_NAME_LEN: usize = 100;

/// Well-known UDP port of the registration service.
pub const DEFAULT_REG_PORT: u16 = 59000;

/// Errors produced while decoding wire messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    #[error("malformed {0} message")]
    Malformed(&'static str),
    #[error("network id '{0}' is not in 0..=999")]
    InvalidNetId(String),
    #[error("invalid address '{0}'")]
    InvalidAddr(String),
    #[error("interest id '{0}' is not in 0..=255")]
    InvalidInterestId(String),
    #[error("object name must be 1..={MAX_NAME_LEN} printable characters without whitespace")]
    InvalidName,
}

/// Identifier of an overlay network, `0..=999`.
///
/// Rendered zero-padded to three digits on the wire, parsed as a plain
/// decimal integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NetId(u16);

impl NetId {
    pub const MIN: u16 = 0;
    pub const MAX: u16 = 999;

    /// The network a bare `direct join 0.0.0.0 0` creates.
    pub const ZERO: NetId = NetId(0);

    pub fn new(id: u16) -> Result<Self, WireError> {
        if id > Self::MAX {
            return Err(WireError::InvalidNetId(id.to_string()));
        }
        Ok(Self(id))
    }

    pub fn value(self) -> u16 {
        self.0
    }
}

impl FromStr for NetId {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, WireError> {
        let id: i64 = s
            .parse()
            .map_err(|_| WireError::InvalidNetId(s.to_string()))?;
        if !(0..=Self::MAX as i64).contains(&id) {
            return Err(WireError::InvalidNetId(s.to_string()));
        }
        Ok(Self(id as u16))
    }
}

impl fmt::Display for NetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.0)
    }
}

/// The `(ip, tcp port)` identity of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeAddr {
    pub ip: Ipv4Addr,
    pub port: u16,
}

impl NodeAddr {
    pub fn new(ip: Ipv4Addr, port: u16) -> Self {
        Self { ip, port }
    }

    /// Parses the two-token wire form `<ip> <port>`.
    pub fn from_tokens(ip: &str, port: &str) -> Result<Self, WireError> {
        let ip: Ipv4Addr = ip
            .parse()
            .map_err(|_| WireError::InvalidAddr(format!("{ip} {port}")))?;
        let port: u16 = port
            .parse()
            .map_err(|_| WireError::InvalidAddr(format!("{ip} {port}")))?;
        Ok(Self { ip, port })
    }
}

impl fmt::Display for NodeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

/// A validated object name: 1..=100 printable, non-whitespace characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectName(String);

impl ObjectName {
    pub fn new(name: &str) -> Result<Self, WireError> {
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Err(WireError::InvalidName);
        }
        if !name.chars().all(|c| c.is_ascii_graphic()) {
            return Err(WireError::InvalidName);
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Requests a node sends to the registration service over UDP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationRequest {
    /// `REG <net> <ip> <port>`
    Reg { net: NetId, addr: NodeAddr },
    /// `UNREG <net> <ip> <port>`
    Unreg { net: NetId, addr: NodeAddr },
    /// `NODES <net>`
    Nodes { net: NetId },
}

impl RegistrationRequest {
    pub fn parse(text: &str) -> Result<Self, WireError> {
        let mut tokens = text.split_whitespace();
        let verb = tokens.next().ok_or(WireError::Malformed("registration"))?;
        match verb {
            "REG" | "UNREG" => {
                let net = tokens
                    .next()
                    .ok_or(WireError::Malformed("registration"))?
                    .parse()?;
                let (ip, port) = match (tokens.next(), tokens.next()) {
                    (Some(ip), Some(port)) => (ip, port),
                    _ => return Err(WireError::Malformed("registration")),
                };
                let addr = NodeAddr::from_tokens(ip, port)?;
                if verb == "REG" {
                    Ok(Self::Reg { net, addr })
                } else {
                    Ok(Self::Unreg { net, addr })
                }
            }
            "NODES" => {
                let net = tokens
                    .next()
                    .ok_or(WireError::Malformed("registration"))?
                    .parse()?;
                Ok(Self::Nodes { net })
            }
            other => Err(WireError::UnknownCommand(other.to_string())),
        }
    }
}

impl fmt::Display for RegistrationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reg { net, addr } => write!(f, "REG {net} {} {}", addr.ip, addr.port),
            Self::Unreg { net, addr } => write!(f, "UNREG {net} {} {}", addr.ip, addr.port),
            Self::Nodes { net } => write!(f, "NODES {net}"),
        }
    }
}

/// Replies the registration service sends back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationReply {
    /// `OKREG`
    OkReg,
    /// `OKUNREG`
    OkUnreg,
    /// `NODESLIST <net>` followed by one `<ip> <port>` line per member.
    NodesList { net: NetId, members: Vec<NodeAddr> },
    /// `ERROR: <text>`
    Error(String),
}

impl RegistrationReply {
    pub fn parse(text: &str) -> Result<Self, WireError> {
        if let Some(rest) = text.strip_prefix("ERROR:") {
            return Ok(Self::Error(rest.trim().to_string()));
        }
        let mut lines = text.lines();
        let header = lines.next().ok_or(WireError::Malformed("reply"))?;
        let mut tokens = header.split_whitespace();
        match tokens.next() {
            Some("OKREG") => Ok(Self::OkReg),
            Some("OKUNREG") => Ok(Self::OkUnreg),
            Some("NODESLIST") => {
                let net = tokens.next().ok_or(WireError::Malformed("NODESLIST"))?.parse()?;
                let mut members = Vec::new();
                for line in lines {
                    let mut tokens = line.split_whitespace();
                    match (tokens.next(), tokens.next()) {
                        (Some(ip), Some(port)) => members.push(NodeAddr::from_tokens(ip, port)?),
                        (None, _) => continue,
                        _ => return Err(WireError::Malformed("NODESLIST")),
                    }
                }
                Ok(Self::NodesList { net, members })
            }
            Some(other) => Err(WireError::UnknownCommand(other.to_string())),
            None => Err(WireError::Malformed("reply")),
        }
    }
}

impl fmt::Display for RegistrationReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OkReg => f.write_str("OKREG"),
            Self::OkUnreg => f.write_str("OKUNREG"),
            Self::NodesList { net, members } => {
                writeln!(f, "NODESLIST {net}")?;
                for member in members {
                    writeln!(f, "{} {}", member.ip, member.port)?;
                }
                Ok(())
            }
            Self::Error(text) => write!(f, "ERROR: {text}"),
        }
    }
}

/// Tree-maintenance messages exchanged between neighbors over TCP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopologyMessage {
    /// `ENTRY <ip> <port>`, sent by the connecting side to announce itself.
    Entry(NodeAddr),
    /// `LEAVE <ip> <port>`, carrying the departing node's external
    /// neighbor address (or its own address when it has none).
    Leave(NodeAddr),
}

impl fmt::Display for TopologyMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entry(addr) => write!(f, "ENTRY {} {}", addr.ip, addr.port),
            Self::Leave(addr) => write!(f, "LEAVE {} {}", addr.ip, addr.port),
        }
    }
}

/// Named-data messages exchanged between neighbors over TCP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NdnMessage {
    /// `INTEREST <id> <name>`
    Interest { id: u8, name: ObjectName },
    /// `OBJECT <id> <name>`
    Object { id: u8, name: ObjectName },
    /// `NOOBJECT <id> <name>`
    NoObject { id: u8, name: ObjectName },
}

impl fmt::Display for NdnMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interest { id, name } => write!(f, "INTEREST {id} {name}"),
            Self::Object { id, name } => write!(f, "OBJECT {id} {name}"),
            Self::NoObject { id, name } => write!(f, "NOOBJECT {id} {name}"),
        }
    }
}

/// Any single line received on a neighbor link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerMessage {
    Topology(TopologyMessage),
    Ndn(NdnMessage),
}

impl PeerMessage {
    pub fn parse(line: &str) -> Result<Self, WireError> {
        let mut tokens = line.split_whitespace();
        let verb = tokens.next().ok_or(WireError::Malformed("peer"))?;
        match verb {
            "ENTRY" | "LEAVE" => {
                let (ip, port) = match (tokens.next(), tokens.next()) {
                    (Some(ip), Some(port)) => (ip, port),
                    _ => return Err(WireError::Malformed("topology")),
                };
                let addr = NodeAddr::from_tokens(ip, port)?;
                let message = if verb == "ENTRY" {
                    TopologyMessage::Entry(addr)
                } else {
                    TopologyMessage::Leave(addr)
                };
                Ok(Self::Topology(message))
            }
            "INTEREST" | "OBJECT" | "NOOBJECT" => {
                let id = tokens.next().ok_or(WireError::Malformed("ndn"))?;
                let id: u8 = id
                    .parse()
                    .map_err(|_| WireError::InvalidInterestId(id.to_string()))?;
                let name = tokens.next().ok_or(WireError::Malformed("ndn"))?;
                let name = ObjectName::new(name)?;
                let message = match verb {
                    "INTEREST" => NdnMessage::Interest { id, name },
                    "OBJECT" => NdnMessage::Object { id, name },
                    _ => NdnMessage::NoObject { id, name },
                };
                Ok(Self::Ndn(message))
            }
            other => Err(WireError::UnknownCommand(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(ip: &str, port: u16) -> NodeAddr {
        NodeAddr::new(ip.parse().unwrap(), port)
    }

    #[test]
    fn net_id_bounds() {
        assert_eq!("000".parse::<NetId>().unwrap().value(), 0);
        assert_eq!("999".parse::<NetId>().unwrap().value(), 999);
        assert_eq!("42".parse::<NetId>().unwrap().to_string(), "042");
        assert!("-1".parse::<NetId>().is_err());
        assert!("1000".parse::<NetId>().is_err());
        assert!("abc".parse::<NetId>().is_err());
    }

    #[test]
    fn object_name_bounds() {
        assert!(ObjectName::new(&"x".repeat(100)).is_ok());
        assert!(ObjectName::new(&"x".repeat(101)).is_err());
        assert!(ObjectName::new("").is_err());
        assert!(ObjectName::new("has space").is_err());
        assert!(ObjectName::new("movie.mp4").is_ok());
    }

    #[test]
    fn registration_request_round_trip() {
        let reg = RegistrationRequest::Reg {
            net: NetId::new(42).unwrap(),
            addr: addr("1.0.0.1", 5001),
        };
        let text = reg.to_string();
        assert_eq!(text, "REG 042 1.0.0.1 5001");
        assert_eq!(RegistrationRequest::parse(&text).unwrap(), reg);

        let nodes = RegistrationRequest::parse("NODES 042").unwrap();
        assert_eq!(
            nodes,
            RegistrationRequest::Nodes {
                net: NetId::new(42).unwrap()
            }
        );
    }

    #[test]
    fn registration_request_rejects_garbage() {
        assert!(matches!(
            RegistrationRequest::parse("PING 042"),
            Err(WireError::UnknownCommand(_))
        ));
        assert!(RegistrationRequest::parse("REG 042 1.0.0.1").is_err());
        assert!(RegistrationRequest::parse("NODES 1000").is_err());
    }

    #[test]
    fn nodes_list_round_trip() {
        let reply = RegistrationReply::NodesList {
            net: NetId::new(7).unwrap(),
            members: vec![addr("1.0.0.1", 5001), addr("1.0.0.2", 5002)],
        };
        let text = reply.to_string();
        assert_eq!(text, "NODESLIST 007\n1.0.0.1 5001\n1.0.0.2 5002\n");
        assert_eq!(RegistrationReply::parse(&text).unwrap(), reply);
    }

    #[test]
    fn empty_nodes_list() {
        let reply = RegistrationReply::parse("NODESLIST 042\n").unwrap();
        assert_eq!(
            reply,
            RegistrationReply::NodesList {
                net: NetId::new(42).unwrap(),
                members: Vec::new()
            }
        );
    }

    #[test]
    fn error_reply() {
        let reply = RegistrationReply::parse("ERROR: Unknown command").unwrap();
        assert_eq!(reply, RegistrationReply::Error("Unknown command".into()));
    }

    #[test]
    fn peer_message_parsing() {
        assert_eq!(
            PeerMessage::parse("ENTRY 1.0.0.2 5002").unwrap(),
            PeerMessage::Topology(TopologyMessage::Entry(addr("1.0.0.2", 5002)))
        );
        assert_eq!(
            PeerMessage::parse("INTEREST 17 foo").unwrap(),
            PeerMessage::Ndn(NdnMessage::Interest {
                id: 17,
                name: ObjectName::new("foo").unwrap()
            })
        );
        assert!(matches!(
            PeerMessage::parse("INTEREST 256 foo"),
            Err(WireError::InvalidInterestId(_))
        ));
        assert!(matches!(
            PeerMessage::parse("HELLO there"),
            Err(WireError::UnknownCommand(_))
        ));
    }

    #[test]
    fn ndn_message_rendering() {
        let msg = NdnMessage::NoObject {
            id: 99,
            name: ObjectName::new("bar").unwrap(),
        };
        assert_eq!(msg.to_string(), "NOOBJECT 99 bar");
    }
}
