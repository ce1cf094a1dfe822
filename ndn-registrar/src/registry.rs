// Membership registry, keyed by network id.
//
// INTENTION:
// Hold the `{net -> members}` map behind the REG / UNREG / NODES verbs and
// nothing else. The registry never talks to a socket; `handle_datagram`
// takes request text and produces reply text, which keeps every protocol
// decision in one synchronous, testable place.

use std::collections::BTreeMap;

use log::{info, warn};
use thiserror::Error;

use ndn_common::wire::{
    NetId, NodeAddr, RegistrationReply, RegistrationRequest, WireError, MAX_MSG_LEN,
};

/// Maximum number of networks the service tracks at once.
pub const MAX_NETWORKS: usize = 10;

/// Maximum number of members per network.
pub const MAX_MEMBERS_PER_NET: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("no space for new network {0}")]
    NetworksFull(NetId),
    #[error("network {0} is full")]
    NetworkFull(NetId),
}

/// Bounded map from network id to its registered members.
///
/// Members keep registration order, which is also the order NODESLIST
/// replies render them in.
#[derive(Debug, Default)]
pub struct Registry {
    nets: BTreeMap<NetId, Vec<NodeAddr>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `addr` into `net`, creating the network if needed.
    /// Registering an existing member is a no-op; returns whether the
    /// member was newly added.
    pub fn register(&mut self, net: NetId, addr: NodeAddr) -> Result<bool, RegistryError> {
        if let Some(members) = self.nets.get_mut(&net) {
            if members.contains(&addr) {
                return Ok(false);
            }
            if members.len() >= MAX_MEMBERS_PER_NET {
                return Err(RegistryError::NetworkFull(net));
            }
            members.push(addr);
            info!("added {addr} to net {net} ({} members)", members.len());
            return Ok(true);
        }
        if self.nets.len() >= MAX_NETWORKS {
            return Err(RegistryError::NetworksFull(net));
        }
        info!("created net {net}");
        self.nets.insert(net, vec![addr]);
        info!("added {addr} to net {net} (1 member)");
        Ok(true)
    }

    /// Removes `addr` from `net`. An absent member or network is a no-op;
    /// a network that becomes empty is dropped. Returns whether a member
    /// was actually removed.
    pub fn unregister(&mut self, net: NetId, addr: NodeAddr) -> bool {
        let Some(members) = self.nets.get_mut(&net) else {
            return false;
        };
        let before = members.len();
        members.retain(|member| *member != addr);
        let removed = members.len() < before;
        if removed {
            info!("removed {addr} from net {net} ({} members left)", members.len());
        }
        if members.is_empty() {
            self.nets.remove(&net);
            info!("net {net} is empty and has been dropped");
        }
        removed
    }

    /// Current members of `net`; empty when the network does not exist.
    /// Never creates the network.
    pub fn members(&self, net: NetId) -> &[NodeAddr] {
        self.nets.get(&net).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn network_count(&self) -> usize {
        self.nets.len()
    }

    /// Processes one datagram's text and produces the reply to send back,
    /// or `None` when the request is malformed and must be dropped.
    pub fn handle_datagram(&mut self, text: &str) -> Option<String> {
        let request = match RegistrationRequest::parse(text) {
            Ok(request) => request,
            Err(WireError::UnknownCommand(verb)) => {
                warn!("unknown command '{verb}'");
                return Some(RegistrationReply::Error("Unknown command".into()).to_string());
            }
            Err(err) => {
                warn!("dropping malformed datagram {text:?}: {err}");
                return None;
            }
        };
        let reply = match request {
            RegistrationRequest::Reg { net, addr } => match self.register(net, addr) {
                Ok(true) => RegistrationReply::OkReg,
                Ok(false) => {
                    info!("{addr} is already registered in net {net}");
                    RegistrationReply::OkReg
                }
                Err(err) => RegistrationReply::Error(err.to_string()),
            },
            RegistrationRequest::Unreg { net, addr } => {
                self.unregister(net, addr);
                RegistrationReply::OkUnreg
            }
            RegistrationRequest::Nodes { net } => {
                return Some(render_nodes_list(net, self.members(net)));
            }
        };
        Some(reply.to_string())
    }
}

/// Renders a NODESLIST reply, truncating at a line boundary so the whole
/// reply fits one datagram.
fn render_nodes_list(net: NetId, members: &[NodeAddr]) -> String {
    let mut reply = format!("NODESLIST {net}\n");
    for (index, member) in members.iter().enumerate() {
        let line = format!("{} {}\n", member.ip, member.port);
        if reply.len() + line.len() > MAX_MSG_LEN {
            warn!(
                "NODESLIST for net {net} truncated at {index} of {} members",
                members.len()
            );
            break;
        }
        reply.push_str(&line);
    }
    reply
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net(id: u16) -> NetId {
        NetId::new(id).unwrap()
    }

    fn addr(last_octet: u8, port: u16) -> NodeAddr {
        NodeAddr::new([1, 0, 0, last_octet].into(), port)
    }

    #[test]
    fn register_is_idempotent() {
        let mut registry = Registry::new();
        assert!(registry.register(net(42), addr(1, 5001)).unwrap());
        assert!(!registry.register(net(42), addr(1, 5001)).unwrap());
        assert_eq!(registry.members(net(42)).len(), 1);
    }

    #[test]
    fn unregister_absent_is_noop() {
        let mut registry = Registry::new();
        assert!(!registry.unregister(net(42), addr(1, 5001)));
        let reply = registry.handle_datagram("UNREG 042 1.0.0.1 5001").unwrap();
        assert_eq!(reply, "OKUNREG");
    }

    #[test]
    fn empty_network_is_dropped() {
        let mut registry = Registry::new();
        registry.register(net(42), addr(1, 5001)).unwrap();
        assert_eq!(registry.network_count(), 1);
        registry.unregister(net(42), addr(1, 5001));
        assert_eq!(registry.network_count(), 0);
    }

    #[test]
    fn nodes_never_creates_a_network() {
        let mut registry = Registry::new();
        let reply = registry.handle_datagram("NODES 042").unwrap();
        assert_eq!(reply, "NODESLIST 042\n");
        assert_eq!(registry.network_count(), 0);
    }

    #[test]
    fn network_capacity_is_enforced() {
        let mut registry = Registry::new();
        for id in 0..MAX_NETWORKS as u16 {
            registry.register(net(id), addr(1, 5001)).unwrap();
        }
        assert_eq!(
            registry.register(net(999), addr(1, 5001)),
            Err(RegistryError::NetworksFull(net(999)))
        );
        let reply = registry.handle_datagram("REG 999 1.0.0.1 5001").unwrap();
        assert!(reply.starts_with("ERROR:"));
    }

    #[test]
    fn member_capacity_is_enforced() {
        let mut registry = Registry::new();
        for port in 0..MAX_MEMBERS_PER_NET as u16 {
            registry.register(net(1), addr(1, 6000 + port)).unwrap();
        }
        assert_eq!(
            registry.register(net(1), addr(2, 7000)),
            Err(RegistryError::NetworkFull(net(1)))
        );
    }

    #[test]
    fn unknown_verb_gets_error_reply() {
        let mut registry = Registry::new();
        let reply = registry.handle_datagram("PING 042").unwrap();
        assert_eq!(reply, "ERROR: Unknown command");
    }

    #[test]
    fn malformed_known_verb_is_dropped() {
        let mut registry = Registry::new();
        assert_eq!(registry.handle_datagram("REG 042 1.0.0.1"), None);
        assert_eq!(registry.handle_datagram("REG 1000 1.0.0.1 5001"), None);
    }

    #[test]
    fn nodes_list_renders_members_in_registration_order() {
        let mut registry = Registry::new();
        registry.register(net(42), addr(1, 5001)).unwrap();
        registry.register(net(42), addr(2, 5002)).unwrap();
        let reply = registry.handle_datagram("NODES 042").unwrap();
        assert_eq!(reply, "NODESLIST 042\n1.0.0.1 5001\n1.0.0.2 5002\n");
    }

    #[test]
    fn oversized_nodes_list_is_truncated_at_a_line_boundary() {
        let mut registry = Registry::new();
        for port in 0..MAX_MEMBERS_PER_NET as u16 {
            registry.register(net(1), addr(1, 10000 + port)).unwrap();
        }
        let reply = registry.handle_datagram("NODES 001").unwrap();
        assert!(reply.len() <= MAX_MSG_LEN);
        assert!(reply.ends_with('\n'));
    }
}
