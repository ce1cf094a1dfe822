// Topology Protocol Module
//
// INTENTION:
// Keep the overlay a tree with a unique external edge per node. The rules
// are asymmetric on purpose: the connecting side assumes the new link is
// its external one, the accepting side classifies it internal, and the
// degenerate two-node network marks the single link as both at once. LEAVE
// carries the departing node's external address so the subtree it leaves
// behind can reattach.

use std::collections::VecDeque;
use std::net::SocketAddr;

use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use tokio::net::TcpStream;

use ndn_common::wire::{NdnMessage, NodeAddr, TopologyMessage};

use crate::ndn::Interface;
use crate::network::{NeighborId, NeighborType};
use crate::node::Node;

impl Node {
    /// Connects to a peer and introduces this node with ENTRY. An existing
    /// link to the same address is reused as is.
    pub(crate) async fn connect_to_node(&mut self, target: NodeAddr) -> Result<NeighborId> {
        if let Some(existing) = self.neighbors.by_addr(target) {
            debug!("already linked to {target} as neighbor {}", existing.id);
            return Ok(existing.id);
        }
        let stream = TcpStream::connect((target.ip, target.port))
            .await
            .with_context(|| format!("could not connect to {target}"))?;
        let id = self
            .neighbors
            .insert(target, NeighborType::External, stream, self.events_tx.clone())?;
        info!("connected to {target} as external neighbor {id}");
        if !self.send_or_drop(id, &TopologyMessage::Entry(self.identity)).await {
            bail!("could not introduce this node to {target}");
        }
        // A sole link always carries both roles, whichever side opened it.
        if self.neighbors.len() == 1 {
            if let Some(neighbor) = self.neighbors.get_mut(id) {
                neighbor.kind = NeighborType::ExternalAndInternal;
            }
        }
        Ok(id)
    }

    /// Registers a freshly accepted connection. The peer's advertised
    /// identity is unknown until its ENTRY arrives, so the link starts out
    /// pending with the transient source address.
    pub(crate) fn register_incoming(&mut self, stream: TcpStream, peer: SocketAddr) {
        let addr = match peer {
            SocketAddr::V4(v4) => NodeAddr::new(*v4.ip(), v4.port()),
            SocketAddr::V6(_) => {
                warn!("rejecting non-IPv4 connection from {peer}");
                return;
            }
        };
        match self
            .neighbors
            .insert(addr, NeighborType::PendingIncoming, stream, self.events_tx.clone())
        {
            Ok(id) => info!("accepted connection from {addr} as pending neighbor {id}"),
            Err(err) => warn!("rejecting connection from {addr}: {err}"),
        }
    }

    /// ENTRY: the peer announced its identity. Resolve the pending address
    /// and classify the link. With no external link and exactly one
    /// neighbor this is the two-node network and the link carries both
    /// roles; in every other case the acceptor side is internal.
    pub(crate) fn handle_entry(&mut self, from: NeighborId, addr: NodeAddr) {
        let two_node = self.neighbors.external().is_none() && self.neighbors.len() == 1;
        let Some(neighbor) = self.neighbors.get_mut(from) else {
            warn!("ENTRY from unknown neighbor {from}");
            return;
        };
        if neighbor.kind == NeighborType::PendingIncoming {
            neighbor.addr = addr;
        }
        neighbor.kind = if two_node {
            NeighborType::ExternalAndInternal
        } else {
            NeighborType::Internal
        };
        info!("neighbor {from} identified as {} ({})", neighbor.addr, neighbor.kind);
        self.normalize_dual_links();
    }

    /// A link carries both roles only while it is the sole link. Once a
    /// second neighbor exists, a leftover dual link from the two-node phase
    /// decays to a plain external one.
    fn normalize_dual_links(&mut self) {
        if self.neighbors.len() < 2 {
            return;
        }
        let dual: Vec<NeighborId> = self
            .neighbors
            .iter()
            .filter(|n| n.kind == NeighborType::ExternalAndInternal)
            .map(|n| n.id)
            .collect();
        for id in dual {
            if let Some(neighbor) = self.neighbors.get_mut(id) {
                neighbor.kind = NeighborType::External;
                info!("neighbor {id} ({}) is now a plain external link", neighbor.addr);
            }
        }
    }

    /// LEAVE: the peer is departing and named its own external neighbor.
    /// The sender is always removed; if it was this node's external link,
    /// the link is repaired with the named replacement.
    pub(crate) async fn handle_leave(&mut self, from: NeighborId, replacement: NodeAddr) {
        let Some(neighbor) = self.neighbors.get(from) else {
            warn!("LEAVE from unknown neighbor {from}");
            return;
        };
        let was_external = neighbor.kind.is_external_link();
        info!(
            "neighbor {from} ({}) is leaving, named {replacement} as its external link",
            neighbor.addr
        );
        self.remove_neighbor(from, false).await;
        if !was_external {
            return;
        }

        if replacement == self.identity {
            // The departing node pointed back at us: this node is now the
            // top of the detached subtree.
            self.promote_replacement_external();
            return;
        }
        let remaining = self.neighbors.len();
        if let Some(existing) = self.neighbors.by_addr_mut(replacement) {
            if matches!(
                existing.kind,
                NeighborType::Internal | NeighborType::PendingIncoming
            ) {
                existing.kind = if remaining == 1 {
                    NeighborType::ExternalAndInternal
                } else {
                    NeighborType::External
                };
                info!(
                    "promoted neighbor {} ({}) to {} link",
                    existing.id, existing.addr, existing.kind
                );
            }
            return;
        }
        match self.connect_to_node(replacement).await {
            Ok(id) => info!("reattached to {replacement} as new external neighbor {id}"),
            Err(err) => warn!(
                "could not reach replacement external {replacement}: {err:#}; \
                 no external link until the next join"
            ),
        }
    }

    /// Picks any internal or pending neighbor and makes it the external
    /// link, used when the old external link vanished without naming a
    /// replacement reachable elsewhere.
    pub(crate) fn promote_replacement_external(&mut self) {
        if self.neighbors.external().is_some() {
            return;
        }
        let candidate = self
            .neighbors
            .iter()
            .find(|n| matches!(n.kind, NeighborType::Internal | NeighborType::PendingIncoming))
            .map(|n| n.id);
        let Some(id) = candidate else {
            debug!("no neighbor left to promote to external");
            return;
        };
        let sole = self.neighbors.len() == 1;
        if let Some(neighbor) = self.neighbors.get_mut(id) {
            neighbor.kind = if sole {
                NeighborType::ExternalAndInternal
            } else {
                NeighborType::External
            };
            info!(
                "promoted neighbor {} ({}) to {} link",
                id, neighbor.addr, neighbor.kind
            );
        }
    }

    /// Removes a neighbor and settles everything that depended on it:
    /// the departure counter while leaving, external-link repair by
    /// promotion when asked for, and the NOOBJECTs owed for pending
    /// interests that just lost their last waiting interface. Failures
    /// while delivering those answers feed back into the same queue, so
    /// cascading removals stay iterative.
    pub(crate) async fn remove_neighbor(&mut self, first: NeighborId, repair: bool) {
        let mut queue: VecDeque<(NeighborId, bool)> = VecDeque::new();
        queue.push_back((first, repair));
        while let Some((id, repair)) = queue.pop_front() {
            let Some(neighbor) = self.neighbors.get(id) else {
                continue;
            };
            let was_external = neighbor.kind.is_external_link();
            let was_internal = neighbor.kind.is_internal_link();
            let addr = neighbor.addr;
            self.neighbors.remove(id);
            info!(
                "removed neighbor {id} ({addr}), {} link(s) left",
                self.neighbors.len()
            );
            if self.leaving && was_internal {
                self.pending_disconnects = self.pending_disconnects.saturating_sub(1);
            }
            if was_external && repair && !self.leaving {
                self.promote_replacement_external();
            }
            for retired in self.pit.detach_peer(id) {
                match retired.response {
                    None => debug!(
                        "pending interest {} '{}' lost its response interface",
                        retired.id, retired.name
                    ),
                    Some(Interface::User) => {
                        println!("object '{}' not found", retired.name);
                    }
                    Some(Interface::Peer(peer)) => {
                        let answer = NdnMessage::NoObject {
                            id: retired.id,
                            name: retired.name,
                        };
                        if let Err(err) = self.try_send(peer, &answer).await {
                            warn!("write to neighbor {peer} failed: {err}");
                            queue.push_back((peer, true));
                        }
                    }
                }
            }
        }
    }

    /// `show topology`.
    pub(crate) fn show_topology(&self) {
        println!("node {}", self.identity);
        match self.current_net {
            Some(net) => println!("network: {net}"),
            None => println!("network: none"),
        }
        match self.neighbors.external() {
            Some(external) => println!("external neighbor: {} ({})", external.addr, external.kind),
            None => println!("external neighbor: none"),
        }
        println!("internal neighbors:");
        let mut internal = 0;
        for neighbor in self.neighbors.iter() {
            if neighbor.kind.is_internal_link() {
                println!("  {} {}", neighbor.id, neighbor.addr);
                internal += 1;
            }
        }
        if internal == 0 {
            println!("  (none)");
        }
    }
}
