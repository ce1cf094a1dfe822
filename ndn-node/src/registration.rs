// Registration Client Module
//
// INTENTION:
// Everything the node says to, and hears from, the registration service:
// the REG / UNREG / NODES datagrams, and the join choreography driven by
// the NODESLIST reply (pick a random member, connect, register). Member
// selection deliberately excludes this node's own address, which the
// service may or may not already list.

use std::net::Ipv4Addr;

use log::{debug, info, warn};
use rand::Rng;

use ndn_common::wire::{NetId, NodeAddr, RegistrationReply, RegistrationRequest, TopologyMessage};

use crate::node::Node;

impl Node {
    async fn send_registration(&mut self, request: RegistrationRequest) {
        let text = request.to_string();
        debug!("UDP {text:?} to {}", self.config.registrar);
        if let Err(err) = self.udp.send_to(text.as_bytes(), self.config.registrar).await {
            warn!("could not send {text:?} to the registration service: {err}");
        }
    }

    pub(crate) async fn send_reg(&mut self, net: NetId) {
        self.send_registration(RegistrationRequest::Reg {
            net,
            addr: self.identity,
        })
        .await;
    }

    pub(crate) async fn send_unreg(&mut self, net: NetId) {
        self.send_registration(RegistrationRequest::Unreg {
            net,
            addr: self.identity,
        })
        .await;
    }

    pub(crate) async fn send_nodes_request(&mut self, net: NetId) {
        self.send_registration(RegistrationRequest::Nodes { net }).await;
    }

    /// `join <net>`: look the network up and continue in the NODESLIST
    /// handler. The membership is set tentatively so the reply can be
    /// matched against it; a failed join clears it again.
    pub(crate) async fn join(&mut self, net: NetId) {
        match self.current_net {
            Some(current) if current == net => {
                println!("already a member of network {net}");
            }
            Some(current) => {
                println!("already a member of network {current}; leave it first");
            }
            None => {
                info!("joining network {net}");
                self.current_net = Some(net);
                self.send_nodes_request(net).await;
            }
        }
    }

    /// `direct join <ip> <port>`: bypass the member lookup. The all-zero
    /// target registers this node as the first member of network 000;
    /// anything else just connects, leaving registration to a later join.
    pub(crate) async fn direct_join(&mut self, target: NodeAddr) {
        if target == NodeAddr::new(Ipv4Addr::UNSPECIFIED, 0) {
            match self.current_net {
                Some(current) => println!("already a member of network {current}"),
                None => {
                    self.current_net = Some(NetId::ZERO);
                    println!("registering as the first node of network {}", NetId::ZERO);
                    self.send_reg(NetId::ZERO).await;
                }
            }
            return;
        }
        match self.connect_to_node(target).await {
            Ok(_) => println!("connected to {target}; use 'join <net>' to register"),
            Err(err) => println!("direct join failed: {err:#}"),
        }
    }

    /// `leave`: tell every internal neighbor where to reattach, deregister,
    /// and wait in the loop for those links to close.
    pub(crate) async fn leave(&mut self) {
        let Some(net) = self.current_net else {
            println!("not currently a member of any network");
            return;
        };
        info!("leaving network {net}");
        self.leaving = true;
        let internal: Vec<_> = self
            .neighbors
            .iter()
            .filter(|n| n.kind.is_internal_link())
            .map(|n| n.id)
            .collect();
        self.pending_disconnects = internal.len();
        for id in internal {
            let replacement = self
                .neighbors
                .external()
                .map(|n| n.addr)
                .unwrap_or(self.identity);
            let message = TopologyMessage::Leave(replacement);
            self.send_or_drop(id, &message).await;
        }
        self.send_unreg(net).await;
        self.current_net = None;
        if self.pending_disconnects == 0 {
            println!("no internal neighbors; departure is immediate");
        } else {
            println!(
                "waiting for {} internal neighbor(s) to disconnect",
                self.pending_disconnects
            );
        }
    }

    /// Dispatches one datagram received from the registration service.
    pub(crate) async fn handle_registration_reply(&mut self, text: &str) {
        match RegistrationReply::parse(text) {
            Ok(RegistrationReply::OkReg) => match self.current_net {
                Some(net) => info!("registration in network {net} confirmed"),
                None => info!("registration confirmed"),
            },
            Ok(RegistrationReply::OkUnreg) => info!("deregistration confirmed"),
            Ok(RegistrationReply::NodesList { net, members }) => {
                self.process_nodes_list(net, members).await;
            }
            Ok(RegistrationReply::Error(message)) => {
                warn!("registration service error: {message}");
            }
            Err(err) => warn!("dropping UDP reply {text:?}: {err}"),
        }
    }

    async fn process_nodes_list(&mut self, net: NetId, members: Vec<NodeAddr>) {
        if self.current_net != Some(net) {
            debug!("ignoring NODESLIST for network {net}, not joining it");
            return;
        }
        let others: Vec<NodeAddr> = members
            .into_iter()
            .filter(|member| *member != self.identity)
            .collect();
        if others.is_empty() {
            println!("network {net} is empty; registering as its first node");
            self.send_reg(net).await;
            return;
        }

        let target = others[self.rng.gen_range(0..others.len())];
        info!(
            "network {net} has {} other member(s), connecting to {target}",
            others.len()
        );
        match self.connect_to_node(target).await {
            Ok(_) => {
                // The sole-link rule in connect_to_node already settled the
                // two-node role, re-derived from the live neighbor count
                // rather than the (possibly stale) member list length.
                self.send_reg(net).await;
                println!("joined network {net} via {target}");
            }
            Err(err) => {
                println!("failed to join network {net}: could not connect to {target}");
                warn!("join failed: {err:#}");
                self.current_net = None;
            }
        }
    }
}
