// NDN Forwarding Module
//
// INTENTION:
// The interest/object exchange over the tree. Any lookup checks locally
// published objects first and the cache second; a hit answers immediately.
// Everything else flows through the pending interest table: the interface
// an interest arrived on owes the answer (Response), the interfaces it was
// forwarded to are awaited (Waiting), and an entry dies with its answer or
// with its last waiting interface.

use log::{debug, info, warn};
use rand::Rng;

use ndn_common::wire::{NdnMessage, ObjectName};

use crate::ndn::Interface;
use crate::network::NeighborId;
use crate::node::Node;

impl Node {
    /// `create <name>`.
    pub(crate) fn create_object(&mut self, name: ObjectName) {
        match self.objects.create(name.clone()) {
            Ok(true) => println!("object '{name}' created"),
            Ok(false) => println!("object '{name}' already exists"),
            Err(err) => println!("cannot create object '{name}': {err}"),
        }
    }

    /// `delete <name>`.
    pub(crate) fn delete_object(&mut self, name: &ObjectName) {
        if self.objects.delete(name) {
            println!("object '{name}' deleted");
        } else {
            println!("object '{name}' does not exist");
        }
    }

    /// `retrieve <name>`: answer from local state when possible, otherwise
    /// open a search with a fresh interest id and flood it to every
    /// neighbor.
    pub(crate) async fn initiate_retrieve(&mut self, name: ObjectName) {
        if self.current_net.is_none() {
            println!("not a member of any network; use 'join' or 'direct join' first");
            return;
        }
        if self.objects.contains(&name) {
            println!("object '{name}' is held locally");
            return;
        }
        if self.cache.contains(&name) {
            println!("object '{name}' is in the cache");
            return;
        }

        let mut chosen = None;
        for _ in 0..256 {
            let candidate: u8 = self.rng.gen();
            if !self.pit.contains_id(candidate) {
                chosen = Some(candidate);
                break;
            }
        }
        let Some(id) = chosen else {
            println!("cannot search for '{name}': no free search id, try again later");
            return;
        };

        if self.neighbors.is_empty() {
            println!("object '{name}' not found");
            return;
        }
        let targets = self.neighbors.ids();
        let forwarded = match self.pit.insert(id, name.clone(), Interface::User) {
            Ok(entry) => {
                let mut forwarded = Vec::new();
                for target in targets {
                    if entry.add_waiting(Interface::Peer(target)) {
                        forwarded.push(target);
                    } else {
                        warn!("interface list full for interest {id} '{name}'");
                        break;
                    }
                }
                forwarded
            }
            Err(err) => {
                println!("cannot search for '{name}': {err}");
                return;
            }
        };
        info!("searching for '{name}' with id {id}");
        let message = NdnMessage::Interest {
            id,
            name: name.clone(),
        };
        for target in forwarded {
            self.send_or_drop(target, &message).await;
        }
    }

    /// INTEREST relayed by a neighbor.
    pub(crate) async fn handle_interest(&mut self, from: NeighborId, id: u8, name: ObjectName) {
        debug!("INTEREST {id} '{name}' from neighbor {from}");
        if self.objects.contains(&name) || self.cache.contains(&name) {
            self.send_or_drop(from, &NdnMessage::Object { id, name }).await;
            return;
        }
        if let Some(entry) = self.pit.find_mut(id, &name) {
            // The same search came around again; answer back where it came
            // from and do not re-forward.
            if !entry.set_response(Interface::Peer(from)) {
                warn!("interface list full for interest {id} '{name}'");
            }
            return;
        }

        let others: Vec<NeighborId> = self
            .neighbors
            .ids()
            .into_iter()
            .filter(|other| *other != from)
            .collect();
        if others.is_empty() {
            // Nowhere to forward: the requesting link is this node's only
            // neighbor.
            self.send_or_drop(from, &NdnMessage::NoObject { id, name }).await;
            return;
        }
        let forwarded = match self.pit.insert(id, name.clone(), Interface::Peer(from)) {
            Ok(entry) => {
                let mut forwarded = Vec::new();
                for other in others {
                    if entry.add_waiting(Interface::Peer(other)) {
                        forwarded.push(other);
                    } else {
                        warn!("interface list full for interest {id} '{name}'");
                        break;
                    }
                }
                forwarded
            }
            Err(err) => {
                debug!("{err}; answering NOOBJECT for {id} '{name}'");
                self.send_or_drop(from, &NdnMessage::NoObject { id, name }).await;
                return;
            }
        };
        if forwarded.is_empty() {
            self.pit.remove(id, &name);
            self.send_or_drop(from, &NdnMessage::NoObject { id, name }).await;
            return;
        }
        let message = NdnMessage::Interest {
            id,
            name: name.clone(),
        };
        for other in forwarded {
            self.send_or_drop(other, &message).await;
        }
    }

    /// OBJECT answering a pending interest: admit it to the cache, settle
    /// the entry toward its response interface, and retire it. An OBJECT
    /// without an entry is a duplicate and is dropped.
    pub(crate) async fn handle_object(&mut self, from: NeighborId, id: u8, name: ObjectName) {
        debug!("OBJECT {id} '{name}' from neighbor {from}");
        let Some(entry) = self.pit.remove(id, &name) else {
            debug!("no pending interest {id} '{name}', dropping duplicate OBJECT");
            return;
        };
        self.cache.insert(name.clone());
        match entry.response() {
            Some(Interface::User) => println!("object '{name}' retrieved (search {id})"),
            Some(Interface::Peer(peer)) => {
                self.send_or_drop(peer, &NdnMessage::Object { id, name }).await;
            }
            None => warn!("pending interest {id} '{name}' had no response interface"),
        }
    }

    /// NOOBJECT closing one waiting interface. Only when the last waiting
    /// interface closes does the refusal propagate toward the response
    /// interface.
    pub(crate) async fn handle_noobject(&mut self, from: NeighborId, id: u8, name: ObjectName) {
        debug!("NOOBJECT {id} '{name}' from neighbor {from}");
        let settled = match self.pit.find_mut(id, &name) {
            Some(entry) => {
                if !entry.mark_closed(Interface::Peer(from)) {
                    warn!("NOOBJECT from {from} for interest {id} '{name}' never forwarded there");
                }
                !entry.has_waiting()
            }
            None => {
                debug!("no pending interest {id} '{name}', dropping NOOBJECT");
                return;
            }
        };
        if !settled {
            return;
        }
        let Some(entry) = self.pit.remove(id, &name) else {
            return;
        };
        match entry.response() {
            Some(Interface::User) => println!("object '{name}' not found"),
            Some(Interface::Peer(peer)) => {
                self.send_or_drop(peer, &NdnMessage::NoObject { id, name }).await;
            }
            None => warn!("pending interest {id} '{name}' had no response interface"),
        }
    }

    /// `show names`.
    pub(crate) fn show_names(&self) {
        println!("local objects ({}):", self.objects.len());
        if self.objects.is_empty() {
            println!("  (none)");
        }
        for name in self.objects.iter() {
            println!("  {name}");
        }
        println!("cached objects ({}):", self.cache.len());
        if self.cache.is_empty() {
            println!("  (none)");
        }
        for (name, stamp) in self.cache.iter() {
            println!("  {name} (last access {stamp})");
        }
    }

    /// `show interest table`.
    pub(crate) fn show_interest_table(&self) {
        println!("pending interests ({}):", self.pit.len());
        if self.pit.is_empty() {
            println!("  (none)");
            return;
        }
        for entry in self.pit.iter() {
            println!("  id {} name {}", entry.id, entry.name);
            for record in entry.interfaces() {
                println!("    {} {}", record.interface, record.state);
            }
            if !entry.has_waiting() {
                println!("    warning: no interface is waiting");
            }
        }
    }
}
