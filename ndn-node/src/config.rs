// Node configuration.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use ndn_common::wire::DEFAULT_REG_PORT;

/// Options for a node instance.
///
/// Constructed with the node's own identity; everything else has working
/// defaults and builder methods for the cases that need to override them.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Address this node advertises to peers.
    pub ip: Ipv4Addr,
    /// TCP listening port. Port 0 lets the OS choose; the advertised
    /// identity then uses the chosen port.
    pub port: u16,
    /// Address of the registration service.
    pub registrar: SocketAddr,
    /// Content cache capacity.
    pub cache_capacity: usize,
    /// Maximum number of neighbor links.
    pub max_neighbors: usize,
    /// Maximum number of locally published objects.
    pub max_local_objects: usize,
    /// Maximum number of pending interest entries.
    pub max_pending_interests: usize,
    /// Fixed RNG seed; `None` seeds from entropy.
    pub rng_seed: Option<u64>,
}

impl NodeConfig {
    pub fn new(ip: Ipv4Addr, port: u16) -> Self {
        Self {
            ip,
            port,
            registrar: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, DEFAULT_REG_PORT)),
            cache_capacity: 10,
            max_neighbors: 10,
            max_local_objects: 20,
            max_pending_interests: 50,
            rng_seed: None,
        }
    }

    pub fn with_registrar(mut self, registrar: SocketAddr) -> Self {
        self.registrar = registrar;
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }
}
