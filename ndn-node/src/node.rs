// Node Module
//
// INTENTION:
// This module provides the Node itself: the single long-lived value that
// owns every piece of mutable node state (neighbor table, local objects,
// content cache, pending interest table, registration state) and the event
// loop that drives it. One task runs the loop; between dispatches nothing
// else can touch the state, so there are no locks anywhere.
//
// ARCHITECTURAL PRINCIPLE:
// Handlers run to completion and perform their writes before the loop
// waits again. The only suspension point for node state is the select
// below; per-neighbor reader tasks never hold any of it.

use std::fmt;
use std::io;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::mpsc;
use tokio_stream::{Stream, StreamExt};

use ndn_common::wire::{NdnMessage, NetId, NodeAddr, PeerMessage, TopologyMessage, MAX_MSG_LEN};

use crate::config::NodeConfig;
use crate::ndn::{ContentCache, ObjectStore, Pit};
use crate::network::{NeighborId, NeighborTable, PeerEvent};
use crate::ui::{self, Command};

/// A running overlay node.
pub struct Node {
    pub(crate) config: NodeConfig,
    pub(crate) identity: NodeAddr,
    listener: TcpListener,
    pub(crate) udp: UdpSocket,
    pub(crate) events_tx: mpsc::UnboundedSender<PeerEvent>,
    events_rx: mpsc::UnboundedReceiver<PeerEvent>,
    pub(crate) neighbors: NeighborTable,
    pub(crate) current_net: Option<NetId>,
    pub(crate) leaving: bool,
    pub(crate) pending_disconnects: usize,
    pub(crate) objects: ObjectStore,
    pub(crate) cache: ContentCache,
    pub(crate) pit: Pit,
    pub(crate) rng: StdRng,
    shutdown: bool,
}

/// One readiness outcome of the select below, extracted so the handlers
/// can take the node mutably after the borrow of the sources ends.
enum Wake {
    Command(Option<String>),
    Accepted(io::Result<(TcpStream, std::net::SocketAddr)>),
    Datagram(io::Result<(usize, std::net::SocketAddr)>),
    Peer(Option<PeerEvent>),
}

impl Node {
    /// Binds the listening TCP socket and the UDP socket. These are the
    /// only fatal failures in the node's life; everything later is
    /// contained in its handler.
    pub async fn new(config: NodeConfig) -> Result<Self> {
        let listener = TcpListener::bind((config.ip, config.port))
            .await
            .with_context(|| format!("failed to listen on {}:{}", config.ip, config.port))?;
        let port = listener.local_addr()?.port();
        let identity = NodeAddr::new(config.ip, port);
        let udp = UdpSocket::bind((std::net::Ipv4Addr::UNSPECIFIED, 0))
            .await
            .context("failed to bind UDP socket")?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            neighbors: NeighborTable::new(config.max_neighbors),
            objects: ObjectStore::new(config.max_local_objects),
            cache: ContentCache::new(config.cache_capacity),
            pit: Pit::new(config.max_pending_interests),
            identity,
            listener,
            udp,
            events_tx,
            events_rx,
            current_net: None,
            leaving: false,
            pending_disconnects: 0,
            rng,
            shutdown: false,
            config,
        })
    }

    /// The identity this node advertises to peers. With a configured port
    /// of 0 this reflects the port the OS actually assigned.
    pub fn local_addr(&self) -> NodeAddr {
        self.identity
    }

    /// Drives the node until the user exits or a departure completes.
    ///
    /// `commands` is the user interface: stdin lines in production, any
    /// string stream in tests. Sources are served in a fixed order per
    /// wake-up: commands, then the listener, then the UDP socket, then
    /// neighbor traffic.
    pub async fn run<S>(&mut self, mut commands: S) -> Result<()>
    where
        S: Stream<Item = String> + Unpin,
    {
        info!("node {} entering the event loop", self.identity);
        let mut datagram = [0u8; MAX_MSG_LEN];
        loop {
            let wake = tokio::select! {
                biased;
                line = commands.next() => Wake::Command(line),
                accepted = self.listener.accept() => Wake::Accepted(accepted),
                received = self.udp.recv_from(&mut datagram) => Wake::Datagram(received),
                event = self.events_rx.recv() => Wake::Peer(event),
            };
            match wake {
                Wake::Command(Some(line)) => self.handle_command(&line).await,
                // End of input behaves like an explicit exit.
                Wake::Command(None) => self.shutdown = true,
                Wake::Accepted(Ok((stream, peer))) => self.register_incoming(stream, peer),
                Wake::Accepted(Err(err)) => warn!("accept failed: {err}"),
                Wake::Datagram(Ok((len, from))) => {
                    let text = String::from_utf8_lossy(&datagram[..len]).into_owned();
                    debug!("UDP {text:?} from {from}");
                    self.handle_registration_reply(&text).await;
                }
                Wake::Datagram(Err(err)) => warn!("UDP receive failed: {err}"),
                Wake::Peer(Some(PeerEvent::Line { from, line })) => {
                    self.handle_peer_line(from, &line).await;
                }
                Wake::Peer(Some(PeerEvent::Closed { from })) => {
                    self.handle_peer_closed(from).await;
                }
                Wake::Peer(None) => {}
            }
            if self.shutdown {
                break;
            }
            if self.leaving && self.pending_disconnects == 0 {
                info!("all internal neighbors disconnected, departure complete");
                break;
            }
        }
        self.teardown().await;
        Ok(())
    }

    async fn handle_command(&mut self, line: &str) {
        let command = match ui::parse(line) {
            Ok(command) => command,
            Err(hint) => {
                println!("{hint}");
                return;
            }
        };
        match command {
            Command::Help => println!("{}", ui::HELP),
            Command::Join(net) => self.join(net).await,
            Command::DirectJoin(target) => self.direct_join(target).await,
            Command::Create(name) => self.create_object(name),
            Command::Delete(name) => self.delete_object(&name),
            Command::Retrieve(name) => self.initiate_retrieve(name).await,
            Command::ShowTopology => self.show_topology(),
            Command::ShowNames => self.show_names(),
            Command::ShowInterestTable => self.show_interest_table(),
            Command::Leave => self.leave().await,
            Command::Exit => self.shutdown = true,
        }
    }

    async fn handle_peer_line(&mut self, from: NeighborId, line: &str) {
        let message = match PeerMessage::parse(line) {
            Ok(message) => message,
            Err(err) => {
                // Parse errors never cost the link, only the message.
                warn!("dropping message {line:?} from neighbor {from}: {err}");
                return;
            }
        };
        match message {
            PeerMessage::Topology(TopologyMessage::Entry(addr)) => self.handle_entry(from, addr),
            PeerMessage::Topology(TopologyMessage::Leave(addr)) => {
                self.handle_leave(from, addr).await;
            }
            PeerMessage::Ndn(NdnMessage::Interest { id, name }) => {
                self.handle_interest(from, id, name).await;
            }
            PeerMessage::Ndn(NdnMessage::Object { id, name }) => {
                self.handle_object(from, id, name).await;
            }
            PeerMessage::Ndn(NdnMessage::NoObject { id, name }) => {
                self.handle_noobject(from, id, name).await;
            }
        }
    }

    /// A reader task reported end of stream: the peer closed cleanly (or
    /// reading failed, which we treat the same way).
    async fn handle_peer_closed(&mut self, from: NeighborId) {
        if let Some(neighbor) = self.neighbors.get(from) {
            info!("neighbor {from} ({}) closed the connection", neighbor.addr);
            self.remove_neighbor(from, false).await;
        }
    }

    /// Writes one message to a neighbor without any failure handling.
    pub(crate) async fn try_send(
        &mut self,
        to: NeighborId,
        message: impl fmt::Display,
    ) -> io::Result<()> {
        match self.neighbors.get_mut(to) {
            Some(neighbor) => neighbor.send(message).await,
            None => Err(io::Error::new(io::ErrorKind::NotFound, "no such neighbor")),
        }
    }

    /// Writes one message to a neighbor; a failed write removes the
    /// neighbor (repairing the external link by promotion when it held
    /// that role). Returns whether the write succeeded.
    pub(crate) async fn send_or_drop(
        &mut self,
        to: NeighborId,
        message: impl fmt::Display,
    ) -> bool {
        let message = message.to_string();
        match self.try_send(to, &message).await {
            Ok(()) => {
                debug!("sent {message:?} to neighbor {to}");
                true
            }
            Err(err) => {
                warn!("write to neighbor {to} failed: {err}");
                self.remove_neighbor(to, true).await;
                false
            }
        }
    }

    async fn teardown(&mut self) {
        if let Some(net) = self.current_net.take() {
            self.send_unreg(net).await;
            // Give the datagram a moment to leave before the socket goes.
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        for id in self.neighbors.ids() {
            self.neighbors.remove(id);
        }
        info!("node {} shut down", self.identity);
    }
}
