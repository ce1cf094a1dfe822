// Neighbor Table Module
//
// INTENTION:
// Own every peer link of the node. Each neighbor record keeps the write
// half of its TCP stream plus the classification of the link; the read half
// lives in a small reader task that extracts newline-framed lines and
// forwards them to the node loop over an mpsc channel. The node loop is the
// only place neighbor state is mutated.

use std::collections::BTreeMap;
use std::fmt;
use std::io;

use log::debug;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use ndn_common::wire::{NodeAddr, MAX_MSG_LEN};

use super::framing::RecvBuffer;

/// Process-unique identifier of a neighbor link. PIT interfaces refer to
/// neighbors by this id and never own the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NeighborId(u64);

impl fmt::Display for NeighborId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Role of a neighbor link in the tree overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeighborType {
    /// The single link "up" the tree.
    External,
    /// Any other tree link.
    Internal,
    /// Both roles at once, the two-node degenerate case.
    ExternalAndInternal,
    /// Freshly accepted link whose peer identity is unknown until ENTRY.
    PendingIncoming,
}

impl NeighborType {
    /// Whether this link counts as the node's external link.
    pub fn is_external_link(self) -> bool {
        matches!(self, Self::External | Self::ExternalAndInternal)
    }

    /// Whether this link counts as an internal link (the set LEAVE is sent
    /// to, and the set whose closure completes a departure).
    pub fn is_internal_link(self) -> bool {
        matches!(self, Self::Internal | Self::ExternalAndInternal)
    }
}

impl fmt::Display for NeighborType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::External => "external",
            Self::Internal => "internal",
            Self::ExternalAndInternal => "external+internal",
            Self::PendingIncoming => "pending",
        };
        f.write_str(label)
    }
}

/// What a reader task reports back to the node loop.
#[derive(Debug)]
pub enum PeerEvent {
    /// One complete message line, newline stripped.
    Line { from: NeighborId, line: String },
    /// The peer closed the stream (or reading failed).
    Closed { from: NeighborId },
}

/// One peer link: advertised address, link role, and the write half of the
/// stream. The read half is owned by the reader task.
#[derive(Debug)]
pub struct Neighbor {
    pub id: NeighborId,
    pub addr: NodeAddr,
    pub kind: NeighborType,
    writer: OwnedWriteHalf,
    reader: JoinHandle<()>,
}

impl Neighbor {
    /// Sends one message as a single newline-terminated write.
    pub async fn send(&mut self, message: impl fmt::Display) -> io::Result<()> {
        let line = format!("{message}\n");
        self.writer.write_all(line.as_bytes()).await
    }
}

impl Drop for Neighbor {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("neighbor limit reached ({0} links)")]
pub struct NeighborTableFull(pub usize);

/// Bounded table of neighbor links, iterated in id (admission) order.
#[derive(Debug)]
pub struct NeighborTable {
    entries: BTreeMap<NeighborId, Neighbor>,
    next_id: u64,
    capacity: usize,
}

impl NeighborTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            next_id: 0,
            capacity,
        }
    }

    /// Adds a link, splitting the stream and spawning its reader task.
    /// On a full table the stream is dropped, which closes it.
    pub fn insert(
        &mut self,
        addr: NodeAddr,
        kind: NeighborType,
        stream: TcpStream,
        events: mpsc::UnboundedSender<PeerEvent>,
    ) -> Result<NeighborId, NeighborTableFull> {
        if self.entries.len() >= self.capacity {
            return Err(NeighborTableFull(self.capacity));
        }
        let id = NeighborId(self.next_id);
        self.next_id += 1;
        let (read_half, writer) = stream.into_split();
        let reader = spawn_reader(id, read_half, events);
        self.entries.insert(
            id,
            Neighbor {
                id,
                addr,
                kind,
                writer,
                reader,
            },
        );
        Ok(id)
    }

    /// Removes a link. Dropping the returned record aborts its reader and
    /// closes the socket; both happen exactly once.
    pub fn remove(&mut self, id: NeighborId) -> Option<Neighbor> {
        self.entries.remove(&id)
    }

    pub fn get(&self, id: NeighborId) -> Option<&Neighbor> {
        self.entries.get(&id)
    }

    pub fn get_mut(&mut self, id: NeighborId) -> Option<&mut Neighbor> {
        self.entries.get_mut(&id)
    }

    pub fn by_addr(&self, addr: NodeAddr) -> Option<&Neighbor> {
        self.entries.values().find(|n| n.addr == addr)
    }

    pub fn by_addr_mut(&mut self, addr: NodeAddr) -> Option<&mut Neighbor> {
        self.entries.values_mut().find(|n| n.addr == addr)
    }

    /// The node's external link, if any. The topology invariant keeps this
    /// unique.
    pub fn external(&self) -> Option<&Neighbor> {
        self.entries.values().find(|n| n.kind.is_external_link())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Neighbor> {
        self.entries.values()
    }

    pub fn ids(&self) -> Vec<NeighborId> {
        self.entries.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builds an id directly, for tests that need distinct ids without a table.
#[cfg(test)]
pub(crate) fn test_id(raw: u64) -> NeighborId {
    NeighborId(raw)
}

fn spawn_reader(
    id: NeighborId,
    mut read_half: OwnedReadHalf,
    events: mpsc::UnboundedSender<PeerEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut buf = RecvBuffer::new();
        let mut chunk = [0u8; MAX_MSG_LEN];
        loop {
            match read_half.read(&mut chunk).await {
                Ok(0) => {
                    let _ = events.send(PeerEvent::Closed { from: id });
                    return;
                }
                Ok(n) => {
                    for line in buf.extend(&chunk[..n]) {
                        if events.send(PeerEvent::Line { from: id, line }).is_err() {
                            return;
                        }
                    }
                }
                Err(err) => {
                    debug!("read error on neighbor {id}: {err}");
                    let _ = events.send(PeerEvent::Closed { from: id });
                    return;
                }
            }
        }
    })
}
