// Pending Interest Table.
//
// INTENTION:
// Track every in-flight interest by `(id, name)` together with the
// interfaces it arrived on and was forwarded to. Interfaces reference
// neighbors by id only; the table never owns a socket. Entries are retired
// by the forwarding handlers the moment they lose their last waiting
// interface.

use std::fmt;

use thiserror::Error;

use ndn_common::wire::ObjectName;

use crate::network::NeighborId;

/// Maximum number of interface records per entry.
pub const MAX_INTEREST_INTERFACES: usize = 10;

/// Where an interest came from or was forwarded to. `User` is the local
/// user interface, distinct from any real link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interface {
    User,
    Peer(NeighborId),
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => f.write_str("user"),
            Self::Peer(id) => write!(f, "{id}"),
        }
    }
}

/// Per-interface state of a pending interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceState {
    /// The answer must be forwarded out this interface.
    Response,
    /// An interest was forwarded out this interface and no reply has
    /// arrived yet.
    Waiting,
    /// This interface answered NOOBJECT or its neighbor vanished.
    Closed,
}

impl fmt::Display for InterfaceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Response => "response",
            Self::Waiting => "waiting",
            Self::Closed => "closed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceRecord {
    pub interface: Interface,
    pub state: InterfaceState,
}

/// One in-flight interest.
#[derive(Debug, Clone)]
pub struct PitEntry {
    pub id: u8,
    pub name: ObjectName,
    interfaces: Vec<InterfaceRecord>,
}

impl PitEntry {
    fn new(id: u8, name: ObjectName, response: Interface) -> Self {
        Self {
            id,
            name,
            interfaces: vec![InterfaceRecord {
                interface: response,
                state: InterfaceState::Response,
            }],
        }
    }

    /// The interface the answer is owed to.
    pub fn response(&self) -> Option<Interface> {
        self.interfaces
            .iter()
            .find(|rec| rec.state == InterfaceState::Response)
            .map(|rec| rec.interface)
    }

    pub fn has_waiting(&self) -> bool {
        self.interfaces
            .iter()
            .any(|rec| rec.state == InterfaceState::Waiting)
    }

    /// Marks `interface` as the response interface, upgrading an existing
    /// record or adding one. Returns false when the record list is full.
    pub fn set_response(&mut self, interface: Interface) -> bool {
        if let Some(rec) = self.interfaces.iter_mut().find(|r| r.interface == interface) {
            rec.state = InterfaceState::Response;
            return true;
        }
        self.push(InterfaceRecord {
            interface,
            state: InterfaceState::Response,
        })
    }

    /// Records `interface` as forwarded-to. Returns false when the record
    /// list is full.
    pub fn add_waiting(&mut self, interface: Interface) -> bool {
        self.push(InterfaceRecord {
            interface,
            state: InterfaceState::Waiting,
        })
    }

    /// Closes the record for `interface`; returns whether one existed.
    pub fn mark_closed(&mut self, interface: Interface) -> bool {
        match self.interfaces.iter_mut().find(|r| r.interface == interface) {
            Some(rec) => {
                rec.state = InterfaceState::Closed;
                true
            }
            None => false,
        }
    }

    pub fn interfaces(&self) -> &[InterfaceRecord] {
        &self.interfaces
    }

    fn push(&mut self, record: InterfaceRecord) -> bool {
        if self.interfaces.len() >= MAX_INTEREST_INTERFACES {
            return false;
        }
        self.interfaces.push(record);
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("pending interest table is full ({0} entries)")]
pub struct PitFull(pub usize);

/// An entry retired as a side effect of a neighbor disappearing. The
/// retained `response` is where a NOOBJECT is still owed; `None` means the
/// vanished neighbor itself was the response interface and there is nobody
/// left to answer.
#[derive(Debug)]
pub struct RetiredInterest {
    pub response: Option<Interface>,
    pub id: u8,
    pub name: ObjectName,
}

/// Bounded table of pending interests, keyed by `(id, name)`.
#[derive(Debug)]
pub struct Pit {
    entries: Vec<PitEntry>,
    capacity: usize,
}

impl Pit {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity,
        }
    }

    /// Whether any entry uses this interest id, regardless of name. New
    /// retrievals draw ids from the complement of this set.
    pub fn contains_id(&self, id: u8) -> bool {
        self.entries.iter().any(|entry| entry.id == id)
    }

    pub fn find_mut(&mut self, id: u8, name: &ObjectName) -> Option<&mut PitEntry> {
        self.entries
            .iter_mut()
            .find(|entry| entry.id == id && entry.name == *name)
    }

    pub fn find(&self, id: u8, name: &ObjectName) -> Option<&PitEntry> {
        self.entries
            .iter()
            .find(|entry| entry.id == id && entry.name == *name)
    }

    /// Creates an entry whose response interface is `response`.
    pub fn insert(
        &mut self,
        id: u8,
        name: ObjectName,
        response: Interface,
    ) -> Result<&mut PitEntry, PitFull> {
        if self.entries.len() >= self.capacity {
            return Err(PitFull(self.capacity));
        }
        self.entries.push(PitEntry::new(id, name, response));
        let last = self.entries.len() - 1;
        Ok(&mut self.entries[last])
    }

    pub fn remove(&mut self, id: u8, name: &ObjectName) -> Option<PitEntry> {
        let index = self
            .entries
            .iter()
            .position(|entry| entry.id == id && entry.name == *name)?;
        Some(self.entries.remove(index))
    }

    /// Reacts to a neighbor disappearing: every record referring to it is
    /// closed, and entries left without a waiting interface (or without a
    /// live response interface) are retired and returned so the caller can
    /// deliver the NOOBJECTs still owed.
    pub fn detach_peer(&mut self, peer: NeighborId) -> Vec<RetiredInterest> {
        let target = Interface::Peer(peer);
        let mut retired = Vec::new();
        self.entries.retain_mut(|entry| {
            let mut touched = false;
            let mut response_lost = false;
            for rec in &mut entry.interfaces {
                if rec.interface == target {
                    touched = true;
                    if rec.state == InterfaceState::Response {
                        response_lost = true;
                    }
                    rec.state = InterfaceState::Closed;
                }
            }
            if !touched {
                return true;
            }
            if response_lost {
                retired.push(RetiredInterest {
                    response: None,
                    id: entry.id,
                    name: entry.name.clone(),
                });
                return false;
            }
            if !entry.has_waiting() {
                retired.push(RetiredInterest {
                    response: entry.response(),
                    id: entry.id,
                    name: entry.name.clone(),
                });
                return false;
            }
            true
        });
        retired
    }

    pub fn iter(&self) -> impl Iterator<Item = &PitEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
