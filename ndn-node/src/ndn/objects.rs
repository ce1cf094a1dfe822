// Locally published object names.

use std::collections::BTreeSet;

use thiserror::Error;

use ndn_common::wire::ObjectName;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("local object limit reached ({0})")]
pub struct ObjectStoreFull(pub usize);

/// Bounded set of names this node publishes. Names are unique.
#[derive(Debug)]
pub struct ObjectStore {
    names: BTreeSet<ObjectName>,
    capacity: usize,
}

impl ObjectStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            names: BTreeSet::new(),
            capacity,
        }
    }

    /// Publishes a name. Returns whether it was newly added; an existing
    /// name is a no-op.
    pub fn create(&mut self, name: ObjectName) -> Result<bool, ObjectStoreFull> {
        if self.names.contains(&name) {
            return Ok(false);
        }
        if self.names.len() >= self.capacity {
            return Err(ObjectStoreFull(self.capacity));
        }
        self.names.insert(name);
        Ok(true)
    }

    /// Removes a name; returns whether it was present.
    pub fn delete(&mut self, name: &ObjectName) -> bool {
        self.names.remove(name)
    }

    pub fn contains(&self, name: &ObjectName) -> bool {
        self.names.contains(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ObjectName> {
        self.names.iter()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
