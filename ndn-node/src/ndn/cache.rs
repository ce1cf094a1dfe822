// Content cache with least-recently-used eviction.

use std::collections::BTreeMap;

use log::debug;

use ndn_common::wire::ObjectName;

/// Bounded LRU set of object names known to exist in the overlay.
///
/// Access recency is tracked with a monotonically increasing logical clock
/// rather than wall time, so two accesses within the same instant still
/// order. Membership tests count as accesses.
#[derive(Debug)]
pub struct ContentCache {
    entries: BTreeMap<ObjectName, u64>,
    clock: u64,
    capacity: usize,
}

impl ContentCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            clock: 0,
            capacity,
        }
    }

    /// Membership test; a hit refreshes the entry's access stamp.
    pub fn contains(&mut self, name: &ObjectName) -> bool {
        self.clock += 1;
        match self.entries.get_mut(name) {
            Some(stamp) => {
                *stamp = self.clock;
                true
            }
            None => false,
        }
    }

    /// Admits a name, refreshing it if already present. A full cache
    /// evicts its least recently accessed entry first.
    pub fn insert(&mut self, name: ObjectName) {
        if self.capacity == 0 {
            return;
        }
        self.clock += 1;
        if let Some(stamp) = self.entries.get_mut(&name) {
            *stamp = self.clock;
            return;
        }
        if self.entries.len() >= self.capacity {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, stamp)| **stamp)
                .map(|(name, _)| name.clone());
            if let Some(oldest) = oldest {
                debug!("cache full, evicting '{oldest}'");
                self.entries.remove(&oldest);
            }
        }
        self.entries.insert(name, self.clock);
    }

    /// Entries with their access stamps, in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&ObjectName, u64)> {
        self.entries.iter().map(|(name, stamp)| (name, *stamp))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> ObjectName {
        ObjectName::new(s).unwrap()
    }

    fn names(cache: &ContentCache) -> Vec<String> {
        cache.iter().map(|(n, _)| n.to_string()).collect()
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut cache = ContentCache::new(3);
        for n in ["a", "b", "c", "d", "e"] {
            cache.insert(name(n));
        }
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn evicts_least_recently_accessed() {
        // retrieve a, retrieve b, access a, retrieve c: b is the victim.
        let mut cache = ContentCache::new(2);
        cache.insert(name("a"));
        cache.insert(name("b"));
        assert!(cache.contains(&name("a")));
        cache.insert(name("c"));
        assert_eq!(names(&cache), vec!["a", "c"]);
    }

    #[test]
    fn reinsert_refreshes_instead_of_duplicating() {
        let mut cache = ContentCache::new(2);
        cache.insert(name("a"));
        cache.insert(name("b"));
        cache.insert(name("a"));
        cache.insert(name("c"));
        assert_eq!(names(&cache), vec!["a", "c"]);
    }

    #[test]
    fn miss_does_not_insert() {
        let mut cache = ContentCache::new(2);
        assert!(!cache.contains(&name("ghost")));
        assert!(cache.is_empty());
    }
}
