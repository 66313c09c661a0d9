//! Listener registry: per-adapter map from caller listener id to the
//! adapter's bridge object for that listener.
//!
//! Shared between the registration API and backend callback dispatch,
//! so every mutation is a single critical section. Callers must not
//! invoke listener callbacks while holding the lock: take a
//! [`snapshot`](Registry::snapshot) and dispatch outside it.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::listener::ListenerId;

/// Identity-keyed bridge map. At most one bridge per id.
#[derive(Debug)]
pub struct Registry<B> {
    entries: Mutex<HashMap<ListenerId, B>>,
}

impl<B> Default for Registry<B> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<B: Clone> Registry<B> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the bridge built by `make` unless `id` is already present.
    ///
    /// `make` runs under the lock only when inserting. Returns the newly
    /// inserted bridge, or `None` if the id was already registered.
    pub fn insert_if_absent(&self, id: ListenerId, make: impl FnOnce() -> B) -> Option<B> {
        let mut entries = self.entries.lock();
        if entries.contains_key(&id) {
            return None;
        }
        let bridge = make();
        entries.insert(id, bridge.clone());
        Some(bridge)
    }

    /// Store `bridge` under `id`, returning the bridge it replaced.
    pub fn replace(&self, id: ListenerId, bridge: B) -> Option<B> {
        self.entries.lock().insert(id, bridge)
    }

    /// Remove and return the bridge for `id`. Unknown ids are a no-op.
    pub fn remove(&self, id: ListenerId) -> Option<B> {
        self.entries.lock().remove(&id)
    }

    /// Clone of the bridge stored under `id`.
    pub fn get(&self, id: ListenerId) -> Option<B> {
        self.entries.lock().get(&id).cloned()
    }

    /// Whether `id` currently has a bridge.
    pub fn contains(&self, id: ListenerId) -> bool {
        self.entries.lock().contains_key(&id)
    }

    /// Number of registered ids.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Clone of every live bridge, for dispatch outside the lock.
    pub fn snapshot(&self) -> Vec<B> {
        self.entries.lock().values().cloned().collect()
    }

    /// Remove every entry in one step (bulk teardown).
    pub fn drain(&self) -> Vec<(ListenerId, B)> {
        self.entries.lock().drain().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::LocationHandle;
    use crate::location::Location;

    fn id() -> ListenerId {
        LocationHandle::new(|_: &Location| {}).id()
    }

    #[test]
    fn insert_if_absent_is_idempotent() {
        let r: Registry<&str> = Registry::new();
        let k = id();
        assert_eq!(r.insert_if_absent(k, || "first"), Some("first"));
        assert_eq!(r.insert_if_absent(k, || "second"), None);
        assert_eq!(r.len(), 1);
        assert_eq!(r.get(k), Some("first"));
    }

    #[test]
    fn insert_if_absent_skips_factory_when_present() {
        let r: Registry<u32> = Registry::new();
        let k = id();
        r.insert_if_absent(k, || 1);
        r.insert_if_absent(k, || panic!("factory must not run for a known id"));
    }

    #[test]
    fn replace_returns_previous() {
        let r: Registry<u32> = Registry::new();
        let k = id();
        assert_eq!(r.replace(k, 1), None);
        assert_eq!(r.replace(k, 2), Some(1));
        assert_eq!(r.len(), 1);
        assert_eq!(r.get(k), Some(2));
    }

    #[test]
    fn remove_unknown_is_noop() {
        let r: Registry<u32> = Registry::new();
        r.replace(id(), 7);
        assert_eq!(r.remove(id()), None);
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn remove_exactly_once() {
        let r: Registry<u32> = Registry::new();
        let k = id();
        r.replace(k, 7);
        assert_eq!(r.remove(k), Some(7));
        assert_eq!(r.remove(k), None);
        assert!(!r.contains(k));
    }

    #[test]
    fn drain_empties_registry() {
        let r: Registry<u32> = Registry::new();
        for v in 0..5 {
            r.replace(id(), v);
        }
        let mut drained: Vec<u32> = r.drain().into_iter().map(|(_, v)| v).collect();
        drained.sort_unstable();
        assert_eq!(drained, vec![0, 1, 2, 3, 4]);
        assert!(r.is_empty());
    }

    #[test]
    fn snapshot_leaves_entries_in_place() {
        let r: Registry<u32> = Registry::new();
        r.replace(id(), 1);
        r.replace(id(), 2);
        assert_eq!(r.snapshot().len(), 2);
        assert_eq!(r.len(), 2);
    }
}
