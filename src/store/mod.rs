//! Concurrency-safe per-route allow-lists.
//!
//! [`MatchStore`] maps a route identifier to the set of values cached for
//! it. Every operation takes the internal lock for exactly one call, so
//! callers never coordinate locking themselves. Persistence lives in
//! [`snapshot`].

pub mod snapshot;

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;

/// Serializable export of the whole store: route identifier to values.
pub type Snapshot = HashMap<String, Vec<String>>;

#[derive(Debug, Default)]
pub struct MatchStore {
    routes: RwLock<HashMap<String, HashSet<String>>>,
}

impl MatchStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `value` for `route`; `true` if it was not already present.
    pub fn add(&self, route: &str, value: impl Into<String>) -> bool {
        let mut routes = self.routes.write();
        match routes.get_mut(route) {
            Some(values) => values.insert(value.into()),
            None => {
                routes.insert(route.to_string(), HashSet::from([value.into()]));
                true
            }
        }
    }

    #[must_use]
    pub fn contains(&self, route: &str, value: &str) -> bool {
        self.routes
            .read()
            .get(route)
            .is_some_and(|values| values.contains(value))
    }

    #[must_use]
    pub fn size(&self, route: &str) -> usize {
        self.routes.read().get(route).map_or(0, HashSet::len)
    }

    /// Number of values cached across all routes.
    #[must_use]
    pub fn total(&self) -> usize {
        self.routes.read().values().map(HashSet::len).sum()
    }

    /// Drops every cached value and returns how many were removed.
    pub fn clear(&self) -> usize {
        let mut routes = self.routes.write();
        let removed = routes.values().map(HashSet::len).sum();
        routes.clear();
        removed
    }

    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.routes
            .read()
            .iter()
            .map(|(route, values)| (route.clone(), values.iter().cloned().collect()))
            .collect()
    }

    /// Replaces the whole store with `snapshot`.
    ///
    /// The new map is built before the write lock is taken, so readers
    /// observe either the previous contents or the loaded ones.
    pub fn load(&self, snapshot: Snapshot) {
        let loaded: HashMap<String, HashSet<String>> = snapshot
            .into_iter()
            .map(|(route, values)| (route, values.into_iter().collect()))
            .collect();
        *self.routes.write() = loaded;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn add_is_idempotent() {
        let store = MatchStore::new();
        assert!(store.add("route", "v"));
        assert_eq!(store.size("route"), 1);
        assert!(!store.add("route", "v"));
        assert_eq!(store.size("route"), 1);
    }

    #[test]
    fn unknown_route_is_empty() {
        let store = MatchStore::new();
        assert!(!store.contains("nope", "v"));
        assert_eq!(store.size("nope"), 0);
    }

    #[test]
    fn routes_are_isolated() {
        let store = MatchStore::new();
        store.add("routeA", "x");
        assert!(store.contains("routeA", "x"));
        assert!(!store.contains("routeB", "x"));
    }

    #[test]
    fn clear_reports_removed_count() {
        let store = MatchStore::new();
        store.add("route-a", "one");
        store.add("route-a", "two");
        store.add("route-b", "one");

        assert_eq!(store.clear(), 3);
        assert_eq!(store.size("route-a"), 0);
        assert_eq!(store.size("route-b"), 0);
        assert_eq!(store.clear(), 0);
    }

    #[test]
    fn snapshot_then_load_round_trips() {
        let store = MatchStore::new();
        store.add("route-a", "one");
        store.add("route-a", "two");
        store.add("route-b", "three");

        let restored = MatchStore::new();
        restored.add("stale", "gone");
        restored.load(store.snapshot());

        for (route, value) in [("route-a", "one"), ("route-a", "two"), ("route-b", "three")] {
            assert!(restored.contains(route, value), "{route}/{value} missing");
        }
        assert!(!restored.contains("stale", "gone"));
        assert_eq!(restored.total(), 3);
    }

    #[test]
    fn load_deduplicates_values() {
        let store = MatchStore::new();
        store.load(Snapshot::from([(
            "route".to_string(),
            vec!["a".to_string(), "a".to_string()],
        )]));
        assert_eq!(store.size("route"), 1);
    }

    #[test]
    fn concurrent_adds_count_each_value_once() {
        let store = Arc::new(MatchStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || (0..100).filter(|i| store.add("route", i.to_string())).count())
            })
            .collect();
        let inserted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(inserted, 100);
        assert_eq!(store.size("route"), 100);
    }

    #[test]
    fn readers_never_see_a_partial_load() {
        fn generation(tag: &str) -> Snapshot {
            let mut values: Vec<String> = (0..200).map(|i| format!("{tag}-{i}")).collect();
            values.push("shared".to_string());
            Snapshot::from([
                ("route-a".to_string(), values.clone()),
                ("route-b".to_string(), values),
            ])
        }

        let store = Arc::new(MatchStore::new());
        store.load(generation("old"));
        let done = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                let done = Arc::clone(&done);
                std::thread::spawn(move || {
                    let mut checks = 0usize;
                    while !done.load(std::sync::atomic::Ordering::Relaxed) || checks == 0 {
                        assert!(store.contains("route-a", "shared"));
                        assert_eq!(store.total(), 402);

                        let snapshot = store.snapshot();
                        let a = &snapshot["route-a"];
                        let tag = if a.iter().any(|v| v.starts_with("old-")) { "old-" } else { "new-" };
                        for values in snapshot.values() {
                            let own = values.iter().filter(|v| v.starts_with(tag)).count();
                            assert_eq!(own, 200, "mixed generations in one read");
                        }
                        checks += 1;
                    }
                    checks
                })
            })
            .collect();

        for round in 0..50 {
            store.load(generation(if round % 2 == 0 { "new" } else { "old" }));
        }
        done.store(true, std::sync::atomic::Ordering::Relaxed);

        for reader in readers {
            assert!(reader.join().unwrap() > 0);
        }
        assert!(store.contains("route-b", "old-0"));
    }
}
