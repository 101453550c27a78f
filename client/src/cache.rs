//! Query cache: query key -> last result, staleness, last error.
//!
//! Entries are never patched in place. A mutation marks its queries stale
//! and the owner re-fetches them in full. Each invalidation bumps the
//! entry's generation; a fetch that began under an older generation is
//! discarded when it resolves, so it can never make stale data look fresh.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Instant;

use crate::error::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Tasks,
}

#[derive(Debug, Clone)]
pub struct QueryEntry<V> {
    pub data: Option<V>,
    pub stale: bool,
    pub error: Option<TransportError>,
    pub fetching: usize,
    pub generation: u64,
    pub updated_at: Option<Instant>,
}

impl<V> Default for QueryEntry<V> {
    fn default() -> Self {
        Self {
            data: None,
            stale: false,
            error: None,
            fetching: 0,
            generation: 0,
            updated_at: None,
        }
    }
}

impl<V> QueryEntry<V> {
    pub fn needs_fetch(&self) -> bool {
        self.data.is_none() || self.stale
    }

    pub fn is_fetching(&self) -> bool {
        self.fetching > 0
    }
}

#[derive(Debug, Clone)]
pub struct QueryCache<K, V> {
    entries: HashMap<K, QueryEntry<V>>,
}

impl<K, V> Default for QueryCache<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash, V> QueryCache<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &K) -> Option<&QueryEntry<V>> {
        self.entries.get(key)
    }

    pub fn data(&self, key: &K) -> Option<&V> {
        self.entries.get(key).and_then(|entry| entry.data.as_ref())
    }

    /// True when the key has never resolved successfully or was invalidated.
    pub fn needs_fetch(&self, key: &K) -> bool {
        self.entries.get(key).map_or(true, QueryEntry::needs_fetch)
    }

    pub fn is_fetching(&self, key: &K) -> bool {
        self.entries.get(key).is_some_and(QueryEntry::is_fetching)
    }

    /// Registers a fetch and returns the generation it was started under.
    pub fn begin_fetch(&mut self, key: K) -> u64 {
        let entry = self.entries.entry(key).or_default();
        entry.fetching += 1;
        entry.generation
    }

    /// Records the outcome of a fetch started with [`begin_fetch`].
    ///
    /// Success replaces the data and clears staleness and error. Failure
    /// keeps whatever data was there and records the error. If the query
    /// was invalidated after the fetch began, the result is dropped and the
    /// entry stays as it is. Returns whether the result was applied.
    ///
    /// [`begin_fetch`]: QueryCache::begin_fetch
    pub fn resolve(
        &mut self,
        key: K,
        generation: u64,
        result: Result<V, TransportError>,
    ) -> bool {
        let entry = self.entries.entry(key).or_default();
        entry.fetching = entry.fetching.saturating_sub(1);
        if entry.generation != generation {
            return false;
        }
        match result {
            Ok(data) => {
                entry.data = Some(data);
                entry.stale = false;
                entry.error = None;
                entry.updated_at = Some(Instant::now());
            }
            Err(err) => entry.error = Some(err),
        }
        true
    }

    /// Drops a fetch that will never resolve, e.g. because its future was
    /// dropped. Data, staleness and error are left alone.
    pub fn abandon_fetch(&mut self, key: &K) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.fetching = entry.fetching.saturating_sub(1);
        }
    }

    /// Marks a query stale. Returns whether anything was cached under it.
    pub fn invalidate(&mut self, key: &K) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.stale = true;
                entry.generation += 1;
                true
            }
            None => false,
        }
    }

    pub fn invalidate_all(&mut self) {
        for entry in self.entries.values_mut() {
            entry.stale = true;
            entry.generation += 1;
        }
    }

    pub fn remove(&mut self, key: &K) -> Option<QueryEntry<V>> {
        self.entries.remove(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Operation;

    fn failure() -> TransportError {
        TransportError::status(Operation::List, 503, "unavailable")
    }

    #[test]
    fn empty_cache_needs_fetch() {
        let cache: QueryCache<QueryKey, Vec<u32>> = QueryCache::new();
        assert!(cache.needs_fetch(&QueryKey::Tasks));
        assert!(!cache.is_fetching(&QueryKey::Tasks));
        assert!(cache.data(&QueryKey::Tasks).is_none());
    }

    #[test]
    fn fetch_lifecycle() {
        let mut cache = QueryCache::new();
        let generation = cache.begin_fetch(QueryKey::Tasks);
        assert!(cache.is_fetching(&QueryKey::Tasks));

        assert!(cache.resolve(QueryKey::Tasks, generation, Ok(vec![1, 2])));
        assert!(!cache.is_fetching(&QueryKey::Tasks));
        assert!(!cache.needs_fetch(&QueryKey::Tasks));
        assert_eq!(cache.data(&QueryKey::Tasks), Some(&vec![1, 2]));
        assert!(cache.get(&QueryKey::Tasks).unwrap().updated_at.is_some());
    }

    #[test]
    fn invalidate_marks_stale_but_keeps_data() {
        let mut cache = QueryCache::new();
        assert!(!cache.invalidate(&QueryKey::Tasks));

        let generation = cache.begin_fetch(QueryKey::Tasks);
        cache.resolve(QueryKey::Tasks, generation, Ok(vec![1]));
        assert!(cache.invalidate(&QueryKey::Tasks));
        assert!(cache.needs_fetch(&QueryKey::Tasks));
        assert_eq!(cache.data(&QueryKey::Tasks), Some(&vec![1]));

        let generation = cache.begin_fetch(QueryKey::Tasks);
        cache.resolve(QueryKey::Tasks, generation, Ok(vec![1, 3]));
        assert!(!cache.needs_fetch(&QueryKey::Tasks));
    }

    #[test]
    fn fetch_started_before_invalidation_is_discarded() {
        let mut cache = QueryCache::new();
        let old = cache.begin_fetch(QueryKey::Tasks);
        assert!(cache.invalidate(&QueryKey::Tasks));

        let new = cache.begin_fetch(QueryKey::Tasks);
        assert_ne!(old, new);
        assert!(cache.resolve(QueryKey::Tasks, new, Ok(vec![1])));
        assert!(!cache.resolve(QueryKey::Tasks, old, Ok(vec![])));

        let entry = cache.get(&QueryKey::Tasks).unwrap();
        assert_eq!(entry.data, Some(vec![1]));
        assert!(!entry.stale);
        assert_eq!(entry.fetching, 0);
    }

    #[test]
    fn outdated_fetch_cannot_clear_staleness() {
        let mut cache = QueryCache::new();
        let generation = cache.begin_fetch(QueryKey::Tasks);
        cache.invalidate(&QueryKey::Tasks);

        assert!(!cache.resolve(QueryKey::Tasks, generation, Ok(vec![5])));
        assert!(cache.needs_fetch(&QueryKey::Tasks));
        assert!(cache.data(&QueryKey::Tasks).is_none());

        let generation = cache.begin_fetch(QueryKey::Tasks);
        cache.invalidate_all();
        assert!(!cache.resolve(QueryKey::Tasks, generation, Err(failure())));
        assert_eq!(cache.get(&QueryKey::Tasks).unwrap().error, None);
    }

    #[test]
    fn failed_fetch_keeps_previous_data() {
        let mut cache = QueryCache::new();
        let generation = cache.begin_fetch(QueryKey::Tasks);
        cache.resolve(QueryKey::Tasks, generation, Ok(vec![7]));
        cache.invalidate_all();

        let generation = cache.begin_fetch(QueryKey::Tasks);
        cache.resolve(QueryKey::Tasks, generation, Err(failure()));

        let entry = cache.get(&QueryKey::Tasks).unwrap();
        assert_eq!(entry.data, Some(vec![7]));
        assert_eq!(entry.error, Some(failure()));
        assert!(entry.stale);

        let generation = cache.begin_fetch(QueryKey::Tasks);
        cache.resolve(QueryKey::Tasks, generation, Ok(vec![]));
        assert_eq!(cache.get(&QueryKey::Tasks).unwrap().error, None);
    }

    #[test]
    fn overlapping_fetches_are_counted() {
        let mut cache: QueryCache<QueryKey, Vec<u32>> = QueryCache::new();
        let first = cache.begin_fetch(QueryKey::Tasks);
        let second = cache.begin_fetch(QueryKey::Tasks);
        cache.resolve(QueryKey::Tasks, first, Ok(vec![1]));
        assert!(cache.is_fetching(&QueryKey::Tasks));
        cache.resolve(QueryKey::Tasks, second, Ok(vec![2]));
        assert!(!cache.is_fetching(&QueryKey::Tasks));
        // same generation: last to resolve wins
        assert_eq!(cache.data(&QueryKey::Tasks), Some(&vec![2]));

        cache.begin_fetch(QueryKey::Tasks);
        cache.abandon_fetch(&QueryKey::Tasks);
        assert!(!cache.is_fetching(&QueryKey::Tasks));
        assert_eq!(cache.data(&QueryKey::Tasks), Some(&vec![2]));

        assert!(cache.remove(&QueryKey::Tasks).is_some());
        assert!(cache.needs_fetch(&QueryKey::Tasks));
    }
}
