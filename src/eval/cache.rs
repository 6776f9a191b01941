//! The caching policies an [`super::Evaluatable`] can run under.

use crate::HashKey;
use std::collections::HashMap;

/// *none*: never stores. *map*: a hash map keyed by fluent hash key,
/// grows unbounded. *vector*: a dense `Vec` indexed directly by hash
/// key, sized at load time from the evaluatable's domain analysis —
/// faster but only viable when the key space is small enough not to
/// overflow. *disabled-map*: a map cache whose writes have been turned
/// off by the memory watchdog; reads still consult whatever was
/// already stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    None,
    Map,
    Vector,
    DisabledMap,
}

/// stores values of one evaluation mode (probabilistic or Kleene) for
/// one evaluatable, behind whichever [`CachePolicy`] task load chose.
#[derive(Debug, Clone)]
pub struct Cache<V> {
    policy: CachePolicy,
    map: HashMap<HashKey, V>,
    vector: Vec<Option<V>>,
}

impl<V: Clone> Cache<V> {
    pub fn new(policy: CachePolicy, vector_capacity: usize) -> Self {
        let vector = if policy == CachePolicy::Vector {
            vec![None; vector_capacity]
        } else {
            Vec::new()
        };
        Self {
            policy,
            map: HashMap::new(),
            vector,
        }
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// the disabled variant still serves reads from whatever was
    /// cached before it was disabled.
    pub fn get(&self, key: HashKey) -> Option<V> {
        match self.policy {
            CachePolicy::None => None,
            CachePolicy::Vector => usize::try_from(key).ok().and_then(|i| self.vector.get(i)).and_then(|v| v.clone()),
            CachePolicy::Map | CachePolicy::DisabledMap => self.map.get(&key).cloned(),
        }
    }

    pub fn store(&mut self, key: HashKey, value: V) {
        match self.policy {
            CachePolicy::None | CachePolicy::DisabledMap => {}
            CachePolicy::Vector => {
                if let Ok(i) = usize::try_from(key) {
                    if i < self.vector.len() {
                        self.vector[i] = Some(value);
                    }
                }
            }
            CachePolicy::Map => {
                self.map.insert(key, value);
            }
        }
    }

    /// the planner's memory watchdog trips: stop accepting new map
    /// entries without discarding what is already cached.
    pub fn disable_writes(&mut self) {
        if self.policy == CachePolicy::Map {
            self.policy = CachePolicy::DisabledMap;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_policy_never_stores() {
        let mut cache: Cache<f64> = Cache::new(CachePolicy::None, 0);
        cache.store(1, 42.0);
        assert_eq!(cache.get(1), None);
    }

    #[test]
    fn vector_policy_indexes_directly_and_ignores_out_of_range() {
        let mut cache: Cache<f64> = Cache::new(CachePolicy::Vector, 4);
        cache.store(2, 9.0);
        cache.store(100, 1.0);
        assert_eq!(cache.get(2), Some(9.0));
        assert_eq!(cache.get(100), None);
    }

    #[test]
    fn disabled_map_keeps_old_reads_but_drops_new_writes() {
        let mut cache: Cache<f64> = Cache::new(CachePolicy::Map, 0);
        cache.store(1, 5.0);
        cache.disable_writes();
        cache.store(2, 6.0);
        assert_eq!(cache.get(1), Some(5.0));
        assert_eq!(cache.get(2), None);
    }
}
