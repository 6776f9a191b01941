//! Concrete states ("State").

use super::hashkeys::HashParams;
use crate::HashKey;
use crate::Value;

/// a concrete state: the values of all state fluents (deterministic
/// ones first, probabilistic ones after), a steps-to-go counter, and
/// the two precomputed hash fields.
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    values: Vec<Value>,
    steps_to_go: u32,
    hash_key: HashKey,
    fluent_hash_keys: Vec<HashKey>,
}

impl State {
    /// `make_state`: assigns values, then computes per-evaluatable
    /// state-fluent hash keys and the state hash key.
    pub fn make(values: Vec<Value>, steps_to_go: u32, params: &HashParams) -> Self {
        let hash_key = params.calc_state_hash_key(&values);
        let fluent_hash_keys = params.calc_state_fluent_hash_keys(&values);
        Self {
            values,
            steps_to_go,
            hash_key,
            fluent_hash_keys,
        }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn value(&self, fluent: usize) -> Value {
        self.values[fluent]
    }

    pub fn steps_to_go(&self) -> u32 {
        self.steps_to_go
    }

    pub fn hash_key(&self) -> HashKey {
        self.hash_key
    }

    pub fn fluent_hash_key(&self, evaluatable: usize) -> HashKey {
        self.fluent_hash_keys[evaluatable]
    }

    /// recompute both hash fields from scratch; used by the round-trip
    /// property test below.
    pub fn recompute_hash(&self, params: &HashParams) -> (HashKey, Vec<HashKey>) {
        (
            params.calc_state_hash_key(&self.values),
            params.calc_state_fluent_hash_keys(&self.values),
        )
    }

    /// a successor state one step closer to the horizon, with fresh
    /// values but the same hash machinery.
    pub fn successor(&self, values: Vec<Value>, params: &HashParams) -> Self {
        Self::make(values, self.steps_to_go.saturating_sub(1), params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::hashkeys::HashParams;

    #[test]
    fn hash_key_matches_recomputation_from_scratch() {
        let table = vec![vec![0, 7], vec![0, 1, 2]];
        let params = HashParams::new(table, vec![Vec::new(); 2], 0, vec![0, 0], true, false);
        let state = State::make(vec![1.0, 2.0], 3, &params);
        let (hash, fluents) = state.recompute_hash(&params);
        assert_eq!(hash, state.hash_key);
        assert_eq!(fluents, state.fluent_hash_keys);
    }
}
