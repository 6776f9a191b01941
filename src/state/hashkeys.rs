//! Task-load-computed hashing parameters. These are produced
//! once when a [`crate::task::Task`] is built and then shared (by
//! reference) by every [`super::State`]/[`super::kleene::KleeneState`]
//! constructed against that task.

use crate::HashKey;
use crate::HASH_DISABLED;

/// per-evaluatable hash-key parameters computed at task-load time so
/// that every reachable combination of influencing fluents produces a
/// unique key.
#[derive(Debug, Clone, Default)]
pub struct HashParams {
    /// whether any hashing is enabled for this task at all. When false,
    /// every `calc_*_hash_key` call returns [`HASH_DISABLED`].
    enabled: bool,
    /// `state_hash_table[fluent][value]` is the contribution of
    /// `fluent == value` to the whole-state hash key.
    state_hash_table: Vec<Vec<HashKey>>,
    /// `fluent_hash_factors[fluent]` lists `(evaluatable_index, factor)`
    /// pairs: fluent `i` taking value `v` contributes `v * factor` to
    /// `fluent_hash_keys[evaluatable_index]`.
    fluent_hash_factors: Vec<Vec<(usize, HashKey)>>,
    /// number of cacheable evaluatables (CPFs + reward + preconditions);
    /// sizes `State::fluent_hash_keys`.
    num_evaluatables: usize,
    /// per-fluent multiplier for the Kleene packed-bitmask hash.
    kleene_base: Vec<HashKey>,
    kleene_enabled: bool,
}

impl HashParams {
    pub fn new(
        state_hash_table: Vec<Vec<HashKey>>,
        fluent_hash_factors: Vec<Vec<(usize, HashKey)>>,
        num_evaluatables: usize,
        kleene_base: Vec<HashKey>,
        enabled: bool,
        kleene_enabled: bool,
    ) -> Self {
        Self {
            enabled,
            state_hash_table,
            fluent_hash_factors,
            num_evaluatables,
            kleene_base,
            kleene_enabled,
        }
    }

    pub fn disabled(num_fluents: usize, num_evaluatables: usize) -> Self {
        Self {
            enabled: false,
            state_hash_table: vec![Vec::new(); num_fluents],
            fluent_hash_factors: vec![Vec::new(); num_fluents],
            num_evaluatables,
            kleene_base: vec![0; num_fluents],
            kleene_enabled: false,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn kleene_enabled(&self) -> bool {
        self.kleene_enabled
    }

    pub fn num_evaluatables(&self) -> usize {
        self.num_evaluatables
    }

    /// `calc_state_hash_key`: if hashing enabled, hash is the sum over
    /// fluent index i of `per_value_table[i][state[i]]`; else −1.
    pub fn calc_state_hash_key(&self, values: &[crate::Value]) -> HashKey {
        if !self.enabled {
            return HASH_DISABLED;
        }
        let mut key: HashKey = 0;
        for (i, &v) in values.iter().enumerate() {
            let idx = v.round() as usize;
            if let Some(contrib) = self.state_hash_table[i].get(idx) {
                key += *contrib;
            }
        }
        key
    }

    /// `calc_state_fluent_hash_keys`: for each fluent i with value
    /// v>0 and each affected evaluatable e, add `v * factor[i][e]` into
    /// `fluent_hash_keys[e]`.
    pub fn calc_state_fluent_hash_keys(&self, values: &[crate::Value]) -> Vec<HashKey> {
        let mut keys = vec![0 as HashKey; self.num_evaluatables];
        if !self.enabled {
            return keys;
        }
        for (i, &v) in values.iter().enumerate() {
            if v <= 0.0 {
                continue;
            }
            for &(evaluatable, factor) in &self.fluent_hash_factors[i] {
                keys[evaluatable] += (v.round() as HashKey) * factor;
            }
        }
        keys
    }

    pub fn kleene_base(&self, fluent: usize) -> HashKey {
        self.kleene_base.get(fluent).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_hashing_yields_sentinel() {
        let params = HashParams::disabled(2, 3);
        assert_eq!(params.calc_state_hash_key(&[1.0, 0.0]), HASH_DISABLED);
        assert_eq!(params.calc_state_fluent_hash_keys(&[1.0, 0.0]), vec![0, 0, 0]);
    }

    #[test]
    fn enabled_hashing_sums_per_value_contributions() {
        let table = vec![vec![0, 10], vec![0, 1, 2]];
        let params = HashParams::new(table, vec![Vec::new(); 2], 0, vec![0, 0], true, false);
        assert_eq!(params.calc_state_hash_key(&[1.0, 2.0]), 12);
        assert_eq!(params.calc_state_hash_key(&[0.0, 0.0]), 0);
    }

    #[test]
    fn fluent_hash_keys_accumulate_per_evaluatable() {
        // fluent 0 affects evaluatable 0 with factor 3, fluent 1 affects
        // both evaluatables with factor 1 and 5 respectively.
        let factors = vec![vec![(0usize, 3i64)], vec![(0usize, 1i64), (1usize, 5i64)]];
        let params = HashParams::new(Vec::new(), factors, 2, vec![0, 0], true, false);
        let keys = params.calc_state_fluent_hash_keys(&[2.0, 1.0]);
        assert_eq!(keys, vec![2 * 3 + 1 * 1, 1 * 5]);
    }
}
