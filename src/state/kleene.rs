//! Kleene (three-valued) states.

use super::hashkeys::HashParams;
use crate::HashKey;
use crate::Value;
use crate::HASH_DISABLED;
use std::collections::BTreeSet;

/// the over-approximate value set at one state-fluent slot: "the
/// variable is certainly one of these". Packed as a bitmask over
/// small domain-coded integers so the whole-state Kleene hash is cheap
/// to compute; bounded to 64 distinct domain values per fluent,
/// comfortably above any realistic enum/bool domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KleeneSlot(u64);

impl KleeneSlot {
    pub fn singleton(value: Value) -> Self {
        Self(1u64 << (value.round() as u32))
    }

    pub fn from_mask(mask: u64) -> Self {
        Self(mask)
    }

    pub fn mask(&self) -> u64 {
        self.0
    }

    pub fn contains(&self, value: Value) -> bool {
        (self.0 >> (value.round() as u32)) & 1 == 1
    }

    pub fn is_singleton(&self) -> bool {
        self.0.count_ones() == 1
    }

    pub fn singleton_value(&self) -> Option<Value> {
        if self.is_singleton() {
            Some(self.0.trailing_zeros() as Value)
        } else {
            None
        }
    }

    /// element-wise union, used by the Kleene-state join and by
    /// reward-lock detection's fixed point.
    pub fn union(&self, other: &Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn values(&self) -> impl Iterator<Item = Value> + '_ {
        (0..64).filter(move |b| (self.0 >> b) & 1 == 1).map(|b| b as Value)
    }

    pub fn min(&self) -> Value {
        self.0.trailing_zeros() as Value
    }

    pub fn max(&self) -> Value {
        (63 - self.0.leading_zeros()) as Value
    }
}

/// generic, unbounded value set returned by expression Kleene
/// evaluation: intermediate arithmetic results need not stay inside a
/// small fixed domain the way a state-fluent slot does.
pub type ValueSet = BTreeSet<ValueKey>;

/// `f64` wrapper with a total order, so values can live in a
/// `BTreeSet`. Domain-coded values are always finite, so `to_bits`
/// ordering (via `partial_cmp`, which never fails for them) is safe.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct ValueKey(pub Value);

impl Eq for ValueKey {}
impl Ord for ValueKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.partial_cmp(&other.0).expect("non-NaN value in Kleene set")
    }
}

pub fn singleton(v: Value) -> ValueSet {
    let mut s = ValueSet::new();
    s.insert(ValueKey(v));
    s
}

pub fn values_of(set: &ValueSet) -> impl Iterator<Item = Value> + '_ {
    set.iter().map(|k| k.0)
}

#[derive(Debug, Clone)]
pub struct KleeneState {
    slots: Vec<KleeneSlot>,
    steps_to_go: u32,
}

impl KleeneState {
    pub fn new(slots: Vec<KleeneSlot>, steps_to_go: u32) -> Self {
        Self { slots, steps_to_go }
    }

    pub fn from_state(state: &super::State) -> Self {
        let slots = state.values().iter().map(|&v| KleeneSlot::singleton(v)).collect();
        Self {
            slots,
            steps_to_go: state.steps_to_go(),
        }
    }

    pub fn slots(&self) -> &[KleeneSlot] {
        &self.slots
    }

    pub fn steps_to_go(&self) -> u32 {
        self.steps_to_go
    }

    /// the join of two Kleene states is element-wise union.
    pub fn join(&self, other: &Self) -> Self {
        let slots = self
            .slots
            .iter()
            .zip(other.slots.iter())
            .map(|(a, b)| a.union(b))
            .collect();
        Self {
            slots,
            steps_to_go: self.steps_to_go,
        }
    }

    /// does this Kleene state (value-set-wise) contain the concrete
    /// state `s`? (Kleene soundness law.)
    pub fn contains(&self, concrete: &super::State) -> bool {
        self.slots
            .iter()
            .zip(concrete.values().iter())
            .all(|(slot, &v)| slot.contains(v))
    }

    /// `calc_hash_key`: variable i contributes
    /// `popcount_mask(state[i]) * base[i]`.
    pub fn calc_hash_key(&self, params: &HashParams) -> HashKey {
        if !params.kleene_enabled() {
            return HASH_DISABLED;
        }
        self.slots
            .iter()
            .enumerate()
            .map(|(i, slot)| slot.mask() as HashKey * params.kleene_base(i))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_is_element_wise() {
        let a = KleeneSlot::singleton(0.0);
        let b = KleeneSlot::singleton(1.0);
        let u = a.union(&b);
        assert!(u.contains(0.0) && u.contains(1.0));
        assert!(!u.is_singleton());
    }

    #[test]
    fn kleene_state_contains_concrete_member() {
        let slots = vec![KleeneSlot::from_mask(0b11), KleeneSlot::singleton(1.0)];
        let kleene = KleeneState::new(slots, 2);
        let params = HashParams::disabled(2, 0);
        let concrete = super::super::State::make(vec![0.0, 1.0], 2, &params);
        assert!(kleene.contains(&concrete));
        let other = super::super::State::make(vec![1.0, 0.0], 2, &params);
        assert!(!kleene.contains(&other));
    }
}
