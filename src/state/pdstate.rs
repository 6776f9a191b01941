//! Probabilistic states.

use crate::Probability;
use crate::Value;
use crate::EPSILON;

/// a discrete probability distribution: strictly increasing values with
/// matching positive probabilities summing to 1.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscretePD {
    values: Vec<Value>,
    probabilities: Vec<Probability>,
}

impl DiscretePD {
    /// builds a `DiscretePD` from unsorted (value, probability) pairs,
    /// merging duplicate values as `evaluate_pd` must.
    pub fn new(mut pairs: Vec<(Value, Probability)>) -> Self {
        pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).expect("non-NaN domain value"));
        let mut values: Vec<Value> = Vec::with_capacity(pairs.len());
        let mut probabilities: Vec<Probability> = Vec::with_capacity(pairs.len());
        for (v, p) in pairs {
            if p <= 0.0 {
                continue;
            }
            if let Some(last) = values.last().copied() {
                if (last - v).abs() < EPSILON {
                    *probabilities.last_mut().unwrap() += p;
                    continue;
                }
            }
            values.push(v);
            probabilities.push(p);
        }
        let pd = Self { values, probabilities };
        debug_assert!(pd.is_valid(), "DiscretePD invariant violated: {pd:?}");
        pd
    }

    pub fn dirac(value: Value) -> Self {
        Self {
            values: vec![value],
            probabilities: vec![1.0],
        }
    }

    pub fn bernoulli(p: Probability) -> Self {
        // Bernoulli(p) returns {0: 1-p, 1: p} with clamping.
        let p = p.clamp(0.0, 1.0);
        if p <= 0.0 {
            return Self::dirac(0.0);
        }
        if p >= 1.0 {
            return Self::dirac(1.0);
        }
        Self {
            values: vec![0.0, 1.0],
            probabilities: vec![1.0 - p, p],
        }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn probabilities(&self) -> &[Probability] {
        &self.probabilities
    }

    pub fn pairs(&self) -> impl Iterator<Item = (Value, Probability)> + '_ {
        self.values.iter().copied().zip(self.probabilities.iter().copied())
    }

    pub fn is_dirac(&self) -> bool {
        self.values.len() == 1
    }

    /// for boolean-valued distributions: probability mass on a nonzero
    /// value.
    pub fn truth_probability(&self) -> Probability {
        self.pairs().filter(|(v, _)| *v != 0.0).map(|(_, p)| p).sum()
    }

    pub fn falsity_probability(&self) -> Probability {
        1.0 - self.truth_probability()
    }

    pub fn mode(&self) -> Value {
        self.pairs()
            .max_by(|a, b| a.1.partial_cmp(&b.1).expect("non-NaN probability"))
            .map(|(v, _)| v)
            .expect("DiscretePD is never empty")
    }

    /// sum(probabilities) == 1 (within epsilon), values strictly
    /// increasing, probabilities positive.
    pub fn is_valid(&self) -> bool {
        if self.values.is_empty() || self.values.len() != self.probabilities.len() {
            return false;
        }
        if self.values.windows(2).any(|w| w[0] >= w[1]) {
            return false;
        }
        if self.probabilities.iter().any(|&p| p <= 0.0) {
            return false;
        }
        (self.probabilities.iter().sum::<f64>() - 1.0).abs() < EPSILON
    }

    /// draws a concrete value from this distribution using `rng`,
    /// keeping sampling on the single shared PRNG stream.
    pub fn sample(&self, rng: &mut (impl rand::Rng + ?Sized)) -> Value {
        let draw: f64 = rng.random();
        let mut cumulative = 0.0;
        for (v, p) in self.pairs() {
            cumulative += p;
            if draw < cumulative {
                return v;
            }
        }
        *self.values.last().expect("DiscretePD is never empty")
    }
}

/// a probabilistic successor state: deterministic fluents hold a plain
/// value, probabilistic ones hold a [`DiscretePD`].
#[derive(Debug, Clone)]
pub enum PDSlot {
    Dirac(Value),
    Dist(DiscretePD),
}

impl PDSlot {
    pub fn is_dirac(&self) -> bool {
        matches!(self, PDSlot::Dirac(_)) || matches!(self, PDSlot::Dist(pd) if pd.is_dirac())
    }

    pub fn resolved_value(&self) -> Option<Value> {
        match self {
            PDSlot::Dirac(v) => Some(*v),
            PDSlot::Dist(pd) if pd.is_dirac() => Some(pd.values()[0]),
            PDSlot::Dist(_) => None,
        }
    }

    pub fn sample(&self, rng: &mut (impl rand::Rng + ?Sized)) -> Value {
        match self {
            PDSlot::Dirac(v) => *v,
            PDSlot::Dist(pd) => pd.sample(rng),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PDState {
    slots: Vec<PDSlot>,
    steps_to_go: u32,
}

impl PDState {
    pub fn new(slots: Vec<PDSlot>, steps_to_go: u32) -> Self {
        Self { slots, steps_to_go }
    }

    pub fn slots(&self) -> &[PDSlot] {
        &self.slots
    }

    pub fn slots_mut(&mut self) -> &mut [PDSlot] {
        &mut self.slots
    }

    pub fn steps_to_go(&self) -> u32 {
        self.steps_to_go
    }

    /// index of the last slot that is not (yet) resolved to a Dirac
    /// value, or `None` if the whole transition is deterministic.
    pub fn last_non_dirac(&self) -> Option<usize> {
        self.slots.iter().rposition(|s| s.resolved_value().is_none())
    }

    /// draws a concrete [`super::State`] by sampling each slot.
    pub fn sample(&self, rng: &mut (impl rand::Rng + ?Sized), params: &super::hashkeys::HashParams) -> super::State {
        let values = self.slots.iter().map(|s| s.sample(rng)).collect();
        super::State::make(values, self.steps_to_go, params)
    }

    /// joint probability of sampling exactly `values` from this
    /// distribution, slot by slot; `values` must have one entry per
    /// slot, in slot order.
    pub fn probability_of(&self, values: &[Value]) -> Probability {
        self.slots
            .iter()
            .zip(values)
            .map(|(slot, &v)| match slot {
                PDSlot::Dirac(d) => {
                    if (*d - v).abs() < EPSILON {
                        1.0
                    } else {
                        0.0
                    }
                }
                PDSlot::Dist(pd) => pd.pairs().find(|(pv, _)| (*pv - v).abs() < EPSILON).map(|(_, p)| p).unwrap_or(0.0),
            })
            .product()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discrete_pd_merges_duplicates_and_sorts() {
        let pd = DiscretePD::new(vec![(1.0, 0.2), (0.0, 0.3), (1.0, 0.1), (2.0, 0.4)]);
        assert_eq!(pd.values, &[0.0, 1.0, 2.0]);
        assert!((pd.probabilities[1] - 0.3).abs() < 1e-9);
        assert!(pd.is_valid());
    }

    #[test]
    fn bernoulli_clamps_out_of_range_probabilities() {
        assert!(DiscretePD::bernoulli(-1.0).is_dirac());
        assert_eq!(DiscretePD::bernoulli(-1.0).values, &[0.0]);
        assert!(DiscretePD::bernoulli(2.0).is_dirac());
        assert_eq!(DiscretePD::bernoulli(2.0).values, &[1.0]);
    }

    #[test]
    fn truth_and_falsity_probability_are_complementary() {
        let pd = DiscretePD::bernoulli(0.3);
        assert!((pd.truth_probability() - 0.3).abs() < 1e-9);
        assert!((pd.falsity_probability() - 0.7).abs() < 1e-9);
    }
}
