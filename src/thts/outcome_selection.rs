//! Outcome sampling at chance nodes: draw a successor state from the
//! action's joint successor distribution, on the single shared PRNG
//! stream. Monte-Carlo draws directly; Unsolved-Monte-Carlo rescales
//! the joint across its not-yet-solved outcomes so trials keep probing
//! the part of the tree that still has something to learn.

use crate::state::hashkeys::HashParams;
use crate::state::{PDSlot, PDState, State};
use crate::{Probability, Value};
use rand::Rng;

pub trait OutcomeSelection: Send + Sync {
    /// `solved(state)` reports whether the successor already reached
    /// under that sample is known-solved; used by Unsolved-MC to bias
    /// resampling. Returning `false` for a never-before-seen state is
    /// always correct — it just means "nothing learned here yet".
    fn select_outcome(&self, pending: &PDState, params: &HashParams, solved: &dyn Fn(&State) -> bool, rng: &mut dyn rand::RngCore) -> State;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MonteCarlo;

impl OutcomeSelection for MonteCarlo {
    fn select_outcome(&self, pending: &PDState, params: &HashParams, _solved: &dyn Fn(&State) -> bool, rng: &mut dyn rand::RngCore) -> State {
        sample_joint(pending, params, rng)
    }
}

/// Unsolved-MC: enumerate the joint's support, drop outcomes already
/// known-solved, renormalize the remaining probability mass, and sample
/// from that; falls back to a plain draw once every outcome is solved.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsolvedMonteCarlo;

impl OutcomeSelection for UnsolvedMonteCarlo {
    fn select_outcome(&self, pending: &PDState, params: &HashParams, solved: &dyn Fn(&State) -> bool, rng: &mut dyn rand::RngCore) -> State {
        let unsolved: Vec<(Vec<Value>, Probability)> = enumerate_joint(pending)
            .into_iter()
            .filter(|(values, _)| !solved(&State::make(values.clone(), pending.steps_to_go(), params)))
            .collect();
        if unsolved.is_empty() {
            return sample_joint(pending, params, rng);
        }
        let total: Probability = unsolved.iter().map(|(_, p)| p).sum();
        let draw: f64 = rng.random::<f64>() * total;
        let mut cumulative = 0.0;
        for (values, p) in &unsolved {
            cumulative += p;
            if draw < cumulative {
                return State::make(values.clone(), pending.steps_to_go(), params);
            }
        }
        let (values, _) = unsolved.last().expect("checked non-empty above");
        State::make(values.clone(), pending.steps_to_go(), params)
    }
}

fn sample_joint(pending: &PDState, params: &HashParams, rng: &mut dyn rand::RngCore) -> State {
    pending.sample(rng, params)
}

/// the full joint distribution over this transition's slots, as
/// (value-vector, probability) pairs: a Dirac slot contributes a single
/// certain value, a distribution slot its pairs, and the cross product
/// of every slot's options is the joint's support.
fn enumerate_joint(pending: &PDState) -> Vec<(Vec<Value>, Probability)> {
    pending.slots().iter().fold(vec![(Vec::new(), 1.0)], |acc, slot| {
        let options: Vec<(Value, Probability)> = match slot {
            PDSlot::Dirac(v) => vec![(*v, 1.0)],
            PDSlot::Dist(pd) => pd.pairs().collect(),
        };
        acc.into_iter()
            .flat_map(|(values, p)| {
                options.iter().map(move |&(v, q)| {
                    let mut values = values.clone();
                    values.push(v);
                    (values, p * q)
                })
            })
            .collect()
    })
}
