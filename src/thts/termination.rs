//! Trial-loop termination criteria: a time budget, a trial-count budget,
//! or both. Checked only at trial boundaries, never mid-trial.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub enum Termination {
    Time(Duration),
    NumberOfTrials(u32),
    Both(Duration, u32),
}

impl Termination {
    pub fn should_stop(&self, started: Instant, trials: u32) -> bool {
        match *self {
            Termination::Time(budget) => started.elapsed() >= budget,
            Termination::NumberOfTrials(max) => trials >= max,
            Termination::Both(budget, max) => started.elapsed() >= budget || trials >= max,
        }
    }
}
