//! Acceptance criteria for the local search.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::AcceptorConfig;
use crate::score::HardSoftScore;

pub trait Acceptor: Send {
    fn name(&self) -> &str;

    /// Called once before the first step with the starting score.
    fn phase_started(&mut self, _initial: HardSoftScore) {}

    /// `progress` runs from 0.0 (start) to 1.0 (budget exhausted).
    fn is_accepted(&mut self, current: HardSoftScore, candidate: HardSoftScore, progress: f64) -> bool;

    /// Called after every step with the working score it ended on.
    fn step_ended(&mut self, _score: HardSoftScore) {}
}

impl std::fmt::Display for dyn Acceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

pub fn build_acceptor(config: &AcceptorConfig, seed: u64) -> Box<dyn Acceptor> {
    match *config {
        AcceptorConfig::HillClimbing => Box::new(HillClimbingAcceptor),
        AcceptorConfig::LateAcceptance { size } => Box::new(LateAcceptanceAcceptor::new(size)),
        AcceptorConfig::SimulatedAnnealing {
            starting_temperature,
        } => Box::new(SimulatedAnnealingAcceptor::new(starting_temperature, seed)),
    }
}

/// Accepts moves that do not make the working score worse.
#[derive(Debug, Default, Clone)]
pub struct HillClimbingAcceptor;

impl Acceptor for HillClimbingAcceptor {
    fn name(&self) -> &str {
        "HillClimbing"
    }

    fn is_accepted(&mut self, current: HardSoftScore, candidate: HardSoftScore, _: f64) -> bool {
        candidate >= current
    }
}

/// Accepts a move that is not worse than the current score or than the
/// score the search had `size` steps ago.
#[derive(Debug, Clone)]
pub struct LateAcceptanceAcceptor {
    late_scores: Vec<HardSoftScore>,
    index: usize,
}

impl LateAcceptanceAcceptor {
    pub fn new(size: usize) -> Self {
        Self {
            late_scores: vec![HardSoftScore::ZERO; size.max(1)],
            index: 0,
        }
    }
}

impl Acceptor for LateAcceptanceAcceptor {
    fn name(&self) -> &str {
        "LateAcceptance"
    }

    fn phase_started(&mut self, initial: HardSoftScore) {
        self.late_scores.fill(initial);
        self.index = 0;
    }

    fn is_accepted(&mut self, current: HardSoftScore, candidate: HardSoftScore, _: f64) -> bool {
        candidate >= current || candidate >= self.late_scores[self.index]
    }

    fn step_ended(&mut self, score: HardSoftScore) {
        self.late_scores[self.index] = score;
        self.index = (self.index + 1) % self.late_scores.len();
    }
}

/// Accepts worse moves with probability `exp(-delta / t)`, where the
/// temperature `t` falls linearly to zero over the budget. Hard-level
/// deltas weigh a million soft units.
#[derive(Debug, Clone)]
pub struct SimulatedAnnealingAcceptor {
    starting_temperature: f64,
    rng: ChaCha8Rng,
}

impl SimulatedAnnealingAcceptor {
    pub fn new(starting_temperature: f64, seed: u64) -> Self {
        Self {
            starting_temperature,
            rng: ChaCha8Rng::seed_from_u64(seed ^ 0x5eed_a11e),
        }
    }
}

impl Acceptor for SimulatedAnnealingAcceptor {
    fn name(&self) -> &str {
        "SimulatedAnnealing"
    }

    fn is_accepted(&mut self, current: HardSoftScore, candidate: HardSoftScore, progress: f64) -> bool {
        if candidate >= current {
            return true;
        }
        let temperature = self.starting_temperature * (1.0 - progress.clamp(0.0, 1.0));
        if temperature <= 0.0 {
            return false;
        }
        let delta = (current - candidate).to_scalar();
        self.rng.random::<f64>() < (-delta / temperature).exp()
    }
}
