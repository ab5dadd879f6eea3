//! Local search engine.
//!
//! A run goes through three phases:
//! 1. `Initializing`: every unassigned visit is inserted where it lowers the
//!    score least (cheapest insertion).
//! 2. `Iterating`: sample candidate moves, keep the best of each step, offer
//!    it to the acceptor and commit it if accepted.
//! 3. `Terminated`: a limit was reached or cancellation was requested.
//!
//! Limits and cancellation are checked between steps only; a move is never
//! interrupted half-way.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, info, trace};

use crate::acceptor::build_acceptor;
use crate::config::{EnvironmentMode, SolverConfig};
use crate::director::ScoreDirector;
use crate::domain::{RoutePlan, SolverStatus};
use crate::error::{Result, SolverError};
use crate::moves::Move;
use crate::score::HardSoftScore;
use crate::selector::MoveSelector;
use crate::state::{RouteState, Stop};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
    Initializing,
    Iterating,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    TimeLimit,
    IterationLimit,
    UnimprovedLimit,
    Cancelled,
    /// The plan offers no move at all (no visits or no technicians).
    NoMoves,
}

/// Result of a finished run.
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    /// Best plan seen, with its score and `Terminated` status.
    pub best: RoutePlan,
    pub best_score: HardSoftScore,
    pub iterations: u64,
    pub moves_evaluated: u64,
    pub reason: TerminationReason,
    pub elapsed: Duration,
}

pub struct LocalSearch {
    config: SolverConfig,
}

struct Limits<'a> {
    started: Instant,
    spent_limit: Option<Duration>,
    iteration_limit: Option<u64>,
    unimproved_limit: Option<u64>,
    cancel: &'a AtomicBool,
}

impl Limits<'_> {
    /// Cancellation or an exhausted time budget. Also checked during construction.
    fn interrupted(&self) -> Option<TerminationReason> {
        if self.cancel.load(Ordering::Relaxed) {
            return Some(TerminationReason::Cancelled);
        }
        if self.spent_limit.is_some_and(|limit| self.started.elapsed() >= limit) {
            return Some(TerminationReason::TimeLimit);
        }
        None
    }

    fn reached(&self, iterations: u64, unimproved: u64) -> Option<TerminationReason> {
        if let Some(reason) = self.interrupted() {
            return Some(reason);
        }
        if self.iteration_limit.is_some_and(|limit| iterations >= limit) {
            return Some(TerminationReason::IterationLimit);
        }
        if self.unimproved_limit.is_some_and(|limit| unimproved >= limit) {
            return Some(TerminationReason::UnimprovedLimit);
        }
        None
    }

    fn progress(&self, iterations: u64) -> f64 {
        if let Some(limit) = self.spent_limit {
            self.started.elapsed().as_secs_f64() / limit.as_secs_f64().max(f64::EPSILON)
        } else if let Some(limit) = self.iteration_limit {
            iterations as f64 / limit.max(1) as f64
        } else {
            0.0
        }
    }
}

impl LocalSearch {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Runs the search on `state` until a limit is hit or `cancel` is set.
    ///
    /// `on_best` receives a snapshot every time the working score ties or
    /// beats the best score so far, starting with the constructed plan. The
    /// reported scores never decrease.
    ///
    /// Fails with [`SolverError::InvalidConfig`] before touching `state` if
    /// the configuration does not validate.
    pub fn solve<F>(&self, state: RouteState, cancel: &AtomicBool, mut on_best: F) -> Result<SolveOutcome>
    where
        F: FnMut(&RoutePlan),
    {
        self.config
            .validate()
            .map_err(|error| SolverError::InvalidConfig(error.to_string()))?;

        let limits = Limits {
            started: Instant::now(),
            spent_limit: self.config.termination.spent_limit(),
            iteration_limit: self.config.termination.iteration_limit,
            unimproved_limit: self.config.termination.unimproved_iteration_limit,
            cancel,
        };
        let full_assert = self.config.environment_mode == EnvironmentMode::FullAssert;

        let mut phase = SearchPhase::Initializing;
        info!(
            technicians = state.technician_count(),
            visits = state.visit_count(),
            ?phase,
            "search started"
        );

        let mut director = ScoreDirector::new(state, self.config.constraint_set());
        let mut moves_evaluated = construct(&mut director, &limits)?;
        if full_assert {
            director.assert_consistent()?;
        }

        let mut best_score = director.score();
        let mut best = director.snapshot(SolverStatus::Solving);
        on_best(&best);
        debug!(score = %best_score, "initial plan constructed");

        phase = SearchPhase::Iterating;
        info!(?phase, score = %best_score, elapsed = ?limits.started.elapsed(), "construction finished");

        let mut selector = MoveSelector::new(self.config.random_seed);
        let mut acceptor = build_acceptor(&self.config.acceptor, self.config.random_seed);
        acceptor.phase_started(director.score());

        let mut iterations: u64 = 0;
        let mut unimproved: u64 = 0;
        let reason = loop {
            if let Some(reason) = limits.reached(iterations, unimproved) {
                break reason;
            }

            // Best of this step's candidates; ties keep the first one drawn.
            let mut chosen: Option<(Move, HardSoftScore)> = None;
            for _ in 0..self.config.candidates_per_step {
                let Some(mv) = selector.sample(director.state()) else {
                    break;
                };
                let score = director.evaluate(&mv)?;
                moves_evaluated += 1;
                if chosen.is_none_or(|(_, chosen_score)| score > chosen_score) {
                    chosen = Some((mv, score));
                }
            }
            let Some((mv, candidate)) = chosen else {
                break TerminationReason::NoMoves;
            };

            iterations += 1;
            unimproved += 1;
            let current = director.score();
            if acceptor.is_accepted(current, candidate, limits.progress(iterations)) {
                director.do_move(&mv)?;
                if full_assert {
                    director.assert_consistent()?;
                }
                trace!(?mv, score = %director.score(), "move accepted");

                let score = director.score();
                if score >= best_score {
                    if score > best_score {
                        unimproved = 0;
                        debug!(%score, iterations, "new best score");
                    }
                    best_score = score;
                    best = director.snapshot(SolverStatus::Solving);
                    on_best(&best);
                }
            }
            acceptor.step_ended(director.score());
        };

        phase = SearchPhase::Terminated;
        let elapsed = limits.started.elapsed();
        info!(
            ?phase,
            ?reason,
            score = %best_score,
            feasible = best_score.is_feasible(),
            iterations,
            moves_evaluated,
            acceptor = %acceptor,
            ?elapsed,
            "search ended"
        );

        best.solver_status = SolverStatus::Terminated;
        Ok(SolveOutcome {
            best,
            best_score,
            iterations,
            moves_evaluated,
            reason,
            elapsed,
        })
    }
}

/// Cheapest insertion of every unassigned visit, in plan order.
///
/// Returns the number of insertions evaluated. Stops early, leaving the rest
/// unassigned, on cancellation or when the time budget runs out.
fn construct(director: &mut ScoreDirector, limits: &Limits<'_>) -> Result<u64> {
    let pending: Vec<usize> = director.state().unassigned().collect();
    let mut evaluated = 0;

    for visit in pending {
        if let Some(reason) = limits.interrupted() {
            debug!(?reason, unassigned = director.state().pool().visit_count, "construction interrupted");
            break;
        }

        let state = director.state();
        let mut points: Vec<(usize, Stop)> = (0..state.technician_count())
            .map(|technician| (technician, Stop::Home))
            .collect();
        points.extend((0..state.visit_count()).filter_map(|other| {
            state
                .technician_of(other)
                .map(|technician| (technician, Stop::Visit(other)))
        }));

        let mut best: Option<(Move, HardSoftScore)> = None;
        for (technician, after) in points {
            let mv = Move::Relocate {
                visit,
                technician,
                after,
            };
            let score = director.evaluate(&mv)?;
            evaluated += 1;
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((mv, score));
            }
        }

        if let Some((mv, _)) = best {
            director.do_move(&mv)?;
        }
    }

    Ok(evaluated)
}
