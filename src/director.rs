//! Incremental score director.
//!
//! Owns the working [`RouteState`] and keeps one cached score per technician
//! plus one for the unassigned pool. A move only re-evaluates the technicians
//! it touches and the pool, reading the totals the arena already maintains,
//! so scoring a move costs O(1) regardless of plan size.

use crate::constraints::ConstraintSet;
use crate::domain::{RoutePlan, SolverStatus};
use crate::error::{RouteError, SolverError};
use crate::moves::Move;
use crate::score::HardSoftScore;
use crate::state::{RouteState, TechnicianSummary};

#[derive(Debug, Clone)]
pub struct ScoreDirector {
    state: RouteState,
    constraints: ConstraintSet,
    technician_scores: Vec<HardSoftScore>,
    pool_score: HardSoftScore,
    score: HardSoftScore,
}

impl ScoreDirector {
    pub fn new(state: RouteState, constraints: ConstraintSet) -> Self {
        let mut director = Self {
            technician_scores: vec![HardSoftScore::ZERO; state.technician_count()],
            state,
            constraints,
            pool_score: HardSoftScore::ZERO,
            score: HardSoftScore::ZERO,
        };
        director.calculate_score();
        director
    }

    pub fn state(&self) -> &RouteState {
        &self.state
    }

    pub fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }

    pub fn into_state(self) -> RouteState {
        self.state
    }

    /// Current working score.
    pub fn score(&self) -> HardSoftScore {
        self.score
    }

    /// Re-evaluates every technician and the pool from the cached totals.
    pub fn calculate_score(&mut self) -> HardSoftScore {
        for technician in 0..self.state.technician_count() {
            self.technician_scores[technician] =
                self.constraints.technician_score(&self.state.summary(technician));
        }
        self.pool_score = self.constraints.pool_score(&self.state.pool());
        self.score = self.technician_scores.iter().copied().sum::<HardSoftScore>() + self.pool_score;
        self.score
    }

    /// Scores the plan by walking every route, ignoring all caches.
    pub fn full_score_from_scratch(&self) -> Result<HardSoftScore, RouteError> {
        let mut score = self.constraints.pool_score(&self.state.walk_pool());
        for technician in 0..self.state.technician_count() {
            let (total_demand, total_driving_time_seconds, visit_count) =
                self.state.walk_totals(technician)?;
            let summary = TechnicianSummary {
                id: self.state.technician_id(technician),
                capacity: self.state.capacity(technician),
                visit_count,
                total_demand,
                total_driving_time_seconds,
            };
            score += self.constraints.technician_score(&summary);
        }
        Ok(score)
    }

    /// Applies a move, updates the score of the touched technicians only and
    /// returns the undo move.
    pub fn do_move(&mut self, mv: &Move) -> Result<Move, RouteError> {
        let affected = mv.affected_technicians(&self.state);
        let undo = mv.apply(&mut self.state)?;
        for technician in affected {
            let updated = self.constraints.technician_score(&self.state.summary(technician));
            self.score += updated - self.technician_scores[technician];
            self.technician_scores[technician] = updated;
        }
        let pool = self.constraints.pool_score(&self.state.pool());
        self.score += pool - self.pool_score;
        self.pool_score = pool;
        Ok(undo)
    }

    /// Score the plan would have after `mv`. The state is rolled back.
    pub fn evaluate(&mut self, mv: &Move) -> Result<HardSoftScore, RouteError> {
        let undo = self.do_move(mv)?;
        let score = self.score;
        self.do_move(&undo)?;
        Ok(score)
    }

    /// Verifies route invariants and that the incremental score matches a
    /// full recalculation.
    pub fn assert_consistent(&self) -> Result<(), SolverError> {
        self.state.verify()?;
        let full = self.full_score_from_scratch()?;
        if full != self.score {
            return Err(SolverError::ScoreCorrupted {
                incremental: self.score.to_string(),
                full: full.to_string(),
            });
        }
        Ok(())
    }

    pub fn snapshot(&self, status: SolverStatus) -> RoutePlan {
        self.state.to_plan(Some(self.score), status)
    }
}
