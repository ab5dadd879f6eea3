//! Structural moves over a [`RouteState`].
//!
//! Applying a move returns the move that undoes it, so a candidate can be
//! scored by applying it and rolling it back.

use smallvec::SmallVec;

use crate::error::RouteError;
use crate::state::{RouteState, Stop};

/// Technicians whose routes a move touches. Never more than two.
pub type Affected = SmallVec<[usize; 2]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoveKind {
    Relocate,
    Swap,
    Reverse,
    ChainRelocate,
    Unassign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Move {
    /// Move one visit (assigned or not) after `after` on `technician`'s route.
    Relocate {
        visit: usize,
        technician: usize,
        after: Stop,
    },
    /// Exchange the positions of two assigned visits.
    Swap { left: usize, right: usize },
    /// Reverse the run `start..=end` of one route (2-opt).
    Reverse { start: usize, end: usize },
    /// Move the run `first..=last` as a block after `after` on `technician`'s route.
    ChainRelocate {
        first: usize,
        last: usize,
        technician: usize,
        after: Stop,
    },
    /// Return a visit to the unassigned pool. Only produced as an undo.
    Unassign { visit: usize },
}

impl Move {
    pub fn kind(&self) -> MoveKind {
        match self {
            Move::Relocate { .. } => MoveKind::Relocate,
            Move::Swap { .. } => MoveKind::Swap,
            Move::Reverse { .. } => MoveKind::Reverse,
            Move::ChainRelocate { .. } => MoveKind::ChainRelocate,
            Move::Unassign { .. } => MoveKind::Unassign,
        }
    }

    /// Technicians whose totals change, looked up before the move is applied.
    pub fn affected_technicians(&self, state: &RouteState) -> Affected {
        let mut affected = Affected::new();
        let mut push = |technician: Option<usize>| {
            if let Some(technician) = technician {
                if !affected.contains(&technician) {
                    affected.push(technician);
                }
            }
        };
        match *self {
            Move::Relocate {
                visit, technician, ..
            } => {
                push(state.technician_of(visit));
                push(Some(technician));
            }
            Move::Swap { left, right } => {
                push(state.technician_of(left));
                push(state.technician_of(right));
            }
            Move::Reverse { start, .. } => push(state.technician_of(start)),
            Move::ChainRelocate {
                first, technician, ..
            } => {
                push(state.technician_of(first));
                push(Some(technician));
            }
            Move::Unassign { visit } => push(state.technician_of(visit)),
        }
        affected
    }

    /// Applies the move and returns its inverse. On error nothing changed.
    pub fn apply(&self, state: &mut RouteState) -> Result<Move, RouteError> {
        match *self {
            Move::Relocate {
                visit,
                technician,
                after,
            } => {
                let undo = match state.placement(visit) {
                    Some(origin) => Move::Relocate {
                        visit,
                        technician: origin.technician,
                        after: origin.previous,
                    },
                    None => Move::Unassign { visit },
                };
                state.relocate(visit, visit, technician, after)?;
                Ok(undo)
            }
            Move::Swap { left, right } => {
                state.swap(left, right)?;
                Ok(Move::Swap { left, right })
            }
            Move::Reverse { start, end } => {
                state.reverse_segment(start, end)?;
                Ok(Move::Reverse {
                    start: end,
                    end: start,
                })
            }
            Move::ChainRelocate {
                first,
                last,
                technician,
                after,
            } => {
                let origin = state.placement(first).ok_or(RouteError::NotAssigned(first))?;
                state.relocate(first, last, technician, after)?;
                Ok(Move::ChainRelocate {
                    first,
                    last,
                    technician: origin.technician,
                    after: origin.previous,
                })
            }
            Move::Unassign { visit } => {
                let origin = state.placement(visit).ok_or(RouteError::NotAssigned(visit))?;
                state.remove(visit)?;
                Ok(Move::Relocate {
                    visit,
                    technician: origin.technician,
                    after: origin.previous,
                })
            }
        }
    }
}
