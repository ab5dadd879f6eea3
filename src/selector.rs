//! Randomized move sampling.
//!
//! Moves are drawn by sampling (visit, insertion point) pairs instead of
//! enumerating the neighbourhood, so a draw costs O(1) apart from short
//! segment walks. Insertion points are drawn uniformly from "after the home
//! of technician t" and "after assigned visit w", which covers every
//! position of every route exactly once.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::moves::{Move, MoveKind};
use crate::state::{RouteState, Stop};

/// Longest block moved by a chain relocation.
const MAX_CHAIN_LEN: usize = 4;

/// Draws before giving up on finding an applicable move.
const MAX_ATTEMPTS: usize = 64;

const KINDS: [MoveKind; 4] = [
    MoveKind::Relocate,
    MoveKind::Swap,
    MoveKind::Reverse,
    MoveKind::ChainRelocate,
];

pub struct MoveSelector {
    rng: ChaCha8Rng,
}

impl MoveSelector {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Draws one applicable, non-trivial move, or `None` when the plan has
    /// nothing that can move.
    pub fn sample(&mut self, state: &RouteState) -> Option<Move> {
        if state.visit_count() == 0 || state.technician_count() == 0 {
            return None;
        }
        for _ in 0..MAX_ATTEMPTS {
            let kind = KINDS[self.rng.random_range(0..KINDS.len())];
            let candidate = match kind {
                MoveKind::Relocate => self.relocate(state),
                MoveKind::Swap => self.swap(state),
                MoveKind::Reverse => self.reverse(state),
                MoveKind::ChainRelocate => self.chain_relocate(state),
                MoveKind::Unassign => None,
            };
            if candidate.is_some() {
                return candidate;
            }
        }
        None
    }

    fn random_visit(&mut self, state: &RouteState) -> usize {
        self.rng.random_range(0..state.visit_count())
    }

    fn random_assigned_visit(&mut self, state: &RouteState) -> Option<usize> {
        let visit = self.random_visit(state);
        state.technician_of(visit).map(|_| visit)
    }

    /// Uniform draw over all insertion points.
    fn random_insertion_point(&mut self, state: &RouteState) -> Option<(usize, Stop)> {
        let technicians = state.technician_count();
        let draw = self.rng.random_range(0..technicians + state.visit_count());
        if draw < technicians {
            return Some((draw, Stop::Home));
        }
        let visit = draw - technicians;
        state
            .technician_of(visit)
            .map(|technician| (technician, Stop::Visit(visit)))
    }

    /// Walks up to `max_steps` forward from `start`, staying on the route.
    fn walk_forward(&mut self, state: &RouteState, start: usize, max_steps: usize) -> usize {
        let Some(technician) = state.technician_of(start) else {
            return start;
        };
        let steps = self.rng.random_range(1..=max_steps.max(1));
        let mut end = start;
        for _ in 0..steps {
            match state.successor(technician, Stop::Visit(end)) {
                Stop::Visit(next) => end = next,
                Stop::Home => break,
            }
        }
        end
    }

    fn relocate(&mut self, state: &RouteState) -> Option<Move> {
        let visit = self.random_visit(state);
        let (technician, after) = self.random_insertion_point(state)?;
        if after == Stop::Visit(visit) {
            return None;
        }
        if let Some(origin) = state.placement(visit) {
            if origin.technician == technician && origin.previous == after {
                return None;
            }
        }
        Some(Move::Relocate {
            visit,
            technician,
            after,
        })
    }

    fn swap(&mut self, state: &RouteState) -> Option<Move> {
        let left = self.random_assigned_visit(state)?;
        let right = self.random_assigned_visit(state)?;
        (left != right).then_some(Move::Swap { left, right })
    }

    fn reverse(&mut self, state: &RouteState) -> Option<Move> {
        let start = self.random_assigned_visit(state)?;
        let technician = state.technician_of(start)?;
        let end = self.walk_forward(state, start, state.route_len(technician));
        (end != start).then_some(Move::Reverse { start, end })
    }

    fn chain_relocate(&mut self, state: &RouteState) -> Option<Move> {
        let first = self.random_assigned_visit(state)?;
        let source = state.technician_of(first)?;
        let last = self.walk_forward(state, first, MAX_CHAIN_LEN - 1);
        if last == first {
            return None;
        }
        let (technician, after) = self.random_insertion_point(state)?;

        let before = state.placement(first)?.previous;
        if technician == source && after == before {
            return None;
        }
        if let Stop::Visit(anchor) = after {
            if technician == source && segment_contains(state, first, last, anchor) {
                return None;
            }
        }
        Some(Move::ChainRelocate {
            first,
            last,
            technician,
            after,
        })
    }
}

fn segment_contains(state: &RouteState, first: usize, last: usize, visit: usize) -> bool {
    let Some(technician) = state.technician_of(first) else {
        return false;
    };
    let mut cursor = first;
    loop {
        if cursor == visit {
            return true;
        }
        if cursor == last {
            return false;
        }
        match state.successor(technician, Stop::Visit(cursor)) {
            Stop::Visit(next) => cursor = next,
            Stop::Home => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Location, RoutePlan, Technician, Visit};
    use crate::haversine::HaversineMatrix;

    fn state(visit_count: usize) -> RouteState {
        let ids: Vec<String> = (0..visit_count).map(|i| format!("v{i}")).collect();
        let (left, right) = ids.split_at(visit_count / 2);
        let plan = RoutePlan::new(
            "selector",
            Location::new(0.0, 0.0),
            Location::new(1.0, 1.0),
            vec![
                Technician::new("t0", 100, Location::new(0.0, 0.0)).with_visits(left.iter().cloned()),
                Technician::new("t1", 100, Location::new(1.0, 1.0)).with_visits(right.iter().cloned()),
            ],
            ids.iter()
                .enumerate()
                .map(|(i, id)| {
                    let x = i as f64 / visit_count as f64;
                    Visit::new(id.clone(), id.clone(), Location::new(x, 1.0 - x), 1)
                })
                .collect(),
        );
        RouteState::from_plan(&plan, &HaversineMatrix::default()).unwrap()
    }

    #[test]
    fn test_sampled_moves_apply_cleanly() {
        let mut state = state(12);
        let mut selector = MoveSelector::new(42);
        for _ in 0..2_000 {
            let mv = selector.sample(&state).expect("plan has movable visits");
            mv.apply(&mut state).unwrap_or_else(|e| panic!("{mv:?} failed: {e}"));
            state.verify().unwrap();
        }
    }

    #[test]
    fn test_same_seed_same_moves() {
        let state = state(8);
        let mut a = MoveSelector::new(7);
        let mut b = MoveSelector::new(7);
        for _ in 0..100 {
            assert_eq!(a.sample(&state), b.sample(&state));
        }
    }

    #[test]
    fn test_empty_plan_has_no_moves() {
        let state = state(0);
        assert_eq!(MoveSelector::new(1).sample(&state), None);
    }

    #[test]
    fn test_all_kinds_are_drawn() {
        let state = state(10);
        let mut selector = MoveSelector::new(3);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..500 {
            if let Some(mv) = selector.sample(&state) {
                seen.insert(mv.kind());
            }
        }
        assert_eq!(seen.len(), 4);
    }
}
