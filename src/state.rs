//! Index-addressed route arena.
//!
//! Technicians and visits are addressed by their position in the submitted
//! plan. Each assigned visit knows its technician and its neighbours; both
//! ends of a route link to [`Stop::Home`]. Per-technician totals are kept
//! up to date by every mutator so scoring never has to walk a route.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::domain::{Location, RoutePlan, SolverStatus};
use crate::error::{PlanError, RouteError};
use crate::score::HardSoftScore;
use crate::traits::{DistanceMatrixProvider, TravelMatrix};

/// One end of a route leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stop {
    Home,
    Visit(usize),
}

/// Where an assigned visit currently sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub technician: usize,
    pub previous: Stop,
    pub next: Stop,
}

#[derive(Debug, Clone)]
struct VisitNode {
    demand: i64,
    placement: Option<Placement>,
}

#[derive(Debug, Clone)]
struct TechnicianNode {
    capacity: i64,
    first: Option<usize>,
    last: Option<usize>,
    len: usize,
    total_demand: i64,
    total_driving_time: i64,
}

/// Per-technician figures the constraints are evaluated on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TechnicianSummary<'a> {
    pub id: &'a str,
    pub capacity: i64,
    pub visit_count: usize,
    pub total_demand: i64,
    pub total_driving_time_seconds: i64,
}

/// Visits no technician currently routes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolSummary {
    pub visit_count: usize,
    pub total_demand: i64,
}

/// Upper bound on any capacity and on the summed demand of all visits of a
/// plan. Every score level, and its scalar form, then stays inside `i64`.
pub const MAX_QUANTITY: i64 = 1_000_000_000_000;

/// Working solution of one search run.
#[derive(Debug, Clone)]
pub struct RouteState {
    base: Arc<RoutePlan>,
    matrix: Arc<TravelMatrix>,
    visits: Vec<VisitNode>,
    technicians: Vec<TechnicianNode>,
    pool: PoolSummary,
}

impl RouteState {
    /// Validates `plan` and builds the arena, linking visits in the order
    /// each technician lists them.
    pub fn from_plan(
        plan: &RoutePlan,
        provider: &dyn DistanceMatrixProvider,
    ) -> Result<Self, PlanError> {
        let routes = resolve_routes(plan)?;

        let locations: Vec<Location> = plan
            .technicians
            .iter()
            .map(|technician| technician.home_location)
            .chain(plan.visits.iter().map(|visit| visit.location))
            .collect();
        let matrix = TravelMatrix::build(provider, &locations);

        let mut state = Self {
            base: Arc::new(plan.clone()),
            matrix: Arc::new(matrix),
            visits: plan
                .visits
                .iter()
                .map(|visit| VisitNode {
                    demand: visit.demand,
                    placement: None,
                })
                .collect(),
            technicians: plan
                .technicians
                .iter()
                .map(|technician| TechnicianNode {
                    capacity: technician.capacity,
                    first: None,
                    last: None,
                    len: 0,
                    total_demand: 0,
                    total_driving_time: 0,
                })
                .collect(),
            pool: PoolSummary {
                visit_count: plan.visits.len(),
                total_demand: plan.visits.iter().map(|visit| visit.demand).sum(),
            },
        };

        for (technician, route) in routes.into_iter().enumerate() {
            for visit in route {
                let anchor = state.technicians[technician]
                    .last
                    .map_or(Stop::Home, Stop::Visit);
                state.link_after(visit, technician, anchor);
            }
        }

        Ok(state)
    }

    pub fn technician_count(&self) -> usize {
        self.technicians.len()
    }

    pub fn visit_count(&self) -> usize {
        self.visits.len()
    }

    pub fn technician_id(&self, technician: usize) -> &str {
        &self.base.technicians[technician].id
    }

    pub fn visit_id(&self, visit: usize) -> &str {
        &self.base.visits[visit].id
    }

    pub fn placement(&self, visit: usize) -> Option<Placement> {
        self.visits.get(visit).and_then(|node| node.placement)
    }

    pub fn technician_of(&self, visit: usize) -> Option<usize> {
        self.placement(visit).map(|placement| placement.technician)
    }

    pub fn unassigned(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.visits.len()).filter(|&visit| self.visits[visit].placement.is_none())
    }

    /// Size and demand of the unassigned pool, kept up to date by every mutator.
    pub fn pool(&self) -> PoolSummary {
        self.pool
    }

    pub fn route_len(&self, technician: usize) -> usize {
        self.technicians[technician].len
    }

    pub fn capacity(&self, technician: usize) -> i64 {
        self.technicians[technician].capacity
    }

    pub fn demand(&self, visit: usize) -> i64 {
        self.visits[visit].demand
    }

    pub fn total_demand(&self, technician: usize) -> i64 {
        self.technicians[technician].total_demand
    }

    pub fn total_driving_time_seconds(&self, technician: usize) -> i64 {
        self.technicians[technician].total_driving_time
    }

    pub fn summary(&self, technician: usize) -> TechnicianSummary<'_> {
        let node = &self.technicians[technician];
        TechnicianSummary {
            id: self.technician_id(technician),
            capacity: node.capacity,
            visit_count: node.len,
            total_demand: node.total_demand,
            total_driving_time_seconds: node.total_driving_time,
        }
    }

    /// Visit handles of a route in driving order.
    pub fn route(&self, technician: usize) -> Vec<usize> {
        let mut route = Vec::with_capacity(self.technicians[technician].len);
        let mut cursor = self.technicians[technician].first;
        while let Some(visit) = cursor {
            route.push(visit);
            cursor = match self.visits[visit].placement {
                Some(Placement {
                    next: Stop::Visit(next),
                    ..
                }) if route.len() <= self.visits.len() => Some(next),
                _ => None,
            };
        }
        route
    }

    /// Stop that follows `stop` on `technician`'s route.
    pub fn successor(&self, technician: usize, stop: Stop) -> Stop {
        match stop {
            Stop::Home => self.technicians[technician]
                .first
                .map_or(Stop::Home, Stop::Visit),
            Stop::Visit(visit) => self.visits[visit]
                .placement
                .map_or(Stop::Home, |placement| placement.next),
        }
    }

    /// Travel time of the leg `from -> to` on `technician`'s route.
    #[inline]
    pub fn leg(&self, technician: usize, from: Stop, to: Stop) -> i64 {
        self.matrix
            .get(self.location_index(technician, from), self.location_index(technician, to))
    }

    #[inline]
    fn location_index(&self, technician: usize, stop: Stop) -> usize {
        match stop {
            Stop::Home => technician,
            Stop::Visit(visit) => self.technicians.len() + visit,
        }
    }

    // ------------------------------------------------------------------
    // Validated mutators. Each checks everything up front and then applies
    // the change in full, or returns an error without touching the arena.
    // ------------------------------------------------------------------

    /// Inserts an unassigned visit directly after `anchor` on `technician`'s route.
    pub fn insert_after(
        &mut self,
        technician: usize,
        anchor: Stop,
        visit: usize,
    ) -> Result<(), RouteError> {
        self.check_visit(visit)?;
        self.check_anchor(technician, anchor)?;
        if self.visits[visit].placement.is_some() {
            return Err(RouteError::AlreadyAssigned(visit));
        }
        self.link_after(visit, technician, anchor);
        Ok(())
    }

    /// Takes an assigned visit out of its route, joining its neighbours.
    pub fn remove(&mut self, visit: usize) -> Result<(), RouteError> {
        self.check_visit(visit)?;
        if self.visits[visit].placement.is_none() {
            return Err(RouteError::NotAssigned(visit));
        }
        self.unlink(visit);
        Ok(())
    }

    /// Reverses the segment `start..=end` of one route (2-opt).
    pub fn reverse_segment(&mut self, start: usize, end: usize) -> Result<(), RouteError> {
        let (technician, segment) = self.segment(start, end)?;
        if segment.len() < 2 {
            return Ok(());
        }

        let before = self.visits[start].placement.map_or(Stop::Home, |p| p.previous);
        let after = self.visits[end].placement.map_or(Stop::Home, |p| p.next);
        let old_cost = self.path_cost(technician, before, &segment, after);

        let reversed: Vec<usize> = segment.iter().rev().copied().collect();
        self.write_path(technician, before, &reversed, after);

        let new_cost = self.path_cost(technician, before, &reversed, after);
        self.technicians[technician].total_driving_time += new_cost - old_cost;
        Ok(())
    }

    /// Moves the segment `first..=last` (a single visit when equal) after
    /// `anchor` on `technician`'s route. An unassigned single visit is inserted.
    pub fn relocate(
        &mut self,
        first: usize,
        last: usize,
        technician: usize,
        anchor: Stop,
    ) -> Result<(), RouteError> {
        self.check_visit(first)?;
        if first == last && self.visits[first].placement.is_none() {
            return self.insert_after(technician, anchor, first);
        }

        let (source, segment) = self.segment(first, last)?;
        self.check_anchor(technician, anchor)?;
        if let Stop::Visit(anchor_visit) = anchor {
            if segment.contains(&anchor_visit) {
                return Err(RouteError::AnchorInSegment(anchor_visit));
            }
        }

        let before = self.visits[first].placement.map_or(Stop::Home, |p| p.previous);
        if source == technician && before == anchor {
            return Ok(());
        }

        let after = self.visits[last].placement.map_or(Stop::Home, |p| p.next);
        let internal: i64 = segment
            .windows(2)
            .map(|pair| self.leg(source, Stop::Visit(pair[0]), Stop::Visit(pair[1])))
            .sum();
        let demand: i64 = segment.iter().map(|&visit| self.visits[visit].demand).sum();

        // detach
        {
            let cut = self.leg(source, before, Stop::Visit(first))
                + internal
                + self.leg(source, Stop::Visit(last), after);
            let joined = self.leg(source, before, after);
            self.set_next(source, before, after);
            self.set_previous(source, after, before);
            let node = &mut self.technicians[source];
            node.total_driving_time += joined - cut;
            node.total_demand -= demand;
            node.len -= segment.len();
        }

        // attach
        let follow = self.successor(technician, anchor);
        let opened = self.leg(technician, anchor, Stop::Visit(first))
            + internal
            + self.leg(technician, Stop::Visit(last), follow);
        let split = self.leg(technician, anchor, follow);
        self.set_next(technician, anchor, Stop::Visit(first));
        self.set_previous(technician, Stop::Visit(first), anchor);
        self.set_next(technician, Stop::Visit(last), follow);
        self.set_previous(technician, follow, Stop::Visit(last));
        for &visit in &segment {
            if let Some(placement) = self.visits[visit].placement.as_mut() {
                placement.technician = technician;
            }
        }
        let node = &mut self.technicians[technician];
        node.total_driving_time += opened - split;
        node.total_demand += demand;
        node.len += segment.len();
        Ok(())
    }

    /// Exchanges the route positions of two assigned visits.
    pub fn swap(&mut self, left: usize, right: usize) -> Result<(), RouteError> {
        self.check_visit(left)?;
        self.check_visit(right)?;
        let left_at = self.visits[left].placement.ok_or(RouteError::NotAssigned(left))?;
        let right_at = self.visits[right].placement.ok_or(RouteError::NotAssigned(right))?;
        if left == right {
            return Ok(());
        }

        if left_at.next == Stop::Visit(right) {
            return self.relocate(left, left, left_at.technician, Stop::Visit(right));
        }
        if right_at.next == Stop::Visit(left) {
            return self.relocate(right, right, right_at.technician, Stop::Visit(left));
        }

        self.unlink(left);
        self.unlink(right);
        self.link_after(left, right_at.technician, right_at.previous);
        self.link_after(right, left_at.technician, left_at.previous);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Invariant checks
    // ------------------------------------------------------------------

    /// Walks a route from home and returns `(demand, driving_time, len)`,
    /// failing on asymmetric links, foreign visits or cycles.
    pub fn walk_totals(&self, technician: usize) -> Result<(i64, i64, usize), RouteError> {
        let mut demand = 0;
        let mut driving = 0;
        let mut len = 0;
        let mut previous = Stop::Home;
        let mut cursor = self.successor(technician, Stop::Home);

        while let Stop::Visit(visit) = cursor {
            let placement = self.visits[visit].placement.ok_or_else(|| {
                RouteError::Corrupted(format!("visit {visit} is linked but unassigned"))
            })?;
            if placement.technician != technician {
                return Err(RouteError::Corrupted(format!(
                    "visit {visit} is linked from technician {technician} but claims {}",
                    placement.technician
                )));
            }
            if placement.previous != previous {
                return Err(RouteError::Corrupted(format!(
                    "visit {visit} has asymmetric predecessor link"
                )));
            }
            len += 1;
            if len > self.visits.len() {
                return Err(RouteError::Corrupted(format!(
                    "cycle on technician {technician}'s route"
                )));
            }
            demand += self.visits[visit].demand;
            driving += self.leg(technician, previous, cursor);
            previous = cursor;
            cursor = placement.next;
        }

        let last = self.technicians[technician].last.map_or(Stop::Home, Stop::Visit);
        if last != previous {
            return Err(RouteError::Corrupted(format!(
                "technician {technician}'s last link disagrees with its chain"
            )));
        }
        driving += self.leg(technician, previous, Stop::Home);
        Ok((demand, driving, len))
    }

    /// Counts the unassigned pool from the placements, ignoring the cache.
    pub fn walk_pool(&self) -> PoolSummary {
        self.visits
            .iter()
            .filter(|node| node.placement.is_none())
            .fold(PoolSummary::default(), |pool, node| PoolSummary {
                visit_count: pool.visit_count + 1,
                total_demand: pool.total_demand + node.demand,
            })
    }

    /// Checks every chain from scratch against the cached totals.
    pub fn verify(&self) -> Result<(), RouteError> {
        let mut routed = 0;
        for technician in 0..self.technicians.len() {
            let (demand, driving, len) = self.walk_totals(technician)?;
            let node = &self.technicians[technician];
            if (demand, driving, len) != (node.total_demand, node.total_driving_time, node.len) {
                return Err(RouteError::Corrupted(format!(
                    "technician {technician} caches ({}, {}, {}) but walks ({demand}, {driving}, {len})",
                    node.total_demand, node.total_driving_time, node.len
                )));
            }
            routed += len;
        }
        let assigned = self.visits.iter().filter(|node| node.placement.is_some()).count();
        if assigned != routed {
            return Err(RouteError::Corrupted(format!(
                "{assigned} visits claim a technician but {routed} are reachable"
            )));
        }
        let pool = self.walk_pool();
        if pool != self.pool {
            return Err(RouteError::Corrupted(format!(
                "pool caches {:?} but counts {pool:?}",
                self.pool
            )));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    /// Materializes the current routes as a wire plan.
    pub fn to_plan(&self, score: Option<HardSoftScore>, status: SolverStatus) -> RoutePlan {
        let mut plan = (*self.base).clone();
        for (technician, wire) in plan.technicians.iter_mut().enumerate() {
            wire.visits = self
                .route(technician)
                .into_iter()
                .map(|visit| self.visit_id(visit).to_string())
                .collect();
            wire.total_demand = self.total_demand(technician);
            wire.total_driving_time_seconds = self.total_driving_time_seconds(technician);
        }
        let stop_id = |stop: Stop| match stop {
            Stop::Home => None,
            Stop::Visit(visit) => Some(self.visit_id(visit).to_string()),
        };
        for (visit, wire) in plan.visits.iter_mut().enumerate() {
            let placement = self.visits[visit].placement;
            wire.technician = placement.map(|p| self.technician_id(p.technician).to_string());
            wire.previous_visit = placement.and_then(|p| stop_id(p.previous));
            wire.next_visit = placement.and_then(|p| stop_id(p.next));
        }
        plan.score = score;
        plan.solver_status = status;
        plan
    }

    // ------------------------------------------------------------------
    // Unchecked primitives
    // ------------------------------------------------------------------

    fn check_visit(&self, visit: usize) -> Result<(), RouteError> {
        if visit < self.visits.len() {
            Ok(())
        } else {
            Err(RouteError::UnknownVisit(visit))
        }
    }

    fn check_anchor(&self, technician: usize, anchor: Stop) -> Result<(), RouteError> {
        if technician >= self.technicians.len() {
            return Err(RouteError::UnknownTechnician(technician));
        }
        if let Stop::Visit(visit) = anchor {
            self.check_visit(visit)?;
            if self.technician_of(visit) != Some(technician) {
                return Err(RouteError::InvalidAnchor {
                    technician,
                    anchor: visit,
                });
            }
        }
        Ok(())
    }

    /// Collects `start..=end` if it is a forward run on one route.
    fn segment(&self, start: usize, end: usize) -> Result<(usize, Vec<usize>), RouteError> {
        self.check_visit(start)?;
        self.check_visit(end)?;
        let technician = self.technician_of(start).ok_or(RouteError::NotAssigned(start))?;
        if self.technician_of(end) != Some(technician) {
            return Err(RouteError::InvalidSegment { start, end });
        }

        let mut segment = vec![start];
        let mut cursor = start;
        while cursor != end {
            match self.successor(technician, Stop::Visit(cursor)) {
                Stop::Visit(next) if segment.len() <= self.visits.len() => {
                    segment.push(next);
                    cursor = next;
                }
                _ => return Err(RouteError::InvalidSegment { start, end }),
            }
        }
        Ok((technician, segment))
    }

    fn path_cost(&self, technician: usize, before: Stop, path: &[usize], after: Stop) -> i64 {
        let mut cost = 0;
        let mut previous = before;
        for &visit in path {
            cost += self.leg(technician, previous, Stop::Visit(visit));
            previous = Stop::Visit(visit);
        }
        cost + self.leg(technician, previous, after)
    }

    fn write_path(&mut self, technician: usize, before: Stop, path: &[usize], after: Stop) {
        let mut previous = before;
        for &visit in path {
            self.set_next(technician, previous, Stop::Visit(visit));
            self.set_previous(technician, Stop::Visit(visit), previous);
            previous = Stop::Visit(visit);
        }
        self.set_next(technician, previous, after);
        self.set_previous(technician, after, previous);
    }

    fn set_next(&mut self, technician: usize, stop: Stop, next: Stop) {
        match stop {
            Stop::Home => {
                self.technicians[technician].first = match next {
                    Stop::Visit(visit) => Some(visit),
                    Stop::Home => None,
                }
            }
            Stop::Visit(visit) => {
                if let Some(placement) = self.visits[visit].placement.as_mut() {
                    placement.next = next;
                }
            }
        }
    }

    fn set_previous(&mut self, technician: usize, stop: Stop, previous: Stop) {
        match stop {
            Stop::Home => {
                self.technicians[technician].last = match previous {
                    Stop::Visit(visit) => Some(visit),
                    Stop::Home => None,
                }
            }
            Stop::Visit(visit) => {
                if let Some(placement) = self.visits[visit].placement.as_mut() {
                    placement.previous = previous;
                }
            }
        }
    }

    fn link_after(&mut self, visit: usize, technician: usize, anchor: Stop) {
        let follow = self.successor(technician, anchor);
        let delta = self.leg(technician, anchor, Stop::Visit(visit))
            + self.leg(technician, Stop::Visit(visit), follow)
            - self.leg(technician, anchor, follow);

        self.visits[visit].placement = Some(Placement {
            technician,
            previous: anchor,
            next: follow,
        });
        self.set_next(technician, anchor, Stop::Visit(visit));
        self.set_previous(technician, follow, Stop::Visit(visit));

        let demand = self.visits[visit].demand;
        let node = &mut self.technicians[technician];
        node.total_driving_time += delta;
        node.total_demand += demand;
        node.len += 1;

        self.pool.visit_count -= 1;
        self.pool.total_demand -= demand;
    }

    fn unlink(&mut self, visit: usize) {
        let Some(Placement {
            technician,
            previous,
            next,
        }) = self.visits[visit].placement
        else {
            return;
        };
        let delta = self.leg(technician, previous, next)
            - self.leg(technician, previous, Stop::Visit(visit))
            - self.leg(technician, Stop::Visit(visit), next);

        self.set_next(technician, previous, next);
        self.set_previous(technician, next, previous);
        self.visits[visit].placement = None;

        let demand = self.visits[visit].demand;
        let node = &mut self.technicians[technician];
        node.total_driving_time += delta;
        node.total_demand -= demand;
        node.len -= 1;

        self.pool.visit_count += 1;
        self.pool.total_demand += demand;
    }
}

/// Checks a submitted plan and resolves each technician's route to visit handles.
pub fn resolve_routes(plan: &RoutePlan) -> Result<Vec<Vec<usize>>, PlanError> {
    let mut technician_index = HashMap::with_capacity(plan.technicians.len());
    for (index, technician) in plan.technicians.iter().enumerate() {
        if technician_index.insert(technician.id.as_str(), index).is_some() {
            return Err(PlanError::DuplicateTechnician(technician.id.clone()));
        }
        if technician.capacity <= 0 {
            return Err(PlanError::InvalidCapacity {
                technician: technician.id.clone(),
                capacity: technician.capacity,
            });
        }
        if technician.capacity > MAX_QUANTITY {
            return Err(PlanError::CapacityTooLarge {
                technician: technician.id.clone(),
                capacity: technician.capacity,
            });
        }
        if !technician.home_location.is_finite() {
            return Err(PlanError::InvalidLocation(technician.id.clone()));
        }
    }

    let mut visit_index = HashMap::with_capacity(plan.visits.len());
    let mut total_demand: i64 = 0;
    for (index, visit) in plan.visits.iter().enumerate() {
        if visit_index.insert(visit.id.as_str(), index).is_some() {
            return Err(PlanError::DuplicateVisit(visit.id.clone()));
        }
        if visit.demand <= 0 {
            return Err(PlanError::InvalidDemand {
                visit: visit.id.clone(),
                demand: visit.demand,
            });
        }
        total_demand = total_demand
            .checked_add(visit.demand)
            .filter(|&total| total <= MAX_QUANTITY)
            .ok_or_else(|| PlanError::DemandTooLarge(visit.id.clone()))?;
        if !visit.location.is_finite() {
            return Err(PlanError::InvalidLocation(visit.id.clone()));
        }
    }

    let mut routed_by: Vec<Option<usize>> = vec![None; plan.visits.len()];
    let mut seen = HashSet::with_capacity(plan.visits.len());
    let mut routes = Vec::with_capacity(plan.technicians.len());
    for (technician, wire) in plan.technicians.iter().enumerate() {
        let mut route = Vec::with_capacity(wire.visits.len());
        for id in &wire.visits {
            let &visit = visit_index
                .get(id.as_str())
                .ok_or_else(|| PlanError::UnknownVisit {
                    technician: wire.id.clone(),
                    visit: id.clone(),
                })?;
            if !seen.insert(visit) {
                return Err(PlanError::VisitAssignedTwice(id.clone()));
            }
            routed_by[visit] = Some(technician);
            route.push(visit);
        }
        routes.push(route);
    }

    for (visit, wire) in plan.visits.iter().enumerate() {
        let Some(declared) = wire.technician.as_deref() else {
            continue;
        };
        let &technician = technician_index
            .get(declared)
            .ok_or_else(|| PlanError::UnknownTechnician {
                visit: wire.id.clone(),
                technician: declared.to_string(),
            })?;
        if routed_by[visit] != Some(technician) {
            return Err(PlanError::TechnicianMismatch {
                visit: wire.id.clone(),
                declared: declared.to_string(),
                routed: routed_by[visit].map(|t| plan.technicians[t].id.clone()),
            });
        }
    }

    Ok(routes)
}
