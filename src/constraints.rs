//! Constraint definitions.
//!
//! Most constraints are plain functions over a [`TechnicianSummary`] that
//! return the penalty they assign (if any), paired with a justification
//! builder. [`unassigned_visit`] instead looks at the unassigned pool.
//! Constraints are registered in a fixed order in a [`ConstraintSet`]; the
//! score of a technician is the weighted, negated sum of their penalties.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::score::HardSoftScore;
use crate::state::{PoolSummary, TechnicianSummary};

pub const TECHNICIAN_CAPACITY: &str = "technicianCapacity";
pub const UNASSIGNED_VISIT: &str = "unassignedVisit";
pub const MINIMIZE_TRAVEL_TIME: &str = "minimizeTravelTime";
pub const TECHNICIAN_MUST_WORK: &str = "technicianMustWork";

/// Human-readable explanation of a single penalty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Justification {
    TechnicianCapacity {
        technician_id: String,
        capacity: i64,
        demand: i64,
        description: String,
    },
    MinimizeTravelTime {
        technician_name: String,
        total_driving_time_seconds: i64,
        description: String,
    },
    TechnicianMustWork {
        technician_id: String,
        description: String,
    },
    UnassignedVisit {
        visit_id: String,
        demand: i64,
        description: String,
    },
}

impl Justification {
    pub fn description(&self) -> &str {
        match self {
            Justification::TechnicianCapacity { description, .. }
            | Justification::MinimizeTravelTime { description, .. }
            | Justification::TechnicianMustWork { description, .. }
            | Justification::UnassignedVisit { description, .. } => description,
        }
    }
}

impl fmt::Display for Justification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A constraint firing on one technician.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintMatch {
    /// Non-negative penalty magnitude, multiplied by the constraint weight.
    pub penalty: i64,
    pub justification: Justification,
}

type Penalty = dyn Fn(&TechnicianSummary<'_>) -> Option<i64> + Send + Sync;
type Justify = dyn Fn(&TechnicianSummary<'_>, i64) -> Justification + Send + Sync;

/// What a constraint is evaluated on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Once per technician, on its route totals.
    Technician,
    /// Once per visit left in the unassigned pool; the penalty is its demand.
    UnassignedVisit,
}

#[derive(Clone)]
enum Rule {
    Technician { penalty: Arc<Penalty>, justify: Arc<Justify> },
    UnassignedVisit,
}

/// A named, weighted constraint.
///
/// The penalty function runs on every scored move; the justification
/// builder only runs when a plan is analyzed.
#[derive(Clone)]
pub struct Constraint {
    pub id: &'static str,
    pub weight: HardSoftScore,
    rule: Rule,
}

impl Constraint {
    pub fn new<P, J>(id: &'static str, weight: HardSoftScore, penalty: P, justify: J) -> Self
    where
        P: Fn(&TechnicianSummary<'_>) -> Option<i64> + Send + Sync + 'static,
        J: Fn(&TechnicianSummary<'_>, i64) -> Justification + Send + Sync + 'static,
    {
        Self {
            id,
            weight,
            rule: Rule::Technician {
                penalty: Arc::new(penalty),
                justify: Arc::new(justify),
            },
        }
    }

    pub fn scope(&self) -> Scope {
        match self.rule {
            Rule::Technician { .. } => Scope::Technician,
            Rule::UnassignedVisit => Scope::UnassignedVisit,
        }
    }

    /// Penalty on one technician. `None` for pool constraints.
    pub fn penalty(&self, technician: &TechnicianSummary<'_>) -> Option<i64> {
        match &self.rule {
            Rule::Technician { penalty, .. } => penalty(technician),
            Rule::UnassignedVisit => None,
        }
    }

    pub fn evaluate(&self, technician: &TechnicianSummary<'_>) -> Option<ConstraintMatch> {
        let Rule::Technician { penalty, justify } = &self.rule else {
            return None;
        };
        penalty(technician).map(|penalty| ConstraintMatch {
            penalty,
            justification: justify(technician, penalty),
        })
    }

    /// Penalty on the whole unassigned pool. `None` for technician constraints.
    pub fn pool_penalty(&self, pool: &PoolSummary) -> Option<i64> {
        match self.rule {
            Rule::UnassignedVisit => (pool.visit_count > 0).then_some(pool.total_demand),
            Rule::Technician { .. } => None,
        }
    }

    /// Match for one unassigned visit. `None` for technician constraints.
    pub fn evaluate_unassigned(&self, visit_id: &str, demand: i64) -> Option<ConstraintMatch> {
        match self.rule {
            Rule::UnassignedVisit => Some(ConstraintMatch {
                penalty: demand,
                justification: Justification::UnassignedVisit {
                    visit_id: visit_id.to_string(),
                    demand,
                    description: format!("Visit '{visit_id}' is not assigned to any technician."),
                },
            }),
            Rule::Technician { .. } => None,
        }
    }

    /// Score impact of a penalty: the penalty times the weight, negated.
    pub fn impact(&self, penalty: i64) -> HardSoftScore {
        -(self.weight * penalty)
    }
}

impl fmt::Debug for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constraint")
            .field("id", &self.id)
            .field("weight", &self.weight)
            .field("scope", &self.scope())
            .finish()
    }
}

// ============================================================================
// Hard constraints
// ============================================================================

pub fn technician_capacity() -> Constraint {
    Constraint::new(
        TECHNICIAN_CAPACITY,
        HardSoftScore::ONE_HARD,
        |technician: &TechnicianSummary<'_>| {
            (technician.total_demand > technician.capacity)
                .then(|| technician.total_demand - technician.capacity)
        },
        |technician: &TechnicianSummary<'_>, excess| Justification::TechnicianCapacity {
            technician_id: technician.id.to_string(),
            capacity: technician.capacity,
            demand: technician.total_demand,
            description: format!(
                "Technician '{}' exceeded its max capacity by {}.",
                technician.id, excess
            ),
        },
    )
}

/// Every unassigned visit costs its demand on the hard level, so leaving a
/// visit out never scores better than overloading a technician with it.
pub fn unassigned_visit() -> Constraint {
    Constraint {
        id: UNASSIGNED_VISIT,
        weight: HardSoftScore::ONE_HARD,
        rule: Rule::UnassignedVisit,
    }
}

/// Technicians with fewer than `min_visits` visits are penalized once each.
pub fn technician_must_work(min_visits: usize) -> Constraint {
    Constraint::new(
        TECHNICIAN_MUST_WORK,
        HardSoftScore::ONE_HARD,
        move |technician: &TechnicianSummary<'_>| (technician.visit_count < min_visits).then_some(1),
        |technician: &TechnicianSummary<'_>, _| Justification::TechnicianMustWork {
            technician_id: technician.id.to_string(),
            description: format!("Technician '{}' has no work to do", technician.id),
        },
    )
}

// ============================================================================
// Soft constraints
// ============================================================================

/// Penalizes every second of driving.
///
/// The description spells the total as whole hours plus the remaining
/// minutes ("1 hours 5 minutes"), not as a total minute count.
pub fn minimize_travel_time() -> Constraint {
    Constraint::new(
        MINIMIZE_TRAVEL_TIME,
        HardSoftScore::ONE_SOFT,
        |technician: &TechnicianSummary<'_>| Some(technician.total_driving_time_seconds),
        |technician: &TechnicianSummary<'_>, seconds| Justification::MinimizeTravelTime {
            technician_name: technician.id.to_string(),
            total_driving_time_seconds: seconds,
            description: format!(
                "Technician '{}' total travel time is {} hours {} minutes.",
                technician.id,
                seconds / 3600,
                (seconds % 3600) / 60
            ),
        },
    )
}

/// Constraints in evaluation order.
#[derive(Debug, Clone)]
pub struct ConstraintSet {
    constraints: Vec<Constraint>,
}

impl Default for ConstraintSet {
    fn default() -> Self {
        Self {
            constraints: vec![technician_capacity(), unassigned_visit(), minimize_travel_time()],
        }
    }
}

impl ConstraintSet {
    pub fn new(constraints: Vec<Constraint>) -> Self {
        Self { constraints }
    }

    /// Registers the minimum-utilization constraint after the hard ones.
    pub fn with_technician_must_work(mut self, min_visits: usize) -> Self {
        let position = self
            .constraints
            .iter()
            .rposition(|constraint| constraint.weight.hard() != 0)
            .map_or(0, |index| index + 1);
        self.constraints
            .insert(position, technician_must_work(min_visits));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter()
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Score contribution of the unassigned pool.
    pub fn pool_score(&self, pool: &PoolSummary) -> HardSoftScore {
        self.constraints
            .iter()
            .filter_map(|constraint| {
                constraint
                    .pool_penalty(pool)
                    .map(|penalty| constraint.impact(penalty))
            })
            .sum()
    }

    /// Total score contribution of one technician across all constraints.
    pub fn technician_score(&self, technician: &TechnicianSummary<'_>) -> HardSoftScore {
        self.constraints
            .iter()
            .filter_map(|constraint| {
                constraint
                    .penalty(technician)
                    .map(|penalty| constraint.impact(penalty))
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(capacity: i64, demand: i64, seconds: i64, visits: usize) -> TechnicianSummary<'static> {
        TechnicianSummary {
            id: "3",
            capacity,
            visit_count: visits,
            total_demand: demand,
            total_driving_time_seconds: seconds,
        }
    }

    #[test]
    fn test_capacity_penalty_is_the_excess() {
        let matched = technician_capacity().evaluate(&summary(5, 7, 0, 2)).unwrap();
        assert_eq!(matched.penalty, 2);
        assert_eq!(
            matched.justification.description(),
            "Technician '3' exceeded its max capacity by 2."
        );
        assert!(technician_capacity().penalty(&summary(5, 5, 0, 2)).is_none());
    }

    #[test]
    fn test_travel_time_description() {
        let matched = minimize_travel_time()
            .evaluate(&summary(5, 1, 2 * 3600 + 5 * 60 + 9, 1))
            .unwrap();
        assert_eq!(matched.penalty, 7509);
        assert_eq!(
            matched.justification.to_string(),
            "Technician '3' total travel time is 2 hours 5 minutes."
        );
    }

    #[test]
    fn test_default_set_scores_both_levels() {
        let set = ConstraintSet::default();
        assert_eq!(set.len(), 3);
        assert_eq!(set.technician_score(&summary(5, 6, 100, 2)), HardSoftScore::of(-1, -100));
    }

    #[test]
    fn test_must_work_is_opt_in() {
        let set = ConstraintSet::default().with_technician_must_work(1);
        let ids: Vec<_> = set.iter().map(|c| c.id).collect();
        assert_eq!(
            ids,
            vec![TECHNICIAN_CAPACITY, UNASSIGNED_VISIT, TECHNICIAN_MUST_WORK, MINIMIZE_TRAVEL_TIME]
        );
        assert_eq!(set.technician_score(&summary(5, 0, 0, 0)), HardSoftScore::of(-1, 0));
    }

    #[test]
    fn test_unassigned_pool_costs_its_demand() {
        let set = ConstraintSet::default();
        let pool = PoolSummary {
            visit_count: 2,
            total_demand: 7,
        };
        assert_eq!(set.pool_score(&pool), HardSoftScore::of_hard(-7));
        assert_eq!(set.pool_score(&PoolSummary::default()), HardSoftScore::ZERO);

        let constraint = unassigned_visit();
        assert_eq!(constraint.scope(), Scope::UnassignedVisit);
        assert!(constraint.penalty(&summary(5, 9, 100, 2)).is_none());
        let matched = constraint.evaluate_unassigned("v7", 4).unwrap();
        assert_eq!(matched.penalty, 4);
        assert_eq!(
            matched.justification.description(),
            "Visit 'v7' is not assigned to any technician."
        );
        assert!(technician_capacity().evaluate_unassigned("v7", 4).is_none());
    }

    #[test]
    fn test_justification_wire_shape() {
        let matched = technician_capacity().evaluate(&summary(5, 7, 0, 2)).unwrap();
        let json = serde_json::to_value(&matched.justification).unwrap();
        assert_eq!(json["type"], "technicianCapacity");
        assert_eq!(json["technicianId"], "3");
        assert_eq!(json["demand"], 7);
    }
}
