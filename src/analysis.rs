//! Score breakdown per constraint.
//!
//! Analysis works on any plan, solved or not, and never touches the input:
//! it builds a private arena from the plan, which totals every route from
//! scratch, and evaluates each constraint on each technician or, for the
//! unassigned-visit constraint, on each visit left out of every route.

use serde::{Deserialize, Serialize};

use crate::constraints::{ConstraintMatch, ConstraintSet, Justification, Scope};
use crate::domain::RoutePlan;
use crate::error::PlanError;
use crate::score::HardSoftScore;
use crate::state::{RouteState, TechnicianSummary};
use crate::traits::DistanceMatrixProvider;

/// One technician, or one unassigned visit, a constraint fired on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchAnalysis {
    pub name: String,
    pub score: HardSoftScore,
    pub justification: Justification,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintAnalysis {
    pub name: String,
    pub weight: HardSoftScore,
    /// Sum of the match scores.
    pub score: HardSoftScore,
    pub matches: Vec<MatchAnalysis>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreAnalysis {
    pub score: HardSoftScore,
    /// In registration order.
    pub constraints: Vec<ConstraintAnalysis>,
}

impl ScoreAnalysis {
    pub fn constraint(&self, name: &str) -> Option<&ConstraintAnalysis> {
        self.constraints.iter().find(|constraint| constraint.name == name)
    }
}

/// Recomputes the score of `plan` from scratch and explains it.
pub fn analyze(
    plan: &RoutePlan,
    provider: &dyn DistanceMatrixProvider,
    constraints: &ConstraintSet,
) -> Result<ScoreAnalysis, PlanError> {
    let state = RouteState::from_plan(plan, provider)?;

    let summaries: Vec<TechnicianSummary<'_>> = (0..state.technician_count())
        .map(|technician| state.summary(technician))
        .collect();

    let mut score = HardSoftScore::ZERO;
    let breakdown = constraints
        .iter()
        .map(|constraint| {
            let found: Vec<ConstraintMatch> = match constraint.scope() {
                Scope::Technician => summaries
                    .iter()
                    .filter_map(|summary| constraint.evaluate(summary))
                    .collect(),
                Scope::UnassignedVisit => state
                    .unassigned()
                    .filter_map(|visit| {
                        constraint.evaluate_unassigned(state.visit_id(visit), state.demand(visit))
                    })
                    .collect(),
            };
            let matches: Vec<MatchAnalysis> = found
                .into_iter()
                .map(|found| MatchAnalysis {
                    name: constraint.id.to_string(),
                    score: constraint.impact(found.penalty),
                    justification: found.justification,
                })
                .collect();
            let total: HardSoftScore = matches.iter().map(|found| found.score).sum();
            score += total;
            ConstraintAnalysis {
                name: constraint.id.to_string(),
                weight: constraint.weight,
                score: total,
                matches,
            }
        })
        .collect();

    Ok(ScoreAnalysis {
        score,
        constraints: breakdown,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::{
        MINIMIZE_TRAVEL_TIME, TECHNICIAN_CAPACITY, TECHNICIAN_MUST_WORK, UNASSIGNED_VISIT,
    };
    use crate::domain::{Location, Technician, Visit};
    use crate::haversine::HaversineMatrix;

    fn overloaded() -> RoutePlan {
        RoutePlan::new(
            "analysis",
            Location::new(0.0, 0.0),
            Location::new(1.0, 1.0),
            vec![
                Technician::new("3", 5, Location::new(0.0, 0.0)).with_visits(["a", "b"]),
                Technician::new("4", 5, Location::new(0.0, 0.5)),
            ],
            vec![
                Visit::new("a", "a", Location::new(0.0, 0.1), 3),
                Visit::new("b", "b", Location::new(0.0, 0.2), 4),
            ],
        )
    }

    #[test]
    fn test_breakdown_explains_capacity_overflow() {
        let plan = overloaded();
        let analysis = analyze(&plan, &HaversineMatrix::default(), &ConstraintSet::default()).unwrap();

        let capacity = analysis.constraint(TECHNICIAN_CAPACITY).unwrap();
        assert_eq!(capacity.weight, HardSoftScore::ONE_HARD);
        assert_eq!(capacity.score, HardSoftScore::of_hard(-2));
        assert_eq!(capacity.matches.len(), 1);
        assert_eq!(
            capacity.matches[0].justification.description(),
            "Technician '3' exceeded its max capacity by 2."
        );

        let travel = analysis.constraint(MINIMIZE_TRAVEL_TIME).unwrap();
        assert_eq!(travel.matches.len(), 2);
        assert_eq!(analysis.score, capacity.score + travel.score);
        assert_eq!(analysis.score.hard(), -2);
        assert!(analysis.score.soft() < 0);
    }

    #[test]
    fn test_analysis_does_not_touch_input() {
        let plan = overloaded();
        let before = plan.clone();
        analyze(&plan, &HaversineMatrix::default(), &ConstraintSet::default()).unwrap();
        assert_eq!(plan, before);
    }

    #[test]
    fn test_must_work_lists_idle_technicians() {
        let constraints = ConstraintSet::default().with_technician_must_work(1);
        let analysis = analyze(&overloaded(), &HaversineMatrix::default(), &constraints).unwrap();
        let names: Vec<&str> = analysis.constraints.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec![TECHNICIAN_CAPACITY, UNASSIGNED_VISIT, TECHNICIAN_MUST_WORK, MINIMIZE_TRAVEL_TIME]
        );

        let idle = analysis.constraint(TECHNICIAN_MUST_WORK).unwrap();
        assert_eq!(idle.matches.len(), 1);
        assert_eq!(idle.matches[0].justification.description(), "Technician '4' has no work to do");
    }

    #[test]
    fn test_rejects_invalid_plan() {
        let mut plan = overloaded();
        plan.visits[0].demand = -1;
        assert!(matches!(
            analyze(&plan, &HaversineMatrix::default(), &ConstraintSet::default()),
            Err(PlanError::InvalidDemand { .. })
        ));
    }

    #[test]
    fn test_unassigned_visits_score_below_routed_ones() {
        let routed = RoutePlan::new(
            "pool",
            Location::new(0.0, 0.0),
            Location::new(1.0, 1.0),
            vec![Technician::new("1", 5, Location::new(0.0, 0.0)).with_visits(["a"])],
            vec![Visit::new("a", "a", Location::new(0.0, 0.1), 2)],
        );
        let mut left_out = routed.clone();
        left_out.technicians[0].visits.clear();

        let provider = HaversineMatrix::default();
        let routed = analyze(&routed, &provider, &ConstraintSet::default()).unwrap();
        let left_out = analyze(&left_out, &provider, &ConstraintSet::default()).unwrap();
        assert!(routed.score.is_feasible());
        assert_eq!(left_out.score, HardSoftScore::of_hard(-2));
        assert!(routed.score > left_out.score);

        let pool = left_out.constraint(UNASSIGNED_VISIT).unwrap();
        assert_eq!(pool.matches.len(), 1);
        assert_eq!(
            pool.matches[0].justification.description(),
            "Visit 'a' is not assigned to any technician."
        );
        assert!(routed.constraint(UNASSIGNED_VISIT).unwrap().matches.is_empty());
    }

    #[test]
    fn test_oversized_demand_is_rejected() {
        let mut plan = overloaded();
        plan.visits[0].demand = 1 << 62;
        plan.visits[1].demand = 1 << 62;
        assert!(matches!(
            analyze(&plan, &HaversineMatrix::default(), &ConstraintSet::default()),
            Err(PlanError::DemandTooLarge(_))
        ));
    }

    #[test]
    fn test_serializes_camel_case() {
        let analysis =
            analyze(&overloaded(), &HaversineMatrix::default(), &ConstraintSet::default()).unwrap();
        let json = serde_json::to_value(&analysis).unwrap();
        assert_eq!(json["constraints"][0]["name"], TECHNICIAN_CAPACITY);
        assert_eq!(json["constraints"][0]["weight"]["hard"], 1);
        assert_eq!(json["constraints"][0]["matches"][0]["justification"]["type"], "technicianCapacity");
        assert_eq!(json["constraints"][0]["matches"][0]["justification"]["technicianId"], "3");
    }
}
