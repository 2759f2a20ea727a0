//! Gap-filling: the cheapest set of candidate reactions that lets the model
//! reach a required objective level.
//!
//! The search runs on a fork of the model: use indicators for the candidates
//! and the objective requirement never reach the caller's model. Only the
//! solutions come back, trimmed to the caller's variables.

use super::alternatives::{enumerate_alternatives, EnumerationConfig};
use super::cancellation::Cancellation;
use crate::domain::error::Result;
use crate::domain::expression::LinearExpression;
use crate::domain::ids::VariableId;
use crate::domain::models::{Objective, Solution};
use crate::domain::problem::ProblemModel;
use crate::domain::value_objects::Relation;
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct GapFillCandidate {
    /// Flux variable that may be switched on
    pub flux: VariableId,
    /// Penalty for using it
    pub cost: f64,
}

impl GapFillCandidate {
    pub fn new(flux: VariableId, cost: f64) -> Self {
        Self { flux, cost }
    }
}

#[derive(Debug, Clone)]
pub struct GapFillConfig {
    pub candidates: Vec<GapFillCandidate>,
    /// Level the original objective must reach (at most this when minimizing)
    pub required_objective: f64,
    /// Alternative gap-fill sets to look for beyond the cheapest
    pub alternatives: usize,
    /// Accepted relative cost increase of alternative sets
    pub tolerance: f64,
    /// Append the gap-fill solutions to the model's history
    pub record_solutions: bool,
    pub cancellation: Option<Cancellation>,
}

impl GapFillConfig {
    pub fn new(candidates: Vec<GapFillCandidate>, required_objective: f64) -> Self {
        Self {
            candidates,
            required_objective,
            alternatives: 0,
            tolerance: 0.0,
            record_solutions: true,
            cancellation: None,
        }
    }

    pub fn with_alternatives(mut self, alternatives: usize, tolerance: f64) -> Self {
        self.alternatives = alternatives;
        self.tolerance = tolerance;
        self
    }

    pub fn with_record_solutions(mut self, record: bool) -> Self {
        self.record_solutions = record;
        self
    }

    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = Some(cancellation);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GapFillSolution {
    /// Candidate fluxes switched on, in candidate order
    pub activated: Vec<VariableId>,
    pub cost: f64,
    pub solution: Solution,
}

#[derive(Debug, Clone, Default)]
pub struct GapFillReport {
    /// Cheapest set first
    pub solutions: Vec<GapFillSolution>,
    pub cancelled: bool,
}

impl GapFillReport {
    /// No candidate set reaches the required objective
    pub fn is_infeasible(&self) -> bool {
        self.solutions.is_empty() && !self.cancelled
    }
}

pub fn gap_fill(model: &mut ProblemModel, config: &GapFillConfig) -> Result<GapFillReport> {
    for candidate in &config.candidates {
        model.ensure_variable(candidate.flux)?;
    }
    let mut work = model.fork();

    let relation = if work.is_max() {
        Relation::GreaterThanOrEqual
    } else {
        Relation::LessThanOrEqual
    };
    work.add_objective_constraint(config.required_objective, relation)?;

    let mut cost = LinearExpression::new();
    let mut indicators = Vec::with_capacity(config.candidates.len());
    for candidate in &config.candidates {
        let indicator = work.add_use_variable(candidate.flux)?;
        cost.add_term(indicator, candidate.cost);
        indicators.push(indicator);
    }
    work.set_objective(Objective::minimize(cost))?;

    let mut enumeration = EnumerationConfig::default()
        .tracking(indicators.iter().copied())
        .with_depth(config.alternatives)
        .with_tolerance(config.tolerance)
        .with_record_solutions(false);
    enumeration.cancellation = config.cancellation.clone();
    let found = enumerate_alternatives(&mut work, &enumeration)?;

    let width = model.num_variables();
    let mut report = GapFillReport {
        solutions: Vec::with_capacity(found.solutions.len()),
        cancelled: found.cancelled,
    };
    for mut solution in found.solutions {
        let activated = config
            .candidates
            .iter()
            .zip(&indicators)
            .filter(|(_, indicator)| solution.value(indicator.index()).unwrap_or(0.0) > 0.5)
            .map(|(candidate, _)| candidate.flux)
            .collect();
        let cost = solution.objective_value.unwrap_or(0.0);
        solution.variable_values.truncate(width);
        solution.note = format!("gapfill cost {cost}");
        report.solutions.push(GapFillSolution {
            activated,
            cost,
            solution,
        });
    }

    if config.record_solutions {
        for filled in &report.solutions {
            model.record_solution(filled.solution.clone());
        }
    }
    info!(
        component = "gap_filling",
        operation = "gap_fill",
        status = if report.is_infeasible() { "infeasible" } else { "success" },
        candidates = config.candidates.len(),
        solutions = report.solutions.len(),
        cheapest = report.solutions.first().map_or(f64::NAN, |s| s.cost),
        "Gap-filling finished"
    );
    Ok(report)
}
