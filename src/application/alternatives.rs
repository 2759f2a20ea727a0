//! Recursive enumeration of alternative solutions.
//!
//! Every node of the search is a [`Branch`]: the cut-set applied on top of
//! the constraints captured when the search started. Before each solve the
//! model's constraints are restored from that capture and the branch's cuts
//! are added again, so sibling branches never see each other's cuts.
//!
//! A solution is excluded from its children by a disjunction: the tracked
//! integer assignment changes (a no-good cut), or one tracked continuous
//! variable leaves its band (one child per side). Each child also carries
//! the complements of its earlier siblings' cuts, so the children partition
//! what is left and never find the same solution twice. Pure binary
//! tracking degenerates to a single chain of no-good cuts.

use super::cancellation::{self, Cancellation};
use crate::domain::error::Result;
use crate::domain::expression::LinearExpression;
use crate::domain::ids::{StateHandle, VariableId};
use crate::domain::models::{Constraint, Solution};
use crate::domain::problem::{ProblemModel, StateParts};
use crate::domain::value_objects::{OptimizationType, Relation, SolutionStatus};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Absolute slack on top of the relative tolerance, for solver round-off
const OBJECTIVE_EPSILON: f64 = 1e-7;

#[derive(Debug, Clone)]
pub struct EnumerationConfig {
    /// Maximum number of exclusion cuts stacked on one branch
    pub depth: usize,
    /// Variables whose assignment makes a solution distinct. Empty means
    /// every integer variable of the model.
    pub tracked: BTreeSet<VariableId>,
    /// Accepted relative objective degradation against the first solution
    pub tolerance: f64,
    /// Continuous values must move at least this far to be a new solution
    pub epsilon: f64,
    /// Constrain every branch to the accepted objective range
    pub hold_objective: bool,
    pub max_solutions: Option<usize>,
    /// Append the solutions found to the model's history
    pub record_solutions: bool,
    pub cancellation: Option<Cancellation>,
}

impl Default for EnumerationConfig {
    fn default() -> Self {
        Self {
            depth: 10,
            tracked: BTreeSet::new(),
            tolerance: 0.0,
            epsilon: 1e-3,
            hold_objective: true,
            max_solutions: None,
            record_solutions: true,
            cancellation: None,
        }
    }
}

impl EnumerationConfig {
    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    pub fn tracking(mut self, variables: impl IntoIterator<Item = VariableId>) -> Self {
        self.tracked = variables.into_iter().collect();
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_hold_objective(mut self, hold: bool) -> Self {
        self.hold_objective = hold;
        self
    }

    pub fn with_max_solutions(mut self, max: usize) -> Self {
        self.max_solutions = Some(max);
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

#[derive(Debug, Clone, Default)]
pub struct EnumerationReport {
    /// Distinct accepted solutions, in the order they were found
    pub solutions: Vec<Solution>,
    /// Solves issued
    pub branches: usize,
    /// Branches closed because no solution was left
    pub infeasible_branches: usize,
    /// Branches closed because the objective left the accepted range
    pub degraded_branches: usize,
    /// Solutions that repeated an earlier assignment and were not kept
    pub duplicates: usize,
    /// Some branch stopped on the depth or solution limit
    pub truncated: bool,
    pub cancelled: bool,
}

impl EnumerationReport {
    /// No branch was cut short, so no further alternative exists
    pub fn is_exhausted(&self) -> bool {
        !self.truncated && !self.cancelled
    }
}

/// Cuts applied on top of the base constraints
#[derive(Debug, Clone, Default)]
struct Branch {
    cuts: Vec<Constraint>,
    depth: usize,
}

impl Branch {
    fn child(&self, extra: impl IntoIterator<Item = Constraint>) -> Self {
        let mut cuts = self.cuts.clone();
        cuts.extend(extra);
        Self {
            cuts,
            depth: self.depth + 1,
        }
    }
}

#[derive(Debug, Default)]
struct Tracked {
    /// Variables restricted to {0, 1}
    binary: Vec<VariableId>,
    /// Everything else with the distance that separates two values
    banded: Vec<(VariableId, f64)>,
}

impl Tracked {
    fn resolve(model: &ProblemModel, config: &EnumerationConfig) -> Result<Self> {
        let ids: Vec<VariableId> = if config.tracked.is_empty() {
            model
                .variable_ids()
                .filter(|&id| model.variables()[id.index()].is_integer())
                .collect()
        } else {
            config.tracked.iter().copied().collect()
        };
        let mut tracked = Tracked::default();
        for id in ids {
            let variable = model.variable(id)?;
            if variable.is_integer() && variable.lower_bound >= 0.0 && variable.upper_bound <= 1.0
            {
                tracked.binary.push(id);
            } else if variable.is_integer() {
                tracked.banded.push((id, 1.0));
            } else {
                tracked.banded.push((id, config.epsilon));
            }
        }
        Ok(tracked)
    }

    fn is_empty(&self) -> bool {
        self.binary.is_empty() && self.banded.is_empty()
    }

    /// Equal on every tracked variable; banded values closer than half
    /// their band count as equal
    fn same_assignment(&self, a: &Solution, b: &Solution) -> bool {
        let value = |s: &Solution, id: VariableId| s.value(id.index()).unwrap_or(0.0);
        self.binary
            .iter()
            .all(|&id| (value(a, id) > 0.5) == (value(b, id) > 0.5))
            && self
                .banded
                .iter()
                .all(|&(id, band)| (value(a, id) - value(b, id)).abs() < band / 2.0)
    }

    /// `sum(ones) - sum(zeros) <= |ones| - 1`; the complement pins the
    /// assignment with `>= |ones|`
    fn no_good(&self, solution: &Solution) -> Option<Exclusion> {
        if self.binary.is_empty() {
            return None;
        }
        let mut expression = LinearExpression::new();
        let mut ones = 0.0;
        for &id in &self.binary {
            if solution.value(id.index()).unwrap_or(0.0) > 0.5 {
                expression.add_term(id, 1.0);
                ones += 1.0;
            } else {
                expression.add_term(id, -1.0);
            }
        }
        Some(Exclusion {
            cut: Constraint::new(expression.clone(), Relation::LessThanOrEqual, ones - 1.0)
                .with_name("no_good"),
            complement: Constraint::new(expression, Relation::GreaterThanOrEqual, ones)
                .with_name("kept_assignment"),
        })
    }

    /// One exclusion per side a banded variable can move to, skipping sides
    /// that leave the declared bounds
    fn band_exclusions(&self, model: &ProblemModel, solution: &Solution) -> Vec<Exclusion> {
        let mut exclusions = Vec::new();
        for &(id, band) in &self.banded {
            let variable = &model.variables()[id.index()];
            let mut value = solution.value(id.index()).unwrap_or(0.0);
            if variable.is_integer() {
                value = value.round();
            }
            let name = &variable.name;
            let side = |relation: Relation, cut_rhs: f64, complement_rhs: f64, label: &str| {
                let flipped = match relation {
                    Relation::LessThanOrEqual => Relation::GreaterThanOrEqual,
                    _ => Relation::LessThanOrEqual,
                };
                Exclusion {
                    cut: Constraint::new(LinearExpression::term(id, 1.0), relation, cut_rhs)
                        .with_name(format!("{name}_band_{label}")),
                    complement: Constraint::new(
                        LinearExpression::term(id, 1.0),
                        flipped,
                        complement_rhs,
                    )
                    .with_name(format!("{name}_not_{label}")),
                }
            };
            if value - band >= variable.lower_bound {
                exclusions.push(side(
                    Relation::LessThanOrEqual,
                    value - band,
                    value - band / 2.0,
                    "below",
                ));
            }
            if value + band <= variable.upper_bound {
                exclusions.push(side(
                    Relation::GreaterThanOrEqual,
                    value + band,
                    value + band / 2.0,
                    "above",
                ));
            }
        }
        exclusions
    }
}

/// One way out of a solution's neighbourhood: children take `cut`, later
/// siblings take `complement`. The two are at least half a band apart.
#[derive(Debug, Clone)]
struct Exclusion {
    cut: Constraint,
    complement: Constraint,
}

struct Search<'a> {
    model: &'a mut ProblemModel,
    config: &'a EnumerationConfig,
    base: StateHandle,
    tracked: Tracked,
    reference: Option<f64>,
    report: EnumerationReport,
}

impl Search<'_> {
    fn slack(&self, reference: f64) -> f64 {
        self.config.tolerance * reference.abs() + OBJECTIVE_EPSILON
    }

    fn stop_requested(&mut self) -> bool {
        if cancellation::is_cancelled(&self.config.cancellation) {
            self.report.cancelled = true;
            return true;
        }
        if self
            .config
            .max_solutions
            .is_some_and(|max| self.report.solutions.len() >= max)
        {
            self.report.truncated = true;
            return true;
        }
        false
    }

    fn objective_cut(&self, reference: f64) -> Option<Constraint> {
        let objective = self.model.objective();
        if !self.config.hold_objective || objective.expression.is_quadratic() {
            return None;
        }
        let slack = self.slack(reference);
        let (relation, bound) = match objective.optimization_type {
            OptimizationType::Maximize => (Relation::GreaterThanOrEqual, reference - slack),
            OptimizationType::Minimize => (Relation::LessThanOrEqual, reference + slack),
        };
        Some(
            Constraint::new(objective.expression.clone(), relation, bound)
                .with_name("objective_bound"),
        )
    }

    fn descend(&mut self, branch: Branch) -> Result<()> {
        if self.stop_requested() {
            return Ok(());
        }
        self.model.restore_state(self.base, StateParts::CONSTRAINTS)?;
        for cut in &branch.cuts {
            self.model.add_constraint(cut.clone())?;
        }
        let note = format!("alternative depth {}", branch.depth);
        let solution = self.model.solve(note)?;
        self.report.branches += 1;

        if !solution.is_feasible() {
            if solution.status == SolutionStatus::Unbounded {
                warn!(
                    component = "alternatives",
                    operation = "descend",
                    status = "unbounded",
                    depth = branch.depth,
                    "Branch is unbounded"
                );
            }
            self.report.infeasible_branches += 1;
            return Ok(());
        }

        let value = solution.objective_value.unwrap_or(0.0);
        let reference = *self.reference.get_or_insert(value);
        let sense = self.model.objective().optimization_type;
        if !sense.accepts(value, reference, self.slack(reference)) {
            debug!(
                component = "alternatives",
                operation = "descend",
                status = "degraded",
                depth = branch.depth,
                value,
                reference,
                "Objective left the accepted range"
            );
            self.report.degraded_branches += 1;
            return Ok(());
        }

        if self
            .report
            .solutions
            .iter()
            .any(|seen| self.tracked.same_assignment(seen, &solution))
        {
            self.report.duplicates += 1;
        } else {
            self.report.solutions.push(solution.clone());
        }

        if branch.depth >= self.config.depth {
            self.report.truncated = true;
            return Ok(());
        }

        let mut taken: Vec<Constraint> = match branch.depth {
            0 => self.objective_cut(reference).into_iter().collect(),
            _ => Vec::new(),
        };
        let mut exclusions: Vec<Exclusion> = self.tracked.no_good(&solution).into_iter().collect();
        exclusions.extend(self.tracked.band_exclusions(self.model, &solution));

        // Child i also takes the complements of children 0..i, so no point
        // is reachable from two siblings
        for exclusion in exclusions {
            let child = branch.child(taken.iter().cloned().chain(std::iter::once(exclusion.cut)));
            self.descend(child)?;
            taken.push(exclusion.complement);
        }
        Ok(())
    }
}

/// Enumerate distinct solutions of comparable quality.
///
/// The model's constraints are restored when the search ends, also on
/// error. Solutions go to the report and, when configured, the history.
pub fn enumerate_alternatives(
    model: &mut ProblemModel,
    config: &EnumerationConfig,
) -> Result<EnumerationReport> {
    let tracked = Tracked::resolve(model, config)?;
    if tracked.is_empty() {
        warn!(
            component = "alternatives",
            operation = "enumerate",
            status = "no_tracked_variables",
            "Nothing tracked; only the first solution can be found"
        );
    }
    let base = model.save_state(StateParts::CONSTRAINTS);
    let mut search = Search {
        model,
        config,
        base,
        tracked,
        reference: None,
        report: EnumerationReport::default(),
    };
    let outcome = search.descend(Branch::default());
    let Search { model, report, .. } = search;

    let restored = model
        .restore_state(base, StateParts::CONSTRAINTS)
        .and_then(|()| model.clear_state(base));
    outcome?;
    restored?;

    if config.record_solutions {
        for solution in &report.solutions {
            model.record_solution(solution.clone());
        }
    }
    info!(
        component = "alternatives",
        operation = "enumerate",
        status = "success",
        solutions = report.solutions.len(),
        branches = report.branches,
        infeasible = report.infeasible_branches,
        degraded = report.degraded_branches,
        duplicates = report.duplicates,
        exhausted = report.is_exhausted(),
        "Alternative enumeration finished"
    );
    Ok(report)
}
