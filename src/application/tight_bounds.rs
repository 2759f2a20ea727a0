//! Tight-bound (flux variability) search.
//!
//! For every requested variable the objective is replaced by "minimize this
//! variable" and then "maximize this variable"; the original objective and
//! constraints are restored when the sweep ends. Sides that a recorded,
//! still-feasible solution already pins to a declared bound are not solved,
//! and neither are variables the caller already knows.

use super::cancellation::{self, Cancellation};
use crate::domain::error::Result;
use crate::domain::ids::{ConstraintId, VariableId};
use crate::domain::models::Solution;
use crate::domain::problem::{ProblemModel, StateParts};
use crate::domain::value_objects::{Relation, SolutionStatus};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Slack for the held objective and for accepting recorded solutions
const FEASIBILITY_TOLERANCE: f64 = 1e-7;

/// What to do when a min or max sub-solve is infeasible
#[derive(Debug, Clone, Default, PartialEq)]
pub enum InfeasiblePolicy {
    /// Keep the declared bound and record a diagnostic
    #[default]
    KeepDeclared,
    /// Relax these constraints and solve once more; fall back to the
    /// declared bound if that fails too
    RelaxAndRetry(Vec<ConstraintId>),
}

/// Where one side of a tight bound came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundSource {
    Solved,
    /// Supplied by the caller in [`TightBoundConfig::known`]
    Known,
    /// A recorded solution attains the declared bound
    Witnessed,
    /// The sub-solve was infeasible; the declared bound was kept
    Declared,
    /// Solved after relaxing constraints
    Relaxed,
    Unbounded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TightBound {
    pub variable: VariableId,
    pub min: f64,
    pub max: f64,
    pub min_source: BoundSource,
    pub max_source: BoundSource,
}

#[derive(Debug, Clone)]
pub struct TightBoundConfig {
    /// Variables to examine; empty means all of them
    pub variables: Vec<VariableId>,
    /// Solve first and keep the objective within this fraction of the
    /// optimum while sweeping
    pub objective_fraction: Option<f64>,
    /// Skip sides that recorded solutions already pin to a declared bound
    pub use_recorded_solutions: bool,
    /// Ranges from an earlier sweep of the same model
    pub known: BTreeMap<VariableId, (f64, f64)>,
    pub infeasible_policy: InfeasiblePolicy,
    /// Write the tight ranges back as variable bounds
    pub apply_to_model: bool,
    /// Append every sub-solve to the model's solution history
    pub record_solutions: bool,
    /// Spread the sweep over forked models (needs the `parallel` feature)
    pub parallel: bool,
    pub cancellation: Option<Cancellation>,
}

impl Default for TightBoundConfig {
    fn default() -> Self {
        Self {
            variables: Vec::new(),
            objective_fraction: None,
            use_recorded_solutions: true,
            known: BTreeMap::new(),
            infeasible_policy: InfeasiblePolicy::KeepDeclared,
            apply_to_model: false,
            record_solutions: false,
            parallel: false,
            cancellation: None,
        }
    }
}

impl TightBoundConfig {
    pub fn for_variables(mut self, variables: impl IntoIterator<Item = VariableId>) -> Self {
        self.variables = variables.into_iter().collect();
        self
    }

    pub fn with_objective_fraction(mut self, fraction: f64) -> Self {
        self.objective_fraction = Some(fraction);
        self
    }

    pub fn with_recorded_solutions(mut self, enabled: bool) -> Self {
        self.use_recorded_solutions = enabled;
        self
    }

    pub fn with_known(mut self, known: BTreeMap<VariableId, (f64, f64)>) -> Self {
        self.known = known;
        self
    }

    pub fn with_infeasible_policy(mut self, policy: InfeasiblePolicy) -> Self {
        self.infeasible_policy = policy;
        self
    }

    pub fn with_apply_to_model(mut self, apply: bool) -> Self {
        self.apply_to_model = apply;
        self
    }

    pub fn with_record_solutions(mut self, record: bool) -> Self {
        self.record_solutions = record;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = Some(cancellation);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct TightBoundReport {
    /// One entry per examined variable, in request order
    pub bounds: Vec<TightBound>,
    /// Infeasible sub-solves and other non-fatal findings
    pub diagnostics: Vec<String>,
    /// Sub-solve records, kept when `record_solutions` is set
    pub solutions: Vec<Solution>,
    pub solves: usize,
    /// Sides answered without a solve
    pub skipped: usize,
    pub cancelled: bool,
}

impl TightBoundReport {
    pub fn bound(&self, variable: VariableId) -> Option<&TightBound> {
        self.bounds.iter().find(|b| b.variable == variable)
    }

    /// Ranges that can seed [`TightBoundConfig::known`] for a later sweep
    pub fn known(&self) -> BTreeMap<VariableId, (f64, f64)> {
        self.bounds
            .iter()
            .filter(|b| {
                !matches!(b.min_source, BoundSource::Declared | BoundSource::Relaxed)
                    && !matches!(b.max_source, BoundSource::Declared | BoundSource::Relaxed)
            })
            .map(|b| (b.variable, (b.min, b.max)))
            .collect()
    }

    fn merge(&mut self, other: TightBoundReport) {
        self.bounds.extend(other.bounds);
        self.diagnostics.extend(other.diagnostics);
        self.solutions.extend(other.solutions);
        self.solves += other.solves;
        self.skipped += other.skipped;
        self.cancelled |= other.cancelled;
    }
}

/// One variable with the sides the pre-pass already answered
#[derive(Debug, Clone)]
struct Planned {
    variable: VariableId,
    min: Option<(f64, BoundSource)>,
    max: Option<(f64, BoundSource)>,
}

/// Compute tight bounds for the configured variables.
///
/// Infeasible sub-solves never abort the sweep; they are handled by the
/// configured [`InfeasiblePolicy`]. The model's objective and constraints
/// are restored afterwards, also on error.
pub fn tight_bounds(model: &mut ProblemModel, config: &TightBoundConfig) -> Result<TightBoundReport> {
    let targets: Vec<VariableId> = if config.variables.is_empty() {
        model.variable_ids().collect()
    } else {
        config.variables.clone()
    };
    for &id in &targets {
        model.ensure_variable(id)?;
    }

    let handle = model.save_state(StateParts::OBJECTIVE | StateParts::CONSTRAINTS);
    let outcome = sweep(model, config, &targets);
    let restored = model
        .restore_state(handle, StateParts::OBJECTIVE | StateParts::CONSTRAINTS)
        .and_then(|()| model.clear_state(handle));
    let report = outcome?;
    restored?;

    if config.apply_to_model {
        for bound in &report.bounds {
            model.set_bounds(bound.variable, bound.min.min(bound.max), bound.max)?;
        }
    }
    if config.record_solutions {
        for solution in &report.solutions {
            model.record_solution(solution.clone());
        }
    }
    info!(
        component = "tight_bounds",
        operation = "sweep",
        status = if report.cancelled { "cancelled" } else { "success" },
        variables = report.bounds.len(),
        solves = report.solves,
        skipped = report.skipped,
        diagnostics = report.diagnostics.len(),
        "Tight-bound search finished"
    );
    Ok(report)
}

fn sweep(
    model: &mut ProblemModel,
    config: &TightBoundConfig,
    targets: &[VariableId],
) -> Result<TightBoundReport> {
    let mut report = TightBoundReport::default();
    if let Some(fraction) = config.objective_fraction {
        hold_objective(model, fraction, &mut report)?;
    }
    let plan = plan(model, config, targets);

    if config.parallel {
        if let Some(partials) = parallel_sweep(model, config, &plan)? {
            for partial in partials {
                report.merge(partial);
            }
            return Ok(report);
        }
    }
    for planned in plan {
        if !examine(model, config, planned, &mut report)? {
            break;
        }
    }
    Ok(report)
}

/// Solve once and constrain the objective to stay near that optimum
fn hold_objective(model: &mut ProblemModel, fraction: f64, report: &mut TightBoundReport) -> Result<()> {
    if model.objective().expression.is_quadratic() {
        report
            .diagnostics
            .push("quadratic objective cannot be held as a constraint".to_string());
        return Ok(());
    }
    let reference = model.solve("tight bounds reference")?;
    report.solves += 1;
    let Some(value) = reference.objective_value.filter(|_| reference.is_feasible()) else {
        report.diagnostics.push(format!(
            "reference solve was {}; objective not held",
            reference.status
        ));
        return Ok(());
    };
    let slack = (1.0 - fraction).max(0.0) * value.abs() + FEASIBILITY_TOLERANCE;
    let (relation, bound) = if model.is_max() {
        (Relation::GreaterThanOrEqual, value - slack)
    } else {
        (Relation::LessThanOrEqual, value + slack)
    };
    model.add_objective_constraint(bound, relation)?;
    debug!(
        component = "tight_bounds",
        operation = "hold_objective",
        status = "success",
        value,
        bound,
        "Holding objective near optimum"
    );
    Ok(())
}

/// Recorded solutions that satisfy the current bounds and constraints
fn witnesses(model: &ProblemModel) -> Vec<&Solution> {
    model
        .solutions()
        .iter()
        .filter(|s| s.is_feasible() && s.variable_values.len() == model.num_variables())
        .filter(|s| {
            model.variables().iter().zip(&s.variable_values).all(|(v, &x)| {
                x >= v.lower_bound - FEASIBILITY_TOLERANCE && x <= v.upper_bound + FEASIBILITY_TOLERANCE
            })
        })
        .filter(|s| {
            model
                .constraints()
                .iter()
                .all(|c| c.is_satisfied(&s.variable_values, FEASIBILITY_TOLERANCE))
        })
        .collect()
}

fn plan(model: &ProblemModel, config: &TightBoundConfig, targets: &[VariableId]) -> Vec<Planned> {
    let witnesses = if config.use_recorded_solutions {
        witnesses(model)
    } else {
        Vec::new()
    };
    targets
        .iter()
        .map(|&variable| {
            if let Some(&(min, max)) = config.known.get(&variable) {
                return Planned {
                    variable,
                    min: Some((min, BoundSource::Known)),
                    max: Some((max, BoundSource::Known)),
                };
            }
            let declared = &model.variables()[variable.index()];
            let attains = |bound: f64| {
                bound.is_finite()
                    && witnesses.iter().any(|s| {
                        (s.variable_values[variable.index()] - bound).abs() <= FEASIBILITY_TOLERANCE
                    })
            };
            Planned {
                variable,
                min: attains(declared.lower_bound)
                    .then_some((declared.lower_bound, BoundSource::Witnessed)),
                max: attains(declared.upper_bound)
                    .then_some((declared.upper_bound, BoundSource::Witnessed)),
            }
        })
        .collect()
}

/// Fill both sides of one variable. Returns `false` once cancelled.
fn examine(
    model: &mut ProblemModel,
    config: &TightBoundConfig,
    planned: Planned,
    report: &mut TightBoundReport,
) -> Result<bool> {
    let mut sides = [planned.min, planned.max];
    for (slot, maximize) in sides.iter_mut().zip([false, true]) {
        if slot.is_some() {
            report.skipped += 1;
            continue;
        }
        if cancellation::is_cancelled(&config.cancellation) {
            report.cancelled = true;
            return Ok(false);
        }
        *slot = Some(solve_side(model, config, planned.variable, maximize, report)?);
    }
    if let [Some((min, min_source)), Some((max, max_source))] = sides {
        report.bounds.push(TightBound {
            variable: planned.variable,
            min,
            max,
            min_source,
            max_source,
        });
    }
    Ok(true)
}

fn solve_side(
    model: &mut ProblemModel,
    config: &TightBoundConfig,
    variable: VariableId,
    maximize: bool,
    report: &mut TightBoundReport,
) -> Result<(f64, BoundSource)> {
    let declared = model.variable(variable)?;
    let (lower, upper) = (declared.lower_bound, declared.upper_bound);
    let declared_side = if maximize { upper } else { lower };
    let label = format!(
        "tight {} {}",
        if maximize { "max" } else { "min" },
        declared.name
    );

    model.add_optimize_variable_objective(variable, maximize)?;
    let mut solution = model.solve(label.clone())?;
    report.solves += 1;
    let mut source = BoundSource::Solved;

    if solution.status == SolutionStatus::Infeasible {
        if let InfeasiblePolicy::RelaxAndRetry(relaxed) = &config.infeasible_policy {
            solution = solve_relaxed(model, relaxed, &label)?;
            report.solves += 1;
            source = BoundSource::Relaxed;
        }
    }

    let side = match solution.status {
        SolutionStatus::Optimal | SolutionStatus::Feasible => {
            let value = solution.value(variable.index()).unwrap_or(declared_side);
            (value.max(lower).min(upper), source)
        }
        SolutionStatus::Unbounded => (declared_side, BoundSource::Unbounded),
        SolutionStatus::Infeasible => {
            warn!(
                component = "tight_bounds",
                operation = "solve_side",
                status = "infeasible",
                variable = %variable,
                maximize,
                "Keeping declared bound"
            );
            report
                .diagnostics
                .push(format!("{label}: infeasible, declared bound {declared_side} kept"));
            (declared_side, BoundSource::Declared)
        }
    };
    if config.record_solutions {
        report.solutions.push(solution);
    }
    Ok(side)
}

fn solve_relaxed(
    model: &mut ProblemModel,
    relaxed: &[ConstraintId],
    label: &str,
) -> Result<Solution> {
    let handle = model.save_state(StateParts::CONSTRAINTS);
    let outcome = relaxed
        .iter()
        .try_for_each(|&id| model.relax_constraint(id))
        .and_then(|()| model.solve(format!("{label} (relaxed)")));
    let restored = model
        .restore_state(handle, StateParts::CONSTRAINTS)
        .and_then(|()| model.clear_state(handle));
    let solution = outcome?;
    restored?;
    Ok(solution)
}

/// Split the plan into one chunk per worker thread; each chunk runs on its
/// own fork of the model and the reports come back in request order.
#[cfg(feature = "parallel")]
fn parallel_sweep(
    model: &ProblemModel,
    config: &TightBoundConfig,
    plan: &[Planned],
) -> Result<Option<Vec<TightBoundReport>>> {
    use rayon::prelude::*;

    if plan.len() < 2 {
        return Ok(None);
    }
    let chunk_size = plan.len().div_ceil(rayon::current_num_threads().max(1));
    let jobs: Vec<(ProblemModel, Vec<Planned>)> = plan
        .chunks(chunk_size)
        .map(|chunk| (model.fork(), chunk.to_vec()))
        .collect();
    debug!(
        component = "tight_bounds",
        operation = "parallel_sweep",
        status = "started",
        workers = jobs.len(),
        "Sweeping on forked models"
    );
    jobs.into_par_iter()
        .map(|(mut worker, chunk)| {
            let mut partial = TightBoundReport::default();
            for planned in chunk {
                if !examine(&mut worker, config, planned, &mut partial)? {
                    break;
                }
            }
            Ok(partial)
        })
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

#[cfg(not(feature = "parallel"))]
fn parallel_sweep(
    _model: &ProblemModel,
    _config: &TightBoundConfig,
    _plan: &[Planned],
) -> Result<Option<Vec<TightBoundReport>>> {
    debug!(
        component = "tight_bounds",
        operation = "parallel_sweep",
        status = "sequential",
        "Built without the parallel feature"
    );
    Ok(None)
}
