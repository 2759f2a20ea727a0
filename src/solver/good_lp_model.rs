// Builds a good_lp problem from the loaded model; shared by the good_lp backends

use super::common;
use crate::domain::solver_service::{LoadedModel, Result, SolveOptions, SolveOutcome, SolverError};
use crate::domain::value_objects::{OptimizationType, SolutionStatus};
use good_lp::{
    solvers::Solver, variable, variables, Expression, ResolutionError,
    Solution as GoodLpSolutionTrait, SolverModel, Variable as GoodLpVariable,
};

/// Solve `loaded` with a good_lp backend.
///
/// `configure` gets the backend model after all rows were added, for
/// backend-specific options such as time limits.
pub(crate) fn solve_with<S>(
    loaded: &LoadedModel,
    options: &SolveOptions,
    solver: S,
    configure: impl FnOnce(&mut S::Model),
) -> Result<SolveOutcome>
where
    S: Solver,
    S::Model: SolverModel<Error = ResolutionError>,
{
    if let Some(outcome) = common::trivial_outcome(loaded) {
        return Ok(outcome);
    }

    let mut vars = variables!();
    let mut columns: Vec<GoodLpVariable> = Vec::with_capacity(loaded.columns.len());
    for column in &loaded.columns {
        let mut definition = variable();
        if common::is_integer(column, options) {
            definition = definition.integer();
        }
        if column.lower.is_finite() {
            definition = definition.min(column.lower);
        }
        if column.upper.is_finite() {
            definition = definition.max(column.upper);
        }
        columns.push(vars.add(definition));
    }

    let mut objective: Expression = 0.into();
    for &(index, coeff) in &loaded.objective.terms {
        objective += coeff * columns[index];
    }

    let mut model = match loaded.objective.sense {
        OptimizationType::Maximize => vars.maximise(objective).using(solver),
        OptimizationType::Minimize => vars.minimise(objective).using(solver),
    };

    for row in common::enforced_rows(loaded) {
        let mut lhs: Expression = 0.into();
        for &(index, coeff) in &row.terms {
            lhs += coeff * columns[index];
        }
        if row.lower == row.upper {
            model.add_constraint(lhs.eq(row.upper));
            continue;
        }
        if row.lower.is_finite() {
            model.add_constraint(lhs.clone().geq(row.lower));
        }
        if row.upper.is_finite() {
            model.add_constraint(lhs.leq(row.upper));
        }
    }
    configure(&mut model);

    match model.solve() {
        Ok(solution) => {
            let values = columns.iter().map(|&var| solution.value(var)).collect();
            Ok(common::optimal(loaded, values))
        }
        Err(ResolutionError::Infeasible) => {
            Ok(SolveOutcome::without_values(SolutionStatus::Infeasible))
        }
        Err(ResolutionError::Unbounded) => {
            Ok(SolveOutcome::without_values(SolutionStatus::Unbounded))
        }
        Err(e) => Err(SolverError::ExecutionFailed(format!("{:?}", e))),
    }
}
