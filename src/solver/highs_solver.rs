// HiGHS Solver Adapter
// Translates the loaded model into a HiGHS row problem on every solve

use super::common;
use crate::domain::solver_service::{
    LoadedModel, Result, SolveOptions, SolveOutcome, SolverAdapter, SolverError,
};
use crate::domain::value_objects::{OptimizationType, SolutionStatus};
use highs::{HighsModelStatus, RowProblem, Sense};

#[derive(Debug, Default)]
pub struct HighsSolver {
    loaded: LoadedModel,
}

impl HighsSolver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SolverAdapter for HighsSolver {
    fn name(&self) -> &str {
        "HiGHS"
    }

    fn supports_mip(&self) -> bool {
        true
    }

    fn loaded(&self) -> &LoadedModel {
        &self.loaded
    }

    fn loaded_mut(&mut self) -> &mut LoadedModel {
        &mut self.loaded
    }

    fn solve(&mut self, options: &SolveOptions) -> Result<SolveOutcome> {
        common::ensure_linear(&self.loaded, self.name())?;
        if let Some(outcome) = common::trivial_outcome(&self.loaded) {
            return Ok(outcome);
        }

        let mut costs = vec![0.0; self.loaded.columns.len()];
        for &(index, coeff) in &self.loaded.objective.terms {
            costs[index] += coeff;
        }

        // Use HiGHS RowProblem (add columns first, then rows)
        let mut pb = RowProblem::default();
        let mut cols = Vec::with_capacity(self.loaded.columns.len());
        for (column, &cost) in self.loaded.columns.iter().zip(&costs) {
            let col = if common::is_integer(column, options) {
                pb.add_integer_column(cost, column.lower..=column.upper)
            } else {
                pb.add_column(cost, column.lower..=column.upper)
            };
            cols.push(col);
        }
        for row in common::enforced_rows(&self.loaded) {
            let terms: Vec<_> = row
                .terms
                .iter()
                .map(|&(index, coeff)| (cols[index], coeff))
                .collect();
            pb.add_row(row.lower..=row.upper, &terms);
        }

        let sense = match self.loaded.objective.sense {
            OptimizationType::Maximize => Sense::Maximise,
            OptimizationType::Minimize => Sense::Minimise,
        };
        let mut model = pb.optimise(sense);
        if !options.verbose {
            model.make_quiet();
        }
        if let Some(seconds) = options.time_limit {
            model.set_option("time_limit", seconds);
        }
        if let Some(gap) = options.gap_tolerance {
            model.set_option("mip_rel_gap", gap);
        }

        let solved = model.solve();
        match solved.status() {
            HighsModelStatus::Optimal => {
                let values = solved.get_solution().columns().to_vec();
                Ok(common::optimal(&self.loaded, values))
            }
            HighsModelStatus::Infeasible => {
                Ok(SolveOutcome::without_values(SolutionStatus::Infeasible))
            }
            HighsModelStatus::Unbounded | HighsModelStatus::UnboundedOrInfeasible => {
                Ok(SolveOutcome::without_values(SolutionStatus::Unbounded))
            }
            status => Err(SolverError::ExecutionFailed(format!(
                "HiGHS solver returned status: {:?}",
                status
            ))),
        }
    }

    fn spawn(&self) -> Box<dyn SolverAdapter> {
        Box::new(Self::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::expression::LinearExpression;
    use crate::domain::ids::{ConstraintId, VariableId};
    use crate::domain::models::{Constraint, Objective, Variable};
    use crate::domain::value_objects::{Relation, VariableKind};

    #[test]
    fn solves_small_lp_and_detects_unbounded() {
        let mut solver = HighsSolver::new();
        let x = VariableId::new(0);
        solver
            .load_variable(x, &Variable::continuous(VariableKind::Flux, "x"))
            .unwrap();
        solver
            .load_constraint(
                ConstraintId::new(0),
                &Constraint::new(LinearExpression::term(x, 1.0), Relation::LessThanOrEqual, 4.0),
            )
            .unwrap();
        solver
            .load_objective(&Objective::maximize(LinearExpression::term(x, 2.0).with_constant(1.0)))
            .unwrap();
        let outcome = solver.solve(&SolveOptions::default()).unwrap();
        assert_eq!(outcome.status, SolutionStatus::Optimal);
        assert!((outcome.objective_value - 9.0).abs() < 1e-6);

        solver
            .load_constraint(
                ConstraintId::new(0),
                &Constraint::new(LinearExpression::term(x, 1.0), Relation::GreaterThanOrEqual, 4.0),
            )
            .unwrap();
        let outcome = solver.solve(&SolveOptions::default()).unwrap();
        assert_eq!(outcome.status, SolutionStatus::Unbounded);
    }
}
