use super::{common, good_lp_model};
use crate::domain::solver_service::{LoadedModel, Result, SolveOptions, SolveOutcome, SolverAdapter};
use good_lp::solvers::coin_cbc::{coin_cbc, CoinCbcProblem};

#[derive(Debug, Default)]
pub struct CoinCbcSolver {
    loaded: LoadedModel,
}

impl CoinCbcSolver {
    pub fn new() -> Self {
        Self::default()
    }
}

fn configure(model: &mut CoinCbcProblem, options: &SolveOptions) {
    if !options.verbose {
        model.set_parameter("logLevel", "0");
        model.set_parameter("slogLevel", "0");
    }
    if let Some(seconds) = options.time_limit {
        model.set_parameter("seconds", &seconds.to_string());
    }
    if let Some(gap) = options.gap_tolerance {
        model.set_parameter("ratioGap", &gap.to_string());
    }
}

impl SolverAdapter for CoinCbcSolver {
    fn name(&self) -> &str {
        "COIN-OR CBC"
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
        good_lp_model::solve_with(&self.loaded, options, coin_cbc, |model| {
            configure(model, options)
        })
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
    use crate::domain::value_objects::{Relation, SolutionStatus, VariableKind};

    #[test]
    fn solves_binary_knapsack() {
        let mut solver = CoinCbcSolver::new();
        let weights = [3.0, 4.0, 2.0];
        let profits = [4.0, 5.0, 3.0];
        let mut capacity = LinearExpression::new();
        let mut profit = LinearExpression::new();
        for i in 0..3u32 {
            let id = VariableId::new(i);
            solver
                .load_variable(id, &Variable::binary(VariableKind::ReactionUse, format!("b{i}")))
                .unwrap();
            capacity.add_term(id, weights[i as usize]);
            profit.add_term(id, profits[i as usize]);
        }
        solver
            .load_constraint(
                ConstraintId::new(0),
                &Constraint::new(capacity, Relation::LessThanOrEqual, 6.0),
            )
            .unwrap();
        solver.load_objective(&Objective::maximize(profit)).unwrap();

        let outcome = solver
            .solve(&SolveOptions {
                want_integer: true,
                ..SolveOptions::default()
            })
            .unwrap();
        assert_eq!(outcome.status, SolutionStatus::Optimal);
        assert!((outcome.objective_value - 8.0).abs() < 1e-6);
    }
}
