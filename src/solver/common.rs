// Checks shared by every backend before the model is handed to a solver

use crate::domain::solver_service::{
    LoadedColumn, LoadedModel, LoadedRow, Result, SolveOptions, SolveOutcome, SolverError,
};
use crate::domain::value_objects::SolutionStatus;

const CONSTANT_ROW_TOLERANCE: f64 = 1e-9;

/// Rows the backend has to enforce: bounded on some side and with terms
pub(crate) fn enforced_rows(loaded: &LoadedModel) -> impl Iterator<Item = &LoadedRow> {
    loaded
        .rows
        .iter()
        .filter(|row| !row.is_free() && !row.terms.is_empty())
}

pub(crate) fn is_integer(column: &LoadedColumn, options: &SolveOptions) -> bool {
    options.want_integer && column.integer
}

/// Reject anything a linear backend cannot represent
pub(crate) fn ensure_linear(loaded: &LoadedModel, solver: &str) -> Result<()> {
    if loaded.has_quadratic() {
        return Err(SolverError::ModelUnsupported(format!(
            "{solver} only accepts linear models"
        )));
    }
    Ok(())
}

/// Outcomes that do not need a solver run: a row without terms whose
/// constant side is violated, or a model without columns.
pub(crate) fn trivial_outcome(loaded: &LoadedModel) -> Option<SolveOutcome> {
    let violated = loaded.rows.iter().any(|row| {
        row.terms.is_empty()
            && (row.lower > CONSTANT_ROW_TOLERANCE || row.upper < -CONSTANT_ROW_TOLERANCE)
    });
    if violated {
        return Some(SolveOutcome::without_values(SolutionStatus::Infeasible));
    }
    if loaded.columns.is_empty() {
        return Some(SolveOutcome {
            status: SolutionStatus::Optimal,
            objective_value: loaded.objective.constant,
            values: Vec::new(),
        });
    }
    None
}

pub(crate) fn optimal(loaded: &LoadedModel, values: Vec<f64>) -> SolveOutcome {
    SolveOutcome {
        status: SolutionStatus::Optimal,
        objective_value: loaded.objective.evaluate(&values),
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(terms: Vec<(usize, f64)>, lower: f64, upper: f64) -> LoadedRow {
        LoadedRow {
            terms,
            quadratic: Vec::new(),
            lower,
            upper,
        }
    }

    #[test]
    fn violated_constant_row_is_infeasible() {
        let mut loaded = LoadedModel::default();
        loaded.set_row(0, row(Vec::new(), 1.0, f64::INFINITY));
        let outcome = trivial_outcome(&loaded).unwrap();
        assert_eq!(outcome.status, SolutionStatus::Infeasible);
    }

    #[test]
    fn empty_model_is_optimal_at_constant() {
        let mut loaded = LoadedModel::default();
        loaded.objective.constant = 3.0;
        loaded.set_row(0, row(Vec::new(), f64::NEG_INFINITY, 0.0));
        let outcome = trivial_outcome(&loaded).unwrap();
        assert_eq!(outcome.status, SolutionStatus::Optimal);
        assert_eq!(outcome.objective_value, 3.0);
    }

    #[test]
    fn free_and_empty_rows_are_not_enforced() {
        let mut loaded = LoadedModel::default();
        loaded.set_row(0, row(vec![(0, 1.0)], f64::NEG_INFINITY, f64::INFINITY));
        loaded.set_row(1, row(Vec::new(), f64::NEG_INFINITY, 0.0));
        loaded.set_row(2, row(vec![(0, 1.0)], f64::NEG_INFINITY, 4.0));
        assert_eq!(enforced_rows(&loaded).count(), 1);
    }
}
