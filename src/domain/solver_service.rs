// Capability interface every solver backend implements.
// The problem model only talks to a backend through this trait.

use super::ids::{ConstraintId, VariableId};
use super::models::{Constraint, Objective, ProblemParameters, Variable};
use super::value_objects::{OptimizationType, SolutionStatus};

/// Error types for the solver adapter
#[derive(Debug, thiserror::Error)]
pub enum SolverError {
    #[error("Model unsupported by solver: {0}")]
    ModelUnsupported(String),

    #[error("Solver not available: {0}")]
    NotAvailable(String),

    #[error("Solver execution failed: {0}")]
    ExecutionFailed(String),
}

impl SolverError {
    pub fn code(&self) -> &'static str {
        match self {
            SolverError::ModelUnsupported(_) => "MODEL_UNSUPPORTED",
            SolverError::NotAvailable(_) => "SOLVER_NOT_AVAILABLE",
            SolverError::ExecutionFailed(_) => "SOLVER_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, SolverError>;

/// One column as the solver sees it
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedColumn {
    pub lower: f64,
    pub upper: f64,
    pub integer: bool,
}

impl LoadedColumn {
    pub fn from_variable(variable: &Variable) -> Self {
        Self {
            lower: variable.lower_bound,
            upper: variable.upper_bound,
            integer: variable.is_integer(),
        }
    }

    fn placeholder() -> Self {
        Self {
            lower: 0.0,
            upper: 0.0,
            integer: false,
        }
    }
}

/// One row as the solver sees it: `lower <= terms <= upper`
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedRow {
    pub terms: Vec<(usize, f64)>,
    pub quadratic: Vec<(usize, usize, f64)>,
    pub lower: f64,
    pub upper: f64,
}

impl LoadedRow {
    pub fn from_constraint(constraint: &Constraint) -> Self {
        let (lower, upper) = constraint.row_range();
        Self {
            terms: constraint
                .expression
                .terms
                .iter()
                .map(|(id, &coeff)| (id.index(), coeff))
                .collect(),
            // a relaxed row is free, so its quadratic part constrains nothing
            quadratic: if constraint.relaxed {
                Vec::new()
            } else {
                constraint
                    .expression
                    .quadratic
                    .iter()
                    .map(|(&(a, b), &coeff)| (a.index(), b.index(), coeff))
                    .collect()
            },
            lower,
            upper,
        }
    }

    /// A row with no bounds on either side does not restrict anything
    pub fn is_free(&self) -> bool {
        self.lower == f64::NEG_INFINITY && self.upper == f64::INFINITY
    }

    fn placeholder() -> Self {
        Self {
            terms: Vec::new(),
            quadratic: Vec::new(),
            lower: f64::NEG_INFINITY,
            upper: f64::INFINITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedObjective {
    pub sense: OptimizationType,
    pub terms: Vec<(usize, f64)>,
    pub quadratic: Vec<(usize, usize, f64)>,
    pub constant: f64,
}

impl LoadedObjective {
    pub fn from_objective(objective: &Objective) -> Self {
        Self {
            sense: objective.optimization_type,
            terms: objective
                .expression
                .terms
                .iter()
                .map(|(id, &coeff)| (id.index(), coeff))
                .collect(),
            quadratic: objective
                .expression
                .quadratic
                .iter()
                .map(|(&(a, b), &coeff)| (a.index(), b.index(), coeff))
                .collect(),
            constant: objective.expression.constant,
        }
    }

    pub fn evaluate(&self, values: &[f64]) -> f64 {
        let value_of = |i: usize| values.get(i).copied().unwrap_or(0.0);
        let linear: f64 = self.terms.iter().map(|&(i, c)| c * value_of(i)).sum();
        let quadratic: f64 = self
            .quadratic
            .iter()
            .map(|&(a, b, c)| c * value_of(a) * value_of(b))
            .sum();
        self.constant + linear + quadratic
    }
}

impl Default for LoadedObjective {
    fn default() -> Self {
        Self {
            sense: OptimizationType::Maximize,
            terms: Vec::new(),
            quadratic: Vec::new(),
            constant: 0.0,
        }
    }
}

/// The solver-side copy of the model, updated one entity at a time.
///
/// Two adapters that received different load sequences reaching the same
/// logical model compare equal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedModel {
    pub columns: Vec<LoadedColumn>,
    pub rows: Vec<LoadedRow>,
    pub objective: LoadedObjective,
}

impl LoadedModel {
    pub fn set_column(&mut self, index: usize, column: LoadedColumn) {
        if index >= self.columns.len() {
            self.columns.resize_with(index + 1, LoadedColumn::placeholder);
        }
        self.columns[index] = column;
    }

    pub fn set_row(&mut self, index: usize, row: LoadedRow) {
        if index >= self.rows.len() {
            self.rows.resize_with(index + 1, LoadedRow::placeholder);
        }
        self.rows[index] = row;
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn num_integer_columns(&self) -> usize {
        self.columns.iter().filter(|c| c.integer).count()
    }

    pub fn has_quadratic(&self) -> bool {
        !self.objective.quadratic.is_empty() || self.rows.iter().any(|r| !r.quadratic.is_empty())
    }
}

/// Options for a single solve, derived from the model parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolveOptions {
    pub want_integer: bool,
    pub time_limit: Option<f64>,
    pub gap_tolerance: Option<f64>,
    pub verbose: bool,
}

impl SolveOptions {
    pub fn from_parameters(parameters: &ProblemParameters) -> Self {
        Self {
            want_integer: !parameters.relax_integers,
            time_limit: parameters.time_limit,
            gap_tolerance: parameters.gap_tolerance,
            verbose: parameters.verbose,
        }
    }
}

/// Raw result of one solve as reported by a backend
#[derive(Debug, Clone, PartialEq)]
pub struct SolveOutcome {
    pub status: SolutionStatus,
    pub objective_value: f64,
    pub values: Vec<f64>,
}

impl SolveOutcome {
    pub fn without_values(status: SolutionStatus) -> Self {
        Self {
            status,
            objective_value: 0.0,
            values: Vec::new(),
        }
    }
}

/// Capability interface for solver backends
///
/// Loads are incremental: each call replaces one column, one row or the
/// objective in the adapter's copy of the model. `solve` runs the backend on
/// whatever has been loaded so far.
pub trait SolverAdapter: Send {
    /// Get the name of this solver backend
    fn name(&self) -> &str;

    /// Check if this solver supports mixed-integer programming
    fn supports_mip(&self) -> bool;

    /// Check if this solver accepts quadratic terms
    fn supports_quadratic(&self) -> bool {
        false
    }

    /// Solver-side copy of the model
    fn loaded(&self) -> &LoadedModel;

    fn loaded_mut(&mut self) -> &mut LoadedModel;

    /// Run the backend on the loaded model
    fn solve(&mut self, options: &SolveOptions) -> Result<SolveOutcome>;

    /// A fresh, empty handle of the same backend and configuration
    fn spawn(&self) -> Box<dyn SolverAdapter>;

    fn load_variable(&mut self, index: VariableId, variable: &Variable) -> Result<()> {
        self.loaded_mut()
            .set_column(index.index(), LoadedColumn::from_variable(variable));
        Ok(())
    }

    fn load_constraint(&mut self, index: ConstraintId, constraint: &Constraint) -> Result<()> {
        if !constraint.relaxed
            && constraint.expression.is_quadratic()
            && !self.supports_quadratic()
        {
            return Err(SolverError::ModelUnsupported(format!(
                "{} cannot load quadratic terms of constraint {}",
                self.name(),
                index
            )));
        }
        self.loaded_mut()
            .set_row(index.index(), LoadedRow::from_constraint(constraint));
        Ok(())
    }

    fn load_objective(&mut self, objective: &Objective) -> Result<()> {
        if objective.expression.is_quadratic() && !self.supports_quadratic() {
            return Err(SolverError::ModelUnsupported(format!(
                "{} cannot load a quadratic objective",
                self.name()
            )));
        }
        self.loaded_mut().objective = LoadedObjective::from_objective(objective);
        Ok(())
    }

    /// Drop everything loaded so far
    fn reset(&mut self) {
        self.loaded_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::expression::LinearExpression;
    use crate::domain::value_objects::{Relation, VariableKind};

    #[test]
    fn loading_out_of_order_pads_with_placeholders() {
        let mut loaded = LoadedModel::default();
        let var = Variable::continuous(VariableKind::Flux, "v").with_bounds(-1.0, 2.0);
        loaded.set_column(2, LoadedColumn::from_variable(&var));
        assert_eq!(loaded.columns.len(), 3);
        assert_eq!(loaded.columns[2].upper, 2.0);

        let row = Constraint::new(
            LinearExpression::term(VariableId::new(2), 1.0),
            Relation::GreaterThanOrEqual,
            0.5,
        );
        loaded.set_row(1, LoadedRow::from_constraint(&row));
        assert!(loaded.rows[0].is_free());
        assert_eq!(loaded.rows[1].lower, 0.5);
    }

    #[test]
    fn relaxed_quadratic_row_loads_as_free_linear_row() {
        let mut expression = LinearExpression::term(VariableId::new(0), 1.0);
        expression.add_quadratic_term(VariableId::new(0), VariableId::new(1), 2.0);
        let mut constraint = Constraint::new(expression, Relation::LessThanOrEqual, 4.0);
        assert!(!LoadedRow::from_constraint(&constraint).quadratic.is_empty());

        constraint.relaxed = true;
        let row = LoadedRow::from_constraint(&constraint);
        assert!(row.is_free());
        assert!(row.quadratic.is_empty());
        assert_eq!(row.terms, vec![(0, 1.0)]);
    }

    #[test]
    fn options_follow_parameters() {
        let params = ProblemParameters::default().with_relax_integers(true);
        let options = SolveOptions::from_parameters(&params);
        assert!(!options.want_integer);
    }

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(
            SolverError::ModelUnsupported(String::new()).code(),
            "MODEL_UNSUPPORTED"
        );
        assert_eq!(
            SolverError::ExecutionFailed(String::new()).code(),
            "SOLVER_ERROR"
        );
    }
}
