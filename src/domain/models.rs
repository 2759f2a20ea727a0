use super::expression::LinearExpression;
use super::value_objects::{
    EntityKind, OptimizationType, Relation, SolutionStatus, SolverBackend, VariableDomain,
    VariableKind,
};

/// Non-owning reference to the biological entity a variable represents
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: String,
}

impl EntityRef {
    pub fn reaction(id: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Reaction,
            id: id.into(),
        }
    }

    pub fn species(id: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Species,
            id: id.into(),
        }
    }
}

/// Decision variable in the problem model
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub kind: VariableKind,
    pub domain: VariableDomain,
    pub lower_bound: f64,
    pub upper_bound: f64,
    /// Value from the most recent solve that produced one
    pub value: f64,
    pub name: String,
    pub entity: Option<EntityRef>,
}

impl Variable {
    pub fn continuous(kind: VariableKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            domain: VariableDomain::Continuous,
            lower_bound: 0.0,
            upper_bound: f64::INFINITY,
            value: 0.0,
            name: name.into(),
            entity: None,
        }
    }

    pub fn integer(kind: VariableKind, name: impl Into<String>) -> Self {
        Self {
            domain: VariableDomain::Integer,
            ..Self::continuous(kind, name)
        }
    }

    pub fn binary(kind: VariableKind, name: impl Into<String>) -> Self {
        Self {
            domain: VariableDomain::Binary,
            upper_bound: 1.0,
            ..Self::continuous(kind, name)
        }
    }

    pub fn with_bounds(mut self, lower: f64, upper: f64) -> Self {
        self.lower_bound = lower;
        self.upper_bound = upper;
        self
    }

    pub fn with_entity(mut self, entity: EntityRef) -> Self {
        self.entity = Some(entity);
        self
    }

    pub fn is_integer(&self) -> bool {
        matches!(self.domain, VariableDomain::Integer | VariableDomain::Binary)
    }

    /// Whether the bounds are ordered and fit the domain
    pub fn has_valid_bounds(&self) -> bool {
        if self.lower_bound.is_nan() || self.upper_bound.is_nan() {
            return false;
        }
        if self.lower_bound > self.upper_bound {
            return false;
        }
        match self.domain {
            VariableDomain::Binary => self.lower_bound >= 0.0 && self.upper_bound <= 1.0,
            _ => true,
        }
    }
}

/// Linear constraint `expression REL rhs`
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub name: String,
    pub expression: LinearExpression,
    pub relation: Relation,
    pub rhs: f64,
    /// A relaxed constraint stays in the model but is not enforced
    pub relaxed: bool,
}

impl Constraint {
    pub fn new(expression: LinearExpression, relation: Relation, rhs: f64) -> Self {
        Self {
            name: String::new(),
            expression,
            relation,
            rhs,
            relaxed: false,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Row range enforced by the solver, `(-inf, inf)` when relaxed
    pub fn row_range(&self) -> (f64, f64) {
        if self.relaxed {
            return (f64::NEG_INFINITY, f64::INFINITY);
        }
        self.relation.row_range(self.rhs - self.expression.constant)
    }

    /// Whether `values` satisfy this constraint within `tolerance`
    pub fn is_satisfied(&self, values: &[f64], tolerance: f64) -> bool {
        if self.relaxed {
            return true;
        }
        let lhs = self.expression.evaluate(values);
        match self.relation {
            Relation::LessThanOrEqual => lhs <= self.rhs + tolerance,
            Relation::Equal => (lhs - self.rhs).abs() <= tolerance,
            Relation::GreaterThanOrEqual => lhs >= self.rhs - tolerance,
        }
    }
}

/// Objective function to minimize or maximize
#[derive(Debug, Clone, PartialEq)]
pub struct Objective {
    pub optimization_type: OptimizationType,
    pub expression: LinearExpression,
}

impl Objective {
    pub fn new(optimization_type: OptimizationType, expression: LinearExpression) -> Self {
        Self {
            optimization_type,
            expression,
        }
    }

    pub fn maximize(expression: LinearExpression) -> Self {
        Self::new(OptimizationType::Maximize, expression)
    }

    pub fn minimize(expression: LinearExpression) -> Self {
        Self::new(OptimizationType::Minimize, expression)
    }
}

impl Default for Objective {
    fn default() -> Self {
        Self::maximize(LinearExpression::new())
    }
}

/// Configuration for the solver backend, fixed when the model is created
#[derive(Debug, Clone, Default)]
pub struct SolverConfig {
    pub backend: SolverBackend,
    pub parameters: ProblemParameters,
}

impl SolverConfig {
    pub fn new(backend: SolverBackend) -> Self {
        Self {
            backend,
            parameters: ProblemParameters::default(),
        }
    }

    pub fn with_parameters(mut self, parameters: ProblemParameters) -> Self {
        self.parameters = parameters;
        self
    }
}

/// Per-model solve parameters; part of what a state snapshot can capture
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProblemParameters {
    /// Solve the continuous relaxation even when integer variables exist
    pub relax_integers: bool,
    pub time_limit: Option<f64>,
    pub gap_tolerance: Option<f64>,
    pub verbose: bool,
}

impl ProblemParameters {
    pub fn with_relax_integers(mut self, relax: bool) -> Self {
        self.relax_integers = relax;
        self
    }

    pub fn with_time_limit(mut self, seconds: f64) -> Self {
        self.time_limit = Some(seconds);
        self
    }

    pub fn with_gap_tolerance(mut self, gap: f64) -> Self {
        self.gap_tolerance = Some(gap);
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Statistics about the solve process
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolverStatistics {
    pub solve_time_ms: f64,
    pub num_variables: u32,
    pub num_constraints: u32,
    pub num_integer_vars: u32,
    /// Entities reloaded into the solver before this solve
    pub reloaded_variables: u32,
    pub reloaded_constraints: u32,
    pub full_reload: bool,
}

/// Immutable record of one solve
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub status: SolutionStatus,
    pub objective_value: Option<f64>,
    /// Values indexed by variable id at the time of the solve
    pub variable_values: Vec<f64>,
    /// Free-text provenance
    pub note: String,
    pub statistics: SolverStatistics,
}

impl Solution {
    pub fn new(status: SolutionStatus, note: impl Into<String>) -> Self {
        Self {
            status,
            objective_value: None,
            variable_values: Vec::new(),
            note: note.into(),
            statistics: SolverStatistics::default(),
        }
    }

    pub fn optimal(value: f64, variable_values: Vec<f64>) -> Self {
        Self {
            status: SolutionStatus::Optimal,
            objective_value: Some(value),
            variable_values,
            note: String::new(),
            statistics: SolverStatistics::default(),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    pub fn with_statistics(mut self, statistics: SolverStatistics) -> Self {
        self.statistics = statistics;
        self
    }

    pub fn is_optimal(&self) -> bool {
        self.status == SolutionStatus::Optimal
    }

    pub fn is_feasible(&self) -> bool {
        matches!(
            self.status,
            SolutionStatus::Optimal | SolutionStatus::Feasible
        )
    }

    pub fn value(&self, index: usize) -> Option<f64> {
        self.variable_values.get(index).copied()
    }
}
