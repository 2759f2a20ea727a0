//! The problem model: variables, constraints and objective of one flux
//! analysis, kept in step with a solver handle.
//!
//! - [`builder`]: adding, removing and mutating entities
//! - [`sync`]: incremental, dirty-flag driven loading into the solver
//! - [`state`]: save / restore / clear of partial model state
//! - [`records`]: applying bounds and media records
//! - [`lp_format`]: LP text export

mod builder;
mod lp_format;
mod records;
mod state;
mod sync;

use crate::domain::error::{ProblemError, Reference, Result};
use crate::domain::ids::{ConstraintId, VariableId};
use crate::domain::models::{Constraint, Objective, ProblemParameters, Solution, Variable};
use crate::domain::solver_service::{LoadedModel, SolveOptions, SolverAdapter, SolverError};
use crate::domain::value_objects::{OptimizationType, ProblemType, SolutionStatus};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::RangeBounds;
use std::time::Instant;
use tracing::{debug, warn};

pub use builder::{RemovalMode, SumOptions, DEFAULT_BIG_M};
pub use records::{BoundEntry, BoundsRecord, MediaRecord};
pub use state::{ProblemState, StateParts};
pub use sync::SyncReport;

use state::StateStore;
use sync::SyncState;

/// An optimization problem bound to one solver handle.
pub struct ProblemModel {
    name: String,
    variables: Vec<Variable>,
    constraints: Vec<Constraint>,
    constraint_index: BTreeMap<String, ConstraintId>,
    objective: Objective,
    parameters: ProblemParameters,
    solutions: Vec<Solution>,
    subsets: BTreeMap<String, BTreeSet<VariableId>>,
    states: StateStore,
    sync: SyncState,
    /// Bumped whenever variable ids are renumbered
    epoch: u64,
    adapter: Box<dyn SolverAdapter>,
}

impl ProblemModel {
    pub fn new(adapter: Box<dyn SolverAdapter>) -> Self {
        Self {
            name: String::new(),
            variables: Vec::new(),
            constraints: Vec::new(),
            constraint_index: BTreeMap::new(),
            objective: Objective::default(),
            parameters: ProblemParameters::default(),
            solutions: Vec::new(),
            subsets: BTreeMap::new(),
            states: StateStore::default(),
            sync: SyncState::new(),
            epoch: 0,
            adapter,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_parameters(mut self, parameters: ProblemParameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// Independent copy of the logical model on a fresh handle of the same
    /// backend. Solution history and saved states are not copied.
    pub fn fork(&self) -> Self {
        Self {
            name: self.name.clone(),
            variables: self.variables.clone(),
            constraints: self.constraints.clone(),
            constraint_index: self.constraint_index.clone(),
            objective: self.objective.clone(),
            parameters: self.parameters.clone(),
            solutions: Vec::new(),
            subsets: self.subsets.clone(),
            states: StateStore::default(),
            sync: SyncState::new(),
            epoch: self.epoch,
            adapter: self.adapter.spawn(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn solver_name(&self) -> &str {
        self.adapter.name()
    }

    /// Solver-side copy of the model as last loaded
    pub fn solver_state(&self) -> &LoadedModel {
        self.adapter.loaded()
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn num_solutions(&self) -> usize {
        self.solutions.len()
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn solutions(&self) -> &[Solution] {
        &self.solutions
    }

    pub fn variable_ids(&self) -> impl Iterator<Item = VariableId> {
        (0..self.variables.len()).map(VariableId::from_index)
    }

    pub fn variable(&self, id: VariableId) -> Result<&Variable> {
        self.variables
            .get(id.index())
            .ok_or(ProblemError::InvalidReference(Reference::Variable(id)))
    }

    pub fn constraint(&self, id: ConstraintId) -> Result<&Constraint> {
        self.constraints
            .get(id.index())
            .ok_or(ProblemError::InvalidReference(Reference::Constraint(id)))
    }

    pub fn solution(&self, index: usize) -> Result<&Solution> {
        self.solutions
            .get(index)
            .ok_or(ProblemError::InvalidReference(Reference::Solution(index)))
    }

    pub fn constraint_by_name(&self, name: &str) -> Option<ConstraintId> {
        self.constraint_index.get(name).copied()
    }

    pub fn variable_by_name(&self, name: &str) -> Option<VariableId> {
        self.variables
            .iter()
            .position(|v| v.name == name)
            .map(VariableId::from_index)
    }

    pub fn objective(&self) -> &Objective {
        &self.objective
    }

    pub fn is_max(&self) -> bool {
        self.objective.optimization_type == OptimizationType::Maximize
    }

    pub fn parameters(&self) -> &ProblemParameters {
        &self.parameters
    }

    pub fn set_parameters(&mut self, parameters: ProblemParameters) {
        self.parameters = parameters;
    }

    pub fn subset(&self, name: &str) -> Result<&BTreeSet<VariableId>> {
        self.subsets
            .get(name)
            .ok_or_else(|| ProblemError::InvalidReference(Reference::Subset(name.to_string())))
    }

    /// Structural class of the model as it stands
    pub fn problem_type(&self) -> ProblemType {
        let integer = !self.parameters.relax_integers && self.variables.iter().any(|v| v.is_integer());
        let quadratic = self.objective.expression.is_quadratic()
            || self
                .constraints
                .iter()
                .any(|c| !c.relaxed && c.expression.is_quadratic());
        match (integer, quadratic) {
            (false, false) => ProblemType::Lp,
            (true, false) => ProblemType::Milp,
            (false, true) => ProblemType::Qp,
            (true, true) => ProblemType::Miqp,
        }
    }

    /// Synchronize and solve without touching the solution history.
    ///
    /// On a solver error the logical model is left as it was.
    pub fn solve(&mut self, note: impl Into<String>) -> Result<Solution> {
        let note = note.into();
        let report = self.synchronize()?;
        let options = SolveOptions::from_parameters(&self.parameters);
        self.check_integer_support(&options)?;
        let started = Instant::now();
        let outcome = match self.adapter.solve(&options) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(
                    component = "problem",
                    operation = "solve",
                    status = "error",
                    solver = self.adapter.name(),
                    error = %err,
                    "Solver failed"
                );
                return Err(err.into());
            }
        };
        let solve_time_ms = started.elapsed().as_secs_f64() * 1000.0;

        let mut solution = match outcome.status {
            SolutionStatus::Optimal | SolutionStatus::Feasible => {
                let mut values = outcome.values;
                values.resize(self.variables.len(), 0.0);
                for (variable, &value) in self.variables.iter_mut().zip(values.iter()) {
                    variable.value = value;
                }
                let mut solution = Solution::optimal(outcome.objective_value, values);
                solution.status = outcome.status;
                solution
            }
            status => Solution::new(status, String::new()),
        };
        solution.note = note;
        solution.statistics.solve_time_ms = solve_time_ms;
        solution.statistics.num_variables = self.variables.len() as u32;
        solution.statistics.num_constraints = self.constraints.len() as u32;
        solution.statistics.num_integer_vars =
            self.variables.iter().filter(|v| v.is_integer()).count() as u32;
        solution.statistics.reloaded_variables = report.variables as u32;
        solution.statistics.reloaded_constraints = report.constraints as u32;
        solution.statistics.full_reload = report.full;

        debug!(
            component = "problem",
            operation = "solve",
            status = %solution.status,
            objective = solution.objective_value.unwrap_or(f64::NAN),
            duration_ms = solve_time_ms,
            note = %solution.note,
            "Solved model"
        );
        Ok(solution)
    }

    /// An LP-only backend must not silently solve the relaxation of a MILP
    fn check_integer_support(&self, options: &SolveOptions) -> Result<()> {
        if !options.want_integer || self.adapter.supports_mip() {
            return Ok(());
        }
        let integer_columns = self.adapter.loaded().num_integer_columns();
        if integer_columns == 0 {
            return Ok(());
        }
        warn!(
            component = "problem",
            operation = "solve",
            status = "unsupported",
            solver = self.adapter.name(),
            integer_columns,
            "Integer columns on an LP-only backend"
        );
        Err(SolverError::ModelUnsupported(format!(
            "{} cannot solve {integer_columns} integer columns; set relax_integers to solve the relaxation",
            self.adapter.name()
        ))
        .into())
    }

    /// Solve and append the result to the solution history
    pub fn run_solver(&mut self, note: impl Into<String>) -> Result<Solution> {
        let solution = self.solve(note)?;
        self.solutions.push(solution.clone());
        Ok(solution)
    }

    /// Append an externally produced solution; returns its index
    pub fn record_solution(&mut self, solution: Solution) -> usize {
        self.solutions.push(solution);
        self.solutions.len() - 1
    }

    /// Remove a range of solutions from the history
    pub fn clear_solutions(&mut self, range: impl RangeBounds<usize>) {
        let len = self.solutions.len();
        let start = match range.start_bound() {
            std::ops::Bound::Included(&s) => s,
            std::ops::Bound::Excluded(&s) => s + 1,
            std::ops::Bound::Unbounded => 0,
        }
        .min(len);
        let end = match range.end_bound() {
            std::ops::Bound::Included(&e) => e + 1,
            std::ops::Bound::Excluded(&e) => e,
            std::ops::Bound::Unbounded => len,
        }
        .clamp(start, len);
        self.solutions.drain(start..end);
    }

    pub(crate) fn ensure_variable(&self, id: VariableId) -> Result<()> {
        if id.index() < self.variables.len() {
            Ok(())
        } else {
            Err(ProblemError::InvalidReference(Reference::Variable(id)))
        }
    }

    pub(crate) fn ensure_constraint(&self, id: ConstraintId) -> Result<()> {
        if id.index() < self.constraints.len() {
            Ok(())
        } else {
            Err(ProblemError::InvalidReference(Reference::Constraint(id)))
        }
    }
}

impl std::fmt::Debug for ProblemModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProblemModel")
            .field("name", &self.name)
            .field("solver", &self.adapter.name())
            .field("variables", &self.variables.len())
            .field("constraints", &self.constraints.len())
            .field("solutions", &self.solutions.len())
            .field("states", &self.states.len())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::domain::solver_service::{
        LoadedModel, Result, SolveOptions, SolveOutcome, SolverAdapter,
    };
    use crate::domain::value_objects::SolutionStatus;

    /// Adapter that records loads and reports a fixed outcome
    #[derive(Default)]
    pub struct RecordingAdapter {
        pub loaded: LoadedModel,
        pub outcome: Option<SolveOutcome>,
        pub lp_only: bool,
    }

    impl SolverAdapter for RecordingAdapter {
        fn name(&self) -> &str {
            "recording"
        }

        fn supports_mip(&self) -> bool {
            !self.lp_only
        }

        fn loaded(&self) -> &LoadedModel {
            &self.loaded
        }

        fn loaded_mut(&mut self) -> &mut LoadedModel {
            &mut self.loaded
        }

        fn solve(&mut self, _options: &SolveOptions) -> Result<SolveOutcome> {
            Ok(self.outcome.clone().unwrap_or(SolveOutcome {
                status: SolutionStatus::Optimal,
                objective_value: 0.0,
                values: vec![0.0; self.loaded.columns.len()],
            }))
        }

        fn spawn(&self) -> Box<dyn SolverAdapter> {
            Box::new(RecordingAdapter {
                loaded: LoadedModel::default(),
                outcome: self.outcome.clone(),
                lp_only: self.lp_only,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::RecordingAdapter;
    use super::*;
    use crate::domain::expression::LinearExpression;
    use crate::domain::value_objects::{Relation, VariableKind};

    fn model() -> ProblemModel {
        ProblemModel::new(Box::new(RecordingAdapter::default()))
    }

    #[test]
    fn new_model_is_empty() {
        let model = model();
        assert_eq!(model.num_variables(), 0);
        assert_eq!(model.num_constraints(), 0);
        assert_eq!(model.problem_type(), ProblemType::Lp);
    }

    #[test]
    fn problem_type_tracks_integers_and_relaxation() {
        let mut model = model();
        model
            .add_variable(Variable::binary(VariableKind::ReactionUse, "u"))
            .unwrap();
        assert_eq!(model.problem_type(), ProblemType::Milp);
        model.set_parameters(ProblemParameters::default().with_relax_integers(true));
        assert_eq!(model.problem_type(), ProblemType::Lp);
    }

    #[test]
    fn run_solver_records_and_sets_values() {
        let mut model = model();
        let x = model
            .add_variable(Variable::continuous(VariableKind::Flux, "x"))
            .unwrap();
        let solution = model.run_solver("first").unwrap();
        assert!(solution.is_optimal());
        assert_eq!(model.num_solutions(), 1);
        assert_eq!(model.solution(0).unwrap().note, "first");
        assert_eq!(model.variable(x).unwrap().value, 0.0);
        assert!(model.solution(1).is_err());
    }

    #[test]
    fn clear_solutions_range() {
        let mut model = model();
        for i in 0..4 {
            model.record_solution(Solution::optimal(i as f64, vec![]));
        }
        model.clear_solutions(1..3);
        let values: Vec<_> = model
            .solutions()
            .iter()
            .map(|s| s.objective_value.unwrap())
            .collect();
        assert_eq!(values, vec![0.0, 3.0]);
        model.clear_solutions(..);
        assert_eq!(model.num_solutions(), 0);
    }

    #[test]
    fn lp_only_backend_rejects_integer_columns() {
        let mut model = ProblemModel::new(Box::new(RecordingAdapter {
            lp_only: true,
            ..RecordingAdapter::default()
        }));
        model
            .add_variable(Variable::binary(VariableKind::ReactionUse, "u"))
            .unwrap();
        let err = model.solve("integer").unwrap_err();
        assert!(err.is_model_unsupported(), "{}", err);
        assert_eq!(model.num_solutions(), 0);

        // the relaxation is an explicit choice
        model.set_parameters(ProblemParameters::default().with_relax_integers(true));
        assert!(model.solve("relaxed").unwrap().is_optimal());
    }

    #[test]
    fn lp_only_backend_accepts_continuous_models() {
        let mut model = ProblemModel::new(Box::new(RecordingAdapter {
            lp_only: true,
            ..RecordingAdapter::default()
        }));
        model
            .add_variable(Variable::continuous(VariableKind::Flux, "v"))
            .unwrap();
        assert!(model.solve("continuous").unwrap().is_optimal());
    }

    #[test]
    fn fork_copies_structure_not_history() {
        let mut model = model();
        let x = model
            .add_variable(Variable::continuous(VariableKind::Flux, "x"))
            .unwrap();
        model
            .add_constraint(
                Constraint::new(LinearExpression::term(x, 1.0), Relation::LessThanOrEqual, 3.0)
                    .with_name("cap"),
            )
            .unwrap();
        model.run_solver("base").unwrap();
        let fork = model.fork();
        assert_eq!(fork.num_variables(), 1);
        assert_eq!(fork.constraint_by_name("cap"), Some(ConstraintId::new(0)));
        assert_eq!(fork.num_solutions(), 0);
        assert!(fork.solver_state().columns.is_empty());
    }
}
