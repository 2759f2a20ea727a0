use super::ProblemModel;
use crate::domain::error::{ProblemError, Result};
use crate::domain::ids::{ConstraintId, VariableId};
use std::collections::BTreeSet;
use tracing::debug;

/// Bookkeeping of what the solver handle has not seen yet
#[derive(Debug, Clone)]
pub(super) struct SyncState {
    dirty_variables: BTreeSet<VariableId>,
    dirty_constraints: BTreeSet<ConstraintId>,
    objective_dirty: bool,
    full_reload: bool,
    loaded_columns: usize,
    loaded_rows: usize,
}

impl SyncState {
    pub(super) fn new() -> Self {
        Self {
            dirty_variables: BTreeSet::new(),
            dirty_constraints: BTreeSet::new(),
            objective_dirty: true,
            full_reload: true,
            loaded_columns: 0,
            loaded_rows: 0,
        }
    }
}

/// What one synchronization pushed into the solver
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub full: bool,
    pub variables: usize,
    pub constraints: usize,
    pub objective: bool,
}

impl ProblemModel {
    pub(super) fn mark_variable(&mut self, id: VariableId) {
        self.sync.dirty_variables.insert(id);
    }

    pub(super) fn mark_constraint(&mut self, id: ConstraintId) {
        self.sync.dirty_constraints.insert(id);
    }

    pub(super) fn mark_objective(&mut self) {
        self.sync.objective_dirty = true;
    }

    /// Row or column numbering changed; the next sync rebuilds the handle
    pub(super) fn mark_structure_changed(&mut self) {
        self.sync.full_reload = true;
    }

    /// Whether anything is waiting to be loaded
    pub fn needs_sync(&self) -> bool {
        self.sync.full_reload
            || self.sync.objective_dirty
            || !self.sync.dirty_variables.is_empty()
            || !self.sync.dirty_constraints.is_empty()
            || self.constraints.len() != self.sync.loaded_rows
            || self.variables.len() != self.sync.loaded_columns
    }

    /// Push pending changes into the solver handle.
    ///
    /// Only dirty entities are reloaded unless the row or column count
    /// shrank since the last load, in which case the handle is reset and the
    /// whole model is loaded again.
    pub fn synchronize(&mut self) -> Result<SyncReport> {
        if self.sync.full_reload
            || self.constraints.len() < self.sync.loaded_rows
            || self.variables.len() < self.sync.loaded_columns
        {
            return self.reload_all();
        }

        let dirty_variables: Vec<VariableId> = self
            .sync
            .dirty_variables
            .iter()
            .copied()
            .filter(|id| id.index() < self.variables.len())
            .collect();
        let dirty_constraints: Vec<ConstraintId> = self
            .sync
            .dirty_constraints
            .iter()
            .copied()
            .filter(|id| id.index() < self.constraints.len())
            .collect();

        for &id in &dirty_variables {
            self.check_stored_bounds(id)?;
        }
        for &id in &dirty_variables {
            self.adapter.load_variable(id, &self.variables[id.index()])?;
        }
        for &id in &dirty_constraints {
            self.adapter
                .load_constraint(id, &self.constraints[id.index()])?;
        }
        let objective = self.sync.objective_dirty;
        if objective {
            self.adapter.load_objective(&self.objective)?;
        }

        self.sync.dirty_variables.clear();
        self.sync.dirty_constraints.clear();
        self.sync.objective_dirty = false;
        self.sync.loaded_columns = self.variables.len();
        self.sync.loaded_rows = self.constraints.len();

        let report = SyncReport {
            full: false,
            variables: dirty_variables.len(),
            constraints: dirty_constraints.len(),
            objective,
        };
        debug!(
            component = "sync",
            operation = "incremental",
            status = "success",
            variables = report.variables,
            constraints = report.constraints,
            objective = report.objective,
            "Loaded dirty entities"
        );
        Ok(report)
    }

    /// Reset the solver handle and load every variable, constraint and the
    /// objective. Always available as a fallback to incremental loading.
    pub fn reload_all(&mut self) -> Result<SyncReport> {
        for index in 0..self.variables.len() {
            self.check_stored_bounds(VariableId::from_index(index))?;
        }
        self.sync.full_reload = true;
        self.adapter.reset();
        for (index, variable) in self.variables.iter().enumerate() {
            self.adapter
                .load_variable(VariableId::from_index(index), variable)?;
        }
        for (index, constraint) in self.constraints.iter().enumerate() {
            self.adapter
                .load_constraint(ConstraintId::from_index(index), constraint)?;
        }
        self.adapter.load_objective(&self.objective)?;

        self.sync.dirty_variables.clear();
        self.sync.dirty_constraints.clear();
        self.sync.objective_dirty = false;
        self.sync.full_reload = false;
        self.sync.loaded_columns = self.variables.len();
        self.sync.loaded_rows = self.constraints.len();

        debug!(
            component = "sync",
            operation = "full_reload",
            status = "success",
            variables = self.variables.len(),
            constraints = self.constraints.len(),
            "Reloaded whole model"
        );
        Ok(SyncReport {
            full: true,
            variables: self.variables.len(),
            constraints: self.constraints.len(),
            objective: true,
        })
    }

    fn check_stored_bounds(&self, id: VariableId) -> Result<()> {
        let variable = &self.variables[id.index()];
        if variable.has_valid_bounds() {
            Ok(())
        } else {
            Err(ProblemError::InvalidBounds {
                variable: id,
                lower: variable.lower_bound,
                upper: variable.upper_bound,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::RecordingAdapter;
    use super::*;
    use crate::domain::expression::LinearExpression;
    use crate::domain::models::{Constraint, Objective, Variable};
    use crate::domain::value_objects::{Relation, VariableKind};

    fn model() -> ProblemModel {
        ProblemModel::new(Box::new(RecordingAdapter::default()))
    }

    fn flux(name: &str) -> Variable {
        Variable::continuous(VariableKind::Flux, name).with_bounds(0.0, 10.0)
    }

    #[test]
    fn first_sync_is_full_then_incremental() {
        let mut model = model();
        let x = model.add_variable(flux("x")).unwrap();
        let y = model.add_variable(flux("y")).unwrap();
        model
            .add_constraint(Constraint::new(
                LinearExpression::term(x, 1.0).with_term(y, 1.0),
                Relation::LessThanOrEqual,
                5.0,
            ))
            .unwrap();
        let first = model.synchronize().unwrap();
        assert!(first.full);
        assert!(!model.needs_sync());

        model.set_bounds(y, 0.0, 2.0).unwrap();
        let second = model.synchronize().unwrap();
        assert!(!second.full);
        assert_eq!(second.variables, 1);
        assert_eq!(second.constraints, 0);
        assert!(!second.objective);
        assert_eq!(model.solver_state().columns[1].upper, 2.0);
    }

    #[test]
    fn deleting_a_row_forces_full_reload() {
        let mut model = model();
        let x = model.add_variable(flux("x")).unwrap();
        let first = model
            .add_constraint(Constraint::new(
                LinearExpression::term(x, 1.0),
                Relation::LessThanOrEqual,
                5.0,
            ))
            .unwrap();
        model
            .add_constraint(Constraint::new(
                LinearExpression::term(x, 1.0),
                Relation::GreaterThanOrEqual,
                1.0,
            ))
            .unwrap();
        model.synchronize().unwrap();
        model
            .remove_constraint(first, crate::domain::problem::RemovalMode::Delete)
            .unwrap();
        let report = model.synchronize().unwrap();
        assert!(report.full);
        assert_eq!(model.solver_state().rows.len(), 1);
        assert_eq!(model.solver_state().rows[0].lower, 1.0);
    }

    #[test]
    fn invalid_bounds_block_sync() {
        let mut model = model();
        let x = model.add_variable(flux("x")).unwrap();
        model.synchronize().unwrap();
        model.variable_mut(x).unwrap().lower_bound = 20.0;
        let err = model.synchronize().unwrap_err();
        assert_eq!(err.code(), "VARIABLE_INVALID_BOUNDS");
    }

    #[test]
    fn objective_change_reloads_only_objective() {
        let mut model = model();
        let x = model.add_variable(flux("x")).unwrap();
        model.synchronize().unwrap();
        model
            .set_objective(Objective::minimize(LinearExpression::term(x, 2.0)))
            .unwrap();
        let report = model.synchronize().unwrap();
        assert!(report.objective);
        assert_eq!(report.variables, 0);
        assert_eq!(model.solver_state().objective.terms, vec![(0, 2.0)]);
    }
}
