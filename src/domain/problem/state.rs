use super::ProblemModel;
use crate::domain::error::{ProblemError, Result};
use crate::domain::ids::{ConstraintId, StateHandle, VariableId};
use crate::domain::models::{Constraint, Objective, ProblemParameters, Solution};
use std::collections::BTreeMap;
use std::ops::BitOr;
use std::sync::Arc;
use tracing::debug;

/// Selects which parts of the model a save or restore touches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StateParts {
    pub bounds: bool,
    pub constraints: bool,
    pub objective: bool,
    pub solutions: bool,
    pub parameters: bool,
}

impl StateParts {
    pub const NONE: Self = Self {
        bounds: false,
        constraints: false,
        objective: false,
        solutions: false,
        parameters: false,
    };
    pub const ALL: Self = Self {
        bounds: true,
        constraints: true,
        objective: true,
        solutions: true,
        parameters: true,
    };
    pub const BOUNDS: Self = Self {
        bounds: true,
        ..Self::NONE
    };
    pub const CONSTRAINTS: Self = Self {
        constraints: true,
        ..Self::NONE
    };
    pub const OBJECTIVE: Self = Self {
        objective: true,
        ..Self::NONE
    };
    pub const SOLUTIONS: Self = Self {
        solutions: true,
        ..Self::NONE
    };
    pub const PARAMETERS: Self = Self {
        parameters: true,
        ..Self::NONE
    };
}

impl BitOr for StateParts {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self {
            bounds: self.bounds || rhs.bounds,
            constraints: self.constraints || rhs.constraints,
            objective: self.objective || rhs.objective,
            solutions: self.solutions || rhs.solutions,
            parameters: self.parameters || rhs.parameters,
        }
    }
}

/// A read-only copy of selected parts of a problem model
#[derive(Debug, Clone, PartialEq)]
pub struct ProblemState {
    epoch: u64,
    pub bounds: Option<Vec<(f64, f64)>>,
    pub constraints: Option<Vec<Constraint>>,
    pub objective: Option<Objective>,
    pub solutions: Option<Vec<Solution>>,
    pub parameters: Option<ProblemParameters>,
}

impl ProblemState {
    pub fn parts(&self) -> StateParts {
        StateParts {
            bounds: self.bounds.is_some(),
            constraints: self.constraints.is_some(),
            objective: self.objective.is_some(),
            solutions: self.solutions.is_some(),
            parameters: self.parameters.is_some(),
        }
    }
}

/// Handle-indexed snapshots; entries live until explicitly cleared
#[derive(Debug, Default)]
pub(super) struct StateStore {
    next_handle: u32,
    states: BTreeMap<StateHandle, Arc<ProblemState>>,
}

impl StateStore {
    pub(super) fn len(&self) -> usize {
        self.states.len()
    }
}

impl ProblemModel {
    /// Capture the requested parts of the model; the model is not changed
    pub fn save_state(&mut self, parts: StateParts) -> StateHandle {
        let state = ProblemState {
            epoch: self.epoch,
            bounds: parts.bounds.then(|| {
                self.variables
                    .iter()
                    .map(|v| (v.lower_bound, v.upper_bound))
                    .collect()
            }),
            constraints: parts.constraints.then(|| self.constraints.clone()),
            objective: parts.objective.then(|| self.objective.clone()),
            solutions: parts.solutions.then(|| self.solutions.clone()),
            parameters: parts.parameters.then(|| self.parameters.clone()),
        };
        let handle = StateHandle::new(self.states.next_handle);
        self.states.next_handle += 1;
        self.states.states.insert(handle, Arc::new(state));
        debug!(
            component = "state",
            operation = "save",
            status = "success",
            handle = handle.inner(),
            live_states = self.states.len(),
            "Saved model state"
        );
        handle
    }

    /// Shared read-only view of a saved state
    pub fn state(&self, handle: StateHandle) -> Result<Arc<ProblemState>> {
        self.states
            .states
            .get(&handle)
            .cloned()
            .ok_or(ProblemError::InvalidState(handle))
    }

    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    /// Copy the selected parts of a saved state back into the model.
    ///
    /// Parts not selected are left exactly as they are. Only entities that
    /// actually change are marked for reloading.
    pub fn restore_state(&mut self, handle: StateHandle, parts: StateParts) -> Result<()> {
        let state = self.state(handle)?;
        let captured = state.parts();
        for (wanted, have, part) in [
            (parts.bounds, captured.bounds, "bounds"),
            (parts.constraints, captured.constraints, "constraints"),
            (parts.objective, captured.objective, "objective"),
            (parts.solutions, captured.solutions, "solutions"),
            (parts.parameters, captured.parameters, "parameters"),
        ] {
            if wanted && !have {
                return Err(ProblemError::StatePartMissing { handle, part });
            }
        }
        let touches_ids = parts.bounds || parts.constraints || parts.objective || parts.solutions;
        if touches_ids && state.epoch != self.epoch {
            return Err(ProblemError::StaleState(handle));
        }

        if let (true, Some(bounds)) = (parts.bounds, state.bounds.as_ref()) {
            for (index, &(lower, upper)) in bounds.iter().enumerate().take(self.variables.len()) {
                let variable = &mut self.variables[index];
                if variable.lower_bound != lower || variable.upper_bound != upper {
                    variable.lower_bound = lower;
                    variable.upper_bound = upper;
                    self.mark_variable(VariableId::from_index(index));
                }
            }
        }
        if let (true, Some(saved)) = (parts.constraints, state.constraints.as_ref()) {
            self.restore_constraints(saved);
        }
        if let (true, Some(objective)) = (parts.objective, state.objective.as_ref()) {
            if &self.objective != objective {
                self.objective = objective.clone();
                self.mark_objective();
            }
        }
        if let (true, Some(solutions)) = (parts.solutions, state.solutions.as_ref()) {
            self.solutions = solutions.clone();
        }
        if let (true, Some(parameters)) = (parts.parameters, state.parameters.as_ref()) {
            self.parameters = parameters.clone();
        }
        debug!(
            component = "state",
            operation = "restore",
            status = "success",
            handle = handle.inner(),
            bounds = parts.bounds,
            constraints = parts.constraints,
            objective = parts.objective,
            solutions = parts.solutions,
            parameters = parts.parameters,
            "Restored model state"
        );
        Ok(())
    }

    /// Release a saved state. Clearing an unknown handle is an error.
    pub fn clear_state(&mut self, handle: StateHandle) -> Result<()> {
        self.states
            .states
            .remove(&handle)
            .map(|_| ())
            .ok_or(ProblemError::InvalidState(handle))
    }

    fn restore_constraints(&mut self, saved: &[Constraint]) {
        let current_len = self.constraints.len();
        for (index, constraint) in saved.iter().enumerate() {
            if index >= current_len || self.constraints[index] != *constraint {
                self.mark_constraint(ConstraintId::from_index(index));
            }
        }
        // Rows past the saved length vanish; the sync layer notices the
        // shorter row count and reloads.
        self.constraints = saved.to_vec();
        self.rebuild_constraint_index();
    }
}
