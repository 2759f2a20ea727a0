use super::ids::{ConstraintId, StateHandle, VariableId};
use super::solver_service::SolverError;
use std::fmt;

/// An entity the caller referred to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    Variable(VariableId),
    Constraint(ConstraintId),
    Solution(usize),
    Subset(String),
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Variable(id) => write!(f, "variable {id}"),
            Reference::Constraint(id) => write!(f, "constraint {id}"),
            Reference::Solution(index) => write!(f, "solution {index}"),
            Reference::Subset(name) => write!(f, "subset '{name}'"),
        }
    }
}

/// Errors raised by the problem model and the search procedures.
///
/// Infeasible and unbounded solves are not errors; they are reported in the
/// status of the solution record.
#[derive(Debug, thiserror::Error)]
pub enum ProblemError {
    #[error("{0} is not owned by this model")]
    InvalidReference(Reference),

    #[error("variable {variable} bounds invalid: lower ({lower}) > upper ({upper}) or outside its domain")]
    InvalidBounds {
        variable: VariableId,
        lower: f64,
        upper: f64,
    },

    #[error("state handle {0} was never saved or was already cleared")]
    InvalidState(StateHandle),

    #[error("state handle {0} predates a structural change and cannot be restored")]
    StaleState(StateHandle),

    #[error("state handle {handle} did not capture {part}")]
    StatePartMissing {
        handle: StateHandle,
        part: &'static str,
    },

    #[error(transparent)]
    Solver(#[from] SolverError),
}

impl ProblemError {
    /// Returns a semantic error code for programmatic handling.
    pub fn code(&self) -> &'static str {
        match self {
            ProblemError::InvalidReference(_) => "INVALID_REFERENCE",
            ProblemError::InvalidBounds { .. } => "VARIABLE_INVALID_BOUNDS",
            ProblemError::InvalidState(_) => "STATE_INVALID_HANDLE",
            ProblemError::StaleState(_) => "STATE_STALE_HANDLE",
            ProblemError::StatePartMissing { .. } => "STATE_PART_MISSING",
            ProblemError::Solver(err) => err.code(),
        }
    }

    pub fn is_model_unsupported(&self) -> bool {
        matches!(self, ProblemError::Solver(SolverError::ModelUnsupported(_)))
    }
}

pub type Result<T> = std::result::Result<T, ProblemError>;
