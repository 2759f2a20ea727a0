// Domain module: problem model, identifiers, errors and the solver contract

pub mod error;
pub mod expression;
pub mod ids;
pub mod models;
pub mod problem;
pub mod solver_service;
pub mod value_objects;

pub use error::{ProblemError, Reference};
pub use expression::LinearExpression;
pub use ids::{ConstraintId, StateHandle, VariableId};
pub use models::*;
pub use problem::{
    BoundEntry, BoundsRecord, MediaRecord, ProblemModel, ProblemState, RemovalMode, StateParts,
    SumOptions, SyncReport, DEFAULT_BIG_M,
};
pub use solver_service::{
    LoadedColumn, LoadedModel, LoadedObjective, LoadedRow, SolveOptions, SolveOutcome,
    SolverAdapter, SolverError,
};
pub use value_objects::*;
