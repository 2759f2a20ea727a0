// Domain layer: problem model, synchronization, state snapshots
pub mod domain;

// Application layer: alternative enumeration, tight bounds, gap-filling
pub mod application;

// Solver adapters: concrete implementations of SolverAdapter
pub mod solver;

// Re-export commonly used types
pub use domain::{
    BoundsRecord, Constraint, ConstraintId, EntityRef, LinearExpression, MediaRecord, Objective,
    OptimizationType, ProblemError, ProblemModel, ProblemParameters, ProblemState, ProblemType,
    Relation, RemovalMode, Solution, SolutionStatus, SolverAdapter, SolverBackend, SolverConfig,
    SolverError, StateHandle, StateParts, SumOptions, SyncReport, Variable, VariableDomain,
    VariableId, VariableKind,
};

pub use application::{
    enumerate_alternatives, gap_fill, tight_bounds, BoundSource, Cancellation, EnumerationConfig,
    EnumerationReport, GapFillCandidate, GapFillConfig, GapFillReport, GapFillSolution,
    InfeasiblePolicy, TightBound, TightBoundConfig, TightBoundReport,
};

pub use solver::SolverFactory;
