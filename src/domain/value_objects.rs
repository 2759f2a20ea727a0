// Domain value objects representing core modelling concepts

use std::fmt;
use std::str::FromStr;

/// Semantic role of a decision variable in a flux model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VariableKind {
    /// Net reaction flux (may be negative for reversible reactions)
    Flux,
    /// Forward component of a split reversible flux
    ForwardFlux,
    /// Reverse component of a split reversible flux
    ReverseFlux,
    /// Binary indicator that a reaction carries flux
    ReactionUse,
    /// Binary indicator for the forward direction
    ForwardUse,
    /// Binary indicator for the reverse direction
    ReverseUse,
    /// Net exchange of a species with the environment
    DrainFlux,
    /// Outflow component of a split drain
    ForwardDrainFlux,
    /// Uptake component of a split drain
    ReverseDrainFlux,
    /// Binary indicator that a drain is active
    DrainUse,
    /// Species concentration
    Concentration,
    /// Logarithm of a species concentration
    LogConcentration,
    /// Reaction Gibbs free energy
    GibbsEnergy,
    /// Slack on a soft constraint
    Slack,
    /// Anything else
    Other,
}

impl VariableKind {
    /// Whether variables of this kind are binary use indicators
    pub fn is_use_indicator(self) -> bool {
        matches!(
            self,
            VariableKind::ReactionUse
                | VariableKind::ForwardUse
                | VariableKind::ReverseUse
                | VariableKind::DrainUse
        )
    }

    /// Whether variables of this kind exchange mass with the environment
    pub fn is_drain(self) -> bool {
        matches!(
            self,
            VariableKind::DrainFlux | VariableKind::ForwardDrainFlux | VariableKind::ReverseDrainFlux
        )
    }

    /// Short prefix used when a variable has no explicit name
    pub fn prefix(self) -> &'static str {
        match self {
            VariableKind::Flux => "F",
            VariableKind::ForwardFlux => "FF",
            VariableKind::ReverseFlux => "RF",
            VariableKind::ReactionUse => "U",
            VariableKind::ForwardUse => "FU",
            VariableKind::ReverseUse => "RU",
            VariableKind::DrainFlux => "D",
            VariableKind::ForwardDrainFlux => "FD",
            VariableKind::ReverseDrainFlux => "RD",
            VariableKind::DrainUse => "DU",
            VariableKind::Concentration => "C",
            VariableKind::LogConcentration => "LC",
            VariableKind::GibbsEnergy => "DG",
            VariableKind::Slack => "S",
            VariableKind::Other => "X",
        }
    }
}

/// Domain of values a variable may take in the solver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableDomain {
    /// Continuous real number (x ∈ ℝ)
    Continuous,
    /// Integer number (x ∈ ℤ)
    Integer,
    /// Binary variable (x ∈ {0, 1})
    Binary,
}

/// Relational operator of a constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// Less than or equal (≤)
    LessThanOrEqual,
    /// Equal (=)
    Equal,
    /// Greater than or equal (≥)
    GreaterThanOrEqual,
}

impl Relation {
    /// Row range `[lower, upper]` for a right-hand side
    pub fn row_range(self, rhs: f64) -> (f64, f64) {
        match self {
            Relation::LessThanOrEqual => (f64::NEG_INFINITY, rhs),
            Relation::Equal => (rhs, rhs),
            Relation::GreaterThanOrEqual => (rhs, f64::INFINITY),
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Relation::LessThanOrEqual => "<=",
            Relation::Equal => "=",
            Relation::GreaterThanOrEqual => ">=",
        }
    }
}

/// Direction of optimization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizationType {
    /// Minimize the objective function
    Minimize,
    /// Maximize the objective function
    Maximize,
}

impl OptimizationType {
    /// `true` when `candidate` is at least as good as `reference` within `slack`
    pub fn accepts(self, candidate: f64, reference: f64, slack: f64) -> bool {
        match self {
            OptimizationType::Maximize => candidate >= reference - slack,
            OptimizationType::Minimize => candidate <= reference + slack,
        }
    }
}

/// Status of one solve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolutionStatus {
    /// Found optimal solution
    Optimal,
    /// Found feasible solution (may not be optimal, e.g. time limit)
    Feasible,
    /// Problem has no feasible solution
    Infeasible,
    /// Objective can be improved infinitely
    Unbounded,
}

impl fmt::Display for SolutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolutionStatus::Optimal => write!(f, "Optimal"),
            SolutionStatus::Feasible => write!(f, "Feasible"),
            SolutionStatus::Infeasible => write!(f, "Infeasible"),
            SolutionStatus::Unbounded => write!(f, "Unbounded"),
        }
    }
}

/// Structural class of the current model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemType {
    Lp,
    Milp,
    Qp,
    Miqp,
}

impl fmt::Display for ProblemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProblemType::Lp => write!(f, "LP"),
            ProblemType::Milp => write!(f, "MILP"),
            ProblemType::Qp => write!(f, "QP"),
            ProblemType::Miqp => write!(f, "MIQP"),
        }
    }
}

/// Solver backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolverBackend {
    /// Pick the best backend compiled into this build
    #[default]
    Auto,
    /// Pure Rust simplex / branch-and-bound (through good_lp)
    MicroLp,
    /// COIN-OR CBC (through good_lp)
    CoinCbc,
    /// HiGHS
    Highs,
}

impl fmt::Display for SolverBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverBackend::Auto => write!(f, "Auto"),
            SolverBackend::MicroLp => write!(f, "microlp"),
            SolverBackend::CoinCbc => write!(f, "COIN-OR CBC"),
            SolverBackend::Highs => write!(f, "HiGHS"),
        }
    }
}

impl FromStr for SolverBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(SolverBackend::Auto),
            "microlp" | "minilp" => Ok(SolverBackend::MicroLp),
            "cbc" | "coin_cbc" | "coin-or cbc" => Ok(SolverBackend::CoinCbc),
            "highs" => Ok(SolverBackend::Highs),
            other => Err(format!("unknown solver '{other}'")),
        }
    }
}

/// What kind of biological entity a variable stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Reaction,
    Species,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_parses_common_names() {
        assert_eq!("CBC".parse::<SolverBackend>(), Ok(SolverBackend::CoinCbc));
        assert_eq!("highs".parse::<SolverBackend>(), Ok(SolverBackend::Highs));
        assert_eq!("".parse::<SolverBackend>(), Ok(SolverBackend::Auto));
        assert!("glpk".parse::<SolverBackend>().is_err());
    }

    #[test]
    fn relation_row_range() {
        assert_eq!(Relation::Equal.row_range(2.0), (2.0, 2.0));
        assert_eq!(
            Relation::LessThanOrEqual.row_range(1.0),
            (f64::NEG_INFINITY, 1.0)
        );
    }

    #[test]
    fn acceptance_respects_direction() {
        assert!(OptimizationType::Maximize.accepts(9.5, 10.0, 0.5));
        assert!(!OptimizationType::Maximize.accepts(9.0, 10.0, 0.5));
        assert!(OptimizationType::Minimize.accepts(10.4, 10.0, 0.5));
        assert!(!OptimizationType::Minimize.accepts(11.0, 10.0, 0.5));
    }

    #[test]
    fn use_indicator_kinds() {
        assert!(VariableKind::ReactionUse.is_use_indicator());
        assert!(!VariableKind::Flux.is_use_indicator());
        assert!(VariableKind::ReverseDrainFlux.is_drain());
    }
}
