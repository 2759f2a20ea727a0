// Application layer: search procedures driving a problem model through
// many solves

pub mod alternatives;
pub mod cancellation;
pub mod gap_filling;
pub mod tight_bounds;

pub use alternatives::{enumerate_alternatives, EnumerationConfig, EnumerationReport};
pub use cancellation::Cancellation;
pub use gap_filling::{gap_fill, GapFillCandidate, GapFillConfig, GapFillReport, GapFillSolution};
pub use tight_bounds::{
    tight_bounds, BoundSource, InfeasiblePolicy, TightBound, TightBoundConfig, TightBoundReport,
};
