// Solver adapters module

#[cfg(any(feature = "microlp", feature = "coin_cbc", feature = "highs"))]
mod common;
pub mod factory;
#[cfg(any(feature = "microlp", feature = "coin_cbc"))]
mod good_lp_model;

#[cfg(feature = "coin_cbc")]
pub mod coin_cbc_solver;
#[cfg(feature = "highs")]
pub mod highs_solver;
#[cfg(feature = "microlp")]
pub mod microlp_solver;

pub use factory::SolverFactory;

#[cfg(feature = "coin_cbc")]
pub use coin_cbc_solver::CoinCbcSolver;
#[cfg(feature = "highs")]
pub use highs_solver::HighsSolver;
#[cfg(feature = "microlp")]
pub use microlp_solver::MicroLpSolver;
