// microlp adapter: pure Rust simplex and branch-and-bound through good_lp.
// No native libraries needed, which makes it the default backend for tests.

use super::{common, good_lp_model};
use crate::domain::solver_service::{LoadedModel, Result, SolveOptions, SolveOutcome, SolverAdapter};
use good_lp::solvers::microlp::microlp;

#[derive(Debug, Default)]
pub struct MicroLpSolver {
    loaded: LoadedModel,
}

impl MicroLpSolver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SolverAdapter for MicroLpSolver {
    fn name(&self) -> &str {
        "microlp"
    }

    fn supports_mip(&self) -> bool {
        true
    }

    fn loaded(&self) -> &LoadedModel {
        &self.loaded
    }

    fn loaded_mut(&mut self) -> &mut LoadedModel {
        &mut self.loaded
    }

    fn solve(&mut self, options: &SolveOptions) -> Result<SolveOutcome> {
        common::ensure_linear(&self.loaded, self.name())?;
        // microlp has no time limit or gap options
        good_lp_model::solve_with(&self.loaded, options, microlp, |_| {})
    }

    fn spawn(&self) -> Box<dyn SolverAdapter> {
        Box::new(Self::new())
    }
}
