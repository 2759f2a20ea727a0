use crate::domain::{
    models::SolverConfig,
    problem::ProblemModel,
    solver_service::{Result, SolverAdapter, SolverError},
    value_objects::SolverBackend,
};
#[cfg(feature = "coin_cbc")]
use crate::solver::CoinCbcSolver;
#[cfg(feature = "highs")]
use crate::solver::HighsSolver;
#[cfg(feature = "microlp")]
use crate::solver::MicroLpSolver;
use tracing::debug;

/// Factory for creating solver handles based on configuration
pub struct SolverFactory;

impl SolverFactory {
    /// Backends compiled into this build, in `Auto` preference order
    pub fn available() -> Vec<SolverBackend> {
        let mut backends = Vec::new();
        if cfg!(feature = "highs") {
            backends.push(SolverBackend::Highs);
        }
        if cfg!(feature = "coin_cbc") {
            backends.push(SolverBackend::CoinCbc);
        }
        if cfg!(feature = "microlp") {
            backends.push(SolverBackend::MicroLp);
        }
        backends
    }

    /// Map `Auto` to a concrete backend; concrete backends map to themselves
    /// when compiled in.
    pub fn resolve(backend: SolverBackend) -> Result<SolverBackend> {
        let available = Self::available();
        match backend {
            SolverBackend::Auto => available.first().copied().ok_or_else(|| {
                SolverError::NotAvailable("no solver backend was compiled in".to_string())
            }),
            concrete if available.contains(&concrete) => Ok(concrete),
            concrete => Err(SolverError::NotAvailable(format!(
                "{concrete} support was not compiled in"
            ))),
        }
    }

    /// Create an empty solver handle for a backend
    pub fn create(backend: SolverBackend) -> Result<Box<dyn SolverAdapter>> {
        let resolved = Self::resolve(backend)?;
        debug!(
            component = "solver_factory",
            operation = "create",
            status = "success",
            requested = %backend,
            backend = %resolved,
            "Created solver handle"
        );
        match resolved {
            #[cfg(feature = "microlp")]
            SolverBackend::MicroLp => Ok(Box::new(MicroLpSolver::new())),
            #[cfg(feature = "coin_cbc")]
            SolverBackend::CoinCbc => Ok(Box::new(CoinCbcSolver::new())),
            #[cfg(feature = "highs")]
            SolverBackend::Highs => Ok(Box::new(HighsSolver::new())),
            #[allow(unreachable_patterns)]
            other => Err(SolverError::NotAvailable(format!(
                "{other} support was not compiled in"
            ))),
        }
    }

    /// Create a solver handle from a backend name such as `"highs"`
    pub fn from_name(name: &str) -> Result<Box<dyn SolverAdapter>> {
        let backend: SolverBackend = name.parse().map_err(SolverError::NotAvailable)?;
        Self::create(backend)
    }

    /// Create an empty problem model bound to the configured backend
    pub fn create_model(config: &SolverConfig) -> Result<ProblemModel> {
        let adapter = Self::create(config.backend)?;
        Ok(ProblemModel::new(adapter).with_parameters(config.parameters.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_name_is_not_available() {
        let err = SolverFactory::from_name("glpk").err().unwrap();
        assert_eq!(err.code(), "SOLVER_NOT_AVAILABLE");
    }

    #[cfg(feature = "microlp")]
    #[test]
    fn auto_resolves_to_a_compiled_backend() {
        let resolved = SolverFactory::resolve(SolverBackend::Auto).unwrap();
        assert!(SolverFactory::available().contains(&resolved));
        let model = SolverFactory::create_model(&SolverConfig::default()).unwrap();
        assert_eq!(model.num_variables(), 0);
    }

    #[cfg(feature = "microlp")]
    #[test]
    fn creates_microlp_by_name() {
        let adapter = SolverFactory::from_name("microlp").unwrap();
        assert_eq!(adapter.name(), "microlp");
    }

    #[cfg(not(feature = "highs"))]
    #[test]
    fn missing_backend_is_reported() {
        let err = SolverFactory::create(SolverBackend::Highs).err().unwrap();
        assert!(matches!(err, SolverError::NotAvailable(_)));
    }
}
