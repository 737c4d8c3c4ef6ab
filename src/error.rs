use thiserror::Error;

use crate::monitor::SweepRecord;

/// Invalid configuration, detected before any sampling begins.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("concentration parameter must be strictly positive and finite, got {alpha}")]
    NonPositiveAlpha { alpha: f64 },
    #[error("at least one observation is required")]
    EmptyData,
    #[error("maximum number of sweeps must be at least one")]
    ZeroSweeps,
    #[error("convergence window must be at least one sweep")]
    ZeroWindow,
    #[error("convergence tolerance must be strictly positive and finite, got {tolerance}")]
    NonPositiveTolerance { tolerance: f64 },
}

/// Numerical failure inside a Gibbs sweep. The sweep is aborted; the
/// observation that triggered the failure has been restored to its
/// pre-removal cluster, so the model is left internally consistent.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SweepError {
    #[error("non-finite log-weight while reassigning observation {observation}")]
    NonFiniteWeight { observation: usize },
    #[error("every candidate cluster for observation {observation} has zero weight")]
    DegenerateWeights { observation: usize },
}

/// Top-level fit error.
///
/// A numerical abort carries the assignments and trace as of the last
/// successful sweep, so callers keep a usable (if unconverged) partition.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DpmmError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("sweep {sweep} aborted: {source}")]
    Numerical {
        sweep: usize,
        source: SweepError,
        assignments: Vec<usize>,
        trace: Vec<SweepRecord>,
    },
}
