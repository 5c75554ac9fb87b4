use thiserror::Error;

use crate::line_spec::{Engine, Regime};
use crate::params::ParamId;

#[derive(Debug, Error)]
pub enum TlineError {
    // configuration
    #[error("line is overspecified: {0}")]
    Overspecified(&'static str),

    #[error("line is underspecified: at least two of L, C, R, G must be nonzero")]
    Underspecified,

    #[error("line length must be positive, got {0}")]
    NonPositiveLength(f64),

    #[error("unsupported line: R={r}, L={l}, G={g}, C={c}")]
    UnsupportedRegime { r: f64, l: f64, g: f64, c: f64 },

    #[error("{regime:?} line cannot be simulated with the {engine:?} engine")]
    UnsupportedEngine { regime: Regime, engine: Engine },

    // numerical setup
    #[error("pade system is singular (largest pivot {pivot:e})")]
    SingularPadeSystem { pivot: f64 },

    #[error("pade fit produced an unstable pole at {pole}")]
    UnstablePole { pole: num_complex::Complex64 },

    #[error(transparent)]
    NdarrayLinalgError(#[from] ndarray_linalg::error::LinalgError),

    // runtime
    #[error(
        "{instance}: time step {step:e} is larger than the line delay {limit:e}; reduce the maximum step"
    )]
    StepTooLarge {
        instance: String,
        step: f64,
        limit: f64,
    },

    #[error("invalid analysis: {0}")]
    InvalidAnalysis(String),

    // parameters
    #[error("unknown line parameter `{0}`")]
    UnknownParameter(String),

    #[error("parameter {0:?} is read-only")]
    ReadOnlyParameter(ParamId),

    // lifecycle
    #[error("{instance}: device has not been set up")]
    NotSetUp { instance: String },

    #[error("{instance}: transient history is empty")]
    NoHistory { instance: String },
}

impl TlineError {
    /// Configuration problems are reported per instance at setup; everything else aborts the run.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            TlineError::Overspecified(_)
                | TlineError::Underspecified
                | TlineError::NonPositiveLength(_)
                | TlineError::UnsupportedRegime { .. }
                | TlineError::UnsupportedEngine { .. }
        )
    }
}
