use crate::line_spec::Engine;

/// Simulation-wide tolerances shared by every line in an analysis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimTolerances {
    pub reltol: f64,
    pub abstol: f64,
    /// Truncation-error overestimation factor.
    pub trtol: f64,
}

impl Default for SimTolerances {
    fn default() -> Self {
        Self {
            reltol: 1e-3,
            abstol: 1e-12,
            trtol: 7.0,
        }
    }
}

/// A relative/absolute tolerance pair: `|err| <= rel * reference + abs`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    pub rel: f64,
    pub abs: f64,
}

impl Tolerance {
    pub fn new(rel: f64, abs: f64) -> Self {
        Self { rel, abs }
    }

    pub fn bound(&self, reference: f64) -> f64 {
        self.rel * reference.abs() + self.abs
    }
}

/// How delayed values are read back from the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    #[default]
    Linear,
    Quadratic,
    /// Quadratic unless the three bracketing samples already lie on a line.
    Mixed,
}

/// Options shared by every instance of a line model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOptions {
    /// `None` picks the engine from the regime.
    pub engine: Option<Engine>,
    /// Slope discontinuity test used to request breakpoints.
    pub breakpoint: Tolerance,
    /// Kernel linearity test (maximum safe step) and mixed interpolation.
    pub straight_line: Tolerance,
    /// History compaction, off when `None`.
    pub compaction: Option<Tolerance>,
    pub interpolation: Interpolation,
    /// Old convolution coefficients smaller than `chop_reltol * first` are folded together.
    pub chop_reltol: f64,
    /// Padé step limit as a fraction of the line delay.
    pub slope_tolerance: f64,
    pub trunc_dont_cut: bool,
    pub trunc_newton: bool,
    /// Limit the step so the slope change stays below this fraction of the peak value.
    pub slope_change: Option<f64>,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            engine: None,
            breakpoint: Tolerance::new(0.5, 1.0),
            straight_line: Tolerance::new(1e-3, 1e-12),
            compaction: None,
            interpolation: Interpolation::Linear,
            chop_reltol: 0.0,
            slope_tolerance: 0.1,
            trunc_dont_cut: false,
            trunc_newton: false,
            slope_change: None,
        }
    }
}
