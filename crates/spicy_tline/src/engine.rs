//! What the device needs from the circuit engine that drives it.

use num_complex::Complex64;

/// Real matrix and right-hand-side access through handles obtained at setup.
pub trait Stamper {
    fn add(&mut self, handle: usize, value: f64);
    fn add_rhs(&mut self, row: usize, value: f64);
}

/// Complex counterpart of [`Stamper`] used by small-signal analysis.
pub trait ComplexStamper {
    fn add_complex(&mut self, handle: usize, value: Complex64);
    fn add_rhs_complex(&mut self, row: usize, value: Complex64);
}

pub trait BreakpointSink {
    fn request_breakpoint(&mut self, time: f64);
}

impl BreakpointSink for Vec<f64> {
    fn request_breakpoint(&mut self, time: f64) {
        self.push(time);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisMode {
    Dc,
    /// First accepted point of a transient run, the operating point at `t = 0`.
    TransientInit,
    /// First solve at a new time point.
    TransientPredict,
    /// Further solves at the same time point.
    TransientCorrect,
}

/// Timing information supplied with every call.
#[derive(Debug, Clone, Copy)]
pub struct TimeContext {
    pub time: f64,
    /// Step from the last accepted point to `time`.
    pub delta: f64,
    /// Order of the outer integrator.
    pub order: u32,
    pub mode: AnalysisMode,
}

impl TimeContext {
    pub fn dc() -> Self {
        Self {
            time: 0.0,
            delta: 0.0,
            order: 1,
            mode: AnalysisMode::Dc,
        }
    }
}
