//! A single line between a resistive source and a resistive load.
//!
//! ```text
//!   vs ──Rs── port 1 ═══ line ═══ port 2 ──RL── gnd
//! ```

use num_complex::Complex64;

use crate::config::{ModelOptions, SimTolerances};
use crate::device::{LineModel, TlineInstance};
use crate::engine::{BreakpointSink, ComplexStamper, Stamper, TimeContext};
use crate::error::TlineError;
use crate::line_spec::LineParams;
use crate::matrix::{ComplexMatrix, DenseMatrix};
use crate::stamp::TwoPortNodes;

// unknowns of the modified nodal system
pub(crate) const SOURCE: usize = 0;
pub(crate) const PORT1: usize = 1;
pub(crate) const PORT2: usize = 2;
pub(crate) const VSRC: usize = 3;
pub(crate) const IBR1: usize = 4;
pub(crate) const IBR2: usize = 5;
const DIM: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Waveform {
    Dc(f64),
    /// Linear ramp from 0 to `amplitude` over `rise`, then held.
    Ramp { amplitude: f64, rise: f64 },
    Pulse {
        v1: f64,
        v2: f64,
        delay: f64,
        rise: f64,
        fall: f64,
        width: f64,
        period: f64,
    },
}

impl Waveform {
    pub fn value(&self, t: f64) -> f64 {
        match *self {
            Waveform::Dc(v) => v,
            Waveform::Ramp { amplitude, rise } => {
                if t <= 0.0 {
                    0.0
                } else if t < rise {
                    amplitude * t / rise
                } else {
                    amplitude
                }
            }
            Waveform::Pulse {
                v1,
                v2,
                delay,
                rise,
                fall,
                width,
                period,
            } => {
                if t < delay {
                    return v1;
                }
                let dv = v2 - v1;
                let s = if period > 0.0 {
                    (t - delay).rem_euclid(period)
                } else {
                    t - delay
                };
                if s < rise {
                    if rise > 0.0 { v1 + dv * (s / rise) } else { v2 }
                } else if s < rise + width {
                    v2
                } else if s < rise + width + fall {
                    if fall > 0.0 {
                        v2 - dv * ((s - rise - width) / fall)
                    } else {
                        v1
                    }
                } else {
                    v1
                }
            }
        }
    }

    /// Slope discontinuities in `(0, tstop]`.
    pub fn corners(&self, tstop: f64) -> Vec<f64> {
        match *self {
            Waveform::Dc(_) => Vec::new(),
            Waveform::Ramp { rise, .. } if rise > 0.0 && rise <= tstop => vec![rise],
            Waveform::Ramp { .. } => Vec::new(),
            Waveform::Pulse {
                delay,
                rise,
                fall,
                width,
                period,
                ..
            } => {
                let mut out = Vec::new();
                let mut start = delay;
                while start <= tstop {
                    for t in [start, start + rise, start + rise + width, start + rise + width + fall] {
                        if t > 0.0 && t <= tstop {
                            out.push(t);
                        }
                    }
                    if period <= 0.0 {
                        break;
                    }
                    start += period;
                }
                out.dedup();
                out
            }
        }
    }
}

/// Everything needed to build a [`Circuit`].
#[derive(Debug, Clone, PartialEq)]
pub struct TerminatedLine {
    pub line: LineParams,
    pub source: Waveform,
    /// Small-signal source amplitude.
    pub ac_magnitude: f64,
    pub rs: f64,
    /// Load resistance; infinite for an open end.
    pub rl: f64,
    pub options: ModelOptions,
    pub tolerances: SimTolerances,
}

impl Default for TerminatedLine {
    fn default() -> Self {
        Self {
            line: LineParams::default(),
            source: Waveform::Dc(1.0),
            ac_magnitude: 1.0,
            rs: 50.0,
            rl: 50.0,
            options: ModelOptions::default(),
            tolerances: SimTolerances::default(),
        }
    }
}

#[derive(Debug)]
pub struct Circuit {
    pub config: TerminatedLine,
    model: LineModel,
}

impl Circuit {
    pub fn new(config: TerminatedLine) -> Result<Self, TlineError> {
        if config.rs <= 0.0 || config.rl <= 0.0 {
            return Err(TlineError::InvalidAnalysis(format!(
                "terminations must be positive, got Rs={} RL={}",
                config.rs, config.rl
            )));
        }
        let nodes = TwoPortNodes {
            pos1: Some(PORT1),
            neg1: None,
            pos2: Some(PORT2),
            neg2: None,
            ibr1: IBR1,
            ibr2: IBR2,
        };
        let mut model = LineModel::new("tline", config.options.clone());
        model.add_instance(TlineInstance::new("t1", config.line, nodes));
        model.setup(|row, col| Ok(row * DIM + col))?;
        model.set_final_indices(|h| h);
        Ok(Self { config, model })
    }

    pub fn line(&self) -> &TlineInstance {
        &self.model.instances[0]
    }

    pub fn model(&self) -> &LineModel {
        &self.model
    }

    fn stamp_terminations(&self, m: &mut DenseMatrix, source: f64) {
        let gs = 1.0 / self.config.rs;
        let gl = 1.0 / self.config.rl;
        m.add_at(SOURCE, SOURCE, gs);
        m.add_at(PORT1, PORT1, gs);
        m.add_at(SOURCE, PORT1, -gs);
        m.add_at(PORT1, SOURCE, -gs);
        m.add_at(PORT2, PORT2, gl);
        m.add_at(SOURCE, VSRC, 1.0);
        m.add_at(VSRC, SOURCE, 1.0);
        m.add_rhs(VSRC, source);
    }

    /// Assemble and solve the system at `ctx`.
    pub(crate) fn solve(&mut self, ctx: &TimeContext) -> Result<Vec<f64>, TlineError> {
        let mut m = DenseMatrix::new(DIM);
        self.stamp_terminations(&mut m, self.config.source.value(ctx.time));
        self.model.load(&mut m, ctx)?;
        Ok(m.solve()?.to_vec())
    }

    pub(crate) fn accept<B: BreakpointSink>(
        &mut self,
        x: &[f64],
        ctx: &TimeContext,
        breakpoints: &mut B,
    ) -> Result<(), TlineError> {
        self.model.accept(x, ctx, breakpoints)
    }

    pub(crate) fn truncate(&self, ctx: &TimeContext, step: f64) -> Result<f64, TlineError> {
        self.model.truncate(ctx, &self.config.tolerances, step)
    }

    pub(crate) fn begin_transient(&mut self) {
        self.model.begin_transient();
    }

    pub(crate) fn solve_ac(&self, omega: f64) -> Result<Vec<Complex64>, TlineError> {
        let mut m = ComplexMatrix::new(DIM);
        let gs = Complex64::new(1.0 / self.config.rs, 0.0);
        let gl = Complex64::new(1.0 / self.config.rl, 0.0);
        let one = Complex64::new(1.0, 0.0);
        m.add_at(SOURCE, SOURCE, gs);
        m.add_at(PORT1, PORT1, gs);
        m.add_at(SOURCE, PORT1, -gs);
        m.add_at(PORT1, SOURCE, -gs);
        m.add_at(PORT2, PORT2, gl);
        m.add_at(SOURCE, VSRC, one);
        m.add_at(VSRC, SOURCE, one);
        m.add_rhs_complex(VSRC, Complex64::new(self.config.ac_magnitude, 0.0));
        self.model.ac_load(&mut m, omega)?;
        m.solve()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn ramp_holds_after_rise() {
        let w = Waveform::Ramp {
            amplitude: 2.0,
            rise: 1.0,
        };
        assert_eq!(w.value(-1.0), 0.0);
        assert_relative_eq!(w.value(0.25), 0.5);
        assert_eq!(w.value(3.0), 2.0);
        assert_eq!(w.corners(10.0), vec![1.0]);
    }

    #[test]
    fn pulse_repeats() {
        let w = Waveform::Pulse {
            v1: 0.0,
            v2: 1.0,
            delay: 1.0,
            rise: 1.0,
            fall: 1.0,
            width: 2.0,
            period: 10.0,
        };
        assert_eq!(w.value(0.5), 0.0);
        assert_relative_eq!(w.value(1.5), 0.5);
        assert_eq!(w.value(3.0), 1.0);
        assert_relative_eq!(w.value(4.5), 0.5);
        assert_eq!(w.value(8.0), 0.0);
        assert_relative_eq!(w.value(11.5), 0.5);
        assert_eq!(w.corners(12.0), vec![1.0, 2.0, 4.0, 5.0, 11.0, 12.0]);
    }

    #[test]
    fn rejects_short_terminations() {
        let config = TerminatedLine {
            rs: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            Circuit::new(config),
            Err(TlineError::InvalidAnalysis(_))
        ));
    }
}
