use num_complex::Complex64;
use serde::Serialize;
use std::f64::consts::PI;

use crate::circuit::{Circuit, PORT1, PORT2};
use crate::error::TlineError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AcSweep {
    /// `points` per decade.
    Dec { points: usize, fstart: f64, fstop: f64 },
    /// `points` in total, evenly spaced.
    Lin { points: usize, fstart: f64, fstop: f64 },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AcResult {
    pub frequencies: Vec<f64>,
    pub v1: Vec<Complex64>,
    pub v2: Vec<Complex64>,
}

fn invalid(msg: impl Into<String>) -> TlineError {
    TlineError::InvalidAnalysis(msg.into())
}

pub fn ac_frequencies(sweep: &AcSweep) -> Result<Vec<f64>, TlineError> {
    const EPS: f64 = 1e-12;

    match *sweep {
        AcSweep::Dec {
            points,
            fstart,
            fstop,
        } => {
            if points == 0 || fstart <= 0.0 || fstop < fstart {
                return Err(invalid(format!(
                    "AC DEC needs N >= 1 and 0 < fstart <= fstop, got N={points} {fstart:e}..{fstop:e}"
                )));
            }
            let r = 10f64.powf(1.0 / points as f64); // ratio per point
            let mut f = fstart;
            let mut out = Vec::new();
            while f <= fstop * (1.0 + EPS) {
                out.push(f);
                f *= r;
            }
            Ok(out)
        }
        AcSweep::Lin {
            points,
            fstart,
            fstop,
        } => {
            if points == 0 || fstart < 0.0 || fstop < fstart {
                return Err(invalid(format!(
                    "AC LIN needs N >= 1 and 0 <= fstart <= fstop, got N={points} {fstart:e}..{fstop:e}"
                )));
            }
            if points == 1 {
                return Ok(vec![fstart]);
            }
            let step = (fstop - fstart) / ((points - 1) as f64);
            Ok((0..points).map(|k| fstart + k as f64 * step).collect())
        }
    }
}

pub fn simulate_ac(circuit: &Circuit, sweep: &AcSweep) -> Result<AcResult, TlineError> {
    let frequencies = ac_frequencies(sweep)?;
    let mut result = AcResult::default();
    for f in frequencies {
        let x = circuit.solve_ac(2.0 * PI * f)?;
        result.frequencies.push(f);
        result.v1.push(x[PORT1]);
        result.v2.push(x[PORT2]);
    }
    Ok(result)
}
