use serde::Serialize;

use crate::circuit::{Circuit, IBR1, IBR2, PORT1, PORT2};
use crate::dc::simulate_op_inner;
use crate::engine::{AnalysisMode, BreakpointSink, TimeContext};
use crate::error::TlineError;

/// Step growth offered to the line before it applies its own limits.
const GROWTH: f64 = 2.0;
/// Smallest step, relative to the stop time, before the run is abandoned.
const MIN_STEP_FRACTION: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TranParams {
    pub tstop: f64,
    pub max_step: f64,
    /// Defaults to a tenth of `max_step`.
    pub initial_step: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransientResult {
    pub times: Vec<f64>,
    pub v1: Vec<f64>,
    pub v2: Vec<f64>,
    pub i1: Vec<f64>,
    pub i2: Vec<f64>,
    /// Accepted time points after `t = 0`.
    pub steps: usize,
    /// Steps the line refused as longer than its delay.
    pub rejected: usize,
}

impl TransientResult {
    fn push(&mut self, t: f64, x: &[f64]) {
        self.times.push(t);
        self.v1.push(x[PORT1]);
        self.v2.push(x[PORT2]);
        self.i1.push(x[IBR1]);
        self.i2.push(x[IBR2]);
    }

    /// Linear interpolation of `trace` at `t`.
    pub fn value_at(&self, trace: &[f64], t: f64) -> Option<f64> {
        let k = self.times.iter().position(|&x| x >= t)?;
        if k == 0 {
            return trace.first().copied();
        }
        let (t0, t1) = (self.times[k - 1], self.times[k]);
        let w = (t - t0) / (t1 - t0);
        Some(trace[k - 1] * (1.0 - w) + trace[k] * w)
    }
}

/// Pending breakpoints in increasing order; times closer than `eps` are merged.
#[derive(Debug, Clone)]
struct Breakpoints {
    times: Vec<f64>,
    eps: f64,
}

impl Breakpoints {
    fn new(eps: f64) -> Self {
        Self {
            times: Vec::new(),
            eps,
        }
    }

    fn insert(&mut self, t: f64) {
        let idx = self.times.partition_point(|&x| x < t);
        let near = |i: usize| self.times.get(i).is_some_and(|&x| (x - t).abs() <= self.eps);
        if near(idx) || (idx > 0 && near(idx - 1)) {
            return;
        }
        self.times.insert(idx, t);
    }

    fn next_after(&self, t: f64) -> Option<f64> {
        self.times.iter().copied().find(|&x| x > t + self.eps)
    }

    fn drop_until(&mut self, t: f64) {
        self.times.retain(|&x| x > t + self.eps);
    }
}

impl BreakpointSink for Breakpoints {
    fn request_breakpoint(&mut self, time: f64) {
        self.insert(time);
    }
}

fn context(time: f64, delta: f64, mode: AnalysisMode) -> TimeContext {
    TimeContext {
        time,
        delta,
        order: 1,
        mode,
    }
}

pub fn simulate_trans(
    circuit: &mut Circuit,
    params: &TranParams,
) -> Result<TransientResult, TlineError> {
    let TranParams {
        tstop, max_step, ..
    } = *params;
    if tstop <= 0.0 || max_step <= 0.0 {
        return Err(TlineError::InvalidAnalysis(format!(
            "tstop and the maximum step must be positive, got {tstop:e} and {max_step:e}"
        )));
    }
    let eps = 1e-9 * tstop;
    let min_step = MIN_STEP_FRACTION * tstop;

    // the operating point is the state at t = 0
    let x0 = simulate_op_inner(circuit)?;
    circuit.begin_transient();
    let mut breakpoints = Breakpoints::new(eps);
    circuit.accept(&x0, &context(0.0, 0.0, AnalysisMode::TransientInit), &mut breakpoints)?;
    for t in circuit.config.source.corners(tstop) {
        breakpoints.insert(t);
    }
    breakpoints.insert(tstop);

    let mut result = TransientResult::default();
    result.push(0.0, &x0);

    let mut t = 0.0;
    let mut h = params.initial_step.unwrap_or(0.1 * max_step);
    while let Some(next) = breakpoints.next_after(t) {
        h = h.min(max_step);
        let remaining = next - t;
        if remaining <= h {
            h = remaining;
        } else if remaining < 2.0 * h {
            h = 0.5 * remaining;
        }
        let time = t + h;

        let predicted = match circuit.solve(&context(time, h, AnalysisMode::TransientPredict)) {
            Ok(x) => x,
            Err(TlineError::StepTooLarge { limit, .. }) if limit > min_step => {
                log::debug!("t={t:e}: step {h:e} rejected, retrying with {:e}", 0.5 * limit);
                result.rejected += 1;
                h = 0.5 * limit;
                continue;
            }
            Err(e) => return Err(e),
        };
        let ctx = context(time, h, AnalysisMode::TransientCorrect);
        let x = circuit.solve(&ctx)?;
        let change = predicted
            .iter()
            .zip(&x)
            .fold(0.0f64, |m, (a, b)| m.max((a - b).abs()));
        log::trace!("t={time:e}: corrector changed the solution by {change:e}");

        circuit.accept(&x, &ctx, &mut breakpoints)?;
        result.push(time, &x);
        result.steps += 1;
        breakpoints.drop_until(time);

        let next_h = circuit.truncate(&ctx, GROWTH * h)?;
        t = time;
        h = next_h;
        if h < min_step {
            return Err(TlineError::InvalidAnalysis(format!(
                "time step {h:e} too small at t={t:e}"
            )));
        }
    }

    log::debug!(
        "transient done: {} steps, {} rejected",
        result.steps,
        result.rejected
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{TerminatedLine, Waveform};
    use crate::config::ModelOptions;
    use crate::line_spec::{Engine, LineParams};
    use approx::assert_abs_diff_eq;
    use rstest::rstest;

    fn run(config: TerminatedLine, params: TranParams) -> TransientResult {
        let mut circuit = Circuit::new(config).unwrap();
        simulate_trans(&mut circuit, &params).unwrap()
    }

    fn lc() -> (LineParams, f64, f64) {
        let (l, c) = (1e-9f64, 1e-12f64);
        let line = LineParams {
            inductance: l,
            capacitance: c,
            ..Default::default()
        };
        (line, (l / c).sqrt(), (l * c).sqrt())
    }

    fn rlc() -> (LineParams, f64, f64) {
        let (l, c) = (1e-7f64, 1e-10f64);
        let line = LineParams {
            resistance: 50.0,
            inductance: l,
            capacitance: c,
            ..Default::default()
        };
        (line, (l / c).sqrt(), (l * c).sqrt())
    }

    fn engine(engine: Engine) -> ModelOptions {
        ModelOptions {
            engine: Some(engine),
            ..Default::default()
        }
    }

    #[test]
    fn breakpoints_merge_and_order() {
        let mut b = Breakpoints::new(1e-3);
        for t in [3.0, 1.0, 2.0, 1.0005] {
            b.insert(t);
        }
        assert_eq!(b.times, vec![1.0, 2.0, 3.0]);
        assert_eq!(b.next_after(1.0), Some(2.0));
        b.drop_until(2.0);
        assert_eq!(b.times, vec![3.0]);
    }

    #[rstest]
    #[case(Engine::Convolution)]
    #[case(Engine::Pade)]
    fn lossless_line_reflects_from_mismatched_load(#[case] e: Engine) {
        let (line, z0, td) = lc();
        let config = TerminatedLine {
            line,
            source: Waveform::Ramp {
                amplitude: 1.0,
                rise: td / 20.0,
            },
            rs: z0,
            rl: 3.0 * z0,
            options: engine(e),
            ..Default::default()
        };
        let r = run(
            config,
            TranParams {
                tstop: 4.0 * td,
                max_step: td / 20.0,
                initial_step: None,
            },
        );

        for (t, v2) in r.times.iter().zip(&r.v2) {
            if *t < 0.99 * td {
                assert_abs_diff_eq!(*v2, 0.0, epsilon = 1e-9);
            }
        }
        // incident half, then the load reflects half of it back
        assert_abs_diff_eq!(r.value_at(&r.v1, 1.5 * td).unwrap(), 0.5, epsilon = 1e-2);
        assert_abs_diff_eq!(r.value_at(&r.v2, 1.5 * td).unwrap(), 0.75, epsilon = 1e-2);
        assert_abs_diff_eq!(r.value_at(&r.v1, 3.0 * td).unwrap(), 0.75, epsilon = 1e-2);
        assert_abs_diff_eq!(r.value_at(&r.v2, 3.5 * td).unwrap(), 0.75, epsilon = 1e-2);
    }

    #[test]
    fn source_corner_is_echoed_one_delay_later() {
        let (line, z0, td) = lc();
        let rise = td / 20.0;
        let config = TerminatedLine {
            line,
            source: Waveform::Ramp {
                amplitude: 1.0,
                rise,
            },
            rs: z0,
            rl: 3.0 * z0,
            ..Default::default()
        };
        let r = run(
            config,
            TranParams {
                tstop: 2.0 * td,
                max_step: td / 20.0,
                initial_step: None,
            },
        );
        assert!(
            r.times.iter().any(|t| (t - (rise + td)).abs() < 1e-6 * td),
            "no time point at the delayed corner"
        );
    }

    #[test]
    fn lossy_engines_agree() {
        let (line, z0, td) = rlc();
        let dc = z0 / (2.0 * z0 + 50.0);
        let params = TranParams {
            tstop: 20.0 * td,
            max_step: td / 10.0,
            initial_step: None,
        };
        let config = |e| TerminatedLine {
            line,
            source: Waveform::Ramp {
                amplitude: 1.0,
                rise: td / 10.0,
            },
            rs: z0,
            rl: z0,
            options: engine(e),
            ..Default::default()
        };
        let conv = run(config(Engine::Convolution), params);
        let pade = run(config(Engine::Pade), params);

        for t in [3.0 * td, 20.0 * td] {
            let a = conv.value_at(&conv.v2, t).unwrap();
            let b = pade.value_at(&pade.v2, t).unwrap();
            assert_abs_diff_eq!(a, b, epsilon = 0.03);
        }
        let end = |r: &TransientResult| *r.v2.last().unwrap();
        assert_abs_diff_eq!(end(&conv), dc, epsilon = 0.05 * dc);
        assert_abs_diff_eq!(end(&pade), dc, epsilon = 0.05 * dc);
    }

    #[test]
    fn pade_settles_on_the_operating_point() {
        let (line, z0, td) = rlc();
        let dc = z0 / (2.0 * z0 + 50.0);
        let config = TerminatedLine {
            line,
            source: Waveform::Ramp {
                amplitude: 1.0,
                rise: td / 10.0,
            },
            rs: z0,
            rl: z0,
            options: engine(Engine::Pade),
            ..Default::default()
        };
        let r = run(
            config,
            TranParams {
                tstop: 40.0 * td,
                max_step: td / 10.0,
                initial_step: None,
            },
        );
        assert_abs_diff_eq!(*r.v2.last().unwrap(), dc, epsilon = 0.02 * dc);
        assert_abs_diff_eq!(*r.v1.last().unwrap(), 1.0 - dc, epsilon = 0.02 * dc);
    }

    #[test]
    fn oversized_first_step_is_retried() {
        let (line, z0, td) = rlc();
        let config = TerminatedLine {
            line,
            source: Waveform::Dc(1.0),
            rs: z0,
            rl: z0,
            options: engine(Engine::Pade),
            ..Default::default()
        };
        let r = run(
            config,
            TranParams {
                tstop: 5.0 * td,
                max_step: 2.0 * td,
                initial_step: Some(1.5 * td),
            },
        );
        assert!(r.rejected >= 1);
        assert!(r.times.windows(2).all(|w| w[1] - w[0] <= td * (1.0 + 1e-9)));
    }

    #[test]
    fn diffusive_line_reaches_its_divider() {
        let line = LineParams {
            resistance: 100.0,
            capacitance: 1e-10,
            ..Default::default()
        };
        let rc = 100.0 * 1e-10;
        let config = TerminatedLine {
            line,
            source: Waveform::Ramp {
                amplitude: 1.0,
                rise: 0.1 * rc,
            },
            rs: 50.0,
            rl: 50.0,
            ..Default::default()
        };
        let r = run(
            config,
            TranParams {
                tstop: 20.0 * rc,
                max_step: 0.2 * rc,
                initial_step: None,
            },
        );
        assert_abs_diff_eq!(*r.v2.last().unwrap(), 0.25, epsilon = 0.03 * 0.25);
        assert_abs_diff_eq!(*r.i1.last().unwrap(), 1.0 / 200.0, epsilon = 0.03 / 200.0);
    }

    #[test]
    fn rejects_nonpositive_stop_time() {
        let (line, _, _) = lc();
        let mut circuit = Circuit::new(TerminatedLine {
            line,
            ..Default::default()
        })
        .unwrap();
        let err = simulate_trans(
            &mut circuit,
            &TranParams {
                tstop: 0.0,
                max_step: 1.0,
                initial_step: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, TlineError::InvalidAnalysis(_)));
    }
}
