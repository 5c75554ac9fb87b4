use crate::config::{Interpolation, ModelOptions};
use crate::convolution::Kernel;
use crate::engine::{AnalysisMode, Stamper, TimeContext};
use crate::error::TlineError;
use crate::history::{History, Terminal, TerminalSample};
use crate::line_spec::{Engine, LineSpec};
use crate::stamp::BranchRow;

use super::{
    ConvolutionState, LineState, PadePending, PadeState, PendingStep, TlineInstance,
    is_transient,
};

/// `sinh(x) / x`
fn sinhc(x: f64) -> f64 {
    if x.abs() < 1e-8 { 1.0 } else { x.sinh() / x }
}

/// Port `p` row of `i_p = g_self·v_p + g_other·v_o + k_other·i_o + j`.
fn current_row(port: usize, g_self: f64, g_other: f64, k_other: f64, j: f64) -> BranchRow<f64> {
    let mut row = BranchRow::default();
    row.v[port] = g_self;
    row.v[1 - port] = g_other;
    row.i[port] = -1.0;
    row.i[1 - port] = k_other;
    row.rhs = -j;
    row
}

fn terminals(port: usize) -> (Terminal, Terminal, Terminal) {
    match port {
        0 => (Terminal::V1, Terminal::V2, Terminal::I2),
        _ => (Terminal::V2, Terminal::V1, Terminal::I1),
    }
}

/// Rows of the static network seen at DC, and by RG lines at all times.
pub(super) fn dc_rows(spec: &LineSpec) -> [BranchRow<f64>; 2] {
    if spec.g == 0.0 {
        return [
            BranchRow {
                v: [1.0, -1.0],
                i: [-spec.r * spec.length, 0.0],
                rhs: 0.0,
            },
            BranchRow {
                v: [0.0, 0.0],
                i: [1.0, 1.0],
                rhs: 0.0,
            },
        ];
    }
    // chain parameters of a distributed R-G ladder
    let gl = (spec.r * spec.g).sqrt() * spec.length;
    let a = gl.cosh();
    let b = spec.r * spec.length * sinhc(gl);
    let c = spec.g * spec.length * sinhc(gl);
    [
        BranchRow {
            v: [1.0, -a],
            i: [0.0, b],
            rhs: 0.0,
        },
        BranchRow {
            v: [0.0, -c],
            i: [1.0, a],
            rhs: 0.0,
        },
    ]
}

/// Value of `which` at `t` split into a known part and the weight of the unknown current value.
fn delayed_tap(
    history: &History,
    tail: &TerminalSample,
    t: f64,
    h: f64,
    which: Terminal,
    mode: Interpolation,
    options: &ModelOptions,
) -> (f64, f64) {
    if t <= tail.time {
        let v = history
            .interpolate(t, which, mode, &options.straight_line)
            .unwrap_or(0.0);
        return (v, 0.0);
    }
    let w = (t - tail.time) / h;
    ((1.0 - w) * tail.get(which), w)
}

impl TlineInstance {
    pub fn load<S: Stamper>(
        &mut self,
        m: &mut S,
        ctx: &TimeContext,
        options: &ModelOptions,
    ) -> Result<(), TlineError> {
        let (spec, _) = self.ready()?;
        let spec = *spec;
        self.stamp.stamp_incidence(m);

        let rows = match ctx.mode {
            AnalysisMode::Dc | AnalysisMode::TransientInit => dc_rows(&spec),
            AnalysisMode::TransientCorrect
                if self.pending.as_ref().is_some_and(|p| p.time == ctx.time) =>
            {
                self.pending.as_ref().map(|p| p.rows).unwrap_or_default()
            }
            _ => {
                debug_assert!(is_transient(ctx.mode));
                let pending = self.predict(&spec, ctx, options)?;
                let rows = pending.rows;
                self.pending = Some(pending);
                rows
            }
        };

        for (port, row) in rows.iter().enumerate() {
            self.stamp.stamp_row(m, port, row);
        }
        Ok(())
    }

    /// Rows for a new time point, everything not depending on the unknowns precomputed.
    pub(super) fn predict(
        &self,
        spec: &LineSpec,
        ctx: &TimeContext,
        options: &ModelOptions,
    ) -> Result<PendingStep, TlineError> {
        let (_, state) = self.ready()?;
        let tail = *self.history.tail().ok_or_else(|| TlineError::NoHistory {
            instance: self.name.clone(),
        })?;
        let h = ctx.time - tail.time;

        let (rows, pade) = match state {
            LineState::Resistive => (dc_rows(spec), None),
            LineState::Lumped => {
                let l = spec.l * spec.length / h;
                let rows = [
                    BranchRow {
                        v: [1.0, -1.0],
                        i: [-(spec.r * spec.length + l), 0.0],
                        rhs: -l * tail.i1,
                    },
                    BranchRow {
                        v: [0.0, 0.0],
                        i: [1.0, 1.0],
                        rhs: 0.0,
                    },
                ];
                (rows, None)
            }
            LineState::Convolution(conv) => {
                if self.engine == Some(Engine::Pade) && h > spec.delay {
                    return Err(self.step_too_large(h, spec.delay));
                }
                (self.convolution_rows(spec, conv, &tail, ctx.time, h, options), None)
            }
            LineState::Pade(pade) => {
                if h > spec.delay {
                    return Err(self.step_too_large(h, spec.delay));
                }
                let (rows, pending) = self.pade_rows(pade, &tail, ctx.time, h, options);
                (rows, Some(pending))
            }
        };
        log::trace!("{}: predicted rows at t={:e}", self.name, ctx.time);
        Ok(PendingStep {
            time: ctx.time,
            rows,
            pade,
        })
    }

    fn step_too_large(&self, step: f64, limit: f64) -> TlineError {
        TlineError::StepTooLarge {
            instance: self.name.clone(),
            step,
            limit,
        }
    }

    fn convolution_rows(
        &self,
        spec: &LineSpec,
        conv: &ConvolutionState,
        tail: &TerminalSample,
        t: f64,
        h: f64,
        options: &ModelOptions,
    ) -> [BranchRow<f64>; 2] {
        let f = conv.factors;
        let samples = self.history.samples();
        let (first, cache) = match &conv.cache {
            Some(cache) => {
                if cache.borrow_mut().update(samples, t) {
                    log::trace!("{}: convolution coefficients rebuilt at t={t:e}", self.name);
                }
                (cache.borrow().first(), Some(cache.borrow()))
            }
            None => ([0.0; 3], None),
        };
        let history_part = |kernel: Kernel, which: Terminal| {
            cache
                .as_ref()
                .map(|c| c.convolve(kernel, samples, which))
                .unwrap_or(0.0)
        };

        let mut rows = [BranchRow::default(); 2];
        for (port, row) in rows.iter_mut().enumerate() {
            let (own_v, other_v, other_i) = terminals(port);
            let (known_v, wv, known_i, wi) = if spec.delay > 0.0 {
                let td = t - spec.delay;
                let mode = options.interpolation;
                let (kv, wv) = delayed_tap(&self.history, tail, td, h, other_v, mode, options);
                let (ki, wi) = delayed_tap(&self.history, tail, td, h, other_i, mode, options);
                (kv, wv, ki, wi)
            } else {
                (0.0, 0.0, 0.0, 0.0)
            };

            let [s1, s2, s3] = f.scale;
            let g_self = f.direct + s1 * first[0];
            let g_other = -(f.delayed_v * wv + s3 * first[2]);
            let k_other = -(f.delayed_i * wi + s2 * first[1]);
            let j = s1 * history_part(Kernel::H1, own_v)
                - f.delayed_v * known_v
                - s3 * history_part(Kernel::H3, other_v)
                - f.delayed_i * known_i
                - s2 * history_part(Kernel::H2, other_i);
            *row = current_row(port, g_self, g_other, k_other, j);
        }
        rows
    }

    fn pade_rows(
        &self,
        pade: &PadeState,
        tail: &TerminalSample,
        t: f64,
        h: f64,
        options: &ModelOptions,
    ) -> ([BranchRow<f64>; 2], [PadePending; 2]) {
        let model = &pade.model;
        let td = t - model.delay;
        let mut rows = [BranchRow::default(); 2];
        let mut pending: [PadePending; 2] = Default::default();
        for port in 0..2 {
            let (own_v, other_v, other_i) = terminals(port);
            let state = &pade.ports[port];
            let tap = |which| {
                delayed_tap(&self.history, tail, td, h, which, Interpolation::Linear, options).0
            };
            let delayed = (tap(other_v), tap(other_i));

            let h3 = state.h3.advanced(h, state.delayed_prev.0, delayed.0);
            let h2 = state.h2.advanced(h, state.delayed_prev.1, delayed.1);
            let value = |s: &[num_complex::Complex64]| s.iter().map(|y| y.re).sum::<f64>();

            let g_self = model.y0 + state.h1.current_weight(h);
            let j = state.h1.history(h, tail.get(own_v))
                - model.y0 * model.attenuation * delayed.0
                - value(&h3)
                - model.attenuation * delayed.1
                - value(&h2);
            rows[port] = current_row(port, g_self, 0.0, 0.0, j);
            pending[port] = PadePending { delayed, h3, h2 };
        }
        (rows, pending)
    }
}
