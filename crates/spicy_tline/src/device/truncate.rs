use crate::config::{ModelOptions, SimTolerances};
use crate::convolution::LineKernels;
use crate::engine::TimeContext;
use crate::error::TlineError;
use crate::history::{History, Terminal};
use crate::quadrature::{LinearFn, thrice_int_lin_func, twice_int_lin_func};

use super::{LineState, TlineInstance};

const NEWTON_ITERATIONS: usize = 2;

/// Error of convolving a piecewise linear input over the newest interval, per unit
/// second derivative, for a kernel whose first weight at `h` is `d`.
fn interval_error_weight(d: f64, h: f64) -> f64 {
    // kernel held constant so that its once-integral averages d over [0, h]
    let k = LinearFn::through(0.0, 2.0 * d / h, h, 2.0 * d / h);
    (0.5 * h * twice_int_lin_func(0.0, h, 0.0, k) - thrice_int_lin_func(0.0, h, 0.0, 0.0, k)).abs()
}

/// Local truncation error of the convolution equations of both ports for a step `h`.
fn convolution_lte(kernels: &LineKernels, history: &History, h: f64) -> Option<f64> {
    let [d1, d2, d3] = kernels.first_weights(h).map(|d| interval_error_weight(d, h));
    let curvature = |q: Terminal| history.second_derivative(q).map(f64::abs);
    let (v1, v2) = (curvature(Terminal::V1)?, curvature(Terminal::V2)?);
    let (i1, i2) = (curvature(Terminal::I1)?, curvature(Terminal::I2)?);
    Some(v1 * d1 + v2 * d3 + i2 * d2 + v2 * d1 + v1 * d3 + i1 * d2)
}

/// Step at which `v + z0·i` at either port departs from its tangent by `fraction` of its peak.
fn slope_change_step(history: &History, z0: f64, fraction: f64) -> Option<f64> {
    let [a, b, c] = history.last_n::<3>()?;
    (1..=2)
        .filter_map(|port| {
            let w = [a, b, c].map(|s| s.incident(port, z0));
            let d1 = (w[1] - w[0]) / (b.time - a.time);
            let d2 = (w[2] - w[1]) / (c.time - b.time);
            let quad = (d2 - d1) / (c.time - a.time);
            let peak = w.iter().fold(0.0f64, |m, x| m.max(x.abs()));
            (quad != 0.0 && peak > 0.0).then(|| (fraction * peak / quad.abs()).sqrt())
        })
        .reduce(f64::min)
}

impl TlineInstance {
    /// Bound the next step. `step` and the result are in the integrator's normalised form,
    /// the `order`-th power of a step length.
    pub fn truncate(
        &self,
        ctx: &TimeContext,
        options: &ModelOptions,
        tol: &SimTolerances,
        step: f64,
    ) -> Result<f64, TlineError> {
        let (spec, state) = self.ready()?;
        let order = f64::from(ctx.order.max(1));
        let candidate = step.powf(1.0 / order);

        let mut bound = f64::INFINITY;
        // error-driven cut, always below the candidate when finite
        let mut cut = f64::INFINITY;
        if spec.delay > 0.0 {
            bound = bound.min(0.5 * spec.delay);
        }
        match state {
            LineState::Pade(_) if !spec.is_lossless() => {
                bound = bound.min(spec.delay * options.slope_tolerance);
            }
            LineState::Convolution(conv) if !options.trunc_dont_cut => {
                if let Some(safe) = conv.max_safe_step {
                    bound = bound.min(safe);
                }
                if let Some(cache) = &conv.cache
                    && let kernels @ LineKernels::Rc(_) = cache.borrow().kernels()
                {
                    cut = self.lte_cut(kernels, candidate, options, tol);
                }
            }
            _ => {}
        }
        if let Some(fraction) = options.slope_change
            && let Some(limit) = slope_change_step(&self.history, spec.z0, fraction)
        {
            bound = bound.min(limit);
        }

        // the floor only holds while it lies below the candidate
        let floor = 0.5 * ctx.delta;
        let mut result = candidate.min(bound.max(floor));
        if cut.is_finite() {
            result = result.min(if floor < candidate { cut.max(floor) } else { cut });
        }
        log::trace!(
            "{}: step bound {bound:e}, error cut {cut:e}, candidate {candidate:e} -> {result:e}",
            self.name
        );
        Ok(result.powf(order))
    }

    /// Shrink `candidate` until the convolution error estimate meets the tolerance.
    fn lte_cut(
        &self,
        kernels: &LineKernels,
        candidate: f64,
        options: &ModelOptions,
        tol: &SimTolerances,
    ) -> f64 {
        let Some(tail) = self.history.tail() else {
            return f64::INFINITY;
        };
        let limit = tol.trtol * (tol.reltol * (tail.i1.abs() + tail.i2.abs()) + tol.abstol);
        let lte = |h: f64| convolution_lte(kernels, &self.history, h).unwrap_or(0.0);
        if lte(candidate) <= limit {
            return f64::INFINITY;
        }
        if !options.trunc_newton {
            return 0.5 * candidate;
        }
        let mut h = candidate;
        for _ in 0..NEWTON_ITERATIONS {
            let dh = 0.01 * h;
            let slope = (lte(h + dh) - lte(h)) / dh;
            if slope > 0.0 {
                h -= (lte(h) - limit) / slope;
            }
            h = h.clamp(0.5 * candidate, 0.99 * candidate);
        }
        h
    }
}
