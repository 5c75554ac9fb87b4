//! Closed-form impulse responses of lossy lines.
//!
//! Every kernel is consumed as a per-interval weight `D = (1/h) ∫_interval K1(τ) dτ`, where
//! `K1` is the once-integrated kernel. For RLC lines `h1'` has a closed-form `K1` and `h2`,
//! `h3'` are integrated piecewise linearly from their values; RC kernels have closed-form
//! twice integrals.

use std::f64::consts::PI;

use crate::config::Tolerance;
use crate::line_spec::{LineSpec, Regime};
use crate::quadrature::{LinearFn, int_lin_func, straight_line_check, twice_int_lin_func};
use crate::special::{erfc, i0_scaled, i1_over_x_scaled};

const SAFE_STEP_ITERATIONS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kernel {
    H1,
    H2,
    H3,
}

impl Kernel {
    pub const ALL: [Kernel; 3] = [Kernel::H1, Kernel::H2, Kernel::H3];

    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RlcKernels {
    pub delay: f64,
    alpha: f64,
    beta: f64,
    pub attenuation: f64,
}

impl RlcKernels {
    pub fn new(spec: &LineSpec) -> Self {
        let alpha = 0.5 * spec.r / spec.l;
        let beta = alpha;
        Self {
            delay: spec.delay,
            alpha,
            beta,
            attenuation: (-beta * spec.delay).exp(),
        }
    }

    /// `∫_0^τ h1'`; tends to -1.
    pub fn h1_once(&self, tau: f64) -> f64 {
        i0_scaled(self.alpha * tau) - 1.0
    }

    fn bessel_arg(&self, tau: f64) -> Option<f64> {
        (tau >= self.delay).then(|| self.alpha * (tau * tau - self.delay * self.delay).max(0.0).sqrt())
    }

    pub fn h2(&self, tau: f64) -> f64 {
        match self.bessel_arg(tau) {
            None => 0.0,
            Some(x) => {
                self.alpha * self.alpha * self.delay * (x - self.beta * tau).exp() * i1_over_x_scaled(x)
            }
        }
    }

    pub fn h3(&self, tau: f64) -> f64 {
        match self.bessel_arg(tau) {
            None => 0.0,
            Some(x) => {
                self.alpha
                    * (x - self.beta * tau).exp()
                    * (self.alpha * tau * i1_over_x_scaled(x) - i0_scaled(x))
            }
        }
    }

    fn value(&self, kernel: Kernel, tau: f64) -> f64 {
        match kernel {
            Kernel::H1 => unreachable!("h1' is integrated in closed form"),
            Kernel::H2 => self.h2(tau),
            Kernel::H3 => self.h3(tau),
        }
    }

    /// Largest step past the delay over which `h2` and `h3'` stay close to straight lines.
    pub fn max_safe_step(&self, tol: &Tolerance) -> f64 {
        let t = self.delay;
        let linear = |x: f64| {
            let mid = 0.5 * (t + x);
            [Kernel::H2, Kernel::H3].into_iter().all(|k| {
                straight_line_check(
                    (t, self.value(k, t)),
                    (mid, self.value(k, mid)),
                    (x, self.value(k, x)),
                    tol,
                )
            })
        };

        let (mut small, mut big) = (t, 10.0 * t);
        if linear(big) {
            return big - t;
        }
        for _ in 0..SAFE_STEP_ITERATIONS {
            let mid = 0.5 * (small + big);
            if linear(mid) {
                small = mid;
            } else {
                big = mid;
            }
        }
        small - t
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RcKernels {
    cbyr: f64,
    /// `R·C·length²`
    rclsqr: f64,
}

impl RcKernels {
    pub fn new(spec: &LineSpec) -> Self {
        Self {
            cbyr: spec.c / spec.r,
            rclsqr: spec.r * spec.c * spec.length * spec.length,
        }
    }

    pub fn h1_twice(&self, t: f64) -> f64 {
        if t <= 0.0 {
            return 0.0;
        }
        (4.0 * self.cbyr * t / PI).sqrt()
    }

    pub fn h2_twice(&self, t: f64) -> f64 {
        if t <= 0.0 {
            return 0.0;
        }
        let a = self.rclsqr;
        let arg = a.sqrt() / (2.0 * t.sqrt());
        (t + a / 2.0) * erfc(arg) - (a * t / PI).sqrt() * (-a / (4.0 * t)).exp()
    }

    pub fn h3_twice(&self, t: f64) -> f64 {
        if t <= 0.0 {
            return 0.0;
        }
        let a = self.rclsqr;
        let arg = a.sqrt() / (2.0 * t.sqrt());
        self.cbyr.sqrt() * (2.0 * (t / PI).sqrt() * (-a / (4.0 * t)).exp() - a.sqrt() * erfc(arg))
    }

    fn twice(&self, kernel: Kernel, t: f64) -> f64 {
        match kernel {
            Kernel::H1 => self.h1_twice(t),
            Kernel::H2 => self.h2_twice(t),
            Kernel::H3 => self.h3_twice(t),
        }
    }
}

/// Kernels of one lossy line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineKernels {
    Rlc(RlcKernels),
    Rc(RcKernels),
}

impl LineKernels {
    /// `None` for regimes that need no convolution.
    pub fn for_spec(spec: &LineSpec) -> Option<Self> {
        match spec.regime {
            Regime::Rlc => Some(LineKernels::Rlc(RlcKernels::new(spec))),
            Regime::Rc => Some(LineKernels::Rc(RcKernels::new(spec))),
            Regime::Lc | Regime::Rg | Regime::Rl => None,
        }
    }

    pub fn delay(&self) -> f64 {
        match self {
            LineKernels::Rlc(k) => k.delay,
            LineKernels::Rc(_) => 0.0,
        }
    }

    /// `∫_0^∞` of each kernel, the weight of the value held before the first sample.
    pub fn totals(&self) -> [f64; 3] {
        match self {
            LineKernels::Rlc(k) => [-1.0, 1.0 - k.attenuation, -k.attenuation],
            LineKernels::Rc(_) => [0.0, 1.0, 0.0],
        }
    }

    /// Per-interval weights for ascending elapsed times `taus` (`taus[0] == 0`); entry `m` of
    /// each output covers `[taus[m], taus[m + 1]]`.
    pub fn interval_weights(&self, taus: &[f64], out: &mut [Vec<f64>; 3]) {
        for o in out.iter_mut() {
            o.clear();
        }
        match self {
            LineKernels::Rc(k) => {
                for kernel in Kernel::ALL {
                    let o = &mut out[kernel.index()];
                    o.extend(taus.windows(2).map(|w| {
                        (k.twice(kernel, w[1]) - k.twice(kernel, w[0])) / (w[1] - w[0])
                    }));
                }
            }
            LineKernels::Rlc(k) => {
                out[Kernel::H1.index()].extend(taus.windows(2).map(|w| {
                    let (a, b) = (w[0], w[1]);
                    let f = LinearFn::through(a, k.h1_once(a), b, k.h1_once(b));
                    int_lin_func(a, b, f) / (b - a)
                }));
                for kernel in [Kernel::H2, Kernel::H3] {
                    let o = &mut out[kernel.index()];
                    let mut once = 0.0;
                    for w in taus.windows(2) {
                        let (a, b) = (w[0], w[1]);
                        if b <= k.delay {
                            o.push(0.0);
                            continue;
                        }
                        // kernel is zero before the delay
                        let lo = a.max(k.delay);
                        let f = LinearFn::through(lo, k.value(kernel, lo), b, k.value(kernel, b));
                        let area = once * (b - a) + twice_int_lin_func(lo, b, lo, f);
                        o.push(area / (b - a));
                        once += int_lin_func(lo, b, f);
                    }
                }
            }
        }
    }

    /// Weights of a single interval `[0, h]`, i.e. the first coefficients for a step of `h`.
    pub fn first_weights(&self, h: f64) -> [f64; 3] {
        let mut out: [Vec<f64>; 3] = Default::default();
        self.interval_weights(&[0.0, h], &mut out);
        [out[0][0], out[1][0], out[2][0]]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line_spec::LineParams;
    use approx::assert_relative_eq;

    fn spec(r: f64, l: f64, c: f64) -> LineSpec {
        LineSpec::resolve(&LineParams {
            resistance: r,
            inductance: l,
            capacitance: c,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn rlc_kernels_vanish_before_delay() {
        let k = RlcKernels::new(&spec(50.0, 1e-7, 1e-10));
        assert_eq!(k.h2(0.5 * k.delay), 0.0);
        assert_eq!(k.h3(0.99 * k.delay), 0.0);
        assert!(k.h2(k.delay) > 0.0);
    }

    #[test]
    fn rlc_h1_integral_tends_to_minus_one() {
        let k = RlcKernels::new(&spec(50.0, 1e-7, 1e-10));
        assert_eq!(k.h1_once(0.0), 0.0);
        assert!(k.h1_once(1e-3) > -1.0);
        assert_relative_eq!(k.h1_once(1e-3), -1.0, epsilon = 1e-2);
    }

    #[test]
    fn rlc_weights_match_direct_quadrature() {
        let s = spec(50.0, 1e-7, 1e-10);
        let k = RlcKernels::new(&s);
        let kernels = LineKernels::Rlc(k);
        let taus: Vec<f64> = (0..=1000).map(|i| i as f64 * 0.05e-9).collect();
        let mut out: [Vec<f64>; 3] = Default::default();
        kernels.interval_weights(&taus, &mut out);

        // midpoint rule for ∫_T^τ h(u) du, then averaged over the last interval
        let once = |h: &dyn Fn(f64) -> f64, tau: f64| {
            let n = 20_000;
            let du = (tau - k.delay) / n as f64;
            (0..n).map(|i| h(k.delay + (i as f64 + 0.5) * du)).sum::<f64>() * du
        };
        let (a, b) = (taus[999], taus[1000]);
        let h2 = |u: f64| k.h2(u);
        let h3 = |u: f64| k.h3(u);
        let reference2 = 0.5 * (once(&h2, a) + once(&h2, b));
        let reference3 = 0.5 * (once(&h3, a) + once(&h3, b));
        assert_relative_eq!(out[1][999], reference2, max_relative = 1e-3);
        assert_relative_eq!(out[2][999], reference3, max_relative = 1e-3);

        // the once-integrals head toward the totals
        let totals = kernels.totals();
        assert!(out[1][999] > 0.0 && out[1][999] < totals[1]);
        assert!(out[2][999] < 0.0 && out[2][999] > totals[2]);
    }

    #[test]
    fn rc_twice_integrals_grow_like_total() {
        let k = RcKernels::new(&spec(100.0, 0.0, 1e-10));
        // the once-integral of h2 is erfc(sqrt(R·C·len² / 4t)), approaching one
        let a: f64 = 100.0 * 1e-10;
        let (t1, t2): (f64, f64) = (1e-3, 2e-3);
        let slope = (k.h2_twice(t2) - k.h2_twice(t1)) / (t2 - t1);
        let mid = 0.5 * (t1 + t2);
        assert_relative_eq!(slope, erfc((a / (4.0 * mid)).sqrt()), max_relative = 1e-4);
        assert!(slope < 1.0);
        let (t1, t2): (f64, f64) = (1.0, 2.0);
        assert_relative_eq!(
            (k.h2_twice(t2) - k.h2_twice(t1)) / (t2 - t1),
            1.0,
            max_relative = 1e-4
        );
        assert_eq!(k.h1_twice(0.0), 0.0);
        assert!(k.h3_twice(1e-12).abs() < 1e-12);
    }

    #[test]
    fn first_weights_of_rc_line() {
        let s = spec(100.0, 0.0, 1e-10);
        let kernels = LineKernels::Rc(RcKernels::new(&s));
        let h = 1e-9;
        let w = kernels.first_weights(h);
        assert_relative_eq!(w[0], (4.0 * 1e-12 * h / PI).sqrt() / h, max_relative = 1e-12);
    }

    #[test]
    fn safe_step_shrinks_with_loss() {
        let tol = Tolerance::new(1e-3, 1e-12);
        let mild = RlcKernels::new(&spec(10.0, 1e-7, 1e-10));
        let heavy = RlcKernels::new(&spec(200.0, 1e-7, 1e-10));
        let a = mild.max_safe_step(&tol);
        let b = heavy.max_safe_step(&tol);
        assert!(a > b && b > 0.0);
        assert!(a < 9.0 * mild.delay);
    }
}
