//! Repeated integrals of a linear function and the straight-line test.
//!
//! The linear function is given by two points `(t1, v1)` and `(t2, v2)`; it is extended
//! beyond them. When `t1 == t2` the function is taken as the constant `v1`.

use crate::config::Tolerance;

#[derive(Debug, Clone, Copy)]
pub struct LinearFn {
    t1: f64,
    v1: f64,
    slope: f64,
}

impl LinearFn {
    pub fn through(t1: f64, v1: f64, t2: f64, v2: f64) -> Self {
        let slope = if t2 != t1 { (v2 - v1) / (t2 - t1) } else { 0.0 };
        Self { t1, v1, slope }
    }

    // antiderivatives anchored at t1
    fn f1(&self, t: f64) -> f64 {
        let d = t - self.t1;
        self.v1 * d + self.slope * d * d / 2.0
    }

    fn f2(&self, t: f64) -> f64 {
        let d = t - self.t1;
        self.v1 * d * d / 2.0 + self.slope * d * d * d / 6.0
    }

    fn f3(&self, t: f64) -> f64 {
        let d = t - self.t1;
        self.v1 * d * d * d / 6.0 + self.slope * d * d * d * d / 24.0
    }
}

/// `∫_lo^hi f(u) du`
pub fn int_lin_func(lo: f64, hi: f64, f: LinearFn) -> f64 {
    f.f1(hi) - f.f1(lo)
}

/// `∫_lo^hi ∫_base^u f(w) dw du`
pub fn twice_int_lin_func(lo: f64, hi: f64, base: f64, f: LinearFn) -> f64 {
    f.f2(hi) - f.f2(lo) - f.f1(base) * (hi - lo)
}

/// `∫_lo^hi ∫_base2^u ∫_base3^w f(s) ds dw du`
pub fn thrice_int_lin_func(lo: f64, hi: f64, base2: f64, base3: f64, f: LinearFn) -> f64 {
    let offset = f.f1(base3);
    f.f3(hi) - f.f3(lo)
        - f.f2(base2) * (hi - lo)
        - offset * ((hi - base2).powi(2) - (lo - base2).powi(2)) / 2.0
}

/// True when `(t2, x2)` lies close enough to the chord from `(t1, x1)` to `(t3, x3)`.
///
/// The area of the triangle spanned by the three points is compared against the area
/// under the chord.
pub fn straight_line_check(
    (t1, x1): (f64, f64),
    (t2, x2): (f64, f64),
    (t3, x3): (f64, f64),
    tol: &Tolerance,
) -> bool {
    let triangle = 0.5 * ((t2 - t1) * (x3 - x1) - (t3 - t1) * (x2 - x1)).abs();
    let under_chord = 0.5 * (x1.abs() + x3.abs()) * (t3 - t1).abs();
    triangle <= tol.rel * under_chord + tol.abs
}
