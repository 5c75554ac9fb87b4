//! Maclaurin series in `z = (R/L) / s` used by the Padé fits.

/// Number of series coefficients a [3/3] fit consumes.
pub const TERMS: usize = 6;

/// Series of `sqrt((1 + a z) / (1 + b z))`.
pub fn admittance_series(a: f64, b: f64) -> [f64; TERMS] {
    let mut c = [0.0; TERMS];
    c[0] = 1.0;
    c[1] = 0.5 * (a - b);
    for n in 1..TERMS - 1 {
        let nf = n as f64;
        c[n + 1] = ((0.5 * (a - b) - (a + b) * nf) * c[n] - a * b * (nf - 1.0) * c[n - 1]) / (nf + 1.0);
    }
    c
}

/// Series of `sqrt((1 + z) (1 + a z))`, one term longer than the fit needs because the
/// propagation exponent drops its constant and linear parts.
pub fn propagation_series(a: f64) -> [f64; TERMS + 1] {
    let mut f = [0.0; TERMS + 1];
    f[0] = 1.0;
    f[1] = 0.5 * (1.0 + a);
    for n in 1..TERMS {
        let nf = n as f64;
        f[n + 1] = ((1.0 + a) * (0.5 - nf) * f[n] + a * (2.0 - nf) * f[n - 1]) / (nf + 1.0);
    }
    f
}

/// Series of `exp(w(z))` for a series `w` with `w[0] == 0`.
pub fn exp_series(w: &[f64; TERMS]) -> [f64; TERMS] {
    let mut e = [0.0; TERMS];
    e[0] = 1.0;
    for n in 0..TERMS - 1 {
        let sum: f64 = (0..=n).map(|j| (j + 1) as f64 * w[j + 1] * e[n - j]).sum();
        e[n + 1] = sum / (n + 1) as f64;
    }
    e
}
