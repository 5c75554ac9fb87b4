//! Roots of the monic Padé denominator and partial-fraction residues.

use std::f64::consts::PI;

use num_complex::Complex64;

const NEWTON_ITERATIONS: usize = 32;

/// Roots of `x^3 + b x^2 + c x + d`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubicRoots {
    pub roots: [Complex64; 3],
    /// One real root and a complex-conjugate pair.
    pub complex_pair: bool,
}

pub fn cubic_roots(b: f64, c: f64, d: f64) -> CubicRoots {
    // depressed cubic y^3 + p y + q with x = y - b/3
    let shift = -b / 3.0;
    let p = c - b * b / 3.0;
    let q = 2.0 * b * b * b / 27.0 - b * c / 3.0 + d;
    let disc = (q / 2.0).powi(2) + (p / 3.0).powi(3);

    let (roots, complex_pair) = if disc < 0.0 {
        // three real roots, trigonometric form (p < 0 here)
        let r = (-p / 3.0).sqrt();
        let phi = (-q / (2.0 * r * r * r)).clamp(-1.0, 1.0).acos();
        let root = |k: f64| Complex64::new(2.0 * r * ((phi + 2.0 * PI * k) / 3.0).cos() + shift, 0.0);
        ([root(0.0), root(1.0), root(2.0)], false)
    } else {
        let sd = disc.sqrt();
        let u = (-q / 2.0 + sd).cbrt();
        let v = (-q / 2.0 - sd).cbrt();
        let re = -(u + v) / 2.0 + shift;
        let im = (u - v) * 3f64.sqrt() / 2.0;
        (
            [
                Complex64::new(u + v + shift, 0.0),
                Complex64::new(re, im),
                Complex64::new(re, -im),
            ],
            im != 0.0,
        )
    };

    let poly = |x: Complex64| ((x + b) * x + c) * x + d;
    let deriv = |x: Complex64| (3.0 * x + 2.0 * b) * x + c;
    let polish = |mut x: Complex64| {
        for _ in 0..NEWTON_ITERATIONS {
            let dp = deriv(x);
            if dp.norm() == 0.0 {
                break;
            }
            let step = poly(x) / dp;
            x -= step;
            if step.norm() <= f64::EPSILON * x.norm() {
                break;
            }
        }
        x
    };

    let mut roots = roots.map(polish);
    if complex_pair {
        // keep the pair exactly conjugate after polishing
        roots[2] = roots[1].conj();
    }
    CubicRoots {
        roots,
        complex_pair,
    }
}

/// Residue of `num(x) / den(x)` at a simple root `x` of the monic cubic `den`.
///
/// `num` holds the quadratic numerator `[n2, n1, n0]`, `den` holds `[b, c, d]`.
/// Returns `None` when the root is not simple.
pub fn residue(num: [f64; 3], den: [f64; 3], x: Complex64) -> Option<Complex64> {
    let n = (num[0] * x + num[1]) * x + num[2];
    let dp = (3.0 * x + 2.0 * den[0]) * x + den[1];
    if dp.norm() <= f64::EPSILON * (1.0 + n.norm()) {
        return None;
    }
    let r = n / dp;
    if r.re.is_finite() && r.im.is_finite() {
        Some(r)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn expand(roots: [f64; 3]) -> (f64, f64, f64) {
        let [r1, r2, r3] = roots;
        (
            -(r1 + r2 + r3),
            r1 * r2 + r1 * r3 + r2 * r3,
            -(r1 * r2 * r3),
        )
    }

    #[test]
    fn three_real_roots() {
        let (b, c, d) = expand([-1.0, -2.5, -7.0]);
        let found = cubic_roots(b, c, d);
        assert!(!found.complex_pair);
        let mut re: Vec<f64> = found.roots.iter().map(|r| r.re).collect();
        re.sort_by(f64::total_cmp);
        assert_relative_eq!(re[0], -7.0, epsilon = 1e-12);
        assert_relative_eq!(re[1], -2.5, epsilon = 1e-12);
        assert_relative_eq!(re[2], -1.0, epsilon = 1e-12);
    }

    #[test]
    fn complex_pair() {
        // (x + 2)(x^2 + 2x + 5): roots -2, -1 ± 2i
        let found = cubic_roots(4.0, 9.0, 10.0);
        assert!(found.complex_pair);
        assert_relative_eq!(found.roots[0].re, -2.0, epsilon = 1e-12);
        assert_relative_eq!(found.roots[1].re, -1.0, epsilon = 1e-12);
        assert_relative_eq!(found.roots[1].im.abs(), 2.0, epsilon = 1e-12);
        assert_eq!(found.roots[2], found.roots[1].conj());
    }

    #[test]
    fn residues_reconstruct_partial_fractions() {
        // (x^2 + 3) / ((x + 1)(x + 2)(x + 3))
        let (b, c, d) = expand([-1.0, -2.0, -3.0]);
        let num = [1.0, 0.0, 3.0];
        let found = cubic_roots(b, c, d);
        let x = Complex64::new(0.7, 0.0);
        let direct = (x * x + 3.0) / ((x + 1.0) * (x + 2.0) * (x + 3.0));
        let sum: Complex64 = found
            .roots
            .iter()
            .map(|r| residue(num, [b, c, d], *r).unwrap() / (x - r))
            .sum();
        assert_relative_eq!(sum.re, direct.re, epsilon = 1e-12);
    }

    #[test]
    fn repeated_root_has_no_residue() {
        // (x + 1)^2 (x + 2)
        let (b, c, d) = expand([-1.0, -1.0, -2.0]);
        assert!(residue([0.0, 1.0, 0.0], [b, c, d], Complex64::new(-1.0, 0.0)).is_none());
    }
}
