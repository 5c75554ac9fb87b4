//! Third-order Padé fits of the line admittance and propagation operators.
//!
//! With `r = R/L`, `g = G/C` and the normalised frequency `z = r / s`, the characteristic
//! admittance is `Y0 · sqrt((1 + a z) / (1 + z))` with `a = g / r`, and the propagation
//! operator is `exp(-s τ) · A · E(z)` where `A` is the high-frequency attenuation and `E`
//! carries the dispersion. Both `Y/Y0` and `E` are fitted with a [3/3] rational function that
//! matches six series coefficients at `z = 0` and the exact DC value at `z = ∞`; the
//! partial fractions of the fits become the `h1` (admittance) and `h2` (propagation) kernels,
//! and their product gives the six `h3` terms.

pub mod recursion;
pub mod roots;
pub mod series;

use ndarray::{Array1, array};
use num_complex::Complex64;

use crate::error::TlineError;
use crate::line_spec::{LineSpec, Regime};
use crate::linalg::gauss_solve;
use roots::{cubic_roots, residue};
use series::{TERMS, admittance_series, exp_series, propagation_series};

const PIVOT_TOL: f64 = 1e-30;

/// Series whose higher coefficients are all below this are fitted exactly by a constant.
const FLAT_SERIES: f64 = 1e-14;

/// One `coef · exp(pole · t)` kernel term.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PadeTerm {
    pub coef: Complex64,
    pub pole: Complex64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PadeModel {
    /// Undelayed admittance kernel, scaled by `Y0`.
    pub h1: Vec<PadeTerm>,
    /// Delayed propagation kernel, scaled by the attenuation.
    pub h2: Vec<PadeTerm>,
    /// Delayed admittance-propagation kernel, scaled by `Y0` and the attenuation.
    pub h3: Vec<PadeTerm>,
    pub y0: f64,
    pub attenuation: f64,
    pub delay: f64,
    pub complex_h1: bool,
    pub complex_h2: bool,
}

/// Partial fractions of one fit, in units of `s`.
struct Fit {
    terms: Vec<PadeTerm>,
    complex_pair: bool,
}

impl PadeModel {
    pub fn build(spec: &LineSpec) -> Result<Self, TlineError> {
        debug_assert_eq!(spec.regime, Regime::Rlc);
        let r = spec.r / spec.l;
        let a = (spec.g / spec.c) / r;
        let kappa = spec.delay * r;

        let admittance = fit(&admittance_series(a, 1.0), a.sqrt(), r)?;

        let f = propagation_series(a);
        let mut w = [0.0; TERMS];
        for k in 1..TERMS {
            w[k] = -kappa * f[k + 1];
        }
        let dispersion_dc = (kappa * (1.0 - a.sqrt()).powi(2) / 2.0).exp();
        let propagation = fit(&exp_series(&w), dispersion_dc, r)?;
        let attenuation = (-kappa * (1.0 + a) / 2.0).exp();

        let mut h1 = admittance.terms;
        let h2 = propagation.terms;
        if spec.g == 0.0 {
            match dc_correction(spec, &h1, &h2, attenuation) {
                Some(mu) => {
                    log::debug!("pade admittance poles rescaled by {mu:.4} to match R*len at DC");
                    for t in &mut h1 {
                        t.coef *= mu;
                        t.pole *= mu;
                    }
                }
                None => log::warn!("pade DC correction skipped; DC resistance is approximate"),
            }
        }

        let h3 = combine(&h1, &h2);
        let y0 = spec.y0();
        for t in [&h1, &h2, &h3].into_iter().flatten() {
            if t.pole.re >= 0.0 {
                return Err(TlineError::UnstablePole { pole: t.pole });
            }
        }

        let scale = |terms: Vec<PadeTerm>, k: f64| -> Vec<PadeTerm> {
            terms
                .into_iter()
                .map(|t| PadeTerm {
                    coef: t.coef * k,
                    pole: t.pole,
                })
                .collect()
        };

        let model = Self {
            h1: scale(h1, y0),
            h2: scale(h2, attenuation),
            h3: scale(h3, y0 * attenuation),
            y0,
            attenuation,
            delay: spec.delay,
            complex_h1: admittance.complex_pair,
            complex_h2: propagation.complex_pair,
        };
        log::debug!(
            "pade model: attenuation={:.4e}, h1 poles={:?}, h2 poles={:?}",
            model.attenuation,
            model.h1.iter().map(|t| t.pole).collect::<Vec<_>>(),
            model.h2.iter().map(|t| t.pole).collect::<Vec<_>>()
        );
        Ok(model)
    }

    /// Value of `Y(s)/Y0` implied by the fitted `h1` terms.
    pub fn admittance_ratio(&self, s: Complex64) -> Complex64 {
        1.0 + self.h1.iter().map(|t| t.coef / (s - t.pole)).sum::<Complex64>() / self.y0
    }

    /// Value of `exp(s τ) · P(s)` implied by the fitted `h2` terms.
    pub fn undelayed_propagation(&self, s: Complex64) -> Complex64 {
        self.attenuation + self.h2.iter().map(|t| t.coef / (s - t.pole)).sum::<Complex64>()
    }
}

/// Fit `Σ c_k z^k` (with `c_0 = 1`) and its value `dc` at `z = ∞`, then expand into
/// `1 + Σ coef / (s - pole)` with poles scaled back from `z` to `s` by `r`.
fn fit(c: &[f64; TERMS], dc: f64, r: f64) -> Result<Fit, TlineError> {
    let scale = c.iter().fold(0.0f64, |m, v| m.max(v.abs()));
    if c[1..].iter().all(|v| v.abs() <= FLAT_SERIES * scale) && (c[0] - dc).abs() <= FLAT_SERIES {
        return Ok(Fit {
            terms: Vec::new(),
            complex_pair: false,
        });
    }

    let m = array![
        [c[2], c[1], c[0] - dc],
        [c[3], c[2], c[1]],
        [c[4], c[3], c[2]],
    ];
    let rhs: Array1<f64> = array![-c[3], -c[4], -c[5]];
    let q = gauss_solve(m, rhs, PIVOT_TOL)
        .map_err(|e| TlineError::SingularPadeSystem { pivot: e.pivot })?;
    let (q1, q2, q3) = (q[0], q[1], q[2]);
    let p1 = c[1] + q1 * c[0];
    let p2 = c[2] + q1 * c[1] + q2 * c[0];
    let p3 = dc * q3;

    let den = [q1, q2, q3];
    let num = [p1 - q1, p2 - q2, p3 - q3];
    let found = cubic_roots(q1, q2, q3);
    let mut terms = Vec::with_capacity(3);
    for x in found.roots {
        let res = residue(num, den, x).ok_or(TlineError::SingularPadeSystem { pivot: 0.0 })?;
        terms.push(PadeTerm {
            coef: res * r,
            pole: x * r,
        });
    }
    Ok(Fit {
        terms,
        complex_pair: found.complex_pair,
    })
}

/// Pole scaling that makes the DC series resistance implied by the two fits equal `R·len`.
///
/// With G = 0 both ports see `Y(0) = 0` and `P(0) = 1`, so DC is governed by the slopes of
/// the fits at `s = 0`: `R_dc = -P'(0) / Y'(0)`. Scaling every admittance pole and residue by
/// `mu` keeps `Y(0)` and `Y(∞)` and divides `Y'(0)` by `mu`.
fn dc_correction(spec: &LineSpec, h1: &[PadeTerm], h2: &[PadeTerm], attenuation: f64) -> Option<f64> {
    if h1.is_empty() {
        return None;
    }
    let slope_y: f64 = h1.iter().map(|t| -(t.coef / (t.pole * t.pole)).re).sum::<f64>() * spec.y0();
    let e0: f64 = 1.0 - h2.iter().map(|t| (t.coef / t.pole).re).sum::<f64>();
    let slope_e: f64 = -h2.iter().map(|t| (t.coef / (t.pole * t.pole)).re).sum::<f64>();
    let slope_p = attenuation * (-spec.delay * e0 + slope_e);
    let implied = -slope_p / slope_y;
    let mu = spec.r * spec.length / implied;
    (mu.is_finite() && mu > 0.0).then_some(mu)
}

/// Partial fractions of `(1 + Σ a/(s-x)) (1 + Σ b/(s-y)) - 1`.
fn combine(h1: &[PadeTerm], h2: &[PadeTerm]) -> Vec<PadeTerm> {
    let mut out = Vec::with_capacity(h1.len() + h2.len());
    for a in h1 {
        let cross: Complex64 = h2.iter().map(|b| b.coef / (a.pole - b.pole)).sum();
        out.push(PadeTerm {
            coef: a.coef * (1.0 + cross),
            pole: a.pole,
        });
    }
    for b in h2 {
        let cross: Complex64 = h1.iter().map(|a| a.coef / (b.pole - a.pole)).sum();
        out.push(PadeTerm {
            coef: b.coef * (1.0 + cross),
            pole: b.pole,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line_spec::LineParams;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn line(r: f64, l: f64, g: f64, c: f64) -> LineSpec {
        LineSpec::resolve(&LineParams {
            resistance: r,
            inductance: l,
            conductance: g,
            capacitance: c,
            ..Default::default()
        })
        .unwrap()
    }

    fn exact_ratio(spec: &LineSpec, s: Complex64) -> Complex64 {
        ((s * spec.c + spec.g) / (s * spec.l + spec.r)).sqrt() / spec.y0()
    }

    #[rstest]
    #[case(10.0, 0.0)]
    #[case(50.0, 0.0)]
    #[case(100.0, 1e-3)]
    fn fits_are_exact_at_dc_and_stable(#[case] r: f64, #[case] g: f64) {
        let spec = line(r, 1e-7, g, 1e-10);
        let model = PadeModel::build(&spec).unwrap();
        assert_eq!(model.h1.len(), 3);
        assert_eq!(model.h2.len(), 3);
        assert_eq!(model.h3.len(), 6);
        for t in model.h1.iter().chain(&model.h2).chain(&model.h3) {
            assert!(t.pole.re < 0.0);
        }
        let zero = Complex64::new(0.0, 0.0);
        let y_dc = exact_ratio(&spec, zero);
        assert_relative_eq!(model.admittance_ratio(zero).re, y_dc.re, epsilon = 1e-9);
        let p_dc = (-spec.length * (spec.r * spec.g).sqrt()).exp();
        assert_relative_eq!(model.undelayed_propagation(zero).re, p_dc, epsilon = 1e-9);
    }

    #[test]
    fn admittance_fit_tracks_exact_response() {
        let spec = line(50.0, 1e-7, 0.0, 1e-10);
        let model = PadeModel::build(&spec).unwrap();
        // below ωL ≈ R the exact ratio follows sqrt(sC/R), which a [3/3] fit cannot track
        let corner = spec.r / (2.0 * std::f64::consts::PI * spec.l);
        for f in [1.25, 2.0, 10.0, 100.0].map(|k| k * corner) {
            let s = Complex64::new(0.0, 2.0 * std::f64::consts::PI * f);
            let fitted = model.admittance_ratio(s);
            let exact = exact_ratio(&spec, s);
            assert!((fitted - exact).norm() < 0.1 * exact.norm(), "f={f}");
        }
    }

    #[test]
    fn dc_resistance_matches_line_resistance() {
        let spec = line(50.0, 1e-7, 0.0, 1e-10);
        let model = PadeModel::build(&spec).unwrap();
        let slope_y: f64 = model.h1.iter().map(|t| -(t.coef / (t.pole * t.pole)).re).sum();
        let e0 = model.undelayed_propagation(Complex64::new(0.0, 0.0)).re;
        let slope_e: f64 = -model.h2.iter().map(|t| (t.coef / (t.pole * t.pole)).re).sum::<f64>();
        let slope_p = -spec.delay * e0 + slope_e;
        assert_relative_eq!(-slope_p / slope_y, spec.r * spec.length, max_relative = 1e-9);
    }

    #[test]
    fn distortionless_line_has_no_terms() {
        // R/L == G/C
        let spec = line(10.0, 1e-7, 1e-2, 1e-10);
        let model = PadeModel::build(&spec).unwrap();
        assert!(model.h1.is_empty() && model.h2.is_empty() && model.h3.is_empty());
        assert_relative_eq!(model.attenuation, (-spec.length * (spec.r * spec.g).sqrt()).exp());
    }

    #[test]
    fn heavy_loss_complex_pair_is_flagged() {
        let spec = line(700.0, 1e-7, 0.0, 1e-10);
        match PadeModel::build(&spec) {
            Ok(model) => assert!(model.complex_h1 || model.complex_h2),
            Err(e) => assert!(matches!(e, TlineError::UnstablePole { .. })),
        }
    }

    #[test]
    fn very_long_line_is_a_numerical_setup_error() {
        let spec = line(2000.0, 1e-7, 0.0, 1e-10);
        let err = PadeModel::build(&spec).unwrap_err();
        assert!(!err.is_configuration());
    }

    #[test]
    fn combined_terms_are_the_product() {
        let spec = line(30.0, 1e-7, 0.0, 1e-10);
        let model = PadeModel::build(&spec).unwrap();
        let s = Complex64::new(2e7, 3e7);
        let y = model.admittance_ratio(s);
        let p = model.undelayed_propagation(s);
        let h3: Complex64 = model.h3.iter().map(|t| t.coef / (s - t.pole)).sum();
        // Y0 * A * [(Y/Y0)(P/A) - 1] == Σ h3
        let product = model.y0 * (y * p - model.attenuation);
        assert_relative_eq!(h3.re, product.re, max_relative = 1e-9);
        assert_relative_eq!(h3.im, product.im, max_relative = 1e-9);
    }
}
