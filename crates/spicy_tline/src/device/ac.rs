use num_complex::Complex64;

use crate::engine::ComplexStamper;
use crate::error::TlineError;
use crate::line_spec::{LineSpec, Regime};
use crate::stamp::BranchRow;

use super::TlineInstance;
use super::load::dc_rows;

/// Characteristic admittance and propagation factor `exp(-γ·length)` at `omega`.
fn wave_parameters(spec: &LineSpec, omega: f64) -> (Complex64, Complex64) {
    let jw = Complex64::new(0.0, omega);
    let len = spec.length;
    match spec.regime {
        Regime::Lc => (
            Complex64::new(spec.y0(), 0.0),
            Complex64::from_polar(1.0, -omega * spec.delay),
        ),
        Regime::Rc => {
            let y = (jw * spec.c / spec.r).sqrt();
            let p = (-(jw * spec.r * spec.c).sqrt() * len).exp();
            (y, p)
        }
        Regime::Rg => {
            let y = (spec.g / spec.r).sqrt();
            let p = (-(spec.r * spec.g).sqrt() * len).exp();
            (Complex64::new(y, 0.0), Complex64::new(p, 0.0))
        }
        Regime::Rlc | Regime::Rl => {
            let z = spec.r + jw * spec.l;
            let y = spec.g + jw * spec.c;
            ((y / z).sqrt(), (-(z * y).sqrt() * len).exp())
        }
    }
}

fn complex_rows(rows: [BranchRow<f64>; 2]) -> [BranchRow<Complex64>; 2] {
    rows.map(|r| BranchRow {
        v: r.v.map(Complex64::from),
        i: r.i.map(Complex64::from),
        rhs: Complex64::from(r.rhs),
    })
}

/// Small-signal rows of a line at angular frequency `omega`.
pub(super) fn ac_rows(spec: &LineSpec, omega: f64) -> [BranchRow<Complex64>; 2] {
    if omega == 0.0 && spec.g == 0.0 {
        return complex_rows(dc_rows(spec));
    }
    if spec.regime == Regime::Rl {
        let z = Complex64::new(spec.r, omega * spec.l) * spec.length;
        let one = Complex64::new(1.0, 0.0);
        let zero = Complex64::new(0.0, 0.0);
        return [
            BranchRow {
                v: [one, -one],
                i: [-z, zero],
                rhs: zero,
            },
            BranchRow {
                v: [zero, zero],
                i: [one, one],
                rhs: zero,
            },
        ];
    }
    let (yc, p) = wave_parameters(spec, omega);
    // Yc·v_p - P·Yc·v_o - P·i_o - i_p = 0
    let mut rows = [BranchRow::default(); 2];
    for (port, row) in rows.iter_mut().enumerate() {
        row.v[port] = yc;
        row.v[1 - port] = -p * yc;
        row.i[port] = Complex64::new(-1.0, 0.0);
        row.i[1 - port] = -p;
    }
    rows
}

impl TlineInstance {
    pub fn ac_load<S: ComplexStamper>(&self, m: &mut S, omega: f64) -> Result<(), TlineError> {
        let (spec, _) = self.ready()?;
        self.stamp.stamp_incidence_complex(m);
        for (port, row) in ac_rows(spec, omega).iter().enumerate() {
            self.stamp.stamp_row_complex(m, port, row);
        }
        Ok(())
    }
}
