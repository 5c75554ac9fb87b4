use ndarray::{Array1, Array2, s};
use ndarray_linalg::{FactorizeInto, Solve};
use num_complex::Complex64;

use crate::engine::{ComplexStamper, Stamper};
use crate::error::TlineError;

/// Dense modified nodal analysis system. Handles are `row * dim + col`.
#[derive(Debug, Clone)]
pub struct DenseMatrix {
    dim: usize,
    m: Array2<f64>,
    s: Array1<f64>,
}

impl DenseMatrix {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            m: Array2::<f64>::zeros((dim, dim)),
            s: Array1::<f64>::zeros(dim),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn handle(&self, row: usize, col: usize) -> usize {
        row * self.dim + col
    }

    pub fn add_at(&mut self, row: usize, col: usize, value: f64) {
        self.m[[row, col]] += value;
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.m[[row, col]]
    }

    pub fn clear(&mut self) {
        self.m.fill(0.0);
        self.s.fill(0.0);
    }

    pub fn solve(&self) -> Result<Array1<f64>, TlineError> {
        let lu = self.m.clone().factorize_into()?;
        Ok(lu.solve(&self.s)?)
    }
}

impl Stamper for DenseMatrix {
    fn add(&mut self, handle: usize, value: f64) {
        self.m[[handle / self.dim, handle % self.dim]] += value;
    }

    fn add_rhs(&mut self, row: usize, value: f64) {
        self.s[row] += value;
    }
}

/// Complex small-signal system, solved through its real 2x2 block expansion.
#[derive(Debug, Clone)]
pub struct ComplexMatrix {
    dim: usize,
    ar: Array2<f64>,
    ai: Array2<f64>,
    br: Array1<f64>,
    bi: Array1<f64>,
}

impl ComplexMatrix {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            ar: Array2::<f64>::zeros((dim, dim)),
            ai: Array2::<f64>::zeros((dim, dim)),
            br: Array1::<f64>::zeros(dim),
            bi: Array1::<f64>::zeros(dim),
        }
    }

    pub fn add_at(&mut self, row: usize, col: usize, value: Complex64) {
        self.ar[[row, col]] += value.re;
        self.ai[[row, col]] += value.im;
    }

    /// `(A_r + jA_i)(x_r + jx_i) = b_r + jb_i` expands to
    ///
    /// ```text
    /// [A_r -A_i] [x_r]   [b_r]
    /// [A_i  A_r] [x_i] = [b_i]
    /// ```
    pub fn solve(&self) -> Result<Vec<Complex64>, TlineError> {
        let dim = self.dim;
        let mut m = Array2::<f64>::zeros((2 * dim, 2 * dim));
        m.slice_mut(s![0..dim, 0..dim]).assign(&self.ar);
        m.slice_mut(s![0..dim, dim..2 * dim]).assign(&(-&self.ai));
        m.slice_mut(s![dim..2 * dim, 0..dim]).assign(&self.ai);
        m.slice_mut(s![dim..2 * dim, dim..2 * dim]).assign(&self.ar);

        let mut b = Array1::<f64>::zeros(2 * dim);
        b.slice_mut(s![0..dim]).assign(&self.br);
        b.slice_mut(s![dim..2 * dim]).assign(&self.bi);

        let lu = m.factorize_into()?;
        let x = lu.solve(&b)?;
        Ok((0..dim)
            .map(|i| Complex64::new(x[i], x[dim + i]))
            .collect())
    }
}

impl ComplexStamper for ComplexMatrix {
    fn add_complex(&mut self, handle: usize, value: Complex64) {
        self.add_at(handle / self.dim, handle % self.dim, value);
    }

    fn add_rhs_complex(&mut self, row: usize, value: Complex64) {
        self.br[row] += value.re;
        self.bi[row] += value.im;
    }
}
