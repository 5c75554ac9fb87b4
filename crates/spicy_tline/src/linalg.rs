use ndarray::{Array1, Array2};

/// Elimination stopped because no candidate pivot exceeded the tolerance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SingularPivot {
    pub row: usize,
    pub pivot: f64,
}

/// Solve `a * x = b` in place by Gaussian elimination with partial pivoting.
pub fn gauss_solve(
    mut a: Array2<f64>,
    mut b: Array1<f64>,
    pivot_tol: f64,
) -> Result<Array1<f64>, SingularPivot> {
    let n = b.len();
    debug_assert_eq!(a.dim(), (n, n));

    for k in 0..n {
        let (p, pivot) = (k..n)
            .map(|i| (i, a[[i, k]]))
            .fold((k, 0.0f64), |best, (i, v)| {
                if v.abs() > best.1.abs() { (i, v) } else { best }
            });
        if pivot.abs() <= pivot_tol {
            return Err(SingularPivot { row: k, pivot });
        }
        if p != k {
            for j in 0..n {
                a.swap([k, j], [p, j]);
            }
            b.swap(k, p);
        }
        for i in k + 1..n {
            let factor = a[[i, k]] / a[[k, k]];
            if factor == 0.0 {
                continue;
            }
            for j in k..n {
                a[[i, j]] -= factor * a[[k, j]];
            }
            b[i] -= factor * b[k];
        }
    }

    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut acc = b[i];
        for j in i + 1..n {
            acc -= a[[i, j]] * x[j];
        }
        x[i] = acc / a[[i, i]];
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn needs_pivoting() {
        let a = array![[0.0, 2.0, 1.0], [1.0, 1.0, 0.0], [3.0, 0.0, 1.0]];
        let b = array![5.0, 3.0, 6.0];
        let x = gauss_solve(a, b, 1e-15).unwrap();
        // x = (1.25, 1.75, 2.25) solves all three rows
        assert_relative_eq!(x[0] + x[1], 3.0, epsilon = 1e-12);
        assert_relative_eq!(2.0 * x[1] + x[2], 5.0, epsilon = 1e-12);
        assert_relative_eq!(3.0 * x[0] + x[2], 6.0, epsilon = 1e-12);
    }

    #[test]
    fn singular_matrix_reports_row() {
        let a = array![[1.0, 2.0], [2.0, 4.0]];
        let b = array![1.0, 2.0];
        let err = gauss_solve(a, b, 1e-12).unwrap_err();
        assert_eq!(err.row, 1);
    }
}
