use num_complex::Complex64;

use crate::engine::{ComplexStamper, Stamper};

/// Unknowns a line connects to. Node voltages are `None` for ground.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TwoPortNodes {
    pub pos1: Option<usize>,
    pub neg1: Option<usize>,
    pub pos2: Option<usize>,
    pub neg2: Option<usize>,
    /// Rows of the two branch currents, which flow into the line at the positive terminals.
    pub ibr1: usize,
    pub ibr2: usize,
}

impl TwoPortNodes {
    /// Column order of a branch row: `[pos1, neg1, pos2, neg2, ibr1, ibr2]`.
    fn columns(&self) -> [Option<usize>; 6] {
        [
            self.pos1,
            self.neg1,
            self.pos2,
            self.neg2,
            Some(self.ibr1),
            Some(self.ibr2),
        ]
    }

    /// `(node, branch)` pairs of the KCL incidences.
    fn incidences(&self) -> [(Option<usize>, usize); 4] {
        [
            (self.pos1, self.ibr1),
            (self.neg1, self.ibr1),
            (self.pos2, self.ibr2),
            (self.neg2, self.ibr2),
        ]
    }
}

/// One branch equation `v[0]·v_port1 + v[1]·v_port2 + i[0]·i1 + i[1]·i2 = rhs`, where the port
/// voltages are differences between the positive and negative terminals.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BranchRow<T> {
    pub v: [T; 2],
    pub i: [T; 2],
    pub rhs: T,
}

impl<T: Copy + std::ops::Neg<Output = T>> BranchRow<T> {
    /// Coefficients in column order.
    fn coefficients(&self) -> [T; 6] {
        [self.v[0], -self.v[0], self.v[1], -self.v[1], self.i[0], self.i[1]]
    }
}

/// Cached matrix handles of a two-port line.
///
/// The KCL incidences of the branch currents (`kcl`) are constant; the two branch rows
/// (`branch`) are rewritten at every load. Handles are dense linear indices
/// `row * dim + col` for the dense host matrix, or whatever the `entry` callback returns.
#[derive(Debug, Clone, Default)]
pub struct TwoPortStamp {
    pub kcl: [Option<usize>; 4],
    pub branch: [[Option<usize>; 6]; 2],
    pub rows: [usize; 2],
}

impl TwoPortStamp {
    pub fn uninitialized() -> Self {
        Self::default()
    }

    /// Compute and set temporary indices from node locations.
    ///
    /// The `entry` callback receives (row, column).
    pub fn set_temp_indices_from_nodes<F, E>(
        &mut self,
        nodes: &TwoPortNodes,
        mut entry: F,
    ) -> Result<(), E>
    where
        F: FnMut(usize, usize) -> Result<usize, E>,
    {
        for (slot, (node, branch)) in self.kcl.iter_mut().zip(nodes.incidences()) {
            *slot = node.map(|n| entry(n, branch)).transpose()?;
        }
        let columns = nodes.columns();
        self.rows = [nodes.ibr1, nodes.ibr2];
        for (row, slots) in self.rows.into_iter().zip(self.branch.iter_mut()) {
            for (slot, col) in slots.iter_mut().zip(columns) {
                *slot = col.map(|c| entry(row, c)).transpose()?;
            }
        }
        Ok(())
    }

    /// Map temporary indices to their final locations using the provided mapping.
    pub fn set_final_indices<F>(&mut self, mut f: F)
    where
        F: FnMut(usize) -> usize,
    {
        for slot in self.kcl.iter_mut().chain(self.branch.iter_mut().flatten()) {
            *slot = slot.map(&mut f);
        }
    }

    /// Stamp the constant incidences of the branch currents into the KCL rows.
    pub fn stamp_incidence<S: Stamper>(&self, m: &mut S) {
        for (slot, sign) in self.kcl.iter().zip([1.0, -1.0, 1.0, -1.0]) {
            if let Some(h) = slot {
                m.add(*h, sign);
            }
        }
    }

    pub fn stamp_row<S: Stamper>(&self, m: &mut S, port: usize, row: &BranchRow<f64>) {
        for (slot, value) in self.branch[port].iter().zip(row.coefficients()) {
            if let Some(h) = slot
                && value != 0.0
            {
                m.add(*h, value);
            }
        }
        if row.rhs != 0.0 {
            m.add_rhs(self.rows[port], row.rhs);
        }
    }

    pub fn stamp_incidence_complex<S: ComplexStamper>(&self, m: &mut S) {
        for (slot, sign) in self.kcl.iter().zip([1.0, -1.0, 1.0, -1.0]) {
            if let Some(h) = slot {
                m.add_complex(*h, Complex64::new(sign, 0.0));
            }
        }
    }

    pub fn stamp_row_complex<S: ComplexStamper>(
        &self,
        m: &mut S,
        port: usize,
        row: &BranchRow<Complex64>,
    ) {
        for (slot, value) in self.branch[port].iter().zip(row.coefficients()) {
            if let Some(h) = slot {
                m.add_complex(*h, value);
            }
        }
        if row.rhs != Complex64::new(0.0, 0.0) {
            m.add_rhs_complex(self.rows[port], row.rhs);
        }
    }
}
