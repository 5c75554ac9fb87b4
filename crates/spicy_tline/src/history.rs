//! Per-instance record of accepted terminal samples.

use crate::config::{Interpolation, Tolerance};
use crate::quadrature::straight_line_check;

/// Port voltages and currents at one accepted time point. Currents flow into the line.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TerminalSample {
    pub time: f64,
    pub v1: f64,
    pub v2: f64,
    pub i1: f64,
    pub i2: f64,
}

/// One of the four recorded quantities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    V1,
    V2,
    I1,
    I2,
}

impl Terminal {
    pub const ALL: [Terminal; 4] = [Terminal::V1, Terminal::V2, Terminal::I1, Terminal::I2];
}

impl TerminalSample {
    pub fn get(&self, which: Terminal) -> f64 {
        match which {
            Terminal::V1 => self.v1,
            Terminal::V2 => self.v2,
            Terminal::I1 => self.i1,
            Terminal::I2 => self.i2,
        }
    }

    /// Wave launched into port 1 or 2, `v + z0 * i`.
    pub fn incident(&self, port: usize, z0: f64) -> f64 {
        match port {
            1 => self.v1 + z0 * self.i1,
            _ => self.v2 + z0 * self.i2,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct History {
    samples: Vec<TerminalSample>,
}

impl History {
    const INITIAL_CAPACITY: usize = 64;

    pub fn new() -> Self {
        Self {
            samples: Vec::with_capacity(Self::INITIAL_CAPACITY),
        }
    }

    /// Drop everything, e.g. at the start of a new transient analysis.
    pub fn reset(&mut self) {
        self.samples.clear();
    }

    /// Append a converged sample. Recorded samples at or after its time are discarded first,
    /// so the time axis stays strictly increasing.
    pub fn commit(&mut self, sample: TerminalSample) {
        let keep = self.samples.partition_point(|s| s.time < sample.time);
        if keep < self.samples.len() {
            log::warn!(
                "sample at t={:e} does not advance past t={:e}; dropping {} later samples",
                sample.time,
                self.samples[self.samples.len() - 1].time,
                self.samples.len() - keep
            );
            self.samples.truncate(keep);
        }
        if self.samples.len() == self.samples.capacity() {
            let grow = self.samples.capacity().max(Self::INITIAL_CAPACITY);
            self.samples.reserve_exact(grow);
            log::trace!("history grown to {} samples", self.samples.capacity());
        }
        self.samples.push(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn head(&self) -> Option<&TerminalSample> {
        self.samples.first()
    }

    pub fn tail(&self) -> Option<&TerminalSample> {
        self.samples.last()
    }

    pub fn get(&self, idx: usize) -> Option<&TerminalSample> {
        self.samples.get(idx)
    }

    pub fn prev(&self, idx: usize) -> Option<&TerminalSample> {
        idx.checked_sub(1).and_then(|i| self.samples.get(i))
    }

    pub fn next(&self, idx: usize) -> Option<&TerminalSample> {
        self.samples.get(idx + 1)
    }

    pub fn samples(&self) -> &[TerminalSample] {
        &self.samples
    }

    pub fn times(&self) -> impl ExactSizeIterator<Item = f64> + '_ {
        self.samples.iter().map(|s| s.time)
    }

    /// The last `N` samples, oldest first.
    pub fn last_n<const N: usize>(&self) -> Option<[TerminalSample; N]> {
        let start = self.samples.len().checked_sub(N)?;
        self.samples[start..].try_into().ok()
    }

    /// Index `k >= 1` with `time[k-1] <= t <= time[k]`, or `Err(exact)` when `t` is a stored time.
    fn bracket(&self, t: f64) -> Result<usize, usize> {
        match self.samples.binary_search_by(|s| s.time.total_cmp(&t)) {
            Ok(exact) => Err(exact),
            Err(insert) => Ok(insert.clamp(1, self.samples.len() - 1)),
        }
    }

    /// Value of `which` at time `t`. Before the first sample the first value is held;
    /// past the last sample the last interval is extrapolated.
    pub fn interpolate(
        &self,
        t: f64,
        which: Terminal,
        mode: Interpolation,
        straight: &Tolerance,
    ) -> Option<f64> {
        let head = self.head()?;
        if t <= head.time || self.samples.len() == 1 {
            return Some(head.get(which));
        }
        let k = match self.bracket(t) {
            Err(exact) => return Some(self.samples[exact].get(which)),
            Ok(k) => k,
        };
        let (a, b) = (&self.samples[k - 1], &self.samples[k]);
        let linear = || {
            let w = (t - a.time) / (b.time - a.time);
            a.get(which) * (1.0 - w) + b.get(which) * w
        };
        if mode == Interpolation::Linear || self.samples.len() < 3 {
            return Some(linear());
        }
        // third point on the side that keeps t inside the span
        let c = if k + 1 < self.samples.len() {
            self.samples[k + 1]
        } else {
            self.samples[k - 2]
        };
        if mode == Interpolation::Mixed
            && straight_line_check(
                (a.time, a.get(which)),
                (b.time, b.get(which)),
                (c.time, c.get(which)),
                straight,
            )
        {
            return Some(linear());
        }
        Some(lagrange3(
            t,
            (a.time, a.get(which)),
            (b.time, b.get(which)),
            (c.time, c.get(which)),
        ))
    }

    /// Second divided difference of `which` over the last three samples.
    pub fn second_derivative(&self, which: Terminal) -> Option<f64> {
        let [a, b, c] = self.last_n::<3>()?;
        let d1 = (b.get(which) - a.get(which)) / (b.time - a.time);
        let d2 = (c.get(which) - b.get(which)) / (c.time - b.time);
        Some(2.0 * (d2 - d1) / (c.time - a.time))
    }

    /// Drop the middle of the last three samples when it lies on their chord for every
    /// terminal quantity. Returns the time of the removed sample.
    pub fn compact(&mut self, tol: &Tolerance) -> Option<f64> {
        let [a, b, c] = self.last_n::<3>()?;
        let removable = Terminal::ALL.iter().all(|&q| {
            straight_line_check(
                (a.time, a.get(q)),
                (b.time, b.get(q)),
                (c.time, c.get(q)),
                tol,
            )
        });
        if !removable {
            return None;
        }
        let n = self.samples.len();
        self.samples.remove(n - 2);
        Some(b.time)
    }
}

fn lagrange3(t: f64, (t0, x0): (f64, f64), (t1, x1): (f64, f64), (t2, x2): (f64, f64)) -> f64 {
    let l0 = (t - t1) * (t - t2) / ((t0 - t1) * (t0 - t2));
    let l1 = (t - t0) * (t - t2) / ((t1 - t0) * (t1 - t2));
    let l2 = (t - t0) * (t - t1) / ((t2 - t0) * (t2 - t1));
    x0 * l0 + x1 * l1 + x2 * l2
}
