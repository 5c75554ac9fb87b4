//! Full-history convolution of terminal waveforms with the line kernels.
//!
//! Inputs are taken piecewise linear between accepted samples and constant before the first
//! one. Integrating by parts, the convolution of kernel `h` with `x` at time `t` is
//! `Σ_j coef_j · x(age j)`, where age 0 is the still unknown value at `t` and age `j >= 1`
//! is the `j`-th newest accepted sample. The coefficients depend only on the kernel and the
//! time axis, so lines with equal parameters share them through a [`CacheRegistry`].

pub mod kernels;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::history::{Terminal, TerminalSample};
use crate::line_spec::LineSpec;

pub use kernels::{Kernel, LineKernels, RcKernels, RlcKernels};

/// Identity of a kernel set: the bit patterns of the parameters it depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u64; 5]);

impl CacheKey {
    pub fn new(spec: &LineSpec) -> Self {
        Self([spec.l, spec.c, spec.r, spec.g, spec.length].map(f64::to_bits))
    }
}

#[derive(Debug, Clone)]
pub struct ConvolutionCache {
    kernels: LineKernels,
    chop_reltol: f64,
    axis: Vec<f64>,
    time: f64,
    /// `coefs[k][j]` multiplies the sample of age `j`.
    coefs: [Vec<f64>; 3],
    taus: Vec<f64>,
    weights: [Vec<f64>; 3],
    updates: usize,
}

impl ConvolutionCache {
    pub fn new(kernels: LineKernels, chop_reltol: f64) -> Self {
        Self {
            kernels,
            chop_reltol,
            axis: Vec::new(),
            time: f64::NAN,
            coefs: Default::default(),
            taus: Vec::new(),
            weights: Default::default(),
            updates: 0,
        }
    }

    pub fn kernels(&self) -> &LineKernels {
        &self.kernels
    }

    /// Number of times the coefficients were actually recomputed.
    pub fn updates(&self) -> usize {
        self.updates
    }

    /// Make the coefficients valid for `samples` and the new time `time`. Returns `false`
    /// when the stored coefficients already match.
    pub fn update(&mut self, samples: &[TerminalSample], time: f64) -> bool {
        if time == self.time
            && samples.len() == self.axis.len()
            && samples.iter().zip(&self.axis).all(|(s, t)| s.time == *t)
        {
            return false;
        }

        self.axis.clear();
        self.axis.extend(samples.iter().map(|s| s.time));
        self.time = time;
        self.updates += 1;

        let n = self.axis.len();
        self.taus.clear();
        self.taus.push(0.0);
        self.taus.extend(self.axis.iter().rev().map(|t| time - t));
        self.kernels.interval_weights(&self.taus, &mut self.weights);

        let totals = self.kernels.totals();
        let cutoff = self.cutoff(n);
        for (k, coefs) in self.coefs.iter_mut().enumerate() {
            let d = &self.weights[k];
            coefs.clear();
            if n == 0 {
                continue;
            }
            // d[m - 1] covers the interval between ages m - 1 and m
            coefs.push(d[0]);
            coefs.extend((1..cutoff).map(|j| d[j] - d[j - 1]));
            coefs.push(totals[k] - d[cutoff - 1]);
        }
        log::trace!("convolution coefficients for t={time:e}: {n} samples, {cutoff} kept");
        true
    }

    /// Oldest age still carried separately; older samples are folded into it.
    fn cutoff(&self, n: usize) -> usize {
        if self.chop_reltol <= 0.0 || n < 2 {
            return n;
        }
        let delay = self.kernels.delay();
        let first = [self.weights[0][0], self.weights[1][0], self.weights[2][0]];
        let negligible = |j: usize| {
            self.taus[j] > delay
                && (0..3).all(|k| {
                    let coef = self.weights[k][j] - self.weights[k][j - 1];
                    coef.abs() < self.chop_reltol * first[k].abs()
                })
        };
        let mut cutoff = n;
        while cutoff > 1 && negligible(cutoff - 1) {
            cutoff -= 1;
        }
        cutoff
    }

    /// Weight of the unknown current value for each kernel.
    pub fn first(&self) -> [f64; 3] {
        [0, 1, 2].map(|k| self.coefs[k].first().copied().unwrap_or(0.0))
    }

    /// Contribution of the accepted samples of `which` to the convolution with `kernel`.
    /// `samples` must be the slice passed to the last [`update`](Self::update).
    pub fn convolve(&self, kernel: Kernel, samples: &[TerminalSample], which: Terminal) -> f64 {
        debug_assert_eq!(samples.len(), self.axis.len());
        self.coefs[kernel.index()]
            .iter()
            .skip(1)
            .zip(samples.iter().rev())
            .map(|(c, s)| c * s.get(which))
            .sum()
    }
}

/// Caches shared between line instances with identical kernels.
#[derive(Debug, Default)]
pub struct CacheRegistry {
    caches: HashMap<CacheKey, Rc<RefCell<ConvolutionCache>>>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` for lines that need no convolution.
    pub fn get_or_create(
        &mut self,
        spec: &LineSpec,
        chop_reltol: f64,
    ) -> Option<Rc<RefCell<ConvolutionCache>>> {
        let kernels = LineKernels::for_spec(spec)?;
        let cache = self
            .caches
            .entry(CacheKey::new(spec))
            .or_insert_with(|| {
                log::debug!("new convolution cache for {:?} line", spec.regime);
                Rc::new(RefCell::new(ConvolutionCache::new(kernels, chop_reltol)))
            });
        Some(Rc::clone(cache))
    }

    pub fn len(&self) -> usize {
        self.caches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.caches.is_empty()
    }

    /// Drop caches no instance refers to anymore.
    pub fn prune(&mut self) {
        self.caches.retain(|_, c| Rc::strong_count(c) > 1);
    }
}
