//! Recursive convolution with a sum of exponentials.
//!
//! For a kernel `Σ c·exp(x·t)` and an input that is linear over each step, the running
//! convolution of one term advances as
//! `y_n = exp(x h)·y_{n-1} + c·[E0·u_n − E1·(u_n − u_{n-1})/h]`.

use num_complex::Complex64;

use super::PadeTerm;

#[derive(Debug, Clone, Copy)]
struct StepFactors {
    decay: Complex64,
    e0: Complex64,
    e1_over_h: Complex64,
}

impl StepFactors {
    fn new(x: Complex64, h: f64) -> Self {
        let xh = x * h;
        let decay = xh.exp();
        if xh.norm() < 1e-4 {
            // series: E0 = h(1 + xh/2), E1/h = h(1/2 + xh/3)
            return Self {
                decay,
                e0: h * (1.0 + xh / 2.0),
                e1_over_h: h * (0.5 + xh / 3.0),
            };
        }
        let e0 = (decay - 1.0) / x;
        let e1_over_h = decay / x - (decay - 1.0) / (x * x * h);
        Self {
            decay,
            e0,
            e1_over_h,
        }
    }
}

/// Running convolution state of one input with one kernel family.
#[derive(Debug, Clone, Default)]
pub struct ExpConvolution {
    terms: Vec<PadeTerm>,
    state: Vec<Complex64>,
}

impl ExpConvolution {
    pub fn new(terms: &[PadeTerm]) -> Self {
        Self {
            terms: terms.to_vec(),
            state: vec![Complex64::new(0.0, 0.0); terms.len()],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// State of an input that has been constant at `u0` forever.
    pub fn init_steady(&mut self, u0: f64) {
        for (y, t) in self.state.iter_mut().zip(&self.terms) {
            *y = -t.coef * u0 / t.pole;
        }
    }

    /// Current value of the convolution.
    pub fn value(&self) -> f64 {
        self.state.iter().map(|y| y.re).sum()
    }

    /// Weight of the still unknown `u_n` after a step of `h`.
    pub fn current_weight(&self, h: f64) -> f64 {
        self.terms
            .iter()
            .map(|t| {
                let f = StepFactors::new(t.pole, h);
                (t.coef * (f.e0 - f.e1_over_h)).re
            })
            .sum()
    }

    /// Part of the next value that does not depend on `u_n`.
    pub fn history(&self, h: f64, u_prev: f64) -> f64 {
        self.terms
            .iter()
            .zip(&self.state)
            .map(|(t, y)| {
                let f = StepFactors::new(t.pole, h);
                (f.decay * y + t.coef * f.e1_over_h * u_prev).re
            })
            .sum()
    }

    /// State after a step of `h` with the input moving from `u_prev` to `u_now`.
    pub fn advanced(&self, h: f64, u_prev: f64, u_now: f64) -> Vec<Complex64> {
        self.terms
            .iter()
            .zip(&self.state)
            .map(|(t, y)| {
                let f = StepFactors::new(t.pole, h);
                f.decay * y + t.coef * (f.e0 * u_now - f.e1_over_h * (u_now - u_prev))
            })
            .collect()
    }

    pub fn commit(&mut self, state: Vec<Complex64>) {
        debug_assert_eq!(state.len(), self.state.len());
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn single(c: f64, x: f64) -> ExpConvolution {
        ExpConvolution::new(&[PadeTerm {
            coef: Complex64::new(c, 0.0),
            pole: Complex64::new(x, 0.0),
        }])
    }

    #[test]
    fn steady_state_is_a_fixed_point() {
        let mut conv = single(3.0, -2.0);
        conv.init_steady(1.5);
        let before = conv.value();
        conv.commit(conv.advanced(0.1, 1.5, 1.5));
        assert_relative_eq!(conv.value(), before, epsilon = 1e-14);
        assert_relative_eq!(before, 3.0 * 1.5 / 2.0, epsilon = 1e-14);
    }

    #[test]
    fn split_matches_full_update() {
        let mut conv = single(1.0, -5.0);
        conv.init_steady(0.2);
        let (h, u_prev, u_now) = (0.03, 0.2, 0.9);
        let full: f64 = conv.advanced(h, u_prev, u_now).iter().map(|y| y.re).sum();
        let split = conv.history(h, u_prev) + conv.current_weight(h) * u_now;
        assert_relative_eq!(full, split, epsilon = 1e-14);
    }

    #[test]
    fn step_response_of_single_pole() {
        // kernel e^{-t}, unit step input applied as a fast ramp: y(t) -> 1 - e^{-t}
        let mut conv = single(1.0, -1.0);
        let h = 1e-3;
        let mut u_prev = 0.0;
        let mut t = 0.0;
        while t < 2.0 - 1e-12 {
            let u_now = 1.0;
            conv.commit(conv.advanced(h, u_prev, u_now));
            u_prev = u_now;
            t += h;
        }
        assert_relative_eq!(conv.value(), 1.0 - (-2.0f64).exp(), epsilon = 1e-3);
    }

    #[test]
    fn tiny_steps_use_the_series_branch() {
        let conv = single(1.0, -1.0);
        let near = conv.current_weight(1e-5);
        let tiny = conv.current_weight(1e-9);
        // weight ~ h/2 for small steps
        assert_relative_eq!(near, 0.5e-5, max_relative = 1e-4);
        assert_relative_eq!(tiny, 0.5e-9, max_relative = 1e-6);
    }
}
