use crate::config::{ModelOptions, Tolerance};
use crate::engine::{AnalysisMode, BreakpointSink, TimeContext};
use crate::error::TlineError;
use crate::history::{History, TerminalSample};

use super::{LineState, TlineInstance};

/// Whether the slope of `v + z0·i` at either port changes enough over the last three
/// samples to call for a breakpoint.
fn slope_discontinuity(history: &History, z0: f64, tol: &Tolerance) -> bool {
    let Some([a, b, c]) = history.last_n::<3>() else {
        return false;
    };
    (1..=2).any(|port| {
        let d1 = (b.incident(port, z0) - a.incident(port, z0)) / (b.time - a.time);
        let d2 = (c.incident(port, z0) - b.incident(port, z0)) / (c.time - b.time);
        (d1 - d2).abs() >= tol.rel * d1.abs().max(d2.abs()) + tol.abs
    })
}

impl TlineInstance {
    /// Record a converged solution. At [`AnalysisMode::TransientInit`] the history restarts
    /// from the operating point.
    pub fn accept<B: BreakpointSink>(
        &mut self,
        solution: &[f64],
        ctx: &TimeContext,
        options: &ModelOptions,
        breakpoints: &mut B,
    ) -> Result<(), TlineError> {
        let (spec, _) = self.ready()?;
        let spec = *spec;
        let sample = self.read_solution(solution, ctx.time);
        self.last = Some(sample);

        match ctx.mode {
            AnalysisMode::Dc => {}
            AnalysisMode::TransientInit => {
                self.history.reset();
                self.history.commit(sample);
                self.pending = None;
                if let Some(LineState::Pade(pade)) = &mut self.state {
                    let own = [sample.v1, sample.v2];
                    let other = [(sample.v2, sample.i2), (sample.v1, sample.i1)];
                    for (port, state) in pade.ports.iter_mut().enumerate() {
                        state.h1.init_steady(own[port]);
                        state.h3.init_steady(other[port].0);
                        state.h2.init_steady(other[port].1);
                        state.delayed_prev = other[port];
                    }
                }
            }
            AnalysisMode::TransientPredict | AnalysisMode::TransientCorrect => {
                self.commit_pade(&sample, ctx, options)?;
                self.history.commit(sample);
                self.pending = None;

                if spec.delay > 0.0
                    && slope_discontinuity(&self.history, spec.z0, &options.breakpoint)
                    && let Some(prev) = self.history.prev(self.history.len() - 1)
                {
                    let at = prev.time + spec.delay;
                    log::debug!("{}: breakpoint requested at t={at:e}", self.name);
                    breakpoints.request_breakpoint(at);
                }
                if let Some(tol) = &options.compaction
                    && let Some(removed) = self.history.compact(tol)
                {
                    log::trace!("{}: compacted sample at t={removed:e}", self.name);
                }
            }
        }
        Ok(())
    }

    /// Advance the Padé accumulators to the accepted point.
    fn commit_pade(
        &mut self,
        sample: &TerminalSample,
        ctx: &TimeContext,
        options: &ModelOptions,
    ) -> Result<(), TlineError> {
        if !matches!(self.state, Some(LineState::Pade(_))) {
            return Ok(());
        }
        let tail = *self.history.tail().ok_or_else(|| TlineError::NoHistory {
            instance: self.name.clone(),
        })?;
        let pending = match self.pending.take() {
            Some(p) if p.time == sample.time => p,
            // accepted without a matching predictor call
            _ => {
                let spec = *self.ready()?.0;
                self.predict(&spec, ctx, options)?
            }
        };
        let (Some(pending), Some(LineState::Pade(pade))) = (pending.pade, &mut self.state) else {
            return Ok(());
        };

        let h = sample.time - tail.time;
        let own = [(tail.v1, sample.v1), (tail.v2, sample.v2)];
        for ((port, pending), (prev, now)) in pade.ports.iter_mut().zip(pending).zip(own) {
            let h1 = port.h1.advanced(h, prev, now);
            port.h1.commit(h1);
            port.h3.commit(pending.h3);
            port.h2.commit(pending.h2);
            port.delayed_prev = pending.delayed;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::LineModel;
    use crate::line_spec::{Engine, LineParams};
    use crate::stamp::TwoPortNodes;
    use approx::assert_relative_eq;

    // unknowns: [v1, v2, i1, i2]
    fn model(params: LineParams, options: ModelOptions) -> LineModel {
        let nodes = TwoPortNodes {
            pos1: Some(0),
            neg1: None,
            pos2: Some(1),
            neg2: None,
            ibr1: 2,
            ibr2: 3,
        };
        let mut model = LineModel::new("tl", options);
        model.add_instance(TlineInstance::new("t1", params, nodes));
        model.setup(|row, col| Ok(row * 4 + col)).unwrap();
        model
    }

    fn lossless() -> LineParams {
        LineParams {
            inductance: 1e-9,
            capacitance: 1e-12,
            ..Default::default()
        }
    }

    fn ctx(time: f64, mode: AnalysisMode) -> TimeContext {
        TimeContext {
            time,
            delta: 1e-12,
            order: 1,
            mode,
        }
    }

    fn run(model: &mut LineModel, points: &[(f64, f64)]) -> Vec<f64> {
        let options = model.options.clone();
        let line = &mut model.instances[0];
        let mut requests = Vec::new();
        let init = ctx(0.0, AnalysisMode::TransientInit);
        line.accept(&[0.0; 4], &init, &options, &mut requests).unwrap();
        for &(t, v1) in points {
            let step = ctx(t, AnalysisMode::TransientCorrect);
            line.accept(&[v1, 0.0, 0.0, 0.0], &step, &options, &mut requests)
                .unwrap();
        }
        requests
    }

    #[test]
    fn transient_init_restarts_the_history() {
        let mut model = model(lossless(), ModelOptions::default());
        run(&mut model, &[(1e-12, 0.0), (2e-12, 0.0)]);
        assert_eq!(model.instances[0].history().len(), 3);

        let options = model.options.clone();
        let line = &mut model.instances[0];
        let init = ctx(0.0, AnalysisMode::TransientInit);
        line.accept(&[0.5, 0.0, 0.0, 0.0], &init, &options, &mut Vec::new())
            .unwrap();
        assert_eq!(line.history().len(), 1);
        assert_eq!(line.ask(crate::params::ParamId::Port1Voltage).unwrap(), 0.5);
    }

    #[test]
    fn kink_requests_a_breakpoint_one_delay_later() {
        let mut model = model(lossless(), ModelOptions::default());
        let delay = (1e-9f64 * 1e-12).sqrt();
        let requests = run(&mut model, &[(1e-12, 0.0), (2e-12, 1.0)]);
        assert_eq!(requests.len(), 1);
        assert_relative_eq!(requests[0], 1e-12 + delay, max_relative = 1e-12);
    }

    #[test]
    fn straight_ramp_requests_nothing() {
        let mut model = model(lossless(), ModelOptions::default());
        let requests = run(&mut model, &[(1e-12, 1.0), (2e-12, 2.0), (3e-12, 3.0)]);
        assert!(requests.is_empty());
        assert_eq!(model.instances[0].history().len(), 4);
    }

    #[test]
    fn compaction_drops_collinear_samples() {
        let options = ModelOptions {
            compaction: Some(Tolerance::new(1e-3, 1e-12)),
            ..Default::default()
        };
        let mut model = model(lossless(), options);
        run(&mut model, &[(1e-12, 1.0), (2e-12, 2.0), (3e-12, 3.0)]);
        let times: Vec<f64> = model.instances[0].history().times().collect();
        assert_eq!(times, vec![0.0, 3e-12]);
    }

    #[test]
    fn pade_accumulators_follow_unpredicted_accepts() {
        let params = LineParams {
            resistance: 50.0,
            inductance: 1e-7,
            capacitance: 1e-10,
            ..Default::default()
        };
        let options = ModelOptions {
            engine: Some(Engine::Pade),
            ..Default::default()
        };
        let mut model = model(params, options);
        run(&mut model, &[(1e-12, 0.1), (2e-12, 0.2)]);
        assert_eq!(model.instances[0].history().len(), 3);
    }
}
