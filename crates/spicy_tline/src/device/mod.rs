//! The transmission-line device: model, instances and their per-engine state.
//!
//! Each port `p` of a line is described by one branch row solved for the current flowing
//! into the line, `i_p = G11·v_p + G12·v_o + K12·i_o + J`, where `o` is the other port and
//! `J` collects everything already known from the history.

mod ac;
mod accept;
mod load;
mod truncate;

use std::cell::RefCell;
use std::rc::Rc;

use num_complex::Complex64;

use crate::config::{ModelOptions, SimTolerances};
use crate::convolution::{CacheRegistry, ConvolutionCache, LineKernels};
use crate::engine::{AnalysisMode, BreakpointSink, ComplexStamper, Stamper, TimeContext};
use crate::error::TlineError;
use crate::history::{History, TerminalSample};
use crate::line_spec::{Engine, LineParams, LineSpec, Regime};
use crate::pade::PadeModel;
use crate::pade::recursion::ExpConvolution;
use crate::params::ParamId;
use crate::stamp::{BranchRow, TwoPortNodes, TwoPortStamp};

/// Scale factors turning the unit kernels into the port equations.
#[derive(Debug, Clone, Copy, PartialEq)]
struct KernelFactors {
    /// Instantaneous conductance at the own port.
    direct: f64,
    /// Multipliers of `h1'`, `h2` and `h3'`.
    scale: [f64; 3],
    /// Weights of the other port's voltage and current one delay ago.
    delayed_v: f64,
    delayed_i: f64,
}

impl KernelFactors {
    fn for_spec(spec: &LineSpec) -> Self {
        let y0 = spec.y0();
        match spec.regime {
            Regime::Rlc => {
                let a = spec.attenuation();
                Self {
                    direct: y0,
                    scale: [y0, 1.0, y0],
                    delayed_v: y0 * a,
                    delayed_i: a,
                }
            }
            Regime::Lc => Self {
                direct: y0,
                scale: [0.0; 3],
                delayed_v: y0,
                delayed_i: 1.0,
            },
            _ => Self {
                direct: 0.0,
                scale: [1.0; 3],
                delayed_v: 0.0,
                delayed_i: 0.0,
            },
        }
    }
}

#[derive(Debug)]
struct ConvolutionState {
    /// `None` for lossless lines, which only need the delayed terms.
    cache: Option<Rc<RefCell<ConvolutionCache>>>,
    factors: KernelFactors,
    /// Kernel linearity limit past the delay, RLC lines only.
    max_safe_step: Option<f64>,
}

/// Recursive convolutions of one port equation.
#[derive(Debug, Clone)]
struct PadePort {
    /// Own voltage.
    h1: ExpConvolution,
    /// Other port's voltage, one delay ago.
    h3: ExpConvolution,
    /// Other port's current, one delay ago.
    h2: ExpConvolution,
    /// Other port's `(v, i)` one delay before the last accepted time.
    delayed_prev: (f64, f64),
}

#[derive(Debug)]
struct PadeState {
    model: PadeModel,
    ports: [PadePort; 2],
}

#[derive(Debug)]
enum LineState {
    /// Delayed terms plus, for lossy lines, full-history kernels.
    Convolution(ConvolutionState),
    Pade(Box<PadeState>),
    /// RG ladder, the same network at every frequency.
    Resistive,
    /// Series R-L, integrated as a lumped element.
    Lumped,
}

/// Per-port work computed at the predictor call and reused until accept.
#[derive(Debug, Clone)]
struct PendingStep {
    time: f64,
    rows: [BranchRow<f64>; 2],
    pade: Option<[PadePending; 2]>,
}

#[derive(Debug, Clone, Default)]
struct PadePending {
    delayed: (f64, f64),
    h3: Vec<Complex64>,
    h2: Vec<Complex64>,
}

#[derive(Debug)]
pub struct TlineInstance {
    pub name: String,
    pub params: LineParams,
    pub nodes: TwoPortNodes,
    pub stamp: TwoPortStamp,
    spec: Option<LineSpec>,
    engine: Option<Engine>,
    state: Option<LineState>,
    history: History,
    pending: Option<PendingStep>,
    /// Last converged port values, DC included.
    last: Option<TerminalSample>,
    needs_setup: bool,
}

impl TlineInstance {
    pub fn new(name: impl Into<String>, params: LineParams, nodes: TwoPortNodes) -> Self {
        Self {
            name: name.into(),
            params,
            nodes,
            stamp: TwoPortStamp::uninitialized(),
            spec: None,
            engine: None,
            state: None,
            history: History::new(),
            pending: None,
            last: None,
            needs_setup: true,
        }
    }

    pub fn spec(&self) -> Option<&LineSpec> {
        self.spec.as_ref()
    }

    pub fn engine(&self) -> Option<Engine> {
        self.engine
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn needs_setup(&self) -> bool {
        self.needs_setup
    }

    /// Resolve the line, pick its engine and build the engine state.
    pub fn setup<F>(
        &mut self,
        options: &ModelOptions,
        registry: &mut CacheRegistry,
        entry: F,
    ) -> Result<(), TlineError>
    where
        F: FnMut(usize, usize) -> Result<usize, TlineError>,
    {
        let spec = LineSpec::resolve(&self.params)?;
        let engine = spec.select_engine(options.engine)?;
        log::debug!(
            "{}: {:?} line, {:?} engine, z0={:e}, delay={:e}",
            self.name,
            spec.regime,
            engine,
            spec.z0,
            spec.delay
        );

        let state = match (spec.regime, engine) {
            (Regime::Rg, _) => LineState::Resistive,
            (Regime::Rl, _) => LineState::Lumped,
            (Regime::Rlc, Engine::Pade) => {
                let model = PadeModel::build(&spec)?;
                let port = PadePort {
                    h1: ExpConvolution::new(&model.h1),
                    h3: ExpConvolution::new(&model.h3),
                    h2: ExpConvolution::new(&model.h2),
                    delayed_prev: (0.0, 0.0),
                };
                LineState::Pade(Box::new(PadeState {
                    ports: [port.clone(), port],
                    model,
                }))
            }
            (Regime::Lc | Regime::Rlc | Regime::Rc, _) => {
                let cache = registry.get_or_create(&spec, options.chop_reltol);
                let max_safe_step = match cache.as_ref().map(|c| *c.borrow().kernels()) {
                    Some(LineKernels::Rlc(k)) => {
                        let step = k.max_safe_step(&options.straight_line);
                        log::debug!("{}: maximum safe step {step:e}", self.name);
                        Some(step)
                    }
                    _ => None,
                };
                LineState::Convolution(ConvolutionState {
                    cache,
                    factors: KernelFactors::for_spec(&spec),
                    max_safe_step,
                })
            }
        };

        self.stamp.set_temp_indices_from_nodes(&self.nodes, entry)?;
        self.spec = Some(spec);
        self.engine = Some(engine);
        self.state = Some(state);
        self.history.reset();
        self.pending = None;
        self.needs_setup = false;
        Ok(())
    }

    pub fn set_final_indices<F>(&mut self, f: F)
    where
        F: FnMut(usize) -> usize,
    {
        self.stamp.set_final_indices(f);
    }

    /// Forget everything recorded by a previous transient run.
    pub fn begin_transient(&mut self) {
        self.history.reset();
        self.pending = None;
    }

    /// Read a parameter; port quantities come from the last converged solution.
    pub fn ask(&self, id: ParamId) -> Result<f64, TlineError> {
        let port = |f: fn(&TerminalSample) -> f64| -> Result<f64, TlineError> {
            Ok(self.last.as_ref().map(f).unwrap_or(0.0))
        };
        match id {
            ParamId::Port1Voltage => port(|s| s.v1),
            ParamId::Port2Voltage => port(|s| s.v2),
            ParamId::Port1Current => port(|s| s.i1),
            ParamId::Port2Current => port(|s| s.i2),
            _ => self.params.get(id),
        }
    }

    pub fn set_param(&mut self, id: ParamId, value: f64) -> Result<(), TlineError> {
        self.params.set(id, value)?;
        self.needs_setup = true;
        Ok(())
    }

    fn ready(&self) -> Result<(&LineSpec, &LineState), TlineError> {
        match (&self.spec, &self.state) {
            (Some(spec), Some(state)) if !self.needs_setup => Ok((spec, state)),
            _ => Err(TlineError::NotSetUp {
                instance: self.name.clone(),
            }),
        }
    }

    /// Port voltages and currents of a solution vector.
    fn read_solution(&self, x: &[f64], time: f64) -> TerminalSample {
        let at = |n: Option<usize>| n.map(|n| x[n]).unwrap_or(0.0);
        let n = &self.nodes;
        TerminalSample {
            time,
            v1: at(n.pos1) - at(n.neg1),
            v2: at(n.pos2) - at(n.neg2),
            i1: x[n.ibr1],
            i2: x[n.ibr2],
        }
    }
}

/// A line model: shared options, its instances and the convolution caches they share.
#[derive(Debug, Default)]
pub struct LineModel {
    pub name: String,
    pub options: ModelOptions,
    pub instances: Vec<TlineInstance>,
    registry: CacheRegistry,
}

impl LineModel {
    pub fn new(name: impl Into<String>, options: ModelOptions) -> Self {
        Self {
            name: name.into(),
            options,
            instances: Vec::new(),
            registry: CacheRegistry::new(),
        }
    }

    pub fn add_instance(&mut self, instance: TlineInstance) -> usize {
        self.instances.push(instance);
        self.instances.len() - 1
    }

    pub fn registry(&self) -> &CacheRegistry {
        &self.registry
    }

    pub fn setup<F>(&mut self, mut entry: F) -> Result<(), TlineError>
    where
        F: FnMut(usize, usize) -> Result<usize, TlineError>,
    {
        for inst in &mut self.instances {
            inst.setup(&self.options, &mut self.registry, &mut entry)?;
        }
        self.registry.prune();
        Ok(())
    }

    pub fn set_final_indices<F>(&mut self, mut f: F)
    where
        F: FnMut(usize) -> usize,
    {
        for inst in &mut self.instances {
            inst.set_final_indices(&mut f);
        }
    }

    /// Change an instance parameter; the instance must be set up again before the next load.
    pub fn set_instance_param(
        &mut self,
        instance: usize,
        id: ParamId,
        value: f64,
    ) -> Result<(), TlineError> {
        let inst = self
            .instances
            .get_mut(instance)
            .ok_or_else(|| TlineError::UnknownParameter(format!("instance #{instance}")))?;
        inst.set_param(id, value)
    }

    pub fn begin_transient(&mut self) {
        for inst in &mut self.instances {
            inst.begin_transient();
        }
    }

    pub fn load<S: Stamper>(&mut self, m: &mut S, ctx: &TimeContext) -> Result<(), TlineError> {
        for inst in &mut self.instances {
            inst.load(m, ctx, &self.options)?;
        }
        Ok(())
    }

    pub fn ac_load<S: ComplexStamper>(&self, m: &mut S, omega: f64) -> Result<(), TlineError> {
        for inst in &self.instances {
            inst.ac_load(m, omega)?;
        }
        Ok(())
    }

    pub fn accept<B: BreakpointSink>(
        &mut self,
        solution: &[f64],
        ctx: &TimeContext,
        breakpoints: &mut B,
    ) -> Result<(), TlineError> {
        for inst in &mut self.instances {
            inst.accept(solution, ctx, &self.options, breakpoints)?;
        }
        Ok(())
    }

    /// Smallest next step allowed by any instance, in the integrator's normalised form.
    pub fn truncate(
        &self,
        ctx: &TimeContext,
        tol: &SimTolerances,
        step: f64,
    ) -> Result<f64, TlineError> {
        self.instances.iter().try_fold(step, |step, inst| {
            Ok(step.min(inst.truncate(ctx, &self.options, tol, step)?))
        })
    }
}

fn is_transient(mode: AnalysisMode) -> bool {
    matches!(
        mode,
        AnalysisMode::TransientPredict | AnalysisMode::TransientCorrect
    )
}
