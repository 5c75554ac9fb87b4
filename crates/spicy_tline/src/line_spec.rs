//! Resolution of partially specified line parameters and regime classification.

use crate::error::TlineError;

/// Which of the per-unit-length quantities are nonzero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Regime {
    /// Lossless: L and C only.
    Lc,
    /// Lossy with inductance; G may be nonzero (Padé only).
    Rlc,
    /// Diffusive: R and C only.
    Rc,
    /// Purely resistive ladder.
    Rg,
    /// Series R-L without shunt elements.
    Rl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Engine {
    Pade,
    Convolution,
}

/// User-facing line parameters. A value of `0.0` means "not given".
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LineParams {
    pub inductance: f64,
    pub capacitance: f64,
    pub resistance: f64,
    pub conductance: f64,
    pub impedance: f64,
    /// Total propagation delay of the line.
    pub delay: f64,
    pub length: Option<f64>,
    pub frequency: f64,
    pub normalized_length: f64,
}

/// Fully resolved electrical description of one line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSpec {
    pub l: f64,
    pub c: f64,
    pub r: f64,
    pub g: f64,
    pub z0: f64,
    /// Total delay, `length * sqrt(l * c)`.
    pub delay: f64,
    pub length: f64,
    pub regime: Regime,
}

impl LineSpec {
    pub fn resolve(params: &LineParams) -> Result<Self, TlineError> {
        let length = match params.length {
            Some(len) if len <= 0.0 => return Err(TlineError::NonPositiveLength(len)),
            Some(len) => len,
            None => 1.0,
        };

        let mut delay = params.delay;
        if params.frequency != 0.0 && params.normalized_length != 0.0 {
            if delay != 0.0 {
                return Err(TlineError::Overspecified(
                    "delay given together with frequency and normalized length",
                ));
            }
            delay = params.normalized_length / params.frequency;
        }

        let (mut l, mut c, mut z0) = (params.inductance, params.capacitance, params.impedance);
        let (r, g) = (params.resistance, params.conductance);
        // per unit length
        let tpl = delay / length;

        if l != 0.0 && c != 0.0 {
            let derived_z0 = (l / c).sqrt();
            let derived_delay = length * (l * c).sqrt();
            if (z0 != 0.0 && !close(z0, derived_z0)) || (delay != 0.0 && !close(delay, derived_delay)) {
                log::warn!(
                    "Z0/delay given alongside L and C disagree; using Z0={derived_z0:e}, delay={derived_delay:e}"
                );
            }
            z0 = derived_z0;
            delay = derived_delay;
        } else if l != 0.0 && z0 != 0.0 {
            c = l / (z0 * z0);
            delay = length * l / z0;
        } else if l != 0.0 && tpl != 0.0 {
            c = tpl * tpl / l;
            z0 = l / tpl;
        } else if c != 0.0 && z0 != 0.0 {
            l = c * z0 * z0;
            delay = length * c * z0;
        } else if c != 0.0 && tpl != 0.0 {
            l = tpl * tpl / c;
            z0 = tpl / c;
        } else if z0 != 0.0 && tpl != 0.0 {
            l = z0 * tpl;
            c = tpl / z0;
        } else {
            // no wave propagation without both L and C
            z0 = 0.0;
            delay = 0.0;
        }

        let nonzero = [r, l, g, c].iter().filter(|v| **v != 0.0).count();
        if nonzero < 2 {
            return Err(TlineError::Underspecified);
        }

        let regime = match (r != 0.0, l != 0.0, g != 0.0, c != 0.0) {
            (false, true, false, true) => Regime::Lc,
            (true, true, _, true) => Regime::Rlc,
            (true, false, false, true) => Regime::Rc,
            (true, false, true, false) => Regime::Rg,
            (true, true, false, false) => Regime::Rl,
            _ => return Err(TlineError::UnsupportedRegime { r, l, g, c }),
        };

        Ok(Self {
            l,
            c,
            r,
            g,
            z0,
            delay,
            length,
            regime,
        })
    }

    /// Pick the solution engine, rejecting combinations that cannot be simulated.
    pub fn select_engine(&self, requested: Option<Engine>) -> Result<Engine, TlineError> {
        let engine = match requested {
            Some(engine) => engine,
            None => match self.regime {
                Regime::Rl => Engine::Pade,
                Regime::Rlc if self.g != 0.0 => Engine::Pade,
                _ => Engine::Convolution,
            },
        };

        let supported = match (engine, self.regime) {
            (Engine::Convolution, Regime::Rl) => false,
            (Engine::Convolution, Regime::Rlc) => self.g == 0.0,
            (Engine::Convolution, _) => true,
            (Engine::Pade, Regime::Rc | Regime::Rg) => false,
            (Engine::Pade, _) => true,
        };
        if !supported {
            return Err(TlineError::UnsupportedEngine {
                regime: self.regime,
                engine,
            });
        }
        Ok(engine)
    }

    /// Characteristic admittance of the lossless part, zero without wave propagation.
    pub fn y0(&self) -> f64 {
        if self.z0 != 0.0 { 1.0 / self.z0 } else { 0.0 }
    }

    pub fn is_lossless(&self) -> bool {
        self.regime == Regime::Lc
    }

    /// Amplitude left after one transit, `exp(-delay * (R/L + G/C) / 2)`.
    pub fn attenuation(&self) -> f64 {
        if self.l == 0.0 || self.c == 0.0 {
            return 1.0;
        }
        let rate = 0.5 * (self.r / self.l + self.g / self.c);
        (-rate * self.delay).exp()
    }
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-6 * a.abs().max(b.abs())
}
