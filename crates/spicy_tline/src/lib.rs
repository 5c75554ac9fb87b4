//! Transmission-line device model for a SPICE-style circuit engine.
//!
//! A line is classified by which of its per-unit-length quantities are present and is then
//! simulated either through a low-order Padé fit of its kernels ([`pade`]) or through
//! direct convolution with their exact time-domain forms ([`convolution`]). The device
//! talks to the host through the [`engine`] traits; [`circuit`], [`dc`], [`trans`] and
//! [`ac`] are a small host that drives one line between resistive terminations.

pub mod ac;
pub mod circuit;
pub mod config;
pub mod convolution;
pub mod dc;
pub mod device;
pub mod engine;
pub mod error;
pub mod history;
pub mod line_spec;
pub mod linalg;
pub mod matrix;
pub mod pade;
pub mod params;
pub mod quadrature;
pub mod special;
pub mod stamp;
pub mod trans;

pub use ac::{AcResult, AcSweep, simulate_ac};
pub use circuit::{Circuit, TerminatedLine, Waveform};
pub use config::{Interpolation, ModelOptions, SimTolerances, Tolerance};
pub use dc::{OperatingPointResult, simulate_op};
pub use device::{LineModel, TlineInstance};
pub use error::TlineError;
pub use line_spec::{Engine, LineParams, LineSpec, Regime};
pub use params::ParamId;
pub use trans::{TranParams, TransientResult, simulate_trans};
