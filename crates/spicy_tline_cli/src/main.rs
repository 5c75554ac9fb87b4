use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use spicy_tline::{
    AcSweep, Circuit, Engine, Interpolation, LineParams, ModelOptions, TerminatedLine, Tolerance,
    TranParams, Waveform, simulate_ac, simulate_op, simulate_trans,
};

mod raw_writer;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EngineArg {
    Pade,
    Convolution,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum InterpArg {
    Linear,
    Quadratic,
    Mixed,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SourceArg {
    Dc,
    Ramp,
    Pulse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Tab separated columns on stdout
    Table,
    /// LTSpice .raw file
    Raw,
    /// JSON on stdout
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SweepArg {
    Dec,
    Lin,
}

#[derive(Subcommand, Debug)]
enum Analysis {
    /// DC operating point
    Op,
    /// Transient analysis from the operating point
    Tran {
        tstop: f64,
        /// Largest time step; defaults to a tenth of the line delay
        #[arg(long)]
        max_step: Option<f64>,
    },
    /// Small-signal frequency sweep of the port voltages
    Ac {
        #[arg(value_enum)]
        sweep: SweepArg,
        points: usize,
        fstart: f64,
        fstop: f64,
    },
}

#[derive(Parser, Debug)]
#[command(
    name = "spicy_tline",
    about = "Transmission line between a source and a load",
    version
)]
struct Args {
    /// Inductance per unit length
    #[arg(long, default_value_t = 0.0)]
    l: f64,
    /// Capacitance per unit length
    #[arg(long, default_value_t = 0.0)]
    c: f64,
    /// Resistance per unit length
    #[arg(long, default_value_t = 0.0)]
    r: f64,
    /// Conductance per unit length
    #[arg(long, default_value_t = 0.0)]
    g: f64,
    /// Characteristic impedance
    #[arg(long, default_value_t = 0.0)]
    z0: f64,
    /// Total delay
    #[arg(long, default_value_t = 0.0)]
    td: f64,
    #[arg(long)]
    len: Option<f64>,
    /// Frequency at which `nl` wavelengths fit on the line
    #[arg(long, default_value_t = 0.0)]
    f: f64,
    /// Normalized length in wavelengths at `f`
    #[arg(long, default_value_t = 0.0)]
    nl: f64,

    #[arg(long, value_enum)]
    engine: Option<EngineArg>,
    #[arg(long, value_enum, default_value = "linear")]
    interp: InterpArg,
    /// Fold old convolution coefficients below this fraction of the newest
    #[arg(long, default_value_t = 0.0)]
    chop: f64,
    /// Drop history samples lying on a straight line, relative tolerance
    #[arg(long)]
    compact: Option<f64>,
    #[arg(long)]
    trunc_newton: bool,
    #[arg(long)]
    trunc_dont_cut: bool,
    /// Limit the step so the kernel slope changes by less than this fraction
    #[arg(long)]
    slope_change: Option<f64>,
    /// Padé step limit as a fraction of the line delay
    #[arg(long, default_value_t = 0.1)]
    slope_tol: f64,
    /// Relative tolerance of the slope test that requests breakpoints
    #[arg(long, default_value_t = 0.5)]
    bp_rel: f64,
    /// Absolute tolerance of the slope test that requests breakpoints
    #[arg(long, default_value_t = 1.0)]
    bp_abs: f64,

    /// Source resistance
    #[arg(long, default_value_t = 50.0)]
    rs: f64,
    /// Load resistance, `inf` for an open end
    #[arg(long, default_value_t = 50.0)]
    rl: f64,
    #[arg(long, value_enum, default_value = "ramp")]
    source: SourceArg,
    #[arg(long, default_value_t = 1.0)]
    amplitude: f64,
    #[arg(long, default_value_t = 1e-10)]
    rise: f64,
    #[arg(long, default_value_t = 1e-10)]
    fall: f64,
    #[arg(long, default_value_t = 1e-9)]
    width: f64,
    #[arg(long, default_value_t = 0.0)]
    period: f64,
    #[arg(long, default_value_t = 0.0)]
    delay: f64,

    #[arg(long, value_enum, default_value = "table")]
    format: OutputFormat,
    /// Base name of the .raw file
    #[arg(long, default_value = "tline")]
    name: String,

    #[command(subcommand)]
    analysis: Analysis,
}

impl Args {
    fn circuit(&self) -> TerminatedLine {
        let source = match self.source {
            SourceArg::Dc => Waveform::Dc(self.amplitude),
            SourceArg::Ramp => Waveform::Ramp {
                amplitude: self.amplitude,
                rise: self.rise,
            },
            SourceArg::Pulse => Waveform::Pulse {
                v1: 0.0,
                v2: self.amplitude,
                delay: self.delay,
                rise: self.rise,
                fall: self.fall,
                width: self.width,
                period: self.period,
            },
        };
        let options = ModelOptions {
            engine: self.engine.map(|e| match e {
                EngineArg::Pade => Engine::Pade,
                EngineArg::Convolution => Engine::Convolution,
            }),
            interpolation: match self.interp {
                InterpArg::Linear => Interpolation::Linear,
                InterpArg::Quadratic => Interpolation::Quadratic,
                InterpArg::Mixed => Interpolation::Mixed,
            },
            chop_reltol: self.chop,
            compaction: self.compact.map(|rel| Tolerance::new(rel, 1e-12)),
            trunc_newton: self.trunc_newton,
            trunc_dont_cut: self.trunc_dont_cut,
            slope_change: self.slope_change,
            slope_tolerance: self.slope_tol,
            breakpoint: Tolerance::new(self.bp_rel, self.bp_abs),
            ..Default::default()
        };
        TerminatedLine {
            line: LineParams {
                inductance: self.l,
                capacitance: self.c,
                resistance: self.r,
                conductance: self.g,
                impedance: self.z0,
                delay: self.td,
                length: self.len,
                frequency: self.f,
                normalized_length: self.nl,
            },
            source,
            rs: self.rs,
            rl: self.rl,
            options,
            ..Default::default()
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let stdout = std::io::stdout();
    serde_json::to_writer_pretty(stdout.lock(), value).context("writing json")?;
    println!();
    Ok(())
}

fn run(args: &Args) -> Result<()> {
    let mut circuit = Circuit::new(args.circuit()).context("invalid line")?;
    let title = format!("{:?}", args.analysis);
    if let Some(spec) = circuit.line().spec() {
        log::info!(
            "{:?} line, z0={:.4e} td={:.4e}, {:?} engine",
            spec.regime,
            spec.z0,
            spec.delay,
            circuit.line().engine()
        );
    }

    match &args.analysis {
        Analysis::Op => {
            let op = simulate_op(&mut circuit)?;
            match args.format {
                OutputFormat::Raw => {
                    let path = raw_writer::write_operating_point_raw(&title, &op, &args.name)?;
                    println!("wrote {}", path.display());
                }
                OutputFormat::Json => print_json(&op)?,
                OutputFormat::Table => {
                    for (name, v) in &op.voltages {
                        println!("V({name})\t{v:.6e}");
                    }
                    for (name, i) in &op.currents {
                        println!("I({name})\t{i:.6e}");
                    }
                }
            }
        }
        Analysis::Tran { tstop, max_step } => {
            let delay = circuit.line().spec().map(|s| s.delay).unwrap_or(0.0);
            let max_step = match max_step {
                Some(h) => *h,
                None if delay > 0.0 => 0.1 * delay,
                None => 0.01 * tstop,
            };
            let params = TranParams {
                tstop: *tstop,
                max_step,
                initial_step: None,
            };
            let result = simulate_trans(&mut circuit, &params)?;
            log::info!(
                "{} accepted steps, {} rejected",
                result.steps,
                result.rejected
            );
            match args.format {
                OutputFormat::Raw => {
                    let path = raw_writer::write_transient_raw(&title, &result, &args.name)?;
                    println!("wrote {}", path.display());
                }
                OutputFormat::Json => print_json(&result)?,
                OutputFormat::Table => {
                    println!("time\tv1\tv2\ti1\ti2");
                    for k in 0..result.times.len() {
                        println!(
                            "{:.6e}\t{:.6e}\t{:.6e}\t{:.6e}\t{:.6e}",
                            result.times[k], result.v1[k], result.v2[k], result.i1[k], result.i2[k]
                        );
                    }
                }
            }
        }
        Analysis::Ac {
            sweep,
            points,
            fstart,
            fstop,
        } => {
            let (points, fstart, fstop) = (*points, *fstart, *fstop);
            let sweep = match sweep {
                SweepArg::Dec => AcSweep::Dec {
                    points,
                    fstart,
                    fstop,
                },
                SweepArg::Lin => AcSweep::Lin {
                    points,
                    fstart,
                    fstop,
                },
            };
            let result = simulate_ac(&circuit, &sweep)?;
            match args.format {
                OutputFormat::Raw => {
                    let path = raw_writer::write_ac_raw(&title, &result, &args.name)?;
                    println!("wrote {}", path.display());
                }
                OutputFormat::Json => print_json(&result)?,
                OutputFormat::Table => {
                    println!("freq\t|v2|\tphase(v2)");
                    for (f, v) in result.frequencies.iter().zip(&result.v2) {
                        println!("{f:.6e}\t{:.6e}\t{:.3}", v.norm(), v.arg().to_degrees());
                    }
                }
            }
        }
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    if let Err(e) = run(&args) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("spicy_tline").chain(argv.iter().copied()))
            .unwrap()
    }

    #[test]
    fn lossless_line_from_z0_and_delay() {
        let args = parse(&["--z0", "50", "--td", "1e-9", "--rl", "inf", "tran", "4e-9"]);
        let config = args.circuit();
        assert_eq!(config.line.impedance, 50.0);
        assert_eq!(config.rl, f64::INFINITY);
        assert!(matches!(config.source, Waveform::Ramp { .. }));
        assert!(matches!(args.analysis, Analysis::Tran { tstop, max_step: None } if tstop == 4e-9));
    }

    #[test]
    fn engine_and_format_flags() {
        let args = parse(&[
            "--l", "1e-7", "--c", "1e-10", "--r", "50", "--engine", "pade", "--format", "json",
            "ac", "dec", "10", "1e3", "1e9",
        ]);
        assert_eq!(args.format, OutputFormat::Json);
        assert_eq!(args.circuit().options.engine, Some(Engine::Pade));
    }

    #[test]
    fn wavelength_and_step_control_flags() {
        let args = parse(&[
            "--z0", "50", "--f", "1e9", "--nl", "0.25", "--slope-change", "0.05",
            "--slope-tol", "0.2", "--bp-rel", "0.1", "--bp-abs", "1e-3", "tran", "4e-9",
        ]);
        let config = args.circuit();
        assert_eq!(config.line.frequency, 1e9);
        assert_eq!(config.line.normalized_length, 0.25);
        assert_eq!(config.options.slope_change, Some(0.05));
        assert_eq!(config.options.slope_tolerance, 0.2);
        assert_eq!(config.options.breakpoint, Tolerance::new(0.1, 1e-3));

        let defaults = parse(&["--z0", "50", "--td", "1e-9", "op"]).circuit().options;
        assert_eq!(defaults, ModelOptions::default());
    }

    #[test]
    fn operating_point_serializes_by_name() {
        let mut circuit = Circuit::new(parse(&["--z0", "50", "--td", "1e-9", "op"]).circuit())
            .unwrap();
        let op = simulate_op(&mut circuit).unwrap();
        let json = serde_json::to_value(&op).unwrap();
        let voltages = json["voltages"].as_array().unwrap();
        assert_eq!(voltages[0][0], "in");
        assert!(json["currents"].as_array().is_some());
    }
}
