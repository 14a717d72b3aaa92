//! ewb - run JSON circuit descriptions through the simulation engine or serve
//! the HTTP API.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ewb_api::{CircuitSpec, HttpServerConfig};
use ewb_core::{
    AnalysisCmd, BackendChoice, DcSweep, EngineConfig, GroundResolution, NetlistBuilder, RunRecord, SimulationEngine,
};

#[derive(Parser)]
#[command(name = "ewb-cli")]
#[command(about = "Electronics workbench circuit simulator", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate a circuit description and print the results
    Run {
        /// JSON circuit description
        #[arg(value_name = "CIRCUIT")]
        circuit: PathBuf,

        #[command(flatten)]
        analysis: AnalysisArgs,

        #[command(flatten)]
        engine: EngineArgs,

        /// Write results to a PSF text file
        #[arg(short = 'o', long, value_name = "PATH")]
        psf: Option<PathBuf>,

        /// Digits after the decimal point in printed and exported values (1-15)
        #[arg(long, default_value_t = 6, value_parser = clap::value_parser!(u8).range(1..=15))]
        precision: u8,
    },

    /// Print the SPICE deck for a circuit description
    Netlist {
        #[arg(value_name = "CIRCUIT")]
        circuit: PathBuf,

        #[command(flatten)]
        analysis: AnalysisArgs,
    },

    /// Check a circuit description and list warnings
    Validate {
        #[arg(value_name = "CIRCUIT")]
        circuit: PathBuf,
    },

    /// Serve the HTTP API
    Serve {
        #[arg(long, default_value = "127.0.0.1:8080")]
        bind: String,

        #[command(flatten)]
        engine: EngineArgs,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum AnalysisType {
    /// DC operating point
    Op,
    /// DC source sweep
    Dc,
    /// Transient
    Tran,
}

#[derive(Args)]
struct AnalysisArgs {
    #[arg(short, long, value_enum, default_value = "op")]
    analysis: AnalysisType,

    /// Transient step, e.g. 1u
    #[arg(long, value_parser = parse_value)]
    step: Option<f64>,

    /// Transient end time, e.g. 5m
    #[arg(long, value_parser = parse_value)]
    end: Option<f64>,

    /// Swept source device name, e.g. V1
    #[arg(long)]
    source: Option<String>,

    #[arg(long, value_parser = parse_value, allow_negative_numbers = true)]
    start: Option<f64>,

    #[arg(long, value_parser = parse_value, allow_negative_numbers = true)]
    stop: Option<f64>,

    #[arg(long, value_parser = parse_value, allow_negative_numbers = true)]
    increment: Option<f64>,
}

impl AnalysisArgs {
    fn command(&self) -> Result<AnalysisCmd> {
        match self.analysis {
            AnalysisType::Op => Ok(AnalysisCmd::operating_point()),
            AnalysisType::Tran => match (self.step, self.end) {
                (Some(step), Some(end)) => Ok(AnalysisCmd::transient(step, end)),
                _ => bail!("tran analysis requires --step and --end"),
            },
            AnalysisType::Dc => match (&self.source, self.start, self.stop, self.increment) {
                (Some(source), Some(start), Some(stop), Some(increment)) => Ok(AnalysisCmd::Dc(
                    DcSweep::source(source.clone(), start, stop, increment),
                )),
                _ => bail!("dc analysis requires --source, --start, --stop and --increment"),
            },
        }
    }
}

#[derive(Args)]
struct EngineArgs {
    /// JSON engine configuration
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Solver backend, overriding configuration and EWB_SOLVER
    #[arg(long, value_enum)]
    backend: Option<BackendArg>,
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendArg {
    Native,
    Ngspice,
}

impl EngineArgs {
    fn load(&self) -> Result<EngineConfig> {
        let config = match &self.config {
            Some(path) => EngineConfig::from_json_file(path)?,
            None => EngineConfig::default(),
        };
        let mut config = config.with_env()?;
        if let Some(backend) = self.backend {
            config.backend = match backend {
                BackendArg::Native => BackendChoice::Native,
                BackendArg::Ngspice => BackendChoice::Ngspice,
            };
        }
        Ok(config)
    }
}

fn parse_value(token: &str) -> Result<f64, String> {
    ewb_devices::parse_spice_value(token).ok_or_else(|| format!("invalid value: {}", token))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run {
            circuit,
            analysis,
            engine,
            psf,
            precision,
        } => handle_run(&circuit, &analysis, &engine, psf.as_deref(), usize::from(precision)),
        Commands::Netlist { circuit, analysis } => handle_netlist(&circuit, &analysis),
        Commands::Validate { circuit } => handle_validate(&circuit),
        Commands::Serve { bind, engine } => handle_serve(bind, &engine),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_circuit(path: &Path) -> Result<(CircuitSpec, ewb_api::LoadedCircuit)> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let spec = CircuitSpec::from_json_str(&text)
        .with_context(|| format!("invalid circuit description {}", path.display()))?;
    let loaded = spec.build_circuit()?;
    Ok((spec, loaded))
}

fn handle_run(
    circuit: &Path,
    analysis: &AnalysisArgs,
    engine_args: &EngineArgs,
    psf: Option<&Path>,
    precision: usize,
) -> Result<()> {
    let command = analysis.command()?;
    let (_, loaded) = load_circuit(circuit)?;
    let engine = SimulationEngine::new(engine_args.load()?);
    info!(circuit = %circuit.display(), backend = engine.backend_name(), "running {}", command);

    let record = engine.simulate(&loaded.graph, command)?.wait()?;
    print_record(&record, precision);

    if let Some(path) = psf {
        engine
            .with_store(|store| store.write_psf_text(record.id, path, precision))
            .with_context(|| format!("failed to write psf {}", path.display()))?;
        println!("psf written: {}", path.display());
    }
    Ok(())
}

fn print_record(record: &RunRecord, precision: usize) {
    let result = &record.result;
    println!(
        "{} run {} on {}: {} samples, {:.3} ms",
        result.analysis,
        record.id.0,
        record.backend,
        result.sample_count(),
        record.elapsed.as_secs_f64() * 1e3
    );
    if let Some(axis) = &result.axis {
        if let Some(last) = axis.values.last() {
            println!("Final values at {} = {:.*e}:", axis.name, precision, last);
        }
    }
    for name in result.variable_names() {
        if let Some(value) = result.final_value(name) {
            println!("  {} = {:.*e}", name, precision, value);
        }
    }
}

fn handle_netlist(circuit: &Path, analysis: &AnalysisArgs) -> Result<()> {
    let command = analysis.command()?;
    let (spec, loaded) = load_circuit(circuit)?;
    let title = spec.title.unwrap_or_else(|| circuit.display().to_string());
    let netlist = NetlistBuilder::new()
        .with_title(title)
        .build(&loaded.graph.snapshot())?;
    print!("{}", netlist.to_spice(&command));
    Ok(())
}

fn handle_validate(circuit: &Path) -> Result<()> {
    let (_, loaded) = load_circuit(circuit)?;
    let report = loaded.graph.validate()?;
    println!("nodes: {}", report.node_count);
    match report.ground {
        GroundResolution::Explicit(node) => println!("ground: {} (ground component)", node),
        GroundResolution::Default(node) => println!("ground: {} (default)", node),
        GroundResolution::Unresolved => println!("ground: unresolved"),
    }
    if report.is_clean() {
        println!("no warnings");
    }
    for warning in &report.warnings {
        println!("warning: {}", warning);
    }
    Ok(())
}

fn handle_serve(bind: String, engine_args: &EngineArgs) -> Result<()> {
    let config = HttpServerConfig {
        bind_addr: bind,
        engine: engine_args.load()?,
    };
    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime.block_on(ewb_api::run(config)).map_err(anyhow::Error::msg)
}
