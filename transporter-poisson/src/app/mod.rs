//! The command line application: reads a device and the solver configuration, runs the solve and
//! reports on the result
mod configuration;
mod telemetry;

pub(crate) use configuration::Configuration;

use crate::device::{build_electrodes, Device};
use crate::problem::{PoissonProblemBuilder, Solution};
use clap::{ArgEnum, Parser};
use color_eyre::eyre::eyre;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use transporter_mesher::{GridGeometry, GridScalar};

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct App {
    /// The device description
    file_path: Option<PathBuf>,
    #[clap(arg_enum, short, long, default_value = "info")]
    log_level: LogLevel,
    #[clap(arg_enum, short, long, default_value = "double")]
    precision: Precision,
    /// Return the constraint values without solving
    #[clap(long)]
    box_only: bool,
    /// Skip the second pass inside a Dirichlet box
    #[clap(long)]
    no_boundary_correction: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ArgEnum)]
pub(crate) enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        write!(f, "{level}")
    }
}

impl LogLevel {
    fn as_log_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ArgEnum)]
enum Precision {
    Single,
    Double,
}

pub fn run() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let cli = App::parse();

    let _guard = telemetry::install(cli.log_level)?;

    let path = cli
        .file_path
        .clone()
        .ok_or_else(|| eyre!("A device file path needs to be passed."))?;
    tracing::info!("Reading device from {}", path.display());

    match cli.precision {
        Precision::Single => solve_device::<f32>(&cli, path),
        Precision::Double => solve_device::<f64>(&cli, path),
    }
}

fn solve_device<T>(cli: &App, path: PathBuf) -> color_eyre::Result<()>
where
    T: GridScalar + DeserializeOwned,
{
    let mut config: Configuration<T> = Configuration::build()?;
    if cli.box_only {
        config.solver.workflow.box_only = true;
    }
    if cli.no_boundary_correction {
        config.solver.workflow.boundary_correction = false;
    }

    let device: Device<T> = Device::build(path)?;
    let (geometry, potentials) = device.into_geometry()?;
    let electrodes = build_electrodes(&geometry, &potentials)?;
    let grid = GridGeometry::new(
        config.grid.shape()?,
        geometry.cell().clone(),
        config.grid.boundary()?,
    );

    let mut builder = PoissonProblemBuilder::new()
        .with_geometry(&grid)
        .with_electrodes(&electrodes)
        .with_electrode_settings(&config.electrodes)
        .with_solver_settings(&config.solver.settings)
        .with_workflow(config.solver.workflow);
    if let Some(shape) = config.grid.output_shape()? {
        builder = builder.with_output_shape(shape);
    }
    let solution = builder.build().solve()?;

    summarise(&solution);
    Ok(())
}

fn summarise<T: GridScalar>(solution: &Solution<T>) {
    for report in solution.reports() {
        let last = report
            .residuals
            .last()
            .and_then(|residual| residual.to_f64())
            .unwrap_or(0.0);
        tracing::info!(
            "{} pass: {} iterations, final relative residual {:e}",
            report.pass,
            report.iterations,
            last
        );
    }
    for warning in solution.warnings() {
        eprintln!("{:?}", miette::Report::new(warning.clone()));
    }

    let output = solution.output();
    let values = output.values();
    tracing::info!(
        "Solved field of shape {:?} at stage {:?}, ranging over [{}, {}]",
        output.shape().dims(),
        solution.stage(),
        values.min().to_f64().unwrap_or(f64::NAN),
        values.max().to_f64().unwrap_or(f64::NAN)
    );
}
