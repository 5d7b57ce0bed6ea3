use super::CliError;
use super::helpers::*;
use pax_core::domain::ResponseFunction;
use pax_core::modules::deconvolve::{
    DeconvolutionConfig, DeconvolutionEngine, DivergenceMetric, RegularizerSelection,
    SeedStrategy, select_regularizer,
};
use pax_core::modules::serialization::{
    ResultReport, render_history_table, render_spectrum_table,
};
use pax_core::modules::simulate::{ForwardSimulator, NoiseKind, NoiseModel};
use serde::Serialize;
use std::path::PathBuf;

#[derive(clap::Args)]
#[command(group(clap::ArgGroup::new("kernel").required(true).args(["response", "photoemission"])))]
pub(super) struct SimulateArgs {
    /// Ground-truth RIXS spectrum table
    #[arg(long)]
    truth: PathBuf,

    /// Response kernel table, centered on its peak
    #[arg(long)]
    response: Option<PathBuf>,

    /// Photoemission spectrum; reversed and normalized into the response
    #[arg(long)]
    photoemission: Option<PathBuf>,

    /// Expected total counts across all repetitions
    #[arg(long)]
    counts: f64,

    /// Counting noise model
    #[arg(long, value_enum, default_value_t = NoiseArg::Poisson)]
    noise: NoiseArg,

    /// Random seed; repetition i uses seed + i
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Number of independent measurements sharing the count budget
    #[arg(long, default_value_t = 1)]
    repetitions: usize,

    /// Output spectrum table
    #[arg(long)]
    output: PathBuf,
}

#[derive(clap::Args)]
pub(super) struct DeconvolveArgs {
    /// Measured PAX spectrum table
    #[arg(long)]
    measured: PathBuf,

    /// Response kernel table, centered on its peak
    #[arg(long)]
    response: PathBuf,

    /// JSON deconvolution config; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: ConfigOverrides,

    /// Held-out measurement tracked every iteration
    #[arg(long)]
    validation: Option<PathBuf>,

    /// Known truth, for simulated data
    #[arg(long)]
    truth: Option<PathBuf>,

    /// Output estimate table
    #[arg(long)]
    output: PathBuf,

    /// Per-iteration history table
    #[arg(long)]
    history: Option<PathBuf>,

    /// JSON run report
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(clap::Args)]
pub(super) struct SelectRegularizerArgs {
    /// Repeated measured spectra of one sample
    #[arg(long, num_args = 1.., required = true)]
    measured: Vec<PathBuf>,

    /// Response kernel table, centered on its peak
    #[arg(long)]
    response: PathBuf,

    /// Candidate smoothing widths in energy units
    #[arg(long, value_delimiter = ',', num_args = 1.., required = true)]
    widths: Vec<f64>,

    /// Cross-validation folds
    #[arg(long, default_value_t = 2)]
    folds: usize,

    /// JSON deconvolution config; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: ConfigOverrides,

    /// JSON selection report
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(clap::Args, Default)]
pub(super) struct ConfigOverrides {
    /// Iteration cap
    #[arg(long)]
    pub(super) max_iterations: Option<usize>,

    /// Relative change below which the run converges
    #[arg(long)]
    pub(super) tolerance: Option<f64>,

    /// Consecutive residual increases before stopping; 0 disables
    #[arg(long)]
    pub(super) patience: Option<usize>,

    /// Initial estimate
    #[arg(long, value_enum)]
    pub(super) seed_strategy: Option<SeedStrategyArg>,

    /// Gaussian smoothing width applied after every update
    #[arg(long)]
    pub(super) regularizer_width: Option<f64>,

    /// Residual series watched for divergence
    #[arg(long, value_enum)]
    pub(super) divergence_metric: Option<DivergenceMetricArg>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub(super) enum NoiseArg {
    Poisson,
    Gaussian,
    Noiseless,
}

impl From<NoiseArg> for NoiseKind {
    fn from(value: NoiseArg) -> Self {
        match value {
            NoiseArg::Poisson => Self::Poisson,
            NoiseArg::Gaussian => Self::Gaussian,
            NoiseArg::Noiseless => Self::Noiseless,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub(super) enum SeedStrategyArg {
    Uniform,
    Measured,
}

impl From<SeedStrategyArg> for SeedStrategy {
    fn from(value: SeedStrategyArg) -> Self {
        match value {
            SeedStrategyArg::Uniform => Self::Uniform,
            SeedStrategyArg::Measured => Self::Measured,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub(super) enum DivergenceMetricArg {
    Residual,
    Validation,
}

impl From<DivergenceMetricArg> for DivergenceMetric {
    fn from(value: DivergenceMetricArg) -> Self {
        match value {
            DivergenceMetricArg::Residual => Self::Residual,
            DivergenceMetricArg::Validation => Self::Validation,
        }
    }
}

pub(super) fn run_simulate_command(args: SimulateArgs) -> Result<i32, CliError> {
    let truth = read_spectrum_table(&args.truth, "truth")?;
    let response = match (&args.response, &args.photoemission) {
        (Some(path), _) => read_response_table(path)?,
        (None, Some(path)) => {
            ResponseFunction::from_photoemission(&read_spectrum_table(path, "photoemission")?)?
        }
        (None, None) => {
            return Err(CliError::Usage(
                "simulate needs --response or --photoemission".to_string(),
            ));
        }
    };

    let noise = NoiseModel::new(args.counts, args.noise.into())?;
    let simulator = ForwardSimulator::new(response, noise)?;

    if args.repetitions == 1 {
        let measured = simulator.simulate(&truth, args.seed)?;
        write_artifact(&args.output, &render_spectrum_table(&measured))?;
        println!("Wrote {}", args.output.display());
        return Ok(0);
    }

    let measurements = simulator.simulate_repetitions(&truth, args.seed, args.repetitions)?;
    tracing::info!(
        repetitions = measurements.len(),
        seed = args.seed,
        "simulated repeated measurements"
    );
    for (index, measured) in measurements.iter().enumerate() {
        let path = repetition_output_path(&args.output, index);
        write_artifact(&path, &render_spectrum_table(measured))?;
    }
    println!(
        "Wrote {} repetitions next to {}",
        measurements.len(),
        args.output.display()
    );
    Ok(0)
}

pub(super) fn run_deconvolve_command(args: DeconvolveArgs) -> Result<i32, CliError> {
    let config = resolve_config(args.config.as_deref(), &args.overrides)?;
    let measured = read_spectrum_table(&args.measured, "measured")?;
    let response = read_response_table(&args.response)?;

    let mut engine = DeconvolutionEngine::new(config);
    if let Some(path) = &args.validation {
        engine = engine.with_validation(read_spectrum_table(path, "validation")?);
    }
    if let Some(path) = &args.truth {
        engine = engine.with_ground_truth(read_spectrum_table(path, "truth")?);
    }

    tracing::info!(
        measured = %args.measured.display(),
        bins = measured.len(),
        kernel = response.len(),
        "starting deconvolution"
    );
    let result = engine.run(&measured, &response)?;
    write_artifact(&args.output, &render_spectrum_table(result.estimate()))?;
    if let Some(path) = &args.history {
        write_artifact(path, &render_history_table(&result))?;
    }
    if let Some(path) = &args.report {
        write_json_artifact(path, &ResultReport::from_result(&result))?;
    }

    println!(
        "Deconvolution {} after {} iterations; wrote {}",
        result.stop_reason(),
        result.iterations(),
        args.output.display()
    );
    Ok(0)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SelectionReport<'a> {
    measurements: usize,
    folds: usize,
    #[serde(flatten)]
    selection: &'a RegularizerSelection,
}

pub(super) fn run_select_regularizer_command(args: SelectRegularizerArgs) -> Result<i32, CliError> {
    let config = resolve_config(args.config.as_deref(), &args.overrides)?;
    let measurements = args
        .measured
        .iter()
        .enumerate()
        .map(|(index, path)| read_spectrum_table(path, &format!("measured[{index}]")))
        .collect::<Result<Vec<_>, _>>()?;
    let response = read_response_table(&args.response)?;

    let selection = select_regularizer(&measurements, &response, &args.widths, args.folds, config)?;
    if let Some(path) = &args.report {
        write_json_artifact(
            path,
            &SelectionReport {
                measurements: measurements.len(),
                folds: args.folds,
                selection: &selection,
            },
        )?;
    }

    for score in &selection.scores {
        println!("width {:>12.6e}  score {:>14.6e}", score.width, score.score);
    }
    println!("Selected regularizer width {}", selection.best_width);
    Ok(0)
}

pub(super) fn apply_overrides(
    mut config: DeconvolutionConfig,
    overrides: &ConfigOverrides,
) -> Result<DeconvolutionConfig, CliError> {
    if let Some(max_iterations) = overrides.max_iterations {
        config.max_iterations = max_iterations;
    }
    if let Some(tolerance) = overrides.tolerance {
        config.relative_change_tolerance = tolerance;
    }
    if let Some(patience) = overrides.patience {
        config.residual_increase_patience = patience;
    }
    if let Some(strategy) = overrides.seed_strategy {
        config.seed_strategy = strategy.into();
    }
    if let Some(width) = overrides.regularizer_width {
        config.regularizer_width = Some(width);
    }
    if let Some(metric) = overrides.divergence_metric {
        config.divergence_metric = metric.into();
    }
    config.validate().map_err(CliError::from)?;
    Ok(config)
}
