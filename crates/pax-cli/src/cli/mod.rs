mod commands;
mod helpers;

use clap::Parser;
use pax_core::domain::{PaxError, PaxErrorCategory, diagnostic_line};
use tracing_subscriber::EnvFilter;

const PROGRAM_NAME: &str = "pax-deconvolve";

pub fn run_from_env() -> i32 {
    init_logging();
    let args = std::env::args().skip(1).collect::<Vec<_>>();

    match run(args) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("{}", error.diagnostic_line());
            error.exit_code()
        }
    }
}

pub fn run<I, S>(args: I) -> Result<i32, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let full_args = std::iter::once(PROGRAM_NAME.to_string())
        .chain(args.into_iter().map(Into::into))
        .collect::<Vec<_>>();
    parse_and_dispatch(full_args)
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => dispatch_parsed(cli.command),
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

/// `RUST_LOG` wins; otherwise only warnings reach stderr.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[derive(Parser)]
#[command(
    name = "pax-deconvolve",
    version,
    about = "Simulate and deconvolve PAX spectra into RIXS estimates"
)]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Blur a ground-truth spectrum with a response and draw counting noise
    Simulate(commands::SimulateArgs),
    /// Run Richardson-Lucy deconvolution on a measured spectrum
    Deconvolve(commands::DeconvolveArgs),
    /// Cross-validate regularizer widths over repeated measurements
    SelectRegularizer(commands::SelectRegularizerArgs),
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Simulate(args) => commands::run_simulate_command(args),
        CliCommand::Deconvolve(args) => commands::run_deconvolve_command(args),
        CliCommand::SelectRegularizer(args) => commands::run_select_regularizer_command(args),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Compute(#[from] PaxError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CliError {
    pub fn category(&self) -> PaxErrorCategory {
        match self {
            Self::Usage(_) => PaxErrorCategory::InputValidationError,
            Self::Compute(error) => error.category(),
            Self::Internal(_) => PaxErrorCategory::IoSystemError,
        }
    }

    pub fn placeholder(&self) -> &'static str {
        match self {
            Self::Usage(_) => "INPUT.CLI_USAGE",
            Self::Compute(error) => error.placeholder(),
            Self::Internal(_) => "IO.CLI",
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.category().exit_code()
    }

    pub fn diagnostic_line(&self) -> String {
        let message = match self {
            Self::Usage(message) => message.trim_end().to_string(),
            Self::Compute(error) => error.to_string(),
            Self::Internal(error) => format!("{error:#}"),
        };
        diagnostic_line(self.category(), self.placeholder(), &message)
    }
}

#[cfg(test)]
mod tests {
    use super::{CliError, run};
    use pax_core::domain::PaxError;

    #[test]
    fn error_categories_map_to_exit_codes() {
        let usage = CliError::Usage("bad flag".to_string());
        assert_eq!(usage.exit_code(), 2);
        assert_eq!(usage.diagnostic_line(), "ERROR: [INPUT.CLI_USAGE] bad flag");

        let io = CliError::Internal(anyhow::anyhow!("disk gone"));
        assert_eq!(io.exit_code(), 3);

        let compute = CliError::from(PaxError::DegenerateSpectrum {
            label: "measured",
            sum: 0.0,
            epsilon: 1.0e-12,
        });
        assert_eq!(compute.exit_code(), 4);
        assert!(
            compute
                .diagnostic_line()
                .starts_with("ERROR: [RUN.DEGENERATE_SPECTRUM]")
        );
    }

    #[test]
    fn unknown_subcommands_are_usage_errors() {
        let error = run(["transmogrify"]).expect_err("unknown command");
        assert!(matches!(error, CliError::Usage(_)));
        assert_eq!(run(["--help"]).expect("help"), 0);
    }
}
