mod commands;

use clap::Parser;
use rtplan_core::domain::PlanError;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_DIRECTIVE: &str = "rtplan_core=info";

pub fn run_from_env() -> i32 {
    let args: Vec<String> = std::env::args().collect();

    match parse_and_dispatch(args) {
        Ok(code) => code,
        Err(error) => {
            let plan_error = error.as_plan_error();
            eprintln!("{}", plan_error.diagnostic_line());
            plan_error.exit_code()
        }
    }
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => {
            init_tracing(cli.verbose);
            dispatch_parsed(cli.command)
        }
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

/// Logs go to stderr so stdout carries nothing but metrics JSON.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("rtplan_core=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVE))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser)]
#[command(
    name = "rtplan-complexity",
    version,
    about = "Treatment plan complexity and deliverability metrics"
)]
struct Cli {
    /// Log recovered geometry issues
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Compute plan metrics and every beam's metrics
    Metrics(commands::MetricsArgs),
    /// Compute the metrics of a single beam
    Beam(commands::BeamArgs),
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Metrics(args) => commands::run_metrics_command(args),
        CliCommand::Beam(args) => commands::run_beam_command(args),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Compute(PlanError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<PlanError> for CliError {
    fn from(error: PlanError) -> Self {
        Self::Compute(error)
    }
}

impl CliError {
    fn as_plan_error(&self) -> PlanError {
        match self {
            Self::Usage(message) => PlanError::input_validation("INPUT.CLI_USAGE", message.clone()),
            Self::Compute(error) => error.clone(),
            Self::Internal(error) => PlanError::io_system("IO.CLI", format!("{error:#}")),
        }
    }
}
