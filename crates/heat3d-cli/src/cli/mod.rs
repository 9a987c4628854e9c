mod commands;
mod helpers;

use clap::Parser;
use heat3d_core::domain::Heat3dError;
use tracing_subscriber::EnvFilter;

pub fn run_from_env() -> i32 {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(args) {
        Ok(code) => code,
        Err(error) => {
            let error = error.as_heat3d_error();
            eprintln!("{}", error.diagnostic_line());
            if let Some(summary_line) = error.fatal_exit_line() {
                eprintln!("{}", summary_line);
            }
            error.exit_code()
        }
    }
}

pub fn run<I, S>(args: I) -> Result<i32, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let full_args = std::iter::once("heat3d".to_string())
        .chain(args.into_iter().map(Into::into))
        .collect::<Vec<_>>();
    match Cli::try_parse_from(&full_args) {
        Ok(cli) => {
            init_logging(&cli.log_level)?;
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

/// Logs go to stderr so command output on stdout stays machine readable.
fn init_logging(level: &str) -> Result<(), CliError> {
    let filter = EnvFilter::try_new(level)
        .map_err(|source| CliError::Usage(format!("invalid --log-level '{}': {}", level, source)))?;
    // A second initialization in the same process keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
    Ok(())
}

#[derive(Parser)]
#[command(name = "heat3d", about = "3D field-line trace and heat-flux footprint engine")]
struct Cli {
    /// Log filter, e.g. `info`, `debug` or `heat3d_core=debug`
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Write tracer inputs, run the field-line tracer and report psimin
    Trace(commands::TraceArgs),
    /// Compute the parallel heat flux for traced points
    Heatflux(commands::HeatfluxArgs),
    /// Evaluate a kinetic profile on normalized flux values
    Profile(commands::ProfileArgs),
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Trace(args) => commands::run_trace_command(args),
        CliCommand::Heatflux(args) => commands::run_heatflux_command(args),
        CliCommand::Profile(args) => commands::run_profile_command(args),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Compute(Heat3dError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<Heat3dError> for CliError {
    fn from(error: Heat3dError) -> Self {
        Self::Compute(error)
    }
}

impl CliError {
    fn as_heat3d_error(&self) -> Heat3dError {
        match self {
            Self::Usage(message) => Heat3dError::config("CONFIG.CLI_USAGE", message.clone()),
            Self::Compute(error) => error.clone(),
            Self::Internal(error) => Heat3dError::io_system("IO.CLI", format!("{error:#}")),
        }
    }
}
