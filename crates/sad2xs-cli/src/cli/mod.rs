mod commands;
mod helpers;

use clap::Parser;
use sad2xs_core::domain::SadError;

pub fn run_from_env() -> i32 {
    let args: Vec<String> = std::env::args().skip(1).collect();

    match run(args) {
        Ok(code) => code,
        Err(error) => {
            let diagnostic = error.as_sad_error();
            eprintln!("{}", diagnostic.diagnostic_line());
            if let Some(summary_line) = diagnostic.fatal_exit_line() {
                eprintln!("{}", summary_line);
            }
            diagnostic.exit_code()
        }
    }
}

pub fn run<I, S>(args: I) -> Result<i32, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let full_args = std::iter::once("sad2xs".to_string())
        .chain(args.into_iter().map(Into::into))
        .collect::<Vec<_>>();
    parse_and_dispatch(full_args)
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => {
            helpers::init_tracing(cli.verbose);
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

#[derive(Parser)]
#[command(
    name = "sad2xs",
    version,
    about = "Convert SAD lattices into xtrack-style lines"
)]
struct Cli {
    /// Log debug output to stderr (overrides SAD2XS_LOG and RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Parse a SAD lattice file into lattice JSON
    ParseLattice(commands::ParseLatticeArgs),
    /// Import a whitespace-separated SAD Twiss table into JSON
    ParseTwiss(commands::ParseTwissArgs),
    /// Build a line, its element table and survey from lattice JSON
    BuildLine(commands::BuildLineArgs),
    /// Compare a built line table against reference SAD optics
    Compare(commands::CompareArgs),
    /// Parse a SAD lattice and build its line in one step
    Convert(commands::ConvertArgs),
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::ParseLattice(args) => commands::run_parse_lattice_command(args),
        CliCommand::ParseTwiss(args) => commands::run_parse_twiss_command(args),
        CliCommand::BuildLine(args) => commands::run_build_line_command(args),
        CliCommand::Compare(args) => commands::run_compare_command(args),
        CliCommand::Convert(args) => commands::run_convert_command(args),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Compute(SadError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CliError {
    fn as_sad_error(&self) -> SadError {
        match self {
            Self::Usage(message) => SadError::input_validation("INPUT.CLI_USAGE", message.clone()),
            Self::Compute(error) => error.clone(),
            Self::Internal(error) => SadError::io_system("IO.CLI", format!("{error:#}")),
        }
    }
}
