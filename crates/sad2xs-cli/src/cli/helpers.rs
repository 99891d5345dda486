use super::CliError;
use anyhow::Context;
use sad2xs_core::domain::{SadError, StageArtifact};
use sad2xs_core::modules::line::{BuildConventions, load_build_conventions};
use sad2xs_core::numerics::{TolerancePolicy, load_tolerance_policy};
use std::io::Write;
use std::path::Path;
use tracing::debug;
use tracing_subscriber::EnvFilter;

const LOG_ENV_VAR: &str = "SAD2XS_LOG";
const DEFAULT_LOG_DIRECTIVE: &str = "warn";

/// Logs go to stderr so stdout stays reserved for command output.
pub(super) fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV_VAR)
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVE))
    };
    if let Err(error) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
    {
        debug!(%error, "tracing subscriber already installed, keeping it");
    }
}

pub(super) fn load_conventions(
    conventions_path: Option<&Path>,
    p0c: Option<f64>,
) -> Result<BuildConventions, CliError> {
    let mut conventions = match conventions_path {
        Some(path) => load_build_conventions(path)
            .map_err(|error| CliError::Compute(SadError::from(error)))?,
        None => BuildConventions::default(),
    };
    if let Some(p0c) = p0c {
        conventions.p0c = p0c;
        conventions
            .validate()
            .map_err(|error| CliError::Compute(SadError::from(error)))?;
    }
    debug!(?conventions, "build conventions");
    Ok(conventions)
}

pub(super) fn load_policy(policy_path: &Path) -> Result<TolerancePolicy, CliError> {
    load_tolerance_policy(policy_path).map_err(|error| CliError::Compute(SadError::from(error)))
}

pub(super) fn print_artifacts(output_dir: &Path, artifacts: &[StageArtifact]) -> Result<(), CliError> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    for artifact in artifacts {
        writeln!(
            handle,
            "Wrote {}",
            output_dir.join(&artifact.relative_path).display()
        )
        .context("failed to write artifact listing to stdout")?;
    }
    Ok(())
}
