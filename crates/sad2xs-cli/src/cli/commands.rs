use super::CliError;
use super::helpers::{load_conventions, load_policy, print_artifacts};
use sad2xs_core::domain::{PipelineStage, StageRequest};
use sad2xs_core::modules::compare::{CompareModule, render_human_summary};
use sad2xs_core::modules::lattice::LatticeModule;
use sad2xs_core::modules::line::LineModule;
use sad2xs_core::modules::twiss::TwissModule;
use sad2xs_core::modules::{ModuleExecutor, convert_lattice};
use std::path::PathBuf;

#[derive(clap::Args)]
pub(super) struct ParseLatticeArgs {
    /// SAD lattice file
    input: PathBuf,

    /// Directory for the lattice JSON
    #[arg(long, default_value = "json")]
    output_dir: PathBuf,
}

#[derive(clap::Args)]
pub(super) struct ParseTwissArgs {
    /// SAD Twiss table (first line is the header)
    input: PathBuf,

    /// Directory for the Twiss JSON
    #[arg(long, default_value = "json")]
    output_dir: PathBuf,
}

#[derive(clap::Args)]
pub(super) struct BuildArgs {
    /// Build conventions JSON; defaults apply to omitted fields
    #[arg(long)]
    conventions: Option<PathBuf>,

    /// Reference momentum in eV, overriding the conventions file
    #[arg(long)]
    p0c: Option<f64>,
}

#[derive(clap::Args)]
pub(super) struct BuildLineArgs {
    /// Lattice JSON written by parse-lattice
    input: PathBuf,

    /// Directory for the line, table and survey JSON
    #[arg(long, default_value = "json")]
    output_dir: PathBuf,

    #[command(flatten)]
    build: BuildArgs,
}

#[derive(clap::Args)]
pub(super) struct ConvertArgs {
    /// SAD lattice file
    lattice: PathBuf,

    /// Directory for the lattice, line, table and survey JSON
    #[arg(long, default_value = "json")]
    output_dir: PathBuf,

    #[command(flatten)]
    build: BuildArgs,
}

#[derive(clap::Args)]
pub(super) struct CompareArgs {
    /// Reference Twiss JSON written by parse-twiss
    reference: PathBuf,

    /// Line table JSON written by build-line
    #[arg(long)]
    line_table: PathBuf,

    /// Optics table JSON with s, betx and bety columns along the line
    #[arg(long)]
    optics: Option<PathBuf>,

    /// Numeric tolerance policy JSON
    #[arg(long)]
    policy: Option<PathBuf>,

    /// Directory for the comparison report
    #[arg(long, default_value = "json")]
    output_dir: PathBuf,
}

pub(super) fn run_parse_lattice_command(args: ParseLatticeArgs) -> Result<i32, CliError> {
    let request = StageRequest::new(PipelineStage::ParseLattice, args.input, args.output_dir);
    let artifacts = LatticeModule
        .execute(&request)
        .map_err(CliError::Compute)?;
    print_artifacts(&request.output_dir, &artifacts)?;
    Ok(0)
}

pub(super) fn run_parse_twiss_command(args: ParseTwissArgs) -> Result<i32, CliError> {
    let request = StageRequest::new(PipelineStage::ParseTwiss, args.input, args.output_dir);
    let artifacts = TwissModule.execute(&request).map_err(CliError::Compute)?;
    print_artifacts(&request.output_dir, &artifacts)?;
    Ok(0)
}

pub(super) fn run_build_line_command(args: BuildLineArgs) -> Result<i32, CliError> {
    let conventions = load_conventions(args.build.conventions.as_deref(), args.build.p0c)?;
    let request = StageRequest::new(PipelineStage::BuildLine, args.input, args.output_dir);
    let artifacts = LineModule::new(conventions)
        .execute(&request)
        .map_err(CliError::Compute)?;
    print_artifacts(&request.output_dir, &artifacts)?;
    Ok(0)
}

pub(super) fn run_convert_command(args: ConvertArgs) -> Result<i32, CliError> {
    let conventions = load_conventions(args.build.conventions.as_deref(), args.build.p0c)?;
    let outcome = convert_lattice(&args.lattice, &args.output_dir, conventions)
        .map_err(CliError::Compute)?;
    print_artifacts(&args.output_dir, &outcome.artifacts)?;
    Ok(0)
}

pub(super) fn run_compare_command(args: CompareArgs) -> Result<i32, CliError> {
    let mut module = CompareModule::new(args.line_table);
    if let Some(optics) = args.optics {
        module = module.with_optics(optics);
    }
    if let Some(policy_path) = args.policy.as_deref() {
        module = module.with_policy(load_policy(policy_path)?);
    }

    let request = StageRequest::new(PipelineStage::Compare, args.reference, args.output_dir);
    let (report, artifact) = module.run(&request).map_err(CliError::Compute)?;
    println!("{}", render_human_summary(&report));
    println!(
        "JSON report: {}",
        request.output_dir.join(&artifact.relative_path).display()
    );

    if report.passed { Ok(0) } else { Ok(1) }
}
