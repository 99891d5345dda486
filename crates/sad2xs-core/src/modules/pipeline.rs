use super::ModuleExecutor;
use super::lattice::{LatticeModule, lattice_artifact_name};
use super::line::{BuildConventions, LineModule};
use crate::domain::{PipelineStage, StageArtifact, StageRequest, StageResult};
use std::path::{Path, PathBuf};
use tracing::info;

/// Artifacts of a lattice-to-line conversion, in the order they were written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertOutcome {
    pub lattice_json: PathBuf,
    pub artifacts: Vec<StageArtifact>,
}

/// Parses a SAD lattice and builds its line in one go. The intermediate
/// lattice JSON is kept in `output_dir` so the build can be rerun alone.
pub fn convert_lattice(
    lattice_path: &Path,
    output_dir: &Path,
    conventions: BuildConventions,
) -> StageResult<ConvertOutcome> {
    let parse_request = StageRequest::new(PipelineStage::ParseLattice, lattice_path, output_dir);
    let mut artifacts = LatticeModule.execute(&parse_request)?;
    let lattice_json = output_dir.join(lattice_artifact_name(&parse_request));

    let build_request = StageRequest::new(PipelineStage::BuildLine, &lattice_json, output_dir);
    artifacts.extend(LineModule::new(conventions).execute(&build_request)?);

    info!(
        input = %lattice_path.display(),
        artifacts = artifacts.len(),
        "converted lattice"
    );
    Ok(ConvertOutcome {
        lattice_json,
        artifacts,
    })
}
