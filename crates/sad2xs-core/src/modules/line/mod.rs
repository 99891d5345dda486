mod builder;
mod conventions;
mod model;
mod survey;

use super::ModuleExecutor;
use super::helpers::{ensure_output_dir, read_json_input, validate_request_stage, write_json_output};
use crate::domain::{PipelineStage, StageArtifact, StageRequest, StageResult};
use crate::modules::lattice::LatticeDocument;
use tracing::info;

pub use builder::{build_line, convert_element, convert_elements, expand_sequence};
pub use conventions::{
    BuildConventions, BuildConventionsError, OccurrenceSuffix, QuadStrength, SkewQuadrupole,
    load_build_conventions,
};
pub use model::{ConvertedElement, EdgeSide, Line, LineElement, ParticleRef};
pub use survey::{SURVEY_END_POINT, SurveyRow, survey_line, survey_table};

pub(crate) const LINE_INPUT_SUFFIXES: [&str; 1] = [".json"];

/// Artifact names for a build, in the order they are written.
pub fn line_artifact_names(request: &StageRequest) -> [String; 3] {
    let stem = request.input_stem(&LINE_INPUT_SUFFIXES);
    [
        format!("{}.line.json", stem),
        format!("{}.table.json", stem),
        format!("{}.survey.json", stem),
    ]
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LineModule {
    conventions: BuildConventions,
}

impl LineModule {
    pub fn new(conventions: BuildConventions) -> Self {
        Self { conventions }
    }

    pub fn conventions(&self) -> &BuildConventions {
        &self.conventions
    }

    pub fn build(&self, request: &StageRequest) -> StageResult<Line> {
        validate_request_stage(request, PipelineStage::BuildLine)?;
        let document: LatticeDocument =
            read_json_input(&request.input_path, PipelineStage::BuildLine)?;
        build_line(&document, &self.conventions)
    }
}

impl ModuleExecutor for LineModule {
    fn execute(&self, request: &StageRequest) -> StageResult<Vec<StageArtifact>> {
        let line = self.build(request)?;
        let table = line.table()?;
        let survey = survey_table(&survey_line(&line))?;

        ensure_output_dir(request)?;
        let [line_name, table_name, survey_name] = line_artifact_names(request);
        let artifacts = vec![
            write_json_output(request, &line_name, &line)?,
            write_json_output(request, &table_name, &table)?,
            write_json_output(request, &survey_name, &survey)?,
        ];
        info!(
            output = %request.output_dir.display(),
            artifacts = artifacts.len(),
            "wrote line artifacts"
        );
        Ok(artifacts)
    }
}
