use super::serialization::{render_json_artifact, write_text_artifact};
use crate::domain::{PipelineStage, SadError, StageArtifact, StageRequest, StageResult};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

pub(crate) fn validate_request_stage(
    request: &StageRequest,
    expected: PipelineStage,
) -> StageResult<()> {
    if request.stage != expected {
        return Err(SadError::input_validation(
            "INPUT.STAGE_MISMATCH",
            format!("stage expects a {} request, got {}", expected, request.stage),
        ));
    }
    Ok(())
}

pub(crate) fn read_input_source(path: &Path, stage: PipelineStage) -> StageResult<String> {
    fs::read_to_string(path).map_err(|source| {
        SadError::io_system(
            "IO.STAGE_INPUT_READ",
            format!(
                "failed to read {} input '{}': {}",
                stage,
                path.display(),
                source
            ),
        )
    })
}

pub(crate) fn read_json_input<T: DeserializeOwned>(
    path: &Path,
    stage: PipelineStage,
) -> StageResult<T> {
    let source = read_input_source(path, stage)?;
    serde_json::from_str(&source).map_err(|source| {
        SadError::input_validation(
            "INPUT.STAGE_INPUT_JSON",
            format!(
                "failed to parse {} input '{}': {}",
                stage,
                path.display(),
                source
            ),
        )
    })
}

pub(crate) fn ensure_output_dir(request: &StageRequest) -> StageResult<()> {
    fs::create_dir_all(&request.output_dir).map_err(|source| {
        SadError::io_system(
            "IO.STAGE_OUTPUT_DIRECTORY",
            format!(
                "failed to create {} output directory '{}': {}",
                request.stage,
                request.output_dir.display(),
                source
            ),
        )
    })
}

/// Serializes `value` into `<output_dir>/<file_name>` and returns the artifact
/// entry for it.
pub(crate) fn write_json_output<T: Serialize + ?Sized>(
    request: &StageRequest,
    file_name: &str,
    value: &T,
) -> StageResult<StageArtifact> {
    let content = render_json_artifact(value).map_err(|source| {
        SadError::internal(
            "SYS.STAGE_SERIALIZE",
            format!(
                "failed to serialize {} artifact '{}': {}",
                request.stage, file_name, source
            ),
        )
    })?;

    let output_path = request.output_dir.join(file_name);
    write_text_artifact(&output_path, &content).map_err(|source| {
        SadError::io_system(
            "IO.STAGE_OUTPUT_WRITE",
            format!(
                "failed to write {} artifact '{}': {}",
                request.stage,
                output_path.display(),
                source
            ),
        )
    })?;

    Ok(StageArtifact::new(file_name))
}

#[cfg(test)]
mod tests {
    use super::{read_json_input, validate_request_stage, write_json_output};
    use crate::domain::{PipelineStage, SadErrorCategory, StageRequest};
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn stage_mismatch_is_an_input_error() {
        let request = StageRequest::new(PipelineStage::ParseTwiss, "ring.sad", "out");
        let error = validate_request_stage(&request, PipelineStage::ParseLattice)
            .expect_err("mismatched stage should fail");
        assert_eq!(error.placeholder(), "INPUT.STAGE_MISMATCH");
        assert_eq!(error.category(), SadErrorCategory::InputValidationError);
    }

    #[test]
    fn json_output_round_trips_through_reader() {
        let temp = TempDir::new().expect("tempdir should be created");
        let request = StageRequest::new(PipelineStage::ParseTwiss, "in.twiss", temp.path());
        let mut value = BTreeMap::new();
        value.insert("betx".to_string(), vec![1.0, 2.5]);

        let artifact = write_json_output(&request, "value.json", &value)
            .expect("artifact should be written");
        assert_eq!(artifact.relative_path.to_string_lossy(), "value.json");

        let reread: BTreeMap<String, Vec<f64>> =
            read_json_input(&temp.path().join("value.json"), PipelineStage::Compare)
                .expect("artifact should parse");
        assert_eq!(reread, value);
    }

    #[test]
    fn missing_input_is_an_io_error() {
        let temp = TempDir::new().expect("tempdir should be created");
        let error = read_json_input::<BTreeMap<String, f64>>(
            &temp.path().join("missing.json"),
            PipelineStage::BuildLine,
        )
        .expect_err("missing file should fail");
        assert_eq!(error.placeholder(), "IO.STAGE_INPUT_READ");
        assert_eq!(error.exit_code(), 3);
    }
}
