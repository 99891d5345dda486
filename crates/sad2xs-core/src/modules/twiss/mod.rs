mod model;
mod parser;

use super::ModuleExecutor;
use super::helpers::{ensure_output_dir, read_input_source, validate_request_stage, write_json_output};
use crate::domain::{PipelineStage, StageArtifact, StageRequest, StageResult};
use tracing::info;

pub use model::{ColumnValues, TwissColumn, TwissTable};
pub use parser::{REPEATED_HEADER_SENTINEL, parse_twiss_table};

/// `ring.twiss` → `ring.twiss.json`.
pub fn twiss_artifact_name(request: &StageRequest) -> String {
    format!("{}.json", request.input_stem(&[]))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TwissModule;

impl TwissModule {
    pub fn parse(&self, request: &StageRequest) -> StageResult<TwissTable> {
        validate_request_stage(request, PipelineStage::ParseTwiss)?;
        let source = read_input_source(&request.input_path, PipelineStage::ParseTwiss)?;
        let table = parse_twiss_table(&source)?;
        info!(
            input = %request.input_path.display(),
            columns = table.columns().len(),
            rows = table.row_count(),
            "parsed twiss table"
        );
        Ok(table)
    }
}

impl ModuleExecutor for TwissModule {
    fn execute(&self, request: &StageRequest) -> StageResult<Vec<StageArtifact>> {
        let table = self.parse(request)?;
        ensure_output_dir(request)?;
        let artifact = write_json_output(request, &twiss_artifact_name(request), &table)?;
        Ok(vec![artifact])
    }
}

#[cfg(test)]
mod tests {
    use super::TwissModule;
    use crate::domain::{PipelineStage, StageRequest};
    use crate::modules::ModuleExecutor;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn execute_writes_columns_in_header_order() {
        let temp = TempDir::new().expect("tempdir should be created");
        let input_path = temp.path().join("ring.twiss");
        fs::write(
            &input_path,
            "Element s(m) BX\nIP 0 8.0\nQF.1 1.5 12.25\nElement s(m) BX\nQD.1 3 4\n",
        )
        .expect("twiss should be written");

        let request = StageRequest::new(PipelineStage::ParseTwiss, &input_path, temp.path());
        let artifacts = TwissModule
            .execute(&request)
            .expect("twiss stage should succeed");
        assert_eq!(artifacts[0].relative_path.to_string_lossy(), "ring.twiss.json");

        let content = fs::read_to_string(temp.path().join("ring.twiss.json"))
            .expect("artifact should exist");
        let keys_in_order: Vec<usize> = ["\"Element\"", "\"s(m)\"", "\"BX\""]
            .iter()
            .map(|key| content.find(key).expect("key should be present"))
            .collect();
        assert!(keys_in_order.windows(2).all(|pair| pair[0] < pair[1]));

        let value: serde_json::Value =
            serde_json::from_str(&content).expect("artifact should be valid json");
        assert_eq!(value["BX"], serde_json::json!([8.0, 12.25, 4.0]));
        assert_eq!(value["Element"], serde_json::json!(["IP", "QF.1", "QD.1"]));
    }

    #[test]
    fn lattice_stage_request_is_rejected() {
        let request = StageRequest::new(PipelineStage::ParseLattice, "ring.twiss", "out");
        let error = TwissModule
            .execute(&request)
            .expect_err("wrong stage should fail");
        assert_eq!(error.placeholder(), "INPUT.STAGE_MISMATCH");
    }
}
