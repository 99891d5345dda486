mod model;
mod normalize;
mod parser;

use super::ModuleExecutor;
use super::helpers::{ensure_output_dir, read_input_source, validate_request_stage, write_json_output};
use crate::domain::{PipelineStage, StageArtifact, StageRequest, StageResult};
use tracing::info;

pub use model::{
    AttributeValue, ElementKind, ElementRecord, ElementTable, LatticeDocument, SequenceEntry,
};
pub use normalize::{normalize_lattice_text, strip_comments};
pub use parser::{
    RawStatement, parse_element_block, parse_lattice, parse_line_statement, split_statements,
};

pub(crate) const LATTICE_INPUT_SUFFIXES: [&str; 2] = [".plain.sad", ".sad"];

/// Output file name for a lattice input: `ring.plain.sad` → `ring.json`.
pub fn lattice_artifact_name(request: &StageRequest) -> String {
    format!("{}.json", request.input_stem(&LATTICE_INPUT_SUFFIXES))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LatticeModule;

impl LatticeModule {
    pub fn parse(&self, request: &StageRequest) -> StageResult<LatticeDocument> {
        validate_request_stage(request, PipelineStage::ParseLattice)?;
        let source = read_input_source(&request.input_path, PipelineStage::ParseLattice)?;
        let document = parse_lattice(&source)?;
        info!(
            input = %request.input_path.display(),
            elements = document.element_count(),
            sequence = document.sequence().len(),
            "parsed lattice"
        );
        Ok(document)
    }
}

impl ModuleExecutor for LatticeModule {
    fn execute(&self, request: &StageRequest) -> StageResult<Vec<StageArtifact>> {
        let document = self.parse(request)?;
        ensure_output_dir(request)?;
        let artifact = write_json_output(request, &lattice_artifact_name(request), &document)?;
        Ok(vec![artifact])
    }
}

#[cfg(test)]
mod tests {
    use super::{ElementKind, LatticeDocument, LatticeModule, parse_lattice};
    use crate::domain::{PipelineStage, StageRequest};
    use crate::modules::ModuleExecutor;
    use crate::modules::line::{Line, LineElement, LineModule};
    use std::fs;
    use tempfile::TempDir;

    const SAMPLE_LATTICE: &str = "\
MOMENTUM = 4 GEV;
DRIFT  D1 = (L = 1.5)  D2 = (L = 0.25);
BEND   B1 = (L = 2 ANGLE = 0.01 E1 = 0.5 E2 = 0.5 F1 = 0.1 ROTATE = -90 DEG);
QUAD   QF = (L = 0.5 K1 = 0.2);
MARK   IP = ();
LINE RING = (IP D1 QF D2 B1 D2 -QF D1 -B1);
";

    #[test]
    fn execute_writes_json_named_after_input_stem() {
        let temp = TempDir::new().expect("tempdir should be created");
        let input_path = temp.path().join("ring.plain.sad");
        fs::write(&input_path, SAMPLE_LATTICE).expect("lattice should be written");
        let output_dir = temp.path().join("json");

        let request = StageRequest::new(PipelineStage::ParseLattice, &input_path, &output_dir);
        let artifacts = LatticeModule
            .execute(&request)
            .expect("lattice stage should succeed");
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].relative_path.to_string_lossy(), "ring.json");

        let content =
            fs::read_to_string(output_dir.join("ring.json")).expect("artifact should exist");
        let document: LatticeDocument =
            serde_json::from_str(&content).expect("artifact should deserialize");

        assert_eq!(document.table(ElementKind::Drift).map(|t| t.len()), Some(2));
        assert_eq!(document.sequence().len(), 9);
        assert_eq!(document.sequence()[6], "-qf");

        let bend = document
            .table(ElementKind::Bend)
            .and_then(|table| table.get("b1"))
            .expect("b1 should be parsed");
        assert_eq!(
            bend.keys().collect::<Vec<_>>(),
            vec!["angle", "e1", "e2", "f1", "l", "rotate"]
        );
        assert_eq!(bend.number("rotate", "b1").expect("numeric"), Some(-90.0));
    }

    #[test]
    fn rewritten_document_is_byte_identical() {
        let temp = TempDir::new().expect("tempdir should be created");
        let input_path = temp.path().join("ring.sad");
        fs::write(&input_path, SAMPLE_LATTICE).expect("lattice should be written");

        let first_dir = temp.path().join("first");
        let request = StageRequest::new(PipelineStage::ParseLattice, &input_path, &first_dir);
        LatticeModule.execute(&request).expect("first run should succeed");
        let first = fs::read(first_dir.join("ring.json")).expect("first artifact");

        let second_dir = temp.path().join("second");
        let request = StageRequest::new(PipelineStage::ParseLattice, &input_path, &second_dir);
        LatticeModule.execute(&request).expect("second run should succeed");
        let second = fs::read(second_dir.join("ring.json")).expect("second artifact");

        assert_eq!(first, second);
    }

    const FULL_PRECISION_LATTICE: &str = "\
DRIFT D = (L = 1.8894988582774542e-11);
QUAD Q = (L = 0.7000000000000001 K1 = -0.30000000000000004);
MARK M = (LABEL = \"fine tune\" FLAG = true OFFSET = (DX = 1.0000000000000002e-3 DY = -7.291666666666667e-5));
LINE R = (D Q M);
";

    #[test]
    fn attribute_values_survive_json_artifacts_bit_for_bit() {
        let temp = TempDir::new().expect("tempdir should be created");
        let input_path = temp.path().join("fine.sad");
        fs::write(&input_path, FULL_PRECISION_LATTICE).expect("lattice should be written");
        let parsed = parse_lattice(FULL_PRECISION_LATTICE).expect("lattice should parse");

        let request = StageRequest::new(PipelineStage::ParseLattice, &input_path, temp.path());
        LatticeModule.execute(&request).expect("lattice stage should succeed");
        let content = fs::read_to_string(temp.path().join("fine.json")).expect("lattice artifact");
        let reread: LatticeDocument =
            serde_json::from_str(&content).expect("artifact should deserialize");
        assert_eq!(reread, parsed);

        let drift_length = reread
            .table(ElementKind::Drift)
            .and_then(|table| table.get("d"))
            .and_then(|record| record.get("l"))
            .and_then(|value| value.as_number())
            .expect("drift length");
        assert_eq!(drift_length.to_bits(), 1.8894988582774542e-11_f64.to_bits());

        let build_request = StageRequest::new(
            PipelineStage::BuildLine,
            temp.path().join("fine.json"),
            temp.path(),
        );
        LineModule::default()
            .execute(&build_request)
            .expect("line stage should succeed");
        let line: Line = serde_json::from_str(
            &fs::read_to_string(temp.path().join("fine.line.json")).expect("line artifact"),
        )
        .expect("line should deserialize");

        match line.elements.get("d.1") {
            Some(LineElement::Drift { length }) => {
                assert_eq!(length.to_bits(), 1.8894988582774542e-11_f64.to_bits());
            }
            other => panic!("unexpected drift element: {other:?}"),
        }
        let expected_k1 = -0.30000000000000004_f64 / 0.7000000000000001;
        match line.elements.get("q.1") {
            Some(LineElement::Quadrupole { length, k1 }) => {
                assert_eq!(length.to_bits(), 0.7000000000000001_f64.to_bits());
                assert_eq!(k1.to_bits(), expected_k1.to_bits());
            }
            other => panic!("unexpected quadrupole element: {other:?}"),
        }
    }

    #[test]
    fn missing_input_maps_to_io_error() {
        let temp = TempDir::new().expect("tempdir should be created");
        let request = StageRequest::new(
            PipelineStage::ParseLattice,
            temp.path().join("absent.sad"),
            temp.path(),
        );
        let error = LatticeModule
            .execute(&request)
            .expect_err("missing input should fail");
        assert_eq!(error.placeholder(), "IO.STAGE_INPUT_READ");
        assert_eq!(error.exit_code(), 3);
    }
}
