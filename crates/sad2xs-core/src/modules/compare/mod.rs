mod model;
mod report;

use super::ModuleExecutor;
use super::helpers::{ensure_output_dir, read_json_input, validate_request_stage, write_json_output};
use crate::domain::{PipelineStage, SadError, StageArtifact, StageRequest, StageResult};
use crate::modules::twiss::TwissTable;
use crate::numerics::{
    CompiledTolerancePolicy, TolerancePolicy, compare_with_policy_tolerance, interpolate_onto,
    is_non_decreasing, max_abs, root_mean_square,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub use model::{ComputedOptics, REFERENCE_COLUMN_MAP, ReferenceOptics, TwissInit};
pub use report::{BetaBeating, ColumnCheck, CommonElement, ComparisonReport, render_human_summary};

pub(crate) const COMPARE_INPUT_SUFFIXES: [&str; 2] = [".twiss.json", ".json"];

/// `ring.twiss.json` → `ring.compare.json`.
pub fn compare_artifact_name(request: &StageRequest) -> String {
    format!("{}.compare.json", request.input_stem(&COMPARE_INPUT_SUFFIXES))
}

/// Line-side inputs of a comparison; the reference Twiss JSON is the request
/// input.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompareModule {
    pub line_table_path: PathBuf,
    pub optics_path: Option<PathBuf>,
    pub policy: TolerancePolicy,
}

impl CompareModule {
    pub fn new(line_table_path: impl Into<PathBuf>) -> Self {
        Self {
            line_table_path: line_table_path.into(),
            ..Self::default()
        }
    }

    pub fn with_optics(mut self, optics_path: impl Into<PathBuf>) -> Self {
        self.optics_path = Some(optics_path.into());
        self
    }

    pub fn with_policy(mut self, policy: TolerancePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Runs the comparison and writes the report. A failing comparison is
    /// still a successful run; callers read `passed` from the report.
    pub fn run(&self, request: &StageRequest) -> StageResult<(ComparisonReport, StageArtifact)> {
        validate_request_stage(request, PipelineStage::Compare)?;
        let policy = CompiledTolerancePolicy::compile(&self.policy)?;

        let reference_table: TwissTable =
            read_json_input(&request.input_path, PipelineStage::Compare)?;
        let reference = ReferenceOptics::from_twiss(&reference_table)?;
        let line_table: TwissTable = read_json_input(&self.line_table_path, PipelineStage::Compare)?;
        let optics = match &self.optics_path {
            Some(path) => {
                let table: TwissTable = read_json_input(path, PipelineStage::Compare)?;
                Some(ComputedOptics::from_table(&table)?)
            }
            None => None,
        };

        let mut report = compare_optics(&line_table, &reference, optics.as_ref(), &policy)?;
        report.line_table_path = normalize_path(&self.line_table_path);
        report.reference_path = normalize_path(&request.input_path);
        report.optics_path = self.optics_path.as_deref().map(normalize_path);

        ensure_output_dir(request)?;
        let artifact = write_json_output(request, &compare_artifact_name(request), &report)?;
        info!(
            passed = report.passed,
            common = report.common_element_count,
            "compared line against reference twiss"
        );
        Ok((report, artifact))
    }
}

impl ModuleExecutor for CompareModule {
    fn execute(&self, request: &StageRequest) -> StageResult<Vec<StageArtifact>> {
        let (_, artifact) = self.run(request)?;
        Ok(vec![artifact])
    }
}

/// Aligns the line table with the reference by element name and checks `s`;
/// with computed optics also derives the beta-beating series.
pub fn compare_optics(
    line_table: &TwissTable,
    reference: &ReferenceOptics,
    optics: Option<&ComputedOptics>,
    policy: &CompiledTolerancePolicy,
) -> StageResult<ComparisonReport> {
    let line_names = line_table.text_column("name")?;
    let line_s = line_table.numeric_column("s")?;

    let (s_tolerance, s_category) = policy.resolve("s");
    let mut s_check = ColumnCheck::new("s", s_tolerance, s_category);
    let reference_rows = reference.first_rows();
    let mut common_elements = Vec::new();
    for (name, s) in line_names.iter().zip(line_s) {
        let Some(&row) = reference_rows.get(name.as_str()) else {
            continue;
        };
        let s_reference = reference.s[row];
        let comparison = compare_with_policy_tolerance(s_reference, *s, s_tolerance);
        s_check.record(comparison.abs_diff, comparison.passes);
        common_elements.push(CommonElement {
            name: name.clone(),
            s: *s,
            s_reference,
            abs_diff: comparison.abs_diff,
            passed: comparison.passes,
        });
    }

    let beta_beating = optics
        .map(|optics| beta_beating(reference, optics, policy))
        .transpose()?;

    let mut reason = None;
    if common_elements.is_empty() {
        warn!("no element names are shared between line and reference");
        reason = Some("line and reference share no element names".to_string());
    } else if !s_check.passed {
        reason = Some(format!(
            "{} of {} common elements outside s tolerance",
            s_check.failed, s_check.compared
        ));
    } else if let Some(beating) = beta_beating
        .as_ref()
        .filter(|beating| !(beating.betx_check.passed && beating.bety_check.passed))
    {
        reason = Some(format!(
            "beta beating outside tolerance at {} (x) and {} (y) points",
            beating.betx_check.failed, beating.bety_check.failed
        ));
    }

    Ok(ComparisonReport {
        passed: reason.is_none(),
        reason,
        line_table_path: String::new(),
        reference_path: String::new(),
        optics_path: None,
        line_element_count: line_names.len(),
        reference_row_count: reference.len(),
        common_element_count: common_elements.len(),
        twiss_init: reference.twiss_init(),
        s_check,
        common_elements,
        beta_beating,
    })
}

fn beta_beating(
    reference: &ReferenceOptics,
    optics: &ComputedOptics,
    policy: &CompiledTolerancePolicy,
) -> StageResult<BetaBeating> {
    if !is_non_decreasing(&reference.s) {
        return Err(SadError::input_validation(
            "INPUT.COMPARE_REFERENCE_ORDER",
            "reference s(m) column must be non-decreasing for interpolation",
        ));
    }
    let interpolate = |values: &[f64]| {
        interpolate_onto(&optics.s, &reference.s, values).ok_or_else(|| {
            SadError::internal(
                "SYS.COMPARE_INTERPOLATION",
                "reference optics could not be interpolated onto computed s",
            )
        })
    };
    let betx_reference = interpolate(&reference.betx[..])?;
    let bety_reference = interpolate(&reference.bety[..])?;

    let (betx_beating, betx_check) = beating_series("betx", &optics.betx, &betx_reference, policy);
    let (bety_beating, bety_check) = beating_series("bety", &optics.bety, &bety_reference, policy);

    Ok(BetaBeating {
        s: optics.s.clone(),
        max_abs_betx_beating: max_abs(&betx_beating),
        max_abs_bety_beating: max_abs(&bety_beating),
        rms_betx_beating: root_mean_square(&betx_beating),
        rms_bety_beating: root_mean_square(&bety_beating),
        betx_reference,
        bety_reference,
        betx_beating,
        bety_beating,
        betx_check,
        bety_check,
    })
}

fn beating_series(
    column: &str,
    computed: &[f64],
    reference: &[f64],
    policy: &CompiledTolerancePolicy,
) -> (Vec<f64>, ColumnCheck) {
    let (tolerance, category) = policy.resolve(column);
    let mut check = ColumnCheck::new(column, tolerance, category);
    let series: Vec<f64> = computed
        .iter()
        .zip(reference)
        .map(|(beta, beta_reference)| {
            let comparison = compare_with_policy_tolerance(*beta_reference, *beta, tolerance);
            check.record(comparison.abs_diff, comparison.passes);
            beta / beta_reference - 1.0
        })
        .collect();
    (series, check)
}

fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
