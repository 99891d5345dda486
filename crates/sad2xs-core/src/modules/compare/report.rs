use super::model::TwissInit;
use crate::numerics::{NumericTolerance, format_numeric_for_policy};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub passed: bool,
    pub reason: Option<String>,
    pub line_table_path: String,
    pub reference_path: String,
    pub optics_path: Option<String>,
    pub line_element_count: usize,
    pub reference_row_count: usize,
    pub common_element_count: usize,
    pub twiss_init: Option<TwissInit>,
    pub s_check: ColumnCheck,
    pub common_elements: Vec<CommonElement>,
    pub beta_beating: Option<BetaBeating>,
}

/// Position of one element present in both the line and the reference.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommonElement {
    pub name: String,
    pub s: f64,
    pub s_reference: f64,
    pub abs_diff: f64,
    pub passed: bool,
}

/// Tolerance verdict for one column over all compared points.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnCheck {
    pub column: String,
    pub tolerance_category: Option<String>,
    pub tolerance: NumericTolerance,
    pub compared: usize,
    pub failed: usize,
    pub max_abs_diff: f64,
    pub passed: bool,
}

impl ColumnCheck {
    pub fn new(
        column: &str,
        tolerance: NumericTolerance,
        tolerance_category: Option<&str>,
    ) -> Self {
        Self {
            column: column.to_string(),
            tolerance_category: tolerance_category.map(str::to_string),
            tolerance,
            compared: 0,
            failed: 0,
            max_abs_diff: 0.0,
            passed: true,
        }
    }

    pub fn record(&mut self, abs_diff: f64, passes: bool) {
        self.compared += 1;
        if abs_diff.is_finite() {
            self.max_abs_diff = self.max_abs_diff.max(abs_diff);
        }
        if !passes {
            self.failed += 1;
            self.passed = false;
        }
    }
}

/// `beta / beta_ref - 1` along the computed optics, with the reference
/// interpolated onto the computed `s`.
#[derive(Debug, Clone, Serialize)]
pub struct BetaBeating {
    pub s: Vec<f64>,
    pub betx_reference: Vec<f64>,
    pub bety_reference: Vec<f64>,
    pub betx_beating: Vec<f64>,
    pub bety_beating: Vec<f64>,
    pub max_abs_betx_beating: f64,
    pub max_abs_bety_beating: f64,
    pub rms_betx_beating: Option<f64>,
    pub rms_bety_beating: Option<f64>,
    pub betx_check: ColumnCheck,
    pub bety_check: ColumnCheck,
}

fn status(passed: bool) -> &'static str {
    if passed { "PASS" } else { "FAIL" }
}

fn describe_check(label: &str, check: &ColumnCheck) -> String {
    format!(
        "{}: {} ({} of {} outside tolerance, max_abs_diff={}, category={})",
        label,
        status(check.passed),
        check.failed,
        check.compared,
        format_numeric_for_policy(check.max_abs_diff),
        check.tolerance_category.as_deref().unwrap_or("default")
    )
}

pub fn render_human_summary(report: &ComparisonReport) -> String {
    let mut lines = Vec::new();
    lines.push(format!("Comparison status: {}", status(report.passed)));
    lines.push(format!(
        "Elements: {} in line, {} reference rows, {} in common",
        report.line_element_count, report.reference_row_count, report.common_element_count
    ));
    lines.push(describe_check("s deviation", &report.s_check));

    if let Some(beating) = &report.beta_beating {
        lines.push(format!(
            "Beta beating over {} points: max |betx/betx_ref - 1| = {:.6}, max |bety/bety_ref - 1| = {:.6}",
            beating.s.len(),
            beating.max_abs_betx_beating,
            beating.max_abs_bety_beating
        ));
        lines.push(describe_check("betx", &beating.betx_check));
        lines.push(describe_check("bety", &beating.bety_check));
    }

    if let Some(init) = &report.twiss_init {
        lines.push(format!(
            "Twiss init at {}: betx={} alfx={} bety={} alfy={} dx={} dpx={} dy={} dpy={}",
            init.element,
            init.betx,
            init.alfx,
            init.bety,
            init.alfy,
            init.dx,
            init.dpx,
            init.dy,
            init.dpy
        ));
    }

    if let Some(first_failure) = report.common_elements.iter().find(|element| !element.passed) {
        lines.push(format!(
            "  first failure: {} (s={}, s_reference={})",
            first_failure.name, first_failure.s, first_failure.s_reference
        ));
    }
    if let Some(reason) = &report.reason {
        lines.push(format!("  reason: {}", reason));
    }

    lines.join("\n")
}
