use crate::domain::SadError;
use globset::{Glob, GlobMatcher};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct NumericTolerance {
    #[serde(rename = "absTol")]
    pub abs_tol: f64,
    #[serde(rename = "relTol")]
    pub rel_tol: f64,
    #[serde(rename = "relativeFloor", default = "default_relative_floor")]
    pub relative_floor: f64,
}

fn default_relative_floor() -> f64 {
    1.0e-12
}

impl Default for NumericTolerance {
    fn default() -> Self {
        Self {
            abs_tol: 1.0e-6,
            rel_tol: 1.0e-6,
            relative_floor: default_relative_floor(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicyToleranceComparison {
    pub abs_diff: f64,
    pub rel_diff: f64,
    pub passes: bool,
}

/// Tolerance policy for the compare stage. Columns (`s`, `betx`, ...) are
/// matched against the category globs in order; the first hit wins and
/// anything unmatched falls back to `default`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
pub struct TolerancePolicy {
    #[serde(default)]
    pub default: NumericTolerance,
    #[serde(default)]
    pub categories: Vec<ToleranceCategory>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ToleranceCategory {
    pub id: String,
    #[serde(rename = "columnGlobs", default)]
    pub column_globs: Vec<String>,
    pub tolerance: NumericTolerance,
}

#[derive(Debug, thiserror::Error)]
pub enum TolerancePolicyError {
    #[error("failed to read tolerance policy '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse tolerance policy '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid column glob '{pattern}' in category '{category}': {source}")]
    InvalidGlob {
        category: String,
        pattern: String,
        source: globset::Error,
    },
}

impl From<TolerancePolicyError> for SadError {
    fn from(error: TolerancePolicyError) -> Self {
        let message = error.to_string();
        match error {
            TolerancePolicyError::Read { .. } => {
                SadError::io_system("IO.TOLERANCE_POLICY_READ", message)
            }
            TolerancePolicyError::Parse { .. } | TolerancePolicyError::InvalidGlob { .. } => {
                SadError::input_validation("INPUT.TOLERANCE_POLICY", message)
            }
        }
    }
}

pub fn load_tolerance_policy(
    policy_path: impl AsRef<Path>,
) -> Result<TolerancePolicy, TolerancePolicyError> {
    let policy_path = policy_path.as_ref();
    let source = fs::read_to_string(policy_path).map_err(|source| TolerancePolicyError::Read {
        path: policy_path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&source).map_err(|source| TolerancePolicyError::Parse {
        path: policy_path.to_path_buf(),
        source,
    })
}

pub struct CompiledTolerancePolicy {
    default: NumericTolerance,
    categories: Vec<CompiledCategory>,
}

struct CompiledCategory {
    id: String,
    tolerance: NumericTolerance,
    matchers: Vec<GlobMatcher>,
}

impl CompiledTolerancePolicy {
    pub fn compile(policy: &TolerancePolicy) -> Result<Self, TolerancePolicyError> {
        let mut categories = Vec::with_capacity(policy.categories.len());
        for category in &policy.categories {
            let mut matchers = Vec::with_capacity(category.column_globs.len());
            for pattern in &category.column_globs {
                let glob = Glob::new(pattern).map_err(|source| TolerancePolicyError::InvalidGlob {
                    category: category.id.clone(),
                    pattern: pattern.clone(),
                    source,
                })?;
                matchers.push(glob.compile_matcher());
            }
            categories.push(CompiledCategory {
                id: category.id.clone(),
                tolerance: category.tolerance,
                matchers,
            });
        }

        Ok(Self {
            default: policy.default,
            categories,
        })
    }

    /// Tolerance for a column plus the id of the category that supplied it.
    pub fn resolve(&self, column: &str) -> (NumericTolerance, Option<&str>) {
        self.categories
            .iter()
            .find(|category| {
                category
                    .matchers
                    .iter()
                    .any(|matcher| matcher.is_match(column))
            })
            .map(|category| (category.tolerance, Some(category.id.as_str())))
            .unwrap_or((self.default, None))
    }
}

pub fn compare_with_policy_tolerance(
    baseline: f64,
    actual: f64,
    tolerance: NumericTolerance,
) -> PolicyToleranceComparison {
    let abs_diff = (actual - baseline).abs();
    let rel_denominator = baseline.abs().max(tolerance.relative_floor);
    let rel_diff = abs_diff / rel_denominator;
    let passes = abs_diff <= tolerance.abs_tol || abs_diff <= tolerance.rel_tol * rel_denominator;

    PolicyToleranceComparison {
        abs_diff,
        rel_diff,
        passes,
    }
}

pub fn format_numeric_for_policy(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }

    if value == f64::INFINITY {
        return "inf".to_string();
    }

    if value == f64::NEG_INFINITY {
        return "-inf".to_string();
    }

    format!("{value:.15E}")
}

pub fn is_non_decreasing(values: &[f64]) -> bool {
    values.windows(2).all(|window| window[0] <= window[1])
}

/// Piecewise-linear interpolation on a non-decreasing grid, clamped to the end
/// values outside the grid. Duplicate abscissae resolve to the right-hand
/// sample.
///
/// Callers validate the grid once with [`is_non_decreasing`]; this function
/// only checks shape.
pub fn interpolate_linear(x: f64, x_grid: &[f64], y_grid: &[f64]) -> Option<f64> {
    if x.is_nan() || x_grid.is_empty() || x_grid.len() != y_grid.len() {
        return None;
    }

    let last_index = x_grid.len() - 1;
    if x <= x_grid[0] {
        return Some(y_grid[0]);
    }
    if x >= x_grid[last_index] {
        return Some(y_grid[last_index]);
    }

    let upper = x_grid.partition_point(|value| *value < x);
    if x_grid[upper] == x {
        let equal_end = upper + x_grid[upper..].partition_point(|value| *value == x);
        return Some(y_grid[equal_end - 1]);
    }

    let lower = upper - 1;
    let x0 = x_grid[lower];
    let x1 = x_grid[upper];
    let interpolation = (x - x0) / (x1 - x0);
    Some(y_grid[lower] + interpolation * (y_grid[upper] - y_grid[lower]))
}

/// Interpolates `(x_grid, y_grid)` onto every query point.
pub fn interpolate_onto(queries: &[f64], x_grid: &[f64], y_grid: &[f64]) -> Option<Vec<f64>> {
    if !is_non_decreasing(x_grid) {
        return None;
    }
    queries
        .iter()
        .map(|query| interpolate_linear(*query, x_grid, y_grid))
        .collect()
}

pub fn max_abs(values: &[f64]) -> f64 {
    values
        .iter()
        .filter(|value| value.is_finite())
        .fold(0.0_f64, |current, value| current.max(value.abs()))
}

pub fn root_mean_square(values: &[f64]) -> Option<f64> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    let sum_squares: f64 = finite.iter().map(|value| value * value).sum();
    Some((sum_squares / finite.len() as f64).sqrt())
}

#[cfg(test)]
mod tests {
    use super::{
        CompiledTolerancePolicy, NumericTolerance, TolerancePolicy, ToleranceCategory,
        compare_with_policy_tolerance, format_numeric_for_policy, interpolate_linear,
        interpolate_onto, load_tolerance_policy, max_abs, root_mean_square,
    };
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn interpolate_linear_clamps_and_interpolates() {
        let x_grid = [0.0, 1.0, 2.0];
        let y_grid = [10.0, 20.0, 30.0];

        assert_eq!(interpolate_linear(-1.0, &x_grid, &y_grid), Some(10.0));
        assert_eq!(interpolate_linear(3.0, &x_grid, &y_grid), Some(30.0));
        assert_eq!(interpolate_linear(0.5, &x_grid, &y_grid), Some(15.0));
        assert_eq!(interpolate_linear(1.0, &x_grid, &y_grid), Some(20.0));
    }

    #[test]
    fn interpolate_linear_takes_right_sample_on_duplicate_positions() {
        // zero-length markers share s with their neighbour
        let x_grid = [0.0, 1.0, 1.0, 2.0];
        let y_grid = [0.0, 5.0, 7.0, 9.0];
        assert_eq!(interpolate_linear(1.0, &x_grid, &y_grid), Some(7.0));
        assert_eq!(interpolate_linear(1.5, &x_grid, &y_grid), Some(8.0));
    }

    #[test]
    fn interpolate_onto_rejects_decreasing_grid() {
        assert_eq!(interpolate_onto(&[0.5], &[0.0, 2.0, 1.0], &[0.0, 2.0, 1.0]), None);
        assert_eq!(
            interpolate_onto(&[0.5, 1.5], &[0.0, 1.0, 2.0], &[0.0, 1.0, 4.0]),
            Some(vec![0.5, 2.5])
        );
    }

    #[test]
    fn compare_with_policy_tolerance_uses_baseline_relative_scale() {
        let tolerance = NumericTolerance {
            abs_tol: 1.0e-9,
            rel_tol: 0.1,
            relative_floor: 1.0e-12,
        };
        let comparison = compare_with_policy_tolerance(2.0, 2.19, tolerance);
        assert!((comparison.abs_diff - 0.19).abs() < 1.0e-12);
        assert!((comparison.rel_diff - 0.095).abs() < 1.0e-12);
        assert!(comparison.passes);
    }

    #[test]
    fn format_numeric_for_policy_handles_special_values() {
        assert_eq!(format_numeric_for_policy(f64::NAN), "NaN");
        assert_eq!(format_numeric_for_policy(f64::INFINITY), "inf");
        assert_eq!(format_numeric_for_policy(f64::NEG_INFINITY), "-inf");
        assert_eq!(format_numeric_for_policy(12.5), "1.250000000000000E1");
    }

    #[test]
    fn summary_statistics_skip_non_finite_values() {
        assert_eq!(max_abs(&[0.5, -2.0, f64::NAN]), 2.0);
        assert_eq!(root_mean_square(&[3.0, -4.0, f64::INFINITY, 0.0, 0.0]), Some(2.5));
        assert_eq!(root_mean_square(&[]), None);
    }

    #[test]
    fn compiled_policy_matches_first_category() {
        let policy = TolerancePolicy {
            default: NumericTolerance::default(),
            categories: vec![
                ToleranceCategory {
                    id: "beta".to_string(),
                    column_globs: vec!["bet*".to_string()],
                    tolerance: NumericTolerance {
                        abs_tol: 0.0,
                        rel_tol: 0.05,
                        relative_floor: 1.0e-12,
                    },
                },
                ToleranceCategory {
                    id: "everything".to_string(),
                    column_globs: vec!["*".to_string()],
                    tolerance: NumericTolerance {
                        abs_tol: 1.0,
                        rel_tol: 0.0,
                        relative_floor: 1.0e-12,
                    },
                },
            ],
        };
        let compiled = CompiledTolerancePolicy::compile(&policy).expect("policy should compile");

        let (tolerance, category) = compiled.resolve("betx");
        assert_eq!(category, Some("beta"));
        assert_eq!(tolerance.rel_tol, 0.05);

        let (tolerance, category) = compiled.resolve("s");
        assert_eq!(category, Some("everything"));
        assert_eq!(tolerance.abs_tol, 1.0);
    }

    #[test]
    fn load_tolerance_policy_reads_defaults_and_categories() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("policy.json");
        fs::write(
            &path,
            r#"{
              "default": { "absTol": 1e-3, "relTol": 0.0 },
              "categories": [
                { "id": "s", "columnGlobs": ["s"], "tolerance": { "absTol": 1e-9, "relTol": 1e-9 } }
              ]
            }"#,
        )
        .expect("policy should be written");

        let policy = load_tolerance_policy(&path).expect("policy should load");
        assert_eq!(policy.default.abs_tol, 1.0e-3);
        assert_eq!(policy.default.relative_floor, 1.0e-12);
        assert_eq!(policy.categories.len(), 1);
        assert_eq!(policy.categories[0].column_globs, vec!["s".to_string()]);
    }

    #[test]
    fn invalid_glob_is_reported_with_category() {
        let policy = TolerancePolicy {
            default: NumericTolerance::default(),
            categories: vec![ToleranceCategory {
                id: "broken".to_string(),
                column_globs: vec!["[".to_string()],
                tolerance: NumericTolerance::default(),
            }],
        };
        let error = CompiledTolerancePolicy::compile(&policy)
            .err()
            .expect("unterminated class should fail");
        assert!(error.to_string().contains("category 'broken'"));
    }
}
