use crate::common::constants::{DEFAULT_EDGE_HGAP, DEFAULT_P0C_EV, ELECTRON_MASS_EV};
use crate::domain::SadError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// How the SAD `k1` attribute of a quadrupole is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuadStrength {
    /// `k1` is integrated over the length; the element gets `k1 / l`.
    #[default]
    Integrated,
    /// `k1` is already per unit length.
    Normalized,
}

/// Naming of repeated sequence occurrences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OccurrenceSuffix {
    /// `qf.1`, `qf.2`, ...
    #[default]
    AllNumbered,
    /// `qf`, `qf.1`, `qf.2`, ...
    FirstBare,
}

impl OccurrenceSuffix {
    /// Output name of the `occurrence`-th (1-based) use of `name`.
    pub fn name_for(self, name: &str, occurrence: usize) -> String {
        match (self, occurrence) {
            (Self::AllNumbered, n) => format!("{}.{}", name, n),
            (Self::FirstBare, 1) => name.to_string(),
            (Self::FirstBare, n) => format!("{}.{}", name, n - 1),
        }
    }
}

/// Treatment of quadrupoles with `rotate = ±45`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkewQuadrupole {
    /// Wrap the quadrupole in a pair of s-rotations.
    #[default]
    Rotate,
    /// Replace it with a drift of the same length.
    Drift,
    /// Fail the build.
    Reject,
}

/// Choices the SAD source leaves open when building a line. Every field has a
/// default, so `{}` is a valid conventions file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildConventions {
    pub quad_strength: QuadStrength,
    pub occurrence_suffix: OccurrenceSuffix,
    pub skew_quadrupole: SkewQuadrupole,
    pub negate_bend_on_reversal: bool,
    pub edge_hgap: f64,
    pub p0c: f64,
    pub mass0: f64,
}

impl Default for BuildConventions {
    fn default() -> Self {
        Self {
            quad_strength: QuadStrength::default(),
            occurrence_suffix: OccurrenceSuffix::default(),
            skew_quadrupole: SkewQuadrupole::default(),
            negate_bend_on_reversal: false,
            edge_hgap: DEFAULT_EDGE_HGAP,
            p0c: DEFAULT_P0C_EV,
            mass0: ELECTRON_MASS_EV,
        }
    }
}

impl BuildConventions {
    pub fn validate(&self) -> Result<(), BuildConventionsError> {
        if !self.edge_hgap.is_finite() || self.edge_hgap < 0.0 {
            return Err(BuildConventionsError::Invalid {
                field: "edgeHgap",
                value: self.edge_hgap,
            });
        }
        if !self.p0c.is_finite() || self.p0c <= 0.0 {
            return Err(BuildConventionsError::Invalid {
                field: "p0c",
                value: self.p0c,
            });
        }
        if !self.mass0.is_finite() || self.mass0 <= 0.0 {
            return Err(BuildConventionsError::Invalid {
                field: "mass0",
                value: self.mass0,
            });
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BuildConventionsError {
    #[error("failed to read build conventions '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse build conventions '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("build convention '{field}' has invalid value {value}")]
    Invalid { field: &'static str, value: f64 },
}

impl From<BuildConventionsError> for SadError {
    fn from(error: BuildConventionsError) -> Self {
        let message = error.to_string();
        match error {
            BuildConventionsError::Read { .. } => {
                SadError::io_system("IO.BUILD_CONVENTIONS_READ", message)
            }
            BuildConventionsError::Parse { .. } | BuildConventionsError::Invalid { .. } => {
                SadError::input_validation("INPUT.BUILD_CONVENTIONS", message)
            }
        }
    }
}

pub fn load_build_conventions(
    conventions_path: impl AsRef<Path>,
) -> Result<BuildConventions, BuildConventionsError> {
    let conventions_path = conventions_path.as_ref();
    let source =
        fs::read_to_string(conventions_path).map_err(|source| BuildConventionsError::Read {
            path: conventions_path.to_path_buf(),
            source,
        })?;
    let conventions: BuildConventions =
        serde_json::from_str(&source).map_err(|source| BuildConventionsError::Parse {
            path: conventions_path.to_path_buf(),
            source,
        })?;
    conventions.validate()?;
    Ok(conventions)
}
