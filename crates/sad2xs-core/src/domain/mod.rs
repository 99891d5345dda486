pub mod errors;

pub use errors::{ParserResult, SadError, SadErrorCategory, SadResult, StageResult};

use std::fmt::{Display, Formatter};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    ParseLattice,
    ParseTwiss,
    BuildLine,
    Compare,
}

impl PipelineStage {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ParseLattice => "PARSE-LATTICE",
            Self::ParseTwiss => "PARSE-TWISS",
            Self::BuildLine => "BUILD-LINE",
            Self::Compare => "COMPARE",
        }
    }
}

impl Display for PipelineStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// One invocation of a pipeline stage: a primary input file and the directory
/// its artifacts are written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageRequest {
    pub stage: PipelineStage,
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
}

impl StageRequest {
    pub fn new(
        stage: PipelineStage,
        input_path: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            stage,
            input_path: input_path.into(),
            output_dir: output_dir.into(),
        }
    }

    /// File name of the input with the given suffix removed, e.g.
    /// `ring.plain.sad` → `ring` for suffix `.plain.sad`.
    pub fn input_stem(&self, suffixes: &[&str]) -> String {
        let file_name = self
            .input_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.stage.as_str().to_ascii_lowercase());

        suffixes
            .iter()
            .find_map(|suffix| file_name.strip_suffix(suffix))
            .filter(|stem| !stem.is_empty())
            .map(str::to_string)
            .unwrap_or(file_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageArtifact {
    pub relative_path: PathBuf,
}

impl StageArtifact {
    pub fn new(relative_path: impl Into<PathBuf>) -> Self {
        Self {
            relative_path: relative_path.into(),
        }
    }
}
