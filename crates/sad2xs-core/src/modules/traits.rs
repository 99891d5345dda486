use crate::domain::{StageArtifact, StageRequest, StageResult};

pub trait ModuleExecutor {
    fn execute(&self, request: &StageRequest) -> StageResult<Vec<StageArtifact>>;
}

#[cfg(test)]
mod tests {
    use super::ModuleExecutor;
    use crate::domain::{
        PipelineStage, SadError, SadErrorCategory, StageArtifact, StageRequest, StageResult,
    };

    struct FailingExecutor;

    impl ModuleExecutor for FailingExecutor {
        fn execute(&self, _request: &StageRequest) -> StageResult<Vec<StageArtifact>> {
            Err(SadError::computation("RUN.STAGE", "stage execution failed"))
        }
    }

    #[test]
    fn module_executor_uses_shared_error_types() {
        let request = StageRequest::new(PipelineStage::BuildLine, "ring.json", "out");
        let error = FailingExecutor
            .execute(&request)
            .expect_err("executor should fail");
        assert_eq!(error.category(), SadErrorCategory::ComputationError);
        assert_eq!(error.exit_code(), 4);
        assert_eq!(error.placeholder(), "RUN.STAGE");
    }
}
