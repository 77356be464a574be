//! Pipeline errors
//!
//! Only [`PipelineError`] leaves a dispatch. Stages report through [`StageError`], which the
//! dispatcher tags with the stage name. Malformed markup is never an error: stages degrade it
//! to literal text.

use crate::wiki::token::{InvalidStateError, TokenId};
use thiserror::Error;

/// What a stage may fail with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
    /// The stage cannot continue; the whole dispatch ends.
    #[error("{0}")]
    Abort(String),

    #[error(transparent)]
    InvalidState(#[from] InvalidStateError),
}

impl StageError {
    pub fn abort(reason: impl Into<String>) -> Self {
        StageError::Abort(reason.into())
    }
}

/// Fatal conditions that end the dispatch of a top-level document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineAbortError {
    #[error("expansion depth limit of {max} exceeded")]
    DepthExceeded { max: usize },

    #[error("stage '{stage}' aborted: {reason}")]
    StageAborted { stage: String, reason: String },

    /// A stage released a token that sorts before one it released in an earlier emission.
    #[error("stage '{stage}' emitted token {id} after already emitting {previous}")]
    OrderViolation {
        stage: String,
        id: TokenId,
        previous: TokenId,
    },
}

/// Everything a dispatch can end with besides its tokens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Abort(#[from] PipelineAbortError),

    #[error(transparent)]
    InvalidState(#[from] InvalidStateError),
}

impl PipelineError {
    pub(crate) fn from_stage(stage: &str, error: StageError) -> Self {
        match error {
            StageError::Abort(reason) => PipelineAbortError::StageAborted {
                stage: stage.to_string(),
                reason,
            }
            .into(),
            StageError::InvalidState(err) => err.into(),
        }
    }

    pub fn is_abort(&self) -> bool {
        matches!(self, PipelineError::Abort(_))
    }
}

/// Misuse while assembling a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineBuildError {
    #[error("duplicate stage name '{0}'")]
    DuplicateStage(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_abort_carries_stage_name() {
        let err = PipelineError::from_stage("quotes", StageError::abort("boom"));
        assert_eq!(err.to_string(), "stage 'quotes' aborted: boom");
        assert!(err.is_abort());
    }

    #[test]
    fn test_invalid_state_passes_through() {
        let inner = InvalidStateError {
            id: TokenId::from_path(&[2]),
            operation: "set_payload",
        };
        let err = PipelineError::from_stage("x", StageError::from(inner.clone()));
        assert_eq!(err, PipelineError::InvalidState(inner));
        assert!(!err.is_abort());
    }
}
