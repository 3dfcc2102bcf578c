//! Error taxonomy for the request lifecycle.
//!
//! Validation failures never leave the input boundary, pipeline failures are
//! folded into `RequestState::Error` by the orchestrator, and stale
//! resolutions are dropped without touching state.

use thiserror::Error;

/// Message shown to the user for every pipeline failure. Transport and
/// malformed-body failures look the same from the outside; logs keep them apart.
pub const PIPELINE_FAILURE_MESSAGE: &str =
    "The pipeline could not answer this question. Please try again.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("query is empty")]
    EmptyQuery,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pipeline request failed: {0}")]
    Transport(String),

    #[error("pipeline returned {status}")]
    Status { status: u16, body: String },

    #[error("malformed pipeline response: {0}")]
    Malformed(String),
}

impl PipelineError {
    /// Log-facing classification.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Transport(_) | PipelineError::Status { .. } => "transport",
            PipelineError::Malformed(_) => "malformed",
        }
    }

    pub fn user_message(&self) -> String {
        PIPELINE_FAILURE_MESSAGE.to_string()
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        PipelineError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Malformed(err.to_string())
    }
}

/// A resolution arrived for a submission that has since been superseded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("resolution for generation {resolved} superseded by generation {current}")]
pub struct StaleResolution {
    pub resolved: u64,
    pub current: u64,
}
