use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidTransition,
    TransitionInFlight,
    LoadFailure,
    RecommendationFailure,
    RenderFailure,
    Internal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisError {
    pub code: ErrorCode,
    pub message: String,
}

impl VisError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
#[error("{code:?}: {message}")]
pub struct VisException {
    pub code: ErrorCode,
    pub message: String,
}

impl VisException {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<VisException> for VisError {
    fn from(value: VisException) -> Self {
        Self {
            code: value.code,
            message: value.message,
        }
    }
}
