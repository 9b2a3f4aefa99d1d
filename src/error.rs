use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejections raised synchronously, before any state transition.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please upload an image first")]
    NoImage,
    #[error("Please drop an image file (got {mime})")]
    NotAnImage { mime: String },
    #[error("image file is empty")]
    EmptyImage,
    #[error("failed to read image {path}: {reason}")]
    Unreadable { path: String, reason: String },
}

#[derive(Debug, Error)]
pub enum SolveError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("a solve is already in flight")]
    InFlight,
    #[error("request could not be sent: {0}")]
    Transport(String),
    #[error("server responded with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("solve cancelled")]
    Cancelled,
}

/// Coarse classification of a [`SolveError`], kept on the settled state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    Validation,
    InFlight,
    Transport,
    MalformedResponse,
    Cancelled,
}

impl SolveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SolveError::Validation(_) => ErrorKind::Validation,
            SolveError::InFlight => ErrorKind::InFlight,
            SolveError::Transport(_) | SolveError::Status { .. } => ErrorKind::Transport,
            SolveError::MalformedResponse(_) => ErrorKind::MalformedResponse,
            SolveError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

impl From<reqwest::Error> for SolveError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SolveError::MalformedResponse(err.to_string())
        } else {
            SolveError::Transport(err.to_string())
        }
    }
}
