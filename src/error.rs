use thiserror::Error;

use crate::session::SessionPhase;

/// Missing or invalid provider configuration. Fatal to starting a session.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InitializationError {
    #[error("provider configuration is missing `{0}`")]
    MissingField(&'static str),

    #[error("provider rejected configuration: {0}")]
    Provider(String),
}

/// Failure to open the live channel. Always safe to retry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("voice provider is not initialized")]
    NotInitialized,

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("provider refused the call: {0}")]
    Rejected(String),

    #[error("connection attempt cancelled by disconnect")]
    Cancelled,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("{kind} `{id}` not found")]
    NotFound { kind: &'static str, id: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("request failed: {0}")]
    Request(String),
}

/// Caller input rejected before any side effect.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("`{0}` is required")]
    MissingField(&'static str),

    #[error("`{field}` is invalid: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AssessmentError {
    #[error("session is {0:?}, assessments require a completed session")]
    NotCompleted(SessionPhase),

    #[error("session has no persisted record")]
    MissingRecord,

    #[error("an assessment request for session `{0}` is already in flight")]
    AlreadyInFlight(String),

    #[error("session `{0}` already has an assessment")]
    AlreadyAssessed(String),

    #[error("{path} assessment failed: {source}")]
    Request {
        path: &'static str,
        #[source]
        source: StorageError,
    },
}

impl AssessmentError {
    /// Whether the caller may offer the same request again.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Request { .. } | Self::AlreadyInFlight(_))
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("invalid transition from {from:?} to {to:?}")]
    InvalidTransition { from: SessionPhase, to: SessionPhase },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("session completion failed (primary: {primary}; fallback: {fallback})")]
    CompletionFailed {
        primary: StorageError,
        fallback: StorageError,
    },
}

/// Errors surfaced by the [`crate::Interview`] facade.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InterviewError {
    #[error(transparent)]
    Initialization(#[from] InitializationError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl From<ValidationError> for InterviewError {
    fn from(err: ValidationError) -> Self {
        Self::Session(SessionError::Validation(err))
    }
}
