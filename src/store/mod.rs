//! Storage boundary
//!
//! The lifecycle core writes candidates, sessions, transcript turns and
//! completion records through `InterviewStore`, and asks it for
//! assessments. It never reads its own writes back mid-session.

mod memory;
mod records;

pub use memory::{FlatScorer, MemoryStore, Scorer, StoredSession, StoredStatus};
pub use records::{CompletionSummary, NewCandidate};

use crate::assessment::Assessment;
use crate::error::StorageError;
use crate::transcript::TranscriptTurn;

/// Persistence and scoring collaborator
#[async_trait::async_trait]
pub trait InterviewStore: Send + Sync {
    /// Returns the new candidate id
    async fn create_candidate(&self, candidate: NewCandidate) -> Result<String, StorageError>;

    /// Returns the new internal session id
    async fn create_session(
        &self,
        candidate_id: &str,
        session_ref: &str,
        call_ref: Option<&str>,
    ) -> Result<String, StorageError>;

    async fn append_transcript_turn(&self, session_id: &str, turn: &TranscriptTurn) -> Result<(), StorageError>;

    async fn update_call_reference(&self, session_id: &str, call_ref: &str) -> Result<(), StorageError>;

    /// Mark a session completed. Must be idempotent.
    async fn complete_session(
        &self,
        session_id: &str,
        summary: Option<CompletionSummary>,
    ) -> Result<(), StorageError>;

    /// Score using provider-side recording and analysis
    async fn request_assessment_from_provider(
        &self,
        session_id: &str,
        call_ref: &str,
    ) -> Result<Assessment, StorageError>;

    /// Score the transcript turns already stored for the session
    async fn request_assessment_from_transcript(&self, session_id: &str) -> Result<Assessment, StorageError>;
}
