use super::records::{CompletionSummary, NewCandidate};
use super::InterviewStore;
use crate::assessment::{Assessment, AssessmentPath, CategoryScore, CategoryScores};
use crate::clock::{Clock, SystemClock};
use crate::error::StorageError;
use crate::transcript::TranscriptTurn;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Produces scores for a transcript. The rubric lives outside this crate.
pub trait Scorer: Send + Sync {
    fn score(&self, transcript: &[TranscriptTurn]) -> (u8, bool, CategoryScores);
}

/// Gives every category the same score
#[derive(Debug, Clone, Copy)]
pub struct FlatScorer {
    pub score: u8,
    pub pass_threshold: u8,
}

impl Default for FlatScorer {
    fn default() -> Self {
        Self {
            score: 70,
            pass_threshold: 60,
        }
    }
}

impl Scorer for FlatScorer {
    fn score(&self, _transcript: &[TranscriptTurn]) -> (u8, bool, CategoryScores) {
        let score = self.score.min(100);
        let category = CategoryScore { score, feedback: None };

        (
            score,
            score >= self.pass_threshold,
            CategoryScores {
                technical_skills: category.clone(),
                safety_knowledge: category.clone(),
                communication: category,
            },
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoredStatus {
    Active,
    Completed,
}

/// Session record as held by the store
#[derive(Debug, Clone, Serialize)]
pub struct StoredSession {
    pub id: String,
    pub candidate_id: String,
    pub session_ref: String,
    pub call_ref: Option<String>,
    pub status: StoredStatus,
    pub transcript: Vec<TranscriptTurn>,
    pub summary: Option<CompletionSummary>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct MemoryState {
    candidates: HashMap<String, NewCandidate>,
    sessions: HashMap<String, StoredSession>,
    assessments: HashMap<String, Assessment>,
}

/// In-process store for development and tests
#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
    scorer: Arc<dyn Scorer>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Arc::new(FlatScorer::default()), Arc::new(SystemClock))
    }
}

impl MemoryStore {
    pub fn new(scorer: Arc<dyn Scorer>, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(RwLock::new(MemoryState::default())),
            scorer,
            clock,
        }
    }

    pub async fn candidate(&self, candidate_id: &str) -> Option<NewCandidate> {
        self.state.read().await.candidates.get(candidate_id).cloned()
    }

    pub async fn session(&self, session_id: &str) -> Option<StoredSession> {
        self.state.read().await.sessions.get(session_id).cloned()
    }

    pub async fn assessment(&self, session_id: &str) -> Option<Assessment> {
        self.state.read().await.assessments.get(session_id).cloned()
    }

    /// Score a session and record the assessment, refusing a second one
    async fn assess(&self, session_id: &str, path: AssessmentPath) -> Result<Assessment, StorageError> {
        let mut state = self.state.write().await;

        if state.assessments.contains_key(session_id) {
            return Err(StorageError::Conflict(format!(
                "session {} already has an assessment",
                session_id
            )));
        }

        let session = state.sessions.get(session_id).ok_or_else(|| StorageError::NotFound {
            kind: "session",
            id: session_id.to_string(),
        })?;

        if session.status != StoredStatus::Completed {
            return Err(StorageError::Request(format!("session {} is not completed", session_id)));
        }

        if path == AssessmentPath::StoredTranscript && session.transcript.is_empty() {
            return Err(StorageError::Request(format!(
                "session {} has no transcript to assess",
                session_id
            )));
        }

        let (overall_score, passed, scores) = self.scorer.score(&session.transcript);

        let assessment = Assessment {
            session_id: session_id.to_string(),
            overall_score,
            passed,
            scores,
            path,
            completed_at: self.clock.now(),
        };

        state.assessments.insert(session_id.to_string(), assessment.clone());

        info!(
            "Stored assessment for session {} via {} (score={}, passed={})",
            session_id, path, overall_score, passed
        );

        Ok(assessment)
    }
}

#[async_trait::async_trait]
impl InterviewStore for MemoryStore {
    async fn create_candidate(&self, candidate: NewCandidate) -> Result<String, StorageError> {
        let id = format!("candidate-{}", uuid::Uuid::new_v4());
        self.state.write().await.candidates.insert(id.clone(), candidate);
        Ok(id)
    }

    async fn create_session(
        &self,
        candidate_id: &str,
        session_ref: &str,
        call_ref: Option<&str>,
    ) -> Result<String, StorageError> {
        let mut state = self.state.write().await;

        if !state.candidates.contains_key(candidate_id) {
            return Err(StorageError::NotFound {
                kind: "candidate",
                id: candidate_id.to_string(),
            });
        }

        let id = format!("session-{}", uuid::Uuid::new_v4());
        state.sessions.insert(
            id.clone(),
            StoredSession {
                id: id.clone(),
                candidate_id: candidate_id.to_string(),
                session_ref: session_ref.to_string(),
                call_ref: call_ref.map(String::from),
                status: StoredStatus::Active,
                transcript: Vec::new(),
                summary: None,
                completed_at: None,
            },
        );

        Ok(id)
    }

    async fn append_transcript_turn(&self, session_id: &str, turn: &TranscriptTurn) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        let session = state.sessions.get_mut(session_id).ok_or_else(|| StorageError::NotFound {
            kind: "session",
            id: session_id.to_string(),
        })?;

        session.transcript.push(turn.clone());
        Ok(())
    }

    async fn update_call_reference(&self, session_id: &str, call_ref: &str) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        let session = state.sessions.get_mut(session_id).ok_or_else(|| StorageError::NotFound {
            kind: "session",
            id: session_id.to_string(),
        })?;

        session.call_ref = Some(call_ref.to_string());
        Ok(())
    }

    async fn complete_session(
        &self,
        session_id: &str,
        summary: Option<CompletionSummary>,
    ) -> Result<(), StorageError> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        let session = state.sessions.get_mut(session_id).ok_or_else(|| StorageError::NotFound {
            kind: "session",
            id: session_id.to_string(),
        })?;

        if session.status == StoredStatus::Completed {
            debug!("Session {} already completed", session_id);
            return Ok(());
        }

        session.status = StoredStatus::Completed;
        session.completed_at = Some(summary.as_ref().map(|s| s.ended_at).unwrap_or(now));
        session.summary = summary;

        Ok(())
    }

    async fn request_assessment_from_provider(
        &self,
        session_id: &str,
        call_ref: &str,
    ) -> Result<Assessment, StorageError> {
        {
            let state = self.state.read().await;
            let known = state
                .sessions
                .get(session_id)
                .and_then(|s| s.call_ref.as_deref());
            if known != Some(call_ref) {
                return Err(StorageError::NotFound {
                    kind: "call",
                    id: call_ref.to_string(),
                });
            }
        }

        self.assess(session_id, AssessmentPath::ProviderData).await
    }

    async fn request_assessment_from_transcript(&self, session_id: &str) -> Result<Assessment, StorageError> {
        self.assess(session_id, AssessmentPath::StoredTranscript).await
    }
}
