use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::TradeCategory;

/// Candidate fields persisted when an interview goes live
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCandidate {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub position: String,
    pub trade_category: TradeCategory,
    pub consent_given: bool,
    /// Where the candidate came from (e.g., "voice_interview_portal")
    pub source: String,
}

/// Auxiliary data sent with the primary completion call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionSummary {
    pub ended_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub call_ref: Option<String>,
    /// Number of finalized turns observed (including any that failed to persist)
    pub turn_count: usize,
}
