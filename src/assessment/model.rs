use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which data an assessment was computed from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentPath {
    /// Provider-side recording and analysis, looked up by call reference
    ProviderData,
    /// Transcript turns persisted during the interview
    StoredTranscript,
}

impl AssessmentPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssessmentPath::ProviderData => "provider_data",
            AssessmentPath::StoredTranscript => "stored_transcript",
        }
    }
}

impl fmt::Display for AssessmentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    /// 0 to 100
    pub score: u8,
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScores {
    pub technical_skills: CategoryScore,
    pub safety_knowledge: CategoryScore,
    pub communication: CategoryScore,
}

/// Scored evaluation of one completed session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub session_id: String,

    /// 0 to 100
    pub overall_score: u8,

    /// Decided by the scoring service against its own threshold
    pub passed: bool,

    pub scores: CategoryScores,

    pub path: AssessmentPath,

    pub completed_at: DateTime<Utc>,
}
