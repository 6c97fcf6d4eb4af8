use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Conversation participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The automated interviewer (the provider calls it "assistant")
    #[serde(alias = "assistant")]
    Interviewer,
    /// The person being screened (the provider calls it "user")
    #[serde(alias = "user")]
    Candidate,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Interviewer => f.write_str("interviewer"),
            Role::Candidate => f.write_str("candidate"),
        }
    }
}

/// Raw utterance event as delivered by the live channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    pub role: Role,

    pub text: String,

    /// Whether the provider will no longer revise this utterance
    pub is_final: bool,

    /// Recognition confidence (0.0 to 1.0), if the provider reports one
    pub confidence: Option<f32>,

    /// When the utterance event was observed
    pub timestamp: DateTime<Utc>,
}

/// One utterance by one participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptTurn {
    /// Unique within the session
    pub id: String,

    pub role: Role,

    pub text: String,

    pub timestamp: DateTime<Utc>,

    /// Carried for display only; never used to filter turns
    pub confidence: Option<f32>,

    pub is_final: bool,
}

impl TranscriptTurn {
    pub(crate) fn from_utterance(id: String, utterance: Utterance) -> Self {
        Self {
            id,
            role: utterance.role,
            text: utterance.text,
            timestamp: utterance.timestamp,
            confidence: utterance.confidence.map(|c| c.clamp(0.0, 1.0)),
            is_final: utterance.is_final,
        }
    }
}
