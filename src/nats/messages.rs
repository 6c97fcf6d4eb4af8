use crate::connection::{CallIdentity, ProviderEvent};
use crate::transcript::{Role, Utterance};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request published to `voice.calls.start`
#[derive(Debug, Serialize, Deserialize)]
pub struct StartCallRequest {
    /// Client-chosen key; call events are published on `voice.call.<key>.events`
    pub call_key: String,
    pub public_key: String,
    pub assistant_id: String,
}

/// Reply to a [`StartCallRequest`]
#[derive(Debug, Serialize, Deserialize)]
pub struct StartCallReply {
    pub accepted: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptType {
    Partial,
    Final,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeechStatus {
    Started,
    Stopped,
}

/// Call event received on `voice.call.<key>.events`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum CallEventMessage {
    StatusUpdate {
        status: String,
    },
    CallIdentity {
        session_id: String,
        #[serde(default)]
        call_id: Option<String>,
    },
    Transcript {
        role: Role,
        transcript: String,
        transcript_type: TranscriptType,
        #[serde(default)]
        confidence: Option<f32>,
        /// RFC3339 timestamp
        #[serde(default)]
        timestamp: Option<String>,
    },
    SpeechUpdate {
        role: Role,
        status: SpeechStatus,
    },
    CallEnded {
        reason: String,
    },
    Error {
        message: String,
    },
}

/// End reasons that mean the conversation finished as intended
const NORMAL_END_REASONS: &[&str] = &[
    "customer-ended-call",
    "assistant-ended-call",
    "assistant-said-end-call-phrase",
    "silence-timed-out",
    "exceeded-max-duration",
];

impl CallEventMessage {
    /// Map to a provider event; `None` for informational messages
    pub fn into_provider_event(self, received_at: DateTime<Utc>) -> Option<ProviderEvent> {
        match self {
            CallEventMessage::StatusUpdate { status } => {
                if status == "ended" {
                    Some(ProviderEvent::Ended {
                        reason: status,
                        abnormal: false,
                    })
                } else {
                    None
                }
            }
            CallEventMessage::CallIdentity { session_id, call_id } => {
                Some(ProviderEvent::Identity(CallIdentity {
                    session_ref: session_id,
                    call_ref: call_id.filter(|c| !c.is_empty()),
                }))
            }
            CallEventMessage::Transcript {
                role,
                transcript,
                transcript_type,
                confidence,
                timestamp,
            } => {
                let timestamp = timestamp
                    .and_then(|t| DateTime::parse_from_rfc3339(&t).ok())
                    .map(|t| t.with_timezone(&Utc))
                    .unwrap_or(received_at);

                Some(ProviderEvent::Utterance(Utterance {
                    role,
                    text: transcript,
                    is_final: transcript_type == TranscriptType::Final,
                    confidence,
                    timestamp,
                }))
            }
            CallEventMessage::SpeechUpdate { role, status } => Some(ProviderEvent::Speech {
                role,
                active: status == SpeechStatus::Started,
            }),
            CallEventMessage::CallEnded { reason } => {
                let abnormal = !NORMAL_END_REASONS.contains(&reason.as_str());
                Some(ProviderEvent::Ended { reason, abnormal })
            }
            CallEventMessage::Error { message } => Some(ProviderEvent::Error(message)),
        }
    }
}
