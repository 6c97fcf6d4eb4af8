use crate::config::ProviderConfig;
use crate::error::{ConnectionError, InitializationError};
use crate::transcript::{Role, Utterance};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Identity the provider assigns to a live call
///
/// The session reference arrives first; the call reference (used later to
/// fetch provider-side recordings and analysis) may come with it, later, or
/// never.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallIdentity {
    pub session_ref: String,
    pub call_ref: Option<String>,
}

/// Event pushed by a provider while a call is open
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    /// Call identity became known (or gained a call reference)
    Identity(CallIdentity),

    /// Partial or final utterance
    Utterance(Utterance),

    /// A participant started or stopped speaking
    Speech { role: Role, active: bool },

    /// Non-terminal provider error
    Error(String),

    /// The call is over. `abnormal` is false for a regular hang-up.
    Ended { reason: String, abnormal: bool },
}

/// Validated provider identifiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCredentials {
    pub public_key: String,
    pub assistant_id: String,
}

impl ProviderCredentials {
    pub fn from_config(config: &ProviderConfig) -> Result<Self, InitializationError> {
        fn required(value: &Option<String>, field: &'static str) -> Result<String, InitializationError> {
            match value.as_deref().map(str::trim) {
                Some(v) if !v.is_empty() => Ok(v.to_string()),
                _ => Err(InitializationError::MissingField(field)),
            }
        }

        Ok(Self {
            public_key: required(&config.public_key, "public_key")?,
            assistant_id: required(&config.assistant_id, "assistant_id")?,
        })
    }
}

/// Transport to an external voice-interview provider
///
/// Implementations:
/// - NATS: `crate::nats::NatsVoiceProvider`
/// - Scripted providers in tests
#[async_trait::async_trait]
pub trait VoiceProvider: Send + Sync {
    /// Prepare the client with validated credentials
    async fn initialize(&mut self, credentials: &ProviderCredentials) -> Result<(), InitializationError>;

    /// Open the live channel
    ///
    /// Resolves once the channel is open. Returns a receiver that yields
    /// call events until the call ends.
    async fn connect(&mut self) -> Result<mpsc::Receiver<ProviderEvent>, ConnectionError>;

    /// Tear the channel down
    async fn disconnect(&mut self) -> Result<(), ConnectionError>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Builds a fresh provider per interview
pub trait ProviderFactory: Send + Sync {
    fn create(&self) -> Box<dyn VoiceProvider>;
}
