pub mod client;
pub mod messages;
mod provider;

pub use client::NatsClient;
pub use messages::{CallEventMessage, SpeechStatus, StartCallReply, StartCallRequest, TranscriptType};
pub use provider::{NatsProviderFactory, NatsVoiceProvider};
