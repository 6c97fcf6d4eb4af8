pub mod assessment;
pub mod clock;
pub mod config;
pub mod connection;
pub mod error;
pub mod http;
pub mod interview;
pub mod logging;
pub mod nats;
pub mod session;
pub mod store;
pub mod transcript;

pub use assessment::{Assessment, AssessmentPath, AssessmentScheduler};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use connection::{
    CallIdentity, ConnectionEvent, ConnectionManager, ConnectionState, ConnectionStatus, ProviderEvent,
    ProviderFactory, VoiceProvider,
};
pub use error::{
    AssessmentError, ConnectionError, InitializationError, InterviewError, SessionError, StorageError,
    ValidationError,
};
pub use http::{create_router, AppState};
pub use interview::Interview;
pub use nats::{NatsClient, NatsProviderFactory, NatsVoiceProvider};
pub use session::{CandidateProfile, CompletionTrigger, SessionController, SessionPhase, SessionSnapshot, TradeCategory};
pub use store::{InterviewStore, MemoryStore};
pub use transcript::{Role, TranscriptStream, TranscriptTurn, Utterance};
