//! One interview: a live channel, its transcript and its session
//!
//! `Interview` wires the pieces together. Connection events are read from
//! the manager's lossless feed by a single task, in arrival order:
//!
//! ```text
//! ConnectionManager ──events──▶ TranscriptStream ──final turns──▶ SessionController ──▶ InterviewStore
//! ```

use crate::clock::Clock;
use crate::config::{ProviderConfig, SessionSettings};
use crate::connection::{ConnectionEvent, ConnectionManager, ConnectionState, ConnectionStatus, VoiceProvider};
use crate::error::InterviewError;
use crate::session::{CandidateProfile, SessionController, SessionGuard, SessionSnapshot};
use crate::store::InterviewStore;
use crate::transcript::{Role, TranscriptStream, TranscriptTurn};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub struct Interview {
    /// Live channel
    connection: Arc<ConnectionManager>,

    /// Lifecycle state machine
    controller: SessionController,

    /// Normalized transcript for display
    transcript: Arc<Mutex<TranscriptStream>>,

    /// Connection event handler
    event_task: JoinHandle<()>,

    /// Completes the session if this interview is dropped mid-call
    _guard: SessionGuard,
}

impl Interview {
    /// Validate the candidate, initialize the provider and get ready to connect
    ///
    /// Validation and initialization both happen before any session state
    /// exists, so either failure leaves nothing behind.
    pub async fn prepare(
        candidate: CandidateProfile,
        provider: Box<dyn VoiceProvider>,
        provider_config: ProviderConfig,
        store: Arc<dyn InterviewStore>,
        clock: Arc<dyn Clock>,
        settings: &SessionSettings,
    ) -> Result<Self, InterviewError> {
        candidate.validate()?;

        let (connection, events) = ConnectionManager::with_events(provider, provider_config, settings.event_buffer);
        let connection = Arc::new(connection);
        connection.initialize().await?;

        let controller = SessionController::new(store, clock, settings.safety_timeout());
        controller.begin(candidate).await?;

        let transcript = Arc::new(Mutex::new(TranscriptStream::new()));

        let event_task = tokio::spawn(Self::handle_events(
            events,
            controller.clone(),
            Arc::clone(&transcript),
        ));

        Ok(Self {
            connection,
            _guard: SessionGuard::new(controller.clone()),
            controller,
            transcript,
            event_task,
        })
    }

    /// Open the live channel. May be called again after a `ConnectionError`.
    pub async fn connect(&self) -> Result<(), InterviewError> {
        self.connection.connect().await?;
        Ok(())
    }

    /// End the interview: complete the session, then hang up
    pub async fn end(&self) -> Result<SessionSnapshot, InterviewError> {
        info!("Ending interview");

        let result = self.controller.request_end().await;

        self.connection.disconnect().await;
        self.transcript.lock().await.clear_partials();

        Ok(result?)
    }

    /// The owner is leaving: complete whatever state the session is in and hang up
    pub async fn teardown(&self) -> Result<SessionSnapshot, InterviewError> {
        let result = self.controller.teardown().await;
        self.connection.disconnect().await;
        Ok(result?)
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.controller.snapshot()
    }

    pub async fn connection_status(&self) -> ConnectionStatus {
        self.connection.status().await
    }

    /// Finalized turns so far
    pub async fn transcript(&self) -> Vec<TranscriptTurn> {
        self.transcript.lock().await.turns().to_vec()
    }

    /// What a participant is saying right now
    pub async fn partial(&self, role: Role) -> Option<TranscriptTurn> {
        self.transcript.lock().await.partial(role).cloned()
    }

    async fn handle_events(
        mut events: mpsc::UnboundedReceiver<ConnectionEvent>,
        controller: SessionController,
        transcript: Arc<Mutex<TranscriptStream>>,
    ) {
        debug!("Interview event handler started");

        while let Some(event) = events.recv().await {
            match event {
                ConnectionEvent::StateChanged(ConnectionState::Connected) => {
                    if let Err(e) = controller.on_connected().await {
                        error!("Failed to start session: {}", e);
                    }
                }
                ConnectionEvent::StateChanged(state) => {
                    debug!("Connection state: {:?}", state);
                }
                ConnectionEvent::Identity(identity) => {
                    if let Err(e) = controller.on_call_identity(identity).await {
                        error!("Failed to start session: {}", e);
                    }
                }
                ConnectionEvent::Utterance(utterance) => {
                    let finalized = transcript.lock().await.ingest(utterance);
                    if let Some(turn) = finalized {
                        controller.record_turn(turn).await;
                    }
                }
                ConnectionEvent::Activity { .. } => {}
                ConnectionEvent::ChannelClosed { reason, abnormal } => {
                    transcript.lock().await.clear_partials();
                    if abnormal {
                        warn!("Live channel dropped: {}", reason);
                    }
                    if let Err(e) = controller.on_channel_closed(&reason).await {
                        error!("Completion after channel close failed: {}", e);
                    }
                }
            }
        }

        debug!("Interview event handler stopped");
    }
}

impl Drop for Interview {
    fn drop(&mut self) {
        self.event_task.abort();

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let connection = Arc::clone(&self.connection);
            handle.spawn(async move {
                connection.disconnect().await;
            });
        }
    }
}
