#![allow(dead_code)]

// Test doubles shared by the integration tests: a voice provider driven by
// the test, and a store that records calls and fails on request.

use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use voice_screening::assessment::Assessment;
use voice_screening::config::ProviderConfig;
use voice_screening::connection::{ProviderCredentials, ProviderFactory};
use voice_screening::store::{CompletionSummary, NewCandidate};
use voice_screening::{
    CallIdentity, CandidateProfile, ConnectionError, InitializationError, InterviewStore, ManualClock,
    MemoryStore, ProviderEvent, Role, SessionController, SessionSnapshot, StorageError, TranscriptTurn,
    Utterance, VoiceProvider,
};

pub const SAFETY_DELAY: Duration = Duration::from_millis(2000);

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap()
}

pub fn provider_config() -> ProviderConfig {
    ProviderConfig {
        public_key: Some("pk_test".to_string()),
        assistant_id: Some("assistant-test".to_string()),
        nats_url: "nats://localhost:4222".to_string(),
    }
}

pub fn candidate(position: &str) -> CandidateProfile {
    CandidateProfile {
        email: Some("jane@example.com".to_string()),
        first_name: "Jane".to_string(),
        last_name: "Doe".to_string(),
        position: position.to_string(),
        ..Default::default()
    }
}

pub fn identity(session_ref: &str, call_ref: Option<&str>) -> CallIdentity {
    CallIdentity {
        session_ref: session_ref.to_string(),
        call_ref: call_ref.map(String::from),
    }
}

pub fn utterance(role: Role, text: &str, is_final: bool) -> Utterance {
    Utterance {
        role,
        text: text.to_string(),
        is_final,
        confidence: Some(0.9),
        timestamp: t0(),
    }
}

pub fn final_turn(id: &str, role: Role, text: &str) -> TranscriptTurn {
    TranscriptTurn {
        id: id.to_string(),
        role,
        text: text.to_string(),
        timestamp: t0(),
        confidence: None,
        is_final: true,
    }
}

// ============================================================================
// Scripted provider
// ============================================================================

#[derive(Default)]
struct ProviderState {
    sender: Option<mpsc::Sender<ProviderEvent>>,
    connect_failures: usize,
    reject_initialize: bool,
    initialize_calls: usize,
    connect_calls: usize,
    disconnect_calls: usize,
}

/// Test-side control of a [`ScriptedProvider`]
#[derive(Clone, Default)]
pub struct ProviderHandle {
    state: Arc<Mutex<ProviderState>>,
}

impl ProviderHandle {
    /// Push an event into the open call
    pub async fn send(&self, event: ProviderEvent) {
        let sender = self.state.lock().unwrap().sender.clone();
        sender
            .expect("no open call")
            .send(event)
            .await
            .expect("call receiver dropped");
    }

    /// Drop the event channel without an end-of-call event
    pub fn drop_channel(&self) {
        self.state.lock().unwrap().sender = None;
    }

    pub fn fail_next_connects(&self, count: usize) {
        self.state.lock().unwrap().connect_failures = count;
    }

    pub fn reject_initialize(&self) {
        self.state.lock().unwrap().reject_initialize = true;
    }

    pub fn initialize_calls(&self) -> usize {
        self.state.lock().unwrap().initialize_calls
    }

    pub fn connect_calls(&self) -> usize {
        self.state.lock().unwrap().connect_calls
    }

    pub fn disconnect_calls(&self) -> usize {
        self.state.lock().unwrap().disconnect_calls
    }
}

pub struct ScriptedProvider {
    handle: ProviderHandle,
}

impl ScriptedProvider {
    pub fn new() -> (Self, ProviderHandle) {
        let handle = ProviderHandle::default();
        (
            Self {
                handle: handle.clone(),
            },
            handle,
        )
    }

    pub fn with_handle(handle: ProviderHandle) -> Self {
        Self { handle }
    }
}

#[async_trait::async_trait]
impl VoiceProvider for ScriptedProvider {
    async fn initialize(&mut self, _credentials: &ProviderCredentials) -> Result<(), InitializationError> {
        let mut state = self.handle.state.lock().unwrap();
        state.initialize_calls += 1;
        if state.reject_initialize {
            return Err(InitializationError::Provider("bad key".to_string()));
        }
        Ok(())
    }

    async fn connect(&mut self) -> Result<mpsc::Receiver<ProviderEvent>, ConnectionError> {
        let mut state = self.handle.state.lock().unwrap();
        state.connect_calls += 1;

        if state.connect_failures > 0 {
            state.connect_failures -= 1;
            return Err(ConnectionError::Transport("scripted network failure".to_string()));
        }

        let (tx, rx) = mpsc::channel(64);
        state.sender = Some(tx);
        Ok(rx)
    }

    async fn disconnect(&mut self) -> Result<(), ConnectionError> {
        let mut state = self.handle.state.lock().unwrap();
        state.disconnect_calls += 1;
        state.sender = None;
        Ok(())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Hands every interview the same scripted call
#[derive(Clone, Default)]
pub struct ScriptedFactory {
    pub handle: ProviderHandle,
}

impl ProviderFactory for ScriptedFactory {
    fn create(&self) -> Box<dyn VoiceProvider> {
        Box::new(ScriptedProvider::with_handle(self.handle.clone()))
    }
}

// ============================================================================
// Recording store
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    CreateCandidate { email: String },
    CreateSession { call_ref: Option<String> },
    Append { text: String, ok: bool },
    UpdateCallRef { call_ref: String },
    Complete { with_summary: bool, ok: bool },
    ProviderAssessment { call_ref: String },
    TranscriptAssessment,
}

/// `MemoryStore` wrapper that records calls and injects failures
pub struct RecordingStore {
    pub inner: MemoryStore,
    clock: ManualClock,
    calls: Mutex<Vec<StoreCall>>,
    pub append_failures: AtomicUsize,
    pub completion_failures: AtomicUsize,
    pub create_session_failures: AtomicUsize,
    pub assessment_failures: AtomicUsize,
    /// Simulated latency of a failing completion call
    pub completion_failure_latency_ms: i64,
    /// Real time each transcript append takes
    pub append_delay: Option<Duration>,
    /// When set, assessment requests wait for a permit
    pub assessment_gate: Option<Arc<Notify>>,
}

impl RecordingStore {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            inner: MemoryStore::new(Arc::new(voice_screening::store::FlatScorer::default()), Arc::new(clock.clone())),
            clock,
            calls: Mutex::new(Vec::new()),
            append_failures: AtomicUsize::new(0),
            completion_failures: AtomicUsize::new(0),
            create_session_failures: AtomicUsize::new(0),
            assessment_failures: AtomicUsize::new(0),
            completion_failure_latency_ms: 0,
            append_delay: None,
            assessment_gate: None,
        }
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, matches: impl Fn(&StoreCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| matches(c)).count()
    }

    pub fn successful_completions(&self) -> usize {
        self.count(|c| matches!(c, StoreCall::Complete { ok: true, .. }))
    }

    fn record(&self, call: StoreCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    async fn wait_for_gate(&self) {
        if let Some(gate) = &self.assessment_gate {
            gate.notified().await;
        }
    }
}

#[async_trait::async_trait]
impl InterviewStore for RecordingStore {
    async fn create_candidate(&self, candidate: NewCandidate) -> Result<String, StorageError> {
        self.record(StoreCall::CreateCandidate {
            email: candidate.email.clone(),
        });
        self.inner.create_candidate(candidate).await
    }

    async fn create_session(
        &self,
        candidate_id: &str,
        session_ref: &str,
        call_ref: Option<&str>,
    ) -> Result<String, StorageError> {
        self.record(StoreCall::CreateSession {
            call_ref: call_ref.map(String::from),
        });
        if Self::take_failure(&self.create_session_failures) {
            return Err(StorageError::Unavailable("scripted create failure".to_string()));
        }
        self.inner.create_session(candidate_id, session_ref, call_ref).await
    }

    async fn append_transcript_turn(&self, session_id: &str, turn: &TranscriptTurn) -> Result<(), StorageError> {
        if let Some(delay) = self.append_delay {
            tokio::time::sleep(delay).await;
        }
        if Self::take_failure(&self.append_failures) {
            self.record(StoreCall::Append {
                text: turn.text.clone(),
                ok: false,
            });
            return Err(StorageError::Unavailable("scripted append failure".to_string()));
        }
        self.record(StoreCall::Append {
            text: turn.text.clone(),
            ok: true,
        });
        self.inner.append_transcript_turn(session_id, turn).await
    }

    async fn update_call_reference(&self, session_id: &str, call_ref: &str) -> Result<(), StorageError> {
        self.record(StoreCall::UpdateCallRef {
            call_ref: call_ref.to_string(),
        });
        self.inner.update_call_reference(session_id, call_ref).await
    }

    async fn complete_session(
        &self,
        session_id: &str,
        summary: Option<CompletionSummary>,
    ) -> Result<(), StorageError> {
        let with_summary = summary.is_some();

        if Self::take_failure(&self.completion_failures) {
            self.clock.advance_ms(self.completion_failure_latency_ms);
            self.record(StoreCall::Complete {
                with_summary,
                ok: false,
            });
            return Err(StorageError::Unavailable("scripted completion failure".to_string()));
        }

        self.record(StoreCall::Complete {
            with_summary,
            ok: true,
        });
        self.inner.complete_session(session_id, summary).await
    }

    async fn request_assessment_from_provider(
        &self,
        session_id: &str,
        call_ref: &str,
    ) -> Result<Assessment, StorageError> {
        self.record(StoreCall::ProviderAssessment {
            call_ref: call_ref.to_string(),
        });
        self.wait_for_gate().await;
        if Self::take_failure(&self.assessment_failures) {
            return Err(StorageError::Request("scoring service timed out".to_string()));
        }
        self.inner.request_assessment_from_provider(session_id, call_ref).await
    }

    async fn request_assessment_from_transcript(&self, session_id: &str) -> Result<Assessment, StorageError> {
        self.record(StoreCall::TranscriptAssessment);
        self.wait_for_gate().await;
        if Self::take_failure(&self.assessment_failures) {
            return Err(StorageError::Request("scoring service timed out".to_string()));
        }
        self.inner.request_assessment_from_transcript(session_id).await
    }
}

/// Controller over a recording store, in `Starting`
pub async fn starting_controller(store: Arc<RecordingStore>, clock: &ManualClock) -> SessionController {
    let controller = SessionController::new(store, Arc::new(clock.clone()), SAFETY_DELAY);
    controller
        .begin(candidate("Electrician"))
        .await
        .expect("valid candidate");
    controller
}

/// Run a session through to `Completed` with the given turns
pub async fn completed_session(
    store: Arc<RecordingStore>,
    clock: &ManualClock,
    call_ref: Option<&str>,
    turns: &[(Role, &str)],
) -> SessionSnapshot {
    let controller = starting_controller(store, clock).await;

    controller.on_connected().await.expect("connected");
    controller
        .on_call_identity(identity("sess-1", call_ref))
        .await
        .expect("active");

    for (i, (role, text)) in turns.iter().enumerate() {
        controller.record_turn(final_turn(&format!("t{}", i), *role, text)).await;
    }

    clock.advance_ms(60_000);
    controller.teardown().await.expect("completed")
}
