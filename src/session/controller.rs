use super::candidate::CandidateProfile;
use super::phase::{CompletionTrigger, SessionPhase};
use super::snapshot::{millis_between, SessionSnapshot};
use crate::clock::Clock;
use crate::connection::CallIdentity;
use crate::error::{SessionError, StorageError};
use crate::store::{CompletionSummary, InterviewStore, NewCandidate};
use crate::transcript::TranscriptTurn;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const CANDIDATE_SOURCE: &str = "voice_interview_portal";

/// Mutable lifecycle state, owned by the controller alone
struct SessionState {
    /// Public part, mirrored into the snapshot channel
    view: SessionSnapshot,

    candidate: Option<CandidateProfile>,

    /// Set the moment `Starting -> Active` is decided; never reset
    activation_fired: bool,

    /// Whether the store has the current call reference
    call_ref_persisted: bool,

    /// Finalized turns seen before the record existed
    pending_turns: Vec<TranscriptTurn>,
}

/// State machine for one interview session
///
/// Every operation runs under one lock, held across its storage calls, so
/// lifecycle steps never interleave: the `Active` transition fires once and
/// completion is idempotent however many triggers race for it.
#[derive(Clone)]
pub struct SessionController {
    /// Lifecycle state
    state: Arc<Mutex<SessionState>>,

    /// Persistence collaborator
    store: Arc<dyn InterviewStore>,

    /// Timestamp source
    clock: Arc<dyn Clock>,

    /// Latest snapshot, readable without waiting on the lock
    snapshot_tx: Arc<watch::Sender<SessionSnapshot>>,

    /// Delay before the post-end completion backstop
    safety_delay: Duration,

    /// Backstop timer, armed by the first end request
    safety_timer: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl SessionController {
    pub fn new(store: Arc<dyn InterviewStore>, clock: Arc<dyn Clock>, safety_delay: Duration) -> Self {
        let view = SessionSnapshot::new();
        let (snapshot_tx, _) = watch::channel(view.clone());

        Self {
            state: Arc::new(Mutex::new(SessionState {
                view,
                candidate: None,
                activation_fired: false,
                call_ref_persisted: false,
                pending_turns: Vec::new(),
            })),
            store,
            clock,
            snapshot_tx: Arc::new(snapshot_tx),
            safety_delay,
            safety_timer: Arc::new(Mutex::new(None)),
        }
    }

    /// Current lifecycle state
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// Follow lifecycle changes
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// `Setup -> Starting`: accept validated candidate details
    pub async fn begin(&self, candidate: CandidateProfile) -> Result<(), SessionError> {
        candidate.validate()?;

        let mut state = self.state.lock().await;
        self.transition(&mut state, SessionPhase::Starting)?;
        state.candidate = Some(candidate);

        info!("Interview session starting");
        self.publish(&state);

        Ok(())
    }

    /// The live channel is open
    pub async fn on_connected(&self) -> Result<(), SessionError> {
        let mut state = self.state.lock().await;

        if state.view.phase != SessionPhase::Starting {
            debug!("Ignoring connected signal in {:?}", state.view.phase);
            return Ok(());
        }

        if state.view.started_at.is_none() {
            state.view.started_at = Some(self.clock.now());
        }

        let result = self.try_activate(&mut state).await;
        self.publish(&state);
        result
    }

    /// The provider issued (part of) the call identity
    pub async fn on_call_identity(&self, identity: CallIdentity) -> Result<(), SessionError> {
        let mut state = self.state.lock().await;

        if state.view.phase.is_terminal() {
            debug!("Ignoring call identity in {:?}", state.view.phase);
            return Ok(());
        }

        if state.view.session_ref.is_none() {
            info!("Provider session reference: {}", identity.session_ref);
            state.view.session_ref = Some(identity.session_ref);
        }

        if state.view.call_ref.is_none() {
            if let Some(call_ref) = identity.call_ref {
                info!("Provider call reference: {}", call_ref);
                state.view.call_ref = Some(call_ref);

                if state.view.phase == SessionPhase::Active {
                    self.persist_call_ref(&mut state).await;
                }
            }
        }

        let result = self.try_activate(&mut state).await;
        self.publish(&state);
        result
    }

    /// Persist a finalized turn
    ///
    /// Partial turns are ignored. Append failures are retried once and then
    /// counted; they never interrupt the interview.
    pub async fn record_turn(&self, turn: TranscriptTurn) {
        if !turn.is_final {
            debug!("Ignoring partial turn from {}", turn.role);
            return;
        }

        let mut state = self.state.lock().await;

        match state.view.phase {
            SessionPhase::Starting => {
                debug!("Buffering {} turn until the session record exists", turn.role);
                state.view.turn_count += 1;
                state.pending_turns.push(turn);
            }
            SessionPhase::Active => {
                state.view.turn_count += 1;
                if let Some(session_id) = state.view.session_id.clone() {
                    if !self.append_with_retry(&session_id, &turn).await {
                        state.view.failed_appends += 1;
                    }
                }
            }
            phase => {
                debug!("Dropping {} turn received in {:?}", turn.role, phase);
                return;
            }
        }

        self.publish(&state);
    }

    /// Explicit end of interview
    ///
    /// Arms the safety timer, then completes.
    pub async fn request_end(&self) -> Result<SessionSnapshot, SessionError> {
        self.arm_safety_timer().await;
        self.complete(CompletionTrigger::EndRequested).await
    }

    /// The live channel closed without an end request
    pub async fn on_channel_closed(&self, reason: &str) -> Result<SessionSnapshot, SessionError> {
        info!("Live channel closed: {}", reason);
        self.complete(CompletionTrigger::ChannelClosed).await
    }

    /// The owning context is going away
    pub async fn teardown(&self) -> Result<SessionSnapshot, SessionError> {
        self.complete(CompletionTrigger::Teardown).await
    }

    /// Drive the session to a terminal phase
    ///
    /// Safe to call any number of times from any trigger. An active session
    /// gets one primary completion call with summary data and, if that
    /// fails, one fallback call without it. If both fail the session stays
    /// `Active` and the error is returned for someone to retry.
    pub async fn complete(&self, trigger: CompletionTrigger) -> Result<SessionSnapshot, SessionError> {
        let mut state = self.state.lock().await;

        match state.view.phase {
            phase if phase.is_terminal() => {
                debug!("Completion ({}) ignored, session already {:?}", trigger, phase);
                return Ok(state.view.clone());
            }
            SessionPhase::Setup | SessionPhase::Starting => {
                info!("Session ended ({}) before going live, abandoning", trigger);
                self.transition(&mut state, SessionPhase::Abandoned)?;
                state.view.completed_by = Some(trigger);
                state.pending_turns.clear();
                self.publish(&state);
                return Ok(state.view.clone());
            }
            _ => {}
        }

        let session_id = match state.view.session_id.clone() {
            Some(id) => id,
            None => {
                return Err(SessionError::InvalidTransition {
                    from: state.view.phase,
                    to: SessionPhase::Completing,
                })
            }
        };

        self.transition(&mut state, SessionPhase::Completing)?;
        self.publish(&state);

        info!("Completing session {} ({})", session_id, trigger);

        if state.view.call_ref.is_some() && !state.call_ref_persisted {
            self.persist_call_ref(&mut state).await;
        }

        let ended_at = self.clock.now();
        let summary = CompletionSummary {
            ended_at,
            duration_ms: self.duration_until(&state, ended_at),
            call_ref: state.view.call_ref.clone(),
            turn_count: state.view.turn_count,
        };

        let ended_at = match self.store.complete_session(&session_id, Some(summary)).await {
            Ok(()) => ended_at,
            Err(primary) => {
                warn!("Completion of session {} failed, trying fallback: {}", session_id, primary);

                let fallback_at = self.clock.now();
                match self.store.complete_session(&session_id, None).await {
                    Ok(()) => {
                        info!("Session {} completed without summary data", session_id);
                        fallback_at
                    }
                    Err(fallback) => {
                        error!(
                            "Session {} could not be completed (primary: {}; fallback: {})",
                            session_id, primary, fallback
                        );
                        self.transition(&mut state, SessionPhase::Active)?;
                        state.view.last_error = Some(fallback.to_string());
                        self.publish(&state);
                        return Err(SessionError::CompletionFailed { primary, fallback });
                    }
                }
            }
        };

        state.view.ended_at = Some(ended_at);
        state.view.duration_ms = Some(self.duration_until(&state, ended_at));
        state.view.completed_by = Some(trigger);
        self.transition(&mut state, SessionPhase::Completed)?;
        self.publish(&state);

        info!(
            "Session {} completed after {}ms with {} turns",
            session_id,
            state.view.duration_ms.unwrap_or(0),
            state.view.turn_count
        );

        Ok(state.view.clone())
    }

    /// Fire `Starting -> Active` if both signals are in and it has not fired yet
    async fn try_activate(&self, state: &mut SessionState) -> Result<(), SessionError> {
        if state.activation_fired || state.view.phase != SessionPhase::Starting {
            return Ok(());
        }

        let session_ref = match (&state.view.started_at, &state.view.session_ref) {
            (Some(_), Some(session_ref)) => session_ref.clone(),
            _ => return Ok(()),
        };

        state.activation_fired = true;
        state.view.activated_at = Some(self.clock.now());

        match self.create_records(state, &session_ref).await {
            Ok(()) => {
                self.transition(state, SessionPhase::Active)?;
                info!(
                    "Session {} active",
                    state.view.session_id.as_deref().unwrap_or_default()
                );
                self.flush_pending(state).await;
                Ok(())
            }
            Err(e) => {
                error!("Failed to create session records: {}", e);
                state.view.last_error = Some(e.to_string());
                state.pending_turns.clear();
                self.transition(state, SessionPhase::Failed)?;
                Err(SessionError::Storage(e))
            }
        }
    }

    async fn create_records(&self, state: &mut SessionState, session_ref: &str) -> Result<(), StorageError> {
        let profile = state.candidate.clone().unwrap_or_default();
        let email = profile
            .email()
            .map(String::from)
            .unwrap_or_else(|| format!("candidate_{}@temporary.com", self.clock.now().timestamp_millis()));

        let candidate_id = self
            .store
            .create_candidate(NewCandidate {
                email,
                first_name: profile.first_name,
                last_name: profile.last_name,
                position: profile.position,
                trade_category: profile.trade_category,
                consent_given: true,
                source: CANDIDATE_SOURCE.to_string(),
            })
            .await?;
        state.view.candidate_id = Some(candidate_id.clone());

        let call_ref = state.view.call_ref.clone();
        let session_id = self
            .store
            .create_session(&candidate_id, session_ref, call_ref.as_deref())
            .await?;

        info!("Created session {} for candidate {}", session_id, candidate_id);

        state.view.session_id = Some(session_id);
        state.call_ref_persisted = call_ref.is_some();

        Ok(())
    }

    async fn flush_pending(&self, state: &mut SessionState) {
        let Some(session_id) = state.view.session_id.clone() else {
            return;
        };

        let pending = std::mem::take(&mut state.pending_turns);
        if !pending.is_empty() {
            debug!("Flushing {} buffered turns", pending.len());
        }

        for turn in pending {
            if !self.append_with_retry(&session_id, &turn).await {
                state.view.failed_appends += 1;
            }
        }
    }

    /// Returns whether the turn was stored
    async fn append_with_retry(&self, session_id: &str, turn: &TranscriptTurn) -> bool {
        match self.store.append_transcript_turn(session_id, turn).await {
            Ok(()) => true,
            Err(first) => {
                warn!("Failed to store {} turn, retrying: {}", turn.role, first);
                match self.store.append_transcript_turn(session_id, turn).await {
                    Ok(()) => true,
                    Err(e) => {
                        error!("Dropping {} turn after retry: {}", turn.role, e);
                        false
                    }
                }
            }
        }
    }

    /// Best-effort; a failure is retried before completion
    async fn persist_call_ref(&self, state: &mut SessionState) {
        let (Some(session_id), Some(call_ref)) = (state.view.session_id.clone(), state.view.call_ref.clone())
        else {
            return;
        };

        match self.store.update_call_reference(&session_id, &call_ref).await {
            Ok(()) => {
                info!("Updated session {} with call reference {}", session_id, call_ref);
                state.call_ref_persisted = true;
            }
            Err(e) => warn!("Failed to update call reference: {}", e),
        }
    }

    async fn arm_safety_timer(&self) {
        let mut timer = self.safety_timer.lock().await;
        if timer.is_some() {
            return;
        }

        let controller = self.clone();
        let delay = self.safety_delay;

        *timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            debug!("Safety timer fired");
            if let Err(e) = controller.complete(CompletionTrigger::SafetyTimer).await {
                error!("Safety completion failed: {}", e);
            }
        }));
    }

    fn duration_until(&self, state: &SessionState, ended_at: chrono::DateTime<chrono::Utc>) -> u64 {
        state
            .view
            .started_at
            .map(|started| millis_between(started, ended_at))
            .unwrap_or(0)
    }

    fn transition(&self, state: &mut SessionState, next: SessionPhase) -> Result<(), SessionError> {
        let current = state.view.phase;
        if !current.can_transition_to(next) {
            return Err(SessionError::InvalidTransition {
                from: current,
                to: next,
            });
        }

        debug!("Session phase {:?} -> {:?}", current, next);
        state.view.phase = next;
        Ok(())
    }

    fn publish(&self, state: &SessionState) {
        self.snapshot_tx.send_replace(state.view.clone());
    }
}
