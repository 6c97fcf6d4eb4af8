use super::model::Assessment;
use super::source::source_for;
use crate::error::{AssessmentError, StorageError};
use crate::session::{SessionPhase, SessionSnapshot};
use crate::store::InterviewStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Clone)]
enum RequestSlot {
    InFlight,
    Assessed(Assessment),
}

/// Triggers scoring for completed sessions
///
/// At most one request per session is in flight; a session with an
/// assessment is never scored again. Failures clear the slot so the caller
/// can retry. Nothing is retried automatically.
#[derive(Clone)]
pub struct AssessmentScheduler {
    store: Arc<dyn InterviewStore>,

    /// Per-session request state (session_id -> slot)
    slots: Arc<Mutex<HashMap<String, RequestSlot>>>,
}

impl AssessmentScheduler {
    pub fn new(store: Arc<dyn InterviewStore>) -> Self {
        Self {
            store,
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Request an assessment for a completed session
    pub async fn schedule(&self, session: &SessionSnapshot) -> Result<Assessment, AssessmentError> {
        if session.phase != SessionPhase::Completed {
            return Err(AssessmentError::NotCompleted(session.phase));
        }

        let session_id = session.session_id.clone().ok_or(AssessmentError::MissingRecord)?;

        {
            let mut slots = self.slots.lock().await;
            match slots.get(&session_id) {
                Some(RequestSlot::InFlight) => {
                    return Err(AssessmentError::AlreadyInFlight(session_id));
                }
                Some(RequestSlot::Assessed(_)) => {
                    return Err(AssessmentError::AlreadyAssessed(session_id));
                }
                None => {
                    slots.insert(session_id.clone(), RequestSlot::InFlight);
                }
            }
        }

        let source = source_for(session);
        let path = source.path();
        info!("Requesting assessment for session {} via {}", session_id, path);

        let result = source.request(self.store.as_ref(), &session_id).await;

        let mut slots = self.slots.lock().await;
        match result {
            Ok(assessment) => {
                info!(
                    "Assessment for session {}: score={} passed={}",
                    session_id, assessment.overall_score, assessment.passed
                );
                slots.insert(session_id, RequestSlot::Assessed(assessment.clone()));
                Ok(assessment)
            }
            Err(StorageError::Conflict(message)) => {
                warn!("Session {} already assessed in storage: {}", session_id, message);
                slots.remove(&session_id);
                Err(AssessmentError::AlreadyAssessed(session_id))
            }
            Err(source) => {
                warn!("Assessment via {} failed for session {}: {}", path, session_id, source);
                slots.remove(&session_id);
                Err(AssessmentError::Request {
                    path: path.as_str(),
                    source,
                })
            }
        }
    }

    /// Assessment produced through this scheduler, if any
    pub async fn assessment(&self, session_id: &str) -> Option<Assessment> {
        match self.slots.lock().await.get(session_id) {
            Some(RequestSlot::Assessed(assessment)) => Some(assessment.clone()),
            _ => None,
        }
    }

    pub async fn is_in_flight(&self, session_id: &str) -> bool {
        matches!(
            self.slots.lock().await.get(session_id),
            Some(RequestSlot::InFlight)
        )
    }
}
