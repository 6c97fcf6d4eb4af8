use crate::assessment::AssessmentScheduler;
use crate::clock::Clock;
use crate::config::{ProviderConfig, SessionSettings};
use crate::connection::{ConnectionStatus, ProviderFactory};
use crate::interview::Interview;
use crate::session::SessionSnapshot;
use crate::store::InterviewStore;
use crate::transcript::TranscriptTurn;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// What is kept of an interview once its session is over
#[derive(Debug, Clone)]
pub struct FinishedInterview {
    pub session: SessionSnapshot,
    pub connection: ConnectionStatus,
    pub turns: Vec<TranscriptTurn>,
}

/// An interview as seen by the handlers
pub enum InterviewEntry {
    Live(Arc<Interview>),
    Finished(FinishedInterview),
}

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Interviews still holding a live channel (interview_id → interview)
    pub interviews: Arc<RwLock<HashMap<String, Arc<Interview>>>>,

    /// Interviews whose session reached a terminal phase
    pub finished: Arc<RwLock<HashMap<String, FinishedInterview>>>,

    /// Builds a voice provider per interview
    pub providers: Arc<dyn ProviderFactory>,

    pub provider_config: ProviderConfig,

    pub settings: SessionSettings,

    pub store: Arc<dyn InterviewStore>,

    pub clock: Arc<dyn Clock>,

    pub scheduler: AssessmentScheduler,
}

impl AppState {
    pub fn new(
        providers: Arc<dyn ProviderFactory>,
        provider_config: ProviderConfig,
        settings: SessionSettings,
        store: Arc<dyn InterviewStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            interviews: Arc::new(RwLock::new(HashMap::new())),
            finished: Arc::new(RwLock::new(HashMap::new())),
            providers,
            provider_config,
            settings,
            scheduler: AssessmentScheduler::new(Arc::clone(&store)),
            store,
            clock,
        }
    }

    pub async fn interview(&self, interview_id: &str) -> Option<Arc<Interview>> {
        self.interviews.read().await.get(interview_id).cloned()
    }

    pub async fn lookup(&self, interview_id: &str) -> Option<InterviewEntry> {
        if let Some(interview) = self.interview(interview_id).await {
            return Some(InterviewEntry::Live(interview));
        }

        self.finished
            .read()
            .await
            .get(interview_id)
            .cloned()
            .map(InterviewEntry::Finished)
    }

    /// Register a live interview and retire it once its session is over
    pub async fn register(&self, interview_id: String, interview: Arc<Interview>) {
        let mut phases = interview.controller().watch();
        self.interviews
            .write()
            .await
            .insert(interview_id.clone(), interview);

        let state = self.clone();
        tokio::spawn(async move {
            if phases.wait_for(|s| s.phase.is_terminal()).await.is_ok() {
                state.retire(&interview_id).await;
            }
        });
    }

    /// Drop the live interview, keeping its final state. No-op if already retired.
    ///
    /// Dropping the last handle hangs up the channel and stops its event task.
    pub async fn retire(&self, interview_id: &str) {
        // Lock order: finished, then interviews. Lookups never hold both.
        let mut finished = self.finished.write().await;
        let Some(interview) = self.interviews.write().await.remove(interview_id) else {
            debug!("Interview {} already retired", interview_id);
            return;
        };

        let record = FinishedInterview {
            session: interview.snapshot(),
            connection: interview.connection_status().await,
            turns: interview.transcript().await,
        };

        info!(
            "Retiring interview {} ({:?})",
            interview_id, record.session.phase
        );
        finished.insert(interview_id.to_string(), record);
    }
}
