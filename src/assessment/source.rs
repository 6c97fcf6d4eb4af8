use super::model::{Assessment, AssessmentPath};
use crate::error::StorageError;
use crate::session::SessionSnapshot;
use crate::store::InterviewStore;

/// Something that can produce an assessment for a stored session
#[async_trait::async_trait]
pub trait AssessmentSource: Send + Sync {
    fn path(&self) -> AssessmentPath;

    async fn request(&self, store: &dyn InterviewStore, session_id: &str) -> Result<Assessment, StorageError>;
}

/// Recompute from the provider's recording and analysis of the call
pub struct ProviderDataSource {
    pub call_ref: String,
}

#[async_trait::async_trait]
impl AssessmentSource for ProviderDataSource {
    fn path(&self) -> AssessmentPath {
        AssessmentPath::ProviderData
    }

    async fn request(&self, store: &dyn InterviewStore, session_id: &str) -> Result<Assessment, StorageError> {
        store.request_assessment_from_provider(session_id, &self.call_ref).await
    }
}

/// Score the transcript turns persisted during the interview
pub struct StoredTranscriptSource;

#[async_trait::async_trait]
impl AssessmentSource for StoredTranscriptSource {
    fn path(&self) -> AssessmentPath {
        AssessmentPath::StoredTranscript
    }

    async fn request(&self, store: &dyn InterviewStore, session_id: &str) -> Result<Assessment, StorageError> {
        store.request_assessment_from_transcript(session_id).await
    }
}

/// Pick the source for a session: provider data whenever a call reference exists
pub fn source_for(session: &SessionSnapshot) -> Box<dyn AssessmentSource> {
    match &session.call_ref {
        Some(call_ref) => Box::new(ProviderDataSource {
            call_ref: call_ref.clone(),
        }),
        None => Box::new(StoredTranscriptSource),
    }
}
