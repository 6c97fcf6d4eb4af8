use super::state::{AppState, FinishedInterview, InterviewEntry};
use crate::assessment::Assessment;
use crate::connection::ConnectionStatus;
use crate::error::{AssessmentError, InterviewError, SessionError};
use crate::interview::Interview;
use crate::session::{format_duration, CandidateProfile, SessionSnapshot};
use crate::transcript::{Role, TranscriptTurn};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct InterviewResponse {
    pub interview_id: String,
    pub session: SessionSnapshot,
    pub connection: ConnectionStatus,
    /// Elapsed interview time as m:ss
    pub elapsed: String,
}

#[derive(Debug, Serialize)]
pub struct TranscriptResponse {
    pub interview_id: String,
    pub turns: Vec<TranscriptTurn>,
    pub candidate_partial: Option<TranscriptTurn>,
    pub interviewer_partial: Option<TranscriptTurn>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Whether the same request may succeed if repeated
    pub retriable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interview_id: Option<String>,
}

fn error_response(status: StatusCode, error: String, retriable: bool) -> Response {
    (
        status,
        Json(ErrorResponse {
            error,
            retriable,
            interview_id: None,
        }),
    )
        .into_response()
}

fn not_found(interview_id: &str) -> Response {
    error_response(
        StatusCode::NOT_FOUND,
        format!("Interview {} not found", interview_id),
        false,
    )
}

fn interview_error_response(err: &InterviewError) -> Response {
    let (status, retriable) = match err {
        InterviewError::Session(SessionError::Validation(_)) => (StatusCode::UNPROCESSABLE_ENTITY, false),
        InterviewError::Initialization(_) => (StatusCode::SERVICE_UNAVAILABLE, false),
        InterviewError::Connection(_) => (StatusCode::BAD_GATEWAY, true),
        InterviewError::Session(SessionError::CompletionFailed { .. }) => (StatusCode::BAD_GATEWAY, true),
        InterviewError::Session(_) => (StatusCode::CONFLICT, false),
    };

    error_response(status, err.to_string(), retriable)
}

fn assessment_error_response(err: &AssessmentError) -> Response {
    let status = match err {
        AssessmentError::NotCompleted(_) | AssessmentError::MissingRecord => StatusCode::CONFLICT,
        AssessmentError::AlreadyInFlight(_) | AssessmentError::AlreadyAssessed(_) => StatusCode::CONFLICT,
        AssessmentError::Request { .. } => StatusCode::BAD_GATEWAY,
    };

    error_response(status, err.to_string(), err.is_retriable())
}

async fn describe(state: &AppState, interview_id: String, interview: &Interview) -> InterviewResponse {
    let session = interview.snapshot();
    let elapsed = format_duration(session.elapsed_ms(state.clock.now()));

    InterviewResponse {
        interview_id,
        connection: interview.connection_status().await,
        session,
        elapsed,
    }
}

fn describe_finished(state: &AppState, interview_id: String, finished: FinishedInterview) -> InterviewResponse {
    InterviewResponse {
        interview_id,
        elapsed: format_duration(finished.session.elapsed_ms(state.clock.now())),
        session: finished.session,
        connection: finished.connection,
    }
}

async fn describe_entry(state: &AppState, interview_id: String, entry: InterviewEntry) -> InterviewResponse {
    match entry {
        InterviewEntry::Live(interview) => describe(state, interview_id, &interview).await,
        InterviewEntry::Finished(finished) => describe_finished(state, interview_id, finished),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /interviews
/// Validate the candidate, set up the provider and open the live channel
pub async fn start_interview(
    State(state): State<AppState>,
    Json(candidate): Json<CandidateProfile>,
) -> Response {
    let interview_id = format!("interview-{}", uuid::Uuid::new_v4());

    info!("Starting interview {} for position {:?}", interview_id, candidate.position);

    let interview = match Interview::prepare(
        candidate,
        state.providers.create(),
        state.provider_config.clone(),
        Arc::clone(&state.store),
        Arc::clone(&state.clock),
        &state.settings,
    )
    .await
    {
        Ok(interview) => Arc::new(interview),
        Err(e) => {
            error!("Failed to prepare interview: {}", e);
            return interview_error_response(&e);
        }
    };

    state.register(interview_id.clone(), Arc::clone(&interview)).await;

    if let Err(e) = interview.connect().await {
        warn!("Interview {} failed to connect: {}", interview_id, e);
        return (
            StatusCode::BAD_GATEWAY,
            Json(ErrorResponse {
                error: e.to_string(),
                retriable: true,
                interview_id: Some(interview_id),
            }),
        )
            .into_response();
    }

    let body = describe(&state, interview_id, &interview).await;
    (StatusCode::CREATED, Json(body)).into_response()
}

/// POST /interviews/:interview_id/connect
/// Retry opening the live channel
pub async fn connect_interview(
    State(state): State<AppState>,
    Path(interview_id): Path<String>,
) -> Response {
    let interview = match state.lookup(&interview_id).await {
        Some(InterviewEntry::Live(interview)) => interview,
        Some(InterviewEntry::Finished(_)) => {
            return error_response(
                StatusCode::CONFLICT,
                format!("Interview {} has ended", interview_id),
                false,
            )
        }
        None => return not_found(&interview_id),
    };

    match interview.connect().await {
        Ok(()) => {
            let body = describe(&state, interview_id, &interview).await;
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => {
            warn!("Interview {} failed to connect: {}", interview_id, e);
            interview_error_response(&e)
        }
    }
}

/// POST /interviews/:interview_id/end
/// End the interview and complete its session
pub async fn end_interview(
    State(state): State<AppState>,
    Path(interview_id): Path<String>,
) -> Response {
    let interview = match state.lookup(&interview_id).await {
        Some(InterviewEntry::Live(interview)) => interview,
        Some(finished) => {
            let body = describe_entry(&state, interview_id, finished).await;
            return (StatusCode::OK, Json(body)).into_response();
        }
        None => return not_found(&interview_id),
    };

    info!("Ending interview {}", interview_id);

    match interview.end().await {
        Ok(_) => {
            let body = describe(&state, interview_id.clone(), &interview).await;
            if body.session.phase.is_terminal() {
                state.retire(&interview_id).await;
            }
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => {
            error!("Failed to end interview {}: {}", interview_id, e);
            interview_error_response(&e)
        }
    }
}

/// GET /interviews/:interview_id/status
pub async fn get_interview_status(
    State(state): State<AppState>,
    Path(interview_id): Path<String>,
) -> Response {
    match state.lookup(&interview_id).await {
        Some(entry) => {
            let body = describe_entry(&state, interview_id, entry).await;
            (StatusCode::OK, Json(body)).into_response()
        }
        None => not_found(&interview_id),
    }
}

/// GET /interviews/:interview_id/transcript
/// Finalized turns plus what each participant is saying right now
pub async fn get_interview_transcript(
    State(state): State<AppState>,
    Path(interview_id): Path<String>,
) -> Response {
    let body = match state.lookup(&interview_id).await {
        Some(InterviewEntry::Live(interview)) => TranscriptResponse {
            turns: interview.transcript().await,
            candidate_partial: interview.partial(Role::Candidate).await,
            interviewer_partial: interview.partial(Role::Interviewer).await,
            interview_id,
        },
        Some(InterviewEntry::Finished(finished)) => TranscriptResponse {
            turns: finished.turns,
            candidate_partial: None,
            interviewer_partial: None,
            interview_id,
        },
        None => return not_found(&interview_id),
    };

    (StatusCode::OK, Json(body)).into_response()
}

/// POST /interviews/:interview_id/assessment
/// Score a completed interview
pub async fn create_assessment(
    State(state): State<AppState>,
    Path(interview_id): Path<String>,
) -> Response {
    let session = match state.lookup(&interview_id).await {
        Some(InterviewEntry::Live(interview)) => interview.snapshot(),
        Some(InterviewEntry::Finished(finished)) => finished.session,
        None => return not_found(&interview_id),
    };

    let result: Result<Assessment, AssessmentError> = state.scheduler.schedule(&session).await;

    match result {
        Ok(assessment) => (StatusCode::CREATED, Json(assessment)).into_response(),
        Err(e) => {
            warn!("Assessment for interview {} not created: {}", interview_id, e);
            assessment_error_response(&e)
        }
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
