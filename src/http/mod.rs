//! HTTP API for driving interviews
//!
//! - POST /interviews - Start an interview (body: candidate details)
//! - POST /interviews/:id/connect - Retry the live connection
//! - POST /interviews/:id/end - End an interview (idempotent once ended)
//! - GET /interviews/:id/status - Session and connection state
//! - GET /interviews/:id/transcript - Finalized turns and live partials
//! - POST /interviews/:id/assessment - Score a completed interview
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::{AppState, FinishedInterview, InterviewEntry};
