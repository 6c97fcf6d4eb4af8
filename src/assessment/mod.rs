//! Post-interview assessment scheduling
//!
//! A completed session is scored from one of two sources, chosen once per
//! request: provider-side data when the session has a call reference, the
//! stored transcript otherwise. Duplicate requests for the same session are
//! rejected while one is in flight or after one has succeeded.

mod model;
mod scheduler;
mod source;

pub use model::{Assessment, AssessmentPath, CategoryScore, CategoryScores};
pub use scheduler::AssessmentScheduler;
pub use source::{source_for, AssessmentSource, ProviderDataSource, StoredTranscriptSource};
