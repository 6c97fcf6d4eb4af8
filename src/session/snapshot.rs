use super::phase::{CompletionTrigger, SessionPhase};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Read-only view of a session's lifecycle state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,

    /// Internal id, assigned when the record is created
    pub session_id: Option<String>,

    pub candidate_id: Option<String>,

    /// Provider session reference
    pub session_ref: Option<String>,

    /// Provider call reference, if one was issued
    pub call_ref: Option<String>,

    /// When the live channel was confirmed open
    pub started_at: Option<DateTime<Utc>>,

    /// When the `Active` transition fired
    pub activated_at: Option<DateTime<Utc>>,

    /// Set once, at the first successful completion
    pub ended_at: Option<DateTime<Utc>>,

    /// `ended_at - started_at`, set together with `ended_at`
    pub duration_ms: Option<u64>,

    /// Finalized turns observed for this session
    pub turn_count: usize,

    /// Turns whose append failed after its retry
    pub failed_appends: usize,

    pub completed_by: Option<CompletionTrigger>,

    /// Most recent operational error
    pub last_error: Option<String>,
}

impl SessionSnapshot {
    pub(crate) fn new() -> Self {
        Self {
            phase: SessionPhase::Setup,
            session_id: None,
            candidate_id: None,
            session_ref: None,
            call_ref: None,
            started_at: None,
            activated_at: None,
            ended_at: None,
            duration_ms: None,
            turn_count: 0,
            failed_appends: 0,
            completed_by: None,
            last_error: None,
        }
    }

    pub fn has_call_reference(&self) -> bool {
        self.call_ref.is_some()
    }

    /// Running duration for a live timer; the fixed duration once ended
    pub fn elapsed_ms(&self, now: DateTime<Utc>) -> u64 {
        if let Some(duration) = self.duration_ms {
            return duration;
        }

        self.started_at
            .map(|started| millis_between(started, now))
            .unwrap_or(0)
    }
}

pub(crate) fn millis_between(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    u64::try_from(to.signed_duration_since(from).num_milliseconds()).unwrap_or(0)
}

/// Render milliseconds as `m:ss`
pub fn format_duration(ms: u64) -> String {
    let minutes = ms / 60_000;
    let seconds = (ms % 60_000) / 1000;
    format!("{}:{:02}", minutes, seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(65_000), "1:05");
        assert_eq!(format_duration(600_999), "10:00");
    }

    #[test]
    fn test_elapsed_never_negative() {
        let now = Utc::now();
        let mut snapshot = SessionSnapshot::new();
        snapshot.started_at = Some(now + Duration::seconds(5));

        assert_eq!(snapshot.elapsed_ms(now), 0);
    }

    #[test]
    fn test_elapsed_freezes_at_duration() {
        let now = Utc::now();
        let mut snapshot = SessionSnapshot::new();
        snapshot.started_at = Some(now - Duration::seconds(90));
        assert_eq!(snapshot.elapsed_ms(now), 90_000);

        snapshot.duration_ms = Some(42_000);
        assert_eq!(snapshot.elapsed_ms(now), 42_000);
    }
}
