use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle phase of an interview session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    /// Collecting candidate details
    Setup,
    /// Waiting for the live channel and its identity
    Starting,
    /// Interview in progress, record persisted
    Active,
    /// Completion call in flight
    Completing,
    Completed,
    Failed,
    Abandoned,
}

impl SessionPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Abandoned)
    }

    /// `Completing -> Active` is the only backward edge: it undoes a
    /// completion attempt whose storage calls all failed.
    pub fn can_transition_to(&self, next: SessionPhase) -> bool {
        use SessionPhase::*;

        matches!(
            (self, next),
            (Setup, Starting)
                | (Starting, Active)
                | (Starting, Failed)
                | (Starting, Abandoned)
                | (Active, Completing)
                | (Active, Failed)
                | (Active, Abandoned)
                | (Completing, Completed)
                | (Completing, Active)
        )
    }
}

/// What asked for the session to be completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionTrigger {
    /// Explicit end-of-interview request
    EndRequested,
    /// The live channel closed on its own
    ChannelClosed,
    /// The owning context went away
    Teardown,
    /// Backstop timer after an end request
    SafetyTimer,
}

impl fmt::Display for CompletionTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompletionTrigger::EndRequested => "end requested",
            CompletionTrigger::ChannelClosed => "channel closed",
            CompletionTrigger::Teardown => "teardown",
            CompletionTrigger::SafetyTimer => "safety timer",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::SessionPhase::*;

    #[test]
    fn test_completed_is_final() {
        for next in [Setup, Starting, Active, Completing, Failed, Abandoned] {
            assert!(!Completed.can_transition_to(next), "Completed -> {:?}", next);
        }
    }

    #[test]
    fn test_forward_path() {
        assert!(Setup.can_transition_to(Starting));
        assert!(Starting.can_transition_to(Active));
        assert!(Active.can_transition_to(Completing));
        assert!(Completing.can_transition_to(Completed));
    }

    #[test]
    fn test_no_skipping_or_going_back() {
        assert!(!Setup.can_transition_to(Active));
        assert!(!Starting.can_transition_to(Completed));
        assert!(!Active.can_transition_to(Starting));
        assert!(!Failed.can_transition_to(Active));
        assert!(!Abandoned.can_transition_to(Starting));
    }

    #[test]
    fn test_failed_completion_may_return_to_active() {
        assert!(Completing.can_transition_to(Active));
        assert!(!Completing.can_transition_to(Failed));
    }
}
