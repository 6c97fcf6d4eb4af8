//! Interview session lifecycle
//!
//! `SessionController` is the state machine for one interview:
//! - `Setup -> Starting` once candidate details validate
//! - `Starting -> Active` exactly once, when the channel is connected and
//!   the provider identity is known (in either order)
//! - `Active -> Completing -> Completed` from any of the end triggers, idempotently
//! - `Failed`/`Abandoned` when a session never gets going

mod candidate;
mod controller;
mod guard;
mod phase;
mod snapshot;

pub use candidate::{CandidateProfile, TradeCategory};
pub use controller::SessionController;
pub use guard::SessionGuard;
pub use phase::{CompletionTrigger, SessionPhase};
pub use snapshot::{format_duration, SessionSnapshot};
