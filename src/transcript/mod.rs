//! Transcript normalization
//!
//! The voice provider streams partial and final utterances for both
//! participants. This module turns that feed into the canonical, ordered
//! list of finalized conversation turns:
//! - At most one partial per role is tracked, newest wins
//! - A final utterance is appended and clears that role's partial
//! - Turns are ordered by arrival of their final event, not by timestamp

mod stream;
mod turn;

pub use stream::{finalized_turns, TranscriptStream};
pub use turn::{Role, TranscriptTurn, Utterance};
