use super::turn::{Role, TranscriptTurn, Utterance};
use futures::future;
use futures::stream::{Stream, StreamExt};
use std::collections::HashMap;
use tracing::debug;

/// Normalizes a raw utterance feed into finalized turns
///
/// Only final turns become part of the durable sequence. Partials live in a
/// one-slot-per-role buffer for live display and are never persisted.
#[derive(Debug, Default)]
pub struct TranscriptStream {
    /// Latest in-progress utterance per role
    partials: HashMap<Role, TranscriptTurn>,

    /// Finalized turns, in the order their final events arrived
    turns: Vec<TranscriptTurn>,
}

impl TranscriptStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one provider event
    ///
    /// Returns the newly finalized turn, if this event finalized one.
    pub fn ingest(&mut self, utterance: Utterance) -> Option<TranscriptTurn> {
        let role = utterance.role;

        if !utterance.is_final {
            let turn = TranscriptTurn::from_utterance(uuid::Uuid::new_v4().to_string(), utterance);
            self.partials.insert(role, turn);
            return None;
        }

        self.partials.remove(&role);

        if utterance.text.trim().is_empty() {
            debug!("Dropping blank final utterance from {}", role);
            return None;
        }

        let turn = TranscriptTurn::from_utterance(uuid::Uuid::new_v4().to_string(), utterance);
        self.turns.push(turn.clone());

        Some(turn)
    }

    /// In-progress utterance for a role, if any
    pub fn partial(&self, role: Role) -> Option<&TranscriptTurn> {
        self.partials.get(&role)
    }

    /// Finalized turns so far
    pub fn turns(&self) -> &[TranscriptTurn] {
        &self.turns
    }

    /// Discard partials. Called when the channel goes away, since an
    /// unfinished utterance will never be finalized.
    pub fn clear_partials(&mut self) {
        self.partials.clear();
    }
}

/// Lazily adapt an utterance stream into a stream of finalized turns
pub fn finalized_turns<S>(utterances: S) -> impl Stream<Item = TranscriptTurn>
where
    S: Stream<Item = Utterance>,
{
    utterances
        .scan(TranscriptStream::new(), |stream, utterance| {
            future::ready(Some(stream.ingest(utterance)))
        })
        .filter_map(future::ready)
}
