// Integration tests for transcript normalization
//
// The durable transcript must contain exactly the final utterances, in the
// order their final events arrived, with partials never leaking through.

mod helpers;

use futures::stream::{self, StreamExt};
use helpers::utterance;
use voice_screening::transcript::finalized_turns;
use voice_screening::{Role, TranscriptStream, Utterance};

fn texts(turns: &[voice_screening::TranscriptTurn]) -> Vec<(Role, String)> {
    turns.iter().map(|t| (t.role, t.text.clone())).collect()
}

#[tokio::test]
async fn test_partial_then_final_scenario() {
    let events = vec![
        utterance(Role::Candidate, "Hi", false),
        utterance(Role::Candidate, "Hi there", true),
        utterance(Role::Interviewer, "Tell me about yourself", true),
    ];

    let turns: Vec<_> = finalized_turns(stream::iter(events)).collect().await;

    assert_eq!(
        texts(&turns),
        vec![
            (Role::Candidate, "Hi there".to_string()),
            (Role::Interviewer, "Tell me about yourself".to_string()),
        ]
    );
    assert!(turns.iter().all(|t| t.is_final));
}

#[test]
fn test_durable_sequence_is_exactly_the_finals_in_arrival_order() {
    // Deterministic pseudo-random feed: interleaved roles, runs of partials,
    // finals sprinkled in between
    let mut seed: u64 = 0x5eed;
    let mut next = move || {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (seed >> 33) as u32
    };

    let mut events: Vec<Utterance> = Vec::new();
    for i in 0..500 {
        let role = if next() % 2 == 0 {
            Role::Candidate
        } else {
            Role::Interviewer
        };
        let is_final = next() % 4 == 0;
        events.push(utterance(role, &format!("utterance {}", i), is_final));
    }

    let expected: Vec<(Role, String)> = events
        .iter()
        .filter(|u| u.is_final)
        .map(|u| (u.role, u.text.clone()))
        .collect();

    let mut transcript = TranscriptStream::new();
    let mut emitted = Vec::new();
    for event in events {
        if let Some(turn) = transcript.ingest(event) {
            emitted.push(turn);
        }
    }

    assert_eq!(texts(&emitted), expected);
    assert_eq!(texts(transcript.turns()), expected);

    let mut ids: Vec<_> = emitted.iter().map(|t| t.id.clone()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), emitted.len(), "turn ids must be unique");
}

#[test]
fn test_out_of_order_finals_follow_arrival() {
    let mut transcript = TranscriptStream::new();

    let mut later = utterance(Role::Interviewer, "second", true);
    later.timestamp = helpers::t0() + chrono::Duration::seconds(10);
    let mut earlier = utterance(Role::Candidate, "first", true);
    earlier.timestamp = helpers::t0();

    transcript.ingest(later);
    transcript.ingest(earlier);

    let order: Vec<_> = transcript.turns().iter().map(|t| t.text.as_str()).collect();
    assert_eq!(order, vec!["second", "first"]);
}

#[test]
fn test_clear_partials_on_channel_close() {
    let mut transcript = TranscriptStream::new();

    transcript.ingest(utterance(Role::Candidate, "I was going to", false));
    transcript.ingest(utterance(Role::Interviewer, "Thank", false));
    transcript.clear_partials();

    assert!(transcript.partial(Role::Candidate).is_none());
    assert!(transcript.partial(Role::Interviewer).is_none());
    assert!(transcript.turns().is_empty());
}
