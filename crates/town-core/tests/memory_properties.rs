//! Property-based tests for the memory stream.
//!
//! - IDs within a kind are strictly increasing and never reused
//! - Retrieval returns at most k hits in non-increasing score order
//! - Retrieval is deterministic for a fixed stream and time
//! - Retrieval only ever moves `latest_access`, and only for hits

use proptest::prelude::*;

use town_core::{MemoryDraft, MemoryStream, RetrievalWeights, ScriptedModel};
use town_events::{AgentId, MemoryKind, SimTime};

const WORDS: &[&str] = &[
    "coffee", "party", "mural", "fire", "thesis", "garden", "market", "rain", "secret", "music",
];

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn arb_description() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(WORDS), 1..5).prop_map(|words| words.join(" "))
}

/// (is_conversation, description, minutes since previous entry)
fn arb_entries() -> impl Strategy<Value = Vec<(bool, String, u64)>> {
    prop::collection::vec((any::<bool>(), arb_description(), 0u64..120), 1..30)
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

fn build_stream(entries: &[(bool, String, u64)]) -> (MemoryStream, SimTime) {
    let model = ScriptedModel::new();
    runtime().block_on(async {
        let mut stream = MemoryStream::new();
        let mut now = SimTime::start();
        for (is_conversation, description, gap) in entries {
            now = now.plus_minutes(*gap);
            let draft = if *is_conversation {
                MemoryDraft::conversation(description.clone(), AgentId::from("klaus"))
            } else {
                MemoryDraft::observation(description.clone())
            };
            stream.append(&model, draft, now).await.unwrap();
        }
        (stream, now)
    })
}

fn embed(text: &str) -> Vec<f32> {
    use town_core::LanguageModel;
    runtime().block_on(ScriptedModel::new().embed(text)).unwrap()
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn ids_strictly_increase_within_kind(entries in arb_entries()) {
        let (stream, _) = build_stream(&entries);

        for kind in MemoryKind::all() {
            let ids: Vec<u64> = stream.of_kind(*kind).map(|m| m.id().0).collect();
            prop_assert!(ids.windows(2).all(|w| w[0] < w[1]));
            if let Some(first) = ids.first() {
                prop_assert_eq!(*first, 1);
            }
            prop_assert_eq!(stream.next_id(*kind).0, ids.len() as u64 + 1);
        }
    }

    #[test]
    fn retrieval_is_bounded_and_sorted(
        entries in arb_entries(),
        query in arb_description(),
        k in 1usize..10,
        later in 0u64..600,
    ) {
        let (mut stream, last) = build_stream(&entries);
        let now = last.plus_minutes(later);

        let hits = stream.retrieve_where(&embed(&query), k, now, &RetrievalWeights::default(), |_| true);

        prop_assert!(hits.len() <= k);
        prop_assert_eq!(hits.len(), k.min(stream.len()));
        prop_assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn retrieval_is_deterministic(
        entries in arb_entries(),
        query in arb_description(),
        k in 1usize..10,
    ) {
        let (stream, now) = build_stream(&entries);
        let query = embed(&query);
        let mut a = stream.clone();
        let mut b = stream;

        let first = a.retrieve_where(&query, k, now, &RetrievalWeights::default(), |_| true);
        let second = b.retrieve_where(&query, k, now, &RetrievalWeights::default(), |_| true);

        prop_assert_eq!(first, second);
    }

    #[test]
    fn retrieval_only_touches_hits(
        entries in arb_entries(),
        query in arb_description(),
        k in 1usize..5,
    ) {
        let (mut stream, last) = build_stream(&entries);
        let before: Vec<_> = stream.iter().cloned().collect();
        let now = last.plus_minutes(60);

        let hits = stream.retrieve_where(&embed(&query), k, now, &RetrievalWeights::default(), |_| true);

        for (old, new) in before.iter().zip(stream.iter()) {
            prop_assert_eq!(old.importance(), new.importance());
            prop_assert_eq!(old.embedding(), new.embedding());
            prop_assert_eq!(old.created_at(), new.created_at());
            let hit = hits.iter().any(|h| h.reference == new.reference());
            if hit {
                prop_assert_eq!(new.latest_access(), now);
            } else {
                prop_assert_eq!(new.latest_access(), old.latest_access());
            }
        }
    }
}
