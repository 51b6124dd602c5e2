//! Proptest generators for property-based testing.

use std::collections::BTreeSet;

use proptest::prelude::*;
use serde_json::{json, Value};

use nameclaim_core::{kinds, Message};
use nameclaim_pool::{CandidatePool, LexicographicSelection};

/// Generate a username.
pub fn username() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_.-]{0,15}".prop_map(String::from)
}

/// Generate a set of distinct usernames.
pub fn usernames(max: usize) -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set(username(), 0..=max)
}

/// Generate a reasonable timestamp.
pub fn timestamp() -> impl Strategy<Value = i64> {
    0i64..=i64::MAX / 2
}

/// Generate a greeting.
pub fn greeting() -> impl Strategy<Value = Message> {
    (usernames(8), any::<i64>()).prop_map(|(ids, ts)| Message::greeting(ids, ts))
}

/// Generate any protocol message.
pub fn message() -> impl Strategy<Value = Message> {
    prop_oneof![
        greeting(),
        username().prop_map(Message::kick),
        Just(Message::Backoff),
    ]
}

/// Generate a document whose `type` is not a protocol message.
pub fn unknown_document() -> impl Strategy<Value = Value> {
    "[a-z]{1,10}"
        .prop_filter("must not be a known type", |kind| {
            kind != kinds::GREETING && kind != kinds::KICK && kind != kinds::BACKOFF
        })
        .prop_map(|kind| json!({ "type": kind, "extra": [1, 2, 3] }))
}

/// Two unclaimed nodes contending over a candidate list.
#[derive(Debug, Clone)]
pub struct ContentionParams {
    pub usernames: BTreeSet<String>,
    /// Names the newer node still offers.
    pub offered: BTreeSet<String>,
    pub older_timestamp: i64,
    pub newer_timestamp: i64,
}

impl ContentionParams {
    /// Build both pools, older first.
    pub fn pools(&self) -> (CandidatePool, CandidatePool) {
        let older = CandidatePool::with_policy(LexicographicSelection);
        older.reset(self.usernames.iter().cloned(), self.older_timestamp);

        let newer = CandidatePool::with_policy(LexicographicSelection);
        newer.reset(self.usernames.iter().cloned(), self.newer_timestamp);

        (older, newer)
    }

    /// Ids of a greeting from the newer node.
    pub fn shared_greeting_ids(&self) -> BTreeSet<String> {
        self.offered.clone()
    }
}

impl Arbitrary for ContentionParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            prop::collection::btree_set(username(), 1..=8),
            timestamp(),
            1i64..=1_000_000_000,
            any::<prop::sample::Index>(),
        )
            .prop_map(|(usernames, older, gap, pick)| {
                let names: Vec<&String> = usernames.iter().collect();
                let offered = BTreeSet::from([names[pick.index(names.len())].clone()]);
                ContentionParams {
                    usernames,
                    offered,
                    older_timestamp: older,
                    newer_timestamp: older + gap,
                }
            })
            .boxed()
    }
}
