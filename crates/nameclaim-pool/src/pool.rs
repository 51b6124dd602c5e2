//! The candidate pool shared by every peer session of a node.
//!
//! All state lives behind one mutex and every public method is a single
//! critical section, so callers never combine a read and a write across two
//! lock acquisitions.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use nameclaim_core::Message;

use crate::selection::{RandomSelection, SelectionPolicy};

/// Usernames this node may still claim, plus its claim and session timestamp.
pub struct CandidatePool {
    inner: Mutex<PoolInner>,
    policy: Box<dyn SelectionPolicy>,
}

struct PoolInner {
    /// Names not yet excluded by a kick or by our own claim.
    candidates: HashSet<String>,

    /// The name this node holds for the current session.
    claimed: Option<String>,

    /// Logical timestamp of the current session.
    timestamp: i64,
}

/// A consistent copy of the pool state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub claimed: Option<String>,
    pub candidates: HashSet<String>,
    pub timestamp: i64,
}

impl PoolSnapshot {
    /// The greeting a node in this state sends.
    ///
    /// A claimed node advertises only its claim; otherwise every remaining
    /// candidate is offered.
    pub fn to_greeting(&self) -> Message {
        match &self.claimed {
            Some(name) => Message::greeting([name.clone()], self.timestamp),
            None => Message::greeting(self.candidates.iter().cloned(), self.timestamp),
        }
    }
}

impl CandidatePool {
    /// Create an empty pool that claims a random candidate.
    pub fn new() -> Self {
        Self::with_policy(RandomSelection)
    }

    /// Create an empty pool with a specific selection policy.
    pub fn with_policy(policy: impl SelectionPolicy + 'static) -> Self {
        Self {
            inner: Mutex::new(PoolInner {
                candidates: HashSet::new(),
                claimed: None,
                timestamp: 0,
            }),
            policy: Box::new(policy),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a new session: forget the claim, repopulate the candidates and
    /// record the session timestamp.
    pub fn reset<I, S>(&self, usernames: I, timestamp: i64)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut inner = self.lock();
        inner.candidates = usernames.into_iter().map(Into::into).collect();
        inner.claimed = None;
        inner.timestamp = timestamp;

        tracing::trace!(
            candidates = inner.candidates.len(),
            timestamp,
            "candidate pool reset"
        );
    }

    /// Drop `name` from the candidates.
    ///
    /// Returns whether it was present. Removing an absent name is a no-op.
    pub fn remove(&self, name: &str) -> bool {
        self.lock().candidates.remove(name)
    }

    /// Claim one remaining candidate.
    ///
    /// Succeeds only if nothing is claimed yet and at least one candidate
    /// remains. On success the candidates are emptied. On failure nothing
    /// changes.
    pub fn try_claim(&self) -> Option<String> {
        let mut inner = self.lock();
        if inner.claimed.is_some() {
            return None;
        }

        let name = self.policy.select(&inner.candidates)?;
        inner.candidates.clear();
        inner.claimed = Some(name.clone());
        Some(name)
    }

    /// Consistent read of the whole pool.
    pub fn snapshot(&self) -> PoolSnapshot {
        let inner = self.lock();
        PoolSnapshot {
            claimed: inner.claimed.clone(),
            candidates: inner.candidates.clone(),
            timestamp: inner.timestamp,
        }
    }

    /// The greeting to send right now.
    pub fn greeting(&self) -> Message {
        self.snapshot().to_greeting()
    }

    /// Whether this node has priority over a peer offering `ids` at
    /// `remote_timestamp`.
    ///
    /// True when this node is unclaimed, still holds at least one of `ids`
    /// as a candidate, and its own timestamp is strictly lower.
    pub fn outranks<'a, I>(&self, ids: I, remote_timestamp: i64) -> bool
    where
        I: IntoIterator<Item = &'a String>,
    {
        let inner = self.lock();
        if inner.claimed.is_some() || inner.timestamp >= remote_timestamp {
            return false;
        }
        ids.into_iter().any(|id| inner.candidates.contains(id))
    }

    /// The name claimed for the current session, if any.
    pub fn claimed_name(&self) -> Option<String> {
        self.lock().claimed.clone()
    }

    pub fn is_claimed(&self) -> bool {
        self.lock().claimed.is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().candidates.contains(name)
    }

    pub fn timestamp(&self) -> i64 {
        self.lock().timestamp
    }
}

impl Default for CandidatePool {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CandidatePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("CandidatePool")
            .field("candidates", &inner.candidates)
            .field("claimed", &inner.claimed)
            .field("timestamp", &inner.timestamp)
            .finish()
    }
}
