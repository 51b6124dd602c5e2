//! # nameclaim pool
//!
//! The state a node negotiates over: the usernames it may still claim, the
//! one it has claimed, and the logical timestamp ranking it against peers.
//!
//! ## Key Types
//!
//! - [`CandidatePool`] - mutex-protected pool with atomic operations
//! - [`PoolSnapshot`] - consistent copy used to build greetings
//! - [`SelectionPolicy`] - which remaining candidate a claim picks
//! - [`LogicalClock`] - where session timestamps come from
//!
//! ## Design Notes
//!
//! - **Atomic operations**: `reset`, `remove`, `try_claim`, `snapshot` and
//!   `outranks` each take the lock exactly once
//! - **Idempotent removal**: removing an absent name is a no-op
//! - **Terminal claim**: once claimed, `try_claim` returns `None` until the
//!   next `reset`

pub mod clock;
pub mod pool;
pub mod selection;

pub use clock::{FixedClock, LogicalClock, SystemClock};
pub use pool::{CandidatePool, PoolSnapshot};
pub use selection::{LexicographicSelection, RandomSelection, SelectionPolicy};
