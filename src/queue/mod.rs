//! # Queue Selector
//!
//! Picks the next unclaimed pending record for a reviewer. Selection is
//! advisory: the caller must `acquire` right after, and on a lost race
//! ask again with the lost record excluded.

mod selector;

pub use selector::QueueSelector;
