// ── Reconciled entity caches ──
//
// One cache per entity kind. Push and poll both feed complete snapshots in;
// each cache canonicalizes and runs the equality gate before publishing.

mod current;
mod notifications;
mod roster;

pub use current::{CurrentReadingCache, CurrentReadings};
pub use notifications::NotificationCache;
pub use roster::{RosterCache, canonical_order};

#[cfg(test)]
pub(crate) use notifications::tests as tests_support;
