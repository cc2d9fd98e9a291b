//! Reference data caching
//!
//! [`ReferenceCache`] keeps categories and currencies in memory for the life
//! of the process. [`SnapshotStore`] optionally persists them to disk with an
//! expiry so that the next process can skip the initial fetch.

mod reference;
mod snapshot;

pub use reference::ReferenceCache;
pub use snapshot::{Snapshot, SnapshotStore, DEFAULT_SNAPSHOT_TTL_HOURS};
