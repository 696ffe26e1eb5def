//! Pairing store: the durable mapping from user id to partner id.
//!
//! Two backends share one contract: [`MemoryStore`] keeps everything in
//! a single locked map, [`SnapshotStore`] additionally rewrites a JSON
//! snapshot after every mutation so pairings survive a restart.

pub mod memory;
pub mod snapshot;
pub mod store;

pub use memory::MemoryStore;
pub use snapshot::SnapshotStore;
pub use store::{PairStore, PairingState};
