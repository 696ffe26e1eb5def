//! The `PairStore` contract shared by all backends.

use async_trait::async_trait;

use roulette_common::{StoreError, UserId};

/// Domain-level view of a user's pairing state.
///
/// The storage row is `user_id -> Option<partner>`; `Waiting` is a row
/// with no partner, `Idle` is no row at all. Backends translate between
/// the two representations; everything above the store speaks in this
/// enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingState {
    /// No record: the user never searched, or was fully removed.
    Idle,
    /// Record exists with no partner; eligible for matching.
    Waiting,
    /// Bound to exactly one partner.
    Paired(UserId),
}

impl PairingState {
    pub fn partner(&self) -> Option<UserId> {
        match self {
            PairingState::Paired(p) => Some(*p),
            _ => None,
        }
    }
}

/// Mapping from user id to partner id (or waiting).
///
/// All operations must be safe under concurrent invocation from
/// independent request flows; conflicting writes to the same row are
/// serialized by the backend.
#[async_trait]
pub trait PairStore: Send + Sync {
    /// Create or replace the record for `user`. Idempotent; last write
    /// wins.
    async fn upsert(&self, user: UserId, pair: Option<UserId>) -> Result<(), StoreError>;

    /// Current partner of `user`; `None` covers both "no record" and
    /// "waiting".
    async fn get_pair(&self, user: UserId) -> Result<Option<UserId>, StoreError>;

    /// Three-state read distinguishing "no record" from "waiting".
    async fn state_of(&self, user: UserId) -> Result<PairingState, StoreError>;

    /// Remove the record entirely. No-op if absent.
    async fn delete(&self, user: UserId) -> Result<(), StoreError>;

    /// One user with a record and no partner, chosen uniformly at
    /// random among all eligible candidates. Never returns `user`
    /// itself; `None` if nobody is waiting.
    async fn find_waiting_excluding(&self, user: UserId) -> Result<Option<UserId>, StoreError>;
}
