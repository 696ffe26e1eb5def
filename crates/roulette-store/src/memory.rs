//! In-memory pairing store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rand::seq::IteratorRandom;
use tokio::sync::RwLock;

use roulette_common::{StoreError, UserId};

use crate::store::{PairStore, PairingState};

/// Pairing rows under a single `RwLock` so every row mutation is
/// serialized through one gate and readers never see a torn map.
#[derive(Clone, Default)]
pub struct MemoryStore {
    rows: Arc<RwLock<HashMap<UserId, Option<UserId>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PairStore for MemoryStore {
    async fn upsert(&self, user: UserId, pair: Option<UserId>) -> Result<(), StoreError> {
        self.rows.write().await.insert(user, pair);
        Ok(())
    }

    async fn get_pair(&self, user: UserId) -> Result<Option<UserId>, StoreError> {
        Ok(self.rows.read().await.get(&user).copied().flatten())
    }

    async fn state_of(&self, user: UserId) -> Result<PairingState, StoreError> {
        Ok(match self.rows.read().await.get(&user) {
            None => PairingState::Idle,
            Some(None) => PairingState::Waiting,
            Some(Some(partner)) => PairingState::Paired(*partner),
        })
    }

    async fn delete(&self, user: UserId) -> Result<(), StoreError> {
        self.rows.write().await.remove(&user);
        Ok(())
    }

    async fn find_waiting_excluding(&self, user: UserId) -> Result<Option<UserId>, StoreError> {
        let rows = self.rows.read().await;
        let candidate = rows
            .iter()
            .filter(|(id, pair)| **id != user && pair.is_none())
            .map(|(id, _)| *id)
            .choose(&mut rand::thread_rng());
        Ok(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_then_get_pair() {
        let store = MemoryStore::new();
        store.upsert(UserId::new(1), Some(UserId::new(2))).await.unwrap();
        assert_eq!(
            store.get_pair(UserId::new(1)).await.unwrap(),
            Some(UserId::new(2))
        );
    }

    #[tokio::test]
    async fn get_pair_none_for_missing_and_waiting() {
        let store = MemoryStore::new();
        assert_eq!(store.get_pair(UserId::new(1)).await.unwrap(), None);

        store.upsert(UserId::new(1), None).await.unwrap();
        assert_eq!(store.get_pair(UserId::new(1)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn state_of_distinguishes_idle_from_waiting() {
        let store = MemoryStore::new();
        assert_eq!(
            store.state_of(UserId::new(1)).await.unwrap(),
            PairingState::Idle
        );

        store.upsert(UserId::new(1), None).await.unwrap();
        assert_eq!(
            store.state_of(UserId::new(1)).await.unwrap(),
            PairingState::Waiting
        );

        store.upsert(UserId::new(1), Some(UserId::new(2))).await.unwrap();
        assert_eq!(
            store.state_of(UserId::new(1)).await.unwrap(),
            PairingState::Paired(UserId::new(2))
        );
    }

    #[tokio::test]
    async fn upsert_is_last_write_wins() {
        let store = MemoryStore::new();
        store.upsert(UserId::new(1), Some(UserId::new(2))).await.unwrap();
        store.upsert(UserId::new(1), None).await.unwrap();
        assert_eq!(
            store.state_of(UserId::new(1)).await.unwrap(),
            PairingState::Waiting
        );
    }

    #[tokio::test]
    async fn delete_is_noop_when_absent() {
        let store = MemoryStore::new();
        store.delete(UserId::new(99)).await.unwrap();

        store.upsert(UserId::new(1), None).await.unwrap();
        store.delete(UserId::new(1)).await.unwrap();
        store.delete(UserId::new(1)).await.unwrap();
        assert_eq!(
            store.state_of(UserId::new(1)).await.unwrap(),
            PairingState::Idle
        );
    }

    #[tokio::test]
    async fn find_waiting_never_returns_self() {
        let store = MemoryStore::new();
        store.upsert(UserId::new(1), None).await.unwrap();

        // Only candidate is the requester itself.
        for _ in 0..50 {
            assert_eq!(
                store.find_waiting_excluding(UserId::new(1)).await.unwrap(),
                None
            );
        }
    }

    #[tokio::test]
    async fn find_waiting_skips_paired_users() {
        let store = MemoryStore::new();
        store.upsert(UserId::new(1), Some(UserId::new(2))).await.unwrap();
        store.upsert(UserId::new(2), Some(UserId::new(1))).await.unwrap();
        store.upsert(UserId::new(3), None).await.unwrap();

        for _ in 0..50 {
            assert_eq!(
                store.find_waiting_excluding(UserId::new(4)).await.unwrap(),
                Some(UserId::new(3))
            );
        }
    }

    #[tokio::test]
    async fn find_waiting_covers_all_candidates() {
        let store = MemoryStore::new();
        for id in 1..=5 {
            store.upsert(UserId::new(id), None).await.unwrap();
        }

        // With enough draws every eligible waiter should come up at
        // least once; 200 draws across 4 candidates makes a miss
        // astronomically unlikely.
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            let got = store
                .find_waiting_excluding(UserId::new(5))
                .await
                .unwrap()
                .unwrap();
            assert_ne!(got, UserId::new(5));
            seen.insert(got);
        }
        assert_eq!(seen.len(), 4);
    }

    #[tokio::test]
    async fn find_waiting_none_when_empty() {
        let store = MemoryStore::new();
        assert_eq!(
            store.find_waiting_excluding(UserId::new(1)).await.unwrap(),
            None
        );
    }
}
