//! Registry of connected users' outbound channels.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};

use roulette_common::UserId;

/// Maps connected users to the sender half of their delivery channel.
#[derive(Clone, Default)]
pub struct UserRegistry {
    connected: Arc<RwLock<HashMap<UserId, mpsc::Sender<String>>>>,
}

impl UserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user's sender. Fails if the user already has a live
    /// connection.
    pub async fn register(
        &self,
        user: UserId,
        tx: mpsc::Sender<String>,
    ) -> Result<(), &'static str> {
        let mut map = self.connected.write().await;
        if map.contains_key(&user) {
            return Err("user already connected");
        }
        map.insert(user, tx);
        Ok(())
    }

    /// Drop a user's sender. Only removes the entry if `tx` is still the
    /// registered one, so a reconnect racing a stale cleanup is safe.
    pub async fn unregister(&self, user: UserId, tx: &mpsc::Sender<String>) {
        let mut map = self.connected.write().await;
        if let Some(current) = map.get(&user) {
            if current.same_channel(tx) {
                map.remove(&user);
            }
        }
    }

    /// Sender for a connected user, if any.
    pub async fn sender(&self, user: UserId) -> Option<mpsc::Sender<String>> {
        self.connected.read().await.get(&user).cloned()
    }

    /// Number of live connections.
    pub async fn count(&self) -> usize {
        self.connected.read().await.len()
    }
}
