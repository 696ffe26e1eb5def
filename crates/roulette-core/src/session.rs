//! Per-user session lifecycle.
//!
//! Each user moves through Idle -> Waiting -> Paired and back. Every
//! transition returns the outbound items the transport must deliver;
//! the controller itself never talks to the network.

use std::sync::Arc;

use tracing::{error, info};

use roulette_common::{Notice, Outbound, UserId};
use roulette_store::{PairStore, PairingState};

use crate::matcher::Matcher;

/// Orchestrates find / next / stop / relay over the store and matcher.
pub struct SessionController {
    store: Arc<dyn PairStore>,
    matcher: Matcher,
}

impl SessionController {
    pub fn new(store: Arc<dyn PairStore>) -> Self {
        Self {
            matcher: Matcher::new(store.clone()),
            store,
        }
    }

    /// Start searching for a partner.
    pub async fn on_find(&self, user: UserId) -> Vec<Outbound> {
        match self.store.state_of(user).await {
            Ok(PairingState::Paired(_)) => {
                vec![Outbound::notice(user, Notice::AlreadyPaired)]
            }
            Ok(_) => self.run_find(user).await,
            Err(e) => {
                error!(user = %user, error = %e, "find: store read failed");
                vec![Outbound::notice(user, Notice::TryAgain)]
            }
        }
    }

    /// Leave the current conversation and immediately search again.
    /// The ex-partner is left as an ordinary waiter.
    pub async fn on_next(&self, user: UserId) -> Vec<Outbound> {
        let partner = match self.store.get_pair(user).await {
            Ok(Some(p)) => p,
            Ok(None) => return vec![Outbound::notice(user, Notice::UseFind)],
            Err(e) => {
                error!(user = %user, error = %e, "next: store read failed");
                return vec![Outbound::notice(user, Notice::TryAgain)];
            }
        };

        // Teardown: both sides cleared to waiting. Not one transaction
        // with the re-search below; a failure in between leaves both
        // users merely waiting, which self-heals on their next find.
        if let Err(e) = self.teardown(user, partner).await {
            error!(user = %user, partner = %partner, error = %e, "next: teardown failed");
            return vec![Outbound::notice(user, Notice::TryAgain)];
        }
        info!(user = %user, partner = %partner, "Pair torn down");

        let mut out = vec![
            Outbound::notice(user, Notice::DialogInterrupted),
            Outbound::notice(partner, Notice::PartnerLeft),
        ];
        out.extend(self.run_find(user).await);
        out
    }

    /// Stop searching, or end the current conversation.
    pub async fn on_stop(&self, user: UserId) -> Vec<Outbound> {
        let state = match self.store.state_of(user).await {
            Ok(s) => s,
            Err(e) => {
                error!(user = %user, error = %e, "stop: store read failed");
                return vec![Outbound::notice(user, Notice::TryAgain)];
            }
        };

        if let Err(e) = self.store.delete(user).await {
            error!(user = %user, error = %e, "stop: delete failed");
            return vec![Outbound::notice(user, Notice::TryAgain)];
        }

        match state {
            PairingState::Paired(partner) => {
                // Un-pair the partner, don't remove them.
                if let Err(e) = self.store.upsert(partner, None).await {
                    error!(partner = %partner, error = %e, "stop: partner clear failed");
                    return vec![Outbound::notice(user, Notice::TryAgain)];
                }
                info!(user = %user, partner = %partner, "Conversation ended by stop");
                vec![
                    Outbound::notice(user, Notice::DialogEnded),
                    Outbound::notice(partner, Notice::PartnerLeft),
                ]
            }
            // Waiting or already idle: nothing else to clean up, and
            // no partner to notify.
            _ => {
                info!(user = %user, "Search stopped");
                vec![Outbound::notice(user, Notice::SearchStopped)]
            }
        }
    }

    /// Relay conversation content to the current partner, verbatim.
    /// Never mutates pairing state.
    pub async fn on_message(&self, user: UserId, content: &str) -> Vec<Outbound> {
        match self.store.get_pair(user).await {
            Ok(Some(partner)) => vec![Outbound::relay(partner, content)],
            Ok(None) => vec![Outbound::notice(user, Notice::NoPartner)],
            Err(e) => {
                error!(user = %user, error = %e, "relay: store read failed");
                vec![Outbound::notice(user, Notice::TryAgain)]
            }
        }
    }

    /// The shared find flow: match or register as waiting.
    async fn run_find(&self, user: UserId) -> Vec<Outbound> {
        match self.matcher.request_pair(user).await {
            Ok(Some(partner)) => vec![
                Outbound::notice(user, Notice::PartnerFound),
                Outbound::notice(partner, Notice::PartnerFound),
            ],
            Ok(None) => vec![Outbound::notice(user, Notice::Searching)],
            Err(e) => {
                error!(user = %user, error = %e, "find: matching failed");
                vec![Outbound::notice(user, Notice::TryAgain)]
            }
        }
    }

    async fn teardown(&self, user: UserId, partner: UserId) -> Result<(), roulette_common::StoreError> {
        self.store.upsert(user, None).await?;
        self.store.upsert(partner, None).await?;
        Ok(())
    }
}
