//! Find-or-wait matching.
//!
//! `request_pair` either binds the requester to an already-waiting user
//! or registers the requester as the new waiter. The select-and-bind
//! step is the one critical section of the whole system: two
//! overlapping requesters must never both bind the same candidate.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use roulette_common::{MatchError, UserId};
use roulette_store::{PairStore, PairingState};

/// Bind attempts before a persistent conflict is surfaced.
const MAX_BIND_ATTEMPTS: u32 = 3;

pub struct Matcher {
    store: Arc<dyn PairStore>,
    /// Serializes all `request_pair` calls. The store contract has no
    /// transactions, so select-and-bind is made atomic here instead.
    bind_gate: Mutex<()>,
}

impl Matcher {
    pub fn new(store: Arc<dyn PairStore>) -> Self {
        Self {
            store,
            bind_gate: Mutex::new(()),
        }
    }

    /// Find a partner for `user`, or register `user` as waiting.
    ///
    /// If `user` already has a partner the existing binding is returned
    /// untouched; whether that counts as a re-entrant request is the
    /// caller's policy, not ours.
    pub async fn request_pair(&self, user: UserId) -> Result<Option<UserId>, MatchError> {
        let _gate = self.bind_gate.lock().await;

        // Read under the gate: outside it, another caller could select
        // this requester as its own candidate and bind it after the
        // check, and the bind below would then clobber that pair.
        if let Some(existing) = self.store.get_pair(user).await? {
            debug!(user = %user, partner = %existing, "Already paired, reporting as-is");
            return Ok(Some(existing));
        }

        for attempt in 1..=MAX_BIND_ATTEMPTS {
            let Some(candidate) = self.store.find_waiting_excluding(user).await? else {
                // Nobody to bind to: become the waiter.
                self.store.upsert(user, None).await?;
                info!(user = %user, "No candidates, registered as waiting");
                return Ok(None);
            };

            // stop/next flows don't take the gate, so the candidate can
            // lose its row (or gain a partner) between selection and
            // here. Re-check before binding.
            if self.store.state_of(candidate).await? != PairingState::Waiting {
                warn!(user = %user, candidate = %candidate, attempt, "Candidate no longer waiting");
                continue;
            }

            self.store.upsert(user, Some(candidate)).await?;
            self.store.upsert(candidate, Some(user)).await?;

            // Read back both sides; a concurrent writer that slipped in
            // shows up as broken symmetry.
            if self.store.get_pair(user).await? == Some(candidate)
                && self.store.get_pair(candidate).await? == Some(user)
            {
                info!(user = %user, partner = %candidate, "Pair bound");
                return Ok(Some(candidate));
            }

            warn!(user = %user, candidate = %candidate, attempt, "Bind conflict, retrying");
            // Undo the half-bind so the retry starts clean. The
            // candidate's row is only touched if it still points at us.
            self.store.upsert(user, None).await?;
            if self.store.get_pair(candidate).await? == Some(user) {
                self.store.upsert(candidate, None).await?;
            }
        }

        Err(MatchError::Conflict {
            attempts: MAX_BIND_ATTEMPTS,
        })
    }
}
