//! Outbound delivery items handed from the session controller to the
//! transport adapter.
//!
//! The controller decides *who* gets *what kind* of notice; the literal
//! user-facing wording is owned by the transport layer.

use serde::{Deserialize, Serialize};

use crate::id::UserId;

/// Kind of notification produced by a lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Notice {
    /// No waiting candidate; the requester is now waiting.
    Searching,
    /// A partner was bound; sent to both sides.
    PartnerFound,
    /// Requester asked to find while already in a conversation.
    AlreadyPaired,
    /// Requester asked for `next`/`say` without a partner or record.
    UseFind,
    /// Sent to the requester of `next` when the old pair is torn down.
    DialogInterrupted,
    /// Sent to the ex-partner when the other side moved on or left.
    PartnerLeft,
    /// `stop` while waiting: the search was cancelled.
    SearchStopped,
    /// `stop` while paired: the conversation was ended.
    DialogEnded,
    /// Non-command content sent with no partner bound yet.
    NoPartner,
    /// A store failure aborted the transition; the user may retry.
    TryAgain,
}

/// What gets delivered to a recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    Notice { notice: Notice },
    /// Relayed conversation content, forwarded verbatim.
    Relay { content: String },
}

/// One outbound item: a recipient plus the payload to deliver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outbound {
    pub to: UserId,
    pub payload: Payload,
}

impl Outbound {
    pub fn notice(to: UserId, notice: Notice) -> Self {
        Self {
            to,
            payload: Payload::Notice { notice },
        }
    }

    pub fn relay(to: UserId, content: impl Into<String>) -> Self {
        Self {
            to,
            payload: Payload::Relay {
                content: content.into(),
            },
        }
    }
}
