//! Wire protocol between chat clients and the relay.
//!
//! The first frame must be a `hello` identifying the user; every later
//! frame is either a command or conversation content. The engine only
//! decides notice *kinds*; the literal wording lives here, in the
//! transport.

use serde::{Deserialize, Serialize};

use roulette_common::{Notice, Outbound, Payload, UserId};

/// Frames a client sends to the relay.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// First frame on every connection.
    Hello { user_id: i64 },
    /// Search for a partner.
    Find,
    /// Leave the current conversation and search again.
    Next,
    /// Stop searching or end the conversation.
    Stop,
    /// Conversation content for the current partner.
    Say { content: String },
    /// Ask for usage instructions.
    Help,
}

/// Frames the relay sends to clients.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Handshake accepted.
    Welcome { user_id: i64, text: String },
    /// Lifecycle notice; `notice` is the machine-readable kind, `text`
    /// the human wording.
    Notice { notice: Notice, text: String },
    /// Relayed content from the partner, verbatim.
    Message { content: String },
    /// Usage instructions.
    Help { text: String },
    Error { message: String },
}

pub const USAGE: &str = "Commands: find - search for a partner, \
next - switch to a new partner, stop - end the conversation or search. \
Anything sent with \"say\" goes to your current partner.";

pub fn welcome(user: UserId) -> ServerFrame {
    ServerFrame::Welcome {
        user_id: user.as_i64(),
        text: format!(
            "Hi! This is an anonymous chat where you can find a random \
             conversation partner. {USAGE}"
        ),
    }
}

pub fn help() -> ServerFrame {
    ServerFrame::Help {
        text: USAGE.to_string(),
    }
}

/// Human wording for each notice kind.
fn notice_text(notice: Notice) -> &'static str {
    match notice {
        Notice::Searching => "Looking for a partner...",
        Notice::PartnerFound => {
            "Partner found! You can message them now. \
             Send next to switch partners, stop to end the conversation."
        }
        Notice::AlreadyPaired => {
            "You are already in a conversation. Send next to search for another partner."
        }
        Notice::UseFind => "Send find to search for a partner.",
        Notice::DialogInterrupted => "Conversation over. Looking for the next partner...",
        Notice::PartnerLeft => "Your partner left the conversation.",
        Notice::SearchStopped => "Search stopped.",
        Notice::DialogEnded => "Conversation ended.",
        Notice::NoPartner => "No partner has been found for you yet.",
        Notice::TryAgain => "Something went wrong, please try again.",
    }
}

/// Translate one engine outbound item into the frame its recipient gets.
pub fn frame_for(item: &Outbound) -> ServerFrame {
    match &item.payload {
        Payload::Notice { notice } => ServerFrame::Notice {
            notice: *notice,
            text: notice_text(*notice).to_string(),
        },
        Payload::Relay { content } => ServerFrame::Message {
            content: content.clone(),
        },
    }
}
