//! Inbound events from the external transport.
//!
//! The runtime needs only three things from an event: which chat it belongs
//! to, the message payload, and enough structural flags to detect membership
//! changes (bot kicked, bot re-added, chat migrated) for abandonment logic.
//! Everything else the transport knows stays outside the core.

use serde::{Deserialize, Serialize};

use crate::chat::{ChatId, ChatKind, SenderProfile};

/// Membership-change facts carried on an event, pre-digested by the
/// transport layer so the core never talks to the remote API directly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipChange {
    /// The bot itself left or was kicked from the chat.
    pub self_removed: bool,
    /// The bot was (re-)added to the chat.
    pub self_added: bool,
    /// A member left and the bot is now the only one remaining.
    pub sole_member_remaining: bool,
    /// The chat migrated away to a new id.
    pub migrated_to: Option<ChatId>,
    /// The chat migrated here from an old id.
    pub migrated_from: Option<ChatId>,
}

impl MembershipChange {
    pub fn is_noop(&self) -> bool {
        *self == MembershipChange::default()
    }
}

/// One inbound event for one chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingEvent {
    pub chat_id: ChatId,
    pub chat_kind: ChatKind,
    pub sender: SenderProfile,
    pub text: String,
    #[serde(default)]
    pub membership: MembershipChange,
}

impl IncomingEvent {
    /// Plain text event with no membership changes.
    pub fn text(chat_id: ChatId, chat_kind: ChatKind, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            chat_kind,
            sender: SenderProfile::default(),
            text: text.into(),
            membership: MembershipChange::default(),
        }
    }

    /// Sentinel used by a state with no `While` action on the actor's very
    /// first iteration, before any real event has been read.
    pub fn placeholder(chat_id: ChatId, chat_kind: ChatKind) -> Self {
        Self::text(chat_id, chat_kind, "")
    }
}
