//! Chat identity and the persisted session record.
//!
//! A `ChatRecord` is one row of runtime truth about a conversation: who it
//! is with, whether the bot can still reach it, and where its state machine
//! currently stands. The record is owned by the chat's session actor while
//! running; the storage layer owns the persisted copy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::event::IncomingEvent;
use crate::state::{Params, State};

/// Opaque stable identity of one chat counterparty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ChatId {
    fn from(id: i64) -> Self {
        ChatId(id)
    }
}

/// One-to-one versus multi-party chat.
///
/// The kind selects which state machine table drives the chat's actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    Private,
    Group,
}

impl fmt::Display for ChatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatKind::Private => write!(f, "private"),
            ChatKind::Group => write!(f, "group"),
        }
    }
}

impl std::str::FromStr for ChatKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "private" => Ok(ChatKind::Private),
            "group" => Ok(ChatKind::Group),
            other => Err(format!("invalid chat kind: '{other}'")),
        }
    }
}

/// Profile of the human on the other end, as last observed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderProfile {
    pub user_id: i64,
    pub user_name: String,
    pub first_name: String,
    pub last_name: String,
}

/// Persisted record of one chat session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRecord {
    /// Storage primary key; `None` until first inserted.
    pub primary_id: Option<i64>,
    pub chat_id: ChatId,
    pub kind: ChatKind,
    /// Set when the bot has lost the ability to reach this chat.
    pub abandoned: bool,
    pub profile: SenderProfile,
    pub open_time: DateTime<Utc>,
    pub last_time: DateTime<Utc>,
    pub state: State,
    pub params: Params,
}

impl ChatRecord {
    /// Build a first-contact record from an inbound event.
    ///
    /// Used by the inbound dispatcher when an event arrives for an unseen
    /// `ChatId`. Both timestamps start at now; the state machine starts at
    /// `initial`.
    pub fn from_event(event: &IncomingEvent, initial: State) -> Self {
        let now = Utc::now();
        Self {
            primary_id: None,
            chat_id: event.chat_id,
            kind: event.chat_kind,
            abandoned: false,
            profile: event.sender.clone(),
            open_time: now,
            last_time: now,
            state: initial,
            params: Params::new(),
        }
    }

    /// Refresh the mutable profile and activity fields from an event.
    pub fn touch(&mut self, event: &IncomingEvent) {
        self.profile = event.sender.clone();
        self.last_time = Utc::now();
    }
}
