//! The signal union flowing through each chat's bus, and outbound payloads.
//!
//! `Signal` is a closed tagged union: every consumer matches exhaustively,
//! so adding a variant is a compile-time event, not a runtime surprise.

use serde::{Deserialize, Serialize};

use crate::chat::ChatId;
use crate::event::IncomingEvent;
use crate::state::State;

/// Reply keyboard attached to an outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplyMarkup {
    /// Rows of button labels.
    Keyboard(Vec<Vec<String>>),
    /// Hide any previously shown keyboard.
    RemoveKeyboard,
}

/// Text formatting the transport should apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseMode {
    Markdown,
}

/// A payload to deliver to a chat's transport.
///
/// Plain text by default; `photo` turns it into a photo message with `text`
/// as the caption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Target chat. `None` until the routing layer stamps it with the
    /// destination (actions build messages without knowing their target).
    pub chat_id: Option<ChatId>,
    pub text: String,
    #[serde(default)]
    pub parse_mode: Option<ParseMode>,
    /// Transport file id of an already-uploaded photo.
    #[serde(default)]
    pub photo: Option<String>,
    pub markup: Option<ReplyMarkup>,
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            chat_id: None,
            text: text.into(),
            parse_mode: None,
            photo: None,
            markup: None,
        }
    }

    /// Text message rendered as Markdown.
    pub fn markdown(text: impl Into<String>) -> Self {
        Self {
            parse_mode: Some(ParseMode::Markdown),
            ..Self::text(text)
        }
    }

    /// Photo message by transport file id, with an optional caption.
    pub fn photo(file_id: impl Into<String>, caption: impl Into<String>) -> Self {
        Self {
            photo: Some(file_id.into()),
            ..Self::text(caption)
        }
    }

    #[must_use]
    pub fn with_keyboard(mut self, rows: Vec<Vec<String>>) -> Self {
        self.markup = Some(ReplyMarkup::Keyboard(rows));
        self
    }

    #[must_use]
    pub fn with_markup(mut self, markup: ReplyMarkup) -> Self {
        self.markup = Some(markup);
        self
    }

    /// Copy with the target chat stamped in.
    #[must_use]
    pub fn addressed_to(&self, chat_id: ChatId) -> Self {
        Self {
            chat_id: Some(chat_id),
            ..self.clone()
        }
    }
}

/// The three kinds of value a session actor can pull from its bus.
#[derive(Debug, Clone)]
pub enum Signal {
    /// An external event for this chat.
    Incoming(IncomingEvent),
    /// Force the actor into the carried state, bypassing `After`.
    Interrupt(State),
    /// A payload to push out through the transport.
    Outbound(OutboundMessage),
}

impl Signal {
    /// Short tag for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Signal::Incoming(_) => "incoming",
            Signal::Interrupt(_) => "interrupt",
            Signal::Outbound(_) => "outbound",
        }
    }
}
