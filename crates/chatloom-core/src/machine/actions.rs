//! Canonical constructors for the common action shapes.
//!
//! Bot authors can write raw closures, but almost every state is built from
//! the same few pieces: a prompt on entry, a plain blocking receive, and a
//! text-routed transition. These helpers build those pieces.

use std::collections::HashMap;
use std::sync::Arc;

use chatloom_types::signal::{OutboundMessage, ReplyMarkup};
use chatloom_types::state::State;
use futures_util::FutureExt;
use tracing::warn;

use crate::machine::table::{AfterFn, BeforeFn, Transition, WhileFn};

/// Default `While`: one blocking receive from the chat's bus.
pub fn receive() -> WhileFn {
    Arc::new(|rx| rx.recv().boxed())
}

/// `Before` that sends a text prompt to the chat.
pub fn prompt(text: impl Into<String>) -> BeforeFn {
    let message = OutboundMessage::text(text);
    Arc::new(move |outbox, chat| outbox.send_to(chat.chat_id, message.clone()))
}

/// `Before` that sends a text prompt with a reply keyboard.
pub fn prompt_with_keyboard(text: impl Into<String>, rows: Vec<Vec<String>>) -> BeforeFn {
    let message = OutboundMessage::text(text).with_keyboard(rows);
    Arc::new(move |outbox, chat| outbox.send_to(chat.chat_id, message.clone()))
}

/// `Before` that sends a text prompt and hides any shown keyboard.
pub fn prompt_plain(text: impl Into<String>) -> BeforeFn {
    let message = OutboundMessage::text(text).with_markup(ReplyMarkup::RemoveKeyboard);
    Arc::new(move |outbox, chat| outbox.send_to(chat.chat_id, message.clone()))
}

/// `Before` that sends a Markdown-formatted prompt.
pub fn prompt_markdown(text: impl Into<String>) -> BeforeFn {
    let message = OutboundMessage::markdown(text);
    Arc::new(move |outbox, chat| outbox.send_to(chat.chat_id, message.clone()))
}

/// `Before` that sends a photo by transport file id, with a caption.
pub fn prompt_photo(file_id: impl Into<String>, caption: impl Into<String>) -> BeforeFn {
    let message = OutboundMessage::photo(file_id, caption);
    Arc::new(move |outbox, chat| outbox.send_to(chat.chat_id, message.clone()))
}

/// `After` that unconditionally moves to `next`, carrying params forward.
pub fn goto(next: State) -> AfterFn {
    Arc::new(move |_outbox, _chat, _event, current| Transition {
        state: next.clone(),
        params: current.params,
    })
}

/// `After` that folds extra entries into the chat params.
pub fn merge_params(extra: chatloom_types::state::Params) -> AfterFn {
    Arc::new(move |_outbox, _chat, _event, current| Transition {
        params: current.params.merged(&extra),
        ..current
    })
}

/// `After` that sends a text reply without changing state.
pub fn send(text: impl Into<String>) -> AfterFn {
    let message = OutboundMessage::text(text);
    Arc::new(move |outbox, chat, _event, current| {
        outbox.send_to(chat.chat_id, message.clone());
        current
    })
}

/// `After` routing on the event text.
///
/// A matched text moves to its mapped state; anything else moves to
/// `fallback`. The fallback is explicit so unprescribed input always has a
/// defined destination.
pub fn route(routes: HashMap<String, State>, fallback: State) -> AfterFn {
    Arc::new(move |_outbox, chat, event, current| {
        let state = match routes.get(&event.text) {
            Some(next) => next.clone(),
            None => {
                warn!(
                    chat_id = %chat.chat_id,
                    text = %event.text,
                    "no route for input, falling back"
                );
                fallback.clone()
            }
        };
        Transition {
            state,
            params: current.params,
        }
    })
}

/// `After` running several transition steps in order.
///
/// Each step receives the transition produced by the previous one.
pub fn sequence(steps: Vec<AfterFn>) -> AfterFn {
    Arc::new(move |outbox, chat, event, current| {
        steps
            .iter()
            .fold(current, |acc, step| step(outbox, chat, event, acc))
    })
}
