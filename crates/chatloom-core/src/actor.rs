//! The per-chat session actor and its shared context.
//!
//! One actor runs per live chat, single-threaded with respect to itself,
//! walking the state machine table forever: receive signals while the
//! current state asks for them, advance (or get interrupted), run the next
//! state's entry action, persist, repeat.
//!
//! An unknown state name is fatal for this actor only -- it logs and exits,
//! and the inbound dispatcher respawns it on the chat's next event. The
//! actor also exits voluntarily, after a final save, when its bus closes.

use std::sync::Arc;
use std::time::Duration;

use chatloom_types::chat::ChatRecord;
use chatloom_types::config::RuntimeConfig;
use chatloom_types::error::ConfigError;
use chatloom_types::event::IncomingEvent;
use chatloom_types::signal::Signal;
use chatloom_types::state::State;
use tracing::{debug, error, info, warn};

use crate::bus::SignalReceiver;
use crate::dispatch::outbound::Outbox;
use crate::machine::table::{StatesConfig, Transition, WhileFn};
use crate::store::ChatStore;
use crate::transport::Transport;

/// Attempts per record save before giving up and keeping in-memory state.
const SAVE_ATTEMPTS: u32 = 3;

/// Delay between save attempts.
const SAVE_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Hook observing every inbound event before dispatch.
pub type CommonLog = Arc<dyn Fn(&IncomingEvent) + Send + Sync>;

/// Hook observing every event an actor consumes, with the updated record.
pub type ChatLog = Arc<dyn Fn(&IncomingEvent, &ChatRecord) + Send + Sync>;

/// Applies an event's profile/activity/membership facts to a record.
pub type ChatUpdater = Arc<dyn Fn(&IncomingEvent, &mut ChatRecord) + Send + Sync>;

/// Standard updater: refresh profile and activity, and recompute the
/// abandoned flag from scratch on every event.
///
/// - the bot was removed, or is the sole remaining member: abandoned
/// - the chat migrated away: abandoned (contact continues under a new id)
/// - anything else, including a plain message, means the chat is reachable
///   again: abandonment lifted
///
/// Either transition resets the state machine to `initial`, so a recovered
/// chat starts over rather than resuming mid-conversation.
pub fn default_updater(initial: State) -> ChatUpdater {
    Arc::new(move |event, record| {
        record.touch(event);

        let membership = &event.membership;
        let abandoned = membership.self_removed
            || membership.sole_member_remaining
            || membership.migrated_to.is_some();

        if abandoned != record.abandoned {
            if abandoned {
                info!(chat_id = %record.chat_id, "chat abandoned, resetting state");
            } else {
                info!(chat_id = %record.chat_id, "chat recovered, resetting state");
            }
            record.state = initial.clone();
        }
        record.abandoned = abandoned;
    })
}

/// Everything a session actor needs besides its own record and bus.
pub struct SessionContext<S, T> {
    pub store: Arc<S>,
    pub transport: Arc<T>,
    pub tables: Arc<StatesConfig>,
    pub outbox: Outbox,
    pub config: RuntimeConfig,
    pub updater: ChatUpdater,
    pub chat_log: Option<ChatLog>,
}

/// How one loop pass reached the `Before` step.
enum Turn {
    /// An event arrived (or the state has no `While`): run `After` first.
    Advance,
    /// A `StateTransition` signal replaced the state: go straight to
    /// `Before`, zero `After` calls this pass.
    Interrupt(State),
}

/// Outcome of the inner receive loop.
enum Received {
    Event(IncomingEvent),
    Interrupt(State),
    Closed,
}

/// One chat's state machine worker.
pub struct SessionActor<S, T> {
    record: ChatRecord,
    rx: SignalReceiver,
    ctx: Arc<SessionContext<S, T>>,
}

impl<S, T> SessionActor<S, T>
where
    S: ChatStore + 'static,
    T: Transport + 'static,
{
    pub fn new(record: ChatRecord, rx: SignalReceiver, ctx: Arc<SessionContext<S, T>>) -> Self {
        Self { record, rx, ctx }
    }

    /// Run the state machine loop until the bus closes or the current state
    /// falls off the table.
    pub async fn run(mut self) {
        let tables = Arc::clone(&self.ctx.tables);
        let table = tables.for_kind(self.record.kind);
        let mut last_event = IncomingEvent::placeholder(self.record.chat_id, self.record.kind);

        loop {
            let Some(actions) = table.get(&self.record.state.name).cloned() else {
                let err = ConfigError::UnknownState {
                    name: self.record.state.name.clone(),
                    table: table.label().to_string(),
                };
                error!(chat_id = %self.record.chat_id, error = %err, "terminating session actor");
                return;
            };

            let turn = match &actions.while_ {
                Some(while_fn) => match self.receive(while_fn).await {
                    Received::Event(event) => {
                        last_event = event;
                        Turn::Advance
                    }
                    Received::Interrupt(state) => Turn::Interrupt(state),
                    Received::Closed => {
                        debug!(chat_id = %self.record.chat_id, "signal bus closed, actor exiting");
                        self.persist().await;
                        return;
                    }
                },
                // No While: free-run with the last event read (or the
                // placeholder on the very first pass). Requires an After to
                // move somewhere, otherwise the state would spin in place.
                None => {
                    if actions.after.is_none() {
                        error!(
                            chat_id = %self.record.chat_id,
                            state = %self.record.state.name,
                            "state has neither While nor After, terminating session actor"
                        );
                        return;
                    }
                    Turn::Advance
                }
            };

            match turn {
                Turn::Advance => {
                    if let Some(after) = &actions.after {
                        let current = Transition {
                            state: self.record.state.clone(),
                            params: self.record.params.clone(),
                        };
                        let next = after(&self.ctx.outbox, &self.record, &last_event, current);
                        self.record.state = next.state;
                        self.record.params = next.params;
                        debug!(
                            chat_id = %self.record.chat_id,
                            state = %self.record.state,
                            "state after advance"
                        );
                    }
                }
                Turn::Interrupt(state) => {
                    info!(
                        chat_id = %self.record.chat_id,
                        state = %state,
                        "interrupted with state"
                    );
                    self.record.state = state;
                }
            }

            // Entry action for the (possibly just-replaced) current state.
            // The skip flag suppresses it exactly once and is never stored.
            if self.record.state.skip_before {
                self.record.state.skip_before = false;
            } else if let Some(before) =
                table.get(&self.record.state.name).and_then(|a| a.before.clone())
            {
                before(&self.ctx.outbox, &self.record);
            }

            self.persist().await;
        }
    }

    /// Inner receive loop: pull signals until one yields control.
    ///
    /// Outbound signals are delivered inline and do not yield; events and
    /// interrupts do.
    async fn receive(&mut self, while_fn: &WhileFn) -> Received {
        loop {
            let Some(signal) = while_fn(&mut self.rx).await else {
                return Received::Closed;
            };
            match signal {
                Signal::Incoming(event) => {
                    (self.ctx.updater)(&event, &mut self.record);
                    if let Some(chat_log) = &self.ctx.chat_log {
                        chat_log(&event, &self.record);
                    }
                    return Received::Event(event);
                }
                Signal::Interrupt(state) => return Received::Interrupt(state),
                Signal::Outbound(message) => {
                    let message = message.addressed_to(self.record.chat_id);
                    if let Err(err) = self.ctx.transport.send(&message).await {
                        warn!(
                            chat_id = %self.record.chat_id,
                            error = %err,
                            "failed to deliver outbound message"
                        );
                        if err.is_permanent() {
                            self.record.abandoned = true;
                        }
                    }
                }
            }
        }
    }

    /// Save the record with bounded retry.
    ///
    /// A save that keeps failing is logged and tolerated: the in-memory
    /// state is never discarded over a storage hiccup, and the actor keeps
    /// serving its chat.
    async fn persist(&mut self) {
        let store = Arc::clone(&self.ctx.store);
        for attempt in 1..=SAVE_ATTEMPTS {
            match store.save(&mut self.record).await {
                Ok(()) => return,
                Err(err) if attempt < SAVE_ATTEMPTS => {
                    warn!(
                        chat_id = %self.record.chat_id,
                        attempt,
                        error = %err,
                        "chat record save failed, retrying"
                    );
                    tokio::time::sleep(SAVE_RETRY_DELAY).await;
                }
                Err(err) => {
                    error!(
                        chat_id = %self.record.chat_id,
                        error = %err,
                        "giving up on chat record save, keeping in-memory state"
                    );
                }
            }
        }
    }
}
