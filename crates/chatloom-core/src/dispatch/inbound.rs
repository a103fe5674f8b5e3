//! Inbound event dispatcher: the single worker between the external event
//! stream and the per-chat signal buses.
//!
//! For every event it finds (or creates) the chat's session and pushes an
//! `Incoming` signal onto its bus without blocking. A closed bus means the
//! actor terminated on its own (unknown state, for instance); the dispatcher
//! heals by dropping the stale entry and respawning from the stored record.

use std::sync::Arc;

use chatloom_types::chat::ChatRecord;
use chatloom_types::error::BusError;
use chatloom_types::event::IncomingEvent;
use chatloom_types::signal::Signal;
use chatloom_types::state::State;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::actor::{CommonLog, SessionContext};
use crate::registry::SessionRegistry;
use crate::store::ChatStore;
use crate::transport::Transport;

/// Routes external events into session buses.
pub struct InboundDispatcher<S, T> {
    registry: Arc<SessionRegistry<S, T>>,
    ctx: Arc<SessionContext<S, T>>,
    common_log: Option<CommonLog>,
    cancel: CancellationToken,
}

impl<S, T> InboundDispatcher<S, T>
where
    S: ChatStore + 'static,
    T: Transport + 'static,
{
    pub fn new(
        registry: Arc<SessionRegistry<S, T>>,
        ctx: Arc<SessionContext<S, T>>,
        common_log: Option<CommonLog>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            registry,
            ctx,
            common_log,
            cancel,
        }
    }

    /// Drain the event stream until cancelled or the stream closes.
    pub async fn run(self, mut events: mpsc::Receiver<IncomingEvent>) {
        loop {
            let event = tokio::select! {
                _ = self.cancel.cancelled() => break,
                next = events.recv() => match next {
                    Some(event) => event,
                    None => break,
                },
            };
            self.dispatch(event).await;
        }
        debug!("inbound dispatcher exiting");
    }

    /// Route one event to its chat's bus, creating the session on first
    /// contact.
    pub async fn dispatch(&self, event: IncomingEvent) {
        if let Some(common_log) = &self.common_log {
            common_log(&event);
        }

        if let Some(bus) = self.registry.lookup(event.chat_id) {
            match bus.push(Signal::Incoming(event.clone())) {
                Ok(()) => return,
                // Overflow already logged by the bus; the event is gone.
                Err(BusError::Full(_)) => return,
                Err(BusError::Closed(chat_id)) => {
                    info!(%chat_id, "session bus closed, respawning actor");
                    self.registry.remove(chat_id);
                }
            }
        }

        let Some(record) = self.resolve(&event).await else {
            return;
        };
        let bus = self.registry.get_or_spawn(record);
        if let Err(BusError::Closed(chat_id)) = bus.push(Signal::Incoming(event)) {
            // Freshly spawned actor already gone: its state must be
            // unresolvable. Nothing more to do for this event.
            warn!(%chat_id, "respawned session closed immediately, dropping event");
            self.registry.remove(chat_id);
        }
    }

    /// Load the chat's record, creating and inserting a fresh one on first
    /// contact. `None` means storage failed and the event must be dropped.
    async fn resolve(&self, event: &IncomingEvent) -> Option<ChatRecord> {
        match self.ctx.store.chat_by_chat_id(event.chat_id).await {
            Ok(Some(record)) => Some(record),
            Ok(None) => {
                let initial = State::new(self.ctx.config.initial_state.as_str());
                let mut record = ChatRecord::from_event(event, initial);
                info!(chat_id = %record.chat_id, kind = %record.kind, "new chat");
                if let Err(err) = self.ctx.store.insert(&mut record).await {
                    // The actor's periodic save will retry persistence.
                    error!(
                        chat_id = %record.chat_id,
                        error = %err,
                        "failed to insert new chat record"
                    );
                }
                Some(record)
            }
            Err(err) => {
                error!(
                    chat_id = %event.chat_id,
                    error = %err,
                    "chat lookup failed, dropping event"
                );
                None
            }
        }
    }
}
