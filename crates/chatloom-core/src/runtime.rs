//! `ChatRuntime`: construction, startup, and shutdown of the whole session
//! runtime.
//!
//! Construction validates the state tables and builds the shared context.
//! `start` revives every stored chat, then spawns the three global workers:
//! the inbound dispatcher and the two outbound limiters. `shutdown` cancels
//! the workers and closes every session bus so actors drain and exit.

use std::sync::Arc;

use chatloom_types::chat::ChatId;
use chatloom_types::config::RuntimeConfig;
use chatloom_types::error::{BusError, ConfigError, StorageError};
use chatloom_types::event::IncomingEvent;
use chatloom_types::signal::Signal;
use chatloom_types::state::{State, StateName};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::actor::{default_updater, ChatLog, ChatUpdater, CommonLog, SessionContext};
use crate::dispatch::inbound::InboundDispatcher;
use crate::dispatch::outbound::{BroadcastSend, DirectSend, Outbox, OutboundLimiter};
use crate::machine::table::StatesConfig;
use crate::registry::SessionRegistry;
use crate::store::ChatStore;
use crate::transport::Transport;

/// Optional observation and record-update hooks.
///
/// Every slot left `None` falls back to the built-in behavior: the standard
/// updater and no logging callbacks.
#[derive(Default)]
pub struct Hooks {
    /// Replaces the standard record updater.
    pub updater: Option<ChatUpdater>,
    /// Observes each consumed event together with the updated record.
    pub chat_log: Option<ChatLog>,
    /// Observes every inbound event before dispatch.
    pub common_log: Option<CommonLog>,
}

/// The assembled session runtime.
pub struct ChatRuntime<S, T> {
    ctx: Arc<SessionContext<S, T>>,
    registry: Arc<SessionRegistry<S, T>>,
    common_log: Option<CommonLog>,
    direct_rx: Option<mpsc::Receiver<DirectSend>>,
    broadcast_rx: Option<mpsc::Receiver<BroadcastSend>>,
    cancel: CancellationToken,
}

impl<S, T> ChatRuntime<S, T>
where
    S: ChatStore + 'static,
    T: Transport + 'static,
{
    /// Validate the tables and assemble the runtime. Nothing runs yet.
    pub fn new(
        config: RuntimeConfig,
        tables: StatesConfig,
        store: Arc<S>,
        transport: Arc<T>,
        hooks: Hooks,
    ) -> Result<Self, ConfigError> {
        tables.validate(&StateName::from(config.initial_state.as_str()))?;

        let (outbox, direct_rx, broadcast_rx) =
            Outbox::channel(config.send_queue_capacity, config.broadcast_queue_capacity);
        let updater = hooks
            .updater
            .unwrap_or_else(|| default_updater(State::new(config.initial_state.as_str())));
        let ctx = Arc::new(SessionContext {
            store,
            transport,
            tables: Arc::new(tables),
            outbox,
            config,
            updater,
            chat_log: hooks.chat_log,
        });
        let registry = SessionRegistry::new(Arc::clone(&ctx));

        Ok(Self {
            ctx,
            registry,
            common_log: hooks.common_log,
            direct_rx: Some(direct_rx),
            broadcast_rx: Some(broadcast_rx),
            cancel: CancellationToken::new(),
        })
    }

    /// Revive every stored chat, then spawn the dispatcher and the two
    /// outbound limiters draining `events` and the send queues.
    pub async fn start(
        &mut self,
        events: mpsc::Receiver<IncomingEvent>,
    ) -> Result<(), StorageError> {
        let chat_ids = self.ctx.store.init().await?;
        let mut revived = 0usize;
        for chat_id in chat_ids {
            match self.ctx.store.chat_by_chat_id(chat_id).await {
                Ok(Some(record)) => {
                    self.registry.get_or_spawn(record);
                    revived += 1;
                }
                Ok(None) => warn!(%chat_id, "chat listed by init but not loadable"),
                Err(err) => error!(%chat_id, error = %err, "failed to load stored chat"),
            }
        }
        info!(revived, "session runtime starting");

        let dispatcher = InboundDispatcher::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.ctx),
            self.common_log.take(),
            self.cancel.clone(),
        );
        tokio::spawn(dispatcher.run(events));

        let limiter = OutboundLimiter::new(
            Arc::clone(&self.registry),
            self.ctx.config.pacing(),
            self.cancel.clone(),
        );
        if let Some(direct_rx) = self.direct_rx.take() {
            tokio::spawn(limiter.clone().run_direct(direct_rx));
        }
        if let Some(broadcast_rx) = self.broadcast_rx.take() {
            tokio::spawn(limiter.run_broadcast(broadcast_rx));
        }
        Ok(())
    }

    /// Producer handle for the global send queues.
    pub fn outbox(&self) -> Outbox {
        self.ctx.outbox.clone()
    }

    pub fn registry(&self) -> &Arc<SessionRegistry<S, T>> {
        &self.registry
    }

    /// Force a live chat into `state`, bypassing its `After` action.
    ///
    /// Fails if the chat has no live session or its bus is full or closed.
    pub fn interrupt(&self, chat_id: ChatId, state: State) -> Result<(), BusError> {
        match self.registry.lookup(chat_id) {
            Some(bus) => bus.push(Signal::Interrupt(state)),
            None => Err(BusError::Closed(chat_id)),
        }
    }

    /// Cancel the global workers and close every session bus.
    pub fn shutdown(&self) {
        info!("session runtime shutting down");
        self.cancel.cancel();
        self.registry.close_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::actions;
    use crate::machine::table::{StateActions, StateTable};
    use crate::testutil::{minimal_tables, MemoryStore, RecordingTransport};
    use chatloom_types::chat::{ChatKind, ChatRecord};
    use chatloom_types::state::Params;
    use std::collections::HashMap;
    use std::time::Duration;

    fn runtime_with(
        tables: StatesConfig,
    ) -> ChatRuntime<MemoryStore, RecordingTransport> {
        ChatRuntime::new(
            RuntimeConfig::default(),
            tables,
            Arc::new(MemoryStore::new()),
            Arc::new(RecordingTransport::new()),
            Hooks::default(),
        )
        .unwrap()
    }

    /// Poll until the transport delivered `count` messages.
    async fn wait_for_sent(
        transport: &RecordingTransport,
        count: usize,
    ) -> Vec<chatloom_types::signal::OutboundMessage> {
        for _ in 0..1000 {
            let sent = transport.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("timed out waiting for {count} deliveries");
    }

    fn routed_tables() -> StatesConfig {
        let mut routes = HashMap::new();
        routes.insert("go".to_string(), State::new("MAIN"));
        let start = StateActions::new()
            .with_while(actions::receive())
            .with_after(actions::route(routes, State::new("START")));
        let main = StateActions::new()
            .with_while(actions::receive())
            .with_before(actions::prompt("welcome"));
        let table = |label: &str| {
            StateTable::new(label)
                .with_state("START", start.clone())
                .with_state("MAIN", main.clone())
        };
        StatesConfig::new(table("private"), table("group"))
    }

    #[test]
    fn new_rejects_invalid_tables() {
        let tables = StatesConfig::new(StateTable::new("private"), StateTable::new("group"));
        let err = ChatRuntime::new(
            RuntimeConfig::default(),
            tables,
            Arc::new(MemoryStore::new()),
            Arc::new(RecordingTransport::new()),
            Hooks::default(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, ConfigError::EmptyTable(_)));
    }

    #[tokio::test]
    async fn start_revives_stored_chats() {
        let store = Arc::new(MemoryStore::new());
        for id in [1, 2, 3] {
            let event = IncomingEvent::text(ChatId(id), ChatKind::Private, "hi");
            store.put(ChatRecord::from_event(&event, State::new("START")));
        }
        let mut runtime = ChatRuntime::new(
            RuntimeConfig::default(),
            minimal_tables(),
            store,
            Arc::new(RecordingTransport::new()),
            Hooks::default(),
        )
        .unwrap();

        let (_events_tx, events_rx) = mpsc::channel(8);
        runtime.start(events_rx).await.unwrap();
        assert_eq!(runtime.registry().len(), 3);
        runtime.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn event_flows_end_to_end() {
        let mut runtime = runtime_with(routed_tables());
        let transport = Arc::clone(&runtime.ctx.transport);

        let (events_tx, events_rx) = mpsc::channel(8);
        runtime.start(events_rx).await.unwrap();

        events_tx
            .send(IncomingEvent::text(ChatId(1), ChatKind::Private, "go"))
            .await
            .unwrap();

        // Routed to MAIN, whose entry prompt travels outbox -> limiter ->
        // bus -> actor -> transport.
        let sent = wait_for_sent(&transport, 1).await;
        assert_eq!(sent[0].text, "welcome");
        assert_eq!(sent[0].chat_id, Some(ChatId(1)));

        let saved = runtime.ctx.store.latest(ChatId(1)).unwrap();
        assert_eq!(saved.state.name, StateName::from("MAIN"));
        runtime.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_moves_live_chat() {
        let mut runtime = runtime_with(routed_tables());
        let transport = Arc::clone(&runtime.ctx.transport);

        let (events_tx, events_rx) = mpsc::channel(8);
        runtime.start(events_rx).await.unwrap();

        // First contact spawns the session in START.
        events_tx
            .send(IncomingEvent::text(ChatId(2), ChatKind::Private, "hello"))
            .await
            .unwrap();
        for _ in 0..1000 {
            if runtime.registry().lookup(ChatId(2)).is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        runtime
            .interrupt(ChatId(2), State::new("MAIN").with_param("via", "admin"))
            .unwrap();

        let sent = wait_for_sent(&transport, 1).await;
        assert_eq!(sent[0].text, "welcome");

        for _ in 0..1000 {
            if let Some(record) = runtime.ctx.store.latest(ChatId(2)) {
                if record.state.name == StateName::from("MAIN") {
                    assert_eq!(record.state.params, Params::single("via", "admin"));
                    runtime.shutdown();
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("interrupted state never persisted");
    }

    #[tokio::test]
    async fn interrupt_without_session_fails() {
        let runtime = runtime_with(minimal_tables());
        let err = runtime.interrupt(ChatId(9), State::new("START")).unwrap_err();
        assert!(matches!(err, BusError::Closed(ChatId(9))));
    }

    #[tokio::test]
    async fn shutdown_closes_sessions() {
        let mut runtime = runtime_with(minimal_tables());
        let (events_tx, events_rx) = mpsc::channel(8);
        runtime.start(events_rx).await.unwrap();

        events_tx
            .send(IncomingEvent::text(ChatId(3), ChatKind::Private, "hi"))
            .await
            .unwrap();
        for _ in 0..100 {
            if !runtime.registry().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        runtime.shutdown();
        assert!(runtime.registry().is_empty());
    }
}
