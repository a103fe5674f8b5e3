//! Keyed actor store: one signal bus and one session actor per chat.
//!
//! Wraps a `DashMap` so lookups take a shared shard lock and creation takes
//! an exclusive one. Lazy creation goes through the map's entry API, which
//! holds the exclusive lock across the lookup-then-create step: even under
//! concurrent first-contact events, exactly one bus is created and exactly
//! one actor spawned per `ChatId`. The raw map is never exposed.

use std::sync::Arc;

use chatloom_types::chat::{ChatId, ChatRecord};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use crate::actor::{SessionActor, SessionContext};
use crate::bus::SignalBus;
use crate::store::ChatStore;
use crate::transport::Transport;

/// Concurrency-safe map from `ChatId` to its live signal bus.
pub struct SessionRegistry<S, T> {
    sessions: DashMap<ChatId, SignalBus>,
    ctx: Arc<SessionContext<S, T>>,
}

impl<S, T> SessionRegistry<S, T>
where
    S: ChatStore + 'static,
    T: Transport + 'static,
{
    pub fn new(ctx: Arc<SessionContext<S, T>>) -> Arc<Self> {
        Arc::new(Self {
            sessions: DashMap::new(),
            ctx,
        })
    }

    /// Shared-lock lookup of a chat's bus.
    pub fn lookup(&self, chat_id: ChatId) -> Option<SignalBus> {
        self.sessions.get(&chat_id).map(|bus| bus.clone())
    }

    /// Return the chat's bus, creating the bus and spawning its actor if
    /// this is first contact.
    ///
    /// `record` is consumed only on the create path; on the lookup path the
    /// running actor keeps its own, more current copy.
    pub fn get_or_spawn(&self, record: ChatRecord) -> SignalBus {
        match self.sessions.entry(record.chat_id) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let chat_id = record.chat_id;
                let (bus, rx) = SignalBus::channel(chat_id, self.ctx.config.bus_capacity);
                let actor = SessionActor::new(record, rx, Arc::clone(&self.ctx));
                tokio::spawn(actor.run());
                entry.insert(bus.clone());
                debug!(%chat_id, "spawned session actor");
                bus
            }
        }
    }

    /// Drop a chat's bus, letting a later event respawn its actor.
    pub fn remove(&self, chat_id: ChatId) -> bool {
        let removed = self.sessions.remove(&chat_id).is_some();
        if removed {
            debug!(%chat_id, "removed session from registry");
        }
        removed
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drop every bus sender so all actors drain their queues and exit
    /// voluntarily. Part of clean shutdown.
    pub fn close_all(&self) {
        self.sessions.clear();
    }
}

impl<S, T> std::fmt::Debug for SessionRegistry<S, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.sessions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::test_context;
    use chatloom_types::chat::ChatKind;
    use chatloom_types::event::IncomingEvent;
    use chatloom_types::state::State;

    fn record(id: i64) -> ChatRecord {
        let event = IncomingEvent::text(ChatId(id), ChatKind::Private, "hi");
        ChatRecord::from_event(&event, State::new("START"))
    }

    #[tokio::test]
    async fn get_or_spawn_creates_once() {
        let (ctx, _direct_rx, _broadcast_rx) = test_context();
        let registry = SessionRegistry::new(ctx);

        let first = registry.get_or_spawn(record(1));
        let second = registry.get_or_spawn(record(1));

        assert_eq!(registry.len(), 1);
        assert_eq!(first.chat_id(), second.chat_id());
    }

    #[tokio::test]
    async fn concurrent_first_contact_spawns_one_actor() {
        let (ctx, _direct_rx, _broadcast_rx) = test_context();
        let registry = SessionRegistry::new(ctx);

        let mut handles = Vec::new();
        for _ in 0..16 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                registry.get_or_spawn(record(7));
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn lookup_misses_unknown_chat() {
        let (ctx, _direct_rx, _broadcast_rx) = test_context();
        let registry = SessionRegistry::new(ctx);
        assert!(registry.lookup(ChatId(99)).is_none());
    }

    #[tokio::test]
    async fn remove_allows_respawn() {
        let (ctx, _direct_rx, _broadcast_rx) = test_context();
        let registry = SessionRegistry::new(ctx);

        registry.get_or_spawn(record(3));
        assert!(registry.remove(ChatId(3)));
        assert!(registry.lookup(ChatId(3)).is_none());

        registry.get_or_spawn(record(3));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn close_all_lets_actors_drain_and_exit() {
        let (ctx, _direct_rx, _broadcast_rx) = test_context();
        let store = Arc::clone(&ctx.store);
        let registry = SessionRegistry::new(ctx);

        let bus = registry.get_or_spawn(record(4));
        registry.close_all();
        assert!(registry.is_empty());
        // Last sender gone: the actor sees the close and exits.
        drop(bus);

        // The exiting actor performs a final save.
        for _ in 0..100 {
            if store.latest(ChatId(4)).is_some() {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("actor never persisted on exit");
    }
}
