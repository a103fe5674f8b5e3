//! In-memory test doubles for the storage and transport ports.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use chatloom_types::chat::{ChatId, ChatRecord};
use chatloom_types::config::RuntimeConfig;
use chatloom_types::error::{StorageError, TransportError};
use chatloom_types::signal::OutboundMessage;
use chatloom_types::state::State;
use tokio::sync::mpsc;

use crate::actor::{default_updater, SessionContext};
use crate::dispatch::outbound::{BroadcastSend, DirectSend, Outbox};
use crate::machine::actions;
use crate::machine::table::{StateActions, StateTable, StatesConfig};
use crate::store::ChatStore;
use crate::transport::Transport;

/// Hash map backed `ChatStore` with optional save-failure injection.
#[derive(Default)]
pub(crate) struct MemoryStore {
    chats: Mutex<HashMap<ChatId, ChatRecord>>,
    next_primary_id: AtomicI64,
    failing_saves: AtomicU32,
    failing_lookups: AtomicU32,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self {
            chats: Mutex::new(HashMap::new()),
            next_primary_id: AtomicI64::new(1),
            failing_saves: AtomicU32::new(0),
            failing_lookups: AtomicU32::new(0),
        }
    }

    /// Make the next `count` saves fail with a query error.
    pub(crate) fn fail_next_saves(&self, count: u32) {
        self.failing_saves.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` chat lookups fail with a query error.
    pub(crate) fn fail_next_lookups(&self, count: u32) {
        self.failing_lookups.store(count, Ordering::SeqCst);
    }

    /// Most recently saved record for the chat, if any.
    pub(crate) fn latest(&self, chat_id: ChatId) -> Option<ChatRecord> {
        self.chats.lock().unwrap().get(&chat_id).cloned()
    }

    pub(crate) fn put(&self, record: ChatRecord) {
        self.chats.lock().unwrap().insert(record.chat_id, record);
    }

    fn take(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl ChatStore for MemoryStore {
    async fn init(&self) -> Result<Vec<ChatId>, StorageError> {
        Ok(self.chats.lock().unwrap().keys().copied().collect())
    }

    async fn exists(&self, record: &ChatRecord) -> Result<bool, StorageError> {
        Ok(self.chats.lock().unwrap().contains_key(&record.chat_id))
    }

    async fn insert(&self, record: &mut ChatRecord) -> Result<(), StorageError> {
        record.primary_id = Some(self.next_primary_id.fetch_add(1, Ordering::SeqCst));
        self.chats
            .lock()
            .unwrap()
            .insert(record.chat_id, record.clone());
        Ok(())
    }

    async fn update(&self, record: &ChatRecord) -> Result<(), StorageError> {
        let mut chats = self.chats.lock().unwrap();
        if !chats.contains_key(&record.chat_id) {
            return Err(StorageError::NotFound);
        }
        chats.insert(record.chat_id, record.clone());
        Ok(())
    }

    async fn save(&self, record: &mut ChatRecord) -> Result<(), StorageError> {
        if Self::take(&self.failing_saves) {
            return Err(StorageError::Query("injected save failure".into()));
        }
        if record.primary_id.is_none() {
            record.primary_id = Some(self.next_primary_id.fetch_add(1, Ordering::SeqCst));
        }
        self.chats
            .lock()
            .unwrap()
            .insert(record.chat_id, record.clone());
        Ok(())
    }

    async fn delete(&self, record: &ChatRecord) -> Result<(), StorageError> {
        self.chats.lock().unwrap().remove(&record.chat_id);
        Ok(())
    }

    async fn chat_by_primary_id(&self, primary_id: i64) -> Result<Option<ChatRecord>, StorageError> {
        Ok(self
            .chats
            .lock()
            .unwrap()
            .values()
            .find(|record| record.primary_id == Some(primary_id))
            .cloned())
    }

    async fn chat_by_chat_id(&self, chat_id: ChatId) -> Result<Option<ChatRecord>, StorageError> {
        if Self::take(&self.failing_lookups) {
            return Err(StorageError::Query("injected lookup failure".into()));
        }
        Ok(self.chats.lock().unwrap().get(&chat_id).cloned())
    }

    async fn chats_by_param(&self, fragment: &str) -> Result<Vec<ChatRecord>, StorageError> {
        let chats = self.chats.lock().unwrap();
        let mut found = Vec::new();
        for record in chats.values() {
            let serialized = serde_json::to_string(&record.params)
                .map_err(|err| StorageError::Query(err.to_string()))?;
            if serialized.contains(fragment) {
                found.push(record.clone());
            }
        }
        Ok(found)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TransportMode {
    Deliver,
    Forbidden,
    Flaky,
}

/// Transport double recording every delivered message.
pub(crate) struct RecordingTransport {
    sent: Mutex<Vec<OutboundMessage>>,
    mode: Mutex<TransportMode>,
}

impl RecordingTransport {
    pub(crate) fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            mode: Mutex::new(TransportMode::Deliver),
        }
    }

    pub(crate) fn set_mode(&self, mode: TransportMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub(crate) fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }
}

impl Transport for RecordingTransport {
    async fn send(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        match *self.mode.lock().unwrap() {
            TransportMode::Deliver => {
                self.sent.lock().unwrap().push(message.clone());
                Ok(())
            }
            TransportMode::Forbidden => Err(TransportError::Forbidden(
                message.chat_id.unwrap_or(ChatId(0)),
            )),
            TransportMode::Flaky => Err(TransportError::Failed("transient failure".into())),
        }
    }
}

/// Minimal table set: a single START state that blocks on its bus.
pub(crate) fn minimal_tables() -> StatesConfig {
    let start = StateActions::new().with_while(actions::receive());
    StatesConfig::new(
        StateTable::new("private").with_state("START", start.clone()),
        StateTable::new("group").with_state("START", start),
    )
}

/// Context over the in-memory doubles with the given tables, plus the
/// outbound queue receivers a limiter would drain.
pub(crate) fn context_with_tables(
    tables: StatesConfig,
) -> (
    Arc<SessionContext<MemoryStore, RecordingTransport>>,
    mpsc::Receiver<DirectSend>,
    mpsc::Receiver<BroadcastSend>,
) {
    let config = RuntimeConfig::default();
    let (outbox, direct_rx, broadcast_rx) =
        Outbox::channel(config.send_queue_capacity, config.broadcast_queue_capacity);
    let updater = default_updater(State::new(config.initial_state.as_str()));
    let ctx = Arc::new(SessionContext {
        store: Arc::new(MemoryStore::new()),
        transport: Arc::new(RecordingTransport::new()),
        tables: Arc::new(tables),
        outbox,
        config,
        updater,
        chat_log: None,
    });
    (ctx, direct_rx, broadcast_rx)
}

/// `context_with_tables` over the minimal START-only tables.
pub(crate) fn test_context() -> (
    Arc<SessionContext<MemoryStore, RecordingTransport>>,
    mpsc::Receiver<DirectSend>,
    mpsc::Receiver<BroadcastSend>,
) {
    context_with_tables(minimal_tables())
}
