//! Per-chat signal bus: a bounded FIFO of `Signal` values.
//!
//! Enqueue is strictly non-blocking. A full bus drops the newest signal and
//! logs it; this protects the single-threaded dispatcher and limiter pumps
//! from ever stalling on one slow chat. Within one chat, signals are
//! delivered in enqueue order.

use chatloom_types::chat::ChatId;
use chatloom_types::error::BusError;
use chatloom_types::signal::Signal;
use tokio::sync::mpsc;
use tracing::warn;

/// Receiving half of a chat's bus, owned by its session actor.
pub type SignalReceiver = mpsc::Receiver<Signal>;

/// Sending half of one chat's bounded signal queue.
///
/// Cheap to clone; all clones feed the same actor.
#[derive(Clone)]
pub struct SignalBus {
    chat_id: ChatId,
    tx: mpsc::Sender<Signal>,
}

impl SignalBus {
    /// Create a bus of the given capacity together with its receiver.
    pub fn channel(chat_id: ChatId, capacity: usize) -> (Self, SignalReceiver) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { chat_id, tx }, rx)
    }

    pub fn chat_id(&self) -> ChatId {
        self.chat_id
    }

    /// Non-blocking enqueue.
    ///
    /// On a full queue the signal is dropped and logged; on a closed queue
    /// (the actor has exited) the caller may decide to respawn. Never waits.
    pub fn push(&self, signal: Signal) -> Result<(), BusError> {
        self.tx.try_send(signal).map_err(|err| match err {
            mpsc::error::TrySendError::Full(dropped) => {
                warn!(
                    chat_id = %self.chat_id,
                    kind = dropped.kind(),
                    "signal bus full, dropping newest signal"
                );
                BusError::Full(self.chat_id)
            }
            mpsc::error::TrySendError::Closed(_) => BusError::Closed(self.chat_id),
        })
    }

    /// Whether the actor side has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl std::fmt::Debug for SignalBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalBus")
            .field("chat_id", &self.chat_id)
            .field("capacity", &self.tx.max_capacity())
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}
