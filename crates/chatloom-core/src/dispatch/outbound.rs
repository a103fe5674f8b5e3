//! Outbound rate limiter and the `Outbox` producer handle.
//!
//! All outbound traffic funnels through two global queues: direct sends
//! (one target chat) and broadcasts (an ordered target list). The limiter
//! drains both, injecting `Outbound` signals into target buses with a fixed
//! pacing sleep between individual sends to respect the transport's
//! aggregate rate ceiling. Broadcast fan-out is sequential by design: N
//! targets take N pacing intervals, trading latency for strict rate
//! compliance.

use std::sync::Arc;
use std::time::Duration;

use chatloom_types::chat::ChatId;
use chatloom_types::signal::{OutboundMessage, Signal};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::registry::SessionRegistry;
use crate::store::ChatStore;
use crate::transport::Transport;

/// One message for one chat.
#[derive(Debug, Clone)]
pub struct DirectSend {
    pub chat_id: ChatId,
    pub message: OutboundMessage,
}

/// One message for an ordered list of chats.
#[derive(Debug, Clone)]
pub struct BroadcastSend {
    pub targets: Vec<ChatId>,
    pub message: OutboundMessage,
}

/// Producer handle for the global send queues.
///
/// Handed to `Before`/`After` actions and to embedding applications.
/// Enqueueing is non-blocking: a full queue drops the message and logs it.
#[derive(Clone)]
pub struct Outbox {
    direct: mpsc::Sender<DirectSend>,
    broadcast: mpsc::Sender<BroadcastSend>,
}

impl Outbox {
    /// Create an outbox together with the two queue receivers the limiter
    /// will drain.
    pub fn channel(
        direct_capacity: usize,
        broadcast_capacity: usize,
    ) -> (
        Self,
        mpsc::Receiver<DirectSend>,
        mpsc::Receiver<BroadcastSend>,
    ) {
        let (direct_tx, direct_rx) = mpsc::channel(direct_capacity);
        let (broadcast_tx, broadcast_rx) = mpsc::channel(broadcast_capacity);
        (
            Self {
                direct: direct_tx,
                broadcast: broadcast_tx,
            },
            direct_rx,
            broadcast_rx,
        )
    }

    /// Queue one message for one chat.
    pub fn send_to(&self, chat_id: ChatId, message: OutboundMessage) {
        if self
            .direct
            .try_send(DirectSend { chat_id, message })
            .is_err()
        {
            warn!(%chat_id, "direct send queue unavailable, dropping message");
        }
    }

    /// Queue one message for every chat in `targets`, in order.
    pub fn broadcast(&self, targets: Vec<ChatId>, message: OutboundMessage) {
        let count = targets.len();
        if self
            .broadcast
            .try_send(BroadcastSend { targets, message })
            .is_err()
        {
            warn!(count, "broadcast queue unavailable, dropping message");
        }
    }
}

impl std::fmt::Debug for Outbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Outbox")
            .field("direct_capacity", &self.direct.max_capacity())
            .field("broadcast_capacity", &self.broadcast.max_capacity())
            .finish()
    }
}

/// Worker draining the send queues at a fixed pace.
pub struct OutboundLimiter<S, T> {
    registry: Arc<SessionRegistry<S, T>>,
    pacing: Duration,
    cancel: CancellationToken,
}

impl<S, T> Clone for OutboundLimiter<S, T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            pacing: self.pacing,
            cancel: self.cancel.clone(),
        }
    }
}

impl<S, T> OutboundLimiter<S, T>
where
    S: ChatStore + 'static,
    T: Transport + 'static,
{
    pub fn new(
        registry: Arc<SessionRegistry<S, T>>,
        pacing: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            registry,
            pacing,
            cancel,
        }
    }

    /// Drain the direct-send queue until cancelled or the queue closes.
    pub async fn run_direct(self, mut queue: mpsc::Receiver<DirectSend>) {
        loop {
            let send = tokio::select! {
                _ = self.cancel.cancelled() => break,
                next = queue.recv() => match next {
                    Some(send) => send,
                    None => break,
                },
            };
            self.deliver(send.chat_id, send.message).await;
        }
        debug!("direct send limiter exiting");
    }

    /// Drain the broadcast queue until cancelled or the queue closes.
    ///
    /// Fan-out is sequential: each target waits for the previous target's
    /// pacing interval.
    pub async fn run_broadcast(self, mut queue: mpsc::Receiver<BroadcastSend>) {
        loop {
            let send = tokio::select! {
                _ = self.cancel.cancelled() => break,
                next = queue.recv() => match next {
                    Some(send) => send,
                    None => break,
                },
            };
            for chat_id in send.targets {
                self.deliver(chat_id, send.message.clone()).await;
            }
        }
        debug!("broadcast limiter exiting");
    }

    async fn deliver(&self, chat_id: ChatId, message: OutboundMessage) {
        match self.registry.lookup(chat_id) {
            Some(bus) => {
                // Bus-side logging covers the overflow case.
                let _ = bus.push(Signal::Outbound(message.addressed_to(chat_id)));
            }
            None => {
                warn!(%chat_id, "dropping outbound message for chat with no live session");
            }
        }
        tokio::time::sleep(self.pacing).await;
    }
}
