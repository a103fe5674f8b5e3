//! `Transport` trait definition.
//!
//! Outbound port to the remote chat service. The core invokes `send`
//! whenever a session actor processes an `Outbound` signal; any error is
//! logged by the caller, and a permanent denial (blocked/forbidden) marks
//! the chat record abandoned.

use chatloom_types::error::TransportError;
use chatloom_types::signal::OutboundMessage;

/// Outbound message delivery port.
pub trait Transport: Send + Sync {
    /// Deliver one message to its target chat.
    fn send(
        &self,
        message: &OutboundMessage,
    ) -> impl std::future::Future<Output = Result<(), TransportError>> + Send;
}
