//! Error families for the chatloom runtime.
//!
//! Each family maps to one recovery policy: config errors kill only the
//! affected actor, transport errors are logged (and may mark a chat
//! abandoned), storage errors are retried then tolerated, and bus overflow
//! is drop-newest-and-log.

use thiserror::Error;

use crate::chat::ChatId;
use crate::state::StateName;

/// Errors from the storage collaborator.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("chat not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors from the transport-send collaborator.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The chat has permanently denied the bot (blocked, kicked, forbidden).
    #[error("forbidden by chat {0}")]
    Forbidden(ChatId),

    #[error("send failed: {0}")]
    Failed(String),
}

impl TransportError {
    /// Whether the chat is permanently unreachable and should be flagged
    /// abandoned.
    pub fn is_permanent(&self) -> bool {
        matches!(self, TransportError::Forbidden(_))
    }
}

/// Startup or per-state configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The current state names no entry in the active table. Fatal for the
    /// affected actor only.
    #[error("no such state '{name}' in the {table} table")]
    UnknownState { name: StateName, table: String },

    /// A state machine table was supplied empty. Fail-fast at startup.
    #[error("empty state table: {0}")]
    EmptyTable(String),

    /// The configured initial state is missing from a table. Fail-fast.
    #[error("initial state '{initial}' missing from the {table} table")]
    MissingInitialState { initial: StateName, table: String },
}

/// Non-blocking enqueue outcomes for a chat's signal bus.
#[derive(Debug, Error)]
pub enum BusError {
    /// The bus is at capacity; the newest signal was dropped.
    #[error("signal bus full for chat {0}")]
    Full(ChatId),

    /// The actor has exited and its receiver is gone.
    #[error("signal bus closed for chat {0}")]
    Closed(ChatId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_is_permanent() {
        assert!(TransportError::Forbidden(ChatId(1)).is_permanent());
        assert!(!TransportError::Failed("timeout".into()).is_permanent());
    }

    #[test]
    fn config_error_display() {
        let err = ConfigError::UnknownState {
            name: StateName::from("GHOST"),
            table: "private".to_string(),
        };
        assert_eq!(err.to_string(), "no such state 'GHOST' in the private table");
    }

    #[test]
    fn bus_error_display() {
        assert_eq!(
            BusError::Full(ChatId(7)).to_string(),
            "signal bus full for chat 7"
        );
    }
}
