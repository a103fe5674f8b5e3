//! Session-actor concurrency core for chatloom.
//!
//! This crate drives many independent chat sessions through a user-supplied
//! state machine: one long-lived actor per chat fed by a bounded signal bus,
//! a registry for lazy race-free actor creation, an inbound dispatcher
//! draining the external event stream, and a rate-limited outbound pump.
//!
//! It also defines the "port" traits the infrastructure layer implements
//! (`ChatStore`, `Transport`). It depends only on `chatloom-types` -- never
//! on `chatloom-infra` or any database/IO crate.

pub mod actor;
pub mod bus;
pub mod dispatch;
pub mod machine;
pub mod registry;
pub mod runtime;
pub mod store;
pub mod transport;

#[cfg(test)]
pub(crate) mod testutil;

pub use actor::{ChatLog, ChatUpdater, CommonLog, SessionActor, SessionContext, default_updater};
pub use bus::{SignalBus, SignalReceiver};
pub use dispatch::inbound::InboundDispatcher;
pub use dispatch::outbound::{BroadcastSend, DirectSend, Outbox, OutboundLimiter};
pub use machine::table::{StateActions, StateTable, StatesConfig, Transition};
pub use registry::SessionRegistry;
pub use runtime::{ChatRuntime, Hooks};
pub use store::ChatStore;
pub use transport::Transport;
