//! The two global pumps feeding the session actors.
//!
//! - `inbound` -- single worker draining the external event stream into the
//!   right chat's bus, creating chats on first contact
//! - `outbound` -- rate-limited workers draining the direct and broadcast
//!   send queues into target buses

pub mod inbound;
pub mod outbound;
