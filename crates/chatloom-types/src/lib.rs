//! Shared domain types for chatloom.
//!
//! This crate contains the core domain types used across the chatloom runtime:
//! chat records, state machine values, signals, events, and their error types.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod chat;
pub mod config;
pub mod error;
pub mod event;
pub mod signal;
pub mod state;
