//! The user-supplied state machine: tables of per-state actions.
//!
//! - `table` -- `StateActions`, `StateTable`, and the per-kind `StatesConfig`
//! - `actions` -- canonical constructors for the common action shapes

pub mod actions;
pub mod table;

pub use table::{AfterFn, BeforeFn, StateActions, StateTable, StatesConfig, Transition, WhileFn};
