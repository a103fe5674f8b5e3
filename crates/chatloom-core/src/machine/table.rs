//! State machine tables mapping state names to `{Before, While, After}`.
//!
//! A bot author supplies two tables -- one for one-to-one chats, one for
//! multi-party chats -- and each session actor walks the table matching its
//! chat's kind. Supplying an empty table, or a table missing the configured
//! initial state, is a startup-time configuration error.

use std::collections::HashMap;
use std::sync::Arc;

use chatloom_types::chat::{ChatKind, ChatRecord};
use chatloom_types::error::ConfigError;
use chatloom_types::event::IncomingEvent;
use chatloom_types::signal::Signal;
use chatloom_types::state::{Params, State, StateName};
use futures_util::future::BoxFuture;

use crate::bus::SignalReceiver;
use crate::dispatch::outbound::Outbox;

/// The state/params pair produced by an `After` action.
#[derive(Debug, Clone)]
pub struct Transition {
    pub state: State,
    pub params: Params,
}

/// Presentation side effect run when a state is entered.
///
/// Keyed only by the chat; typically enqueues a prompt through the outbox.
pub type BeforeFn = Arc<dyn Fn(&Outbox, &ChatRecord) + Send + Sync>;

/// Blocking receiver consuming the chat's bus until it yields one signal.
///
/// Returning `None` means the bus is closed and the actor should exit.
pub type WhileFn =
    Arc<dyn for<'a> Fn(&'a mut SignalReceiver) -> BoxFuture<'a, Option<Signal>> + Send + Sync>;

/// Transition function mapping (chat, event, current state/params) to the
/// next state/params. Runs on the normal-advance path only, never on an
/// interrupt.
pub type AfterFn =
    Arc<dyn Fn(&Outbox, &ChatRecord, &IncomingEvent, Transition) -> Transition + Send + Sync>;

/// The three optional action slots of one state.
#[derive(Clone, Default)]
pub struct StateActions {
    pub before: Option<BeforeFn>,
    pub while_: Option<WhileFn>,
    pub after: Option<AfterFn>,
}

impl StateActions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_before(mut self, before: BeforeFn) -> Self {
        self.before = Some(before);
        self
    }

    #[must_use]
    pub fn with_while(mut self, while_: WhileFn) -> Self {
        self.while_ = Some(while_);
        self
    }

    #[must_use]
    pub fn with_after(mut self, after: AfterFn) -> Self {
        self.after = Some(after);
        self
    }
}

impl std::fmt::Debug for StateActions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateActions")
            .field("before", &self.before.is_some())
            .field("while", &self.while_.is_some())
            .field("after", &self.after.is_some())
            .finish()
    }
}

/// One table of states for one chat kind.
pub struct StateTable {
    label: String,
    states: HashMap<StateName, StateActions>,
}

impl StateTable {
    /// Empty table. The label ("private", "group") appears in diagnostics.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            states: HashMap::new(),
        }
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with_state(mut self, name: impl Into<StateName>, actions: StateActions) -> Self {
        self.states.insert(name.into(), actions);
        self
    }

    pub fn insert(&mut self, name: impl Into<StateName>, actions: StateActions) {
        self.states.insert(name.into(), actions);
    }

    pub fn get(&self, name: &StateName) -> Option<&StateActions> {
        self.states.get(name)
    }

    pub fn contains(&self, name: &StateName) -> bool {
        self.states.contains_key(name)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    fn validate(&self, initial: &StateName) -> Result<(), ConfigError> {
        if self.states.is_empty() {
            return Err(ConfigError::EmptyTable(self.label.clone()));
        }
        if !self.contains(initial) {
            return Err(ConfigError::MissingInitialState {
                initial: initial.clone(),
                table: self.label.clone(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for StateTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateTable")
            .field("label", &self.label)
            .field("states", &self.states.len())
            .finish()
    }
}

/// The pair of tables selected per chat kind at actor startup.
#[derive(Debug)]
pub struct StatesConfig {
    pub private: StateTable,
    pub group: StateTable,
}

impl StatesConfig {
    pub fn new(private: StateTable, group: StateTable) -> Self {
        Self { private, group }
    }

    /// Table driving chats of the given kind.
    pub fn for_kind(&self, kind: ChatKind) -> &StateTable {
        match kind {
            ChatKind::Private => &self.private,
            ChatKind::Group => &self.group,
        }
    }

    /// Startup validation: both tables non-empty and containing the
    /// configured initial state.
    pub fn validate(&self, initial: &StateName) -> Result<(), ConfigError> {
        self.private.validate(initial)?;
        self.group.validate(initial)?;
        Ok(())
    }
}
