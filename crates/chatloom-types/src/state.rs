//! Conversation state values: `StateName`, `Params`, and `State`.
//!
//! A `State` names an entry in the state machine table and carries a
//! string-to-string parameter map. `Params` is functional: deriving a new
//! map via [`Params::with`] never mutates the source. Serialization happens
//! only at the storage boundary; inside the runtime these are plain values.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Key into the state machine table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateName(pub String);

impl StateName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StateName {
    fn from(s: &str) -> Self {
        StateName(s.to_string())
    }
}

impl From<String> for StateName {
    fn from(s: String) -> Self {
        StateName(s)
    }
}

/// Immutable-functional string map carried across state transitions.
///
/// Every deriving operation (`with`, `merged`) returns a new `Params` and
/// leaves the receiver untouched. Backed by a `BTreeMap` so the serialized
/// form is stable, which keeps substring lookups over stored params
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(BTreeMap<String, String>);

impl Params {
    /// Empty parameter map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-entry map.
    pub fn single(key: impl Into<String>, value: impl Into<String>) -> Self {
        Params::new().with(key, value)
    }

    /// Look up a value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Derive a new map with `key` set to `value`. The receiver is unchanged.
    #[must_use]
    pub fn with(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut next = self.0.clone();
        next.insert(key.into(), value.into());
        Params(next)
    }

    /// Derive a new map with every entry of `other` folded in.
    ///
    /// Entries in `other` win over entries already present.
    #[must_use]
    pub fn merged(&self, other: &Params) -> Self {
        let mut next = self.0.clone();
        for (k, v) in &other.0 {
            next.insert(k.clone(), v.clone());
        }
        Params(next)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// One position in a chat's state machine.
///
/// `skip_before` is transient control data: it suppresses the `Before`
/// action exactly once after a transition and is never serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub name: StateName,
    #[serde(default)]
    pub params: Params,
    #[serde(skip)]
    pub skip_before: bool,
}

impl State {
    /// Fresh state with empty params and the skip-before flag cleared.
    pub fn new(name: impl Into<StateName>) -> Self {
        Self {
            name: name.into(),
            params: Params::new(),
            skip_before: false,
        }
    }

    /// Derive a copy carrying one extra state param.
    #[must_use]
    pub fn with_param(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            params: self.params.with(key, value),
            ..self.clone()
        }
    }

    /// Derive a copy whose `Before` action will be skipped once.
    #[must_use]
    pub fn skipped_before(&self) -> Self {
        Self {
            skip_before: true,
            ..self.clone()
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.params.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} with params: {:?}", self.name, self.params)
        }
    }
}
