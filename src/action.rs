//! Action names, per-provider dispatch tables, and action outcomes

use crate::provider::ProviderCore;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Name of an operation a provider performs on a resource ("create", "nothing", ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Action(Cow<'static, str>);

impl Action {
    pub const NOTHING: &'static str = "nothing";

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// The universal no-op action
    pub const fn nothing() -> Self {
        Self::from_static(Self::NOTHING)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_nothing(&self) -> bool {
        self.as_str() == Self::NOTHING
    }
}

impl From<&'static str> for Action {
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}

impl From<String> for Action {
    fn from(name: String) -> Self {
        Self(Cow::Owned(name))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handler for one action of a concrete provider
pub type ActionHandler<B> = fn(&mut B, &mut ProviderCore<'_>) -> Result<()>;

/// Explicit mapping from action name to handler for one provider type
pub struct ActionTable<B> {
    handlers: Vec<(Action, ActionHandler<B>)>,
}

impl<B> ActionTable<B> {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Register a handler. Registering the same name twice keeps the later one.
    pub fn on(mut self, action: impl Into<Action>, handler: ActionHandler<B>) -> Self {
        let action = action.into();
        if let Some(slot) = self.handlers.iter_mut().find(|(name, _)| *name == action) {
            log::warn!("Handler for action '{action}' registered twice, keeping the last one");
            slot.1 = handler;
        } else {
            self.handlers.push((action, handler));
        }
        self
    }

    pub fn get(&self, action: &Action) -> Option<ActionHandler<B>> {
        self.handlers
            .iter()
            .find(|(name, _)| name == action)
            .map(|(_, handler)| *handler)
    }

    pub fn contains(&self, action: &Action) -> bool {
        self.get(action).is_some()
    }

    /// Registered action names, in registration order
    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.handlers.iter().map(|(name, _)| name)
    }
}

impl<B> Default for ActionTable<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> fmt::Debug for ActionTable<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.actions()).finish()
    }
}

/// What a `run_action` invocation did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "result")]
pub enum ActionResult {
    /// Nothing needed to change
    UpToDate,
    /// Converge actions executed
    Updated { applied: usize },
    /// Why-run: converge actions recorded without executing
    Simulated { pending: usize },
    /// Why-run on a provider that cannot simulate; the handler never ran
    Bypassed,
}

impl ActionResult {
    /// Whether the system was actually changed
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Updated { .. })
    }
}
