//! Run context: the environment a provider converges in
//!
//! Holds node data, the cookbook collection, the event sink, the execution
//! mode, and exactly one active resource collection. The collection slot is
//! the only part that changes during a run, and only through
//! [`RunContext::scoped_collection`].

use crate::config::Config;
use crate::events::EventDispatcher;
use crate::resource::{ResourceCollection, SharedCollection};
use crate::shell_out::ShellOutConfig;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

/// The machine being converged
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    name: String,
    #[serde(default)]
    attributes: BTreeMap<String, String>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// A cookbook available to the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookbook {
    pub name: String,
    pub version: String,
}

impl Cookbook {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Cookbooks available to the run, by name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookbookCollection {
    cookbooks: BTreeMap<String, Cookbook>,
}

impl CookbookCollection {
    pub fn new(cookbooks: impl IntoIterator<Item = Cookbook>) -> Self {
        Self {
            cookbooks: cookbooks
                .into_iter()
                .map(|c| (c.name.clone(), c))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Cookbook> {
        self.cookbooks.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.cookbooks.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.cookbooks.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.cookbooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookbooks.is_empty()
    }
}

/// Execution environment for one convergence run
#[derive(Debug)]
pub struct RunContext {
    node: Node,
    cookbook_collection: CookbookCollection,
    events: EventDispatcher,
    resource_collection: RefCell<SharedCollection>,
    why_run: Cell<bool>,
    shell_out: ShellOutConfig,
}

impl RunContext {
    /// Create a context with an empty resource collection
    pub fn new(
        node: Node,
        cookbook_collection: CookbookCollection,
        events: EventDispatcher,
    ) -> Self {
        Self::with_collection(
            node,
            cookbook_collection,
            events,
            ResourceCollection::new().shared(),
        )
    }

    /// Create a context around an existing resource collection
    pub fn with_collection(
        node: Node,
        cookbook_collection: CookbookCollection,
        events: EventDispatcher,
        resource_collection: SharedCollection,
    ) -> Self {
        Self {
            node,
            cookbook_collection,
            events,
            resource_collection: RefCell::new(resource_collection),
            why_run: Cell::new(false),
            shell_out: ShellOutConfig::default(),
        }
    }

    /// Apply mode and shell settings from config
    pub fn with_config(mut self, config: &Config) -> Self {
        self.why_run.set(config.why_run);
        self.shell_out = config.shell_out.clone();
        self
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn cookbook_collection(&self) -> &CookbookCollection {
        &self.cookbook_collection
    }

    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    pub fn shell_out_config(&self) -> &ShellOutConfig {
        &self.shell_out
    }

    /// Whether providers should simulate instead of mutate
    pub fn why_run(&self) -> bool {
        self.why_run.get()
    }

    pub fn set_why_run(&self, enabled: bool) {
        log::debug!("why-run mode {}", if enabled { "enabled" } else { "disabled" });
        self.why_run.set(enabled);
    }

    /// The active resource collection
    pub fn resource_collection(&self) -> SharedCollection {
        Rc::clone(&self.resource_collection.borrow())
    }

    /// Install `collection` as the active collection until the returned guard drops.
    ///
    /// Guards nest: each one restores exactly the collection that was active
    /// when it was created.
    pub fn scoped_collection(&self, collection: SharedCollection) -> CollectionScope<'_> {
        let previous = self.resource_collection.replace(collection);
        CollectionScope {
            run_context: self,
            previous: Some(previous),
        }
    }
}

/// Restores the previously active resource collection on drop
#[must_use = "the collection is restored as soon as the scope is dropped"]
#[derive(Debug)]
pub struct CollectionScope<'a> {
    run_context: &'a RunContext,
    previous: Option<SharedCollection>,
}

impl CollectionScope<'_> {
    /// The collection that will be restored
    pub fn previous(&self) -> Option<&SharedCollection> {
        self.previous.as_ref()
    }
}

impl Drop for CollectionScope<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            *self.run_context.resource_collection.borrow_mut() = previous;
        }
    }
}
