//! Resources and the ordered collection they are converged from
//!
//! A [`Resource`] is the desired-state record a provider converges. It is
//! created by the declarative layer, shared through a [`ResourceRef`] so it
//! can sit in a [`ResourceCollection`] and be bound to a provider at the
//! same time, and it outlives every provider that touches it.

use crate::error::ConvergeError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Shared handle to a resource
pub type ResourceRef = Rc<RefCell<Resource>>;

/// Shared handle to a collection, as installed in a run context
pub type SharedCollection = Rc<RefCell<ResourceCollection>>;

/// A desired-state record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    resource_type: String,
    name: String,
    cookbook_name: Option<String>,
    updated: bool,
    updated_by_last_action: bool,
}

impl Resource {
    /// Create an untyped resource
    pub fn new(name: impl Into<String>) -> Self {
        Self::typed("resource", name)
    }

    /// Create a resource of the given type (e.g. "file", "package")
    pub fn typed(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
            cookbook_name: None,
            updated: false,
            updated_by_last_action: false,
        }
    }

    /// Wrap into a shared handle
    pub fn into_ref(self) -> ResourceRef {
        Rc::new(RefCell::new(self))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Lookup key, `type[name]`
    pub fn key(&self) -> String {
        format!("{}[{}]", self.resource_type, self.name)
    }

    pub fn cookbook_name(&self) -> Option<&str> {
        self.cookbook_name.as_deref()
    }

    pub fn set_cookbook_name(&mut self, cookbook: impl Into<String>) {
        self.cookbook_name = Some(cookbook.into());
    }

    /// Whether any action ever changed this resource
    pub fn is_updated(&self) -> bool {
        self.updated
    }

    /// Whether the most recent action changed this resource
    pub fn is_updated_by_last_action(&self) -> bool {
        self.updated_by_last_action
    }

    /// Record the outcome of an action.
    ///
    /// `updated` is sticky: a `false` here only clears the last-action flag.
    pub fn set_updated_by_last_action(&mut self, changed: bool) {
        self.updated_by_last_action = changed;
        if changed {
            self.updated = true;
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.resource_type, self.name)
    }
}

/// Ordered set of resources; iteration order is convergence order
#[derive(Debug, Default)]
pub struct ResourceCollection {
    resources: Vec<ResourceRef>,
}

impl ResourceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap into a shared handle for a run context
    pub fn shared(self) -> SharedCollection {
        Rc::new(RefCell::new(self))
    }

    /// Append a resource
    pub fn insert(&mut self, resource: ResourceRef) {
        log::debug!("Adding {} to resource collection", resource.borrow());
        self.resources.push(resource);
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceRef> {
        self.resources.iter()
    }

    pub fn all_resources(&self) -> &[ResourceRef] {
        &self.resources
    }

    /// Find a resource by `type[name]`.
    ///
    /// A resource declared twice resolves to the later declaration.
    pub fn lookup(&self, key: &str) -> Result<ResourceRef> {
        self.resources
            .iter()
            .rev()
            .find(|r| r.borrow().key() == key)
            .cloned()
            .ok_or_else(|| {
                ConvergeError::ResourceNotFound {
                    key: key.to_string(),
                }
                .into()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_resource_is_not_updated() {
        let resource = Resource::new("funk");
        assert!(!resource.is_updated());
        assert!(!resource.is_updated_by_last_action());
        assert_eq!(resource.to_string(), "resource[funk]");
    }

    #[test]
    fn test_updated_is_sticky() {
        let mut resource = Resource::typed("file", "/etc/motd");

        resource.set_updated_by_last_action(true);
        assert!(resource.is_updated());
        assert!(resource.is_updated_by_last_action());

        resource.set_updated_by_last_action(false);
        assert!(resource.is_updated());
        assert!(!resource.is_updated_by_last_action());
    }

    #[test]
    fn test_collection_keeps_insertion_order() {
        let mut collection = ResourceCollection::new();
        collection.insert(Resource::typed("package", "git").into_ref());
        collection.insert(Resource::typed("file", "/etc/gitconfig").into_ref());
        collection.insert(Resource::typed("service", "sshd").into_ref());

        let keys: Vec<String> = collection.iter().map(|r| r.borrow().key()).collect();
        assert_eq!(
            keys,
            vec!["package[git]", "file[/etc/gitconfig]", "service[sshd]"]
        );
        assert_eq!(collection.len(), 3);
        assert!(Rc::ptr_eq(&collection.all_resources()[2], collection.iter().last().unwrap()));
    }

    #[test]
    fn test_lookup_prefers_latest_declaration() {
        let mut collection = ResourceCollection::new();
        let first = Resource::typed("file", "/tmp/a").into_ref();
        let second = Resource::typed("file", "/tmp/a").into_ref();
        collection.insert(Rc::clone(&first));
        collection.insert(Rc::clone(&second));

        let found = collection.lookup("file[/tmp/a]").unwrap();
        assert!(Rc::ptr_eq(&found, &second));
    }

    #[test]
    fn test_lookup_missing_resource() {
        let collection = ResourceCollection::new();
        let err = collection.lookup("user[nobody]").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConvergeError>(),
            Some(ConvergeError::ResourceNotFound { .. })
        ));
    }
}
