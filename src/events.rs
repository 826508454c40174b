//! Event sink for provider lifecycle notifications
//!
//! Reporting and formatting live outside this crate; they subscribe to the
//! run context's [`EventDispatcher`] by implementing [`EventHandler`].
//! Every method has a no-op default so subscribers only override what they
//! care about.

use crate::action::Action;
use crate::converge::ConvergeAction;
use crate::resource::Resource;
use std::rc::Rc;

/// Receiver of provider lifecycle events
pub trait EventHandler {
    /// A provider is about to run `action` for `resource`
    fn resource_action_start(&self, _resource: &Resource, _action: &Action) {}

    /// `load_current_resource` completed
    fn resource_current_state_loaded(
        &self,
        _resource: &Resource,
        _action: &Action,
        _current: Option<&Resource>,
    ) {
    }

    /// Why-run is on and the provider cannot simulate, so the whole action was
    /// skipped. `skipped` describes it; it is never queued.
    fn resource_bypassed(
        &self,
        _resource: &Resource,
        _action: &Action,
        _skipped: &ConvergeAction,
    ) {
    }

    /// A converge action was executed, or queued without executing in why-run
    fn resource_update_applied(
        &self,
        _resource: &Resource,
        _action: &Action,
        _update: &ConvergeAction,
    ) {
    }

    /// At least one converge action executed
    fn resource_updated(&self, _resource: &Resource, _action: &Action) {}

    /// Nothing executed
    fn resource_up_to_date(&self, _resource: &Resource, _action: &Action) {}

    /// The action failed; the error is propagated to the driver afterwards
    fn resource_failed(&self, _resource: &Resource, _action: &Action, _error: &anyhow::Error) {}

    /// The action finished successfully
    fn resource_completed(&self, _resource: &Resource, _action: &Action) {}
}

/// Fans events out to every registered subscriber, in registration order
#[derive(Default)]
pub struct EventDispatcher {
    subscribers: Vec<Rc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, subscriber: Rc<dyn EventHandler>) {
        self.subscribers.push(subscriber);
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    fn each(&self, f: impl Fn(&dyn EventHandler)) {
        for subscriber in &self.subscribers {
            f(subscriber.as_ref());
        }
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl EventHandler for EventDispatcher {
    fn resource_action_start(&self, resource: &Resource, action: &Action) {
        self.each(|s| s.resource_action_start(resource, action));
    }

    fn resource_current_state_loaded(
        &self,
        resource: &Resource,
        action: &Action,
        current: Option<&Resource>,
    ) {
        self.each(|s| s.resource_current_state_loaded(resource, action, current));
    }

    fn resource_bypassed(&self, resource: &Resource, action: &Action, skipped: &ConvergeAction) {
        self.each(|s| s.resource_bypassed(resource, action, skipped));
    }

    fn resource_update_applied(
        &self,
        resource: &Resource,
        action: &Action,
        update: &ConvergeAction,
    ) {
        self.each(|s| s.resource_update_applied(resource, action, update));
    }

    fn resource_updated(&self, resource: &Resource, action: &Action) {
        self.each(|s| s.resource_updated(resource, action));
    }

    fn resource_up_to_date(&self, resource: &Resource, action: &Action) {
        self.each(|s| s.resource_up_to_date(resource, action));
    }

    fn resource_failed(&self, resource: &Resource, action: &Action, error: &anyhow::Error) {
        self.each(|s| s.resource_failed(resource, action, error));
    }

    fn resource_completed(&self, resource: &Resource, action: &Action) {
        self.each(|s| s.resource_completed(resource, action));
    }
}

/// Subscriber that records event names, for tests
#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingEvents {
    pub(crate) seen: std::cell::RefCell<Vec<String>>,
}

#[cfg(test)]
impl RecordingEvents {
    pub(crate) fn names(&self) -> Vec<String> {
        self.seen.borrow().clone()
    }

    fn push(&self, event: String) {
        self.seen.borrow_mut().push(event);
    }
}

#[cfg(test)]
impl EventHandler for RecordingEvents {
    fn resource_action_start(&self, resource: &Resource, action: &Action) {
        self.push(format!("start {resource} {action}"));
    }

    fn resource_current_state_loaded(
        &self,
        _resource: &Resource,
        _action: &Action,
        current: Option<&Resource>,
    ) {
        self.push(format!("loaded current={}", current.is_some()));
    }

    fn resource_bypassed(&self, _resource: &Resource, _action: &Action, skipped: &ConvergeAction) {
        self.push(format!("bypassed '{}'", skipped.description()));
    }

    fn resource_update_applied(
        &self,
        _resource: &Resource,
        _action: &Action,
        update: &ConvergeAction,
    ) {
        self.push(format!(
            "applied '{}' executed={}",
            update.description(),
            update.is_executed()
        ));
    }

    fn resource_updated(&self, _resource: &Resource, _action: &Action) {
        self.push("updated".to_string());
    }

    fn resource_up_to_date(&self, _resource: &Resource, _action: &Action) {
        self.push("up_to_date".to_string());
    }

    fn resource_failed(&self, _resource: &Resource, _action: &Action, error: &anyhow::Error) {
        self.push(format!("failed: {error}"));
    }

    fn resource_completed(&self, _resource: &Resource, _action: &Action) {
        self.push("completed".to_string());
    }
}
