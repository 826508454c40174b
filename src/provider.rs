//! Provider: converges one resource for one action
//!
//! A concrete provider supplies a [`ProviderBehavior`]: how to inspect the
//! current system state, whether its handlers are safe to run in why-run
//! mode, and an [`ActionTable`] mapping action names to handlers. The
//! engine ([`Provider`]) owns the lifecycle around those handlers:
//!
//! 1. Load the current state
//! 2. Resolve the handler for the requested action
//! 3. Run it, or bypass it entirely in why-run mode when the behaviour
//!    cannot simulate
//! 4. Mark the resource updated if any converge action executed
//! 5. Drain the converge-action queue
//!
//! Handlers declare every mutation through [`ProviderCore::converge_by`],
//! which runs the mutation immediately or, in why-run mode, only records it.

use crate::action::{Action, ActionHandler, ActionResult, ActionTable};
use crate::converge::{ConvergeAction, ConvergeActions};
use crate::error::ConvergeError;
use crate::events::EventHandler;
use crate::resource::{Resource, ResourceCollection, ResourceRef};
use crate::run_context::{Node, RunContext};
use crate::shell_out::{CommandOutput, ShellOut};
use anyhow::Result;
use std::rc::Rc;

/// What a concrete provider implements
pub trait ProviderBehavior: Sized {
    /// Inspect the system and record what exists via
    /// [`ProviderCore::set_current_resource`]
    fn load_current_resource(&mut self, core: &mut ProviderCore<'_>) -> Result<()>;

    /// Whether every mutation in the handlers goes through `converge_by`,
    /// making them safe to call in why-run mode
    fn whyrun_supported(&self) -> bool {
        false
    }

    /// Handlers for the actions this provider supports.
    ///
    /// `nothing` is always available and does not need registering.
    fn actions(&self) -> ActionTable<Self>;
}

/// Engine state shared with handlers
#[derive(Debug)]
pub struct ProviderCore<'a> {
    new_resource: ResourceRef,
    /// Stands in for `new_resource` in events while a handler holds it mutably
    snapshot: Resource,
    current_resource: Option<Resource>,
    run_context: &'a RunContext,
    action: Action,
    converge_actions: ConvergeActions,
}

impl<'a> ProviderCore<'a> {
    fn new(new_resource: ResourceRef, run_context: &'a RunContext, action: Action) -> Self {
        let snapshot = new_resource.borrow().clone();
        Self {
            new_resource,
            snapshot,
            current_resource: None,
            run_context,
            action,
            converge_actions: ConvergeActions::new(),
        }
    }

    /// The desired state being converged
    pub fn new_resource(&self) -> &ResourceRef {
        &self.new_resource
    }

    /// The observed state; `None` until `load_current_resource` sets it
    pub fn current_resource(&self) -> Option<&Resource> {
        self.current_resource.as_ref()
    }

    pub fn set_current_resource(&mut self, resource: Resource) {
        self.current_resource = Some(resource);
    }

    pub fn run_context(&self) -> &'a RunContext {
        self.run_context
    }

    pub fn node(&self) -> &'a Node {
        self.run_context.node()
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    pub fn why_run(&self) -> bool {
        self.run_context.why_run()
    }

    pub fn converge_actions(&self) -> &ConvergeActions {
        &self.converge_actions
    }

    fn with_new_resource<R>(&self, f: impl FnOnce(&Resource) -> R) -> R {
        match self.new_resource.try_borrow() {
            Ok(resource) => f(&resource),
            Err(_) => f(&self.snapshot),
        }
    }

    /// Declare a mutation.
    ///
    /// Outside why-run mode `body` runs before this returns and its error,
    /// if any, is returned unchanged. In why-run mode the mutation is only
    /// recorded.
    pub fn converge_by<F>(&mut self, description: impl Into<String>, body: F) -> Result<()>
    where
        F: FnOnce() -> Result<()>,
    {
        let why_run = self.why_run();
        let update = self.converge_actions.add_action(description, why_run, body)?;
        let events = self.run_context.events();
        match self.new_resource.try_borrow() {
            Ok(resource) => events.resource_update_applied(&resource, &self.action, update),
            Err(_) => events.resource_update_applied(&self.snapshot, &self.action, update),
        }
        Ok(())
    }

    /// Evaluate `body` against a fresh, empty resource collection.
    ///
    /// The run context's previous collection is restored however `body`
    /// exits. Returns whatever `body` returns.
    pub fn recipe_eval<T, F>(&self, body: F) -> Result<T>
    where
        F: FnOnce(&RunContext) -> Result<T>,
    {
        let _scope = self
            .run_context
            .scoped_collection(ResourceCollection::new().shared());
        self.with_new_resource(|resource| {
            log::debug!("Evaluating embedded recipe for {resource}");
        });
        body(self.run_context)
    }

    /// Run a command with the configured locale; a non-zero exit is not an error
    pub fn shell_out(&self, cmd: &str, args: &[&str]) -> Result<CommandOutput> {
        ShellOut::new(self.run_context.shell_out_config()).run(cmd, args)
    }

    /// Run a command with the configured locale and fail on a non-zero exit
    pub fn shell_out_checked(&self, cmd: &str, args: &[&str]) -> Result<CommandOutput> {
        ShellOut::new(self.run_context.shell_out_config()).run_checked(cmd, args)
    }

    /// Run a command without overriding the locale
    pub fn shell_out_with_systems_locale(&self, cmd: &str, args: &[&str]) -> Result<CommandOutput> {
        ShellOut::new(self.run_context.shell_out_config()).run_with_systems_locale(cmd, args)
    }
}

enum Dispatch {
    Handled,
    Bypassed,
}

/// A concrete provider bound to one resource and one action
pub struct Provider<'a, B: ProviderBehavior> {
    behavior: B,
    actions: ActionTable<B>,
    core: ProviderCore<'a>,
}

impl<'a, B: ProviderBehavior> Provider<'a, B> {
    pub fn new(
        behavior: B,
        new_resource: ResourceRef,
        run_context: &'a RunContext,
        action: impl Into<Action>,
    ) -> Self {
        let actions = behavior.actions();
        Self {
            behavior,
            actions,
            core: ProviderCore::new(new_resource, run_context, action.into()),
        }
    }

    pub fn behavior(&self) -> &B {
        &self.behavior
    }

    pub fn behavior_mut(&mut self) -> &mut B {
        &mut self.behavior
    }

    pub fn core(&self) -> &ProviderCore<'a> {
        &self.core
    }

    pub fn whyrun_supported(&self) -> bool {
        self.behavior.whyrun_supported()
    }

    pub fn new_resource(&self) -> &ResourceRef {
        self.core.new_resource()
    }

    pub fn current_resource(&self) -> Option<&Resource> {
        self.core.current_resource()
    }

    pub fn run_context(&self) -> &'a RunContext {
        self.core.run_context()
    }

    pub fn node(&self) -> &'a Node {
        self.core.node()
    }

    pub fn action(&self) -> &Action {
        self.core.action()
    }

    pub fn converge_actions(&self) -> &ConvergeActions {
        self.core.converge_actions()
    }

    /// The universal no-op action
    pub fn action_nothing(&self) -> bool {
        self.core
            .with_new_resource(|resource| log::debug!("Doing nothing for {resource}"));
        true
    }

    /// Call the handler for `action` directly, outside the `run_action`
    /// lifecycle: no state loading, no flag update, no draining.
    pub fn invoke_action(&mut self, action: &Action) -> Result<()> {
        match self.resolve(action)? {
            Some(handler) => handler(&mut self.behavior, &mut self.core),
            None => {
                self.action_nothing();
                Ok(())
            }
        }
    }

    /// Rebind the action, then [`run_action`](Self::run_action)
    pub fn run(&mut self, action: impl Into<Action>) -> Result<ActionResult> {
        self.core.action = action.into();
        self.run_action()
    }

    /// Converge the resource for the bound action.
    ///
    /// The converge-action queue is empty when this returns, whatever the
    /// outcome. On failure the resource still counts the converge actions
    /// that executed before the error, and the error is returned unchanged.
    pub fn run_action(&mut self) -> Result<ActionResult> {
        let action = self.core.action.clone();
        let resource = Rc::clone(&self.core.new_resource);
        let run_context = self.core.run_context;
        let events = run_context.events();

        resource.borrow_mut().set_updated_by_last_action(false);
        self.core.snapshot = resource.borrow().clone();
        log::debug!("Processing {} action {}", resource.borrow(), action);
        events.resource_action_start(&resource.borrow(), &action);

        let outcome = self.dispatch(&action);

        let applied = self.core.converge_actions.executed_count();
        let pending = self.core.converge_actions.len() - applied;
        if applied > 0 {
            resource.borrow_mut().set_updated_by_last_action(true);
        }
        self.core.converge_actions.drain();

        let dispatched = match outcome {
            Ok(dispatched) => dispatched,
            Err(err) => {
                log::debug!("{} action {} failed: {err:#}", resource.borrow(), action);
                events.resource_failed(&resource.borrow(), &action, &err);
                return Err(err);
            }
        };

        if applied > 0 {
            log::info!("{} updated by action {}", resource.borrow(), action);
            events.resource_updated(&resource.borrow(), &action);
        } else {
            log::debug!("{} up to date", resource.borrow());
            events.resource_up_to_date(&resource.borrow(), &action);
        }
        events.resource_completed(&resource.borrow(), &action);

        Ok(match dispatched {
            Dispatch::Bypassed => ActionResult::Bypassed,
            Dispatch::Handled if applied > 0 => ActionResult::Updated { applied },
            Dispatch::Handled if pending > 0 => ActionResult::Simulated { pending },
            Dispatch::Handled => ActionResult::UpToDate,
        })
    }

    /// Evaluate `body` against a fresh resource collection, see
    /// [`ProviderCore::recipe_eval`]
    pub fn recipe_eval<T, F>(&self, body: F) -> Result<T>
    where
        F: FnOnce(&RunContext) -> Result<T>,
    {
        self.core.recipe_eval(body)
    }

    fn dispatch(&mut self, action: &Action) -> Result<Dispatch> {
        let run_context = self.core.run_context;

        self.behavior.load_current_resource(&mut self.core)?;
        run_context.events().resource_current_state_loaded(
            &self.core.new_resource.borrow(),
            action,
            self.core.current_resource.as_ref(),
        );

        let handler = self.resolve(action)?;

        if run_context.why_run() && !self.behavior.whyrun_supported() {
            // The whole action stands in for one converge action, which
            // why-run discards without queueing.
            let resource = self.core.new_resource.borrow();
            let skipped = ConvergeAction::new(format!("{action} {resource}"));
            log::info!(
                "Would {} (provider does not support why-run, action skipped)",
                skipped.description()
            );
            run_context
                .events()
                .resource_bypassed(&resource, action, &skipped);
            return Ok(Dispatch::Bypassed);
        }

        match handler {
            Some(handler) => handler(&mut self.behavior, &mut self.core)?,
            None => {
                self.action_nothing();
            }
        }
        Ok(Dispatch::Handled)
    }

    /// `Ok(None)` means the built-in `nothing`
    fn resolve(&self, action: &Action) -> Result<Option<ActionHandler<B>>> {
        if let Some(handler) = self.actions.get(action) {
            return Ok(Some(handler));
        }
        if action.is_nothing() {
            return Ok(None);
        }
        Err(ConvergeError::NoSuchAction {
            action: action.to_string(),
            resource: self.core.new_resource.borrow().key(),
        }
        .into())
    }
}

impl<B: ProviderBehavior + std::fmt::Debug> std::fmt::Debug for Provider<'_, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("behavior", &self.behavior)
            .field("actions", &self.actions)
            .field("core", &self.core)
            .finish()
    }
}
