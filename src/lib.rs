//! # converge
//!
//! The convergence-action engine: brings one declarative resource into
//! compliance by running one imperative provider action, while tracking
//! whether anything actually changed.
//!
//! ## Core Concepts
//!
//! - **Resource**: a desired-state record with `updated` and
//!   `updated_by_last_action` flags
//! - **ResourceCollection**: the ordered resources of a run
//! - **RunContext**: node, cookbooks, event sink, why-run mode and the one
//!   active resource collection
//! - **Provider**: converges a resource for one action through a
//!   [`ProviderBehavior`] supplied by the concrete provider
//! - **ConvergeAction**: one described mutation, executed immediately or,
//!   in why-run mode, only recorded
//!
//! ## Example
//!
//! ```
//! use converge::{
//!     ActionResult, ActionTable, CookbookCollection, EventDispatcher, Node, Provider,
//!     ProviderBehavior, ProviderCore, Resource, RunContext,
//! };
//!
//! #[derive(Default)]
//! struct Motd {
//!     written: bool,
//! }
//!
//! impl Motd {
//!     fn action_create(&mut self, core: &mut ProviderCore<'_>) -> anyhow::Result<()> {
//!         core.converge_by("write /etc/motd", || {
//!             self.written = true;
//!             Ok(())
//!         })
//!     }
//! }
//!
//! impl ProviderBehavior for Motd {
//!     fn load_current_resource(&mut self, _core: &mut ProviderCore<'_>) -> anyhow::Result<()> {
//!         Ok(())
//!     }
//!
//!     fn whyrun_supported(&self) -> bool {
//!         true
//!     }
//!
//!     fn actions(&self) -> ActionTable<Self> {
//!         ActionTable::new().on("create", Self::action_create)
//!     }
//! }
//!
//! let run_context = RunContext::new(
//!     Node::new("latte"),
//!     CookbookCollection::default(),
//!     EventDispatcher::new(),
//! );
//! let resource = Resource::typed("file", "/etc/motd").into_ref();
//!
//! let mut provider = Provider::new(Motd::default(), resource.clone(), &run_context, "create");
//! assert_eq!(provider.run_action()?, ActionResult::Updated { applied: 1 });
//! assert!(resource.borrow().is_updated());
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Why-run
//!
//! With [`RunContext::set_why_run`] (or `why_run = true` in [`Config`]),
//! providers that declare why-run support have their `converge_by` bodies
//! recorded but not run; providers that do not are skipped entirely.

pub mod action;
pub mod config;
pub mod converge;
pub mod error;
pub mod events;
pub mod logging;
pub mod provider;
pub mod resource;
pub mod run_context;
pub mod shell_out;

// Re-export main types at crate root
pub use action::{Action, ActionHandler, ActionResult, ActionTable};
pub use config::Config;
pub use converge::{ConvergeAction, ConvergeActions};
pub use error::ConvergeError;
pub use events::{EventDispatcher, EventHandler};
pub use logging::init_logging;
pub use provider::{Provider, ProviderBehavior, ProviderCore};
pub use resource::{Resource, ResourceCollection, ResourceRef, SharedCollection};
pub use run_context::{CollectionScope, Cookbook, CookbookCollection, Node, RunContext};
pub use shell_out::{CommandOutput, ShellOut, ShellOutConfig};
