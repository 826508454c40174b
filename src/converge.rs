//! Converge actions and the per-invocation queue that executes them
//!
//! A converge action is one described mutation. The queue is the executor:
//! it receives the description and the body together, decides from the
//! why-run mode whether the body runs now or is discarded, and keeps only
//! the resulting record. Bodies run inline, so handler code stays linear
//! while the queue still counts what happened.

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Record of one mutation declared through `converge_by`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvergeAction {
    description: String,
    executed: bool,
}

impl ConvergeAction {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            executed: false,
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Whether the body actually ran
    pub fn is_executed(&self) -> bool {
        self.executed
    }
}

/// Ordered queue of converge actions for one provider invocation
#[derive(Debug, Default)]
pub struct ConvergeActions {
    actions: Vec<ConvergeAction>,
}

impl ConvergeActions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Execute or simulate `body`, then queue its record.
    ///
    /// In why-run mode the body is dropped unrun. Otherwise it runs before
    /// this returns; if it fails nothing is queued and the error is returned
    /// as-is.
    pub fn add_action<F>(
        &mut self,
        description: impl Into<String>,
        why_run: bool,
        body: F,
    ) -> Result<&ConvergeAction>
    where
        F: FnOnce() -> Result<()>,
    {
        let mut action = ConvergeAction::new(description);

        if why_run {
            log::info!("Would {}", action.description);
        } else {
            body()?;
            action.executed = true;
            log::info!("- {}", action.description);
        }

        self.actions.push(action);
        Ok(&self.actions[self.actions.len() - 1])
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConvergeAction> {
        self.actions.iter()
    }

    /// Number of queued actions whose body ran
    pub fn executed_count(&self) -> usize {
        self.actions.iter().filter(|a| a.executed).count()
    }

    pub fn any_executed(&self) -> bool {
        self.actions.iter().any(|a| a.executed)
    }

    /// Empty the queue, returning what it held
    pub fn drain(&mut self) -> Vec<ConvergeAction> {
        std::mem::take(&mut self.actions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_body_runs_inline() {
        let ran = Cell::new(false);
        let mut queue = ConvergeActions::new();

        let action = queue
            .add_action("create the thing", false, || {
                ran.set(true);
                Ok(())
            })
            .unwrap();

        assert!(action.is_executed());
        assert!(ran.get());
        assert_eq!(queue.len(), 1);
        assert!(queue.any_executed());
    }

    #[test]
    fn test_why_run_discards_body() {
        let ran = Cell::new(false);
        let mut queue = ConvergeActions::new();

        let action = queue
            .add_action("create the thing", true, || {
                ran.set(true);
                Ok(())
            })
            .unwrap();

        assert!(!action.is_executed());
        assert!(!ran.get());
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.executed_count(), 0);
    }

    #[test]
    fn test_actions_run_in_call_order() {
        let order = std::cell::RefCell::new(Vec::new());
        let mut queue = ConvergeActions::new();

        for step in ["first", "second", "third"] {
            queue
                .add_action(step, false, || {
                    order.borrow_mut().push(step);
                    Ok(())
                })
                .unwrap();
        }

        assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
        let described: Vec<&str> = queue.iter().map(ConvergeAction::description).collect();
        assert_eq!(described, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_failed_body_is_not_queued() {
        let mut queue = ConvergeActions::new();
        queue.add_action("ok", false, || Ok(())).unwrap();

        let err = queue
            .add_action("boom", false, || anyhow::bail!("disk full"))
            .unwrap_err();

        assert_eq!(err.to_string(), "disk full");
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.executed_count(), 1);
    }

    #[test]
    fn test_drain_empties_queue() {
        let mut queue = ConvergeActions::new();
        queue.add_action("a", false, || Ok(())).unwrap();
        queue.add_action("b", true, || Ok(())).unwrap();

        let drained = queue.drain();
        assert_eq!(drained.len(), 2);
        assert!(queue.is_empty());
    }
}
