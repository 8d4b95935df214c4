//! Extension hooks fired by the inventory and the resolution pipeline.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::diagnostics::Diagnostics;
use crate::domains::{Domain, NoUri};
use crate::inventory::Inventory;
use crate::tree::{Element, Node, PendingReference};

/// A hook implementation. Every method has a no-op default, so a listener only
/// overrides the events it cares about.
pub trait Listener: Send + Sync {
    /// `document-resolved`: a tree finished post-parse resolution.
    fn document_resolved(&self, _tree: &mut Element, _docname: &str) {}

    /// `env-check-consistency`: all documents are read and checked.
    fn env_check_consistency(&self, _inventory: &Inventory, _diagnostics: &mut Diagnostics) {}

    /// `env-get-updated`: extra docnames that must be rewritten.
    fn env_get_updated(&self, _inventory: &Inventory) -> Vec<String> {
        return Vec::new();
    }

    /// `env-merge-info`: a worker batch was merged into the coordinator.
    fn env_merge_info(&self, _inventory: &mut Inventory, _docnames: &BTreeSet<String>, _other: &Inventory) {}

    /// `missing-reference`: last chance to resolve a reference nothing else could.
    ///
    /// # Errors
    ///
    /// Returns `NoUri` to mark the reference as having no resolvable target.
    fn missing_reference(
        &self,
        _inventory: &Inventory,
        _pending: &PendingReference,
        _fallback: &Node,
    ) -> Result<Option<Node>, NoUri> {
        return Ok(None);
    }

    /// `warn-missing-reference`: return `true` to suppress the warning.
    fn warn_missing_reference(&self, _domain: Option<&dyn Domain>, _pending: &PendingReference) -> bool {
        return false;
    }
}

/// Registered listeners, called in registration order.
#[derive(Clone, Default)]
pub struct EventManager {
    /// Listeners in registration order.
    listeners: Vec<Arc<dyn Listener>>,
}

impl std::fmt::Debug for EventManager {
    /// Listeners are opaque; only their number is shown.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        return f.debug_struct("EventManager").field("listeners", &self.listeners.len()).finish();
    }
}

impl EventManager {
    /// Add a listener.
    pub fn connect(&mut self, listener: Arc<dyn Listener>) {
        self.listeners.push(listener);
        return;
    }

    /// Fire `document-resolved`.
    pub fn document_resolved(&self, tree: &mut Element, docname: &str) {
        for listener in &self.listeners {
            listener.document_resolved(tree, docname);
        }
        return;
    }

    /// Fire `env-check-consistency`.
    pub fn env_check_consistency(&self, inventory: &Inventory, diagnostics: &mut Diagnostics) {
        for listener in &self.listeners {
            listener.env_check_consistency(inventory, diagnostics);
        }
        return;
    }

    /// Fire `env-get-updated` and concatenate every listener's answer.
    pub fn env_get_updated(&self, inventory: &Inventory) -> Vec<String> {
        return self
            .listeners
            .iter()
            .flat_map(|l| return l.env_get_updated(inventory))
            .collect();
    }

    /// Fire `env-merge-info`.
    pub fn env_merge_info(&self, inventory: &mut Inventory, docnames: &BTreeSet<String>, other: &Inventory) {
        for listener in &self.listeners {
            listener.env_merge_info(inventory, docnames, other);
        }
        return;
    }

    /// Fire `missing-reference`; the first listener with an answer wins.
    ///
    /// # Errors
    ///
    /// Returns `NoUri` as soon as a listener signals it.
    pub fn missing_reference(
        &self,
        inventory: &Inventory,
        pending: &PendingReference,
        fallback: &Node,
    ) -> Result<Option<Node>, NoUri> {
        for listener in &self.listeners {
            if let Some(node) = listener.missing_reference(inventory, pending, fallback)? {
                return Ok(Some(node));
            }
        }
        return Ok(None);
    }

    /// Fire `warn-missing-reference`; any listener may suppress the warning.
    pub fn warn_missing_reference(&self, domain: Option<&dyn Domain>, pending: &PendingReference) -> bool {
        return self
            .listeners
            .iter()
            .any(|l| return l.warn_missing_reference(domain, pending));
    }
}
