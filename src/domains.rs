//! Domain plugin contract and the registry that dispatches to domains by name.

use std::collections::{BTreeMap, BTreeSet};

use crate::diagnostics::Diagnostics;
use crate::error::Error;
use crate::inventory::Inventory;
use crate::transforms::Renderer;
use crate::tree::{Element, Node, PendingReference};

/// Signal that a reference has no resolvable target for the active renderer.
/// Treated as "unresolved", never as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoUri;

/// What a domain sees while resolving one reference.
#[derive(Clone, Copy)]
pub struct XrefContext<'a> {
    /// The inventory, for document titles and known docnames.
    pub inventory: &'a Inventory,
    /// Docname the reference appears in.
    pub refdoc: &'a str,
    /// Renderer the tree is being resolved for.
    pub renderer: &'a Renderer,
}

/// A subject-specific plugin owning its own symbol tables and reference semantics.
pub trait Domain: Send + Sync + std::fmt::Debug {
    /// Clone behind a box, so registries can be copied for parallel workers.
    fn boxed_clone(&self) -> Box<dyn Domain>;

    /// Report inconsistencies in the domain's data after all documents are read.
    fn check_consistency(&self, _diagnostics: &mut Diagnostics) {}

    /// Forget everything recorded for `docname`.
    fn clear_doc(&mut self, docname: &str);

    /// Message template for an unresolved reference of `kind`; `{target}` is substituted.
    fn dangling_warning(&self, _kind: &str) -> Option<&'static str> {
        return None;
    }

    /// Schema version of the exported data; part of the inventory version stamp.
    fn data_version(&self) -> u32;

    /// Serialize the domain's data for the inventory snapshot.
    ///
    /// # Errors
    ///
    /// Returns `Error::DomainData` or `Error::Json` if the data cannot be exported.
    fn export_data(&self) -> Result<serde_json::Value, Error>;

    /// Replace the domain's data with previously exported data.
    ///
    /// # Errors
    ///
    /// Returns `Error::DomainData` or `Error::Json` if the data does not decode.
    fn import_data(&mut self, data: serde_json::Value) -> Result<(), Error>;

    /// Merge the entries `other` (exported by a worker's copy) holds for `docnames`.
    ///
    /// # Errors
    ///
    /// Returns `Error::DomainData` or `Error::Json` if `other` does not decode.
    fn merge_domain_data(&mut self, docnames: &BTreeSet<String>, other: &serde_json::Value) -> Result<(), Error>;

    /// Registry key, e.g. `std`.
    fn name(&self) -> &str;

    /// Collect domain data from a freshly parsed document.
    fn process_doc(&mut self, _docname: &str, _tree: &Element) {}

    /// Candidates for a generic `any` reference, each labelled `domain:role`.
    /// The default tries every role the domain recognizes, in order.
    fn resolve_any_xref(
        &self,
        ctx: &XrefContext<'_>,
        pending: &PendingReference,
        fallback: &Node,
    ) -> Vec<(String, Node)> {
        let mut results = Vec::new();
        for role in self.roles() {
            if let Ok(Some(node)) = self.resolve_xref(ctx, role, pending, fallback) {
                results.push((format!("{}:{role}", self.name()), node));
            }
        }
        return results;
    }

    /// Resolve a reference of a specific `kind`.
    ///
    /// # Errors
    ///
    /// Returns `NoUri` when the target exists but cannot be linked for this renderer.
    fn resolve_xref(
        &self,
        ctx: &XrefContext<'_>,
        kind: &str,
        pending: &PendingReference,
        fallback: &Node,
    ) -> Result<Option<Node>, NoUri>;

    /// Reference kinds (roles) the domain recognizes.
    fn roles(&self) -> &[&'static str];
}

/// Domains keyed by name; iteration is in name order.
#[derive(Debug, Default)]
pub struct DomainRegistry {
    /// Registered domains.
    domains: BTreeMap<String, Box<dyn Domain>>,
}

impl Clone for DomainRegistry {
    /// Deep copy through [`Domain::boxed_clone`].
    fn clone(&self) -> Self {
        return Self {
            domains: self
                .domains
                .iter()
                .map(|(name, domain)| return (name.clone(), domain.boxed_clone()))
                .collect(),
        };
    }
}

impl DomainRegistry {
    /// Forget `docname` in every domain.
    pub fn clear_doc(&mut self, docname: &str) {
        for domain in self.domains.values_mut() {
            domain.clear_doc(docname);
        }
        return;
    }

    /// Whether a domain is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        return self.domains.contains_key(name);
    }

    /// Export every domain's data, keyed by name.
    ///
    /// # Errors
    ///
    /// Propagates the first export failure.
    pub fn export_all(&self) -> Result<BTreeMap<String, serde_json::Value>, Error> {
        let mut out = BTreeMap::new();
        for (name, domain) in &self.domains {
            out.insert(name.clone(), domain.export_data()?);
        }
        return Ok(out);
    }

    /// Look a domain up by name.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownDomain` if no domain has that name.
    pub fn get(&self, name: &str) -> Result<&dyn Domain, Error> {
        return self
            .domains
            .get(name)
            .map(|d| return d.as_ref())
            .ok_or_else(|| return Error::UnknownDomain { name: name.to_string() });
    }

    /// Mutable lookup by name.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownDomain` if no domain has that name.
    pub fn get_mut(&mut self, name: &str) -> Result<&mut (dyn Domain + 'static), Error> {
        return self
            .domains
            .get_mut(name)
            .map(|d| return d.as_mut())
            .ok_or_else(|| return Error::UnknownDomain { name: name.to_string() });
    }

    /// Import snapshot data for every registered domain that has some.
    ///
    /// # Errors
    ///
    /// Propagates the first import failure.
    pub fn import_all(&mut self, data: &BTreeMap<String, serde_json::Value>) -> Result<(), Error> {
        for (name, domain) in &mut self.domains {
            if let Some(value) = data.get(name) {
                domain.import_data(value.clone())?;
            }
        }
        return Ok(());
    }

    /// Domains in name order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Domain> {
        return self.domains.values().map(|d| return d.as_ref());
    }

    /// Merge a worker registry's data for `docnames` into this one.
    ///
    /// # Errors
    ///
    /// Propagates export or merge failures.
    pub fn merge_from(&mut self, docnames: &BTreeSet<String>, other: &DomainRegistry) -> Result<(), Error> {
        for (name, domain) in &mut self.domains {
            if let Some(theirs) = other.domains.get(name) {
                domain.merge_domain_data(docnames, &theirs.export_data()?)?;
            }
        }
        return Ok(());
    }

    /// Let every domain collect data from a parsed document.
    pub fn process_doc(&mut self, docname: &str, tree: &Element) {
        for domain in self.domains.values_mut() {
            domain.process_doc(docname, tree);
        }
        return;
    }

    /// Register a domain, replacing any previous one of the same name.
    pub fn register(&mut self, domain: Box<dyn Domain>) {
        self.domains.insert(domain.name().to_string(), domain);
        return;
    }

    /// `(name, data_version)` of every domain, for the version stamp.
    pub fn versions(&self) -> Vec<(String, u32)> {
        return self
            .domains
            .iter()
            .map(|(name, domain)| return (name.clone(), domain.data_version()))
            .collect();
    }

    /// A registry holding only the standard domain.
    pub fn with_standard() -> Self {
        let mut registry = Self::default();
        registry.register(Box::new(crate::std_domain::StandardDomain::default()));
        return registry;
    }
}
