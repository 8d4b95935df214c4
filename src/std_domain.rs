//! The standard domain: documents, section labels and glossary terms.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::diagnostics::{Category, Diagnostics};
use crate::domains::{Domain, NoUri, XrefContext};
use crate::error::Error;
use crate::project::docname_join;
use crate::tree::{self, Element, Node, PendingReference, tag};

/// Schema version of the exported data.
const DATA_VERSION: u32 = 1;

/// Where a label or term points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelTarget {
    /// Element identifier inside the document (may be empty for the document itself).
    pub anchor: String,
    /// Docname the target lives in.
    pub docname: String,
    /// Display title.
    pub title: String,
}

/// The standard domain.
#[derive(Debug, Clone, Default)]
pub struct StandardDomain {
    /// Persisted symbol tables.
    data: StdData,
    /// Labels defined twice during this run: `(label, first docname, second docname)`.
    duplicates: Vec<(String, String, String)>,
}

/// Symbol tables of the standard domain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct StdData {
    /// Section labels keyed by lowercase label name.
    #[serde(default)]
    labels: BTreeMap<String, LabelTarget>,
    /// Glossary terms keyed by lowercase term text.
    #[serde(default)]
    terms: BTreeMap<String, LabelTarget>,
}

impl StandardDomain {
    /// Look up a label.
    pub fn label(&self, name: &str) -> Option<&LabelTarget> {
        return self.data.labels.get(&name.to_lowercase());
    }

    /// Link to a document, with `{document title}` as text unless the author gave one.
    fn resolve_doc(&self, ctx: &XrefContext<'_>, pending: &PendingReference, fallback: &Node) -> Option<Node> {
        let docname = docname_join(ctx.refdoc, &pending.target);
        let record = ctx.inventory.record(&docname)?;
        let caption = if pending.is_explicit() {
            fallback.astext()
        } else {
            record.title.as_ref().map_or_else(|| return docname.clone(), Node::astext)
        };
        let inner = Element::new(tag::INLINE).with_class("doc").with_child(Node::text(&caption));
        return Some(make_refnode(ctx, &docname, "", inner.into(), &caption));
    }

    /// Link to a section label.
    fn resolve_ref(&self, ctx: &XrefContext<'_>, pending: &PendingReference, fallback: &Node) -> Option<Node> {
        let target = self.label(&pending.target)?;
        let inner = if pending.is_explicit() {
            fallback.clone()
        } else {
            Element::new(tag::INLINE)
                .with_class("std")
                .with_class("std-ref")
                .with_child(Node::text(&target.title))
                .into()
        };
        return Some(make_refnode(ctx, &target.docname, &target.anchor, inner, &target.title));
    }

    /// Link to a glossary term, keeping the author's content.
    fn resolve_term(&self, ctx: &XrefContext<'_>, pending: &PendingReference, fallback: &Node) -> Option<Node> {
        let target = self.data.terms.get(&pending.target.to_lowercase())?;
        return Some(make_refnode(ctx, &target.docname, &target.anchor, fallback.clone(), &target.title));
    }
}

impl Domain for StandardDomain {
    fn boxed_clone(&self) -> Box<dyn Domain> {
        return Box::new(self.clone());
    }

    fn check_consistency(&self, diagnostics: &mut Diagnostics) {
        for (label, first, second) in &self.duplicates {
            diagnostics.warn(
                Category::DomainConsistency,
                Some(second),
                format!("duplicate label {label}, other instance in {first}"),
            );
        }
        return;
    }

    fn clear_doc(&mut self, docname: &str) {
        self.data.labels.retain(|_, t| return t.docname != docname);
        self.data.terms.retain(|_, t| return t.docname != docname);
        self.duplicates.retain(|(_, _, second)| return second != docname);
        return;
    }

    fn dangling_warning(&self, kind: &str) -> Option<&'static str> {
        return match kind {
            "doc" => Some("unknown document: '{target}'"),
            "ref" => Some("undefined label: '{target}'"),
            _ => None,
        };
    }

    fn data_version(&self) -> u32 {
        return DATA_VERSION;
    }

    fn export_data(&self) -> Result<serde_json::Value, Error> {
        return Ok(serde_json::to_value(&self.data)?);
    }

    fn import_data(&mut self, data: serde_json::Value) -> Result<(), Error> {
        self.data = serde_json::from_value(data).map_err(|e| {
            return Error::DomainData {
                domain: "std".to_string(),
                reason: e.to_string(),
            };
        })?;
        return Ok(());
    }

    fn merge_domain_data(&mut self, docnames: &BTreeSet<String>, other: &serde_json::Value) -> Result<(), Error> {
        let theirs: StdData = serde_json::from_value(other.clone()).map_err(|e| {
            return Error::DomainData {
                domain: "std".to_string(),
                reason: e.to_string(),
            };
        })?;
        for (key, target) in theirs.labels {
            if docnames.contains(&target.docname) {
                self.data.labels.insert(key, target);
            }
        }
        for (key, target) in theirs.terms {
            if docnames.contains(&target.docname) {
                self.data.terms.insert(key, target);
            }
        }
        return Ok(());
    }

    fn name(&self) -> &str {
        return "std";
    }

    fn process_doc(&mut self, docname: &str, tree: &Element) {
        for el in tree::find_elements(tree, &|el| return el.attr("label").is_some()) {
            let Some(label) = el.attr("label") else {
                continue;
            };
            let key = label.to_lowercase();
            if let Some(existing) = self.data.labels.get(&key) {
                if existing.docname != docname {
                    self.duplicates.push((label.to_string(), existing.docname.clone(), docname.to_string()));
                    continue;
                }
            }
            let title = el
                .children
                .iter()
                .filter_map(Node::as_element)
                .find(|c| return c.tag == tag::TITLE)
                .map_or_else(|| return el.astext(), Element::astext);
            self.data.labels.insert(key, LabelTarget {
                anchor: el.ids.first().cloned().unwrap_or_default(),
                docname: docname.to_string(),
                title,
            });
        }
        for el in tree::find_elements(tree, &|el| return el.tag == tag::TERM) {
            let text = el.astext();
            self.data.terms.insert(text.to_lowercase(), LabelTarget {
                anchor: el.ids.first().cloned().unwrap_or_default(),
                docname: docname.to_string(),
                title: text,
            });
        }
        return;
    }

    fn resolve_any_xref(
        &self,
        ctx: &XrefContext<'_>,
        pending: &PendingReference,
        fallback: &Node,
    ) -> Vec<(String, Node)> {
        let mut results = Vec::new();
        if let Some(node) = self.resolve_ref(ctx, pending, fallback) {
            results.push(("std:ref".to_string(), node));
        }
        if let Some(node) = self.resolve_term(ctx, pending, fallback) {
            results.push(("std:term".to_string(), node));
        }
        return results;
    }

    fn resolve_xref(
        &self,
        ctx: &XrefContext<'_>,
        kind: &str,
        pending: &PendingReference,
        fallback: &Node,
    ) -> Result<Option<Node>, NoUri> {
        return Ok(match kind {
            "doc" => self.resolve_doc(ctx, pending, fallback),
            "ref" => self.resolve_ref(ctx, pending, fallback),
            "term" => self.resolve_term(ctx, pending, fallback),
            _ => None,
        });
    }

    fn roles(&self) -> &[&'static str] {
        return &["doc", "ref", "term"];
    }
}

/// Internal reference node linking `ctx.refdoc` to `docname#anchor`.
fn make_refnode(ctx: &XrefContext<'_>, docname: &str, anchor: &str, child: Node, title: &str) -> Node {
    let mut uri = if docname == ctx.refdoc && !anchor.is_empty() {
        String::new()
    } else {
        ctx.renderer.relative_uri(ctx.refdoc, docname)
    };
    if !anchor.is_empty() {
        uri.push('#');
        uri.push_str(anchor);
    }
    return Element::new(tag::REFERENCE)
        .with_attr("internal", "true")
        .with_attr("refuri", &uri)
        .with_attr("reftitle", title)
        .with_child(child)
        .into();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labelled_tree() -> Element {
        return Element::new(tag::DOCUMENT).with_child(
            Element::new(tag::SECTION)
                .with_attr("label", "Install")
                .with_id("install")
                .with_child(Element::new(tag::TITLE).with_child(Node::text("Installing")).into())
                .with_child(Element::new(tag::TERM).with_id("term-wheel").with_child(Node::text("Wheel")).into())
                .into(),
        );
    }

    #[test]
    fn process_doc_collects_labels_and_terms() {
        let mut std = StandardDomain::default();
        std.process_doc("guide", &labelled_tree());
        let label = std.label("install").unwrap();
        assert_eq!(label.docname, "guide");
        assert_eq!(label.anchor, "install");
        assert_eq!(label.title, "Installing");
        assert!(std.data.terms.contains_key("wheel"));

        std.clear_doc("guide");
        assert!(std.label("install").is_none());
        assert!(std.data.terms.is_empty());
    }

    #[test]
    fn duplicate_labels_are_reported() {
        let mut std = StandardDomain::default();
        std.process_doc("a", &labelled_tree());
        std.process_doc("b", &labelled_tree());
        let mut diagnostics = Diagnostics::default();
        std.check_consistency(&mut diagnostics);
        assert_eq!(diagnostics.of(Category::DomainConsistency).len(), 1);
        assert_eq!(std.label("install").unwrap().docname, "a");
    }

    #[test]
    fn merge_takes_only_requested_docnames() {
        let mut worker = StandardDomain::default();
        worker.process_doc("a", &labelled_tree());
        let mut main = StandardDomain::default();
        let exported = worker.export_data().unwrap();
        main.merge_domain_data(&BTreeSet::new(), &exported).unwrap();
        assert!(main.label("install").is_none());
        main.merge_domain_data(&std::iter::once("a".to_string()).collect(), &exported).unwrap();
        assert!(main.label("install").is_some());
    }

    #[test]
    fn import_rejects_garbage() {
        let mut std = StandardDomain::default();
        let err = std.import_data(serde_json::json!({"labels": 3})).unwrap_err();
        assert!(matches!(err, Error::DomainData { .. }));
    }
}
