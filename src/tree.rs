//! Parsed document trees: elements, text, and pending reference placeholders.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Well-known element tag names.
pub mod tag {
    /// Generic list container produced by navigation resolution.
    pub const BULLET_LIST: &str = "bullet_list";
    /// Empty placeholder left behind by visibility pruning.
    pub const COMMENT: &str = "comment";
    /// Paragraph variant used inside navigation entries.
    pub const COMPACT_PARAGRAPH: &str = "compact_paragraph";
    /// Wrapper around a resolved navigation tree.
    pub const COMPOUND: &str = "compound";
    /// Object description owned by a domain (`domain` attribute).
    pub const DESC: &str = "desc";
    /// Inline object description.
    pub const DESC_INLINE: &str = "desc_inline";
    /// Generic visitor name for the fine-grained signature family.
    pub const DESC_SIG_ELEMENT: &str = "desc_sig_element";
    /// Object signature line.
    pub const DESC_SIGNATURE: &str = "desc_signature";
    /// Root of a parsed document.
    pub const DOCUMENT: &str = "document";
    /// Generic inline span.
    pub const INLINE: &str = "inline";
    /// List entry.
    pub const LIST_ITEM: &str = "list_item";
    /// Inline literal text.
    pub const LITERAL: &str = "literal";
    /// Build-tag conditional (`expr` attribute).
    pub const ONLY: &str = "only";
    /// Plain paragraph.
    pub const PARAGRAPH: &str = "paragraph";
    /// Alternative fallback content attached to a pending reference.
    pub const PENDING_XREF_CONDITION: &str = "pending_xref_condition";
    /// Resolved reference.
    pub const REFERENCE: &str = "reference";
    /// Document section.
    pub const SECTION: &str = "section";
    /// Glossary term target.
    pub const TERM: &str = "term";
    /// Section or document title.
    pub const TITLE: &str = "title";
    /// One entry of a navigation placeholder (`docname`, optional `title`).
    pub const TOC_ENTRY: &str = "toc_entry";
    /// Navigation-tree placeholder.
    pub const TOCTREE: &str = "toctree";

    /// The fine-grained inline signature node family.
    pub const SIG_ELEMENTS: &[&str] = &[
        "desc_sig_keyword",
        "desc_sig_keyword_type",
        "desc_sig_literal_char",
        "desc_sig_literal_number",
        "desc_sig_literal_string",
        "desc_sig_name",
        "desc_sig_operator",
        "desc_sig_punctuation",
        "desc_sig_space",
    ];
}

/// A structural element of a parsed tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    /// Free-form attributes.
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
    /// Child nodes in document order.
    #[serde(default)]
    pub children: Vec<Node>,
    /// Style classes.
    #[serde(default)]
    pub classes: Vec<String>,
    /// Identifiers other nodes may reference.
    #[serde(default)]
    pub ids: Vec<String>,
    /// Element kind.
    pub tag: String,
}

/// Any node of a parsed tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    /// A structural element.
    Element(Element),
    /// An unresolved cross-document reference.
    PendingXref(PendingReference),
    /// Literal text.
    Text {
        /// The text content.
        text: String,
    },
}

/// Placeholder produced by the parser for a reference that still needs resolving.
/// Never persisted past resolution: the pipeline replaces it in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingReference {
    /// Extra attributes (`refexplicit`, `reftitle`, ...).
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
    /// Fallback content; the first child is the default display content.
    #[serde(default)]
    pub children: Vec<Node>,
    /// Explicit domain name, if the reference named one.
    #[serde(default)]
    pub domain: Option<String>,
    /// Reference kind (role), e.g. `doc`, `ref`, `any`.
    pub kind: String,
    /// Docname the reference appears in.
    #[serde(default)]
    pub refdoc: Option<String>,
    /// Set when the reference may resolve to its own document; retried once after clearing.
    #[serde(default)]
    pub self_referential: bool,
    /// Target identifier.
    pub target: String,
    /// Whether a failed resolution should warn even outside nitpicky mode.
    #[serde(default)]
    pub warn: bool,
}

impl Element {
    /// Concatenated text of all descendants.
    pub fn astext(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        return out;
    }

    /// Attribute value, if present.
    pub fn attr(&self, name: &str) -> Option<&str> {
        return self.attrs.get(name).map(String::as_str);
    }

    /// Attribute interpreted as a boolean flag (`true`, `1`, `yes`).
    pub fn flag(&self, name: &str) -> bool {
        return self
            .attr(name)
            .is_some_and(|v| return matches!(v, "true" | "1" | "yes"));
    }

    /// Create an empty element with the given tag.
    pub fn new(tag: &str) -> Self {
        return Self {
            tag: tag.to_string(),
            ..Self::default()
        };
    }

    /// Builder: set an attribute.
    #[must_use]
    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        return self;
    }

    /// Builder: append a child node.
    #[must_use]
    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        return self;
    }

    /// Builder: append a style class.
    #[must_use]
    pub fn with_class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        return self;
    }

    /// Builder: append an identifier.
    #[must_use]
    pub fn with_id(mut self, id: &str) -> Self {
        self.ids.push(id.to_string());
        return self;
    }
}

impl Node {
    /// Concatenated text of this node and its descendants.
    pub fn astext(&self) -> String {
        return match self {
            Node::Element(el) => el.astext(),
            Node::PendingXref(pending) => {
                let mut out = String::new();
                collect_text(&pending.children, &mut out);
                out
            },
            Node::Text { text } => text.clone(),
        };
    }

    /// The element behind this node, if it is one.
    pub const fn as_element(&self) -> Option<&Element> {
        return match self {
            Node::Element(el) => Some(el),
            Node::PendingXref(_) | Node::Text { .. } => None,
        };
    }

    /// Whether this node is an element with the given tag.
    pub fn is_tag(&self, tag: &str) -> bool {
        return self.as_element().is_some_and(|el| return el.tag == tag);
    }

    /// Convenience constructor for a text node.
    pub fn text(text: &str) -> Self {
        return Node::Text { text: text.to_string() };
    }
}

impl From<Element> for Node {
    /// Wrap an element as a node.
    fn from(el: Element) -> Self {
        return Node::Element(el);
    }
}

impl PendingReference {
    /// Children of the first condition child whose `condition` attribute equals one
    /// of `conditions`, tried in order of preference.
    pub fn find_condition(&self, conditions: &[&str]) -> Option<&[Node]> {
        for wanted in conditions {
            let matched = self.children.iter().filter_map(Node::as_element).find(|el| {
                return el.tag == tag::PENDING_XREF_CONDITION && el.attr("condition") == Some(*wanted);
            });
            if let Some(el) = matched {
                return Some(&el.children);
            }
        }
        return None;
    }

    /// Whether the reference's display text was given explicitly by the author.
    pub fn is_explicit(&self) -> bool {
        return self.attrs.get("refexplicit").is_some_and(|v| return v == "true");
    }
}

/// Append the text of `nodes` to `out`.
fn collect_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Element(el) => collect_text(&el.children, out),
            Node::PendingXref(pending) => collect_text(&pending.children, out),
            Node::Text { text } => out.push_str(text),
        }
    }
    return;
}

/// Collect every element below `root` (pre-order) matching `predicate`.
pub fn find_elements<'a>(root: &'a Element, predicate: &dyn Fn(&Element) -> bool) -> Vec<&'a Element> {
    let mut found = Vec::new();
    let mut stack: Vec<&Element> = root.children.iter().rev().filter_map(Node::as_element).collect();
    while let Some(el) = stack.pop() {
        if predicate(el) {
            found.push(el);
        }
        stack.extend(el.children.iter().rev().filter_map(Node::as_element));
    }
    return found;
}

/// Replace, in document order, every node below `root` accepted by `is_match`
/// with the nodes `replace` returns. Replacement output is processed again, so
/// nested matches (for example conditionals inside conditionals) are handled.
pub fn replace_matching<M, R>(root: &mut Element, is_match: &M, replace: &mut R)
where
    M: Fn(&Node) -> bool,
    R: FnMut(Node) -> Vec<Node>,
{
    let children = std::mem::take(&mut root.children);
    root.children = rewrite_nodes(children, is_match, replace);
    return;
}

/// Rewrite a node list, descending into elements that are not replaced.
fn rewrite_nodes<M, R>(nodes: Vec<Node>, is_match: &M, replace: &mut R) -> Vec<Node>
where
    M: Fn(&Node) -> bool,
    R: FnMut(Node) -> Vec<Node>,
{
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        if is_match(&node) {
            let replaced = replace(node);
            out.extend(rewrite_nodes(replaced, is_match, replace));
            continue;
        }
        match node {
            Node::Element(mut el) => {
                replace_matching(&mut el, is_match, replace);
                out.push(Node::Element(el));
            },
            other @ (Node::PendingXref(_) | Node::Text { .. }) => out.push(other),
        }
    }
    return out;
}

/// Visit every element below `root` mutably, passing the parent element's attributes.
pub fn visit_with_parent(root: &mut Element, visit: &mut dyn FnMut(&BTreeMap<String, String>, &mut Element)) {
    let parent_attrs = root.attrs.clone();
    for child in &mut root.children {
        if let Node::Element(el) = child {
            visit(&parent_attrs, el);
            visit_with_parent(el, visit);
        }
    }
    return;
}
