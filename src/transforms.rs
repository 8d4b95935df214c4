//! Post-parse tree-rewriting passes and the pipeline that orders them.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::diagnostics::{Category, Diagnostics};
use crate::error::Error;
use crate::inventory::Inventory;
use crate::tree::{self, Element, Node, tag};

/// Description of the output renderer a tree is resolved for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Renderer {
    /// Output format family, e.g. `html`.
    pub format: String,
    /// The renderer handles every signature element natively.
    pub full_signature_support: bool,
    /// Renderer name, e.g. `html` or `dirhtml`.
    pub name: String,
    /// Suffix appended to docnames in generated links.
    pub out_suffix: String,
    /// Element kinds the renderer has a dedicated visitor for.
    pub visitors: BTreeSet<String>,
}

/// What a pass sees while rewriting one tree.
pub struct TransformContext<'a> {
    /// Sink for user-visible warnings.
    pub diagnostics: &'a mut Diagnostics,
    /// Docname whose tree is being rewritten.
    pub docname: &'a str,
    /// The inventory (configuration, domains, hooks).
    pub inventory: &'a Inventory,
    /// Target renderer.
    pub renderer: &'a Renderer,
}

/// A tree-rewriting pass run after parsing.
pub trait PostTransform: Send + Sync + std::fmt::Debug {
    /// Renderer names the pass applies to; empty means all.
    fn builders(&self) -> &[&str] {
        return &[];
    }

    /// Output formats the pass applies to; empty means all.
    fn formats(&self) -> &[&str] {
        return &[];
    }

    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Lower runs earlier; ties keep registration order.
    fn priority(&self) -> u32;

    /// Rewrite `tree` in place.
    ///
    /// # Errors
    ///
    /// Returns an error only for failures that must abort resolution of the document.
    fn run(&self, tree: &mut Element, ctx: &mut TransformContext<'_>) -> Result<(), Error>;
}

/// Ordered set of passes.
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Passes sorted by ascending priority, stable for ties.
    passes: Vec<Arc<dyn PostTransform>>,
}

// ── Built-in passes ─────────────────────────────────────────────────

/// Resolves build-tag conditionals (`only` elements).
#[derive(Debug, Clone, Copy, Default)]
pub struct OnlyNodeTransform;

/// Appends the owning domain name to every signature's classes.
#[derive(Debug, Clone, Copy, Default)]
pub struct PropagateDescDomain;

/// Flattens signature elements the renderer cannot visit into generic inline elements.
#[derive(Debug, Clone, Copy, Default)]
pub struct SigElementFallbackTransform;

impl Default for Pipeline {
    /// Reference resolution, visibility pruning, capability fallback and style propagation.
    fn default() -> Self {
        let mut pipeline = Self::empty();
        pipeline.register(Arc::new(crate::references::ReferencesResolver));
        pipeline.register(Arc::new(OnlyNodeTransform));
        pipeline.register(Arc::new(SigElementFallbackTransform));
        pipeline.register(Arc::new(PropagateDescDomain));
        return pipeline;
    }
}

impl Pipeline {
    /// Run every applicable pass over `tree`, in order.
    ///
    /// # Errors
    ///
    /// Propagates the first pass failure; later passes do not run.
    pub fn apply(&self, tree: &mut Element, ctx: &mut TransformContext<'_>) -> Result<(), Error> {
        for pass in &self.passes {
            if !is_supported(pass.as_ref(), ctx.renderer) {
                tracing::debug!(pass = pass.name(), renderer = %ctx.renderer.name, "post-transform skipped");
                continue;
            }
            tracing::debug!(pass = pass.name(), docname = ctx.docname, "post-transform");
            pass.run(tree, ctx)?;
        }
        return Ok(());
    }

    /// A pipeline without passes.
    pub const fn empty() -> Self {
        return Self { passes: Vec::new() };
    }

    /// Pass names in execution order.
    pub fn names(&self) -> Vec<&'static str> {
        return self.passes.iter().map(|p| return p.name()).collect();
    }

    /// Add a pass, keeping the list ordered by priority.
    pub fn register(&mut self, pass: Arc<dyn PostTransform>) {
        self.passes.push(pass);
        self.passes.sort_by_key(|p| return p.priority());
        return;
    }
}

impl Renderer {
    /// Whether the renderer has a visitor for `kind`.
    pub fn has_visitor(&self, kind: &str) -> bool {
        return self.visitors.contains(kind);
    }

    /// A renderer with no visitors beyond those given.
    pub fn new(name: &str, format: &str, visitors: &[&str]) -> Self {
        return Self {
            format: format.to_string(),
            full_signature_support: false,
            name: name.to_string(),
            out_suffix: ".html".to_string(),
            visitors: visitors.iter().map(|v| return (*v).to_string()).collect(),
        };
    }

    /// Link from document `from` to document `to`, relative to `from`'s directory.
    pub fn relative_uri(&self, from: &str, to: &str) -> String {
        let depth = from.matches('/').count();
        let prefix = "../".repeat(depth);
        return format!("{prefix}{to}{}", self.out_suffix);
    }
}

impl PostTransform for OnlyNodeTransform {
    fn name(&self) -> &'static str {
        return "only-nodes";
    }

    fn priority(&self) -> u32 {
        return 50;
    }

    fn run(&self, tree: &mut Element, ctx: &mut TransformContext<'_>) -> Result<(), Error> {
        let inventory = ctx.inventory;
        let tags = inventory.tags();
        let diagnostics = &mut *ctx.diagnostics;
        let docname = ctx.docname;
        tree::replace_matching(tree, &|n: &Node| return n.is_tag(tag::ONLY), &mut |node: Node| {
            let Node::Element(only) = node else {
                return vec![node];
            };
            let expr = only.attr("expr").unwrap_or_default();
            let keep = match tags.eval_condition(expr) {
                Ok(keep) => keep,
                Err(e) => {
                    diagnostics.warn(
                        Category::OnlyExpression,
                        Some(docname),
                        format!("exception while evaluating only directive expression: {e}"),
                    );
                    true
                },
            };
            if keep {
                return keep_children(only);
            }
            let mut ids = only.ids.clone();
            for el in tree::find_elements(&only, &|el| return !el.ids.is_empty()) {
                ids.extend(el.ids.iter().cloned());
            }
            return vec![id_placeholder(ids)];
        });
        return Ok(());
    }
}

impl PostTransform for PropagateDescDomain {
    fn name(&self) -> &'static str {
        return "propagate-desc-domain";
    }

    fn priority(&self) -> u32 {
        return 200;
    }

    fn run(&self, tree: &mut Element, _ctx: &mut TransformContext<'_>) -> Result<(), Error> {
        tree::visit_with_parent(tree, &mut |parent_attrs, el| {
            if el.tag != tag::DESC_SIGNATURE {
                return;
            }
            if let Some(domain) = parent_attrs.get("domain").filter(|d| return !d.is_empty()) {
                el.classes.push(domain.clone());
            }
        });
        return Ok(());
    }
}

impl PostTransform for SigElementFallbackTransform {
    fn name(&self) -> &'static str {
        return "sig-element-fallback";
    }

    fn priority(&self) -> u32 {
        return 200;
    }

    fn run(&self, tree: &mut Element, ctx: &mut TransformContext<'_>) -> Result<(), Error> {
        let renderer = ctx.renderer;
        if renderer.full_signature_support {
            return Ok(());
        }
        let covers_family = tag::SIG_ELEMENTS.iter().all(|kind| return renderer.has_visitor(kind));
        if !covers_family && !renderer.has_visitor(tag::DESC_SIG_ELEMENT) {
            flatten_to_inline(tree, &|kind| {
                return kind == tag::DESC_SIG_ELEMENT || tag::SIG_ELEMENTS.contains(&kind);
            });
        }
        if !renderer.has_visitor(tag::DESC_INLINE) {
            flatten_to_inline(tree, &|kind| return kind == tag::DESC_INLINE);
        }
        return Ok(());
    }
}

/// Whether a pass applies to `renderer`.
pub fn is_supported(pass: &dyn PostTransform, renderer: &Renderer) -> bool {
    let builders = pass.builders();
    if !builders.is_empty() && !builders.contains(&renderer.name.as_str()) {
        return false;
    }
    let formats = pass.formats();
    return formats.is_empty() || formats.contains(&renderer.format.as_str());
}

/// Replace every element whose tag satisfies `is_kind` with an `inline` element
/// carrying the same attributes and children. The original tag is kept under
/// `_sig_node_type` unless that attribute is already set.
fn flatten_to_inline(tree: &mut Element, is_kind: &dyn Fn(&str) -> bool) {
    tree::replace_matching(
        tree,
        &|n: &Node| return n.as_element().is_some_and(|el| return is_kind(&el.tag)),
        &mut |node: Node| {
            let Node::Element(mut el) = node else {
                return vec![node];
            };
            let original = std::mem::replace(&mut el.tag, tag::INLINE.to_string());
            el.attrs.entry("_sig_node_type".to_string()).or_insert(original);
            return vec![Node::Element(el)];
        },
    );
    return;
}

/// Children of a kept `only` element. Its ids move onto the first child when
/// that child is an element; otherwise an id placeholder goes in front.
fn keep_children(only: Element) -> Vec<Node> {
    let mut children = only.children;
    if only.ids.is_empty() {
        return children;
    }
    match children.first_mut() {
        Some(Node::Element(first)) => {
            for id in only.ids {
                if !first.ids.contains(&id) {
                    first.ids.push(id);
                }
            }
        },
        Some(Node::PendingXref(_) | Node::Text { .. }) | None => children.insert(0, id_placeholder(only.ids)),
    }
    return children;
}

/// Empty comment keeping the identifiers of a pruned region.
fn id_placeholder(ids: Vec<String>) -> Node {
    return Node::Element(Element {
        ids,
        ..Element::new(tag::COMMENT)
    });
}
