//! Cross-reference resolution: replaces every pending reference with resolved
//! content, or with its fallback content when nothing resolves it.

use regex::Regex;

use crate::config::Config;
use crate::diagnostics::Category;
use crate::domains::{Domain, NoUri, XrefContext};
use crate::error::Error;
use crate::transforms::{PostTransform, TransformContext};
use crate::tree::{self, Element, Node, PendingReference, tag};

/// Name of the standard domain; it gets special treatment for `any` and ignore lists.
const STD: &str = "std";

/// The reference resolution pass (priority 10).
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferencesResolver;

/// Compiled `nitpick_ignore` and `nitpick_ignore_regex` lists.
struct IgnoreLists<'a> {
    /// Literal `(kind, target)` pairs.
    literal: &'a [(String, String)],
    /// Anchored `(kind, target)` patterns.
    patterns: Vec<(Regex, Regex)>,
}

/// Outcome of resolving one reference before fallback handling.
enum Resolution {
    /// No result; the fallback content is used.
    Unresolved,
    /// Resolved content.
    Resolved(Node),
}

impl<'a> IgnoreLists<'a> {
    /// Compile the regex list with full-match semantics.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidIgnorePattern` for a pattern that does not compile.
    fn from_config(config: &'a Config) -> Result<Self, Error> {
        let mut patterns = Vec::with_capacity(config.nitpick_ignore_regex.len());
        for (kind, target) in &config.nitpick_ignore_regex {
            patterns.push((full_match(kind)?, full_match(target)?));
        }
        return Ok(Self {
            literal: &config.nitpick_ignore,
            patterns,
        });
    }

    /// Whether `(kind, target)` is ignored by either list.
    fn ignores(&self, kind: &str, target: &str) -> bool {
        let literal = self.literal.iter().any(|(k, t)| return k == kind && t == target);
        let pattern = self
            .patterns
            .iter()
            .any(|(k, t)| return k.is_match(kind) && t.is_match(target));
        return literal || pattern;
    }
}

impl PostTransform for ReferencesResolver {
    fn name(&self) -> &'static str {
        return "references";
    }

    fn priority(&self) -> u32 {
        return 10;
    }

    fn run(&self, tree: &mut Element, ctx: &mut TransformContext<'_>) -> Result<(), Error> {
        let inventory = ctx.inventory;
        let ignore = IgnoreLists::from_config(inventory.config())?;
        tree::replace_matching(tree, &|n: &Node| return matches!(n, Node::PendingXref(_)), &mut |node: Node| {
            let Node::PendingXref(mut pending) = node else {
                return vec![node];
            };
            return resolve_pending(&mut pending, ctx, &ignore);
        });
        return Ok(());
    }
}

/// Resolve one pending reference into its replacement nodes.
fn resolve_pending(pending: &mut PendingReference, ctx: &mut TransformContext<'_>, ignore: &IgnoreLists<'_>) -> Vec<Node> {
    let fallback = pending
        .find_condition(&["resolved", "*"])
        .and_then(|nodes| return nodes.first())
        .or_else(|| return pending.children.first())
        .cloned()
        .unwrap_or_else(|| return Node::text(&pending.target));

    if pending.refdoc.is_none() {
        pending.refdoc = Some(ctx.docname.to_string());
    }

    if let Resolution::Resolved(node) = resolve_with_hooks(pending, &fallback, ctx, ignore) {
        return vec![node];
    }

    let first_is_condition = pending
        .children
        .first()
        .is_some_and(|n| return n.is_tag(tag::PENDING_XREF_CONDITION));
    if first_is_condition {
        if let Some(matched) = pending.find_condition(&["*"]) {
            return matched.to_vec();
        }
        ctx.diagnostics.warn(
            Category::FallbackText,
            Some(ctx.docname),
            "Could not determine the fallback text for the cross-reference. Might be a bug.".to_string(),
        );
    }
    return vec![fallback];
}

/// Domain lookup, `missing-reference` hook, self-referential retry and warning.
fn resolve_with_hooks(
    pending: &mut PendingReference,
    fallback: &Node,
    ctx: &mut TransformContext<'_>,
    ignore: &IgnoreLists<'_>,
) -> Resolution {
    let inventory = ctx.inventory;
    let domain: Option<&dyn Domain> = match pending.domain.as_deref().filter(|d| return !d.is_empty()) {
        Some(name) => match inventory.domains.get(name) {
            Ok(domain) => Some(domain),
            Err(e) => {
                tracing::debug!(reftarget = %pending.target, "{e}");
                return Resolution::Unresolved;
            },
        },
        None => None,
    };

    match resolve_in_domain(domain, pending, fallback, ctx) {
        Err(NoUri) => return Resolution::Unresolved,
        Ok(Some(node)) => return Resolution::Resolved(node),
        Ok(None) => {},
    }

    match inventory.events.missing_reference(inventory, pending, fallback) {
        Err(NoUri) => return Resolution::Unresolved,
        Ok(Some(node)) => return Resolution::Resolved(node),
        Ok(None) => {},
    }

    if pending.self_referential {
        pending.self_referential = false;
        match resolve_in_domain(domain, pending, fallback, ctx) {
            Err(NoUri) => return Resolution::Unresolved,
            Ok(Some(node)) => return Resolution::Resolved(node),
            Ok(None) => {},
        }
    }

    warn_missing_reference(pending, domain, ctx, ignore);
    return Resolution::Unresolved;
}

/// Delegate to the explicit domain, or run the generic `any` search.
fn resolve_in_domain(
    domain: Option<&dyn Domain>,
    pending: &PendingReference,
    fallback: &Node,
    ctx: &mut TransformContext<'_>,
) -> Result<Option<Node>, NoUri> {
    let refdoc = pending.refdoc.as_deref().unwrap_or(ctx.docname);
    let xref = XrefContext {
        inventory: ctx.inventory,
        refdoc,
        renderer: ctx.renderer,
    };
    if let Some(domain) = domain {
        return domain
            .resolve_xref(&xref, &pending.kind, pending, fallback)
            .map(|found| return found.filter(is_nonempty));
    }
    if pending.kind == "any" {
        return resolve_any(&xref, pending, fallback, ctx);
    }
    return Ok(None);
}

/// Search every domain for a generic `any` reference. The standard domain's
/// document role comes first, then its catch-all, then the other domains in
/// registry order. With several candidates the first one wins and a warning
/// lists them all. `NoUri` from the standard document role ends the search.
fn resolve_any(
    xref: &XrefContext<'_>,
    pending: &PendingReference,
    fallback: &Node,
    ctx: &mut TransformContext<'_>,
) -> Result<Option<Node>, NoUri> {
    let inventory = ctx.inventory;
    let domains = &inventory.domains;
    let mut results: Vec<(String, Node)> = Vec::new();
    if let Ok(std) = domains.get(STD) {
        if let Some(doc) = std.resolve_xref(xref, "doc", pending, fallback)? {
            results.push(("doc".to_string(), doc));
        }
        results.extend(std.resolve_any_xref(xref, pending, fallback));
    }
    for domain in domains.iter().filter(|d| return d.name() != STD) {
        results.extend(domain.resolve_any_xref(xref, pending, fallback));
    }
    results.retain(|(_, node)| return is_nonempty(node));

    if results.len() > 1 {
        let candidates: Vec<String> = results.iter().map(|(label, node)| return stringify(label, node)).collect();
        ctx.diagnostics.warn(
            Category::AmbiguousAny,
            Some(ctx.docname),
            format!(
                "more than one target found for 'any' cross-reference '{}': could be {}",
                pending.target,
                candidates.join(" or ")
            ),
        );
    }

    let Some((label, mut node)) = results.into_iter().next() else {
        return Ok(None);
    };
    let res_domain = label.split(':').next().unwrap_or_default().to_string();
    if let Node::Element(el) = &mut node {
        if let Some(Node::Element(first)) = el.children.first_mut() {
            if !first.classes.is_empty() {
                first.classes.push(res_domain);
                first.classes.push(label.replace(':', "-"));
            }
        }
    }
    return Ok(Some(node));
}

/// Warn about an unresolved reference unless configuration or a hook suppresses it.
fn warn_missing_reference(
    pending: &PendingReference,
    domain: Option<&dyn Domain>,
    ctx: &mut TransformContext<'_>,
    ignore: &IgnoreLists<'_>,
) {
    let config = ctx.inventory.config();
    let kind = pending.kind.as_str();
    let target = pending.target.as_str();
    let mut warn = pending.warn;
    if config.nitpicky {
        warn = true;
        let dtype = domain.map_or_else(|| return kind.to_string(), |d| return format!("{}:{kind}", d.name()));
        let std_like = domain.is_none_or(|d| return d.name() == STD);
        if ignore.ignores(&dtype, target) || (std_like && ignore.ignores(kind, target)) {
            warn = false;
        }
    }
    if !warn {
        return;
    }
    if ctx.inventory.events.warn_missing_reference(domain, pending) {
        return;
    }

    let explicit_domain = pending.domain.as_deref().unwrap_or_default();
    let message = if let Some(template) = domain.and_then(|d| return d.dangling_warning(kind)) {
        template.replace("{target}", target)
    } else if !explicit_domain.is_empty() && explicit_domain != STD {
        format!("{explicit_domain}:{kind} reference target not found: {target}")
    } else {
        format!("'{kind}' reference target not found: {target}")
    };
    ctx.diagnostics.warn(Category::RefMissing, Some(ctx.docname), message);
    return;
}

/// Anchor a pattern so it must match the whole string.
fn full_match(pattern: &str) -> Result<Regex, Error> {
    return Regex::new(&format!("^(?:{pattern})$")).map_err(|e| {
        return Error::InvalidIgnorePattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        };
    });
}

/// Whether a resolver result has content; empty results count as "no result".
fn is_nonempty(node: &Node) -> bool {
    return match node {
        Node::Element(el) => !el.children.is_empty(),
        Node::PendingXref(_) => true,
        Node::Text { text } => !text.is_empty(),
    };
}

/// `:label:`title`` rendering of one candidate for the ambiguity warning.
fn stringify(label: &str, node: &Node) -> String {
    let title = node
        .as_element()
        .and_then(|el| return el.attr("reftitle").map(str::to_string))
        .unwrap_or_else(|| return node.astext());
    return format!(":{label}:`{title}`");
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::path::Path;
    use std::sync::Arc;

    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::domains::DomainRegistry;
    use crate::events::Listener;
    use crate::inventory::Inventory;
    use crate::transforms::Renderer;
    use test_log::test;

    /// A domain resolving every target listed in `known` for its single role.
    /// Registered as `std`, it answers `unlinkable` with `NoUri` for any role.
    #[derive(Debug, Clone)]
    struct FixedDomain {
        known: Vec<&'static str>,
        name: &'static str,
    }

    impl Domain for FixedDomain {
        fn boxed_clone(&self) -> Box<dyn Domain> {
            return Box::new(self.clone());
        }

        fn clear_doc(&mut self, _docname: &str) {}

        fn dangling_warning(&self, kind: &str) -> Option<&'static str> {
            return (kind == "func").then_some("unknown function: {target}");
        }

        fn data_version(&self) -> u32 {
            return 1;
        }

        fn export_data(&self) -> Result<serde_json::Value, Error> {
            return Ok(serde_json::Value::Null);
        }

        fn import_data(&mut self, _data: serde_json::Value) -> Result<(), Error> {
            return Ok(());
        }

        fn merge_domain_data(&mut self, _docnames: &BTreeSet<String>, _other: &serde_json::Value) -> Result<(), Error> {
            return Ok(());
        }

        fn name(&self) -> &str {
            return self.name;
        }

        fn resolve_xref(
            &self,
            _ctx: &XrefContext<'_>,
            kind: &str,
            pending: &PendingReference,
            _fallback: &Node,
        ) -> Result<Option<Node>, NoUri> {
            if self.name == STD && pending.target == "unlinkable" {
                return Err(NoUri);
            }
            if kind != "func" || !self.known.contains(&pending.target.as_str()) {
                return Ok(None);
            }
            let inner = Element::new(tag::LITERAL).with_class("xref").with_child(Node::text(&pending.target));
            return Ok(Some(
                Element::new(tag::REFERENCE)
                    .with_attr("reftitle", &format!("{}.{}", self.name, pending.target))
                    .with_child(inner.into())
                    .into(),
            ));
        }

        fn roles(&self) -> &[&'static str] {
            return &["func"];
        }
    }

    fn inventory(config: Config, domains: &[FixedDomain]) -> Inventory {
        let mut registry = DomainRegistry::with_standard();
        for domain in domains {
            registry.register(Box::new(domain.clone()));
        }
        return Inventory::new(Path::new("/docs"), config, registry).unwrap();
    }

    fn pending(kind: &str, target: &str, domain: Option<&str>) -> PendingReference {
        return PendingReference {
            children: vec![Element::new(tag::LITERAL).with_child(Node::text(target)).into()],
            domain: domain.map(str::to_string),
            kind: kind.to_string(),
            target: target.to_string(),
            ..PendingReference::default()
        };
    }

    fn resolve(inventory: &Inventory, pending: PendingReference) -> (Element, Diagnostics) {
        let renderer = Renderer::new("html", "html", &[]);
        let mut tree = Element::new(tag::DOCUMENT).with_child(Node::PendingXref(pending));
        let mut diagnostics = Diagnostics::default();
        let mut ctx = TransformContext {
            diagnostics: &mut diagnostics,
            docname: "index",
            inventory,
            renderer: &renderer,
        };
        ReferencesResolver.run(&mut tree, &mut ctx).unwrap();
        return (tree, diagnostics);
    }

    #[test]
    fn explicit_domain_resolves() {
        let py = FixedDomain { known: vec!["f"], name: "py" };
        let inv = inventory(Config::default(), &[py]);
        let (tree, diagnostics) = resolve(&inv, pending("func", "f", Some("py")));
        assert!(tree.children.first().unwrap().is_tag(tag::REFERENCE));
        assert!(diagnostics.entries().is_empty());
    }

    #[test]
    fn unknown_domain_falls_back_silently() {
        let inv = inventory(Config { nitpicky: true, ..Config::default() }, &[]);
        let (tree, diagnostics) = resolve(&inv, pending("func", "f", Some("nope")));
        assert!(tree.children.first().unwrap().is_tag(tag::LITERAL));
        assert!(diagnostics.entries().is_empty());
    }

    #[test]
    fn ambiguous_any_prefers_earlier_domain_and_warns_once() {
        let c = FixedDomain { known: vec!["x"], name: "c" };
        let py = FixedDomain { known: vec!["x"], name: "py" };
        let inv = inventory(Config::default(), &[py, c]);
        let (tree, diagnostics) = resolve(&inv, pending("any", "x", None));

        let warnings = diagnostics.of(Category::AmbiguousAny);
        assert_eq!(warnings.len(), 1);
        assert_eq!(
            warnings.first().unwrap().message,
            "more than one target found for 'any' cross-reference 'x': could be :c:func:`c.x` or :py:func:`py.x`"
        );
        let reference = tree.children.first().and_then(Node::as_element).unwrap();
        assert_eq!(reference.attr("reftitle"), Some("c.x"));
        let inner = reference.children.first().and_then(Node::as_element).unwrap();
        assert_eq!(inner.classes, ["xref", "c", "c-func"]);
    }

    #[test]
    fn any_search_stops_when_document_role_has_no_uri() {
        let std = FixedDomain { known: vec![], name: "std" };
        let py = FixedDomain { known: vec!["unlinkable"], name: "py" };
        let inv = inventory(Config::default(), &[std, py]);
        let (tree, diagnostics) = resolve(&inv, pending("any", "unlinkable", None));
        assert!(tree.children.first().unwrap().is_tag(tag::LITERAL));
        assert!(diagnostics.entries().is_empty());
    }

    #[test]
    fn nitpicky_warns_unless_ignored() {
        let config = Config {
            nitpick_ignore: vec![("ref".into(), "skip-me".into())],
            nitpick_ignore_regex: vec![("py:.*".into(), "internal\\..*".into())],
            nitpicky: true,
            ..Config::default()
        };
        let py = FixedDomain { known: vec![], name: "py" };
        let inv = inventory(config, &[py]);

        let (_, diagnostics) = resolve(&inv, pending("ref", "missing", Some("std")));
        let warnings = diagnostics.of(Category::RefMissing);
        assert_eq!(warnings.first().unwrap().message, "undefined label: 'missing'");

        let (_, diagnostics) = resolve(&inv, pending("ref", "skip-me", Some("std")));
        assert!(diagnostics.entries().is_empty());

        let (_, diagnostics) = resolve(&inv, pending("func", "internal.helper", Some("py")));
        assert!(diagnostics.entries().is_empty());

        let (_, diagnostics) = resolve(&inv, pending("func", "public", Some("py")));
        assert_eq!(diagnostics.of(Category::RefMissing).first().unwrap().message, "unknown function: public");

        let (_, diagnostics) = resolve(&inv, pending("meth", "public", Some("py")));
        assert_eq!(
            diagnostics.of(Category::RefMissing).first().unwrap().message,
            "py:meth reference target not found: public"
        );

        let (_, diagnostics) = resolve(&inv, pending("any", "nothing", None));
        assert_eq!(
            diagnostics.of(Category::RefMissing).first().unwrap().message,
            "'any' reference target not found: nothing"
        );
    }

    #[test]
    fn without_nitpicky_only_flagged_references_warn() {
        let inv = inventory(Config::default(), &[]);
        let (_, diagnostics) = resolve(&inv, pending("ref", "missing", Some("std")));
        assert!(diagnostics.entries().is_empty());
        let mut flagged = pending("ref", "missing", Some("std"));
        flagged.warn = true;
        let (_, diagnostics) = resolve(&inv, flagged);
        assert_eq!(diagnostics.warning_count(), 1);
    }

    #[test]
    fn invalid_ignore_pattern_is_an_error() {
        let config = Config {
            nitpick_ignore_regex: vec![("(".into(), ".*".into())],
            ..Config::default()
        };
        let inv = inventory(config, &[]);
        let renderer = Renderer::new("html", "html", &[]);
        let mut tree = Element::new(tag::DOCUMENT);
        let mut diagnostics = Diagnostics::default();
        let mut ctx = TransformContext {
            diagnostics: &mut diagnostics,
            docname: "index",
            inventory: &inv,
            renderer: &renderer,
        };
        assert!(matches!(
            ReferencesResolver.run(&mut tree, &mut ctx),
            Err(Error::InvalidIgnorePattern { .. })
        ));
    }

    struct Hook;

    impl Listener for Hook {
        fn missing_reference(
            &self,
            _inventory: &Inventory,
            pending: &PendingReference,
            _fallback: &Node,
        ) -> Result<Option<Node>, NoUri> {
            return match pending.target.as_str() {
                "external" => Ok(Some(Element::new(tag::REFERENCE).with_child(Node::text("ext")).into())),
                "nouri" => Err(NoUri),
                _ => Ok(None),
            };
        }

        fn warn_missing_reference(&self, _domain: Option<&dyn Domain>, pending: &PendingReference) -> bool {
            return pending.target == "quiet";
        }
    }

    #[test]
    fn hooks_resolve_and_suppress() {
        let mut inv = inventory(Config { nitpicky: true, ..Config::default() }, &[]);
        inv.events.connect(Arc::new(Hook));

        let (tree, _) = resolve(&inv, pending("ref", "external", Some("std")));
        assert_eq!(tree.astext(), "ext");

        let (tree, diagnostics) = resolve(&inv, pending("ref", "nouri", Some("std")));
        assert_eq!(tree.astext(), "nouri");
        assert!(diagnostics.entries().is_empty());

        let (_, diagnostics) = resolve(&inv, pending("ref", "quiet", Some("std")));
        assert!(diagnostics.entries().is_empty());
    }

    #[test]
    fn condition_children_provide_fallback() {
        let inv = inventory(Config::default(), &[]);
        let mut xref = pending("func", "f", Some("nope"));
        xref.children = vec![
            Element::new(tag::PENDING_XREF_CONDITION)
                .with_attr("condition", "resolved")
                .with_child(Node::text("short"))
                .into(),
            Element::new(tag::PENDING_XREF_CONDITION)
                .with_attr("condition", "*")
                .with_child(Node::text("long.f"))
                .into(),
        ];
        let (tree, _) = resolve(&inv, xref);
        assert_eq!(tree.astext(), "long.f");
    }

    #[test]
    fn missing_star_condition_warns_about_fallback() {
        let inv = inventory(Config::default(), &[]);
        let mut xref = pending("func", "f", Some("nope"));
        xref.children = vec![
            Element::new(tag::PENDING_XREF_CONDITION)
                .with_attr("condition", "resolved")
                .with_child(Node::text("short"))
                .into(),
        ];
        let (tree, diagnostics) = resolve(&inv, xref);
        assert_eq!(tree.astext(), "short");
        assert_eq!(diagnostics.of(Category::FallbackText).len(), 1);
    }

    #[test]
    fn self_referential_reference_is_retried_once() {
        #[derive(Debug, Clone)]
        struct SelfAware;

        impl Domain for SelfAware {
            fn boxed_clone(&self) -> Box<dyn Domain> {
                return Box::new(self.clone());
            }

            fn clear_doc(&mut self, _docname: &str) {}

            fn data_version(&self) -> u32 {
                return 1;
            }

            fn export_data(&self) -> Result<serde_json::Value, Error> {
                return Ok(serde_json::Value::Null);
            }

            fn import_data(&mut self, _data: serde_json::Value) -> Result<(), Error> {
                return Ok(());
            }

            fn merge_domain_data(&mut self, _docnames: &BTreeSet<String>, _other: &serde_json::Value) -> Result<(), Error> {
                return Ok(());
            }

            fn name(&self) -> &str {
                return "ext";
            }

            fn resolve_xref(
                &self,
                _ctx: &XrefContext<'_>,
                _kind: &str,
                pending: &PendingReference,
                _fallback: &Node,
            ) -> Result<Option<Node>, NoUri> {
                if pending.self_referential {
                    return Ok(None);
                }
                return Ok(Some(Element::new(tag::REFERENCE).with_child(Node::text("local")).into()));
            }

            fn roles(&self) -> &[&'static str] {
                return &["obj"];
            }
        }

        let mut registry = DomainRegistry::with_standard();
        registry.register(Box::new(SelfAware));
        let inv = Inventory::new(Path::new("/docs"), Config::default(), registry).unwrap();
        let mut xref = pending("obj", "thing", Some("ext"));
        xref.self_referential = true;
        let (tree, _) = resolve(&inv, xref);
        assert_eq!(tree.astext(), "local");
    }
}
