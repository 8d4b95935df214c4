//! Navigation-tree resolution: turns `toctree` placeholders into nested link lists.

use crate::diagnostics::{Category, Diagnostics};
use crate::inventory::Inventory;
use crate::project::docname_join;
use crate::tags::Tags;
use crate::transforms::Renderer;
use crate::tree::{Element, Node, tag};

/// Options controlling how a navigation placeholder is expanded.
#[allow(clippy::struct_excessive_bools, reason = "independent switches of the navigation-resolver contract")]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TocTreeOptions {
    /// Hide the children of entries that do not lead to the referring document (only with `prune`).
    pub collapse: bool,
    /// Expand placeholders marked `hidden`.
    pub include_hidden: bool,
    /// Maximum nesting depth; 0 defers to the placeholder's `maxdepth` (0 there means unlimited).
    pub max_depth: usize,
    /// Apply `max_depth` and `collapse`.
    pub prune: bool,
    /// Active build tags for `only` elements among the entries.
    pub tags: Tags,
    /// List only the top-level titles, never children.
    pub titles_only: bool,
}

/// Contract of a navigation resolver.
pub trait NavigationResolver: Send + Sync + std::fmt::Debug {
    /// Expand one placeholder found in `refdoc`, or `None` when nothing survives.
    fn resolve(
        &self,
        inventory: &Inventory,
        refdoc: &str,
        toctree: &Element,
        options: &TocTreeOptions,
        renderer: &Renderer,
        diagnostics: &mut Diagnostics,
    ) -> Option<Element>;
}

/// Default resolver built on the inclusion graph and recorded titles.
#[derive(Debug, Clone, Copy, Default)]
pub struct TocTreeResolver;

/// Settings fixed for one expansion.
struct Expansion<'a> {
    /// Effective depth limit (0 = unlimited).
    depth_limit: usize,
    /// The inventory.
    inventory: &'a Inventory,
    /// Options as given.
    options: &'a TocTreeOptions,
    /// Document the placeholder lives in.
    refdoc: &'a str,
    /// Renderer for link targets.
    renderer: &'a Renderer,
    /// Effective titles-only switch.
    titles_only: bool,
}

impl NavigationResolver for TocTreeResolver {
    fn resolve(
        &self,
        inventory: &Inventory,
        refdoc: &str,
        toctree: &Element,
        options: &TocTreeOptions,
        renderer: &Renderer,
        diagnostics: &mut Diagnostics,
    ) -> Option<Element> {
        if toctree.flag("hidden") && !options.include_hidden {
            return None;
        }
        let own_depth = toctree.attr("maxdepth").and_then(|d| return d.parse::<usize>().ok()).unwrap_or(0);
        let expansion = Expansion {
            depth_limit: if options.max_depth > 0 { options.max_depth } else { own_depth },
            inventory,
            options,
            refdoc,
            renderer,
            titles_only: options.titles_only || toctree.flag("titlesonly"),
        };

        let owner = toctree.attr("parent").unwrap_or(refdoc);
        let mut list = Element::new(tag::BULLET_LIST);
        for (docname, title) in entries(toctree, &options.tags, owner) {
            if docname == owner {
                diagnostics.warn(
                    Category::CircularToc,
                    Some(owner),
                    "self referenced toctree found. Ignored.".to_string(),
                );
                continue;
            }
            let ancestors = vec![owner.to_string()];
            if let Some(item) = expansion.entry(&docname, title.as_deref(), 1, &ancestors, diagnostics) {
                list.children.push(item.into());
            }
        }
        if list.children.is_empty() {
            return None;
        }

        let mut wrapper = Element::new(tag::COMPOUND).with_class("toctree-wrapper");
        if let Some(caption) = toctree.attr("caption") {
            wrapper.children.push(
                Element::new(tag::TITLE)
                    .with_class("caption")
                    .with_child(Node::text(caption))
                    .into(),
            );
        }
        wrapper.children.push(list.into());
        return Some(wrapper);
    }
}

impl Expansion<'_> {
    /// Whether children of an entry at `depth` are listed.
    const fn descends(&self, depth: usize) -> bool {
        if self.titles_only {
            return false;
        }
        return !self.options.prune || self.depth_limit == 0 || depth < self.depth_limit;
    }

    /// Build the list item for `docname` at `depth`, with its included documents below it.
    fn entry(
        &self,
        docname: &str,
        title: Option<&str>,
        depth: usize,
        ancestors: &[String],
        diagnostics: &mut Diagnostics,
    ) -> Option<Element> {
        if ancestors.iter().any(|a| return a == docname) {
            diagnostics.warn(
                Category::CircularToc,
                Some(self.refdoc),
                format!("circular toctree references detected, ignoring: {} <- {docname}", ancestors.join(" <- ")),
            );
            return None;
        }
        let Some(record) = self.inventory.record(docname) else {
            diagnostics.warn(
                Category::Toc,
                Some(self.refdoc),
                format!("toctree contains reference to nonexisting document '{docname}'"),
            );
            return None;
        };
        let text = title
            .map(str::to_string)
            .or_else(|| return record.title.as_ref().map(Node::astext))
            .unwrap_or_else(|| return docname.to_string());

        let mut link = Element::new(tag::REFERENCE)
            .with_attr("internal", "true")
            .with_attr("refuri", &self.renderer.relative_uri(self.refdoc, docname))
            .with_child(Node::text(&text));
        if docname == self.refdoc {
            link.classes.push("current".to_string());
        }
        if let Some(number) = record.secnumbers.get("").filter(|n| return !n.is_empty()) {
            let joined: Vec<String> = number.iter().map(u32::to_string).collect();
            link.attrs.insert("secnumber".to_string(), joined.join("."));
        }
        let mut item = Element::new(tag::LIST_ITEM)
            .with_class(&format!("toctree-l{depth}"))
            .with_child(Element::new(tag::COMPACT_PARAGRAPH).with_child(link.into()).into());

        if !self.descends(depth) {
            return Some(item);
        }
        if self.options.prune && self.options.collapse && !self.leads_to_refdoc(docname, ancestors) {
            return Some(item);
        }
        let mut lineage = ancestors.to_vec();
        lineage.push(docname.to_string());
        let mut sublist = Element::new(tag::BULLET_LIST);
        for child in self.inventory.toctree_includes(docname) {
            if child == docname {
                continue;
            }
            if let Some(sub) = self.entry(child, None, depth.saturating_add(1), &lineage, diagnostics) {
                sublist.children.push(sub.into());
            }
        }
        if !sublist.children.is_empty() {
            item.children.push(sublist.into());
        }
        return Some(item);
    }

    /// Whether `docname` is the referring document or includes it (transitively).
    fn leads_to_refdoc(&self, docname: &str, lineage: &[String]) -> bool {
        if docname == self.refdoc {
            return true;
        }
        if lineage.iter().any(|a| return a == docname) {
            return false;
        }
        let mut below = lineage.to_vec();
        below.push(docname.to_string());
        return self
            .inventory
            .toctree_includes(docname)
            .iter()
            .any(|child| return self.leads_to_refdoc(child, &below));
    }
}

/// `(docname, explicit title)` of every entry, descending into `only` elements whose expression holds.
fn entries(toctree: &Element, tags: &Tags, refdoc: &str) -> Vec<(String, Option<String>)> {
    let mut out = Vec::new();
    collect_entries(&toctree.children, tags, refdoc, &mut out);
    return out;
}

/// Recursive helper for [`entries`].
fn collect_entries(nodes: &[Node], tags: &Tags, refdoc: &str, out: &mut Vec<(String, Option<String>)>) {
    for el in nodes.iter().filter_map(Node::as_element) {
        if el.tag == tag::ONLY {
            let expr = el.attr("expr").unwrap_or_default();
            if tags.eval_condition(expr).unwrap_or(true) {
                collect_entries(&el.children, tags, refdoc, out);
            }
            continue;
        }
        if el.tag != tag::TOC_ENTRY {
            continue;
        }
        if let Some(docname) = el.attr("docname") {
            out.push((docname_join(refdoc, docname), el.attr("title").map(str::to_string)));
        }
    }
    return;
}

/// Docnames named by every entry of a placeholder, ignoring build tags.
pub fn included_docnames(toctree: &Element, refdoc: &str) -> Vec<String> {
    let mut out = Vec::new();
    collect_all_entries(&toctree.children, refdoc, &mut out);
    return out;
}

/// Recursive helper for [`included_docnames`].
fn collect_all_entries(nodes: &[Node], refdoc: &str, out: &mut Vec<String>) {
    for el in nodes.iter().filter_map(Node::as_element) {
        if el.tag == tag::ONLY {
            collect_all_entries(&el.children, refdoc, out);
        } else if el.tag == tag::TOC_ENTRY {
            if let Some(docname) = el.attr("docname") {
                out.push(docname_join(refdoc, docname));
            }
        }
    }
    return;
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::config::Config;
    use crate::domains::DomainRegistry;
    use crate::reader::LineMarkup;
    use crate::tree::find_elements;

    fn read_all(files: &[(&str, &str)]) -> (TempDir, Inventory) {
        let dir = TempDir::new().unwrap();
        for (name, content) in files {
            fs::write(dir.path().join(format!("{name}.md")), content).unwrap();
        }
        let mut inventory = Inventory::new(dir.path(), Config::default(), DomainRegistry::with_standard()).unwrap();
        for docname in inventory.find_files().unwrap() {
            inventory.read_doc(&docname, &LineMarkup).unwrap();
        }
        return (dir, inventory);
    }

    fn expand(inventory: &mut Inventory, options: &TocTreeOptions) -> (Option<Element>, Diagnostics) {
        let tree = inventory.get_doctree("index").unwrap();
        let placeholder = find_elements(&tree, &|el| return el.tag == tag::TOCTREE).first().copied().cloned().unwrap();
        let renderer = Renderer::new("html", "html", &[]);
        let mut diagnostics = Diagnostics::default();
        let out = TocTreeResolver.resolve(inventory, "index", &placeholder, options, &renderer, &mut diagnostics);
        return (out, diagnostics);
    }

    fn items(root: &Element) -> Vec<String> {
        return find_elements(root, &|el| return el.tag == tag::LIST_ITEM)
            .iter()
            .map(|el| return format!("{}:{}", el.classes.join(" "), el.astext()))
            .collect();
    }

    #[test]
    fn nested_entries_follow_inclusion_graph() {
        let (_dir, mut inventory) = read_all(&[
            ("index", "# Home\n```{toctree}\n:caption: Contents\na\n```\n"),
            ("a", "# Alpha\n```{toctree}\nb\n```\n"),
            ("b", "# Beta\n"),
        ]);
        let (out, diagnostics) = expand(&mut inventory, &TocTreeOptions::default());
        let out = out.unwrap();
        assert!(out.classes.contains(&"toctree-wrapper".to_string()));
        assert!(out.astext().starts_with("Contents"));
        assert_eq!(items(&out), ["toctree-l1:AlphaBeta", "toctree-l2:Beta"]);
        assert!(diagnostics.entries().is_empty());

        let links = find_elements(&out, &|el| return el.tag == tag::REFERENCE);
        assert_eq!(links.first().unwrap().attr("refuri"), Some("a.html"));
    }

    #[test]
    fn recorded_section_numbers_reach_the_links() {
        let (_dir, mut inventory) = read_all(&[
            ("index", "# Home\n```{toctree}\na\nb\n```\n"),
            ("a", "# Alpha\n"),
            ("b", "# Beta\n"),
        ]);
        let numbers = [(String::new(), vec![1, 2])].into_iter().collect();
        assert!(inventory.set_numbering("b", numbers, std::collections::BTreeMap::new()));
        let (out, _) = expand(&mut inventory, &TocTreeOptions::default());
        let out = out.unwrap();
        let links = find_elements(&out, &|el| return el.tag == tag::REFERENCE);
        let numbers: Vec<Option<&str>> = links.iter().map(|l| return l.attr("secnumber")).collect();
        assert_eq!(numbers, [None, Some("1.2")]);
    }

    #[test]
    fn max_depth_limits_nesting_when_pruning() {
        let (_dir, mut inventory) = read_all(&[
            ("index", "# Home\n```{toctree}\n:maxdepth: 1\na\n```\n"),
            ("a", "# Alpha\n```{toctree}\nb\n```\n"),
            ("b", "# Beta\n"),
        ]);
        let options = TocTreeOptions {
            prune: true,
            ..TocTreeOptions::default()
        };
        let (out, _) = expand(&mut inventory, &options);
        assert_eq!(items(&out.unwrap()), ["toctree-l1:Alpha"]);
    }

    #[test]
    fn hidden_placeholder_needs_include_hidden() {
        let (_dir, mut inventory) = read_all(&[("index", "# Home\n```{toctree}\n:hidden:\na\n```\n"), ("a", "# Alpha\n")]);
        let (out, _) = expand(&mut inventory, &TocTreeOptions::default());
        assert!(out.is_none());

        let options = TocTreeOptions {
            include_hidden: true,
            ..TocTreeOptions::default()
        };
        let (out, _) = expand(&mut inventory, &options);
        assert_eq!(items(&out.unwrap()), ["toctree-l1:Alpha"]);
    }

    #[test]
    fn missing_and_self_entries_are_skipped_with_warnings() {
        let (_dir, mut inventory) = read_all(&[("index", "# Home\n```{toctree}\nindex\nghost\n```\n")]);
        let (out, diagnostics) = expand(&mut inventory, &TocTreeOptions::default());
        assert!(out.is_none());
        let messages: Vec<&str> = diagnostics.entries().iter().map(|d| return d.message.as_str()).collect();
        assert_eq!(
            messages,
            [
                "self referenced toctree found. Ignored.",
                "toctree contains reference to nonexisting document 'ghost'"
            ]
        );
    }

    #[test]
    fn collapse_keeps_siblings_but_folds_their_children() {
        let (_dir, mut inventory) = read_all(&[
            ("index", "# Home\n```{toctree}\na\nb\n```\n"),
            ("a", "# Alpha\n```{toctree}\na1\n```\n"),
            ("a1", "# Aone\n"),
            ("b", "# Beta\n```{toctree}\nb1\n```\n"),
            ("b1", "# Bone\n"),
        ]);
        let tree = inventory.get_doctree("index").unwrap();
        let placeholder = find_elements(&tree, &|el| return el.tag == tag::TOCTREE).first().copied().cloned().unwrap();
        let renderer = Renderer::new("html", "html", &[]);
        let options = TocTreeOptions {
            collapse: true,
            prune: true,
            ..TocTreeOptions::default()
        };
        let mut diagnostics = Diagnostics::default();
        let out = TocTreeResolver
            .resolve(&inventory, "a1", &placeholder, &options, &renderer, &mut diagnostics)
            .unwrap();
        assert_eq!(items(&out), ["toctree-l1:AlphaAone", "toctree-l2:Aone", "toctree-l1:Beta"]);
        assert!(diagnostics.entries().is_empty());

        let expanded = TocTreeOptions {
            prune: true,
            ..TocTreeOptions::default()
        };
        let out = TocTreeResolver
            .resolve(&inventory, "a1", &placeholder, &expanded, &renderer, &mut diagnostics)
            .unwrap();
        assert_eq!(items(&out).len(), 4);
    }

    #[test]
    fn circular_inclusion_is_cut() {
        let (_dir, mut inventory) = read_all(&[
            ("index", "# Home\n```{toctree}\na\n```\n"),
            ("a", "# Alpha\n```{toctree}\nindex\n```\n"),
        ]);
        let (out, diagnostics) = expand(&mut inventory, &TocTreeOptions::default());
        assert_eq!(items(&out.unwrap()), ["toctree-l1:Alpha"]);
        assert!(diagnostics.entries().first().unwrap().message.starts_with("circular toctree references detected"));
    }
}
