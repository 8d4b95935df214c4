//! The parser contract and a small built-in line-oriented markup parser.
//!
//! The built-in syntax is a subset of MyST-flavoured markdown:
//!
//! - `# Title`, `## Subtitle`: sections; `(label)=` on the line before a heading labels it.
//! - `:key: value` lines before the first heading: document metadata (`:orphan:`).
//! - `` {role}`target` `` and `` {role}`Title <target>` ``: cross-references;
//!   `domain:role` names a domain, `any` searches every domain.
//! - fenced directives opened with ```` ```{name} args ```` and closed with ```` ``` ````:
//!   `toctree`, `only`, `include`, `image`, `glossary` and `object`.

use std::collections::BTreeMap;

use regex::Regex;

use crate::error::Error;
use crate::inventory::Inventory;
use crate::tree::{Element, Node, PendingReference, tag};

/// Roles handled by the standard domain when no domain is named.
const STD_ROLES: &[&str] = &["doc", "ref", "term"];

/// What a parser returns for one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedDocument {
    /// Document-level metadata.
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// The parsed tree (tag `document`).
    pub tree: Element,
}

/// Turns document source into a tree with pending references and navigation placeholders.
/// Parsers may record dependencies, inclusions and assets on the inventory while parsing.
pub trait MarkupParser: Send + Sync {
    /// Handle stored in the scratch context while a document is read.
    fn name(&self) -> &str;

    /// Parse one document.
    ///
    /// # Errors
    ///
    /// Returns `Error::Parse` for malformed source; other errors propagate as document-level failures.
    fn parse(&self, docname: &str, source: &str, inventory: &mut Inventory) -> Result<ParsedDocument, Error>;
}

/// The built-in parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineMarkup;

/// Section stack used while building a tree.
struct TreeBuilder {
    /// Document root.
    root: Element,
    /// Open sections with their heading level, innermost last.
    sections: Vec<(usize, Element)>,
}

/// Shared state for one parse.
struct ParseState<'a> {
    /// Document being parsed.
    docname: &'a str,
    /// Inventory receiving dependencies and assets.
    inventory: &'a mut Inventory,
    /// Inline role pattern.
    role: Regex,
}

impl MarkupParser for LineMarkup {
    fn name(&self) -> &str {
        return "line-markup";
    }

    fn parse(&self, docname: &str, source: &str, inventory: &mut Inventory) -> Result<ParsedDocument, Error> {
        let role = Regex::new(r"\{([A-Za-z0-9_.:-]+)\}`([^`]+)`").map_err(|e| return parse_error(docname, &e.to_string()))?;
        let mut state = ParseState { docname, inventory, role };
        let mut builder = TreeBuilder::new(docname);
        let mut metadata = BTreeMap::new();
        let mut label: Option<String> = None;
        let mut seen_heading = false;
        let mut lines = source.lines();

        while let Some(raw) = lines.next() {
            let line = raw.trim_end();
            if let Some(rest) = line.strip_prefix("```{") {
                let (name, args) = rest.split_once('}').ok_or_else(|| {
                    return parse_error(docname, &format!("unterminated directive name: {line}"));
                })?;
                let mut body = Vec::new();
                let mut closed = false;
                for inner in lines.by_ref() {
                    if inner.trim_end() == "```" {
                        closed = true;
                        break;
                    }
                    body.push(inner.trim_end());
                }
                if !closed {
                    return Err(parse_error(docname, &format!("directive `{name}` is never closed")));
                }
                for node in state.directive(name, args.trim(), &body)? {
                    builder.push(node);
                }
                continue;
            }
            if line.trim().is_empty() {
                continue;
            }
            if let Some((level, title)) = heading(line) {
                seen_heading = true;
                builder.open_section(level, title, label.take());
                continue;
            }
            if let Some(name) = line.strip_prefix('(').and_then(|l| return l.strip_suffix(")=")) {
                label = Some(name.to_string());
                continue;
            }
            if !seen_heading {
                if let Some((key, value)) = field(line) {
                    metadata.insert(key.to_string(), serde_json::Value::String(value.to_string()));
                    continue;
                }
            }
            builder.push(state.paragraph(line.trim()));
        }

        return Ok(ParsedDocument {
            metadata,
            tree: builder.finish(),
        });
    }
}

impl ParseState<'_> {
    /// Expand one fenced directive into nodes.
    fn directive(&mut self, name: &str, args: &str, body: &[&str]) -> Result<Vec<Node>, Error> {
        return match name {
            "glossary" => Ok(body
                .iter()
                .map(|l| return l.trim())
                .filter(|l| return !l.is_empty())
                .map(|term| {
                    return Element::new(tag::TERM)
                        .with_id(&format!("term-{}", slug(term)))
                        .with_child(Node::text(term))
                        .into();
                })
                .collect()),
            "image" => {
                let (relative, absolute) = self.inventory.relfn2path(args, Some(self.docname));
                let unique = self.inventory.assets.add_image(self.docname, &relative);
                self.inventory.note_dependency(&absolute, None);
                Ok(vec![
                    Element::new("image")
                        .with_attr("candidate", &unique)
                        .with_attr("uri", &relative)
                        .into(),
                ])
            },
            "include" => {
                let (_, absolute) = self.inventory.relfn2path(args, Some(self.docname));
                let content = std::fs::read_to_string(&absolute).map_err(|e| {
                    return parse_error(self.docname, &format!("cannot include {}: {e}", absolute.display()));
                })?;
                self.inventory.note_dependency(&absolute, None);
                self.inventory.note_included(&absolute);
                Ok(content
                    .lines()
                    .map(str::trim)
                    .filter(|l| return !l.is_empty())
                    .map(|l| return self.paragraph(l))
                    .collect())
            },
            "object" => Ok(vec![self.object(args, body)?]),
            "only" => {
                let mut only = Element::new(tag::ONLY).with_attr("expr", args);
                for line in body.iter().map(|l| return l.trim()).filter(|l| return !l.is_empty()) {
                    only.children.push(self.paragraph(line));
                }
                Ok(vec![only.into()])
            },
            "toctree" => Ok(vec![toctree(self.docname, body).into()]),
            other => Err(parse_error(self.docname, &format!("unknown directive `{other}`"))),
        };
    }

    /// `{object} domain:objtype` with the signature on the first body line.
    fn object(&mut self, args: &str, body: &[&str]) -> Result<Node, Error> {
        let (domain, objtype) = args
            .split_once(':')
            .ok_or_else(|| return parse_error(self.docname, &format!("object needs `domain:type`, got `{args}`")))?;
        let mut lines = body.iter().map(|l| return l.trim()).filter(|l| return !l.is_empty());
        let signature = lines
            .next()
            .ok_or_else(|| return parse_error(self.docname, "object without a signature"))?;
        let sig = Element::new(tag::DESC_SIGNATURE)
            .with_id(&format!("{domain}-{}", slug(signature)))
            .with_child(Element::new("desc_sig_name").with_child(Node::text(signature)).into());
        let mut content = Element::new("desc_content");
        for line in lines {
            content.children.push(self.paragraph(line));
        }
        return Ok(Element::new(tag::DESC)
            .with_attr("domain", domain)
            .with_attr("objtype", objtype)
            .with_child(sig.into())
            .with_child(content.into())
            .into());
    }

    /// A paragraph with inline roles turned into pending references.
    fn paragraph(&mut self, line: &str) -> Node {
        let mut para = Element::new(tag::PARAGRAPH);
        let mut last = 0;
        let captures: Vec<(usize, usize, String, String)> = self
            .role
            .captures_iter(line)
            .filter_map(|cap| {
                let whole = cap.get(0)?;
                let role = cap.get(1)?.as_str().to_string();
                let content = cap.get(2)?.as_str().to_string();
                return Some((whole.start(), whole.end(), role, content));
            })
            .collect();
        for (start, end, role, content) in captures {
            if let Some(text) = line.get(last..start).filter(|t| return !t.is_empty()) {
                para.children.push(Node::text(text));
            }
            para.children.push(self.role(&role, &content));
            last = end;
        }
        if let Some(text) = line.get(last..).filter(|t| return !t.is_empty()) {
            para.children.push(Node::text(text));
        }
        return para.into();
    }

    /// One inline role.
    fn role(&mut self, role: &str, content: &str) -> Node {
        let (title, target) = explicit_title(content);
        if role == "download" {
            let (relative, absolute) = self.inventory.relfn2path(target, Some(self.docname));
            let unique = self.inventory.assets.add_download(self.docname, &relative);
            self.inventory.note_dependency(&absolute, None);
            return Element::new("download_reference")
                .with_attr("filename", &unique)
                .with_child(Node::text(title.unwrap_or(target)))
                .into();
        }

        let (domain, kind) = match role.split_once(':') {
            Some((domain, kind)) => (Some(domain.to_string()), kind.to_string()),
            None if role == "any" => (None, role.to_string()),
            None if STD_ROLES.contains(&role) => (Some("std".to_string()), role.to_string()),
            None => (self.inventory.scratch.default_domain.clone(), role.to_string()),
        };
        let is_std = domain.as_deref() == Some("std");
        let target = if is_std && kind == "ref" { target.to_lowercase() } else { target.to_string() };
        let classes: Vec<String> = match &domain {
            Some(d) => vec!["xref".to_string(), d.clone(), format!("{d}-{kind}")],
            None => vec!["xref".to_string(), kind.clone()],
        };
        let inner = Element {
            classes,
            ..Element::new(tag::INLINE).with_child(Node::text(title.unwrap_or(content)))
        };
        let mut attrs = BTreeMap::new();
        if title.is_some() {
            attrs.insert("refexplicit".to_string(), "true".to_string());
        }
        return Node::PendingXref(PendingReference {
            attrs,
            children: vec![inner.into()],
            domain,
            kind,
            refdoc: Some(self.docname.to_string()),
            self_referential: false,
            target,
            warn: is_std,
        });
    }
}

impl TreeBuilder {
    /// Close every section at or below `level`.
    fn close_to(&mut self, level: usize) {
        while self.sections.last().is_some_and(|(l, _)| return *l >= level) {
            let Some((_, section)) = self.sections.pop() else {
                break;
            };
            self.push(section.into());
        }
        return;
    }

    /// Close all sections and return the document.
    fn finish(mut self) -> Element {
        self.close_to(0);
        return self.root;
    }

    /// Empty document for `docname`.
    fn new(docname: &str) -> Self {
        return Self {
            root: Element::new(tag::DOCUMENT).with_attr("docname", docname),
            sections: Vec::new(),
        };
    }

    /// Start a section at heading `level`.
    fn open_section(&mut self, level: usize, title: &str, label: Option<String>) {
        self.close_to(level);
        let mut section = Element::new(tag::SECTION);
        match label {
            Some(label) => {
                section.ids.push(slug(&label));
                section.attrs.insert("label".to_string(), label);
            },
            None => section.ids.push(slug(title)),
        }
        section.children.push(Element::new(tag::TITLE).with_child(Node::text(title)).into());
        self.sections.push((level, section));
        return;
    }

    /// Append a node to the innermost open section, or to the document.
    fn push(&mut self, node: Node) {
        match self.sections.last_mut() {
            Some((_, section)) => section.children.push(node),
            None => self.root.children.push(node),
        }
        return;
    }
}

/// Nested bullet list of a document's sections, linking to their anchors.
pub fn section_toc(tree: &Element) -> Option<Node> {
    let list = section_list(tree);
    return (!list.children.is_empty()).then(|| return list.into());
}

/// Recursive helper for [`section_toc`].
fn section_list(parent: &Element) -> Element {
    let mut list = Element::new(tag::BULLET_LIST);
    for section in parent.children.iter().filter_map(Node::as_element).filter(|el| return el.tag == tag::SECTION) {
        let title = section
            .children
            .iter()
            .filter_map(Node::as_element)
            .find(|el| return el.tag == tag::TITLE)
            .map(Element::astext)
            .unwrap_or_default();
        let anchor = section.ids.first().map(|id| return format!("#{id}")).unwrap_or_default();
        let link = Element::new(tag::REFERENCE)
            .with_attr("anchorname", &anchor)
            .with_attr("internal", "true")
            .with_child(Node::text(&title));
        let mut item = Element::new(tag::LIST_ITEM).with_child(Element::new(tag::COMPACT_PARAGRAPH).with_child(link.into()).into());
        let nested = section_list(section);
        if !nested.children.is_empty() {
            item.children.push(nested.into());
        }
        list.children.push(item.into());
    }
    return list;
}

/// First title of a parsed tree.
pub fn first_title(tree: &Element) -> Option<Node> {
    return crate::tree::find_elements(tree, &|el| return el.tag == tag::TITLE)
        .first()
        .map(|el| return Node::Element((*el).clone()));
}

/// Split `Title <target>` into its parts; plain content is its own target.
fn explicit_title(content: &str) -> (Option<&str>, &str) {
    if let Some(open) = content.rfind('<') {
        if content.ends_with('>') {
            let title = content.get(..open).map(str::trim).filter(|t| return !t.is_empty());
            let target = content.get(open.saturating_add(1)..content.len().saturating_sub(1));
            if let (Some(title), Some(target)) = (title, target) {
                return (Some(title), target.trim());
            }
        }
    }
    return (None, content);
}

/// `:key: value` field line.
fn field(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix(':')?;
    let (key, value) = rest.split_once(':')?;
    if key.is_empty() || key.contains(char::is_whitespace) {
        return None;
    }
    return Some((key, value.trim()));
}

/// `#`-prefixed heading: level and title.
fn heading(line: &str) -> Option<(usize, &str)> {
    let level = line.chars().take_while(|c| return *c == '#').count();
    if level == 0 {
        return None;
    }
    let title = line.get(level..)?.strip_prefix(' ')?.trim();
    if title.is_empty() {
        return None;
    }
    return Some((level, title));
}

/// Build a parse error for `docname`.
fn parse_error(docname: &str, reason: &str) -> Error {
    return Error::Parse {
        docname: docname.to_string(),
        reason: reason.to_string(),
    };
}

/// Lowercase identifier made of alphanumerics and dashes.
fn slug(text: &str) -> String {
    let mut out = String::new();
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
        } else if !out.ends_with('-') && !out.is_empty() {
            out.push('-');
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    return out;
}

/// Navigation placeholder from a `toctree` directive body.
fn toctree(docname: &str, body: &[&str]) -> Element {
    let mut toctree = Element::new(tag::TOCTREE).with_attr("parent", docname);
    for line in body.iter().map(|l| return l.trim()).filter(|l| return !l.is_empty()) {
        if let Some((key, value)) = field(line) {
            let value = if value.is_empty() { "true" } else { value };
            toctree.attrs.insert(key.to_string(), value.to_string());
            continue;
        }
        let (title, target) = explicit_title(line);
        let mut entry = Element::new(tag::TOC_ENTRY).with_attr("docname", target);
        if let Some(title) = title {
            entry.attrs.insert("title".to_string(), title.to_string());
        }
        toctree.children.push(entry.into());
    }
    return toctree;
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::config::Config;
    use crate::domains::DomainRegistry;
    use crate::tree::find_elements;

    fn parse(source: &str) -> ParsedDocument {
        let mut inventory = Inventory::new(Path::new("/docs"), Config::default(), DomainRegistry::with_standard()).unwrap();
        inventory.prepare_settings("guide/index");
        return LineMarkup.parse("guide/index", source, &mut inventory).unwrap();
    }

    #[test]
    fn headings_nest_into_sections() {
        let doc = parse("# Guide\n\nintro\n\n(setup)=\n## Setup\n\ntext\n\n## Usage\n");
        let top: Vec<&Element> = doc.tree.children.iter().filter_map(Node::as_element).collect();
        assert_eq!(top.len(), 1);
        let guide = top.first().unwrap();
        let subsections = find_elements(guide, &|el| return el.tag == tag::SECTION);
        assert_eq!(subsections.len(), 2);
        assert_eq!(subsections.first().unwrap().attr("label"), Some("setup"));
        assert_eq!(first_title(&doc.tree).unwrap().astext(), "Guide");
    }

    #[test]
    fn leading_fields_are_metadata() {
        let doc = parse(":orphan:\n:author: Ada\n# Title\n:not: metadata\n");
        assert!(doc.metadata.contains_key("orphan"));
        assert_eq!(doc.metadata.get("author"), Some(&serde_json::json!("Ada")));
        assert!(!doc.metadata.contains_key("not"));
    }

    #[test]
    fn roles_become_pending_references() {
        let doc = parse("See {ref}`Setup Guide <Setup>` and {any}`thing` or {py:func}`run`.");
        let para = doc.tree.children.first().and_then(Node::as_element).unwrap();
        let pendings: Vec<&PendingReference> = para
            .children
            .iter()
            .filter_map(|n| return if let Node::PendingXref(p) = n { Some(p) } else { None })
            .collect();
        assert_eq!(pendings.len(), 3);
        let r = pendings.first().unwrap();
        assert_eq!((r.domain.as_deref(), r.kind.as_str(), r.target.as_str()), (Some("std"), "ref", "setup"));
        assert!(r.is_explicit());
        assert!(r.warn);
        let any = pendings.get(1).unwrap();
        assert_eq!(any.domain, None);
        assert!(!any.warn);
        let func = pendings.get(2).unwrap();
        assert_eq!(func.domain.as_deref(), Some("py"));
        assert_eq!(para.astext(), "See Setup Guide and thing or run.");
    }

    #[test]
    fn toctree_directive_builds_placeholder() {
        let doc = parse("```{toctree}\n:maxdepth: 2\n:hidden:\nintro\nAPI <api/index>\n```\n");
        let toc = doc.tree.children.first().and_then(Node::as_element).unwrap();
        assert_eq!(toc.tag, tag::TOCTREE);
        assert_eq!(toc.attr("maxdepth"), Some("2"));
        assert!(toc.flag("hidden"));
        let entries: Vec<(Option<&str>, Option<&str>)> = toc
            .children
            .iter()
            .filter_map(Node::as_element)
            .map(|e| return (e.attr("docname"), e.attr("title")))
            .collect();
        assert_eq!(entries, [(Some("intro"), None), (Some("api/index"), Some("API"))]);
    }

    #[test]
    fn unclosed_directive_is_a_parse_error() {
        let mut inventory = Inventory::new(Path::new("/docs"), Config::default(), DomainRegistry::with_standard()).unwrap();
        let err = LineMarkup.parse("a", "```{only} html\ntext\n", &mut inventory).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn section_toc_mirrors_structure() {
        let doc = parse("# A\n## B\n## C\n");
        let toc = section_toc(&doc.tree).unwrap();
        assert_eq!(toc.astext(), "ABC");
    }

    #[test]
    fn slug_and_heading_helpers() {
        assert_eq!(slug("Hello, World!"), "hello-world");
        assert_eq!(heading("## Setup"), Some((2, "Setup")));
        assert_eq!(heading("#hashtag"), None);
        assert_eq!(explicit_title("Title <target>"), (Some("Title"), "target"));
        assert_eq!(explicit_title("<weird>"), (None, "<weird>"));
    }
}
