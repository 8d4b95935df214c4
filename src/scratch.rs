//! Per-document scratch state used while one document is being read.
//!
//! The context has a fixed set of well-known fields plus an open extension
//! map for plugin keys. Both are reachable through one key-based interface;
//! a static key table decides which storage a key lives in.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::Error;

/// A value stored in, or read from, the scratch context.
#[derive(Debug, Clone, PartialEq)]
pub enum ScratchValue {
    /// Boolean flag.
    Bool(bool),
    /// Integer (timestamps, counters).
    Int(i64),
    /// Structured plugin data.
    Json(serde_json::Value),
    /// Ordered list of names (namespace stacks).
    List(Vec<String>),
    /// Absent optional value.
    Null,
    /// Text.
    Text(String),
}

/// Transient per-document state. Created fresh when reading starts and replaced
/// by an empty instance when reading finishes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScratchContext {
    /// Most recently added C declaration.
    pub c_last_symbol: Option<String>,
    /// C namespace scope stack.
    pub c_namespace_stack: Vec<String>,
    /// Enclosing C declaration.
    pub c_parent_symbol: Option<String>,
    /// Most recently added C++ declaration.
    pub cpp_last_symbol: Option<String>,
    /// C++ namespace scope stack.
    pub cpp_namespace_stack: Vec<String>,
    /// Enclosing C++ declaration.
    pub cpp_parent_symbol: Option<String>,
    /// Default domain for the document.
    pub default_domain: Option<String>,
    /// Default role for the document.
    pub default_role: String,
    /// Docname currently being processed.
    pub docname: String,
    /// Plugin-defined keys.
    extension: BTreeMap<String, ScratchValue>,
    /// Highlighting language override.
    pub highlight_language: String,
    /// Name of the object currently being described.
    pub object_name: String,
    /// Handle (name) of the parser reading the document.
    pub parser: Option<String>,
    /// When reading began, in microseconds since the epoch.
    pub reading_started_at: i64,
    /// Per-category serial number counters.
    serial_numbers: BTreeMap<String, u64>,
}

/// Fixed fields addressable by key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    /// `c:last_symbol`
    CLastSymbol,
    /// `c:namespace_stack`
    CNamespaceStack,
    /// `c:parent_symbol`
    CParentSymbol,
    /// `cpp:last_symbol`
    CppLastSymbol,
    /// `cpp:namespace_stack`
    CppNamespaceStack,
    /// `cpp:parent_symbol`
    CppParentSymbol,
    /// `default_domain`
    DefaultDomain,
    /// `default_role`
    DefaultRole,
    /// `docname`
    Docname,
    /// `highlight_language`
    HighlightLanguage,
    /// `object`
    ObjectName,
    /// `_parser`
    Parser,
    /// `started_at`
    StartedAt,
}

/// Static key table mapping well-known keys onto fixed fields.
const FIELDS: &[(&str, Field)] = &[
    ("_parser", Field::Parser),
    ("c:last_symbol", Field::CLastSymbol),
    ("c:namespace_stack", Field::CNamespaceStack),
    ("c:parent_symbol", Field::CParentSymbol),
    ("cpp:last_symbol", Field::CppLastSymbol),
    ("cpp:namespace_stack", Field::CppNamespaceStack),
    ("cpp:parent_symbol", Field::CppParentSymbol),
    ("default_domain", Field::DefaultDomain),
    ("default_role", Field::DefaultRole),
    ("docname", Field::Docname),
    ("highlight_language", Field::HighlightLanguage),
    ("object", Field::ObjectName),
    ("started_at", Field::StartedAt),
];

impl ScratchContext {
    /// Whether a key is present. Fixed keys always are, except the parent-symbol
    /// keys, which count only while set.
    pub fn contains(&self, key: &str) -> bool {
        return match field_for(key) {
            Some(Field::CParentSymbol) => self.c_parent_symbol.is_some(),
            Some(Field::CppParentSymbol) => self.cpp_parent_symbol.is_some(),
            Some(_) => true,
            None => self.extension.contains_key(key),
        };
    }

    /// Read a key from the fixed fields or the extension map.
    pub fn get(&self, key: &str) -> Option<ScratchValue> {
        let Some(field) = field_for(key) else {
            return self.extension.get(key).cloned();
        };
        return Some(match field {
            Field::CLastSymbol => optional(self.c_last_symbol.as_ref()),
            Field::CNamespaceStack => ScratchValue::List(self.c_namespace_stack.clone()),
            Field::CParentSymbol => optional(self.c_parent_symbol.as_ref()),
            Field::CppLastSymbol => optional(self.cpp_last_symbol.as_ref()),
            Field::CppNamespaceStack => ScratchValue::List(self.cpp_namespace_stack.clone()),
            Field::CppParentSymbol => optional(self.cpp_parent_symbol.as_ref()),
            Field::DefaultDomain => optional(self.default_domain.as_ref()),
            Field::DefaultRole => ScratchValue::Text(self.default_role.clone()),
            Field::Docname => ScratchValue::Text(self.docname.clone()),
            Field::HighlightLanguage => ScratchValue::Text(self.highlight_language.clone()),
            Field::ObjectName => ScratchValue::Text(self.object_name.clone()),
            Field::Parser => optional(self.parser.as_ref()),
            Field::StartedAt => ScratchValue::Int(self.reading_started_at),
        });
    }

    /// Every key currently present, sorted.
    pub fn keys(&self) -> BTreeSet<String> {
        let mut keys: BTreeSet<String> = FIELDS
            .iter()
            .map(|(k, _)| return (*k).to_string())
            .filter(|k| return self.contains(k))
            .collect();
        keys.extend(self.extension.keys().cloned());
        return keys;
    }

    /// Number of keys currently present.
    pub fn len(&self) -> usize {
        return self.keys().len();
    }

    /// A fresh context for reading `docname`.
    pub fn new(docname: &str, default_role: &str, default_domain: Option<String>) -> Self {
        return Self {
            default_domain,
            default_role: default_role.to_string(),
            docname: docname.to_string(),
            ..Self::default()
        };
    }

    /// Next serial number for `category`, unique within this document.
    pub fn new_serial_number(&mut self, category: &str) -> u64 {
        let counter = self.serial_numbers.entry(category.to_string()).or_insert(0);
        let current = *counter;
        *counter = current.saturating_add(1);
        return current;
    }

    /// The parser handle, which must have been set.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingParser` if no parser is set.
    pub fn parser(&self) -> Result<&str, Error> {
        return self.parser.as_deref().ok_or(Error::MissingParser);
    }

    /// Remove a key. Fixed fields are reset to their empty value (optional
    /// fields to absent) and the previous value is returned.
    pub fn remove(&mut self, key: &str) -> Option<ScratchValue> {
        let Some(field) = field_for(key) else {
            return self.extension.remove(key);
        };
        let previous = self.get(key);
        match field {
            Field::CLastSymbol => self.c_last_symbol = None,
            Field::CNamespaceStack => self.c_namespace_stack.clear(),
            Field::CParentSymbol => self.c_parent_symbol = None,
            Field::CppLastSymbol => self.cpp_last_symbol = None,
            Field::CppNamespaceStack => self.cpp_namespace_stack.clear(),
            Field::CppParentSymbol => self.cpp_parent_symbol = None,
            Field::DefaultDomain => self.default_domain = None,
            Field::DefaultRole => self.default_role.clear(),
            Field::Docname => self.docname.clear(),
            Field::HighlightLanguage => self.highlight_language.clear(),
            Field::ObjectName => self.object_name.clear(),
            Field::Parser => self.parser = None,
            Field::StartedAt => self.reading_started_at = 0,
        }
        return previous;
    }

    /// Write a key to its fixed field or to the extension map.
    ///
    /// # Errors
    ///
    /// Returns `Error::ScratchType` if a fixed field receives a value of the wrong type.
    pub fn set(&mut self, key: &str, value: ScratchValue) -> Result<(), Error> {
        let Some(field) = field_for(key) else {
            self.extension.insert(key.to_string(), value);
            return Ok(());
        };
        match field {
            Field::CLastSymbol => self.c_last_symbol = expect_optional(key, value)?,
            Field::CNamespaceStack => self.c_namespace_stack = expect_list(key, value)?,
            Field::CParentSymbol => self.c_parent_symbol = expect_optional(key, value)?,
            Field::CppLastSymbol => self.cpp_last_symbol = expect_optional(key, value)?,
            Field::CppNamespaceStack => self.cpp_namespace_stack = expect_list(key, value)?,
            Field::CppParentSymbol => self.cpp_parent_symbol = expect_optional(key, value)?,
            Field::DefaultDomain => self.default_domain = expect_optional(key, value)?,
            Field::DefaultRole => self.default_role = expect_text(key, value)?,
            Field::Docname => self.docname = expect_text(key, value)?,
            Field::HighlightLanguage => self.highlight_language = expect_text(key, value)?,
            Field::ObjectName => self.object_name = expect_text(key, value)?,
            Field::Parser => self.parser = expect_optional(key, value)?,
            Field::StartedAt => {
                let ScratchValue::Int(at) = value else {
                    return Err(type_error(key, "an integer"));
                };
                self.reading_started_at = at;
            },
        }
        return Ok(());
    }
}

/// Extract a list value.
fn expect_list(key: &str, value: ScratchValue) -> Result<Vec<String>, Error> {
    return match value {
        ScratchValue::List(items) => Ok(items),
        _ => Err(type_error(key, "a list")),
    };
}

/// Extract an optional text value (`Null` clears it).
fn expect_optional(key: &str, value: ScratchValue) -> Result<Option<String>, Error> {
    return match value {
        ScratchValue::Null => Ok(None),
        ScratchValue::Text(text) => Ok(Some(text)),
        _ => Err(type_error(key, "text or null")),
    };
}

/// Extract a text value.
fn expect_text(key: &str, value: ScratchValue) -> Result<String, Error> {
    return match value {
        ScratchValue::Text(text) => Ok(text),
        _ => Err(type_error(key, "text")),
    };
}

/// Look a key up in the static key table.
fn field_for(key: &str) -> Option<Field> {
    return FIELDS.iter().find(|(k, _)| return *k == key).map(|(_, f)| return *f);
}

/// Wrap an optional field as a value.
fn optional(value: Option<&String>) -> ScratchValue {
    return value.map_or(ScratchValue::Null, |v| return ScratchValue::Text(v.clone()));
}

/// Build a type-mismatch error.
fn type_error(key: &str, expected: &'static str) -> Error {
    return Error::ScratchType {
        expected,
        key: key.to_string(),
    };
}
