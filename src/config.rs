//! Project configuration (`doctrack.toml`) and configuration-change classification.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::hasher::{ValueDigest, digest_value};

/// Name of the configuration file looked up in the source root.
pub const CONFIG_FILE: &str = "doctrack.toml";

/// Number of changed keys listed before the report is truncated.
const CHANGED_KEYS_SHOWN: usize = 5;

/// Project configuration loaded from `doctrack.toml`.
/// Include/exclude patterns are path prefixes applied to source files.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding parsed-tree artifacts and the inventory snapshot, relative to the root.
    pub artifacts_dir: PathBuf,
    /// Default role for references without an explicit kind.
    pub default_role: String,
    /// Path prefixes never scanned for documents.
    pub exclude: Vec<String>,
    /// Declared plugin set; any change forces a full rebuild.
    pub extensions: Vec<String>,
    /// Path prefixes scanned for documents (empty means everything).
    pub include: Vec<String>,
    /// Literal `(kind, target)` pairs never reported as missing.
    pub nitpick_ignore: Vec<(String, String)>,
    /// `(kind pattern, target pattern)` pairs never reported as missing (full match).
    pub nitpick_ignore_regex: Vec<(String, String)>,
    /// Strict mode: warn about every unresolved reference.
    pub nitpicky: bool,
    /// Domain used as the default while reading documents.
    pub primary_domain: String,
    /// Docname at the root of the navigation tree.
    pub root_doc: String,
    /// File suffix identifying documents.
    pub source_suffix: String,
    /// Active build tags for visibility conditionals.
    pub tags: Vec<String>,
    /// Plugin-defined values.
    pub values: BTreeMap<String, PluginValue>,
    /// Verbosity of configuration-change reports.
    pub verbosity: u8,
}

/// Digest of every configuration value, persisted with the inventory so the next
/// run can tell what changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFingerprint {
    /// Declared plugin set in declaration order.
    pub extensions: Vec<String>,
    /// Key -> digest and rebuild class.
    pub values: BTreeMap<String, FingerprintEntry>,
}

/// How a new configuration relates to the one recorded in the inventory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigStatus {
    /// A value affecting parsing changed; the first such key is reported.
    Changed {
        /// Key whose value changed.
        key: String,
    },
    /// The declared plugin set changed.
    ExtensionsChanged {
        /// Symmetric difference of the old and new plugin sets.
        extensions: Vec<String>,
    },
    /// There was no previous configuration.
    New,
    /// Nothing relevant to parsing changed.
    Ok,
}

/// One fingerprinted configuration value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintEntry {
    /// Digest of the value.
    pub digest: ValueDigest,
    /// What a change of this value invalidates.
    pub rebuild: Rebuild,
}

/// A plugin-defined configuration value.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PluginValue {
    /// What a change of this value invalidates.
    #[serde(default)]
    pub rebuild: Rebuild,
    /// The value itself.
    pub value: toml::Value,
}

/// What a configuration change invalidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rebuild {
    /// Parsed documents: every document must be re-read.
    Env,
    /// Nothing tracked by the inventory.
    #[default]
    None,
    /// Rendered output only.
    Output,
}

impl Config {
    /// Directory holding artifacts, resolved against the source root.
    pub fn artifacts_path(&self, root: &Path) -> PathBuf {
        return root.join(&self.artifacts_dir);
    }

    /// Fingerprint every value for persistence and later comparison.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if a value cannot be rendered.
    pub fn fingerprint(&self) -> Result<ConfigFingerprint, Error> {
        let mut values = BTreeMap::new();
        let builtin: [(&str, serde_json::Value, Rebuild); 9] = [
            ("default_role", serde_json::to_value(&self.default_role)?, Rebuild::Env),
            ("exclude", serde_json::to_value(&self.exclude)?, Rebuild::Env),
            ("include", serde_json::to_value(&self.include)?, Rebuild::Env),
            ("nitpick_ignore", serde_json::to_value(&self.nitpick_ignore)?, Rebuild::Output),
            ("nitpick_ignore_regex", serde_json::to_value(&self.nitpick_ignore_regex)?, Rebuild::Output),
            ("nitpicky", serde_json::to_value(self.nitpicky)?, Rebuild::Output),
            ("primary_domain", serde_json::to_value(&self.primary_domain)?, Rebuild::Env),
            ("root_doc", serde_json::to_value(&self.root_doc)?, Rebuild::Env),
            ("source_suffix", serde_json::to_value(&self.source_suffix)?, Rebuild::Env),
        ];
        for (key, value, rebuild) in builtin {
            values.insert(key.to_string(), FingerprintEntry { digest: digest_value(&value), rebuild });
        }
        for (key, plugin) in &self.values {
            let value = serde_json::to_value(&plugin.value)?;
            values.insert(key.clone(), FingerprintEntry {
                digest: digest_value(&value),
                rebuild: plugin.rebuild,
            });
        }
        return Ok(ConfigFingerprint {
            extensions: self.extensions.clone(),
            values,
        });
    }

    /// Load config from `doctrack.toml` in the given root directory.
    /// Returns defaults if the file doesn't exist.
    /// Returns an error if the file exists but is malformed; it never silently
    /// falls back to defaults when the user wrote a config file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if reading fails (other than not-found),
    /// or `Error::TomlDe` if the TOML is malformed.
    pub fn load(root: &Path) -> Result<Self, Error> {
        let path = root.join(CONFIG_FILE);
        let content = match std::fs::read_to_string(&path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(Error::Io(e)),
            Ok(c) => c,
        };
        return Ok(toml::from_str(&content)?);
    }

    /// Check whether a source path (relative to the root, `/`-separated) should be scanned.
    ///
    /// A path is included if no include patterns are set (scan everything),
    /// or if the path starts with at least one include pattern.
    /// An included path is then excluded if it starts with any exclude pattern.
    pub fn should_scan(&self, relative_path: &str) -> bool {
        let included = self.include.is_empty()
            || self.include.iter().any(|p| return relative_path.starts_with(p.as_str()));

        if !included {
            return false;
        }

        return !self.exclude.iter().any(|p| return relative_path.starts_with(p.as_str()));
    }
}

impl Default for Config {
    /// Defaults that scan everything below the root for `.md` documents.
    fn default() -> Self {
        return Self {
            artifacts_dir: PathBuf::from("_build/doctrees"),
            default_role: String::new(),
            exclude: Vec::new(),
            extensions: Vec::new(),
            include: Vec::new(),
            nitpick_ignore: Vec::new(),
            nitpick_ignore_regex: Vec::new(),
            nitpicky: false,
            primary_domain: "std".to_string(),
            root_doc: "index".to_string(),
            source_suffix: ".md".to_string(),
            tags: Vec::new(),
            values: BTreeMap::new(),
            verbosity: 0,
        };
    }
}

impl ConfigStatus {
    /// Whether every discovered document must be reprocessed.
    pub const fn forces_rebuild(&self) -> bool {
        return !matches!(self, ConfigStatus::Ok);
    }

    /// Short human-readable reason, empty when nothing changed.
    pub fn reason(&self) -> String {
        return match self {
            ConfigStatus::Changed { key } => format!("config changed ('{key}')"),
            ConfigStatus::ExtensionsChanged { extensions } => match extensions.as_slice() {
                [single] => format!("extensions changed ('{single}')"),
                many => format!("extensions changed ({})", many.len()),
            },
            ConfigStatus::New => "new config".to_string(),
            ConfigStatus::Ok => String::new(),
        };
    }
}

/// Classify the difference between the recorded and the current configuration.
///
/// The plugin set is checked first, then every key flagged [`Rebuild::Env`].
/// Changed keys of any class are reported through `tracing` at info level.
pub fn classify_config_change(
    old: Option<&ConfigFingerprint>,
    new: &ConfigFingerprint,
    verbosity: u8,
) -> ConfigStatus {
    let Some(old) = old else {
        return ConfigStatus::New;
    };

    if old.extensions != new.extensions {
        let before: BTreeSet<&String> = old.extensions.iter().collect();
        let after: BTreeSet<&String> = new.extensions.iter().collect();
        let extensions = before
            .symmetric_difference(&after)
            .map(|e| return (*e).clone())
            .collect();
        return ConfigStatus::ExtensionsChanged { extensions };
    }

    let changed = differing_keys(old, new);
    if let Some(report) = describe_changed_keys(&changed, verbosity) {
        tracing::info!("The configuration has changed ({report})");
    }

    for (key, entry) in &new.values {
        if entry.rebuild != Rebuild::Env {
            continue;
        }
        let same = old.values.get(key).is_some_and(|o| return o.digest == entry.digest);
        if !same {
            return ConfigStatus::Changed { key: key.clone() };
        }
    }

    return ConfigStatus::Ok;
}

/// Render the changed-key report: one key, all keys when few (or verbose), else the first few.
pub fn describe_changed_keys(changed: &BTreeSet<String>, verbosity: u8) -> Option<String> {
    let quoted: Vec<String> = changed.iter().map(|k| return format!("'{k}'")).collect();
    return match quoted.as_slice() {
        [] => None,
        [single] => Some(format!("1 option: {single}")),
        many if many.len() <= CHANGED_KEYS_SHOWN || verbosity >= 1 => {
            Some(format!("{} options: {}", many.len(), many.join(", ")))
        },
        many => {
            let shown = many.iter().take(CHANGED_KEYS_SHOWN).cloned().collect::<Vec<_>>().join(", ");
            Some(format!("{} options: {shown}, ...", many.len()))
        },
    };
}

/// Keys present in only one fingerprint or whose digests differ.
fn differing_keys(old: &ConfigFingerprint, new: &ConfigFingerprint) -> BTreeSet<String> {
    let mut keys: BTreeSet<String> = BTreeSet::new();
    for (key, entry) in &old.values {
        match new.values.get(key) {
            Some(other) if other.digest == entry.digest => {},
            Some(_) | None => {
                keys.insert(key.clone());
            },
        }
    }
    for key in new.values.keys() {
        if !old.values.contains_key(key) {
            keys.insert(key.clone());
        }
    }
    return keys;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fingerprint(config: &Config) -> ConfigFingerprint {
        return config.fingerprint().unwrap();
    }

    #[test]
    fn no_previous_config_is_new() {
        let config = Config::default();
        assert_eq!(classify_config_change(None, &fingerprint(&config), 0), ConfigStatus::New);
    }

    #[test]
    fn unchanged_config_is_ok() {
        let config = Config::default();
        let fp = fingerprint(&config);
        assert_eq!(classify_config_change(Some(&fp), &fp, 0), ConfigStatus::Ok);
    }

    #[test]
    fn extension_change_reports_symmetric_difference() {
        let old = Config { extensions: vec!["a".into(), "b".into()], ..Config::default() };
        let new = Config { extensions: vec!["b".into(), "c".into()], ..Config::default() };
        let status = classify_config_change(Some(&fingerprint(&old)), &fingerprint(&new), 0);
        assert_eq!(status, ConfigStatus::ExtensionsChanged {
            extensions: vec!["a".to_string(), "c".to_string()],
        });
        assert!(status.forces_rebuild());
    }

    #[test]
    fn env_key_change_forces_rebuild() {
        let old = Config::default();
        let new = Config { root_doc: "contents".into(), ..Config::default() };
        let status = classify_config_change(Some(&fingerprint(&old)), &fingerprint(&new), 0);
        assert_eq!(status, ConfigStatus::Changed { key: "root_doc".to_string() });
    }

    #[test]
    fn output_only_change_is_ok() {
        let old = Config::default();
        let new = Config { nitpicky: true, ..Config::default() };
        let status = classify_config_change(Some(&fingerprint(&old)), &fingerprint(&new), 0);
        assert_eq!(status, ConfigStatus::Ok);
    }

    #[test]
    fn plugin_value_flagged_env_forces_rebuild() {
        let old = Config::default();
        let mut new = Config::default();
        new.values.insert("project".into(), PluginValue {
            rebuild: Rebuild::Env,
            value: toml::Value::String("demo".into()),
        });
        let status = classify_config_change(Some(&fingerprint(&old)), &fingerprint(&new), 0);
        assert_eq!(status, ConfigStatus::Changed { key: "project".to_string() });
    }

    #[test]
    fn changed_key_report_is_capped() {
        let keys: BTreeSet<String> = ["a", "b", "c", "d", "e", "f", "g"].iter().map(|k| k.to_string()).collect();
        assert_eq!(
            describe_changed_keys(&keys, 0).unwrap(),
            "7 options: 'a', 'b', 'c', 'd', 'e', ..."
        );
        assert!(describe_changed_keys(&keys, 1).unwrap().ends_with("'g'"));
        let one: BTreeSet<String> = std::iter::once("a".to_string()).collect();
        assert_eq!(describe_changed_keys(&one, 0).unwrap(), "1 option: 'a'");
        assert!(describe_changed_keys(&BTreeSet::new(), 0).is_none());
    }

    #[test]
    fn should_scan_honors_prefixes() {
        let config = Config {
            exclude: vec!["docs/archive/".into()],
            include: vec!["docs/".into()],
            ..Config::default()
        };
        assert!(config.should_scan("docs/guide.md"));
        assert!(!config.should_scan("docs/archive/old.md"));
        assert!(!config.should_scan("README.md"));
    }

    #[test]
    fn load_parses_toml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "root_doc = \"contents\"\nnitpicky = true\nnitpick_ignore = [[\"ref\", \"missing\"]]\n\
             [values.project]\nvalue = \"demo\"\nrebuild = \"env\"\n",
        )
        .unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.root_doc, "contents");
        assert!(config.nitpicky);
        assert_eq!(config.nitpick_ignore, vec![("ref".to_string(), "missing".to_string())]);
        assert_eq!(config.values.get("project").unwrap().rebuild, Rebuild::Env);
        assert_eq!(config.source_suffix, ".md");
    }

    #[test]
    fn malformed_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "root_doc = [").unwrap();
        assert!(matches!(Config::load(dir.path()), Err(Error::TomlDe(_))));
    }
}
