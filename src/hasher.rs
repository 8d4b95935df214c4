/// Stable digests of configuration values for change classification.
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

/// A value digest: 64 lowercase hex chars.
/// Newtype prevents mixing with arbitrary strings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValueDigest(
    /// The hex-encoded SHA-256 digest string.
    pub String,
);

/// Digest a JSON value through its canonical rendering.
///
/// Object keys are already ordered (serde_json maps are sorted), so equal
/// values always render, and therefore hash, identically.
pub fn digest_value(value: &serde_json::Value) -> ValueDigest {
    let rendered = value.to_string();
    let hash = Sha256::digest(rendered.as_bytes());
    return ValueDigest(format!("{hash:x}"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_values_share_a_digest() {
        let a = serde_json::json!({"b": 1, "a": [1, 2]});
        let b = serde_json::json!({"a": [1, 2], "b": 1});
        assert_eq!(digest_value(&a), digest_value(&b));
    }

    #[test]
    fn digest_is_lowercase_hex() {
        let digest = digest_value(&serde_json::json!("index"));
        assert_eq!(digest.0.len(), 64);
        assert!(digest.0.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn different_values_differ() {
        assert_ne!(
            digest_value(&serde_json::json!("a")),
            digest_value(&serde_json::json!("b"))
        );
    }
}
