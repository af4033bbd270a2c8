//! Cache keys derived from an operation identity and its arguments.
//!
//! Two dispatches of the same operation with logically equal arguments
//! must land on the same entry, regardless of the order the argument
//! fields were written in. Arguments are serialized to JSON, canonicalized
//! by recursively sorting object keys, and hashed with SHA-256.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{ClientError, Result};

/// Identity of one cached query result: family namespace, operation name,
/// and a digest of the canonicalized arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
  family: &'static str,
  operation: &'static str,
  args_hash: String,
}

impl CacheKey {
  /// Build a key for `operation` in `family` from serializable arguments.
  ///
  /// Fails with `ClientError::Serialization` before any network call if
  /// the arguments cannot be encoded.
  pub fn new<A: Serialize>(family: &'static str, operation: &'static str, args: &A) -> Result<Self> {
    let value = serde_json::to_value(args)
      .map_err(|e| ClientError::Serialization(format!("invalid arguments: {}", e)))?;

    let mut canonical = String::new();
    write_canonical(&value, &mut canonical);

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let args_hash = hex::encode(hasher.finalize());

    Ok(Self {
      family,
      operation,
      args_hash,
    })
  }

  pub fn family(&self) -> &'static str {
    self.family
  }

  pub fn operation(&self) -> &'static str {
    self.operation
  }
}

impl std::fmt::Display for CacheKey {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}:{}:{}", self.family, self.operation, self.args_hash)
  }
}

/// Append a canonical rendering of `value`: objects with keys sorted,
/// arrays in order, scalars via serde_json's own formatting.
fn write_canonical(value: &Value, out: &mut String) {
  match value {
    Value::Object(map) => {
      let mut keys: Vec<&String> = map.keys().collect();
      keys.sort();
      out.push('{');
      for (i, key) in keys.iter().enumerate() {
        if i > 0 {
          out.push(',');
        }
        out.push_str(key);
        out.push(':');
        write_canonical(&map[*key], out);
      }
      out.push('}');
    }
    Value::Array(items) => {
      out.push('[');
      for (i, item) in items.iter().enumerate() {
        if i > 0 {
          out.push(',');
        }
        write_canonical(item, out);
      }
      out.push(']');
    }
    other => out.push_str(&other.to_string()),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn key_order_does_not_matter() {
    let a = CacheKey::new("funds", "list", &json!({"page": 1, "limit": 10})).unwrap();
    let b = CacheKey::new("funds", "list", &json!({"limit": 10, "page": 1})).unwrap();
    assert_eq!(a, b);
  }

  #[test]
  fn nested_objects_are_canonicalized() {
    let a = CacheKey::new(
      "funds",
      "list",
      &json!({"filter": {"currency": "CAD", "min": 5}, "page": 1}),
    )
    .unwrap();
    let b = CacheKey::new(
      "funds",
      "list",
      &json!({"page": 1, "filter": {"min": 5, "currency": "CAD"}}),
    )
    .unwrap();
    assert_eq!(a, b);
  }

  #[test]
  fn different_arguments_produce_different_keys() {
    let a = CacheKey::new("funds", "list", &json!({"page": 1, "limit": 10})).unwrap();
    let b = CacheKey::new("funds", "list", &json!({"page": 2, "limit": 10})).unwrap();
    assert_ne!(a, b);
  }

  #[test]
  fn same_arguments_different_operations_differ() {
    let args = json!({"page": 1});
    let a = CacheKey::new("funds", "list", &args).unwrap();
    let b = CacheKey::new("funds", "subscriptions", &args).unwrap();
    assert_ne!(a, b);
  }

  #[test]
  fn array_order_is_preserved() {
    let a = CacheKey::new("funds", "batch", &json!({"ids": ["a", "b"]})).unwrap();
    let b = CacheKey::new("funds", "batch", &json!({"ids": ["b", "a"]})).unwrap();
    assert_ne!(a, b);
  }
}
