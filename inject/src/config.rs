//! The configuration holder `value` descriptors read from.

use crate::component::Value;
use std::sync::Arc;

/// Exposes configuration values by path.
///
/// Register one with [`Container::register_config`](crate::Container::register_config);
/// `value` descriptors then resolve through it.
pub trait ConfigHolder: Send + Sync {
  fn get(&self, path: &str) -> Option<Value>;
}

/// A configuration holder over a JSON document.
///
/// Paths are dot separated; numeric segments index into arrays
/// (`"db.replicas.0.host"`). Values come out as `Arc<serde_json::Value>`.
#[derive(Debug, Clone, Default)]
pub struct JsonConfig {
  root: serde_json::Value,
}

impl JsonConfig {
  pub fn new(root: serde_json::Value) -> Self {
    Self { root }
  }

  pub fn lookup(&self, path: &str) -> Option<&serde_json::Value> {
    if path.is_empty() {
      return Some(&self.root);
    }
    path.split('.').try_fold(&self.root, |node, segment| match node {
      serde_json::Value::Object(map) => map.get(segment),
      serde_json::Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
      _ => None,
    })
  }
}

impl ConfigHolder for JsonConfig {
  fn get(&self, path: &str) -> Option<Value> {
    // `null` reads as unset so the descriptor default applies.
    match self.lookup(path)? {
      serde_json::Value::Null => None,
      found => Some(Arc::new(found.clone())),
    }
  }
}
