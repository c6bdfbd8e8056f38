//! Declarative descriptions of injection points.

use crate::component::Value;
use crate::token::{Token, TokenRef, CONFIG_HOLDER};

/// Describes one constructor argument or property to inject.
#[derive(Clone, Debug)]
pub enum Descriptor {
  /// Resolve `token` from the container.
  ///
  /// With `is_array` every registration of the token is injected, in registration
  /// order. With `optional` a missing registration injects nothing instead of failing.
  Autowired {
    token: TokenRef,
    is_array: bool,
    optional: bool,
  },
  /// Read `path` from the configuration holder, falling back to `default`.
  Value {
    path: String,
    default: Option<Value>,
  },
}

impl Descriptor {
  pub fn autowired(token: impl Into<TokenRef>) -> Self {
    Descriptor::Autowired {
      token: token.into(),
      is_array: false,
      optional: false,
    }
  }

  pub fn value(path: impl Into<String>) -> Self {
    Descriptor::Value {
      path: path.into(),
      default: None,
    }
  }

  pub fn value_or(path: impl Into<String>, default: Value) -> Self {
    Descriptor::Value {
      path: path.into(),
      default: Some(default),
    }
  }

  /// Marks an autowired descriptor as collecting every registration. No-op on `Value`.
  pub fn array(mut self) -> Self {
    if let Descriptor::Autowired { is_array, .. } = &mut self {
      *is_array = true;
    }
    self
  }

  /// Marks an autowired descriptor as optional. No-op on `Value`.
  pub fn optional(mut self) -> Self {
    if let Descriptor::Autowired { optional, .. } = &mut self {
      *optional = true;
    }
    self
  }

  /// The token this injection point depends on. `Value` descriptors always depend
  /// on the configuration holder.
  pub fn dependency_token(&self) -> &Token {
    match self {
      Descriptor::Autowired { token, .. } => token.token(),
      Descriptor::Value { .. } => &CONFIG_HOLDER,
    }
  }
}
