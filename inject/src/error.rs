//! Error types surfaced by registration and resolution.

use crate::token::Token;
use std::fmt;
use thiserror::Error;

/// A boxed error raised by component methods, advice, factories or dynamic providers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// One hop of a circular constructor dependency.
///
/// The first link of a chain is the offending ancestor and has no parameter index.
/// Every following link records the constructor position, in the previous link's
/// class, through which it is required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleLink {
  pub token: Token,
  pub parameter_index: Option<usize>,
}

impl CycleLink {
  pub(crate) fn root(token: Token) -> Self {
    Self {
      token,
      parameter_index: None,
    }
  }

  pub(crate) fn at(token: Token, parameter_index: usize) -> Self {
    Self {
      token,
      parameter_index: Some(parameter_index),
    }
  }
}

impl fmt::Display for CycleLink {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.parameter_index {
      Some(idx) => write!(f, "[{}] {}", idx, self.token),
      None => write!(f, "{}", self.token),
    }
  }
}

fn render_cycle(chain: &[CycleLink]) -> String {
  chain
    .iter()
    .map(ToString::to_string)
    .collect::<Vec<_>>()
    .join(" -> ")
}

fn render_dependents(chain: &[Token]) -> String {
  if chain.is_empty() {
    return String::new();
  }
  let dependents = chain
    .iter()
    .map(ToString::to_string)
    .collect::<Vec<_>>()
    .join(" <- ");
  format!(" (required by {})", dependents)
}

/// The main error type for `fibre_inject`.
#[derive(Debug, Error)]
pub enum Error {
  #[error("Token {0} is reserved for the dependency container and cannot be registered")]
  ReservedToken(Token),

  #[error("Circular constructor dependency detected: {}", render_cycle(.chain))]
  CircularDependency { chain: Vec<CycleLink> },

  /// `chain` lists the dependents, innermost first, that led to the missing token.
  #[error("No registration found for token {token}{}", render_dependents(.chain))]
  Unresolved { token: Token, chain: Vec<Token> },

  #[error("Resolved value is not a `{expected}`")]
  TypeMismatch { expected: &'static str },

  #[error("Required constructor argument at position {0} received no value")]
  MissingArgument(usize),

  #[error("A required injection point received no value")]
  MissingInjection,

  #[error("`{class}` has no injectable property `{property}`")]
  UnknownProperty {
    class: &'static str,
    property: String,
  },

  #[error("`{class}` has no method `{method}`")]
  UnknownMethod { class: &'static str, method: String },

  #[error("Post-construct method `{method}` of `{class}` must complete synchronously")]
  AsyncPostConstruct { class: &'static str, method: String },

  #[error("The container owning this instance has been dropped")]
  ContainerDropped,

  /// An error raised by user code: a component method, an advice, a factory or
  /// a dynamic provider. It is carried through the container untouched.
  #[error(transparent)]
  Invocation(BoxError),
}

impl Error {
  /// Wraps an error raised by user code.
  pub fn invocation(err: impl Into<BoxError>) -> Self {
    Error::Invocation(err.into())
  }

  /// Appends `dependent` to the causal chain of an unresolved-token error.
  pub(crate) fn required_by(self, dependent: &Token) -> Self {
    match self {
      Error::Unresolved { token, mut chain } => {
        chain.push(dependent.clone());
        Error::Unresolved { token, chain }
      }
      other => other,
    }
  }

  /// Returns the missing token if this is an unresolved-token error.
  pub fn unresolved_token(&self) -> Option<&Token> {
    match self {
      Error::Unresolved { token, .. } => Some(token),
      _ => None,
    }
  }

  /// Returns the cycle if this is a circular-dependency error.
  pub fn cycle(&self) -> Option<&[CycleLink]> {
    match self {
      Error::CircularDependency { chain } => Some(chain),
      _ => None,
    }
  }
}

/// A specialized `Result` type for `fibre_inject` operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unresolved_message_lists_dependents() {
    let err = Error::Unresolved {
      token: Token::from("Db"),
      chain: Vec::new(),
    }
    .required_by(&Token::from("Repo"))
    .required_by(&Token::from("Service"));

    assert_eq!(
      err.to_string(),
      "No registration found for token Db (required by Repo <- Service)"
    );
    assert_eq!(err.unresolved_token(), Some(&Token::from("Db")));
  }

  #[test]
  fn cycle_message_renders_positions() {
    let err = Error::CircularDependency {
      chain: vec![
        CycleLink::root(Token::from("A")),
        CycleLink::at(Token::from("B"), 0),
        CycleLink::at(Token::from("A"), 2),
      ],
    };
    assert_eq!(
      err.to_string(),
      "Circular constructor dependency detected: A -> [0] B -> [2] A"
    );
  }
}
