//! Injection tokens, the identity-compared keys of the registry.

use once_cell::sync::OnceCell;
use std::any::{type_name, TypeId};
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// Ids below this value are reserved for the well-known symbols.
static NEXT_SYMBOL_ID: AtomicU64 = AtomicU64::new(16);

/// A unique token identity, equal only to itself (and its clones).
#[derive(Clone)]
pub struct Symbol {
  id: u64,
  description: Cow<'static, str>,
}

impl Symbol {
  /// Allocates a new symbol. Two symbols with the same description are still distinct.
  pub fn new(description: impl Into<Cow<'static, str>>) -> Self {
    Self {
      id: NEXT_SYMBOL_ID.fetch_add(1, Ordering::Relaxed),
      description: description.into(),
    }
  }

  const fn reserved(id: u64, description: &'static str) -> Self {
    Self {
      id,
      description: Cow::Borrowed(description),
    }
  }

  pub fn description(&self) -> &str {
    &self.description
  }
}

impl PartialEq for Symbol {
  fn eq(&self, other: &Self) -> bool {
    self.id == other.id
  }
}

impl Eq for Symbol {}

impl Hash for Symbol {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.id.hash(state);
  }
}

impl fmt::Debug for Symbol {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Symbol({}#{})", self.description, self.id)
  }
}

/// An opaque identifier used to register and resolve a dependency.
///
/// Tokens compare by identity: names by their text, symbols by their allocation
/// and type tokens by `TypeId`.
#[derive(Clone)]
pub enum Token {
  Name(Arc<str>),
  Symbol(Symbol),
  Type { id: TypeId, name: &'static str },
}

/// The container's own token. Resolving it yields the container itself.
pub static DEPENDENCY_CONTAINER: Token =
  Token::Symbol(Symbol::reserved(1, "fibre_inject#DependencyContainer"));

/// The well-known token `value` descriptors resolve through.
pub static CONFIG_HOLDER: Token = Token::Symbol(Symbol::reserved(2, "fibre_inject#ConfigHolder"));

impl Token {
  /// The class-identity token of `T`.
  pub fn of<T: ?Sized + 'static>() -> Self {
    Token::Type {
      id: TypeId::of::<T>(),
      name: type_name::<T>(),
    }
  }

  /// A fresh, unique symbol token.
  pub fn symbol(description: impl Into<Cow<'static, str>>) -> Self {
    Token::Symbol(Symbol::new(description))
  }

  pub fn is_reserved(&self) -> bool {
    *self == DEPENDENCY_CONTAINER
  }
}

impl PartialEq for Token {
  fn eq(&self, other: &Self) -> bool {
    match (self, other) {
      (Token::Name(a), Token::Name(b)) => a == b,
      (Token::Symbol(a), Token::Symbol(b)) => a == b,
      (Token::Type { id: a, .. }, Token::Type { id: b, .. }) => a == b,
      _ => false,
    }
  }
}

impl Eq for Token {}

impl Hash for Token {
  fn hash<H: Hasher>(&self, state: &mut H) {
    std::mem::discriminant(self).hash(state);
    match self {
      Token::Name(name) => name.hash(state),
      Token::Symbol(symbol) => symbol.hash(state),
      Token::Type { id, .. } => id.hash(state),
    }
  }
}

impl fmt::Display for Token {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Token::Name(name) => f.write_str(name),
      Token::Symbol(symbol) => write!(f, "Symbol({})", symbol.description),
      Token::Type { name, .. } => f.write_str(name),
    }
  }
}

impl fmt::Debug for Token {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Token::Name(name) => write!(f, "Token({:?})", name),
      Token::Symbol(symbol) => write!(f, "Token({:?})", symbol),
      Token::Type { name, .. } => write!(f, "Token(type {})", name),
    }
  }
}

impl From<&'static str> for Token {
  fn from(name: &'static str) -> Self {
    Token::Name(Arc::from(name))
  }
}

impl From<String> for Token {
  fn from(name: String) -> Self {
    Token::Name(Arc::from(name))
  }
}

impl From<Symbol> for Token {
  fn from(symbol: Symbol) -> Self {
    Token::Symbol(symbol)
  }
}

impl From<&Token> for Token {
  fn from(token: &Token) -> Self {
    token.clone()
  }
}

/// A deferred token, used for forward references.
///
/// The resolver closure runs at most once, the first time the concrete token is needed.
#[derive(Clone)]
pub struct LazyToken {
  resolver: Arc<dyn Fn() -> Token + Send + Sync>,
  target: Arc<OnceCell<Token>>,
}

impl LazyToken {
  pub fn new(resolver: impl Fn() -> Token + Send + Sync + 'static) -> Self {
    Self {
      resolver: Arc::new(resolver),
      target: Arc::new(OnceCell::new()),
    }
  }

  /// Returns the concrete token, running the resolver on first use.
  pub fn get(&self) -> &Token {
    self.target.get_or_init(|| (self.resolver)())
  }
}

impl fmt::Debug for LazyToken {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.target.get() {
      Some(token) => write!(f, "LazyToken({:?})", token),
      None => f.write_str("LazyToken(<pending>)"),
    }
  }
}

/// Either a concrete token or a lazy reference to one.
#[derive(Clone, Debug)]
pub enum TokenRef {
  Token(Token),
  Lazy(LazyToken),
}

impl TokenRef {
  pub fn token(&self) -> &Token {
    match self {
      TokenRef::Token(token) => token,
      TokenRef::Lazy(lazy) => lazy.get(),
    }
  }
}

impl From<Token> for TokenRef {
  fn from(token: Token) -> Self {
    TokenRef::Token(token)
  }
}

impl From<&Token> for TokenRef {
  fn from(token: &Token) -> Self {
    TokenRef::Token(token.clone())
  }
}

impl From<&'static str> for TokenRef {
  fn from(name: &'static str) -> Self {
    TokenRef::Token(name.into())
  }
}

impl From<String> for TokenRef {
  fn from(name: String) -> Self {
    TokenRef::Token(name.into())
  }
}

impl From<LazyToken> for TokenRef {
  fn from(lazy: LazyToken) -> Self {
    TokenRef::Lazy(lazy)
  }
}
