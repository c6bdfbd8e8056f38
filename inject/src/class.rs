//! Class definitions: a constructor plus the injection metadata describing it.
//!
//! The metadata is what an annotation front end would collect from a class
//! declaration. The container consumes it verbatim and never inspects types itself.

use crate::advice::{Advice, AdviceKind, AdviceMaps};
use crate::component::Component;
use crate::descriptor::Descriptor;
use crate::error::Result;
use crate::instance::Arguments;
use crate::token::Token;
use std::any::type_name;
use std::fmt;
use std::sync::Arc;

/// Injection metadata of one class.
#[derive(Clone, Debug, Default)]
pub struct ClassMetadata {
  constructor_args: Vec<Option<Descriptor>>,
  properties: Vec<(String, Descriptor)>,
  post_construct: Option<String>,
  advice: Arc<AdviceMaps>,
}

impl ClassMetadata {
  pub fn new() -> Self {
    Self::default()
  }

  /// Declares the constructor argument at `position`. Skipped positions stay empty.
  pub fn constructor_arg(mut self, position: usize, descriptor: Descriptor) -> Self {
    if self.constructor_args.len() <= position {
      self.constructor_args.resize(position + 1, None);
    }
    self.constructor_args[position] = Some(descriptor);
    self
  }

  /// Declares a property injection. Redeclaring a property replaces it.
  pub fn property(mut self, name: impl Into<String>, descriptor: Descriptor) -> Self {
    let name = name.into();
    match self.properties.iter_mut().find(|(existing, _)| *existing == name) {
      Some(slot) => slot.1 = descriptor,
      None => self.properties.push((name, descriptor)),
    }
    self
  }

  pub fn post_construct(mut self, method: impl Into<String>) -> Self {
    self.post_construct = Some(method.into());
    self
  }

  /// Attaches `advice` to `method` for the given hook. Only advisor registrations
  /// act on advice.
  pub fn advise(mut self, kind: AdviceKind, method: impl Into<String>, advice: Advice) -> Self {
    Arc::make_mut(&mut self.advice).add(kind, method, advice);
    self
  }

  pub fn constructor_args(&self) -> &[Option<Descriptor>] {
    &self.constructor_args
  }

  pub fn properties(&self) -> &[(String, Descriptor)] {
    &self.properties
  }

  pub fn post_construct_method(&self) -> Option<&str> {
    self.post_construct.as_deref()
  }

  pub fn advice(&self) -> &Arc<AdviceMaps> {
    &self.advice
  }
}

type Constructor = Arc<dyn Fn(Arguments) -> Result<Box<dyn Component>> + Send + Sync>;

/// A class identity: its token, its constructor and its injection metadata.
#[derive(Clone)]
pub struct ClassDefinition {
  token: Token,
  name: &'static str,
  constructor: Constructor,
  metadata: ClassMetadata,
}

impl ClassDefinition {
  /// Defines `T` with an explicit constructor and empty metadata.
  pub fn new<T, F>(constructor: F) -> Self
  where
    T: Component,
    F: Fn(Arguments) -> Result<T> + Send + Sync + 'static,
  {
    Self {
      token: Token::of::<T>(),
      name: type_name::<T>(),
      constructor: Arc::new(move |args| Ok(Box::new(constructor(args)?) as Box<dyn Component>)),
      metadata: ClassMetadata::default(),
    }
  }

  /// Defines `T` from its [`Injectable`] implementation.
  pub fn of<T: Injectable>() -> Self {
    Self::new(T::construct).with_metadata(T::metadata())
  }

  pub fn with_metadata(mut self, metadata: ClassMetadata) -> Self {
    self.metadata = metadata;
    self
  }

  /// The class-identity token, `Token::of::<T>()`.
  pub fn token(&self) -> &Token {
    &self.token
  }

  pub fn name(&self) -> &'static str {
    self.name
  }

  pub fn metadata(&self) -> &ClassMetadata {
    &self.metadata
  }

  pub(crate) fn construct(&self, args: Arguments) -> Result<Box<dyn Component>> {
    (self.constructor)(args)
  }
}

impl fmt::Debug for ClassDefinition {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ClassDefinition")
      .field("name", &self.name)
      .field("metadata", &self.metadata)
      .finish()
  }
}

/// A component that describes its own injection points.
///
/// This is the Rust stand-in for a decorated class: `metadata` returns what the
/// decorators would have tagged, `construct` builds the value from the resolved
/// constructor arguments.
pub trait Injectable: Component + Sized {
  fn metadata() -> ClassMetadata {
    ClassMetadata::default()
  }

  fn construct(args: Arguments) -> Result<Self>;
}
