//! The token registry and its static circular-dependency analysis.

use crate::class::ClassDefinition;
use crate::component::ObjectFactory;
use crate::container::Container;
use crate::error::{CycleLink, Error, Result};
use crate::instance::Instance;
use crate::token::{Token, DEPENDENCY_CONTAINER};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

static NEXT_REGISTRATION_ID: AtomicU64 = AtomicU64::new(1);

/// Keys the singleton cache and the resolution context. Unique across all containers.
pub type RegistrationId = u64;

/// Lifetime policy of a class registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scope {
  /// One instance per container.
  #[default]
  Singleton,
  /// One instance per top-level resolution call tree.
  Resolution,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ClassOptions {
  pub scope: Scope,
}

impl From<Scope> for ClassOptions {
  fn from(scope: Scope) -> Self {
    Self { scope }
  }
}

pub type FactoryFn = dyn Fn(&Container) -> Result<ObjectFactory> + Send + Sync;
pub type DynamicFn = dyn Fn(&Container) -> Result<Instance> + Send + Sync;

/// The value behind a `constant` registration.
#[derive(Clone)]
pub enum Constant {
  Value(Instance),
  /// The container the registry belongs to, resolved without holding a strong
  /// reference from the registry back to its owner.
  Owner,
}

/// A class or advisor registration.
#[derive(Debug)]
pub struct ClassRegistration {
  scope: Scope,
  class: ClassDefinition,
}

impl ClassRegistration {
  pub fn scope(&self) -> Scope {
    self.scope
  }

  pub fn class(&self) -> &ClassDefinition {
    &self.class
  }
}

pub enum RegistrationKind {
  Class(ClassRegistration),
  Advisor(ClassRegistration),
  Factory(Arc<FactoryFn>),
  Constant(Constant),
  Dynamic(Arc<DynamicFn>),
}

/// One recorded intent to produce a value for a token.
pub struct Registration {
  id: RegistrationId,
  token: Token,
  kind: RegistrationKind,
}

impl Registration {
  fn new(token: Token, kind: RegistrationKind) -> Self {
    Self {
      id: NEXT_REGISTRATION_ID.fetch_add(1, Ordering::Relaxed),
      token,
      kind,
    }
  }

  pub fn id(&self) -> RegistrationId {
    self.id
  }

  pub fn token(&self) -> &Token {
    &self.token
  }

  pub fn kind(&self) -> &RegistrationKind {
    &self.kind
  }

  pub fn kind_name(&self) -> &'static str {
    match self.kind {
      RegistrationKind::Class(_) => "class",
      RegistrationKind::Advisor(_) => "advisor",
      RegistrationKind::Factory(_) => "factory",
      RegistrationKind::Constant(_) => "constant",
      RegistrationKind::Dynamic(_) => "dynamic",
    }
  }

  /// The class part of `class` and `advisor` registrations.
  pub fn class(&self) -> Option<&ClassRegistration> {
    match &self.kind {
      RegistrationKind::Class(class) | RegistrationKind::Advisor(class) => Some(class),
      _ => None,
    }
  }

  pub fn is_advisor(&self) -> bool {
    matches!(self.kind, RegistrationKind::Advisor(_))
  }
}

impl fmt::Debug for Registration {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut s = f.debug_struct("Registration");
    s.field("id", &self.id)
      .field("token", &self.token)
      .field("kind", &self.kind_name());
    if let Some(class) = self.class() {
      s.field("class", &class.class.name()).field("scope", &class.scope);
    }
    s.finish()
  }
}

/// Anything that can list the registration history of a token.
///
/// Each registration comes paired with the source that owns it, since a
/// registration's own dependencies are looked up from its owner.
pub trait RegistrySource: Clone {
  fn registrations(&self, token: &Token) -> Vec<(Self, Arc<Registration>)>;
}

/// Per-token registration history.
pub struct Registry {
  entries: HashMap<Token, Vec<Arc<Registration>>>,
}

impl Registry {
  /// Creates a registry with the container's own token pre-registered.
  pub fn new() -> Self {
    let mut entries = HashMap::new();
    entries.insert(DEPENDENCY_CONTAINER.clone(), vec![Self::owner_entry()]);
    Self { entries }
  }

  fn owner_entry() -> Arc<Registration> {
    Arc::new(Registration::new(
      DEPENDENCY_CONTAINER.clone(),
      RegistrationKind::Constant(Constant::Owner),
    ))
  }

  pub fn register_class(
    &mut self,
    token: Token,
    class: ClassDefinition,
    options: ClassOptions,
  ) -> Result<&mut Self> {
    self.put(
      token,
      RegistrationKind::Class(ClassRegistration {
        scope: options.scope,
        class,
      }),
    )
  }

  /// Registers `class` under its own token, keeping its advice maps.
  pub fn register_advisor(&mut self, class: ClassDefinition, options: ClassOptions) -> Result<&mut Self> {
    self.put(
      class.token().clone(),
      RegistrationKind::Advisor(ClassRegistration {
        scope: options.scope,
        class,
      }),
    )
  }

  pub fn register_factory(&mut self, token: Token, factory: Arc<FactoryFn>) -> Result<&mut Self> {
    self.put(token, RegistrationKind::Factory(factory))
  }

  pub fn register_constant(&mut self, token: Token, constant: Instance) -> Result<&mut Self> {
    self.put(token, RegistrationKind::Constant(Constant::Value(constant)))
  }

  pub fn register_dynamic(&mut self, token: Token, dynamic: Arc<DynamicFn>) -> Result<&mut Self> {
    self.put(token, RegistrationKind::Dynamic(dynamic))
  }

  /// The winning (last) registration of `token`.
  pub fn get(&self, token: &Token) -> Option<&Arc<Registration>> {
    self.entries.get(token).and_then(|history| history.last())
  }

  /// The full history of `token`, in registration order.
  pub fn get_all(&self, token: &Token) -> Option<&[Arc<Registration>]> {
    self.entries.get(token).map(Vec::as_slice)
  }

  pub fn has(&self, token: &Token) -> bool {
    self.entries.contains_key(token)
  }

  pub fn tokens(&self) -> impl Iterator<Item = &Token> {
    self.entries.keys()
  }

  /// Drops every registration. The container's own token is registered again.
  pub fn clear(&mut self) {
    self.entries.clear();
    self
      .entries
      .insert(DEPENDENCY_CONTAINER.clone(), vec![Self::owner_entry()]);
  }

  /// Walks the constructor dependencies reachable from `token` and fails on a cycle.
  pub fn check_circular(&self, token: &Token) -> Result<()> {
    check_circular(&self, token)
  }

  /// Takes registration `id` out of the history of `token`.
  pub(crate) fn remove(&mut self, token: &Token, id: RegistrationId) -> Option<Arc<Registration>> {
    let history = self.entries.get_mut(token)?;
    let position = history.iter().position(|registration| registration.id == id)?;
    let removed = history.remove(position);
    if history.is_empty() {
      self.entries.remove(token);
    }
    Some(removed)
  }

  fn put(&mut self, token: Token, kind: RegistrationKind) -> Result<&mut Self> {
    if token.is_reserved() {
      return Err(Error::ReservedToken(token));
    }
    let registration = Registration::new(token.clone(), kind);
    debug!(
      token = %token,
      kind = registration.kind_name(),
      id = registration.id,
      "registered"
    );
    self
      .entries
      .entry(token)
      .or_default()
      .push(Arc::new(registration));
    Ok(self)
  }
}

impl Default for Registry {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Debug for Registry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Registry")
      .field("tokens", &self.entries.len())
      .finish()
  }
}

impl<'a> RegistrySource for &'a Registry {
  fn registrations(&self, token: &Token) -> Vec<(Self, Arc<Registration>)> {
    self
      .get_all(token)
      .map(|history| history.iter().map(|r| (*self, r.clone())).collect())
      .unwrap_or_default()
  }
}

/// Static cycle analysis over constructor descriptors.
///
/// Only `class` and `advisor` registrations contribute edges; properties are not
/// followed. Lazy tokens are unwrapped before comparison. Registrations are
/// compared by id, so an override that depends on the registration it shadows
/// is not a cycle.
pub(crate) fn check_circular<S: RegistrySource>(source: &S, token: &Token) -> Result<()> {
  let mut cleared = HashSet::new();
  for (owner, registration) in source.registrations(token) {
    check_from(&owner, &registration, &mut cleared)?;
  }
  Ok(())
}

/// Checks the dependencies reachable from one registration owned by `owner`.
pub(crate) fn check_registration<S: RegistrySource>(owner: &S, registration: &Registration) -> Result<()> {
  check_from(owner, registration, &mut HashSet::new())
}

fn check_from<S: RegistrySource>(
  owner: &S,
  registration: &Registration,
  cleared: &mut HashSet<RegistrationId>,
) -> Result<()> {
  let mut path = vec![(CycleLink::root(registration.token.clone()), registration.id)];
  walk(owner, registration, &mut path, cleared)
}

fn walk<S: RegistrySource>(
  owner: &S,
  registration: &Registration,
  path: &mut Vec<(CycleLink, RegistrationId)>,
  cleared: &mut HashSet<RegistrationId>,
) -> Result<()> {
  if cleared.contains(&registration.id) {
    return Ok(());
  }

  if let Some(class) = registration.class() {
    let args = class.class().metadata().constructor_args();
    for (idx, descriptor) in args.iter().enumerate() {
      let Some(descriptor) = descriptor else {
        continue;
      };
      let dependency = descriptor.dependency_token();

      for (next_owner, next) in owner.registrations(dependency) {
        if let Some(start) = path.iter().position(|(_, id)| *id == next.id) {
          let mut chain: Vec<CycleLink> = path[start..].iter().map(|(link, _)| link.clone()).collect();
          chain.push(CycleLink::at(dependency.clone(), idx));
          return Err(Error::CircularDependency { chain });
        }
        path.push((CycleLink::at(dependency.clone(), idx), next.id));
        walk(&next_owner, &next, path, cleared)?;
        path.pop();
      }
    }
  }

  cleared.insert(registration.id);
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::class::ClassMetadata;
  use crate::component::Component;
  use crate::descriptor::Descriptor;
  use crate::token::{LazyToken, CONFIG_HOLDER};
  use pretty_assertions::assert_eq;

  struct Node;
  impl Component for Node {}

  fn node(deps: &[(usize, Descriptor)]) -> ClassDefinition {
    let metadata = deps
      .iter()
      .fold(ClassMetadata::new(), |meta, (idx, d)| meta.constructor_arg(*idx, d.clone()));
    ClassDefinition::new(|_| Ok(Node)).with_metadata(metadata)
  }

  fn class(registry: &mut Registry, token: &'static str, deps: &[(usize, Descriptor)]) {
    registry
      .register_class(token.into(), node(deps), ClassOptions::default())
      .unwrap();
  }

  #[test]
  fn last_registration_wins_but_history_is_kept() {
    let mut registry = Registry::new();
    registry
      .register_constant("Foo".into(), Instance::new(1_u32))
      .unwrap()
      .register_constant("Foo".into(), Instance::new(2_u32))
      .unwrap();

    let history = registry.get_all(&"Foo".into()).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(registry.get(&"Foo".into()).unwrap().id(), history[1].id());
    assert!(history[0].id() < history[1].id());
  }

  #[test]
  fn container_token_is_reserved() {
    let mut registry = Registry::new();
    assert!(registry.has(&DEPENDENCY_CONTAINER));

    let err = registry
      .register_constant(DEPENDENCY_CONTAINER.clone(), Instance::new(()))
      .unwrap_err();
    assert!(matches!(err, Error::ReservedToken(_)));

    registry.clear();
    assert!(registry.has(&DEPENDENCY_CONTAINER));
  }

  #[test]
  fn detects_transitive_cycle() {
    let mut registry = Registry::new();
    class(&mut registry, "A", &[(0, Descriptor::autowired("B"))]);
    class(&mut registry, "B", &[(1, Descriptor::autowired("C"))]);
    class(&mut registry, "C", &[(0, Descriptor::autowired("A"))]);

    let err = registry.check_circular(&"A".into()).unwrap_err();
    let chain = err.cycle().unwrap().to_vec();
    assert_eq!(
      chain,
      vec![
        CycleLink::root("A".into()),
        CycleLink::at("B".into(), 0),
        CycleLink::at("C".into(), 1),
        CycleLink::at("A".into(), 0),
      ]
    );
  }

  #[test]
  fn cycle_reported_from_offending_ancestor() {
    let mut registry = Registry::new();
    class(&mut registry, "Root", &[(0, Descriptor::autowired("A"))]);
    class(&mut registry, "A", &[(0, Descriptor::autowired("B"))]);
    class(&mut registry, "B", &[(0, Descriptor::autowired("A"))]);

    let err = registry.check_circular(&"Root".into()).unwrap_err();
    let tokens: Vec<_> = err.cycle().unwrap().iter().map(|l| l.token.clone()).collect();
    assert_eq!(tokens, vec![Token::from("A"), "B".into(), "A".into()]);
  }

  #[test]
  fn lazy_tokens_are_unwrapped() {
    let mut registry = Registry::new();
    let lazy = LazyToken::new(|| Token::from("A"));
    class(&mut registry, "A", &[(0, Descriptor::autowired("B"))]);
    class(&mut registry, "B", &[(0, Descriptor::autowired(lazy))]);

    assert!(registry.check_circular(&"A".into()).is_err());
  }

  #[test]
  fn diamonds_and_values_are_not_cycles() {
    let mut registry = Registry::new();
    class(
      &mut registry,
      "Top",
      &[
        (0, Descriptor::autowired("Left")),
        (1, Descriptor::autowired("Right")),
        (2, Descriptor::value("app.name")),
      ],
    );
    class(&mut registry, "Left", &[(0, Descriptor::autowired("Base"))]);
    class(&mut registry, "Right", &[(0, Descriptor::autowired("Base"))]);
    class(&mut registry, "Base", &[]);

    registry.check_circular(&"Top".into()).unwrap();
    assert!(!registry.has(&CONFIG_HOLDER));
  }

  #[test]
  fn remove_drops_empty_history() {
    let mut registry = Registry::new();
    class(&mut registry, "A", &[]);
    let id = registry.get(&"A".into()).unwrap().id();
    assert!(registry.remove(&"A".into(), id).is_some());
    assert!(!registry.has(&"A".into()));
  }

  #[test]
  fn remove_targets_one_registration() {
    let mut registry = Registry::new();
    class(&mut registry, "A", &[]);
    let first = registry.get(&"A".into()).unwrap().id();
    class(&mut registry, "A", &[(0, Descriptor::autowired("B"))]);
    let second = registry.get(&"A".into()).unwrap().id();

    registry.remove(&"A".into(), first).unwrap();

    let history = registry.get_all(&"A".into()).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(registry.get(&"A".into()).unwrap().id(), second);
    assert!(registry.remove(&"A".into(), first).is_none());
  }

  #[test]
  fn override_depending_on_shadowed_entry_is_checked_per_entry() {
    let mut registry = Registry::new();
    class(&mut registry, "A", &[]);
    class(&mut registry, "A", &[(0, Descriptor::autowired("B"))]);
    class(&mut registry, "B", &[(0, Descriptor::autowired("A"))]);

    // B reaches every entry of A, and the newer one leads back to B.
    let tokens: Vec<_> = registry
      .check_circular(&"A".into())
      .unwrap_err()
      .cycle()
      .unwrap()
      .iter()
      .map(|l| l.token.clone())
      .collect();
    assert_eq!(tokens, vec![Token::from("A"), "B".into(), "A".into()]);

    let first = registry.get_all(&"A".into()).unwrap()[0].clone();
    check_registration(&&registry, &first).unwrap();
  }
}
