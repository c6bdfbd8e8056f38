//! The main `Container` struct and its associated methods.

use crate::advice;
use crate::class::{ClassDefinition, Injectable};
use crate::component::{Component, MethodReturn, ObjectFactory};
use crate::config::ConfigHolder;
use crate::context::ResolutionContext;
use crate::descriptor::Descriptor;
use crate::error::{Error, Result};
use crate::instance::{Arguments, Injected, Instance};
use crate::registry::{
  self, ClassOptions, ClassRegistration, Constant, Registration, RegistrationId, RegistrationKind,
  Registry, RegistrySource, Scope,
};
use crate::token::{Token, CONFIG_HOLDER};
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use std::any::{type_name, Any};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};
use tracing::{debug, trace, warn};

static NEXT_CONTAINER_ID: AtomicU64 = AtomicU64::new(0);

/// Construction options of a [`Container`].
#[derive(Debug, Clone)]
pub struct ContainerConfig {
  id: Option<String>,
  recursive_lookup: bool,
  check_circular_on_register: bool,
}

impl ContainerConfig {
  pub fn new() -> Self {
    Self::default()
  }

  /// Names the container in logs and `Debug` output.
  pub fn with_id(mut self, id: impl Into<String>) -> Self {
    self.id = Some(id.into());
    self
  }

  /// Whether tokens missing locally are looked up in ancestor containers.
  pub fn recursive_lookup(mut self, enabled: bool) -> Self {
    self.recursive_lookup = enabled;
    self
  }

  /// Whether class and advisor registrations run the cycle check immediately.
  pub fn check_circular_on_register(mut self, enabled: bool) -> Self {
    self.check_circular_on_register = enabled;
    self
  }
}

impl Default for ContainerConfig {
  fn default() -> Self {
    Self {
      id: None,
      recursive_lookup: true,
      check_circular_on_register: true,
    }
  }
}

struct Inner {
  id: String,
  config: ContainerConfig,
  registry: RwLock<Registry>,
  // One cell per singleton registration; the cell is initialized outside the map lock.
  singletons: DashMap<RegistrationId, Arc<OnceCell<Instance>>>,
  // Singleton cells being initialized, and the thread initializing each.
  building: DashMap<RegistrationId, ThreadId>,
  // The value handed out for the container's own token, while anyone holds it.
  owner_value: Mutex<Weak<Container>>,
  parent: Option<Container>,
}

// Marks a singleton cell as being initialized by the current thread.
struct Building<'a> {
  map: &'a DashMap<RegistrationId, ThreadId>,
  id: RegistrationId,
}

impl<'a> Building<'a> {
  fn enter(map: &'a DashMap<RegistrationId, ThreadId>, id: RegistrationId) -> Self {
    map.insert(id, thread::current().id());
    Self { map, id }
  }
}

impl Drop for Building<'_> {
  fn drop(&mut self) {
    self.map.remove(&self.id);
  }
}

/// The dependency-injection container.
///
/// It owns a [`Registry`] and the singleton cache, and turns tokens into live
/// instances. Cloning is cheap; clones share registrations and caches.
/// Registration and resolution are thread-safe.
#[derive(Clone)]
pub struct Container {
  inner: Arc<Inner>,
}

/// A non-owning handle to a [`Container`].
#[derive(Clone)]
pub(crate) struct WeakContainer(Weak<Inner>);

impl WeakContainer {
  pub(crate) fn upgrade(&self) -> Option<Container> {
    self.0.upgrade().map(|inner| Container { inner })
  }
}

impl Container {
  /// Creates a new, empty root `Container`.
  pub fn new() -> Self {
    Self::with_config(ContainerConfig::default())
  }

  pub fn with_config(config: ContainerConfig) -> Self {
    Self::build(config, None)
  }

  fn build(config: ContainerConfig, parent: Option<Container>) -> Self {
    let id = config
      .id
      .clone()
      .unwrap_or_else(|| format!("container-{}", NEXT_CONTAINER_ID.fetch_add(1, Ordering::Relaxed)));
    debug!(container = %id, parent = parent.as_ref().map(Container::id), "container created");
    Self {
      inner: Arc::new(Inner {
        id,
        config,
        registry: RwLock::new(Registry::new()),
        singletons: DashMap::new(),
        building: DashMap::new(),
        owner_value: Mutex::new(Weak::new()),
        parent,
      }),
    }
  }

  pub fn id(&self) -> &str {
    &self.inner.id
  }

  pub fn parent(&self) -> Option<&Container> {
    self.inner.parent.as_ref()
  }

  pub(crate) fn downgrade(&self) -> WeakContainer {
    WeakContainer(Arc::downgrade(&self.inner))
  }

  /// Whether both handles point at the same container.
  pub fn ptr_eq(&self, other: &Container) -> bool {
    Arc::ptr_eq(&self.inner, &other.inner)
  }

  // --- Registration ---

  pub fn register_class(
    &self,
    token: impl Into<Token>,
    class: ClassDefinition,
    options: impl Into<ClassOptions>,
  ) -> Result<&Self> {
    let token = token.into();
    let added = {
      let mut registry = self.inner.registry.write();
      registry.register_class(token.clone(), class, options.into())?;
      registry.get(&token).cloned()
    };
    self.verify(added)?;
    Ok(self)
  }

  /// Registers `T` under `Token::of::<T>()` from its [`Injectable`] implementation.
  pub fn register_type<T: Injectable>(&self, options: impl Into<ClassOptions>) -> Result<&Self> {
    self.register_class(Token::of::<T>(), ClassDefinition::of::<T>(), options)
  }

  /// Registers an advisor under its class token, as a singleton.
  pub fn register_advisor(&self, class: ClassDefinition) -> Result<&Self> {
    self.register_advisor_with(class, Scope::Singleton)
  }

  pub fn register_advisor_with(
    &self,
    class: ClassDefinition,
    options: impl Into<ClassOptions>,
  ) -> Result<&Self> {
    let token = class.token().clone();
    let added = {
      let mut registry = self.inner.registry.write();
      registry.register_advisor(class, options.into())?;
      registry.get(&token).cloned()
    };
    self.verify(added)?;
    Ok(self)
  }

  /// Registers a factory provider. `factory` runs on every resolution and its
  /// returned callable is the resolved value.
  pub fn register_factory<F>(&self, token: impl Into<Token>, factory: F) -> Result<&Self>
  where
    F: Fn(&Container) -> Result<ObjectFactory> + Send + Sync + 'static,
  {
    self
      .inner
      .registry
      .write()
      .register_factory(token.into(), Arc::new(factory))?;
    Ok(self)
  }

  pub fn register_constant<T: Any + Send + Sync>(&self, token: impl Into<Token>, constant: T) -> Result<&Self> {
    self.register_instance(token, Instance::new(constant))
  }

  /// Registers an already resolved instance as a constant, keeping its identity.
  pub fn register_instance(&self, token: impl Into<Token>, instance: Instance) -> Result<&Self> {
    self
      .inner
      .registry
      .write()
      .register_constant(token.into(), instance)?;
    Ok(self)
  }

  /// Registers a provider evaluated afresh on every resolution.
  pub fn register_dynamic<T, F>(&self, token: impl Into<Token>, dynamic: F) -> Result<&Self>
  where
    T: Any + Send + Sync,
    F: Fn(&Container) -> Result<T> + Send + Sync + 'static,
  {
    self.inner.registry.write().register_dynamic(
      token.into(),
      Arc::new(move |container: &Container| dynamic(container).map(Instance::new)),
    )?;
    Ok(self)
  }

  /// Registers `holder` under [`CONFIG_HOLDER`].
  pub fn register_config(&self, holder: impl ConfigHolder + 'static) -> Result<&Self> {
    let holder: Arc<dyn ConfigHolder> = Arc::new(holder);
    self.register_constant(&CONFIG_HOLDER, holder)
  }

  // Checks the registration just added and takes exactly that one back on a cycle.
  fn verify(&self, added: Option<Arc<Registration>>) -> Result<()> {
    let Some(registration) = added else {
      return Ok(());
    };
    if !self.inner.config.check_circular_on_register {
      return Ok(());
    }
    if let Err(err) = registry::check_registration(self, &registration) {
      let token = registration.token();
      warn!(container = %self.id(), token = %token, error = %err, "registration rejected");
      self.inner.registry.write().remove(token, registration.id());
      return Err(err);
    }
    Ok(())
  }

  /// Statically checks the constructor dependencies reachable from `token`,
  /// following ancestor registries the same way resolution does.
  pub fn check_circular(&self, token: impl Into<Token>) -> Result<()> {
    registry::check_circular(self, &token.into())
  }

  // --- Queries ---

  pub fn is_registered(&self, token: impl Into<Token>, recursive: bool) -> bool {
    let token = token.into();
    if self.inner.registry.read().has(&token) {
      return true;
    }
    recursive
      && self
        .inner
        .parent
        .as_ref()
        .is_some_and(|parent| parent.is_registered(&token, true))
  }

  /// The local registration history of `token`.
  pub fn registrations(&self, token: impl Into<Token>) -> Vec<Arc<Registration>> {
    self
      .inner
      .registry
      .read()
      .get_all(&token.into())
      .map(<[_]>::to_vec)
      .unwrap_or_default()
  }

  /// Tokens registered locally.
  pub fn tokens(&self) -> Vec<Token> {
    self.inner.registry.read().tokens().cloned().collect()
  }

  /// Clears this container's registrations and singleton cache. Ancestors and
  /// children are untouched.
  pub fn reset(&self) {
    self.inner.registry.write().clear();
    self.inner.singletons.clear();
    debug!(container = %self.id(), "container reset");
  }

  // --- Hierarchy ---

  /// Creates a child whose lookups fall back to this container.
  pub fn create_child_container(&self) -> Container {
    self.create_child_container_with(ContainerConfig::default())
  }

  pub fn create_child_container_with(&self, config: ContainerConfig) -> Container {
    Self::build(config, Some(self.clone()))
  }

  // Finds the winning registration and the container that owns it.
  fn lookup(&self, token: &Token) -> Option<(Container, Arc<Registration>)> {
    if let Some(registration) = self.inner.registry.read().get(token) {
      return Some((self.clone(), registration.clone()));
    }
    if !self.inner.config.recursive_lookup {
      return None;
    }
    self.inner.parent.as_ref()?.lookup(token)
  }

  fn lookup_all(&self, token: &Token) -> Option<(Container, Vec<Arc<Registration>>)> {
    if let Some(history) = self.inner.registry.read().get_all(token) {
      return Some((self.clone(), history.to_vec()));
    }
    if !self.inner.config.recursive_lookup {
      return None;
    }
    self.inner.parent.as_ref()?.lookup_all(token)
  }

  // --- Resolution ---

  /// Resolves the winning registration of `token`.
  pub fn resolve(&self, token: impl Into<Token>) -> Result<Instance> {
    let token = token.into();
    let mut ctx = ResolutionContext::new();
    self
      .resolve_in(&token, &mut ctx)
      .inspect_err(|err| self.report(&token, err))
  }

  /// Resolves `token` and downcasts the result.
  pub fn resolve_as<T: Any + Send + Sync>(&self, token: impl Into<Token>) -> Result<Arc<T>> {
    self.resolve(token)?.expect::<T>()
  }

  /// Resolves `token`, reporting a missing registration of `token` itself as `None`.
  pub fn try_resolve(&self, token: impl Into<Token>) -> Result<Option<Instance>> {
    let token = token.into();
    if self.lookup(&token).is_none() {
      return Ok(None);
    }
    self.resolve(token).map(Some)
  }

  /// Resolves every registration of `token`, in registration order.
  pub fn resolve_all(&self, token: impl Into<Token>) -> Result<Vec<Instance>> {
    let token = token.into();
    let mut ctx = ResolutionContext::new();
    self
      .resolve_all_in(&token, &mut ctx)
      .inspect_err(|err| self.report(&token, err))
  }

  fn report(&self, token: &Token, err: &Error) {
    warn!(container = %self.id(), token = %token, error = %err, "resolution failed");
  }

  pub(crate) fn resolve_in(&self, token: &Token, ctx: &mut ResolutionContext) -> Result<Instance> {
    let (owner, registration) = self.lookup(token).ok_or_else(|| unresolved(token))?;
    trace!(
      container = %self.id(),
      owner = %owner.id(),
      token = %token,
      kind = registration.kind_name(),
      "resolving"
    );
    owner.instantiate(&registration, ctx)
  }

  fn resolve_all_in(&self, token: &Token, ctx: &mut ResolutionContext) -> Result<Vec<Instance>> {
    let (owner, history) = self.lookup_all(token).ok_or_else(|| unresolved(token))?;
    history
      .iter()
      .map(|registration| owner.instantiate(registration, ctx))
      .collect()
  }

  fn instantiate(&self, registration: &Arc<Registration>, ctx: &mut ResolutionContext) -> Result<Instance> {
    match registration.kind() {
      RegistrationKind::Constant(Constant::Value(instance)) => Ok(instance.clone()),
      RegistrationKind::Constant(Constant::Owner) => Ok(self.owner_instance()),
      RegistrationKind::Dynamic(dynamic) => dynamic(self),
      RegistrationKind::Factory(factory) => factory(self).map(Instance::new),
      RegistrationKind::Class(class) | RegistrationKind::Advisor(class) => match class.scope() {
        Scope::Singleton => self.singleton(registration, class, ctx),
        Scope::Resolution => self.resolution_scoped(registration, class, ctx),
      },
    }
  }

  fn singleton(
    &self,
    registration: &Arc<Registration>,
    class: &ClassRegistration,
    ctx: &mut ResolutionContext,
  ) -> Result<Instance> {
    let cell = self
      .inner
      .singletons
      .entry(registration.id())
      .or_default()
      .clone();
    if let Some(instance) = cell.get() {
      return Ok(instance.clone());
    }
    // Re-entering a cell under initialization would deadlock; report the cycle instead.
    let (id, token) = (registration.id(), registration.token());
    ctx.ensure_vacant(id, token)?;
    if self.building_here(id) {
      return Err(ctx.reentry(token));
    }
    cell
      .get_or_try_init(|| {
        let _building = Building::enter(&self.inner.building, id);
        ctx.constructing(id, token, |ctx| self.construct(registration, class, ctx))
      })
      .cloned()
  }

  // A provider that resolves through a fresh context can reach a cell this
  // thread is already initializing.
  fn building_here(&self, id: RegistrationId) -> bool {
    self
      .inner
      .building
      .get(&id)
      .is_some_and(|owner| *owner == thread::current().id())
  }

  fn owner_instance(&self) -> Instance {
    let mut slot = self.inner.owner_value.lock();
    if let Some(value) = slot.upgrade() {
      return Instance::from_value(value);
    }
    let value = Arc::new(self.clone());
    *slot = Arc::downgrade(&value);
    Instance::from_value(value)
  }

  fn resolution_scoped(
    &self,
    registration: &Arc<Registration>,
    class: &ClassRegistration,
    ctx: &mut ResolutionContext,
  ) -> Result<Instance> {
    if let Some(instance) = ctx.cached(registration.id()) {
      return Ok(instance);
    }
    let instance = ctx.constructing(registration.id(), registration.token(), |ctx| {
      self.construct(registration, class, ctx)
    })?;
    ctx.store(registration.id(), instance.clone());
    Ok(instance)
  }

  fn construct(
    &self,
    registration: &Arc<Registration>,
    class: &ClassRegistration,
    ctx: &mut ResolutionContext,
  ) -> Result<Instance> {
    let token = registration.token();
    let definition = class.class();
    let metadata = definition.metadata();

    let mut args = Vec::with_capacity(metadata.constructor_args().len());
    for descriptor in metadata.constructor_args() {
      let injected = match descriptor {
        Some(descriptor) => self
          .inject(descriptor, ctx)
          .map_err(|err| err.required_by(token))?,
        None => Injected::Absent,
      };
      args.push(injected);
    }

    let mut component = definition.construct(Arguments::new(args))?;

    for (property, descriptor) in metadata.properties() {
      let injected = self
        .inject(descriptor, ctx)
        .map_err(|err| err.required_by(token))?;
      component.inject(property, injected)?;
    }

    let component: Arc<dyn Component> = Arc::from(component);

    if let Some(method) = metadata.post_construct_method() {
      if let MethodReturn::Pending(_) = component.invoke(method, Vec::new())? {
        return Err(Error::AsyncPostConstruct {
          class: definition.name(),
          method: method.to_owned(),
        });
      }
    }

    trace!(
      container = %self.id(),
      token = %token,
      class = definition.name(),
      scope = ?class.scope(),
      "constructed"
    );

    if registration.is_advisor() {
      let maps = metadata.advice().clone();
      Ok(advice::weave(self, registration.clone(), component, maps))
    } else {
      Ok(Instance::component(component))
    }
  }

  fn inject(&self, descriptor: &Descriptor, ctx: &mut ResolutionContext) -> Result<Injected> {
    match descriptor {
      Descriptor::Autowired {
        token,
        is_array,
        optional,
      } => {
        let token = token.token();
        if *optional && self.lookup(token).is_none() {
          return Ok(Injected::Absent);
        }
        if *is_array {
          self.resolve_all_in(token, ctx).map(Injected::Many)
        } else {
          self.resolve_in(token, ctx).map(Injected::One)
        }
      }
      Descriptor::Value { path, default } => {
        let holder = self
          .resolve_in(&CONFIG_HOLDER, ctx)?
          .downcast::<Arc<dyn ConfigHolder>>()
          .ok_or(Error::TypeMismatch {
            expected: type_name::<Arc<dyn ConfigHolder>>(),
          })?;
        Ok(
          holder
            .get(path)
            .or_else(|| default.clone())
            .map(|value| Injected::One(Instance::from_value(value)))
            .unwrap_or_default(),
        )
      }
    }
  }
}

fn unresolved(token: &Token) -> Error {
  Error::Unresolved {
    token: token.clone(),
    chain: Vec::new(),
  }
}

impl Default for Container {
  fn default() -> Self {
    Self::new()
  }
}

impl RegistrySource for Container {
  fn registrations(&self, token: &Token) -> Vec<(Self, Arc<Registration>)> {
    self
      .lookup_all(token)
      .map(|(owner, history)| history.into_iter().map(|r| (owner.clone(), r)).collect())
      .unwrap_or_default()
  }
}

impl fmt::Debug for Container {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Container")
      .field("id", &self.inner.id)
      .field("parent", &self.inner.parent.as_ref().map(Container::id))
      .field("singletons", &self.inner.singletons.len())
      .finish()
  }
}
