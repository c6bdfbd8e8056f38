//! Resolved values and the typed views constructors use to read them.

use crate::advice::Woven;
use crate::component::{Component, MethodReturn, ObjectFactory, Value};
use crate::error::{Error, Result};
use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
enum Target {
  Plain(Arc<dyn Component>),
  Woven(Arc<Woven>),
}

/// A resolved value.
///
/// Cloning is cheap and preserves identity. Instances produced from class
/// registrations also carry the component's call interface; for advisors that
/// interface is the woven wrapper, so [`Instance::call`] runs the advice while
/// [`Instance::downcast`] hands out the raw, unadvised object.
#[derive(Clone)]
pub struct Instance {
  value: Value,
  target: Option<Target>,
}

impl Instance {
  pub fn new<T: Any + Send + Sync>(value: T) -> Self {
    Self::from_value(Arc::new(value))
  }

  pub fn from_value(value: Value) -> Self {
    Self {
      value,
      target: None,
    }
  }

  pub(crate) fn component(component: Arc<dyn Component>) -> Self {
    Self {
      value: component.clone().into_any(),
      target: Some(Target::Plain(component)),
    }
  }

  pub(crate) fn woven(component: Arc<dyn Component>, woven: Woven) -> Self {
    Self {
      value: component.into_any(),
      target: Some(Target::Woven(Arc::new(woven))),
    }
  }

  pub fn value(&self) -> &Value {
    &self.value
  }

  pub fn is<T: Any>(&self) -> bool {
    self.value.is::<T>()
  }

  pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
    self.value.clone().downcast::<T>().ok()
  }

  /// Like [`Instance::downcast`], but reports a mismatch as an error.
  pub fn expect<T: Any + Send + Sync>(&self) -> Result<Arc<T>> {
    self.downcast::<T>().ok_or(Error::TypeMismatch {
      expected: type_name::<T>(),
    })
  }

  /// Returns the callable if this instance was produced by a `factory` registration.
  pub fn as_factory(&self) -> Option<ObjectFactory> {
    self.value.downcast_ref::<ObjectFactory>().cloned()
  }

  /// Whether both instances are the same object.
  pub fn ptr_eq(&self, other: &Instance) -> bool {
    std::ptr::eq(
      Arc::as_ptr(&self.value) as *const (),
      Arc::as_ptr(&other.value) as *const (),
    )
  }

  /// Whether calls through this instance are intercepted by advice.
  pub fn is_advised(&self) -> bool {
    matches!(self.target, Some(Target::Woven(_)))
  }

  /// Calls `method` through the instance's call interface.
  pub fn call(&self, method: &str, args: Vec<Value>) -> Result<MethodReturn> {
    match &self.target {
      Some(Target::Plain(component)) => component.invoke(method, args),
      Some(Target::Woven(woven)) => woven.invoke(method, args),
      None => Err(Error::UnknownMethod {
        class: "<value>",
        method: method.to_owned(),
      }),
    }
  }
}

impl fmt::Debug for Instance {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Instance")
      .field("ptr", &Arc::as_ptr(&self.value))
      .field("callable", &self.target.is_some())
      .field("advised", &self.is_advised())
      .finish()
  }
}

/// What one injection point received.
#[derive(Clone, Debug, Default)]
pub enum Injected {
  /// An optional dependency with no registration, an unset configuration value, or
  /// a constructor position without a descriptor.
  #[default]
  Absent,
  One(Instance),
  /// Every registration of an array descriptor's token, in registration order.
  Many(Vec<Instance>),
}

impl Injected {
  pub fn is_absent(&self) -> bool {
    matches!(self, Injected::Absent)
  }

  pub fn instance(&self) -> Option<&Instance> {
    match self {
      Injected::One(instance) => Some(instance),
      _ => None,
    }
  }

  pub fn required<T: Any + Send + Sync>(&self) -> Result<Arc<T>> {
    self.optional::<T>()?.ok_or(Error::MissingInjection)
  }

  pub fn optional<T: Any + Send + Sync>(&self) -> Result<Option<Arc<T>>> {
    match self {
      Injected::Absent => Ok(None),
      Injected::One(instance) => instance.expect::<T>().map(Some),
      Injected::Many(_) => Err(Error::TypeMismatch {
        expected: type_name::<T>(),
      }),
    }
  }

  /// All injected values. A single value yields one element, `Absent` yields none.
  pub fn all<T: Any + Send + Sync>(&self) -> Result<Vec<Arc<T>>> {
    match self {
      Injected::Absent => Ok(Vec::new()),
      Injected::One(instance) => Ok(vec![instance.expect::<T>()?]),
      Injected::Many(instances) => instances.iter().map(Instance::expect::<T>).collect(),
    }
  }

  pub fn factory(&self) -> Result<ObjectFactory> {
    self
      .instance()
      .ok_or(Error::MissingInjection)?
      .as_factory()
      .ok_or(Error::TypeMismatch {
        expected: type_name::<ObjectFactory>(),
      })
  }
}

/// Constructor arguments, by position.
#[derive(Clone, Debug, Default)]
pub struct Arguments {
  values: Vec<Injected>,
}

impl Arguments {
  pub fn new(values: Vec<Injected>) -> Self {
    Self { values }
  }

  pub fn len(&self) -> usize {
    self.values.len()
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }

  /// The injection at `position`; positions past the end read as `Absent`.
  pub fn get(&self, position: usize) -> &Injected {
    static ABSENT: Injected = Injected::Absent;
    self.values.get(position).unwrap_or(&ABSENT)
  }

  pub fn required<T: Any + Send + Sync>(&self, position: usize) -> Result<Arc<T>> {
    match self.get(position).required::<T>() {
      Err(Error::MissingInjection) => Err(Error::MissingArgument(position)),
      other => other,
    }
  }

  pub fn optional<T: Any + Send + Sync>(&self, position: usize) -> Result<Option<Arc<T>>> {
    self.get(position).optional::<T>()
  }

  pub fn all<T: Any + Send + Sync>(&self, position: usize) -> Result<Vec<Arc<T>>> {
    self.get(position).all::<T>()
  }

  pub fn factory(&self, position: usize) -> Result<ObjectFactory> {
    match self.get(position).factory() {
      Err(Error::MissingInjection) => Err(Error::MissingArgument(position)),
      other => other,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn clones_share_identity() {
    let a = Instance::new(String::from("db"));
    let b = a.clone();
    let c = Instance::new(String::from("db"));
    assert!(a.ptr_eq(&b));
    assert!(!a.ptr_eq(&c));
  }

  #[test]
  fn arguments_report_positions() {
    let args = Arguments::new(vec![
      Injected::One(Instance::new(7_u32)),
      Injected::Absent,
    ]);

    assert_eq!(*args.required::<u32>(0).unwrap(), 7);
    assert!(matches!(args.required::<u32>(1), Err(Error::MissingArgument(1))));
    assert!(matches!(args.required::<u32>(5), Err(Error::MissingArgument(5))));
    assert!(matches!(args.required::<String>(0), Err(Error::TypeMismatch { .. })));
    assert!(args.optional::<u32>(1).unwrap().is_none());
  }

  #[test]
  fn values_are_not_callable() {
    let instance = Instance::new(1_u8);
    assert!(matches!(
      instance.call("run", Vec::new()),
      Err(Error::UnknownMethod { .. })
    ));
  }
}
