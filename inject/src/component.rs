//! The call interface every class-backed instance exposes to the container.

use crate::error::{Error, Result};
use crate::instance::Injected;
use futures_util::future::{BoxFuture, FutureExt};
use std::any::{type_name, Any};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// A type-erased, shareable value as produced by resolution and method calls.
pub type Value = Arc<dyn Any + Send + Sync>;

/// Wraps `value` into a [`Value`].
pub fn value<T: Any + Send + Sync>(value: T) -> Value {
  Arc::new(value)
}

pub(crate) fn unit() -> Value {
  Arc::new(())
}

/// Erases a shared component down to `Any` without losing its concrete type.
pub trait AsAny: Any + Send + Sync {
  fn into_any(self: Arc<Self>) -> Value;
  fn as_any(&self) -> &dyn Any;
}

impl<T: Any + Send + Sync> AsAny for T {
  fn into_any(self: Arc<Self>) -> Value {
    self
  }

  fn as_any(&self) -> &dyn Any {
    self
  }
}

/// A class the container can construct, wire and intercept.
///
/// `inject` receives property injections after construction. `invoke` is the
/// uniform method-call interface used for post-construct hooks and for advice
/// interception; a component only needs to route the methods it wants reachable.
pub trait Component: AsAny {
  fn inject(&mut self, property: &str, value: Injected) -> Result<()> {
    let _ = value;
    Err(Error::UnknownProperty {
      class: type_name::<Self>(),
      property: property.to_owned(),
    })
  }

  fn invoke(&self, method: &str, args: Vec<Value>) -> Result<MethodReturn> {
    let _ = args;
    Err(Error::UnknownMethod {
      class: type_name::<Self>(),
      method: method.to_owned(),
    })
  }
}

/// The outcome of a method call: either a value, or a future that yields one.
pub enum MethodReturn {
  Ready(Value),
  Pending(BoxFuture<'static, Result<Value>>),
}

impl MethodReturn {
  pub fn ready<T: Any + Send + Sync>(value: T) -> Self {
    MethodReturn::Ready(Arc::new(value))
  }

  pub fn unit() -> Self {
    MethodReturn::Ready(unit())
  }

  pub fn pending<F>(future: F) -> Self
  where
    F: Future<Output = Result<Value>> + Send + 'static,
  {
    MethodReturn::Pending(future.boxed())
  }

  pub fn is_pending(&self) -> bool {
    matches!(self, MethodReturn::Pending(_))
  }

  /// Returns the value of a synchronous call, `None` for a pending one.
  pub fn into_ready(self) -> Option<Value> {
    match self {
      MethodReturn::Ready(value) => Some(value),
      MethodReturn::Pending(_) => None,
    }
  }

  /// Awaits the call's value, whichever shape it has.
  pub async fn into_value(self) -> Result<Value> {
    match self {
      MethodReturn::Ready(value) => Ok(value),
      MethodReturn::Pending(future) => future.await,
    }
  }
}

impl fmt::Debug for MethodReturn {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      MethodReturn::Ready(_) => f.write_str("MethodReturn::Ready(..)"),
      MethodReturn::Pending(_) => f.write_str("MethodReturn::Pending(..)"),
    }
  }
}

/// A callable produced by a `factory` registration. The callable itself is the
/// resolved value; callers invoke it later with their own arguments.
#[derive(Clone)]
pub struct ObjectFactory(Arc<dyn Fn(Vec<Value>) -> Result<Value> + Send + Sync>);

impl ObjectFactory {
  pub fn new(factory: impl Fn(Vec<Value>) -> Result<Value> + Send + Sync + 'static) -> Self {
    Self(Arc::new(factory))
  }

  pub fn call(&self, args: Vec<Value>) -> Result<Value> {
    (self.0)(args)
  }

  /// Calls the factory and downcasts its product.
  pub fn create<T: Any + Send + Sync>(&self, args: Vec<Value>) -> Result<Arc<T>> {
    self
      .call(args)?
      .downcast::<T>()
      .map_err(|_| Error::TypeMismatch {
        expected: type_name::<T>(),
      })
  }
}

impl fmt::Debug for ObjectFactory {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("ObjectFactory(..)")
  }
}
