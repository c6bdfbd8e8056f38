//! The advisor weaver: method interception composed over a resolved instance.
//!
//! An advisor's resolved instance is wrapped in a [`Woven`] call interface. Calls
//! to a method named in any of the five advice maps run, in order:
//!
//! 1. every `Before` advice for the method (they may rewrite `args`);
//! 2. the original method;
//! 3. the `After*Returning` or `After*Throws` advice, picked by whether the call
//!    returned a future and by its outcome.
//!
//! A throwing branch re-raises the error unless some advice cleared
//! `exception`; the call then returns `result` instead.

use crate::component::{unit, Component, MethodReturn, Value};
use crate::container::{Container, WeakContainer};
use crate::error::{Error, Result};
use crate::registry::Registration;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// The five interception points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdviceKind {
  Before,
  AfterAsyncReturning,
  AfterSyncReturning,
  AfterAsyncThrows,
  AfterSyncThrows,
}

type AdviceFn = dyn Fn(&mut InvocationContext) -> Result<()> + Send + Sync;

/// One piece of advice. Errors it returns abort the remaining chain and reach the caller.
#[derive(Clone)]
pub struct Advice {
  label: Option<String>,
  hook: Arc<AdviceFn>,
}

impl Advice {
  pub fn new(hook: impl Fn(&mut InvocationContext) -> Result<()> + Send + Sync + 'static) -> Self {
    Self {
      label: None,
      hook: Arc::new(hook),
    }
  }

  /// Names the advice for diagnostics.
  pub fn labeled(mut self, label: impl Into<String>) -> Self {
    self.label = Some(label.into());
    self
  }

  pub fn label(&self) -> Option<&str> {
    self.label.as_deref()
  }
}

impl fmt::Debug for Advice {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Advice").field("label", &self.label).finish()
  }
}

/// Advice declared by one class: hook kind -> method name -> advice in declaration order.
#[derive(Clone, Debug, Default)]
pub struct AdviceMaps {
  maps: HashMap<AdviceKind, HashMap<String, Vec<Advice>>>,
}

impl AdviceMaps {
  pub fn add(&mut self, kind: AdviceKind, method: impl Into<String>, advice: Advice) {
    self
      .maps
      .entry(kind)
      .or_default()
      .entry(method.into())
      .or_default()
      .push(advice);
  }

  pub fn get(&self, kind: AdviceKind, method: &str) -> &[Advice] {
    self
      .maps
      .get(&kind)
      .and_then(|methods| methods.get(method))
      .map(Vec::as_slice)
      .unwrap_or(&[])
  }

  /// Whether any hook names `method`.
  pub fn intercepts(&self, method: &str) -> bool {
    self.maps.values().any(|methods| methods.contains_key(method))
  }

  pub fn is_empty(&self) -> bool {
    self.maps.values().all(HashMap::is_empty)
  }
}

/// Everything an advice sees about the intercepted call.
pub struct InvocationContext {
  registration: Arc<Registration>,
  container: Container,
  method: Arc<str>,
  instance: Arc<dyn Component>,
  /// Arguments handed to the original method. `Before` advice may rewrite them.
  pub args: Vec<Value>,
  /// Set once the original method returned. Advice may replace it.
  pub result: Option<Value>,
  /// Set once the original method failed. Advice clearing it suppresses the error.
  pub exception: Option<Error>,
}

impl InvocationContext {
  pub fn registration(&self) -> &Arc<Registration> {
    &self.registration
  }

  pub fn container(&self) -> &Container {
    &self.container
  }

  pub fn method(&self) -> &str {
    &self.method
  }

  /// The target, unadvised.
  pub fn instance(&self) -> &Arc<dyn Component> {
    &self.instance
  }

  pub fn result_as<T: std::any::Any + Send + Sync>(&self) -> Option<Arc<T>> {
    self.result.clone()?.downcast::<T>().ok()
  }

  fn finish(&mut self) -> Result<Value> {
    match self.exception.take() {
      Some(err) => Err(err),
      None => Ok(self.result.take().unwrap_or_else(unit)),
    }
  }
}

impl fmt::Debug for InvocationContext {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("InvocationContext")
      .field("token", self.registration.token())
      .field("method", &self.method)
      .field("args", &self.args.len())
      .field("has_result", &self.result.is_some())
      .field("exception", &self.exception)
      .finish()
  }
}

fn run_advice(advice: &[Advice], kind: AdviceKind, ctx: &mut InvocationContext) -> Result<()> {
  for entry in advice {
    trace!(
      token = %ctx.registration.token(),
      method = %ctx.method,
      advice = entry.label().unwrap_or("<anonymous>"),
      ?kind,
      "running advice"
    );
    (entry.hook)(ctx)?;
  }
  Ok(())
}

/// The call interface of an advised instance.
pub(crate) struct Woven {
  registration: Arc<Registration>,
  container: WeakContainer,
  target: Arc<dyn Component>,
  advice: Arc<AdviceMaps>,
}

impl Woven {
  pub(crate) fn invoke(&self, method: &str, args: Vec<Value>) -> Result<MethodReturn> {
    if !self.advice.intercepts(method) {
      return self.target.invoke(method, args);
    }
    let container = self.container.upgrade().ok_or(Error::ContainerDropped)?;

    let mut ctx = InvocationContext {
      registration: self.registration.clone(),
      container,
      method: Arc::from(method),
      instance: self.target.clone(),
      args,
      result: None,
      exception: None,
    };

    run_advice(self.advice.get(AdviceKind::Before, method), AdviceKind::Before, &mut ctx)?;

    match self.target.invoke(method, ctx.args.clone()) {
      Ok(MethodReturn::Ready(value)) => {
        ctx.result = Some(value);
        let kind = AdviceKind::AfterSyncReturning;
        run_advice(self.advice.get(kind, method), kind, &mut ctx)?;
        ctx.finish().map(MethodReturn::Ready)
      }
      Err(err) => {
        ctx.exception = Some(err);
        let kind = AdviceKind::AfterSyncThrows;
        run_advice(self.advice.get(kind, method), kind, &mut ctx)?;
        ctx.finish().map(MethodReturn::Ready)
      }
      Ok(MethodReturn::Pending(future)) => {
        let advice = self.advice.clone();
        Ok(MethodReturn::pending(async move {
          let kind = match future.await {
            Ok(value) => {
              ctx.result = Some(value);
              AdviceKind::AfterAsyncReturning
            }
            Err(err) => {
              ctx.exception = Some(err);
              AdviceKind::AfterAsyncThrows
            }
          };
          let method = ctx.method.clone();
          run_advice(advice.get(kind, &method), kind, &mut ctx)?;
          ctx.finish()
        }))
      }
    }
  }
}

/// Wraps a freshly built advisor instance.
pub(crate) fn weave(
  container: &Container,
  registration: Arc<Registration>,
  target: Arc<dyn Component>,
  advice: Arc<AdviceMaps>,
) -> crate::instance::Instance {
  trace!(
    container = %container.id(),
    token = %registration.token(),
    "weaving advisor instance"
  );
  let woven = Woven {
    registration,
    container: container.downgrade(),
    target: target.clone(),
    advice,
  };
  crate::instance::Instance::woven(target, woven)
}
