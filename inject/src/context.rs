//! The per-call resolution context.
//!
//! One context is created for every external `resolve`/`resolve_all` call and is
//! threaded explicitly through the recursive resolution of that call tree. It is
//! never stored in the container or in thread-local state, so concurrent calls
//! on the same container cannot observe each other's `Resolution`-scoped instances.

use crate::error::{CycleLink, Error, Result};
use crate::instance::Instance;
use crate::registry::RegistrationId;
use crate::token::Token;
use std::collections::HashMap;

#[derive(Default)]
pub(crate) struct ResolutionContext {
  instances: HashMap<RegistrationId, Instance>,
  // Registrations being constructed, outermost first.
  constructing: Vec<(RegistrationId, Token)>,
}

impl ResolutionContext {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  pub(crate) fn cached(&self, id: RegistrationId) -> Option<Instance> {
    self.instances.get(&id).cloned()
  }

  pub(crate) fn store(&mut self, id: RegistrationId, instance: Instance) {
    self.instances.insert(id, instance);
  }

  /// Fails if registration `id` is already under construction in this call tree.
  ///
  /// This catches cycles the static check cannot see, such as ones closed
  /// through property injection. Tokens alone are not compared: a child's
  /// override may depend on the ancestor registration it shadows.
  pub(crate) fn ensure_vacant(&self, id: RegistrationId, token: &Token) -> Result<()> {
    match self.constructing.iter().position(|(entry, _)| *entry == id) {
      Some(start) => Err(Error::CircularDependency {
        chain: self.chain_from(start, token),
      }),
      None => Ok(()),
    }
  }

  /// The whole construction stack closed by `token`.
  pub(crate) fn reentry(&self, token: &Token) -> Error {
    let mut chain = vec![CycleLink::root(token.clone())];
    chain.extend(self.chain_from(0, token));
    Error::CircularDependency { chain }
  }

  fn chain_from(&self, start: usize, token: &Token) -> Vec<CycleLink> {
    let mut chain: Vec<CycleLink> = self.constructing[start..]
      .iter()
      .map(|(_, t)| CycleLink::root(t.clone()))
      .collect();
    chain.push(CycleLink::root(token.clone()));
    chain
  }

  /// Runs `build` with registration `id` marked as under construction.
  pub(crate) fn constructing<R>(
    &mut self,
    id: RegistrationId,
    token: &Token,
    build: impl FnOnce(&mut Self) -> Result<R>,
  ) -> Result<R> {
    self.ensure_vacant(id, token)?;
    self.constructing.push((id, token.clone()));
    let result = build(self);
    self.constructing.pop();
    result
  }
}
