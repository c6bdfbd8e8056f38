//! The process-wide container.

use crate::container::{Container, ContainerConfig};
use once_cell::sync::Lazy;

// Created on first access in a thread-safe manner.
static GLOBAL_CONTAINER: Lazy<Container> =
  Lazy::new(|| Container::with_config(ContainerConfig::new().with_id("global")));

/// Provides a reference to the global container instance.
///
/// Registrations may happen from anywhere in an application. Call
/// [`Container::reset`] on it to tear everything down.
///
/// # Examples
///
/// ```
/// use fibre_inject::global;
///
/// global().register_constant("greeting", String::from("Hello from global!")).unwrap();
/// let greeting = global().resolve_as::<String>("greeting").unwrap();
/// assert_eq!(*greeting, "Hello from global!");
/// ```
pub fn global() -> &'static Container {
  &GLOBAL_CONTAINER
}
