//! # Fibre Inject
//!
//! A thread-safe dependency-injection runtime driven by class metadata.
//!
//! Classes describe their injection points (constructor arguments, properties,
//! a post-construct hook and optional method advice) as [`ClassMetadata`]. The
//! [`Container`] records registrations per [`Token`], checks constructor
//! dependency graphs for cycles, and builds instances on demand.
//!
//! ## Core Concepts
//!
//! - **Token**: a string name, a unique symbol, or a type identity.
//! - **Registration kinds**: `class`, `advisor`, `factory`, `constant` and
//!   `dynamic`. The latest registration of a token wins; the full history stays
//!   available to array injection and [`Container::resolve_all`].
//! - **Scopes**: [`Scope::Singleton`] builds once per container,
//!   [`Scope::Resolution`] once per top-level `resolve` call.
//! - **Hierarchy**: child containers fall back to their ancestors.
//! - **Advisors**: calls through an advisor's [`Instance`] run its advice.
//!
//! ## Quick Start
//!
//! ```
//! use fibre_inject::{Arguments, ClassMetadata, Component, Container, Descriptor, Injectable, Scope};
//! use std::sync::Arc;
//!
//! struct Database {
//!   url: String,
//! }
//! impl Component for Database {}
//!
//! struct Repository {
//!   db: Arc<Database>,
//! }
//! impl Component for Repository {}
//!
//! impl Injectable for Repository {
//!   fn metadata() -> ClassMetadata {
//!     ClassMetadata::new().constructor_arg(0, Descriptor::autowired("db"))
//!   }
//!
//!   fn construct(args: Arguments) -> fibre_inject::Result<Self> {
//!     Ok(Repository { db: args.required(0)? })
//!   }
//! }
//!
//! let container = Container::new();
//! container
//!   .register_constant("db", Database { url: "postgres://localhost".into() })
//!   .unwrap();
//! container.register_type::<Repository>(Scope::Singleton).unwrap();
//!
//! let repo = container.resolve_as::<Repository>(fibre_inject::Token::of::<Repository>()).unwrap();
//! assert_eq!(repo.db.url, "postgres://localhost");
//! ```

mod advice;
mod class;
mod component;
mod config;
mod container;
mod context;
mod descriptor;
mod error;
#[cfg(feature = "global")]
mod global;
mod instance;
#[cfg(feature = "global")]
mod macros;
mod registry;
mod token;

pub use advice::{Advice, AdviceKind, AdviceMaps, InvocationContext};
pub use class::{ClassDefinition, ClassMetadata, Injectable};
pub use component::{value, AsAny, Component, MethodReturn, ObjectFactory, Value};
pub use config::{ConfigHolder, JsonConfig};
pub use container::{Container, ContainerConfig};
pub use descriptor::Descriptor;
pub use error::{BoxError, CycleLink, Error, Result};
#[cfg(feature = "global")]
pub use global::global;
pub use instance::{Arguments, Injected, Instance};
pub use registry::{
  ClassOptions, ClassRegistration, Constant, DynamicFn, FactoryFn, Registration, RegistrationId,
  RegistrationKind, Registry, RegistrySource, Scope,
};
pub use token::{LazyToken, Symbol, Token, TokenRef, CONFIG_HOLDER, DEPENDENCY_CONTAINER};
