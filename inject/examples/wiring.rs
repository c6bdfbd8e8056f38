use fibre_inject::{
  Arguments, ClassDefinition, ClassMetadata, Component, Container, Descriptor, Injectable, Injected,
  JsonConfig, Scope,
};
use serde_json::json;
use std::sync::Arc;

// A connection pool configured from JSON.
struct Database {
  url: Arc<serde_json::Value>,
}
impl Component for Database {}
impl Injectable for Database {
  fn metadata() -> ClassMetadata {
    ClassMetadata::new().constructor_arg(0, Descriptor::value("db.url"))
  }

  fn construct(args: Arguments) -> fibre_inject::Result<Self> {
    Ok(Database {
      url: args.required(0)?,
    })
  }
}

// A repository with its database injected as a property.
#[derive(Default)]
struct UserRepository {
  db: Option<Arc<Database>>,
}
impl Component for UserRepository {
  fn inject(&mut self, property: &str, value: Injected) -> fibre_inject::Result<()> {
    if property == "db" {
      self.db = value.optional()?;
    }
    Ok(())
  }
}

fn main() -> fibre_inject::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter("fibre_inject=trace")
    .init();

  let container = Container::new();
  container
    .register_config(JsonConfig::new(json!({ "db": { "url": "postgres://localhost/app" } })))?
    .register_type::<Database>(Scope::Singleton)?
    .register_class(
      "users",
      ClassDefinition::new(|_: Arguments| Ok(UserRepository::default())).with_metadata(
        ClassMetadata::new().property("db", Descriptor::autowired(fibre_inject::Token::of::<Database>())),
      ),
      Scope::Resolution,
    )?;

  let first = container.resolve_as::<UserRepository>("users")?;
  let second = container.resolve_as::<UserRepository>("users")?;

  let (a, b) = (first.db.clone(), second.db.clone());
  println!("db url: {}", a.as_ref().map(|db| db.url.to_string()).unwrap_or_default());
  println!("repositories are distinct: {}", !Arc::ptr_eq(&first, &second));
  println!(
    "database is shared: {}",
    matches!((a, b), (Some(a), Some(b)) if Arc::ptr_eq(&a, &b))
  );
  Ok(())
}
