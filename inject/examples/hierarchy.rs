use fibre_inject::{Container, ContainerConfig};

fn main() -> fibre_inject::Result<()> {
  let app = Container::with_config(ContainerConfig::new().with_id("app"));
  app
    .register_constant("greeting", String::from("Hello from the app"))?
    .register_dynamic("who", |c: &Container| Ok(format!("resolved by {}", c.id())))?;

  let request = app.create_child_container_with(ContainerConfig::new().with_id("request"));
  request.register_constant("greeting", String::from("Hello from the request"))?;

  println!("app:     {}", app.resolve_as::<String>("greeting")?);
  println!("request: {}", request.resolve_as::<String>("greeting")?);
  // Fallback registrations run in the container that owns them.
  println!("who:     {}", request.resolve_as::<String>("who")?);

  let isolated = app.create_child_container_with(ContainerConfig::new().recursive_lookup(false));
  match isolated.resolve("greeting") {
    Ok(_) => println!("isolated unexpectedly saw the parent"),
    Err(err) => println!("isolated: {}", err),
  }
  Ok(())
}
