//! Public macros for ergonomic resolution from the global container.

/// Resolves a value from the global container and downcasts it.
///
/// `resolve!(Type)` looks up `Token::of::<Type>()`; `resolve!(Type, token)` looks
/// up any token and expects the result to be a `Type`. Evaluates to `Arc<Type>`.
///
/// # Panics
///
/// Panics if resolution fails or the value is not a `Type`. For a non-panicking
/// version, use [`maybe_resolve!`] or `global().resolve_as(...)`.
///
/// # Examples
///
/// ```
/// use fibre_inject::{global, resolve};
///
/// global().register_constant("port", 8080_u16).unwrap();
///
/// let port = resolve!(u16, "port");
/// assert_eq!(*port, 8080);
/// ```
#[macro_export]
macro_rules! resolve {
  ($type:ty) => {
    $crate::resolve!($type, $crate::Token::of::<$type>())
  };

  ($type:ty, $token:expr) => {{
    let token: $crate::Token = ::std::convert::Into::into($token);
    match $crate::global().resolve_as::<$type>(&token) {
      Ok(value) => value,
      Err(err) => panic!(
        "Failed to resolve {} as {}: {}",
        token,
        ::std::any::type_name::<$type>(),
        err
      ),
    }
  }};
}

/// Like [`resolve!`], but evaluates to `Option<Arc<Type>>` instead of panicking.
///
/// ```
/// use fibre_inject::maybe_resolve;
///
/// assert!(maybe_resolve!(String, "never-registered").is_none());
/// ```
#[macro_export]
macro_rules! maybe_resolve {
  ($type:ty) => {
    $crate::maybe_resolve!($type, $crate::Token::of::<$type>())
  };

  ($type:ty, $token:expr) => {
    $crate::global().resolve_as::<$type>($token).ok()
  };
}
