use fibre_inject::{
  value, Advice, AdviceKind, Arguments, ClassDefinition, ClassMetadata, Component, Container, Error,
  Instance, InvocationContext, MethodReturn, Result, Scope, Token, Value,
};
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};

// --- Test Fixtures ---

struct Calculator;

fn arg(args: &[Value], position: usize) -> i64 {
  args
    .get(position)
    .and_then(|v| v.downcast_ref::<i64>())
    .copied()
    .unwrap_or_default()
}

impl Component for Calculator {
  fn invoke(&self, method: &str, args: Vec<Value>) -> Result<MethodReturn> {
    let (a, b) = (arg(&args, 0), arg(&args, 1));
    match method {
      "add" => Ok(MethodReturn::ready(a + b)),
      "divide" if b == 0 => Err(Error::invocation("division by zero")),
      "divide" => Ok(MethodReturn::ready(a / b)),
      "add_later" => Ok(MethodReturn::pending(async move { Ok(value(a + b)) })),
      "fail_later" => Ok(MethodReturn::pending(async { Err(Error::invocation("boom")) })),
      "name" => Ok(MethodReturn::ready("calculator")),
      _ => Err(Error::UnknownMethod {
        class: "Calculator",
        method: method.to_owned(),
      }),
    }
  }
}

type Log = Arc<Mutex<Vec<String>>>;

fn record(log: &Log, kind: AdviceKind, entry: &'static str) -> Advice {
  let log = log.clone();
  Advice::new(move |ctx: &mut InvocationContext| {
    log.lock().unwrap().push(format!("{}:{}", entry, ctx.method()));
    Ok(())
  })
  .labeled(format!("{:?}:{}", kind, entry))
}

fn advised(metadata: ClassMetadata) -> (Container, Instance) {
  let container = Container::new();
  container
    .register_advisor(ClassDefinition::new(|_: Arguments| Ok(Calculator)).with_metadata(metadata))
    .unwrap();
  let instance = container.resolve(Token::of::<Calculator>()).unwrap();
  (container, instance)
}

fn ints(values: &[i64]) -> Vec<Value> {
  values.iter().map(|v| value(*v)).collect()
}

fn ready_i64(ret: MethodReturn) -> i64 {
  *ret.into_ready().unwrap().downcast_ref::<i64>().unwrap()
}

// --- Sync Advice ---

#[test]
fn test_before_advice_runs_in_declaration_order() {
  let log = Log::default();
  let metadata = ClassMetadata::new()
    .advise(AdviceKind::Before, "add", record(&log, AdviceKind::Before, "X"))
    .advise(AdviceKind::Before, "add", record(&log, AdviceKind::Before, "Y"));

  let (_container, calc) = advised(metadata);
  let sum = ready_i64(calc.call("add", ints(&[2, 3])).unwrap());

  assert_eq!(sum, 5);
  assert!(calc.is_advised());
  assert_eq!(*log.lock().unwrap(), vec!["X:add".to_string(), "Y:add".to_string()]);
}

#[test]
fn test_before_advice_rewrites_arguments() {
  let metadata = ClassMetadata::new().advise(
    AdviceKind::Before,
    "add",
    Advice::new(|ctx: &mut InvocationContext| {
      let offset = ctx.container().resolve_as::<i64>("offset")?;
      ctx.args[1] = value(*offset);
      Ok(())
    }),
  );

  let (container, calc) = advised(metadata);
  container.register_constant("offset", 40_i64).unwrap();

  assert_eq!(ready_i64(calc.call("add", ints(&[2, 3])).unwrap()), 42);
}

#[test]
fn test_after_returning_can_replace_the_result() {
  let log = Log::default();
  let metadata = ClassMetadata::new()
    .advise(
      AdviceKind::AfterSyncReturning,
      "add",
      Advice::new(|ctx: &mut InvocationContext| {
        let sum = ctx.result_as::<i64>().unwrap_or_default();
        ctx.result = Some(value(*sum * 100));
        Ok(())
      }),
    )
    .advise(AdviceKind::AfterSyncThrows, "add", record(&log, AdviceKind::AfterSyncThrows, "never"));

  let (_container, calc) = advised(metadata);

  assert_eq!(ready_i64(calc.call("add", ints(&[1, 2])).unwrap()), 300);
  assert!(log.lock().unwrap().is_empty());
}

#[test]
fn test_after_throws_reraises_unless_cleared() {
  let log = Log::default();
  let metadata = ClassMetadata::new()
    .advise(AdviceKind::AfterSyncThrows, "divide", record(&log, AdviceKind::AfterSyncThrows, "seen"))
    .advise(
      AdviceKind::AfterSyncThrows,
      "divide",
      Advice::new(|ctx: &mut InvocationContext| {
        if ctx.args.first().and_then(|v| v.downcast_ref::<i64>()) == Some(&0) {
          ctx.exception = None;
          ctx.result = Some(value(0_i64));
        }
        Ok(())
      }),
    );

  let (_container, calc) = advised(metadata);

  let err = calc.call("divide", ints(&[7, 0])).unwrap_err();
  assert_eq!(err.to_string(), "division by zero");

  assert_eq!(ready_i64(calc.call("divide", ints(&[0, 0])).unwrap()), 0);
  assert_eq!(ready_i64(calc.call("divide", ints(&[8, 2])).unwrap()), 4);
  assert_eq!(
    *log.lock().unwrap(),
    vec!["seen:divide".to_string(), "seen:divide".to_string()]
  );
}

#[test]
fn test_failing_advice_aborts_the_chain() {
  let log = Log::default();
  let metadata = ClassMetadata::new()
    .advise(
      AdviceKind::Before,
      "add",
      Advice::new(|_: &mut InvocationContext| Err(Error::invocation("denied"))),
    )
    .advise(AdviceKind::Before, "add", record(&log, AdviceKind::Before, "second"))
    .advise(AdviceKind::AfterSyncReturning, "add", record(&log, AdviceKind::AfterSyncReturning, "after"));

  let (_container, calc) = advised(metadata);
  let err = calc.call("add", ints(&[1, 1])).unwrap_err();

  assert_eq!(err.to_string(), "denied");
  assert!(log.lock().unwrap().is_empty());
}

#[test]
fn test_advice_context_describes_the_call() {
  let seen = Arc::new(Mutex::new(None));
  let sink = seen.clone();
  let metadata = ClassMetadata::new().advise(
    AdviceKind::Before,
    "add",
    Advice::new(move |ctx: &mut InvocationContext| {
      let raw = ctx.instance().invoke("name", Vec::new())?.into_ready();
      let name = raw.and_then(|v| v.downcast_ref::<&str>().copied());
      *sink.lock().unwrap() = Some((ctx.registration().token().clone(), ctx.method().to_string(), name));
      Ok(())
    }),
  );

  let (container, calc) = advised(metadata);
  calc.call("add", ints(&[1, 2])).unwrap();

  let (token, method, name) = seen.lock().unwrap().clone().unwrap();
  assert_eq!(token, Token::of::<Calculator>());
  assert_eq!(method, "add");
  assert_eq!(name, Some("calculator"));
  assert!(container.resolve(Token::of::<Calculator>()).unwrap().ptr_eq(&calc));
}

#[test]
fn test_unadvised_methods_and_raw_access() {
  let log = Log::default();
  let metadata = ClassMetadata::new().advise(AdviceKind::Before, "add", record(&log, AdviceKind::Before, "X"));

  let (_container, calc) = advised(metadata);

  let name = calc.call("name", Vec::new()).unwrap().into_ready().unwrap();
  assert_eq!(name.downcast_ref::<&str>(), Some(&"calculator"));
  assert!(calc.downcast::<Calculator>().is_some());
  assert!(log.lock().unwrap().is_empty());
}

#[test]
fn test_plain_class_ignores_advice() {
  let log = Log::default();
  let metadata = ClassMetadata::new().advise(AdviceKind::Before, "add", record(&log, AdviceKind::Before, "X"));
  let container = Container::new();
  container
    .register_class(
      "calc",
      ClassDefinition::new(|_: Arguments| Ok(Calculator)).with_metadata(metadata),
      Scope::Singleton,
    )
    .unwrap();

  let calc = container.resolve("calc").unwrap();

  assert!(!calc.is_advised());
  assert_eq!(ready_i64(calc.call("add", ints(&[2, 2])).unwrap()), 4);
  assert!(log.lock().unwrap().is_empty());
}

#[test]
fn test_dropped_container_is_reported() {
  let log = Log::default();
  let metadata = ClassMetadata::new().advise(AdviceKind::Before, "add", record(&log, AdviceKind::Before, "X"));

  let (container, calc) = advised(metadata);
  drop(container);

  assert!(matches!(calc.call("add", ints(&[1, 1])), Err(Error::ContainerDropped)));
  assert!(calc.call("name", Vec::new()).is_ok());
}

// --- Async Advice ---

#[tokio::test]
async fn test_async_returning_advice() {
  let log = Log::default();
  let metadata = ClassMetadata::new()
    .advise(AdviceKind::Before, "add_later", record(&log, AdviceKind::Before, "before"))
    .advise(
      AdviceKind::AfterSyncReturning,
      "add_later",
      record(&log, AdviceKind::AfterSyncReturning, "sync"),
    )
    .advise(
      AdviceKind::AfterAsyncReturning,
      "add_later",
      Advice::new(|ctx: &mut InvocationContext| {
        let sum = ctx.result_as::<i64>().unwrap_or_default();
        ctx.result = Some(value(-*sum));
        Ok(())
      }),
    );

  let (_container, calc) = advised(metadata);
  let pending = calc.call("add_later", ints(&[4, 5])).unwrap();
  assert!(pending.is_pending());

  let result = pending.into_value().await.unwrap();

  assert_eq!(result.downcast_ref::<i64>(), Some(&-9));
  assert_eq!(*log.lock().unwrap(), vec!["before:add_later".to_string()]);
}

#[tokio::test]
async fn test_async_throws_advice() {
  let log = Log::default();
  let metadata = ClassMetadata::new()
    .advise(
      AdviceKind::AfterAsyncThrows,
      "fail_later",
      record(&log, AdviceKind::AfterAsyncThrows, "caught"),
    )
    .advise(
      AdviceKind::AfterSyncThrows,
      "fail_later",
      record(&log, AdviceKind::AfterSyncThrows, "sync"),
    );

  let (_container, calc) = advised(metadata);

  let err = calc
    .call("fail_later", Vec::new())
    .unwrap()
    .into_value()
    .await
    .unwrap_err();

  assert_eq!(err.to_string(), "boom");
  assert_eq!(*log.lock().unwrap(), vec!["caught:fail_later".to_string()]);
}

#[tokio::test]
async fn test_async_throws_can_be_recovered() {
  let metadata = ClassMetadata::new().advise(
    AdviceKind::AfterAsyncThrows,
    "fail_later",
    Advice::new(|ctx: &mut InvocationContext| {
      ctx.exception = None;
      ctx.result = Some(value("recovered"));
      Ok(())
    }),
  );

  let (_container, calc) = advised(metadata);
  let result = calc.call("fail_later", Vec::new()).unwrap().into_value().await.unwrap();

  assert_eq!(result.downcast_ref::<&str>(), Some(&"recovered"));
}
