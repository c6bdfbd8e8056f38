use fibre_inject::{
  value, Advice, AdviceKind, Arguments, ClassDefinition, ClassMetadata, Component, Container, Error,
  InvocationContext, MethodReturn, Token, Value,
};
use std::time::Instant;

struct Payments;

impl Component for Payments {
  fn invoke(&self, method: &str, args: Vec<Value>) -> fibre_inject::Result<MethodReturn> {
    let amount = args
      .first()
      .and_then(|v| v.downcast_ref::<u64>())
      .copied()
      .unwrap_or_default();
    match method {
      "charge" if amount == 0 => Err(Error::invocation("nothing to charge")),
      "charge" => Ok(MethodReturn::ready(format!("charged {}", amount))),
      "refund" => Ok(MethodReturn::pending(async move { Ok(value(format!("refunded {}", amount))) })),
      _ => Err(Error::UnknownMethod {
        class: "Payments",
        method: method.to_owned(),
      }),
    }
  }
}

fn main() -> fibre_inject::Result<()> {
  let started = Instant::now();
  let metadata = ClassMetadata::new()
    .advise(
      AdviceKind::Before,
      "charge",
      Advice::new(|ctx: &mut InvocationContext| {
        println!("-> {} with {} argument(s)", ctx.method(), ctx.args.len());
        Ok(())
      })
      .labeled("audit"),
    )
    .advise(
      AdviceKind::AfterSyncThrows,
      "charge",
      Advice::new(|ctx: &mut InvocationContext| {
        if let Some(err) = ctx.exception.take() {
          println!("!! {} failed: {}", ctx.method(), err);
          ctx.result = Some(value(String::from("declined")));
        }
        Ok(())
      }),
    )
    .advise(
      AdviceKind::AfterAsyncReturning,
      "refund",
      Advice::new(move |ctx: &mut InvocationContext| {
        println!("<- {} after {:?}", ctx.method(), started.elapsed());
        Ok(())
      }),
    );

  let container = Container::new();
  container.register_advisor(ClassDefinition::new(|_: Arguments| Ok(Payments)).with_metadata(metadata))?;
  let payments = container.resolve(Token::of::<Payments>())?;

  for amount in [25_u64, 0] {
    let outcome = payments.call("charge", vec![value(amount)])?.into_ready();
    let text = outcome.and_then(|v| v.downcast_ref::<String>().cloned()).unwrap_or_default();
    println!("charge({}) = {}", amount, text);
  }

  let refund = futures_util::FutureExt::now_or_never(payments.call("refund", vec![value(10_u64)])?.into_value());
  if let Some(result) = refund {
    println!("refund = {:?}", result?.downcast_ref::<String>());
  }
  Ok(())
}
