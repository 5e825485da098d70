// src/actors/counter.rs

use crate::actors::{reply_with, unsupported};
use crate::error::CotaskError;
use crate::runtime::call::{CallToken, Caller};
use crate::runtime::message::{Message, Payload};
use crate::runtime::task::TaskHandle;

pub(crate) const NAME: &str = "counter";

/// Operations understood by [`CounterActor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u64)]
pub enum CounterOp {
  /// Payload `i64`; replies with the new value.
  Add = 0,
  /// Replies with the current value.
  Get = 1,
  /// Replies with the value before the reset.
  Reset = 2,
}

impl From<CounterOp> for u64 {
  fn from(op: CounterOp) -> Self {
    op as u64
  }
}

impl TryFrom<u64> for CounterOp {
  type Error = CotaskError;

  fn try_from(header: u64) -> Result<Self, Self::Error> {
    match header {
      0 => Ok(CounterOp::Add),
      1 => Ok(CounterOp::Get),
      2 => Ok(CounterOp::Reset),
      _ => Err(unsupported(NAME, header)),
    }
  }
}

/// A shared `i64` that only its own task ever touches.
#[derive(Debug, Default)]
pub struct CounterActor {
  value: i64,
}

impl CounterActor {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_value(value: i64) -> Self {
    Self { value }
  }

  pub(crate) fn step(&mut self, message: Message) -> Result<Payload, CotaskError> {
    match CounterOp::try_from(message.header())? {
      CounterOp::Add => {
        let delta = message.take::<i64>()?;
        self.value = self
          .value
          .checked_add(delta)
          .ok_or_else(|| CotaskError::InvalidArgument(format!("counter overflow adding {}", delta)))?;
        reply_with(self.value)
      }
      CounterOp::Get => reply_with(self.value),
      CounterOp::Reset => reply_with(std::mem::take(&mut self.value)),
    }
  }
}

/// Typed client for a spawned [`CounterActor`].
#[derive(Debug, Clone)]
pub struct CounterRef {
  handle: TaskHandle,
}

impl CounterRef {
  pub fn new(handle: TaskHandle) -> Self {
    Self { handle }
  }

  pub fn handle(&self) -> &TaskHandle {
    &self.handle
  }

  pub fn add(&self, caller: &impl Caller, delta: i64) -> Result<CallToken<i64>, CotaskError> {
    Ok(caller.call(&self.handle, CounterOp::Add.into(), Box::new(delta))?.typed())
  }

  pub fn get(&self, caller: &impl Caller) -> Result<CallToken<i64>, CotaskError> {
    Ok(caller.call(&self.handle, CounterOp::Get.into(), Box::new(()))?.typed())
  }

  pub fn reset(&self, caller: &impl Caller) -> Result<CallToken<i64>, CotaskError> {
    Ok(caller.call(&self.handle, CounterOp::Reset.into(), Box::new(()))?.typed())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::runtime::message::Envelope;
  use crate::runtime::task::TaskId;
  use tokio::sync::oneshot;

  fn message<P: std::any::Any + Send>(op: CounterOp, payload: P) -> Message {
    let (tx, _rx) = oneshot::channel();
    let envelope = Envelope::new(TaskId::from_raw(1), op.into(), Box::new(payload), None, tx);
    let (message, reply) = envelope.into_parts();
    // Answered here so dropping it does not log a missing reply.
    reply.send(Ok(Box::new(())));
    message
  }

  fn value(reply: Result<Payload, CotaskError>) -> i64 {
    *reply.unwrap().downcast::<i64>().unwrap()
  }

  #[test]
  fn add_get_reset() {
    let mut counter = CounterActor::new();
    assert_eq!(value(counter.step(message(CounterOp::Add, 5i64))), 5);
    assert_eq!(value(counter.step(message(CounterOp::Add, -2i64))), 3);
    assert_eq!(value(counter.step(message(CounterOp::Get, ()))), 3);
    assert_eq!(value(counter.step(message(CounterOp::Reset, ()))), 3);
    assert_eq!(value(counter.step(message(CounterOp::Get, ()))), 0);
  }

  #[test]
  fn wrong_payload_and_overflow_are_errors() {
    let mut counter = CounterActor::with_value(i64::MAX);
    assert!(matches!(
      counter.step(message(CounterOp::Add, "one")),
      Err(CotaskError::PayloadType { .. })
    ));
    assert!(matches!(
      counter.step(message(CounterOp::Add, 1i64)),
      Err(CotaskError::InvalidArgument(_))
    ));
    assert_eq!(value(counter.step(message(CounterOp::Get, ()))), i64::MAX);
  }

  #[test]
  fn header_round_trip() {
    assert_eq!(CounterOp::try_from(u64::from(CounterOp::Reset)).unwrap(), CounterOp::Reset);
    assert!(CounterOp::try_from(7).is_err());
  }
}
