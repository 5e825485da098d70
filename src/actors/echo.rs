// src/actors/echo.rs

use std::any::Any;
use std::thread::{self, ThreadId};

use crate::actors::{reply_with, unsupported};
use crate::error::CotaskError;
use crate::runtime::call::{CallToken, Caller};
use crate::runtime::message::{Message, Payload};
use crate::runtime::task::TaskHandle;

pub(crate) const NAME: &str = "echo";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u64)]
pub enum EchoOp {
  /// Replies with the request payload unchanged.
  Echo = 0,
  /// Replies with the `ThreadId` the actor is running on.
  Thread = 1,
  /// Replies with how many requests were handled before this one.
  Handled = 2,
}

impl From<EchoOp> for u64 {
  fn from(op: EchoOp) -> Self {
    op as u64
  }
}

impl TryFrom<u64> for EchoOp {
  type Error = CotaskError;

  fn try_from(header: u64) -> Result<Self, Self::Error> {
    match header {
      0 => Ok(EchoOp::Echo),
      1 => Ok(EchoOp::Thread),
      2 => Ok(EchoOp::Handled),
      _ => Err(unsupported(NAME, header)),
    }
  }
}

/// Mirrors requests back; mostly useful to probe the runtime itself.
#[derive(Debug, Default)]
pub struct EchoActor {
  handled: u64,
}

impl EchoActor {
  pub fn new() -> Self {
    Self::default()
  }

  pub(crate) fn step(&mut self, message: Message) -> Result<Payload, CotaskError> {
    let op = EchoOp::try_from(message.header())?;
    let handled = self.handled;
    self.handled += 1;
    match op {
      EchoOp::Echo => Ok(message.into_payload()),
      EchoOp::Thread => reply_with(thread::current().id()),
      EchoOp::Handled => reply_with(handled),
    }
  }
}

#[derive(Debug, Clone)]
pub struct EchoRef {
  handle: TaskHandle,
}

impl EchoRef {
  pub fn new(handle: TaskHandle) -> Self {
    Self { handle }
  }

  pub fn handle(&self) -> &TaskHandle {
    &self.handle
  }

  pub fn echo<P: Any + Send>(&self, caller: &impl Caller, payload: P) -> Result<CallToken<P>, CotaskError> {
    Ok(caller.call(&self.handle, EchoOp::Echo.into(), Box::new(payload))?.typed())
  }

  pub fn thread(&self, caller: &impl Caller) -> Result<CallToken<ThreadId>, CotaskError> {
    Ok(caller.call(&self.handle, EchoOp::Thread.into(), Box::new(()))?.typed())
  }

  pub fn handled(&self, caller: &impl Caller) -> Result<CallToken<u64>, CotaskError> {
    Ok(caller.call(&self.handle, EchoOp::Handled.into(), Box::new(()))?.typed())
  }
}
