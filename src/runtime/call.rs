// src/runtime/call.rs

//! Call tokens: the caller-held side of one request/reply exchange.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::CotaskError;
use crate::runtime::context::TaskContext;
use crate::runtime::message::{Payload, ReplyResult};
use crate::runtime::task::{TaskHandle, TaskId};

/// Resolves to the single reply for one sent message.
///
/// A plain future: await it inside a task body (the task suspends until the
/// reply lands) or on any other executor. Dropping it discards interest in
/// the reply.
#[must_use = "a call token does nothing unless awaited"]
pub struct CallToken<R = Payload> {
  target: TaskId,
  rx: oneshot::Receiver<ReplyResult>,
  convert: fn(Payload) -> Result<R, CotaskError>,
}

impl CallToken<Payload> {
  pub(crate) fn new(target: TaskId, rx: oneshot::Receiver<ReplyResult>) -> Self {
    Self {
      target,
      rx,
      convert: Ok,
    }
  }

  /// Narrows the reply to `R`; a mismatching payload resolves to
  /// [`CotaskError::PayloadType`].
  pub fn typed<R: Any>(self) -> CallToken<R> {
    CallToken {
      target: self.target,
      rx: self.rx,
      convert: downcast::<R>,
    }
  }
}

impl<R> CallToken<R> {
  pub fn target(&self) -> TaskId {
    self.target
  }
}

fn downcast<R: Any>(payload: Payload) -> Result<R, CotaskError> {
  payload
    .downcast::<R>()
    .map(|boxed| *boxed)
    .map_err(|_| CotaskError::PayloadType {
      expected: std::any::type_name::<R>(),
    })
}

impl<R> Future for CallToken<R> {
  type Output = Result<R, CotaskError>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let this = self.get_mut();
    match Pin::new(&mut this.rx).poll(cx) {
      Poll::Pending => Poll::Pending,
      Poll::Ready(Ok(Ok(payload))) => Poll::Ready((this.convert)(payload)),
      Poll::Ready(Ok(Err(err))) => Poll::Ready(Err(err)),
      // Only reachable when the reply was suppressed because this side's
      // sending task had terminated.
      Poll::Ready(Err(_)) => Poll::Ready(Err(CotaskError::Undelivered { task_id: this.target })),
    }
  }
}

impl<R> fmt::Debug for CallToken<R> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CallToken")
      .field("target", &self.target)
      .field("reply_type", &std::any::type_name::<R>())
      .finish()
  }
}

/// Whoever is issuing a call: a task (whose weak handle becomes the reply
/// address) or code running outside the runtime.
pub trait Caller {
  fn call(&self, target: &TaskHandle, header: u64, payload: Payload) -> Result<CallToken, CotaskError>;
}

/// Caller for threads that are not running a task body.
#[derive(Debug, Clone, Copy, Default)]
pub struct External;

impl Caller for External {
  fn call(&self, target: &TaskHandle, header: u64, payload: Payload) -> Result<CallToken, CotaskError> {
    target.task.deliver(header, payload, None)
  }
}

impl Caller for TaskContext {
  fn call(&self, target: &TaskHandle, header: u64, payload: Payload) -> Result<CallToken, CotaskError> {
    target.task.deliver(header, payload, Some(self.weak_self()))
  }
}

impl<C: Caller + ?Sized> Caller for &C {
  fn call(&self, target: &TaskHandle, header: u64, payload: Payload) -> Result<CallToken, CotaskError> {
    (**self).call(target, header, payload)
  }
}
