// src/runtime/message.rs

//! Messages exchanged between tasks and the reply slot that travels with them.

use std::any::Any;
use std::fmt;

use tokio::sync::oneshot;

use crate::error::CotaskError;
use crate::runtime::task::{TaskId, WeakTaskHandle};

/// Type-erased message body.
pub type Payload = Box<dyn Any + Send>;

/// Outcome delivered through a reply slot.
pub(crate) type ReplyResult = Result<Payload, CotaskError>;

/// Reserved header asking a task to finish its receive loop.
pub const SYSTEM_STOP: u64 = u64::MAX;

/// An immutable request: operation header, payload and a non-owning
/// reference to the task that sent it (`None` for callers outside the
/// runtime).
pub struct Message {
  header: u64,
  payload: Payload,
  sender: Option<WeakTaskHandle>,
}

impl Message {
  pub fn header(&self) -> u64 {
    self.header
  }

  pub fn is_stop(&self) -> bool {
    self.header == SYSTEM_STOP
  }

  pub fn sender(&self) -> Option<&WeakTaskHandle> {
    self.sender.as_ref()
  }

  pub fn payload(&self) -> &(dyn Any + Send) {
    self.payload.as_ref()
  }

  pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
    self.payload.downcast_ref::<T>()
  }

  pub fn into_payload(self) -> Payload {
    self.payload
  }

  /// Moves the payload out as `T`, or reports which type was expected.
  pub fn take<T: Any>(self) -> Result<T, CotaskError> {
    self
      .payload
      .downcast::<T>()
      .map(|boxed| *boxed)
      .map_err(|_| CotaskError::PayloadType {
        expected: std::any::type_name::<T>(),
      })
  }
}

impl fmt::Debug for Message {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Message")
      .field("header", &format_args!("{:#x}", self.header))
      .field("sender", &self.sender.as_ref().map(WeakTaskHandle::id))
      .finish_non_exhaustive()
  }
}

/// The reply half of a delivered message.
///
/// Consumed by [`ReplyTo::send`]; if it is dropped unused the sender still
/// observes exactly one outcome, a [`CotaskError::NoReply`].
pub struct ReplyTo {
  receiver: TaskId,
  header: u64,
  sender: Option<WeakTaskHandle>,
  tx: Option<oneshot::Sender<ReplyResult>>,
}

impl ReplyTo {
  /// Resolves the sender's call token. The reply is dropped silently when
  /// the sending task has already terminated.
  pub fn send(mut self, result: Result<Payload, CotaskError>) {
    self.deliver(result);
  }

  fn deliver(&mut self, result: ReplyResult) {
    let Some(tx) = self.tx.take() else {
      return;
    };
    if let Some(sender) = &self.sender {
      if !sender.is_alive() {
        tracing::trace!(
          receiver = %self.receiver,
          sender = %sender.id(),
          "Sender terminated; dropping reply"
        );
        return;
      }
    }
    if tx.send(result).is_err() {
      tracing::trace!(receiver = %self.receiver, "Call token dropped before reply");
    }
  }
}

impl Drop for ReplyTo {
  fn drop(&mut self) {
    if self.tx.is_some() {
      tracing::warn!(
        receiver = %self.receiver,
        header = self.header,
        "Message dropped without a reply"
      );
      let err = CotaskError::NoReply {
        task_id: self.receiver,
        header: self.header,
      };
      self.deliver(Err(err));
    }
  }
}

impl fmt::Debug for ReplyTo {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ReplyTo")
      .field("receiver", &self.receiver)
      .field("pending", &self.tx.is_some())
      .finish()
  }
}

/// A message together with its reply slot, as returned by a receive.
#[derive(Debug)]
pub struct Envelope {
  message: Message,
  reply: ReplyTo,
}

impl Envelope {
  pub(crate) fn new(
    receiver: TaskId,
    header: u64,
    payload: Payload,
    sender: Option<WeakTaskHandle>,
    tx: oneshot::Sender<ReplyResult>,
  ) -> Self {
    Self {
      message: Message {
        header,
        payload,
        sender: sender.clone(),
      },
      reply: ReplyTo {
        receiver,
        header,
        sender,
        tx: Some(tx),
      },
    }
  }

  pub fn message(&self) -> &Message {
    &self.message
  }

  pub fn header(&self) -> u64 {
    self.message.header
  }

  pub fn is_stop(&self) -> bool {
    self.message.is_stop()
  }

  /// Replies with `payload` and consumes the envelope.
  pub fn reply<P: Any + Send>(self, payload: P) {
    self.reply.send(Ok(Box::new(payload)));
  }

  pub fn reply_err(self, err: CotaskError) {
    self.reply.send(Err(err));
  }

  pub fn into_parts(self) -> (Message, ReplyTo) {
    (self.message, self.reply)
  }

  /// Resolves the sender's token with `err` without logging an unanswered
  /// message; used when the receiver is gone.
  pub(crate) fn reject(self, err: CotaskError) {
    self.reply.send(Err(err));
  }
}
