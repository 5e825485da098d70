// src/actors/mod.rs

//! Built-in actor variants.
//!
//! Each variant owns its state and a `step` function mapping one request to
//! one reply. The scheduler drives them through [`Actor::handle`]; no
//! coroutine is involved, so an actor's whole suspended state is its struct.

pub mod counter;
pub mod echo;
pub mod window;

pub use counter::{CounterActor, CounterOp, CounterRef};
pub use echo::{EchoActor, EchoOp, EchoRef};
pub use window::{WindowActor, WindowOp, WindowRef, WindowSurface};

use crate::error::CotaskError;
use crate::runtime::message::{Envelope, Payload};
use crate::runtime::task::Affinity;

/// The closed set of actors the scheduler can run without a coroutine body.
#[derive(Debug)]
pub enum Actor {
  Window(WindowActor),
  Counter(CounterActor),
  Echo(EchoActor),
}

/// Whether the actor keeps receiving after the envelope it just handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
  Continue,
  Stop,
}

impl Actor {
  pub fn name(&self) -> &'static str {
    match self {
      Actor::Window(_) => window::NAME,
      Actor::Counter(_) => counter::NAME,
      Actor::Echo(_) => echo::NAME,
    }
  }

  /// The only affinity this variant may be spawned with, if it is confined.
  pub fn required_affinity(&self) -> Option<Affinity> {
    match self {
      Actor::Window(_) => Some(Affinity::MainThread),
      Actor::Counter(_) | Actor::Echo(_) => None,
    }
  }

  /// Handles one envelope and answers it exactly once.
  pub(crate) fn handle(&mut self, envelope: Envelope) -> Flow {
    let (message, reply) = envelope.into_parts();
    if message.is_stop() {
      tracing::debug!(actor = self.name(), "Stop requested");
      reply.send(Ok(Box::new(())));
      return Flow::Stop;
    }

    let header = message.header();
    let result = match self {
      Actor::Window(actor) => actor.step(message),
      Actor::Counter(actor) => actor.step(message),
      Actor::Echo(actor) => actor.step(message),
    };
    if let Err(e) = &result {
      tracing::debug!(actor = self.name(), header, error = %e, "Operation failed");
    }
    reply.send(result);
    Flow::Continue
  }
}

impl From<WindowActor> for Actor {
  fn from(actor: WindowActor) -> Self {
    Actor::Window(actor)
  }
}

impl From<CounterActor> for Actor {
  fn from(actor: CounterActor) -> Self {
    Actor::Counter(actor)
  }
}

impl From<EchoActor> for Actor {
  fn from(actor: EchoActor) -> Self {
    Actor::Echo(actor)
  }
}

pub(crate) fn reply_with<P: std::any::Any + Send>(payload: P) -> Result<Payload, CotaskError> {
  Ok(Box::new(payload))
}

/// Maps a header outside an actor's operation set to an error reply.
pub(crate) fn unsupported(actor: &'static str, header: u64) -> CotaskError {
  CotaskError::UnsupportedOperation { actor, header }
}
