// src/actors/window.rs

//! A window confined to the main thread.
//!
//! [`WindowSurface`] stands in for a platform window: it has no rendering
//! backend but keeps the one property the runtime has to respect, namely
//! that it may only be touched from the thread that opened it.

use std::thread::{self, ThreadId};

use crate::actors::{reply_with, unsupported};
use crate::error::CotaskError;
use crate::runtime::call::{CallToken, Caller};
use crate::runtime::message::{Message, Payload};
use crate::runtime::task::TaskHandle;

pub(crate) const NAME: &str = "window";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u64)]
pub enum WindowOp {
  /// Payload `String`; replies with `()`.
  SetTitle = 0,
  /// Replies with the current title as a `String`.
  Title = 1,
  /// Replies with `(width, height)`.
  Size = 2,
}

impl From<WindowOp> for u64 {
  fn from(op: WindowOp) -> Self {
    op as u64
  }
}

impl TryFrom<u64> for WindowOp {
  type Error = CotaskError;

  fn try_from(header: u64) -> Result<Self, Self::Error> {
    match header {
      0 => Ok(WindowOp::SetTitle),
      1 => Ok(WindowOp::Title),
      2 => Ok(WindowOp::Size),
      _ => Err(unsupported(NAME, header)),
    }
  }
}

/// Headless window state bound to the thread that opened it.
#[derive(Debug)]
pub struct WindowSurface {
  title: String,
  width: u32,
  height: u32,
  owner: ThreadId,
}

impl WindowSurface {
  pub fn open(title: impl Into<String>, width: u32, height: u32) -> Self {
    let surface = Self {
      title: title.into(),
      width,
      height,
      owner: thread::current().id(),
    };
    tracing::debug!(title = %surface.title, width, height, "Window surface opened");
    surface
  }

  pub fn owner(&self) -> ThreadId {
    self.owner
  }

  fn check_owner(&self) -> Result<(), CotaskError> {
    if thread::current().id() != self.owner {
      return Err(CotaskError::InvalidState("window surface used off its owning thread"));
    }
    Ok(())
  }

  pub fn set_title(&mut self, title: impl Into<String>) -> Result<(), CotaskError> {
    self.check_owner()?;
    self.title = title.into();
    Ok(())
  }

  pub fn title(&self) -> Result<&str, CotaskError> {
    self.check_owner()?;
    Ok(&self.title)
  }

  pub fn size(&self) -> Result<(u32, u32), CotaskError> {
    self.check_owner()?;
    Ok((self.width, self.height))
  }
}

/// Owns a [`WindowSurface`], opened on the first message so it lands on
/// the thread that runs the actor.
#[derive(Debug)]
pub struct WindowActor {
  title: String,
  width: u32,
  height: u32,
  surface: Option<WindowSurface>,
}

impl WindowActor {
  pub fn new(title: impl Into<String>, width: u32, height: u32) -> Self {
    Self {
      title: title.into(),
      width,
      height,
      surface: None,
    }
  }

  fn surface(&mut self) -> &mut WindowSurface {
    let (title, width, height) = (&self.title, self.width, self.height);
    self
      .surface
      .get_or_insert_with(|| WindowSurface::open(title.clone(), width, height))
  }

  pub(crate) fn step(&mut self, message: Message) -> Result<Payload, CotaskError> {
    match WindowOp::try_from(message.header())? {
      WindowOp::SetTitle => {
        let title = message.take::<String>()?;
        self.surface().set_title(title)?;
        reply_with(())
      }
      WindowOp::Title => reply_with(self.surface().title()?.to_string()),
      WindowOp::Size => reply_with(self.surface().size()?),
    }
  }
}

/// Typed client for a spawned [`WindowActor`].
#[derive(Debug, Clone)]
pub struct WindowRef {
  handle: TaskHandle,
}

impl WindowRef {
  pub fn new(handle: TaskHandle) -> Self {
    Self { handle }
  }

  pub fn handle(&self) -> &TaskHandle {
    &self.handle
  }

  pub fn set_title(&self, caller: &impl Caller, title: impl Into<String>) -> Result<CallToken<()>, CotaskError> {
    Ok(caller.call(&self.handle, WindowOp::SetTitle.into(), Box::new(title.into()))?.typed())
  }

  pub fn title(&self, caller: &impl Caller) -> Result<CallToken<String>, CotaskError> {
    Ok(caller.call(&self.handle, WindowOp::Title.into(), Box::new(()))?.typed())
  }

  pub fn size(&self, caller: &impl Caller) -> Result<CallToken<(u32, u32)>, CotaskError> {
    Ok(caller.call(&self.handle, WindowOp::Size.into(), Box::new(()))?.typed())
  }
}
