//! Core engine-facing contracts.
//!
//! The interface between the window runtime and the game: an [`App`] is
//! driven once per frame with a [`FrameCtx`] that owns nothing and exposes the
//! frame coordinator for the duration of the callback.

mod app;
mod ctx;

pub use app::{App, AppControl};
pub use ctx::{Coordinator, FrameCtx, FrameTime};
