//! Time subsystem.
//!
//! Everything time-dependent in the engine (FPS sampling, the fullscreen settle
//! timer) reads milliseconds through the [`Clock`] trait, so tests can drive time
//! with a [`ManualClock`] instead of sleeping.

mod clock;
mod fps;

pub use clock::{Clock, ManualClock, SystemClock};
pub use fps::FrameCounters;
