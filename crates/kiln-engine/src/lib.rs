//! Kiln engine crate.
//!
//! Frame coordination for a 2D game: batched sprite and text drawing,
//! display-mode negotiation, screenshot capture, and the wgpu/winit runtime
//! that hosts them.

pub mod coords;
pub mod core;
pub mod diagnostics;
pub mod display;
pub mod frame;
pub mod gpu;
pub mod logging;
pub mod render;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod time;
pub mod window;
