//! Window + runtime loop.
//!
//! Owns the `winit` event loop and window and wires them to the GPU backend
//! and display negotiation.

mod display;
mod runtime;

pub use display::WinitDisplay;
pub use runtime::{Runtime, RuntimeConfig};
