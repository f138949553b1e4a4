//! Coordinate and geometry types shared by the batching core and backends.
//!
//! Two spaces are in play:
//! - logical units: what game code draws in, top-left origin, +X right, +Y down
//! - device pixels: what scissor/clip rectangles and the backbuffer are measured in
//!
//! Logical → device conversion happens through `render::ViewTransform`.

mod color;
mod rect;
mod vec2;

pub use color::Color;
pub use rect::{PixelRect, Rect};
pub use vec2::Vec2;
