//! Per-frame orchestration and the draw API.

mod coordinator;
mod draw;
mod screenshot;

pub use coordinator::{CoordinatorConfig, FrameCoordinator, FramePhase};
pub use draw::{DrawText, DrawTexture, ROTATION_EPSILON_DEG};
pub use screenshot::{ScreenshotQueue, ScreenshotSink, encode_rgba_png};
