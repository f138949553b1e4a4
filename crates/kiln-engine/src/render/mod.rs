//! Batched 2D rendering core.
//!
//! Draw requests carry a [`BatchState`]; the [`BatchController`] turns a stream
//! of them into as few backend batches as possible. Everything GPU-specific
//! sits behind [`GraphicsBackend`].
//!
//! Convention:
//! - Geometry is in logical pixels (top-left origin, +Y down).
//! - The batch's [`ViewTransform`] maps it to clip space.

mod backend;
mod batch;
mod font;
mod shader;
mod state;
mod texture;
mod view;

pub use backend::{BatchBegin, BlendPreset, GraphicsBackend, Quad, ResourceCounts, ShaderBinding};
pub use batch::BatchController;
pub use font::{BitmapFont, Font, Glyph, measure_text, sanitize_text};
pub use shader::{SHADER_PARAM_COUNT, Shader, ShaderHandle, ShaderId};
pub use state::{BatchState, BlendMode, DrawOrder};
pub use texture::{MeshId, RenderSurface, TEXTURE_IDLE_MS, Texture, TextureId, TextureRegistry};
pub use view::ViewTransform;
