use std::io::Write;

use anyhow::Result;

use crate::coords::{Color, PixelRect, Rect, Vec2};
use crate::display::PresentationSettings;

use super::shader::{SHADER_PARAM_COUNT, ShaderId};
use super::state::{BlendMode, DrawOrder};
use super::texture::{MeshId, RenderSurface, TextureId};
use super::view::ViewTransform;

/// Named blend configurations a backend must provide.
///
/// Four are stock compositing rules; `Multiply` and `Cutout` are custom
/// composites:
/// - `Multiply`: color = `dst × src`, no destination term.
/// - `Cutout`: color and alpha = `dst × (1 − src.a)`, no source term.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BlendPreset {
    /// Straight alpha: color `src.a / 1 − src.a`, alpha `1 / 1 − src.a`.
    Normal,
    /// Premultiplied alpha: `1 / 1 − src.a`.
    AlphaBlend,
    /// `src.a / 1`.
    Additive,
    Opaque,
    Multiply,
    Cutout,
}

impl BlendPreset {
    pub const ALL: [BlendPreset; 6] = [
        BlendPreset::Normal,
        BlendPreset::AlphaBlend,
        BlendPreset::Additive,
        BlendPreset::Opaque,
        BlendPreset::Multiply,
        BlendPreset::Cutout,
    ];
}

impl From<BlendMode> for BlendPreset {
    fn from(mode: BlendMode) -> Self {
        match mode {
            BlendMode::None => BlendPreset::Normal,
            BlendMode::Alpha => BlendPreset::AlphaBlend,
            BlendMode::Multiply => BlendPreset::Multiply,
            BlendMode::Add => BlendPreset::Additive,
            BlendMode::Opaque => BlendPreset::Opaque,
            BlendMode::Cutout => BlendPreset::Cutout,
        }
    }
}

/// Shader bound for the duration of a batch, with a parameter snapshot.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ShaderBinding {
    pub id: ShaderId,
    pub params: [f32; SHADER_PARAM_COUNT],
}

/// Everything a backend needs to open a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchBegin {
    pub preset: BlendPreset,
    pub shader: Option<ShaderBinding>,
    pub transform: ViewTransform,
    pub order: DrawOrder,
    pub clip: Option<PixelRect>,
}

/// One textured quad, in the world space of the open batch.
///
/// The quad covers `src.size() * scale`; `origin` (in source texels) is the
/// pivot that lands on `position` and that `rotation` turns around.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Quad {
    pub texture: TextureId,
    pub src: Rect,
    pub position: Vec2,
    pub origin: Vec2,
    pub scale: Vec2,
    /// Radians, clockwise on screen.
    pub rotation: f32,
    pub color: Color,
}

impl Quad {
    /// Unrotated, unscaled quad drawing `src` at `position`.
    pub fn new(texture: TextureId, src: Rect, position: Vec2) -> Self {
        Self {
            texture,
            src,
            position,
            origin: Vec2::ZERO,
            scale: Vec2::ONE,
            rotation: 0.0,
            color: Color::WHITE,
        }
    }

    /// Corner positions in world space: top-left, top-right, bottom-right,
    /// bottom-left.
    pub fn corners(&self) -> [Vec2; 4] {
        let w = self.src.width;
        let h = self.src.height;
        [
            Vec2::new(0.0, 0.0),
            Vec2::new(w, 0.0),
            Vec2::new(w, h),
            Vec2::new(0.0, h),
        ]
        .map(|c| (c - self.origin).scale(self.scale).rotate(self.rotation) + self.position)
    }

    /// Normalized `[u0, v0, u1, v1]` for a texture of the given size.
    pub fn uv_bounds(&self, texture_width: u32, texture_height: u32) -> [f32; 4] {
        let tw = texture_width.max(1) as f32;
        let th = texture_height.max(1) as f32;
        [
            self.src.x / tw,
            self.src.y / th,
            (self.src.x + self.src.width) / tw,
            (self.src.y + self.src.height) / th,
        ]
    }
}

/// Live GPU resource counters reported in the status line.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct ResourceCounts {
    /// Offscreen render surfaces currently allocated.
    pub render_surfaces: usize,
    /// Mesh (tile buffer) vertex buffers currently allocated.
    pub meshes: usize,
}

/// The narrow interface the batching core drives.
///
/// Call order within a frame: `bind_target` → `begin_batch` → `draw_quad`* →
/// `end_batch`, repeated, then `present`. `draw_mesh` and `clear` are issued
/// outside batches.
pub trait GraphicsBackend {
    /// Selects the destination for subsequent batches; `None` is the primary
    /// presentation surface.
    fn bind_target(&mut self, target: Option<RenderSurface>);

    fn begin_batch(&mut self, begin: &BatchBegin);

    fn end_batch(&mut self);

    fn draw_quad(&mut self, quad: &Quad);

    /// Draws a prebuilt mesh with normal blending through `transform`.
    fn draw_mesh(&mut self, mesh: MeshId, transform: &ViewTransform);

    /// Clears the bound target.
    fn clear(&mut self, color: Color);

    /// Allocates an offscreen surface; `None` if the backend cannot.
    fn create_surface(&mut self, width: u32, height: u32) -> Option<RenderSurface>;

    fn release_surface(&mut self, surface: RenderSurface);

    /// Writes `surface` to `sink` as a PNG with the surface's exact dimensions.
    fn encode_png(&mut self, surface: RenderSurface, sink: &mut dyn Write) -> Result<()>;

    fn resource_counts(&self) -> ResourceCounts;

    /// Applies negotiated presentation parameters (backbuffer size, vsync).
    fn configure(&mut self, settings: &PresentationSettings);

    /// Submits recorded work and presents the primary surface if it was drawn to.
    fn present(&mut self);
}
