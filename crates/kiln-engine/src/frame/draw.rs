use crate::coords::{Color, Rect, Vec2};
use crate::render::{BlendMode, Font, Quad, RenderSurface, ShaderHandle, Texture, TextureId};

/// Rotations smaller than this many degrees are drawn unrotated.
pub const ROTATION_EPSILON_DEG: f32 = 0.01;

#[derive(Debug, Copy, Clone)]
pub(crate) enum TextureSource<'a> {
    Texture(&'a Texture),
    Surface(RenderSurface),
}

/// A textured-quad draw request.
///
/// `src` is in texels of the texture (before any atlas offset), `dst` in
/// world units. Builder methods cover the optional parameters.
#[derive(Debug, Clone)]
pub struct DrawTexture<'a> {
    pub(crate) source: TextureSource<'a>,
    pub src: Rect,
    pub dst: Rect,
    pub color: Color,
    /// Draw into this surface instead of the default destination.
    pub target: Option<RenderSurface>,
    pub blend: BlendMode,
    pub shader: Option<ShaderHandle>,
    /// Clockwise, around the centre of `dst`.
    pub rotation_deg: f32,
    /// `dst` is relative to the view origin rather than the world.
    pub is_ui: bool,
    pub immediate: bool,
}

impl<'a> DrawTexture<'a> {
    pub fn new(texture: &'a Texture, src: Rect, dst: Rect) -> Self {
        Self::from_source(TextureSource::Texture(texture), src, dst)
    }

    /// Samples a render surface.
    pub fn surface(surface: RenderSurface, src: Rect, dst: Rect) -> Self {
        Self::from_source(TextureSource::Surface(surface), src, dst)
    }

    fn from_source(source: TextureSource<'a>, src: Rect, dst: Rect) -> Self {
        Self {
            source,
            src,
            dst,
            color: Color::WHITE,
            target: None,
            blend: BlendMode::None,
            shader: None,
            rotation_deg: 0.0,
            is_ui: false,
            immediate: false,
        }
    }

    pub fn color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn target(mut self, target: RenderSurface) -> Self {
        self.target = Some(target);
        self
    }

    pub fn blend(mut self, blend: BlendMode) -> Self {
        self.blend = blend;
        self
    }

    pub fn shader(mut self, shader: ShaderHandle) -> Self {
        self.shader = Some(shader);
        self
    }

    pub fn rotation(mut self, degrees: f32) -> Self {
        self.rotation_deg = degrees;
        self
    }

    pub fn ui(mut self, is_ui: bool) -> Self {
        self.is_ui = is_ui;
        self
    }

    pub fn immediate(mut self, immediate: bool) -> Self {
        self.immediate = immediate;
        self
    }

    /// Placement of the quad relative to the batch's world space, before any
    /// view offset. `None` for an empty source rectangle.
    pub(crate) fn layout(&self, texture: TextureId, pack_frame: Option<Rect>) -> Option<Quad> {
        if self.src.width <= 0.0 || self.src.height <= 0.0 {
            return None;
        }

        let mut src = self.src;
        if let Some(frame) = pack_frame {
            src.x += frame.x;
            src.y += frame.y;
        }

        let mut position = self.dst.origin();
        let mut origin = Vec2::ZERO;
        let mut rotation = 0.0;
        if self.rotation_deg.abs() > ROTATION_EPSILON_DEG {
            rotation = self.rotation_deg.to_radians();
            origin = Vec2::new(src.width / 2.0, src.height / 2.0);
            position += Vec2::new(self.dst.width / 2.0, self.dst.height / 2.0);
        }

        Some(Quad {
            texture,
            src,
            position,
            origin,
            scale: Vec2::new(self.dst.width / src.width, self.dst.height / src.height),
            rotation,
            color: self.color,
        })
    }
}

/// A text draw request.
#[derive(Clone, Copy)]
pub struct DrawText<'a> {
    pub text: &'a str,
    pub font: &'a dyn Font,
    pub position: Vec2,
    pub scale: f32,
    pub color: Color,
    /// One-pixel outline drawn in four directions; transparent disables it.
    pub border: Color,
    pub target: Option<RenderSurface>,
    /// Scissor rectangle in view-relative pixels. Clipped text is drawn
    /// immediately in its own batch.
    pub clip: Option<Rect>,
}

impl<'a> DrawText<'a> {
    pub fn new(text: &'a str, font: &'a dyn Font, position: Vec2) -> Self {
        Self {
            text,
            font,
            position,
            scale: 1.0,
            color: Color::WHITE,
            border: Color::TRANSPARENT,
            target: None,
            clip: None,
        }
    }

    pub fn scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn border(mut self, border: Color) -> Self {
        self.border = border;
        self
    }

    pub fn target(mut self, target: RenderSurface) -> Self {
        self.target = Some(target);
        self
    }

    pub fn clip(mut self, clip: Rect) -> Self {
        self.clip = Some(clip);
        self
    }
}

impl std::fmt::Debug for DrawText<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrawText")
            .field("text", &self.text)
            .field("position", &self.position)
            .field("scale", &self.scale)
            .field("clip", &self.clip)
            .finish_non_exhaustive()
    }
}

/// Border offsets: up, left, right, down.
pub(crate) const BORDER_OFFSETS: [Vec2; 4] = [
    Vec2::new(0.0, -1.0),
    Vec2::new(-1.0, 0.0),
    Vec2::new(1.0, 0.0),
    Vec2::new(0.0, 1.0),
];

/// Lays out already-sanitized `text` as one quad per visible glyph.
pub(crate) fn glyph_quads(
    text: &str,
    font: &dyn Font,
    texture: TextureId,
    origin: Vec2,
    scale: f32,
    color: Color,
) -> Vec<Quad> {
    let mut quads = Vec::with_capacity(text.len());
    let mut pen = origin;
    for ch in text.chars() {
        if ch == '\n' {
            pen.x = origin.x;
            pen.y += font.line_height() * scale;
            continue;
        }
        let Some(glyph) = font.glyph(ch) else { continue };
        if !glyph.src.is_empty() {
            quads.push(Quad {
                texture,
                src: glyph.src,
                position: pen + glyph.offset * scale,
                origin: Vec2::ZERO,
                scale: Vec2::splat(scale),
                rotation: 0.0,
                color,
            });
        }
        pen.x += glyph.advance * scale;
    }
    quads
}
