use std::rc::Rc;

use crate::coords::{PixelRect, Rect};

use super::shader::ShaderHandle;
use super::texture::RenderSurface;

/// How a drawn pixel combines with the pixel already in the destination.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum BlendMode {
    /// Straight-alpha "over" compositing; the default for sprites and text.
    #[default]
    None,
    /// Premultiplied-alpha compositing.
    Alpha,
    /// `dst × src`.
    Multiply,
    /// Additive light.
    Add,
    /// Overwrite; no blending.
    Opaque,
    /// Punches holes: subtracts using inverse source alpha.
    Cutout,
}

/// When queued draws reach the GPU.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum DrawOrder {
    /// Collected and submitted when the batch ends.
    #[default]
    Deferred,
    /// Submitted as each draw arrives.
    Immediate,
}

/// The rendering configuration a batch is opened with.
///
/// Two states that compare equal can share a batch. Shaders compare by
/// identity (same `Rc`), surfaces by texture id, viewport and clip by value.
#[derive(Debug, Clone, Default)]
pub struct BatchState {
    pub blend: BlendMode,
    pub shader: Option<ShaderHandle>,
    /// `None` selects the default destination (the capture target while a
    /// screenshot is in progress, otherwise the primary screen surface).
    pub target: Option<RenderSurface>,
    /// Logical viewport the batch projects through.
    pub viewport: Rect,
    /// Scissor rectangle in device pixels.
    pub clip: Option<PixelRect>,
    pub order: DrawOrder,
}

impl BatchState {
    /// Default state for `viewport`: no shader, default destination, no clip,
    /// deferred order.
    pub fn new(viewport: Rect) -> Self {
        Self {
            viewport,
            ..Self::default()
        }
    }

    pub fn with_blend(mut self, blend: BlendMode) -> Self {
        self.blend = blend;
        self
    }

    pub fn with_shader(mut self, shader: Option<ShaderHandle>) -> Self {
        self.shader = shader;
        self
    }

    pub fn with_target(mut self, target: Option<RenderSurface>) -> Self {
        self.target = target;
        self
    }

    pub fn with_clip(mut self, clip: Option<PixelRect>) -> Self {
        self.clip = clip;
        self
    }

    pub fn with_order(mut self, order: DrawOrder) -> Self {
        self.order = order;
        self
    }

    #[inline]
    pub fn is_immediate(&self) -> bool {
        self.order == DrawOrder::Immediate
    }

    /// `true` when both states reference the same shader object (or neither
    /// has one).
    pub fn same_shader(&self, other: &BatchState) -> bool {
        match (&self.shader, &other.shader) {
            (None, None) => true,
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl PartialEq for BatchState {
    fn eq(&self, other: &Self) -> bool {
        self.blend == other.blend
            && self.same_shader(other)
            && self.target == other.target
            && self.viewport == other.viewport
            && self.clip == other.clip
            && self.order == other.order
    }
}
