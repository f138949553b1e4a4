use std::cell::Cell;
use std::rc::{Rc, Weak};

use crate::coords::Rect;

/// Backend-assigned id of anything that can be sampled: loaded textures and
/// render surfaces share one id space.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

/// Backend-assigned id of a prebuilt mesh (tile buffer).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(pub u32);

/// An offscreen surface that batches can render into and quads can sample from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct RenderSurface {
    texture: TextureId,
    width: u32,
    height: u32,
}

impl RenderSurface {
    pub const fn new(texture: TextureId, width: u32, height: u32) -> Self {
        Self { texture, width, height }
    }

    #[inline]
    pub fn texture(&self) -> TextureId {
        self.texture
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Full-surface rectangle, used as the viewport when drawing into it.
    #[inline]
    pub fn bounds(&self) -> Rect {
        Rect::from_size(self.width as f32, self.height as f32)
    }
}

/// A texture is considered idle after this long without being drawn.
pub const TEXTURE_IDLE_MS: u64 = 15_000;

/// Game-facing texture object.
///
/// `drawable` is `None` while the backing image is not resident (still loading,
/// or evicted); drawing such a texture is a silent no-op. Atlas-packed textures
/// carry the frame they occupy inside the pack.
#[derive(Debug)]
pub struct Texture {
    name: String,
    drawable: Cell<Option<TextureId>>,
    width: u32,
    height: u32,
    pack_frame: Option<Rect>,
    last_drawn_ms: Cell<Option<u64>>,
    idle: Cell<bool>,
}

impl Texture {
    pub fn new(name: impl Into<String>, id: TextureId, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            drawable: Cell::new(Some(id)),
            width,
            height,
            pack_frame: None,
            last_drawn_ms: Cell::new(None),
            idle: Cell::new(false),
        }
    }

    /// A texture whose image is not resident yet.
    pub fn pending(name: impl Into<String>, width: u32, height: u32) -> Self {
        let t = Self::new(name, TextureId(0), width, height);
        t.drawable.set(None);
        t
    }

    /// Places the texture inside an atlas page; source rectangles are offset by
    /// the frame origin.
    pub fn with_pack_frame(mut self, frame: Rect) -> Self {
        self.pack_frame = Some(frame);
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn pack_frame(&self) -> Option<Rect> {
        self.pack_frame
    }

    /// The backend texture to sample, if resident.
    #[inline]
    pub fn drawable(&self) -> Option<TextureId> {
        self.drawable.get()
    }

    /// Makes the texture resident under `id` (loader callback).
    pub fn set_drawable(&self, id: Option<TextureId>) {
        self.drawable.set(id);
    }

    pub(crate) fn mark_drawn(&self, now_ms: u64) {
        self.last_drawn_ms.set(Some(now_ms));
        self.idle.set(false);
    }

    /// Per-frame maintenance hook.
    ///
    /// Tracks whether the texture has gone unused for [`TEXTURE_IDLE_MS`]; an
    /// eviction policy can act on [`is_idle`](Self::is_idle).
    pub fn maintain(&self, now_ms: u64) {
        let Some(last) = self.last_drawn_ms.get() else { return };
        let idle = now_ms.saturating_sub(last) >= TEXTURE_IDLE_MS;
        if idle && !self.idle.get() {
            log::trace!("texture '{}' idle", self.name);
        }
        self.idle.set(idle);
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.idle.get()
    }
}

/// Weak list of live textures that receive the per-frame maintenance hook.
///
/// Dropping the last `Rc` to a texture removes it on the next `maintain`.
#[derive(Debug, Default)]
pub struct TextureRegistry {
    entries: Vec<Weak<Texture>>,
}

impl TextureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, texture: &Rc<Texture>) {
        self.entries.push(Rc::downgrade(texture));
    }

    /// Runs [`Texture::maintain`] on every live texture and forgets dropped ones.
    pub fn maintain(&mut self, now_ms: u64) {
        self.entries.retain(|weak| match weak.upgrade() {
            Some(texture) => {
                texture.maintain(now_ms);
                true
            }
            None => false,
        });
    }

    /// Number of tracked entries, including ones dropped since the last `maintain`.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_texture_has_no_drawable() {
        let t = Texture::pending("hero", 32, 32);
        assert!(t.drawable().is_none());
        t.set_drawable(Some(TextureId(4)));
        assert_eq!(t.drawable(), Some(TextureId(4)));
    }

    #[test]
    fn idle_after_threshold_and_reset_by_drawing() {
        let t = Texture::new("tiles", TextureId(1), 256, 256);
        t.maintain(100_000);
        assert!(!t.is_idle(), "never-drawn textures are not tracked");

        t.mark_drawn(1_000);
        t.maintain(1_000 + TEXTURE_IDLE_MS - 1);
        assert!(!t.is_idle());
        t.maintain(1_000 + TEXTURE_IDLE_MS);
        assert!(t.is_idle());

        t.mark_drawn(20_000);
        assert!(!t.is_idle());
    }

    #[test]
    fn surface_bounds_match_size() {
        let s = RenderSurface::new(TextureId(2), 320, 200);
        assert_eq!(s.bounds(), Rect::from_size(320.0, 200.0));
    }

    #[test]
    fn registry_maintains_live_and_forgets_dropped() {
        let kept = Rc::new(Texture::new("kept", TextureId(1), 8, 8));
        let dropped = Rc::new(Texture::new("dropped", TextureId(2), 8, 8));
        let mut registry = TextureRegistry::new();
        registry.track(&kept);
        registry.track(&dropped);

        kept.mark_drawn(0);
        drop(dropped);
        registry.maintain(TEXTURE_IDLE_MS);

        assert_eq!(registry.len(), 1);
        assert!(kept.is_idle());
    }
}
