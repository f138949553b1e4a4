use super::Vec2;

/// Axis-aligned rectangle in logical units (top-left origin).
///
/// Used for viewports, texture source regions and destination regions.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    #[inline]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Rectangle anchored at the origin.
    #[inline]
    pub const fn from_size(width: f32, height: f32) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    #[inline]
    pub fn origin(self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    #[inline]
    pub fn size(self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    #[inline]
    pub fn translated(self, by: Vec2) -> Rect {
        Rect::new(self.x + by.x, self.y + by.y, self.width, self.height)
    }

    /// Truncates every component toward zero, matching how clip rectangles are
    /// handed to the rasterizer.
    #[inline]
    pub fn to_pixels(self) -> PixelRect {
        PixelRect::new(
            self.x as i32,
            self.y as i32,
            self.width.max(0.0) as u32,
            self.height.max(0.0) as u32,
        )
    }
}

/// Rectangle in device pixels, used for scissor/clip state.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    #[inline]
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Clamps the rectangle to a `target_width` × `target_height` surface.
    ///
    /// Returns `None` when nothing of the rectangle remains visible; callers skip
    /// the draw in that case.
    pub fn clamp_to(self, target_width: u32, target_height: u32) -> Option<PixelRect> {
        let tw = i64::from(target_width);
        let th = i64::from(target_height);

        let x0 = i64::from(self.x).clamp(0, tw);
        let y0 = i64::from(self.y).clamp(0, th);
        let x1 = (i64::from(self.x) + i64::from(self.width)).clamp(0, tw);
        let y1 = (i64::from(self.y) + i64::from(self.height)).clamp(0, th);

        let w = x1 - x0;
        let h = y1 - y0;
        if w <= 0 || h <= 0 {
            return None;
        }
        Some(PixelRect::new(x0 as i32, y0 as i32, w as u32, h as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Rect ──────────────────────────────────────────────────────────────

    #[test]
    fn is_empty_zero_size() {
        assert!(Rect::new(0.0, 0.0, 0.0, 5.0).is_empty());
        assert!(Rect::new(0.0, 0.0, 5.0, 0.0).is_empty());
        assert!(!Rect::from_size(1.0, 1.0).is_empty());
    }

    #[test]
    fn translated_moves_origin_only() {
        let r = Rect::new(1.0, 2.0, 10.0, 20.0).translated(Vec2::new(5.0, -2.0));
        assert_eq!(r, Rect::new(6.0, 0.0, 10.0, 20.0));
    }

    #[test]
    fn to_pixels_truncates() {
        let p = Rect::new(10.9, 4.2, 99.7, 20.5).to_pixels();
        assert_eq!(p, PixelRect::new(10, 4, 99, 20));
    }

    #[test]
    fn to_pixels_negative_size_becomes_zero() {
        assert_eq!(Rect::new(0.0, 0.0, -3.0, 2.0).to_pixels().width, 0);
    }

    // ── PixelRect::clamp_to ───────────────────────────────────────────────

    #[test]
    fn clamp_inside_is_identity() {
        let r = PixelRect::new(10, 10, 20, 20);
        assert_eq!(r.clamp_to(100, 100), Some(r));
    }

    #[test]
    fn clamp_cuts_overhang() {
        let r = PixelRect::new(-5, 90, 20, 20);
        assert_eq!(r.clamp_to(100, 100), Some(PixelRect::new(0, 90, 15, 10)));
    }

    #[test]
    fn clamp_fully_outside_is_none() {
        assert!(PixelRect::new(200, 0, 10, 10).clamp_to(100, 100).is_none());
        assert!(PixelRect::new(0, 0, 0, 10).clamp_to(100, 100).is_none());
    }
}
