use glam::{Mat4, Vec3, Vec4};

use crate::coords::{Rect, Vec2};

/// Projection and view matrices for one logical viewport.
///
/// The projection maps `(0, 0)–(width, height)` onto clip space with a top-left
/// origin and +Y down. Its translation carries a −0.5 texel bias on both axes so
/// texel centres land on pixel centres; without it, sprites sampled from atlases
/// pick up seams from neighbouring cells.
///
/// The view matrix translates by the negated viewport origin. Cameras and
/// scrolling move the viewport; geometry stays in world units.
///
/// Matrices are column-major (`glam` convention), ready for upload.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ViewTransform {
    viewport: Rect,
    projection: Mat4,
    view: Mat4,
}

impl ViewTransform {
    /// Builds the transform for `viewport`.
    ///
    /// Degenerate viewports (zero or negative extent) are widened to one unit
    /// so the projection stays invertible.
    pub fn compute(viewport: Rect) -> Self {
        let w = viewport.width.max(1.0);
        let h = viewport.height.max(1.0);

        // left = 0, right = w, bottom = h, top = 0, near = 0, far = -1
        let mut projection = Mat4::orthographic_rh(0.0, w, h, 0.0, 0.0, -1.0);
        projection.w_axis.x += -0.5 * projection.x_axis.x;
        projection.w_axis.y += -0.5 * projection.y_axis.y;

        // Rotation and scale hooks are identity at this layer.
        let view = Mat4::from_translation(Vec3::new(-viewport.x, -viewport.y, 0.0))
            * Mat4::from_scale(Vec3::ONE)
            * Mat4::from_rotation_z(0.0);

        Self { viewport, projection, view }
    }

    #[inline]
    pub fn viewport(&self) -> Rect {
        self.viewport
    }

    #[inline]
    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    #[inline]
    pub fn view(&self) -> Mat4 {
        self.view
    }

    /// `projection * view`, the single matrix vertex shaders consume.
    #[inline]
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    /// Maps a world-space point to clip space.
    pub fn to_clip(&self, point: Vec2) -> Vec2 {
        let c = self.view_projection() * Vec4::new(point.x, point.y, 0.0, 1.0);
        Vec2::new(c.x / c.w, c.y / c.w)
    }

    /// Maps a world-space point to device pixels of a target sized like the
    /// viewport (top-left origin).
    pub fn to_device(&self, point: Vec2) -> Vec2 {
        let clip = self.to_clip(point);
        let w = self.viewport.width.max(1.0);
        let h = self.viewport.height.max(1.0);
        Vec2::new((clip.x + 1.0) * 0.5 * w, (1.0 - clip.y) * 0.5 * h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: Vec2, expected: Vec2) {
        assert!(
            (actual.x - expected.x).abs() < 1e-3 && (actual.y - expected.y).abs() < 1e-3,
            "expected {expected:?}, got {actual:?}"
        );
    }

    #[test]
    fn origin_maps_to_half_pixel_before_top_left() {
        let t = ViewTransform::compute(Rect::from_size(800.0, 600.0));
        assert_close(t.to_device(Vec2::ZERO), Vec2::new(-0.5, -0.5));
    }

    #[test]
    fn far_corner_maps_to_size_minus_half_pixel() {
        let t = ViewTransform::compute(Rect::from_size(800.0, 600.0));
        assert_close(t.to_device(Vec2::new(800.0, 600.0)), Vec2::new(799.5, 599.5));
    }

    #[test]
    fn bias_is_applied_to_projection_translation() {
        let t = ViewTransform::compute(Rect::from_size(400.0, 200.0));
        let p = t.projection();
        assert!((p.x_axis.x - 2.0 / 400.0).abs() < 1e-6);
        assert!((p.y_axis.y + 2.0 / 200.0).abs() < 1e-6);
        assert!((p.w_axis.x - (-1.0 - 1.0 / 400.0)).abs() < 1e-6);
        assert!((p.w_axis.y - (1.0 + 1.0 / 200.0)).abs() < 1e-6);
    }

    #[test]
    fn view_translates_by_negative_origin() {
        let t = ViewTransform::compute(Rect::new(100.0, 50.0, 800.0, 600.0));
        // The viewport origin lands where (0, 0) would without scrolling.
        assert_close(t.to_device(Vec2::new(100.0, 50.0)), Vec2::new(-0.5, -0.5));
        assert_close(t.to_device(Vec2::new(500.0, 350.0)), Vec2::new(399.5, 299.5));
    }

    #[test]
    fn same_viewport_same_transform() {
        let v = Rect::new(3.0, 4.0, 320.0, 240.0);
        assert_eq!(ViewTransform::compute(v), ViewTransform::compute(v));
    }

    #[test]
    fn degenerate_viewport_is_widened() {
        let t = ViewTransform::compute(Rect::from_size(0.0, 0.0));
        assert!(t.projection().is_finite());
    }
}
