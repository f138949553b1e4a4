use std::collections::HashMap;

use crate::coords::{Rect, Vec2};

use super::texture::TextureId;

/// Placement of one glyph inside a font's atlas texture.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Glyph {
    /// Source rectangle in atlas texels. May be empty for whitespace.
    pub src: Rect,
    /// Offset from the pen position to the glyph's top-left corner.
    pub offset: Vec2,
    /// Horizontal pen advance.
    pub advance: f32,
}

/// What the renderer needs from a loaded font.
///
/// Loading and rasterizing fonts happens elsewhere; the renderer only draws
/// glyph rectangles out of an atlas.
pub trait Font {
    fn glyph(&self, ch: char) -> Option<Glyph>;

    fn line_height(&self) -> f32;

    /// Atlas texture; `None` while the atlas is not resident.
    fn texture(&self) -> Option<TextureId>;
}

/// A fixed glyph table over one atlas texture.
#[derive(Debug, Clone)]
pub struct BitmapFont {
    texture: Option<TextureId>,
    line_height: f32,
    glyphs: HashMap<char, Glyph>,
}

impl BitmapFont {
    pub fn new(texture: Option<TextureId>, line_height: f32) -> Self {
        Self {
            texture,
            line_height,
            glyphs: HashMap::new(),
        }
    }

    pub fn insert(&mut self, ch: char, glyph: Glyph) {
        self.glyphs.insert(ch, glyph);
    }

    pub fn with_glyph(mut self, ch: char, glyph: Glyph) -> Self {
        self.insert(ch, glyph);
        self
    }

    /// Builds a monospace font from a grid atlas: `chars` are laid out row-major
    /// in cells of `cell_w` × `cell_h`, `columns` per row.
    pub fn monospace_grid(
        texture: Option<TextureId>,
        chars: &str,
        cell_w: f32,
        cell_h: f32,
        columns: usize,
    ) -> Self {
        let columns = columns.max(1);
        let mut font = Self::new(texture, cell_h);
        for (i, ch) in chars.chars().enumerate() {
            let col = (i % columns) as f32;
            let row = (i / columns) as f32;
            font.insert(
                ch,
                Glyph {
                    src: Rect::new(col * cell_w, row * cell_h, cell_w, cell_h),
                    offset: Vec2::ZERO,
                    advance: cell_w,
                },
            );
        }
        font
    }
}

impl Font for BitmapFont {
    fn glyph(&self, ch: char) -> Option<Glyph> {
        self.glyphs.get(&ch).copied()
    }

    fn line_height(&self) -> f32 {
        self.line_height
    }

    fn texture(&self) -> Option<TextureId> {
        self.texture
    }
}

/// Replaces every character the font cannot draw with a space. Line breaks
/// are kept.
pub fn sanitize_text(text: &str, font: &dyn Font) -> String {
    text.chars()
        .map(|ch| {
            if ch == '\n' || font.glyph(ch).is_some() {
                ch
            } else {
                ' '
            }
        })
        .collect()
}

/// Extent of `text` at `scale`: widest line by total line height.
///
/// Unsupported characters measure as spaces. Empty text measures zero.
pub fn measure_text(text: &str, font: &dyn Font, scale: f32) -> Vec2 {
    if text.is_empty() {
        return Vec2::ZERO;
    }
    let text = sanitize_text(text, font);

    let mut widest = 0.0f32;
    let mut lines = 0usize;
    for line in text.split('\n') {
        lines += 1;
        let width: f32 = line
            .chars()
            .filter_map(|ch| font.glyph(ch))
            .map(|g| g.advance)
            .sum();
        widest = widest.max(width);
    }

    Vec2::new(widest * scale, lines as f32 * font.line_height() * scale)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn font() -> BitmapFont {
        BitmapFont::monospace_grid(Some(TextureId(9)), " abc", 8.0, 12.0, 16)
    }

    #[test]
    fn grid_layout_places_cells() {
        let f = BitmapFont::monospace_grid(None, "abcd", 8.0, 10.0, 2);
        assert_eq!(f.glyph('c').map(|g| g.src), Some(Rect::new(0.0, 10.0, 8.0, 10.0)));
        assert_eq!(f.glyph('d').map(|g| g.src), Some(Rect::new(8.0, 10.0, 8.0, 10.0)));
    }

    #[test]
    fn sanitize_replaces_unknown_glyphs() {
        assert_eq!(sanitize_text("a?c\nb", &font()), "a c\nb");
    }

    #[test]
    fn measure_uses_widest_line() {
        let size = measure_text("abc\na", &font(), 2.0);
        assert_eq!(size, Vec2::new(48.0, 48.0));
    }

    #[test]
    fn measure_counts_unknown_chars_as_spaces() {
        assert_eq!(measure_text("a!", &font(), 1.0), Vec2::new(16.0, 12.0));
    }

    #[test]
    fn measure_empty_is_zero() {
        assert_eq!(measure_text("", &font(), 1.0), Vec2::ZERO);
    }
}
