//! A 3×5 pixel font baked into an RGBA atlas at startup.

use kiln_engine::render::{BitmapFont, TextureId};

/// Characters in atlas order.
pub const CHARS: &str = "0123456789FPSx: ";

const CELL_W: u32 = 4;
const CELL_H: u32 = 6;

/// Rows top to bottom, three bits each, most significant bit leftmost.
const ROWS: [[u8; 5]; 16] = [
    [0b111, 0b101, 0b101, 0b101, 0b111],
    [0b010, 0b110, 0b010, 0b010, 0b111],
    [0b111, 0b001, 0b111, 0b100, 0b111],
    [0b111, 0b001, 0b111, 0b001, 0b111],
    [0b101, 0b101, 0b111, 0b001, 0b001],
    [0b111, 0b100, 0b111, 0b001, 0b111],
    [0b111, 0b100, 0b111, 0b101, 0b111],
    [0b111, 0b001, 0b001, 0b001, 0b001],
    [0b111, 0b101, 0b111, 0b101, 0b111],
    [0b111, 0b101, 0b111, 0b001, 0b111],
    [0b111, 0b100, 0b110, 0b100, 0b100],
    [0b111, 0b101, 0b111, 0b100, 0b100],
    [0b111, 0b100, 0b111, 0b001, 0b111],
    [0b000, 0b101, 0b010, 0b101, 0b000],
    [0b000, 0b010, 0b000, 0b010, 0b000],
    [0b000, 0b000, 0b000, 0b000, 0b000],
];

/// Atlas pixels: one row of cells, white glyphs on transparent.
pub fn atlas() -> (u32, u32, Vec<u8>) {
    let width = CELL_W * ROWS.len() as u32;
    let mut rgba = vec![0u8; (width * CELL_H * 4) as usize];
    for (cell, rows) in ROWS.iter().enumerate() {
        for (y, bits) in rows.iter().enumerate() {
            for x in 0..3 {
                if bits & (0b100 >> x) == 0 {
                    continue;
                }
                let px = cell as u32 * CELL_W + x;
                let at = ((y as u32 * width + px) * 4) as usize;
                rgba[at..at + 4].copy_from_slice(&[255, 255, 255, 255]);
            }
        }
    }
    (width, CELL_H, rgba)
}

pub fn font(texture: TextureId) -> BitmapFont {
    BitmapFont::monospace_grid(Some(texture), CHARS, CELL_W as f32, CELL_H as f32, ROWS.len())
}
