//! Drawing surface shared by the mask, overlay, and save stages.
//!
//! A `Surface` is an owned RGBA raster with value semantics: the orchestrator
//! clones it before destructive stages instead of sharing a mutable buffer.
//! Coordinates are pixels with the origin at the top-left.

use anyhow::{anyhow, Result};
use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage, Rgba, RgbaImage};

pub type Color = Rgba<u8>;

pub const RED: Color = Rgba([255, 0, 0, 255]);
/// Opaque fill used to blank out masked regions.
pub const MASK_FILL: Color = Rgba([0, 0, 0, 255]);

#[derive(Clone)]
pub struct Surface {
    image: RgbaImage,
}

impl Surface {
    /// Build a surface from a decoded image, optionally resizing to a fixed
    /// canvas width while preserving the source aspect ratio.
    pub fn from_image(image: &DynamicImage, canvas_width: Option<u32>) -> Self {
        let raster = match canvas_width {
            Some(width) if width > 0 && width != image.width() => {
                let aspect = image.height() as f64 / image.width() as f64;
                let height = ((width as f64 * aspect).round() as u32).max(1);
                image
                    .resize_exact(width, height, FilterType::Triangle)
                    .to_rgba8()
            }
            _ => image.to_rgba8(),
        };
        Self { image: raster }
    }

    #[cfg(test)]
    pub(crate) fn blank(width: u32, height: u32, color: Color) -> Self {
        Self {
            image: RgbaImage::from_pixel(width, height, color),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Color {
        *self.image.get_pixel(x, y)
    }

    /// Fill a set of closed sub-paths (pixel coordinates) using even-odd
    /// scanline filling. Sub-paths with fewer than two points enclose no
    /// area and are skipped by construction.
    pub fn fill_paths(&mut self, paths: &[Vec<(f32, f32)>], color: Color) {
        let width = self.image.width() as f32;
        let height = self.image.height();
        let mut crossings: Vec<f32> = Vec::new();

        for y in 0..height {
            let sample = y as f32 + 0.5;
            crossings.clear();
            for path in paths {
                if path.len() < 2 {
                    continue;
                }
                for idx in 0..path.len() {
                    let (x0, y0) = path[idx];
                    let (x1, y1) = path[(idx + 1) % path.len()];
                    // Half-open rule so shared vertices count once.
                    if (y0 <= sample) != (y1 <= sample) {
                        let t = (sample - y0) / (y1 - y0);
                        crossings.push(x0 + t * (x1 - x0));
                    }
                }
            }
            crossings.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            for pair in crossings.chunks_exact(2) {
                let from = pair[0].round().max(0.0) as i64;
                let to = (pair[1].round().min(width) as i64).max(from);
                for x in from..to {
                    self.image.put_pixel(x as u32, y, color);
                }
            }
        }
    }

    /// Stroke an axis-aligned rectangle. Negative width/height spans are
    /// normalised here rather than rejected, so inverted boxes from the
    /// detector render instead of panicking.
    pub fn stroke_rect(&mut self, x: f32, y: f32, w: f32, h: f32, thickness: u32, color: Color) {
        let (x0, x1) = ordered_span(x, x + w);
        let (y0, y1) = ordered_span(y, y + h);
        let left = x0.round() as i64;
        let right = x1.round() as i64;
        let top = y0.round() as i64;
        let bottom = y1.round() as i64;
        let t = thickness as i64;

        self.fill_span(left, top, right, top + t, color);
        self.fill_span(left, bottom - t, right, bottom, color);
        self.fill_span(left, top, left + t, bottom, color);
        self.fill_span(right - t, top, right, bottom, color);
    }

    /// Draw text with the built-in 5x7 glyph font, scaled by `scale`.
    /// `(x, y)` is the top-left corner of the first glyph; characters
    /// without a glyph advance the cursor without drawing.
    pub fn draw_text(&mut self, text: &str, x: f32, y: f32, scale: u32, color: Color) {
        let scale = scale.max(1) as i64;
        let mut cursor = x.round() as i64;
        let top = y.round() as i64;

        for ch in text.chars().flat_map(|c| c.to_uppercase()) {
            if let Some(glyph) = glyph_bits(ch) {
                for (row, pattern) in glyph.iter().enumerate() {
                    for col in 0..5 {
                        if (pattern >> (4 - col)) & 1 == 1 {
                            let px = cursor + col as i64 * scale;
                            let py = top + row as i64 * scale;
                            self.fill_span(px, py, px + scale, py + scale, color);
                        }
                    }
                }
            }
            cursor += 6 * scale;
        }
    }

    /// Encode the surface as JPEG at the given quality.
    pub fn to_jpeg(&self, quality: u8) -> Result<Vec<u8>> {
        let rgb = DynamicImage::ImageRgba8(self.image.clone()).to_rgb8();
        let mut buffer = Vec::new();
        JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100))
            .encode_image(&rgb)
            .map_err(|err| anyhow!("JPEG encode failed: {err}"))?;
        Ok(buffer)
    }

    /// Fill the half-open pixel span `[x0, x1) x [y0, y1)`, clipped to the
    /// surface bounds.
    fn fill_span(&mut self, x0: i64, y0: i64, x1: i64, y1: i64, color: Color) {
        let width = self.image.width() as i64;
        let height = self.image.height() as i64;
        for y in y0.max(0)..y1.min(height) {
            for x in x0.max(0)..x1.min(width) {
                self.image.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}

fn ordered_span(a: f32, b: f32) -> (f32, f32) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn glyph_bits(ch: char) -> Option<[u8; 7]> {
    match ch {
        'A' => Some([
            0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001,
        ]),
        'B' => Some([
            0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110,
        ]),
        'C' => Some([
            0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110,
        ]),
        'D' => Some([
            0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110,
        ]),
        'E' => Some([
            0b11111, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000, 0b11111,
        ]),
        'F' => Some([
            0b11111, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000, 0b10000,
        ]),
        'G' => Some([
            0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111,
        ]),
        'H' => Some([
            0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001,
        ]),
        'I' => Some([
            0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110,
        ]),
        'J' => Some([
            0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100,
        ]),
        'K' => Some([
            0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001,
        ]),
        'L' => Some([
            0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111,
        ]),
        'M' => Some([
            0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001,
        ]),
        'N' => Some([
            0b10001, 0b11001, 0b10101, 0b10101, 0b10011, 0b10001, 0b10001,
        ]),
        'O' => Some([
            0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110,
        ]),
        'P' => Some([
            0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000,
        ]),
        'Q' => Some([
            0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101,
        ]),
        'R' => Some([
            0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001,
        ]),
        'S' => Some([
            0b01111, 0b10000, 0b01110, 0b00001, 0b00001, 0b10001, 0b01110,
        ]),
        'T' => Some([
            0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100,
        ]),
        'U' => Some([
            0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110,
        ]),
        'V' => Some([
            0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100,
        ]),
        'W' => Some([
            0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010,
        ]),
        'X' => Some([
            0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001,
        ]),
        'Y' => Some([
            0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100,
        ]),
        'Z' => Some([
            0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111,
        ]),
        '0' => Some([
            0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110,
        ]),
        '1' => Some([
            0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110,
        ]),
        '2' => Some([
            0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111,
        ]),
        '3' => Some([
            0b11110, 0b00001, 0b00001, 0b01110, 0b00001, 0b00001, 0b11110,
        ]),
        '4' => Some([
            0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010,
        ]),
        '5' => Some([
            0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110,
        ]),
        '6' => Some([
            0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110,
        ]),
        '7' => Some([
            0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000,
        ]),
        '8' => Some([
            0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110,
        ]),
        '9' => Some([
            0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100,
        ]),
        '(' => Some([
            0b00010, 0b00100, 0b01000, 0b01000, 0b01000, 0b00100, 0b00010,
        ]),
        ')' => Some([
            0b01000, 0b00100, 0b00010, 0b00010, 0b00010, 0b00100, 0b01000,
        ]),
        '%' => Some([
            0b10001, 0b10010, 0b00100, 0b01000, 0b10010, 0b10001, 0b00000,
        ]),
        '-' => Some([0, 0, 0, 0b11111, 0, 0, 0]),
        '_' => Some([0, 0, 0, 0, 0, 0, 0b11111]),
        ',' => Some([0, 0, 0, 0, 0, 0b00110, 0b00100]),
        '.' => Some([0, 0, 0, 0, 0, 0b00110, 0b00110]),
        ' ' => Some([0, 0, 0, 0, 0, 0, 0]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Color = Rgba([255, 255, 255, 255]);

    #[test]
    fn from_image_resizes_to_canvas_width_preserving_aspect() {
        let source = DynamicImage::ImageRgba8(RgbaImage::from_pixel(200, 100, WHITE));
        let surface = Surface::from_image(&source, Some(100));
        assert_eq!(surface.width(), 100);
        assert_eq!(surface.height(), 50);

        let untouched = Surface::from_image(&source, None);
        assert_eq!(untouched.width(), 200);
        assert_eq!(untouched.height(), 100);
    }

    #[test]
    fn stroke_rect_hits_exact_pixel_bounds() {
        let mut surface = Surface::blank(100, 100, WHITE);
        surface.stroke_rect(10.0, 20.0, 40.0, 50.0, 3, RED);

        // Stroke bands live inside [10, 50) x [20, 70).
        assert_eq!(surface.pixel(10, 20), RED);
        assert_eq!(surface.pixel(49, 20), RED);
        assert_eq!(surface.pixel(10, 69), RED);
        assert_eq!(surface.pixel(49, 69), RED);
        // One pixel outside each edge stays untouched.
        assert_eq!(surface.pixel(9, 20), WHITE);
        assert_eq!(surface.pixel(50, 20), WHITE);
        assert_eq!(surface.pixel(10, 19), WHITE);
        assert_eq!(surface.pixel(10, 70), WHITE);
        // The interior is not filled.
        assert_eq!(surface.pixel(30, 45), WHITE);
    }

    #[test]
    fn stroke_rect_normalises_inverted_spans() {
        let mut surface = Surface::blank(100, 100, WHITE);
        // Same rectangle described with negative width/height.
        surface.stroke_rect(50.0, 70.0, -40.0, -50.0, 3, RED);
        assert_eq!(surface.pixel(10, 20), RED);
        assert_eq!(surface.pixel(49, 69), RED);
        assert_eq!(surface.pixel(30, 45), WHITE);
    }

    #[test]
    fn stroke_rect_clips_outside_the_surface() {
        let mut surface = Surface::blank(50, 50, WHITE);
        surface.stroke_rect(-20.0, -20.0, 200.0, 200.0, 3, RED);
        assert_eq!(surface.pixel(25, 25), WHITE);
    }

    #[test]
    fn fill_paths_fills_a_half_plane_rectangle() {
        let mut surface = Surface::blank(100, 100, WHITE);
        let path = vec![(0.0, 0.0), (50.0, 0.0), (50.0, 100.0), (0.0, 100.0)];
        surface.fill_paths(&[path], MASK_FILL);

        assert_eq!(surface.pixel(10, 10), MASK_FILL);
        assert_eq!(surface.pixel(49, 99), MASK_FILL);
        assert_eq!(surface.pixel(60, 10), WHITE);
    }

    #[test]
    fn fill_paths_ignores_degenerate_sub_paths() {
        let mut surface = Surface::blank(20, 20, WHITE);
        surface.fill_paths(&[vec![(5.0, 5.0)], vec![(2.0, 2.0), (10.0, 10.0)]], MASK_FILL);
        for y in 0..20 {
            for x in 0..20 {
                assert_eq!(surface.pixel(x, y), WHITE);
            }
        }
    }

    #[test]
    fn draw_text_marks_pixels_for_known_glyphs() {
        let mut surface = Surface::blank(60, 30, WHITE);
        surface.draw_text("A", 0.0, 0.0, 1, RED);
        // Row 3 of 'A' is 0b11111: all five columns set.
        for x in 0..5 {
            assert_eq!(surface.pixel(x, 3), RED);
        }
        assert_eq!(surface.pixel(5, 3), WHITE);
    }

    #[test]
    fn to_jpeg_produces_a_decodable_image() {
        let surface = Surface::blank(32, 16, WHITE);
        let bytes = surface.to_jpeg(85).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.width(), 32);
        assert_eq!(decoded.height(), 16);
    }
}
