//! Text rasterization for measurement labels and view-cube faces
//!
//! Glyph outlines come from egui's bundled monospace font and are rasterized
//! with `ab_glyph`, the rasterizer egui itself uses for UI text.

use std::sync::OnceLock;

use ab_glyph::{point, Font, FontArc, Glyph, PxScale, ScaleFont};
use image::{Rgba, RgbaImage};

/// Transparent margin around the text (pixels)
pub const PADDING: u32 = 10;
/// Measurement label glyph height (pixels)
pub const LABEL_PX: f32 = 32.0;
/// Outline width (pixels)
const STROKE: i64 = 2;
const FONT_NAME: &str = "Hack";

/// View-cube face texture size (pixels)
pub const FACE_SIZE: u32 = 128;
const FACE_TEXT_PX: f32 = 24.0;
const FACE_BORDER: u32 = 2;
const FACE_BACKGROUND: [u8; 3] = [0xff, 0xff, 0xff];
const FACE_BORDER_COLOR: [u8; 3] = [0xd1, 0xd5, 0xdb];
const FACE_TEXT_COLOR: [u8; 3] = [0x6b, 0x72, 0x80];

fn font() -> Option<&'static FontArc> {
    static FONT: OnceLock<Option<FontArc>> = OnceLock::new();
    FONT.get_or_init(|| {
        let definitions = egui::FontDefinitions::default();
        let Some(data) = definitions.font_data.get(FONT_NAME) else {
            tracing::error!(font = FONT_NAME, "bundled font missing, labels render empty");
            return None;
        };
        FontArc::try_from_vec(data.font.to_vec())
            .inspect_err(|e| tracing::error!(font = FONT_NAME, "bundled font unreadable: {e}"))
            .ok()
    })
    .as_ref()
}

/// Positioned glyphs of one line of text, baseline at the font ascent
fn layout(font: &FontArc, text: &str, px: f32) -> (Vec<Glyph>, f32, f32) {
    let scaled = font.as_scaled(PxScale::from(px));
    let mut caret = 0.0_f32;
    let mut previous = None;
    let mut glyphs = Vec::with_capacity(text.len());
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = previous {
            caret += scaled.kern(prev, id);
        }
        glyphs.push(id.with_scale_and_position(scaled.scale(), point(caret, scaled.ascent())));
        caret += scaled.h_advance(id);
        previous = Some(id);
    }
    (glyphs, caret, scaled.ascent() - scaled.descent())
}

/// Width and height of `text` without padding
pub fn text_size(text: &str) -> (u32, u32) {
    text_size_px(text, LABEL_PX)
}

fn text_size_px(text: &str, px: f32) -> (u32, u32) {
    match font() {
        Some(font) => {
            let (_, width, height) = layout(font, text, px);
            (width.ceil() as u32, height.ceil() as u32)
        }
        None => (0, px.ceil() as u32),
    }
}

/// Glyph coverage in [0, 1] over a `width` × `height` grid
struct Coverage {
    width: u32,
    height: u32,
    alpha: Vec<f32>,
}

impl Coverage {
    /// Rasterize `text` with its layout box's top-left at `origin`
    fn of_text(text: &str, px: f32, width: u32, height: u32, origin: (i64, i64)) -> Self {
        let mut alpha = vec![0.0_f32; (width * height) as usize];
        if let Some(font) = font() {
            let (glyphs, _, _) = layout(font, text, px);
            for glyph in glyphs {
                let Some(outlined) = font.outline_glyph(glyph) else {
                    continue;
                };
                let bounds = outlined.px_bounds();
                outlined.draw(|gx, gy, c| {
                    let x = origin.0 + bounds.min.x as i64 + gx as i64;
                    let y = origin.1 + bounds.min.y as i64 + gy as i64;
                    if x >= 0 && y >= 0 && x < width as i64 && y < height as i64 {
                        let idx = (y as u32 * width + x as u32) as usize;
                        alpha[idx] = (alpha[idx] + c).min(1.0);
                    }
                });
            }
        }
        Self { width, height, alpha }
    }

    fn at(&self, x: i64, y: i64) -> f32 {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return 0.0;
        }
        self.alpha[(y as u32 * self.width + x as u32) as usize]
    }

    /// Coverage dilated by `radius` pixels
    fn dilated(&self, x: i64, y: i64, radius: i64) -> f32 {
        (-radius..=radius)
            .flat_map(|dy| (-radius..=radius).map(move |dx| (dx, dy)))
            .map(|(dx, dy)| self.at(x + dx, y + dy))
            .fold(0.0, f32::max)
    }
}

/// Render `text` black with a white outline onto a transparent image
pub fn rasterize(text: &str) -> RgbaImage {
    let (tw, th) = text_size(text);
    let width = tw + 2 * PADDING;
    let height = th + 2 * PADDING;
    let coverage = Coverage::of_text(text, LABEL_PX, width, height, (PADDING as i64, PADDING as i64));

    let mut img = RgbaImage::new(width, height);
    for (x, y, px) in img.enumerate_pixels_mut() {
        let fill = coverage.at(x as i64, y as i64);
        let outline = coverage.dilated(x as i64, y as i64, STROKE);
        // Black fill over white outline
        let a = fill + outline * (1.0 - fill);
        if a <= 0.0 {
            continue;
        }
        let v = (255.0 * outline * (1.0 - fill) / a).round() as u8;
        *px = Rgba([v, v, v, (a * 255.0).round() as u8]);
    }
    img
}

/// Opaque view-cube face: upper-case caption centered on white with a gray border
pub fn face_texture(caption: &str) -> RgbaImage {
    let text = caption.to_uppercase();
    let size = FACE_SIZE;
    let (tw, th) = text_size_px(&text, FACE_TEXT_PX);
    let origin = (
        (size as i64 - tw as i64) / 2,
        (size as i64 - th as i64) / 2 + 3,
    );
    let coverage = Coverage::of_text(&text, FACE_TEXT_PX, size, size, origin);

    let mut img = RgbaImage::new(size, size);
    for (x, y, px) in img.enumerate_pixels_mut() {
        let on_border = x < FACE_BORDER || y < FACE_BORDER || x >= size - FACE_BORDER || y >= size - FACE_BORDER;
        let base = if on_border { FACE_BORDER_COLOR } else { FACE_BACKGROUND };
        let c = coverage.at(x as i64, y as i64);
        let mix = |i: usize| (base[i] as f32 * (1.0 - c) + FACE_TEXT_COLOR[i] as f32 * c).round() as u8;
        *px = Rgba([mix(0), mix(1), mix(2), 255]);
    }
    img
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_dark(p: &[u8; 4]) -> bool {
        p[3] > 200 && p[..3].iter().all(|&c| c < 60)
    }

    fn is_light(p: &[u8; 4]) -> bool {
        p[3] > 200 && p[..3].iter().all(|&c| c > 200)
    }

    #[test]
    fn test_image_sized_to_text() {
        let img = rasterize("5.00 mm");
        let (tw, th) = text_size("5.00 mm");
        assert_eq!(img.width(), tw + 2 * PADDING);
        assert_eq!(img.height(), th + 2 * PADDING);
        assert!(rasterize("10.00 mm").width() > img.width());
    }

    #[test]
    fn test_padding_is_transparent_and_text_is_outlined() {
        let img = rasterize("1");
        assert_eq!(img.get_pixel(0, 0).0[3], 0);
        let pixels: Vec<[u8; 4]> = img.pixels().map(|p| p.0).collect();
        assert!(pixels.iter().any(is_dark));
        assert!(pixels.iter().any(is_light));
    }

    #[test]
    fn test_empty_text() {
        let img = rasterize("");
        assert_eq!(img.width(), 2 * PADDING);
        assert!(img.pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn test_face_texture_border_and_caption() {
        let img = face_texture("Front");
        assert_eq!((img.width(), img.height()), (FACE_SIZE, FACE_SIZE));
        assert!(img.pixels().all(|p| p.0[3] == 255));
        assert_eq!(img.get_pixel(0, 0).0, [0xd1, 0xd5, 0xdb, 255]);
        assert_eq!(img.get_pixel(10, 10).0, [255, 255, 255, 255]);
        // Caption pixels are darker than the background
        let center_row = FACE_SIZE / 2;
        assert!((0..FACE_SIZE).any(|x| img.get_pixel(x, center_row).0[0] < 200));
    }
}
