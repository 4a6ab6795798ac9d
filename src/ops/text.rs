use ab_glyph::{Font, FontArc, GlyphId, ScaleFont, point};
use font_kit::family_name::FamilyName;
use font_kit::properties::Properties;
use font_kit::source::SystemSource;
use image::{Rgba, RgbaImage};
use std::sync::OnceLock;

use crate::canvas::source_over;

pub const WATERMARK_FONT_SIZE: f32 = 12.0;
/// Distance of the text's right edge and baseline from the image corner.
pub const WATERMARK_MARGIN: f32 = 10.0;
pub const WATERMARK_COLOR: Rgba<u8> = Rgba([0, 0, 0, 128]);

/// Families tried in order; the default watermark is Chinese text.
const WATERMARK_FAMILIES: &[&str] = &[
    "Microsoft YaHei",
    "PingFang SC",
    "Noto Sans CJK SC",
    "Source Han Sans SC",
    "WenQuanYi Micro Hei",
    "Arial",
];

static WATERMARK_FONT: OnceLock<Option<FontArc>> = OnceLock::new();

// ============================================================================
// FONT LOOKUP
// ============================================================================

/// Load a system font by family. Returns None if it cannot be found.
pub fn load_system_font(family: FamilyName) -> Option<FontArc> {
    let source = SystemSource::new();
    let handle = source.select_best_match(&[family], &Properties::new()).ok()?;
    let font_data = handle.load().ok()?;
    let font_data_copy = font_data.copy_font_data()?;
    let bytes: Vec<u8> = (*font_data_copy).clone();
    FontArc::try_from_vec(bytes).ok()
}

/// The watermark font, resolved once per process.
pub fn watermark_font() -> Option<&'static FontArc> {
    WATERMARK_FONT
        .get_or_init(|| {
            let found = WATERMARK_FAMILIES
                .iter()
                .find_map(|f| load_system_font(FamilyName::Title((*f).to_string())))
                .or_else(|| load_system_font(FamilyName::SansSerif));
            match &found {
                Some(_) => {
                    crate::log_info!("text: watermark font loaded");
                }
                None => {
                    crate::log_warn!("text: no system font found, watermark disabled");
                }
            }
            found
        })
        .as_ref()
}

// ============================================================================
// LAYOUT & RASTER
// ============================================================================

/// Lay out a single line with its left edge at x = 0.
/// Returns `(glyph id, x)` pairs and the advance width.
pub fn layout_line(font: &FontArc, text: &str, font_size: f32) -> (Vec<(GlyphId, f32)>, f32) {
    let scaled = font.as_scaled(font_size);
    let mut glyphs = Vec::with_capacity(text.len());
    let mut cursor_x = 0.0f32;
    let mut last_glyph: Option<GlyphId> = None;

    for ch in text.chars() {
        let glyph_id = font.glyph_id(ch);
        if let Some(prev) = last_glyph {
            cursor_x += scaled.kern(prev, glyph_id);
        }
        glyphs.push((glyph_id, cursor_x));
        cursor_x += scaled.h_advance(glyph_id);
        last_glyph = Some(glyph_id);
    }
    (glyphs, cursor_x)
}

/// Draw `text` right-aligned so that it ends at `right_x`, sitting on
/// `baseline_y`. Glyph coverage scales the color's alpha.
pub fn draw_text_right_aligned(
    img: &mut RgbaImage,
    font: &FontArc,
    text: &str,
    font_size: f32,
    right_x: f32,
    baseline_y: f32,
    color: Rgba<u8>,
) {
    let (glyphs, width) = layout_line(font, text, font_size);
    let origin_x = right_x - width;
    let (w, h) = img.dimensions();

    for (glyph_id, gx) in glyphs {
        let glyph = glyph_id.with_scale_and_position(font_size, point(origin_x + gx, baseline_y));
        let Some(outlined) = font.outline_glyph(glyph) else {
            continue;
        };
        let bounds = outlined.px_bounds();
        outlined.draw(|px, py, cov| {
            let x = bounds.min.x as i32 + px as i32;
            let y = bounds.min.y as i32 + py as i32;
            if x < 0 || y < 0 || x as u32 >= w || y as u32 >= h || cov <= 0.0 {
                return;
            }
            let alpha = (color[3] as f32 * cov.min(1.0)).round() as u8;
            let dst = *img.get_pixel(x as u32, y as u32);
            let src = Rgba([color[0], color[1], color[2], alpha]);
            img.put_pixel(x as u32, y as u32, source_over(dst, src));
        });
    }
}

/// Stamp the watermark into the bottom-right corner. Without a usable font
/// the image is left as is.
pub fn stamp_watermark(img: &mut RgbaImage, text: &str) -> bool {
    if text.trim().is_empty() {
        return false;
    }
    let Some(font) = watermark_font() else {
        return false;
    };
    let (w, h) = img.dimensions();
    draw_text_right_aligned(
        img,
        font,
        text,
        WATERMARK_FONT_SIZE,
        w as f32 - WATERMARK_MARGIN,
        h as f32 - WATERMARK_MARGIN,
        WATERMARK_COLOR,
    );
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_watermark_is_skipped() {
        let mut img = RgbaImage::from_pixel(50, 50, Rgba([255, 255, 255, 255]));
        assert!(!stamp_watermark(&mut img, "   "));
        assert!(img.pixels().all(|p| *p == Rgba([255, 255, 255, 255])));
    }

    #[test]
    fn watermark_darkens_only_the_bottom_right_corner() {
        let Some(font) = watermark_font() else {
            return; // no fonts on this machine
        };
        let mut img = RgbaImage::from_pixel(200, 100, Rgba([255, 255, 255, 255]));
        draw_text_right_aligned(&mut img, font, "Mark", 12.0, 190.0, 90.0, WATERMARK_COLOR);
        let touched: Vec<(u32, u32)> = img
            .enumerate_pixels()
            .filter(|(_, _, p)| p[0] < 255)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert!(!touched.is_empty());
        assert!(touched.iter().all(|&(x, y)| x >= 120 && x <= 191 && y >= 70 && y <= 95));
    }
}
