//! Live previews drawn on the preview layer. Every render clears the layer
//! first; nothing here touches the drawing layer.

use eframe::egui::{Color32, Pos2, Rect, Vec2};

use crate::canvas::TiledImage;
use crate::ops::brush::{CoverageMask, Paint, segment_quad};

const LINE_PREVIEW_ALPHA: u8 = 0xA0;
const LASSO_STROKE_ALPHA: u8 = 0xCC;
const LASSO_FILL_ALPHA: u8 = 0x20;
const CROSSHAIR_ALPHA: u8 = 0xAA;
const CURSOR_DOT_ALPHA: u8 = 0x99;

/// On/off lengths of the preview dash pattern.
const DASH: [f32; 2] = [5.0, 3.0];
const RING_DASH: [f32; 2] = [2.0, 2.0];

const VERTEX_RADIUS: f32 = 5.0;
const CLOSE_RING_RADIUS: f32 = 8.0;
const CROSSHAIR_ARM: f32 = 10.0;
const CURSOR_DOT_RADIUS: f32 = 3.0;

pub const CLOSABLE_GREEN: Color32 = Color32::from_rgb(0x4c, 0xaf, 0x50);
const NOT_CLOSABLE_GREY: Color32 = Color32::from_rgb(0x99, 0x99, 0x99);

// ============================================================================
// DASHING
// ============================================================================

/// Split an open polyline into its "on" pieces. The pattern phase carries
/// over from one segment to the next.
pub fn dash_polyline(points: &[Pos2], pattern: [f32; 2]) -> Vec<(Pos2, Pos2)> {
    let mut dashes = Vec::new();
    let period = pattern[0] + pattern[1];
    if points.len() < 2 || period <= 0.0 {
        return dashes;
    }
    let mut phase = 0.0_f32;
    for pair in points.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let len = (b - a).length();
        if len <= 0.0 {
            continue;
        }
        let dir = (b - a) / len;
        let mut pos = 0.0;
        while pos < len {
            let in_period = phase % period;
            let (on, remaining) = if in_period < pattern[0] {
                (true, pattern[0] - in_period)
            } else {
                (false, period - in_period)
            };
            let step = remaining.min(len - pos);
            if on {
                dashes.push((a + dir * pos, a + dir * (pos + step)));
            }
            pos += step;
            phase += step;
        }
    }
    dashes
}

/// Polyline approximation of a circle, closed (first point repeated).
fn circle_points(center: Pos2, radius: f32) -> Vec<Pos2> {
    let segments = ((radius * std::f32::consts::TAU) / 2.0).ceil().max(12.0) as usize;
    (0..=segments)
        .map(|i| {
            let a = i as f32 / segments as f32 * std::f32::consts::TAU;
            center + Vec2::new(a.cos(), a.sin()) * radius
        })
        .collect()
}

fn surface_mask(preview: &TiledImage) -> CoverageMask {
    CoverageMask::for_surface(preview)
}

/// Mask covering a square of half-side `reach` around `center`.
fn mask_around(preview: &TiledImage, center: Pos2, reach: f32) -> CoverageMask {
    let bounds = Rect::from_center_size(center, Vec2::splat(2.0 * reach + 2.0));
    CoverageMask::new(bounds, preview.width(), preview.height())
}

// ============================================================================
// LINE PREVIEW
// ============================================================================

/// Dashed, translucent, square-capped line from the anchor to the pointer.
pub fn render_line_preview(preview: &mut TiledImage, from: Pos2, to: Pos2, width: f32, color: Color32) {
    preview.clear();
    let mut mask = surface_mask(preview);
    let half = width / 2.0;
    if from == to {
        mask.add_rect(Rect::from_center_size(from, Vec2::splat(width)));
    }
    for (a, b) in dash_polyline(&[from, to], DASH) {
        mask.add_polygon(&segment_quad(a, b, width, half));
    }
    mask.paint(preview, Paint::translucent(color, LINE_PREVIEW_ALPHA));
}

// ============================================================================
// LASSO PREVIEW
// ============================================================================

/// What the lasso preview needs to know.
#[derive(Clone, Copy, Debug)]
pub struct LassoPreview<'a> {
    pub vertices: &'a [Pos2],
    pub cursor: Option<Pos2>,
    pub color: Color32,
    pub min_vertices: usize,
}

impl LassoPreview<'_> {
    fn closable(&self) -> bool {
        self.vertices.len() >= self.min_vertices
    }
}

/// Faint fill, dashed outline, vertex markers and the pointer crosshair.
/// The pointer position is never part of the outline.
pub fn render_lasso_preview(preview: &mut TiledImage, lasso: &LassoPreview<'_>) {
    preview.clear();
    let vertices = lasso.vertices;

    if vertices.len() >= 2 {
        if lasso.closable() {
            let mut fill = surface_mask(preview);
            fill.add_polygon(vertices);
            fill.paint(preview, Paint::translucent(lasso.color, LASSO_FILL_ALPHA));
        }

        let mut outline: Vec<Pos2> = vertices.to_vec();
        if lasso.closable() {
            outline.push(vertices[0]);
        }
        let mut stroke = surface_mask(preview);
        for (a, b) in dash_polyline(&outline, DASH) {
            stroke.add_capsule(a, b, 1.0);
        }
        stroke.paint(preview, Paint::translucent(lasso.color, LASSO_STROKE_ALPHA));
    }

    for (i, &v) in vertices.iter().enumerate() {
        let fill = if i == 0 && lasso.closable() { CLOSABLE_GREEN } else { lasso.color };
        let mut disc = mask_around(preview, v, VERTEX_RADIUS);
        disc.add_disc(v, VERTEX_RADIUS);
        disc.paint(preview, Paint::solid(fill));

        let mut ring = mask_around(preview, v, VERTEX_RADIUS + 1.0);
        ring.add_annulus(v, VERTEX_RADIUS - 0.75, VERTEX_RADIUS + 0.75);
        ring.paint(preview, Paint::solid(Color32::WHITE));

        if i == 0 {
            let ring_color = if lasso.closable() { CLOSABLE_GREEN } else { NOT_CLOSABLE_GREY };
            let mut close_ring = mask_around(preview, v, CLOSE_RING_RADIUS + 1.0);
            for (a, b) in dash_polyline(&circle_points(v, CLOSE_RING_RADIUS), RING_DASH) {
                close_ring.add_capsule(a, b, 0.75);
            }
            close_ring.paint(preview, Paint::solid(ring_color));
        }
    }

    if let Some(c) = lasso.cursor {
        // One-pixel arms through the pixel under the pointer.
        let (px, py) = (c.x.floor(), c.y.floor());
        let mut cross = mask_around(preview, c, CROSSHAIR_ARM + 1.0);
        cross.add_rect(Rect::from_min_max(
            Pos2::new(c.x - CROSSHAIR_ARM, py),
            Pos2::new(c.x + CROSSHAIR_ARM, py + 1.0),
        ));
        cross.add_rect(Rect::from_min_max(
            Pos2::new(px, c.y - CROSSHAIR_ARM),
            Pos2::new(px + 1.0, c.y + CROSSHAIR_ARM),
        ));
        cross.paint(preview, Paint::translucent(lasso.color, CROSSHAIR_ALPHA));

        let mut dot = mask_around(preview, c, CURSOR_DOT_RADIUS);
        dot.add_disc(c, CURSOR_DOT_RADIUS);
        dot.paint(preview, Paint::translucent(lasso.color, CURSOR_DOT_ALPHA));

        let mut dot_ring = mask_around(preview, c, CURSOR_DOT_RADIUS + 1.0);
        dot_ring.add_annulus(c, CURSOR_DOT_RADIUS - 0.5, CURSOR_DOT_RADIUS + 0.5);
        dot_ring.paint(preview, Paint::solid(Color32::WHITE));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn dashes_follow_the_pattern_across_segments() {
        let d = dash_polyline(&[Pos2::ZERO, Pos2::new(6.0, 0.0), Pos2::new(6.0, 10.0)], DASH);
        assert_eq!(d[0], (Pos2::ZERO, Pos2::new(5.0, 0.0)));
        // Gap ends 2 px into the second segment.
        assert_eq!(d[1], (Pos2::new(6.0, 2.0), Pos2::new(6.0, 7.0)));
        assert_eq!(d.len(), 2);
    }

    #[test]
    fn line_preview_is_translucent_and_replaces_previous_frame() {
        let mut preview = TiledImage::new(200, 60);
        render_line_preview(&mut preview, Pos2::new(10.0, 10.0), Pos2::new(150.0, 10.0), 6.0, Color32::RED);
        render_line_preview(&mut preview, Pos2::new(10.0, 40.0), Pos2::new(150.0, 40.0), 6.0, Color32::RED);
        assert_eq!(preview.get_pixel(12, 10)[3], 0);
        assert_eq!(preview.get_pixel(12, 40), &Rgba([255, 0, 0, LINE_PREVIEW_ALPHA]));
    }

    #[test]
    fn lasso_vertex_zero_turns_green_once_closable() {
        let mut preview = TiledImage::new(200, 200);
        let verts = [Pos2::new(20.0, 20.0), Pos2::new(150.0, 20.0)];
        let mut lasso = LassoPreview { vertices: &verts, cursor: None, color: Color32::BLUE, min_vertices: 3 };
        render_lasso_preview(&mut preview, &lasso);
        let center = *preview.get_pixel(20, 20);
        assert_eq!(&center.0[..3], &[0, 0, 255]);

        let verts3 = [verts[0], verts[1], Pos2::new(80.0, 150.0)];
        lasso.vertices = &verts3;
        render_lasso_preview(&mut preview, &lasso);
        let center = *preview.get_pixel(20, 20);
        assert_eq!(&center.0[..3], &[0x4c, 0xaf, 0x50]);
        // Interior gets the faint fill.
        assert_eq!(preview.get_pixel(80, 60)[3], LASSO_FILL_ALPHA);
    }

    #[test]
    fn lasso_cursor_draws_a_crosshair_only() {
        let mut preview = TiledImage::new(100, 100);
        let lasso = LassoPreview {
            vertices: &[],
            cursor: Some(Pos2::new(50.0, 50.0)),
            color: Color32::BLUE,
            min_vertices: 3,
        };
        render_lasso_preview(&mut preview, &lasso);
        assert_ne!(preview.get_pixel(42, 50)[3], 0);
        assert_ne!(preview.get_pixel(50, 58)[3], 0);
        assert_eq!(preview.get_pixel(42, 42)[3], 0);
    }
}
