//! Raster primitives for the drawing and preview layers.
//!
//! Coverage is binary: a pixel is painted iff its center lies inside the
//! shape. Shapes are first rasterized into a [`CoverageMask`] and the mask is
//! composited once, so overlapping parts of one stroke never double-blend.

use eframe::egui::{Color32, Pos2, Rect, Vec2};
use image::{GrayImage, Luma, Rgba};

use crate::canvas::{Composite, TiledImage};

/// Source color plus the composite mode it is applied with.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Paint {
    pub color: Rgba<u8>,
    pub composite: Composite,
}

impl Paint {
    pub fn solid(color: Color32) -> Self {
        Self { color: with_alpha(color, 255), composite: Composite::SourceOver }
    }

    pub fn translucent(color: Color32, alpha: u8) -> Self {
        Self { color: with_alpha(color, alpha), composite: Composite::SourceOver }
    }

    /// Full-strength destination-out.
    pub fn erase() -> Self {
        Self { color: Rgba([0, 0, 0, 255]), composite: Composite::DestinationOut }
    }
}

/// `color` as straight RGBA with the given alpha.
pub fn with_alpha(color: Color32, alpha: u8) -> Rgba<u8> {
    Rgba([color.r(), color.g(), color.b(), alpha])
}

// ============================================================================
// COVERAGE MASK
// ============================================================================

/// Binary coverage over the pixel window a set of shapes can touch,
/// clipped to the target surface.
pub struct CoverageMask {
    x0: u32,
    y0: u32,
    mask: GrayImage,
}

impl CoverageMask {
    /// A mask big enough for anything inside `bounds` on a `width`×`height`
    /// surface.
    pub fn new(bounds: Rect, width: u32, height: u32) -> Self {
        let clip = |v: f32, max: u32| -> u32 {
            if v.is_nan() { 0 } else { v.clamp(0.0, max as f32) as u32 }
        };
        let x0 = clip(bounds.min.x.floor(), width);
        let y0 = clip(bounds.min.y.floor(), height);
        let x1 = clip(bounds.max.x.ceil(), width);
        let y1 = clip(bounds.max.y.ceil(), height);
        Self {
            x0,
            y0,
            mask: GrayImage::new(x1.saturating_sub(x0), y1.saturating_sub(y0)),
        }
    }

    /// Mask sized for the whole surface.
    pub fn for_surface(img: &TiledImage) -> Self {
        let rect = Rect::from_min_size(Pos2::ZERO, Vec2::new(img.width() as f32, img.height() as f32));
        Self::new(rect, img.width(), img.height())
    }

    fn mark(&mut self, x: u32, y: u32) {
        self.mask.put_pixel(x - self.x0, y - self.y0, Luma([255]));
    }

    /// Surface-space pixel range whose centers fall in `[a, b)` on one axis.
    fn span(a: f32, b: f32, lo: u32, hi: u32) -> (u32, u32) {
        let start = (a - 0.5).ceil().max(lo as f32);
        let end = (b - 0.5).ceil().min(hi as f32);
        if end <= start {
            return (lo, lo);
        }
        (start as u32, end as u32)
    }

    fn x_bounds(&self) -> (u32, u32) {
        (self.x0, self.x0 + self.mask.width())
    }

    fn y_bounds(&self) -> (u32, u32) {
        (self.y0, self.y0 + self.mask.height())
    }

    pub fn add_rect(&mut self, rect: Rect) {
        let (xl, xh) = self.x_bounds();
        let (yl, yh) = self.y_bounds();
        let (sx, ex) = Self::span(rect.min.x, rect.max.x, xl, xh);
        let (sy, ey) = Self::span(rect.min.y, rect.max.y, yl, yh);
        for y in sy..ey {
            for x in sx..ex {
                self.mark(x, y);
            }
        }
    }

    /// Scanline fill of a closed polygon with the nonzero winding rule (the
    /// canvas `fill()` default), so self-overlapping regions stay filled.
    /// The closing edge from the last vertex back to the first is implied.
    pub fn add_polygon(&mut self, points: &[Pos2]) {
        if points.len() < 3 {
            return;
        }
        let (xl, xh) = self.x_bounds();
        let (yl, yh) = self.y_bounds();
        let n = points.len();
        let mut crossings: Vec<(f32, i32)> = Vec::with_capacity(n);

        for y in yl..yh {
            let yf = y as f32 + 0.5; // centre of pixel row
            crossings.clear();
            for i in 0..n {
                let a = points[i];
                let b = points[(i + 1) % n];
                let dir = if a.y <= yf && yf < b.y {
                    1
                } else if b.y <= yf && yf < a.y {
                    -1
                } else {
                    continue;
                };
                let t = (yf - a.y) / (b.y - a.y);
                crossings.push((a.x + t * (b.x - a.x), dir));
            }
            crossings.sort_by(|l, r| l.0.total_cmp(&r.0));

            let mut winding = 0;
            let mut start = 0.0;
            for &(x, dir) in &crossings {
                let was_inside = winding != 0;
                winding += dir;
                if !was_inside && winding != 0 {
                    start = x;
                } else if was_inside && winding == 0 {
                    let (sx, ex) = Self::span(start, x, xl, xh);
                    for px in sx..ex {
                        self.mark(px, y);
                    }
                }
            }
        }
    }

    /// Pixels whose center is within `radius` of `center`.
    pub fn add_disc(&mut self, center: Pos2, radius: f32) {
        self.add_annulus(center, 0.0, radius);
    }

    /// Pixels whose center distance from `center` lies in `[inner, outer)`.
    pub fn add_annulus(&mut self, center: Pos2, inner: f32, outer: f32) {
        let (xl, xh) = self.x_bounds();
        let (yl, yh) = self.y_bounds();
        let (sx, ex) = Self::span(center.x - outer, center.x + outer + 1.0, xl, xh);
        let (sy, ey) = Self::span(center.y - outer, center.y + outer + 1.0, yl, yh);
        let (inner_sq, outer_sq) = (inner * inner, outer * outer);
        for y in sy..ey {
            let dy = y as f32 + 0.5 - center.y;
            for x in sx..ex {
                let dx = x as f32 + 0.5 - center.x;
                let d = dx * dx + dy * dy;
                if d >= inner_sq && d < outer_sq {
                    self.mark(x, y);
                }
            }
        }
    }

    /// Segment of thickness `2 * radius` with round caps.
    pub fn add_capsule(&mut self, a: Pos2, b: Pos2, radius: f32) {
        let (xl, xh) = self.x_bounds();
        let (yl, yh) = self.y_bounds();
        let lo = Pos2::new(a.x.min(b.x) - radius, a.y.min(b.y) - radius);
        let hi = Pos2::new(a.x.max(b.x) + radius, a.y.max(b.y) + radius);
        let (sx, ex) = Self::span(lo.x, hi.x + 1.0, xl, xh);
        let (sy, ey) = Self::span(lo.y, hi.y + 1.0, yl, yh);
        let ab = b - a;
        let len_sq = ab.length_sq();
        let r_sq = radius * radius;
        for y in sy..ey {
            for x in sx..ex {
                let p = Pos2::new(x as f32 + 0.5, y as f32 + 0.5);
                let t = if len_sq > 0.0 { ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0) } else { 0.0 };
                let closest = a + ab * t;
                if (p - closest).length_sq() <= r_sq {
                    self.mark(x, y);
                }
            }
        }
    }

    pub fn is_covered(&self, x: u32, y: u32) -> bool {
        let (xl, xh) = self.x_bounds();
        let (yl, yh) = self.y_bounds();
        (xl..xh).contains(&x)
            && (yl..yh).contains(&y)
            && self.mask.get_pixel(x - self.x0, y - self.y0)[0] != 0
    }

    /// Composite `paint` onto every covered pixel of `img`.
    pub fn paint(&self, img: &mut TiledImage, paint: Paint) {
        for (x, y, px) in self.mask.enumerate_pixels() {
            if px[0] != 0 {
                img.blend_pixel(self.x0 + x, self.y0 + y, paint.color, paint.composite);
            }
        }
    }
}

// ============================================================================
// SHAPES
// ============================================================================

/// Corners of the rectangle of `width` around segment `a → b`, extended by
/// `extend` past both ends. A zero-length segment is axis-aligned.
pub fn segment_quad(a: Pos2, b: Pos2, width: f32, extend: f32) -> [Pos2; 4] {
    let d = b - a;
    let len = d.length();
    let dir = if len > 0.0 { d / len } else { Vec2::X };
    let normal = Vec2::new(-dir.y, dir.x) * (width / 2.0);
    let start = a - dir * extend;
    let end = b + dir * extend;
    [start + normal, end + normal, end - normal, start - normal]
}

fn bounds_of(points: &[Pos2]) -> Rect {
    let mut rect = Rect::NOTHING;
    for p in points {
        rect.extend_with(*p);
    }
    rect
}

/// Axis-aligned square of side `size` centered on `center`.
pub fn centered_square(center: Pos2, size: f32) -> Rect {
    Rect::from_center_size(center, Vec2::splat(size))
}

pub fn fill_rect(img: &mut TiledImage, rect: Rect, paint: Paint) {
    let mut mask = CoverageMask::new(rect, img.width(), img.height());
    mask.add_rect(rect);
    mask.paint(img, paint);
}

pub fn fill_polygon(img: &mut TiledImage, points: &[Pos2], paint: Paint) {
    if points.len() < 3 {
        return;
    }
    let mut mask = CoverageMask::new(bounds_of(points), img.width(), img.height());
    mask.add_polygon(points);
    mask.paint(img, paint);
}

/// One freehand step from `from` to `to`: squares of side `size` at both
/// points plus their spanning rectangle inflated by half the size.
pub fn stamp_segment(img: &mut TiledImage, from: Pos2, to: Pos2, size: f32, paint: Paint) {
    let half = size / 2.0;
    let span = Rect::from_min_size(
        Pos2::new(from.x.min(to.x) - half, from.y.min(to.y) - half),
        Vec2::new((to.x - from.x).abs() + size, (to.y - from.y).abs() + size),
    );
    let mut mask = CoverageMask::new(span, img.width(), img.height());
    mask.add_rect(span);
    mask.add_rect(centered_square(to, size));
    mask.add_rect(centered_square(from, size));
    mask.paint(img, paint);
}

/// Straight line of thickness `width` with square caps of side `width`
/// centered on both endpoints.
pub fn stroke_line(img: &mut TiledImage, from: Pos2, to: Pos2, width: f32, paint: Paint) {
    // Square caps are the body extended by half the width past each end.
    let capped = segment_quad(from, to, width, width / 2.0);
    let mut mask = CoverageMask::new(bounds_of(&capped), img.width(), img.height());
    mask.add_polygon(&capped);
    mask.paint(img, paint);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opaque(img: &TiledImage, x: u32, y: u32) -> bool {
        img.get_pixel(x, y)[3] == 255
    }

    fn painted(img: &TiledImage) -> usize {
        (0..img.height())
            .flat_map(|y| (0..img.width()).map(move |x| (x, y)))
            .filter(|&(x, y)| img.get_pixel(x, y)[3] != 0)
            .count()
    }

    #[test]
    fn click_stamps_exactly_one_square() {
        let mut img = TiledImage::new(200, 200);
        let p = Pos2::new(100.0, 100.0);
        stamp_segment(&mut img, p, p, 20.0, Paint::solid(Color32::BLUE));
        assert_eq!(painted(&img), 400);
        assert!(opaque(&img, 90, 90));
        assert!(opaque(&img, 109, 109));
        assert!(!opaque(&img, 89, 100));
        assert!(!opaque(&img, 110, 100));
    }

    #[test]
    fn stamp_covers_the_span_between_points() {
        let mut img = TiledImage::new(200, 100);
        stamp_segment(&mut img, Pos2::new(10.0, 50.0), Pos2::new(60.0, 50.0), 10.0, Paint::solid(Color32::RED));
        // x ∈ [5, 65), y ∈ [45, 55)
        assert_eq!(painted(&img), 60 * 10);
        assert!(opaque(&img, 5, 45));
        assert!(opaque(&img, 64, 54));
    }

    #[test]
    fn horizontal_line_covers_body_and_square_caps() {
        let mut img = TiledImage::new(200, 50);
        stroke_line(&mut img, Pos2::new(20.0, 20.0), Pos2::new(120.0, 20.0), 10.0, Paint::solid(Color32::RED));
        // Body x ∈ [20, 120), caps extend by 5 both ways; y ∈ [15, 25).
        assert!(opaque(&img, 15, 15));
        assert!(opaque(&img, 124, 24));
        assert!(!opaque(&img, 14, 20));
        assert!(!opaque(&img, 125, 20));
        assert!(!opaque(&img, 60, 14));
        assert!(!opaque(&img, 60, 25));
        assert_eq!(painted(&img), 110 * 10);
    }

    #[test]
    fn line_from_origin_is_clipped_to_the_surface() {
        let mut img = TiledImage::new(200, 50);
        stroke_line(&mut img, Pos2::ZERO, Pos2::new(100.0, 0.0), 10.0, Paint::solid(Color32::RED));
        // Only y ∈ [0, 5) and x ∈ [0, 105) survive clipping.
        assert_eq!(painted(&img), 105 * 5);
    }

    #[test]
    fn diagonal_line_is_rotated() {
        let mut img = TiledImage::new(100, 100);
        stroke_line(&mut img, Pos2::new(20.0, 20.0), Pos2::new(80.0, 80.0), 4.0, Paint::solid(Color32::RED));
        assert!(opaque(&img, 50, 50));
        assert!(!opaque(&img, 60, 40));
        assert!(!opaque(&img, 40, 60));
    }

    #[test]
    fn triangle_fill_uses_pixel_centers() {
        let mut img = TiledImage::new(20, 20);
        let tri = [Pos2::new(0.0, 0.0), Pos2::new(10.0, 0.0), Pos2::new(0.0, 10.0)];
        fill_polygon(&mut img, &tri, Paint::solid(Color32::GREEN));
        assert!(opaque(&img, 0, 0));
        assert!(opaque(&img, 8, 0));
        assert!(!opaque(&img, 9, 1));
        assert!(!opaque(&img, 5, 5));
        // Row y holds the centers left of x + y = 10, i.e. 9 - y pixels.
        assert_eq!(painted(&img), 45);
    }

    #[test]
    fn erasing_clears_alpha() {
        let mut img = TiledImage::new_filled(10, 10, Rgba([9, 9, 9, 255]));
        fill_rect(&mut img, Rect::from_min_size(Pos2::new(2.0, 2.0), Vec2::splat(3.0)), Paint::erase());
        assert_eq!(img.get_pixel(3, 3), &Rgba([0, 0, 0, 0]));
        assert!(opaque(&img, 5, 5));
        assert!(opaque(&img, 1, 1));
    }

    #[test]
    fn bow_tie_fills_both_lobes() {
        let mut mask = CoverageMask::new(Rect::from_min_max(Pos2::ZERO, Pos2::new(10.0, 10.0)), 10, 10);
        mask.add_polygon(&[
            Pos2::new(0.0, 0.0),
            Pos2::new(10.0, 10.0),
            Pos2::new(10.0, 0.0),
            Pos2::new(0.0, 10.0),
        ]);
        assert!(mask.is_covered(1, 5));
        assert!(mask.is_covered(8, 5));
        assert!(!mask.is_covered(5, 1));
        assert!(!mask.is_covered(5, 8));
    }

    #[test]
    fn pentagram_centre_is_filled() {
        let mut img = TiledImage::new(200, 200);
        let star = [
            Pos2::new(100.0, 20.0),
            Pos2::new(147.02, 164.72),
            Pos2::new(23.92, 75.28),
            Pos2::new(176.08, 75.28),
            Pos2::new(52.98, 164.72),
        ];
        fill_polygon(&mut img, &star, Paint::solid(Color32::RED));
        // The centre pentagon is wound twice.
        assert!(opaque(&img, 100, 100));
        assert!(opaque(&img, 100, 35));
        assert!(!opaque(&img, 20, 20));
        assert!(!opaque(&img, 100, 170));
    }
}
