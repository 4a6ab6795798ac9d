use std::sync::Arc;

use eframe::egui;
use egui::{Pos2, Rect, Vec2};
use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use crate::error::{PaintError, PaintResult};

/// Neutral fill under the drawing layer.
pub const NEUTRAL_FILL: Rgba<u8> = Rgba([0xf8, 0xf9, 0xfa, 0xff]);
/// Border around the default (image-less) canvas.
pub const BORDER_COLOR: Rgba<u8> = Rgba([0xde, 0xe2, 0xe6, 0xff]);
pub const BORDER_WIDTH: u32 = 2;

/// Share of the viewport height the default canvas may occupy.
const MAX_HEIGHT_SHARE: f32 = 0.7;

// ============================================================================
// TILED IMAGE – sparse 64×64 chunk storage (Vec-indexed)
// ============================================================================

pub const CHUNK_SIZE: u32 = 64;

/// A pixel with zero alpha, returned by reference for missing chunks.
static TRANSPARENT_PIXEL: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Sparse tiled image backed by a flat `Vec<Option<Arc<RgbaImage>>>`.
///
/// Chunks are wrapped in `Arc` for copy-on-write: `clone()` only bumps
/// reference counts, and mutations go through `Arc::make_mut` so only the
/// touched chunk is duplicated. History snapshots rely on this.
#[derive(Clone)]
pub struct TiledImage {
    pub width: u32,
    pub height: u32,
    chunks_per_row: u32,
    chunks: Vec<Option<Arc<RgbaImage>>>,
}

impl TiledImage {
    // ---- construction -------------------------------------------------------

    /// Create an empty (fully transparent) tiled image. A zero dimension
    /// yields an image with no pixels at all.
    pub fn new(width: u32, height: u32) -> Self {
        let (width, height) = {
            let total = (width as u64) * (height as u64);
            if total > 256_000_000 {
                crate::log_warn!(
                    "TiledImage::new: {}×{} exceeds 256M pixels, clamped to 1×1",
                    width,
                    height
                );
                (1, 1)
            } else {
                (width, height)
            }
        };
        let chunks_per_row = width.div_ceil(CHUNK_SIZE);
        let chunks_per_col = height.div_ceil(CHUNK_SIZE);
        let total = (chunks_per_row * chunks_per_col) as usize;
        Self {
            width,
            height,
            chunks_per_row,
            chunks: vec![None; total],
        }
    }

    pub fn new_filled(width: u32, height: u32, color: Rgba<u8>) -> Self {
        let mut img = Self::new(width, height);
        if color[3] > 0 {
            img.fill(color);
        }
        img
    }

    /// Import from a flat `RgbaImage`. Only non-transparent chunks are stored.
    pub fn from_rgba_image(src: &RgbaImage) -> Self {
        let width = src.width();
        let height = src.height();
        let mut img = Self::new(width, height);
        if img.chunks.is_empty() {
            return img;
        }

        let chunks_x = img.chunks_per_row as usize;
        let total_chunks = img.chunks.len();
        let src_raw = src.as_raw();

        let chunk_results: Vec<(usize, Option<Arc<RgbaImage>>)> = (0..total_chunks)
            .into_par_iter()
            .map(|flat| {
                let base_x = (flat % chunks_x) as u32 * CHUNK_SIZE;
                let base_y = (flat / chunks_x) as u32 * CHUNK_SIZE;
                let cw = CHUNK_SIZE.min(width - base_x);
                let ch = CHUNK_SIZE.min(height - base_y);
                let chunk_stride = CHUNK_SIZE as usize * 4;
                let mut chunk_data = vec![0u8; chunk_stride * CHUNK_SIZE as usize];
                let mut has_content = false;

                for ly in 0..ch {
                    let src_start = ((base_y + ly) * width + base_x) as usize * 4;
                    let dst_start = ly as usize * chunk_stride;
                    let byte_len = cw as usize * 4;
                    let row = &src_raw[src_start..src_start + byte_len];
                    chunk_data[dst_start..dst_start + byte_len].copy_from_slice(row);
                    has_content |= row.chunks_exact(4).any(|px| px[3] != 0);
                }

                let chunk = has_content
                    .then(|| RgbaImage::from_raw(CHUNK_SIZE, CHUNK_SIZE, chunk_data))
                    .flatten()
                    .map(Arc::new);
                (flat, chunk)
            })
            .collect();

        for (idx, chunk) in chunk_results {
            img.chunks[idx] = chunk;
        }
        img
    }

    /// Flatten back to a contiguous `RgbaImage`.
    pub fn to_rgba_image(&self) -> RgbaImage {
        let mut out = RgbaImage::new(self.width, self.height);
        let out_raw: &mut [u8] = out.as_mut();
        let out_stride = self.width as usize * 4;
        for (cx, cy) in self.chunk_keys() {
            if let Some(chunk) = self.get_chunk(cx, cy) {
                let base_x = cx * CHUNK_SIZE;
                let base_y = cy * CHUNK_SIZE;
                let cw = CHUNK_SIZE.min(self.width.saturating_sub(base_x)) as usize;
                let ch = CHUNK_SIZE.min(self.height.saturating_sub(base_y));
                let chunk_raw = chunk.as_raw();
                let chunk_stride = CHUNK_SIZE as usize * 4;
                for ly in 0..ch as usize {
                    let src_start = ly * chunk_stride;
                    let dst_start = (base_y as usize + ly) * out_stride + base_x as usize * 4;
                    out_raw[dst_start..dst_start + cw * 4]
                        .copy_from_slice(&chunk_raw[src_start..src_start + cw * 4]);
                }
            }
        }
        out
    }

    // ---- chunk addressing ---------------------------------------------------

    #[inline]
    fn chunk_coord(x: u32, y: u32) -> (u32, u32) {
        (x / CHUNK_SIZE, y / CHUNK_SIZE)
    }

    #[inline]
    fn local(x: u32, y: u32) -> (u32, u32) {
        (x % CHUNK_SIZE, y % CHUNK_SIZE)
    }

    #[inline]
    fn flat_index(&self, cx: u32, cy: u32) -> usize {
        (cy * self.chunks_per_row + cx) as usize
    }

    // ---- pixel access -------------------------------------------------------

    /// Read a pixel (returns `&TRANSPARENT_PIXEL` for missing chunks).
    #[inline]
    pub fn get_pixel(&self, x: u32, y: u32) -> &Rgba<u8> {
        if x >= self.width || y >= self.height {
            return &TRANSPARENT_PIXEL;
        }
        let (cx, cy) = Self::chunk_coord(x, y);
        let (lx, ly) = Self::local(x, y);
        let idx = self.flat_index(cx, cy);
        self.chunks[idx]
            .as_ref()
            .map(|c| c.get_pixel(lx, ly))
            .unwrap_or(&TRANSPARENT_PIXEL)
    }

    /// Write a pixel (creates the chunk on demand, COW-clones if shared).
    #[inline]
    pub fn put_pixel(&mut self, x: u32, y: u32, pixel: Rgba<u8>) {
        if x >= self.width || y >= self.height {
            return;
        }
        let (cx, cy) = Self::chunk_coord(x, y);
        let (lx, ly) = Self::local(x, y);
        let idx = self.flat_index(cx, cy);
        let arc = self.chunks[idx]
            .get_or_insert_with(|| Arc::new(RgbaImage::new(CHUNK_SIZE, CHUNK_SIZE)));
        Arc::make_mut(arc).put_pixel(lx, ly, pixel);
    }

    /// Composite `src` onto one pixel. Out-of-range coordinates are ignored;
    /// erasing inside a missing chunk allocates nothing.
    #[inline]
    pub fn blend_pixel(&mut self, x: u32, y: u32, src: Rgba<u8>, mode: Composite) {
        if x >= self.width || y >= self.height {
            return;
        }
        let (cx, cy) = Self::chunk_coord(x, y);
        let (lx, ly) = Self::local(x, y);
        let idx = self.flat_index(cx, cy);
        if mode == Composite::DestinationOut && self.chunks[idx].is_none() {
            return;
        }
        let arc = self.chunks[idx]
            .get_or_insert_with(|| Arc::new(RgbaImage::new(CHUNK_SIZE, CHUNK_SIZE)));
        let px = Arc::make_mut(arc).get_pixel_mut(lx, ly);
        *px = mode.apply(*px, src);
    }

    /// Read-only access to a chunk (if it exists).
    pub fn get_chunk(&self, cx: u32, cy: u32) -> Option<&RgbaImage> {
        let idx = self.flat_index(cx, cy);
        self.chunks.get(idx).and_then(|c| c.as_deref())
    }

    /// Iterator over populated chunk coordinates.
    pub fn chunk_keys(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let cpr = self.chunks_per_row;
        self.chunks.iter().enumerate().filter_map(move |(i, slot)| {
            slot.as_ref().map(|_| ((i as u32) % cpr, (i as u32) / cpr))
        })
    }

    /// Number of populated chunks.
    pub fn chunk_count(&self) -> usize {
        self.chunks.iter().filter(|c| c.is_some()).count()
    }

    /// Number of populated chunks whose storage is shared with `other`.
    pub fn shared_chunk_count(&self, other: &TiledImage) -> usize {
        self.chunks
            .iter()
            .zip(other.chunks.iter())
            .filter(|(a, b)| matches!((a, b), (Some(a), Some(b)) if Arc::ptr_eq(a, b)))
            .count()
    }

    /// Pixel-for-pixel equality (missing chunks compare as transparent).
    pub fn pixels_eq(&self, other: &TiledImage) -> bool {
        if self.width != other.width || self.height != other.height {
            return false;
        }
        (0..self.height).into_par_iter().all(|y| {
            (0..self.width).all(|x| self.get_pixel(x, y) == other.get_pixel(x, y))
        })
    }

    // ---- bulk operations ----------------------------------------------------

    /// Fill every pixel with `color`.
    pub fn fill(&mut self, color: Rgba<u8>) {
        for slot in &mut self.chunks {
            let arc = slot.get_or_insert_with(|| Arc::new(RgbaImage::new(CHUNK_SIZE, CHUNK_SIZE)));
            for pixel in Arc::make_mut(arc).pixels_mut() {
                *pixel = color;
            }
        }
    }

    /// Drop all chunks (make the image fully transparent).
    pub fn clear(&mut self) {
        for slot in &mut self.chunks {
            *slot = None;
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Approximate memory usage in bytes. Chunks shared with snapshots are
    /// counted at pointer cost only.
    pub fn memory_bytes(&self) -> usize {
        let chunk_byte_size = (CHUNK_SIZE * CHUNK_SIZE * 4) as usize;
        self.chunks
            .iter()
            .filter_map(|c| c.as_ref())
            .map(|arc| {
                if Arc::strong_count(arc) == 1 {
                    chunk_byte_size
                } else {
                    std::mem::size_of::<usize>() * 2
                }
            })
            .sum()
    }
}

// ============================================================================
// COMPOSITING
// ============================================================================

/// How a drawn pixel combines with what is already on the surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Composite {
    #[default]
    SourceOver,
    /// Reduces destination alpha by source alpha; source color is ignored.
    DestinationOut,
}

impl Composite {
    /// Straight-alpha Porter-Duff.
    #[inline]
    pub fn apply(self, dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
        match self {
            Composite::SourceOver => source_over(dst, src),
            Composite::DestinationOut => {
                let sa = src[3] as u32;
                if sa == 255 {
                    return Rgba([0, 0, 0, 0]);
                }
                let out_a = (dst[3] as u32 * (255 - sa) + 127) / 255;
                if out_a == 0 {
                    Rgba([0, 0, 0, 0])
                } else {
                    Rgba([dst[0], dst[1], dst[2], out_a as u8])
                }
            }
        }
    }
}

#[inline]
pub fn source_over(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    let sa = src[3] as f32 / 255.0;
    if sa >= 1.0 {
        return src;
    }
    if sa <= 0.0 {
        return dst;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }
    let ch = |i: usize| {
        let v = (src[i] as f32 * sa + dst[i] as f32 * da * (1.0 - sa)) / out_a;
        v.round().clamp(0.0, 255.0) as u8
    };
    Rgba([ch(0), ch(1), ch(2), (out_a * 255.0).round() as u8])
}

// ============================================================================
// GEOMETRY
// ============================================================================

/// What the host reports about its window and the canvas container.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    /// Window width, drives the size breakpoints and the compact layout.
    pub width: f32,
    pub height: f32,
    pub container_size: Vec2,
    /// Top-left of the container in client coordinates.
    pub container_origin: Pos2,
    pub device_pixel_ratio: f32,
}

impl Viewport {
    /// A viewport whose container fills the whole window.
    pub fn new(width: f32, height: f32, device_pixel_ratio: f32) -> Self {
        Self {
            width,
            height,
            container_size: Vec2::new(width, height),
            container_origin: Pos2::ZERO,
            device_pixel_ratio,
        }
    }

    fn usable(&self) -> bool {
        let finite = self.container_size.x.is_finite() && self.container_size.y.is_finite();
        finite && self.container_size.x >= 1.0 && self.container_size.y >= 1.0
    }

    fn dpr(&self) -> f32 {
        if self.device_pixel_ratio.is_finite() && self.device_pixel_ratio > 0.0 {
            self.device_pixel_ratio
        } else {
            1.0
        }
    }
}

/// Size and placement shared by the three surfaces.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CanvasGeometry {
    /// Logical (CSS-pixel) size.
    pub display_size: Vec2,
    pub device_pixel_ratio: f32,
    pub pixel_width: u32,
    pub pixel_height: u32,
    /// Image fit scale; 1.0 for the default canvas.
    pub scale_factor: f32,
    /// Offset of the surface inside its container.
    pub image_offset: Vec2,
    pub container_origin: Pos2,
    pub locked: bool,
}

impl CanvasGeometry {
    /// `max(1, round(display × dpr))` per axis.
    pub fn pixel_size_for(display: Vec2, dpr: f32) -> (u32, u32) {
        let w = (display.x * dpr).round().max(1.0) as u32;
        let h = (display.y * dpr).round().max(1.0) as u32;
        (w, h)
    }

    fn new(display: Vec2, dpr: f32, scale_factor: f32, viewport: &Viewport, locked: bool) -> Self {
        let (pixel_width, pixel_height) = Self::pixel_size_for(display, dpr);
        Self {
            display_size: display,
            device_pixel_ratio: dpr,
            pixel_width,
            pixel_height,
            scale_factor,
            image_offset: centered_offset(viewport.container_size, display),
            container_origin: viewport.container_origin,
            locked,
        }
    }

    /// The drawing surface's rectangle in client coordinates.
    pub fn bounding_rect(&self) -> Rect {
        Rect::from_min_size(self.container_origin + self.image_offset, self.display_size)
    }

    pub fn pixel_size(&self) -> (u32, u32) {
        (self.pixel_width, self.pixel_height)
    }
}

fn centered_offset(container: Vec2, display: Vec2) -> Vec2 {
    Vec2::new(
        ((container.x - display.x) / 2.0).floor().max(0.0),
        ((container.y - display.y) / 2.0).floor().max(0.0),
    )
}

/// Default display size for a window width.
pub fn default_display_size(window_width: f32) -> Vec2 {
    if window_width <= 480.0 {
        Vec2::new(400.0, 300.0)
    } else if window_width <= 768.0 {
        Vec2::new(800.0, 600.0)
    } else {
        Vec2::new(1024.0, 768.0)
    }
}

/// Result of a (debounced) resize.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResizeOutcome {
    /// Only the placement changed; pixels untouched.
    Recentered,
    /// Surfaces were rebuilt and the drawing cleared.
    Reinitialized,
}

// ============================================================================
// CANVAS STACK – background / drawing / preview
// ============================================================================

/// The image a locked canvas is fitted to.
#[derive(Clone)]
pub struct BackgroundBinding {
    pub image: Arc<RgbaImage>,
}

pub struct CanvasStack {
    pub geometry: CanvasGeometry,
    pub background: TiledImage,
    pub drawing: TiledImage,
    /// Never hit-tested, never exported.
    pub preview: TiledImage,
    pub binding: Option<BackgroundBinding>,
    last_device: Pos2,
}

impl CanvasStack {
    /// A stack with the default canvas for `viewport`.
    pub fn new(viewport: &Viewport) -> PaintResult<Self> {
        let mut stack = Self {
            geometry: CanvasGeometry::new(Vec2::new(1.0, 1.0), 1.0, 1.0, viewport, false),
            background: TiledImage::new(0, 0),
            drawing: TiledImage::new(0, 0),
            preview: TiledImage::new(0, 0),
            binding: None,
            last_device: Pos2::ZERO,
        };
        stack.initialize_default(viewport)?;
        Ok(stack)
    }

    /// Size the canvas from the breakpoint table, paint the neutral fill and
    /// border, clear drawing and preview.
    pub fn initialize_default(&mut self, viewport: &Viewport) -> PaintResult<()> {
        if !viewport.usable() {
            crate::log_err!(
                "canvas: container {}×{} is unusable, default init aborted",
                viewport.container_size.x,
                viewport.container_size.y
            );
            return Err(PaintError::InvalidContainer {
                width: viewport.container_size.x,
                height: viewport.container_size.y,
            });
        }
        let base = default_display_size(viewport.width);
        let display = Vec2::new(
            base.x.min(viewport.container_size.x),
            base.y.min(viewport.height * MAX_HEIGHT_SHARE).max(1.0),
        );
        self.binding = None;
        self.geometry = CanvasGeometry::new(display, viewport.dpr(), 1.0, viewport, false);
        self.resize_surfaces();
        self.paint_default_background();
        crate::log_info!(
            "canvas: default {}×{} display, {}×{} px",
            display.x,
            display.y,
            self.geometry.pixel_width,
            self.geometry.pixel_height
        );
        Ok(())
    }

    /// Fit the canvas to `image`, lock it, and paint the image as background.
    pub fn lock_to_image(&mut self, image: Arc<RgbaImage>, viewport: &Viewport) -> PaintResult<()> {
        let (iw, ih) = image.dimensions();
        if iw == 0 || ih == 0 {
            return Err(PaintError::ZeroDimension);
        }
        if !viewport.usable() {
            return Err(PaintError::InvalidContainer {
                width: viewport.container_size.x,
                height: viewport.container_size.y,
            });
        }
        let container = viewport.container_size;
        let scale = (container.x / iw as f32).min(container.y / ih as f32);
        let display = Vec2::new(
            (iw as f32 * scale).floor().max(1.0),
            (ih as f32 * scale).floor().max(1.0),
        );
        self.geometry = CanvasGeometry::new(display, viewport.dpr(), scale, viewport, true);
        self.binding = Some(BackgroundBinding { image });
        self.resize_surfaces();
        self.paint_image_background();
        crate::log_info!(
            "canvas: locked to {}×{} image, display {}×{}, {}×{} px",
            iw,
            ih,
            display.x,
            display.y,
            self.geometry.pixel_width,
            self.geometry.pixel_height
        );
        Ok(())
    }

    /// Apply a new viewport. Locked canvases only move; unlocked ones are
    /// rebuilt when their pixel size would change.
    pub fn recompute_for_resize(&mut self, viewport: &Viewport) -> PaintResult<ResizeOutcome> {
        if !self.geometry.locked {
            let base = default_display_size(viewport.width);
            let display = Vec2::new(
                base.x.min(viewport.container_size.x),
                base.y.min(viewport.height * MAX_HEIGHT_SHARE).max(1.0),
            );
            let wanted = CanvasGeometry::pixel_size_for(display, viewport.dpr());
            if viewport.usable() && wanted != self.geometry.pixel_size() {
                self.initialize_default(viewport)?;
                return Ok(ResizeOutcome::Reinitialized);
            }
        }
        self.geometry.image_offset =
            centered_offset(viewport.container_size, self.geometry.display_size);
        self.geometry.container_origin = viewport.container_origin;
        Ok(ResizeOutcome::Recentered)
    }

    /// Map a client position to device pixels, clamped to the surface.
    /// Missing or non-finite input returns the last mapped coordinate.
    pub fn to_device_coordinates(&mut self, client: Option<Pos2>) -> Pos2 {
        let Some(p) = client.filter(|p| p.x.is_finite() && p.y.is_finite()) else {
            return self.last_device;
        };
        let rect = self.geometry.bounding_rect();
        if rect.width() <= 0.0 || rect.height() <= 0.0 {
            return self.last_device;
        }
        let pw = self.geometry.pixel_width as f32;
        let ph = self.geometry.pixel_height as f32;
        let x = ((p.x - rect.min.x) / rect.width() * pw).clamp(0.0, pw);
        let y = ((p.y - rect.min.y) / rect.height() * ph).clamp(0.0, ph);
        self.last_device = Pos2::new(x, y);
        self.last_device
    }

    /// Last mapped device coordinate, rounded (cursor readout).
    pub fn cursor_readout(&self) -> (u32, u32) {
        (
            self.last_device.x.round() as u32,
            self.last_device.y.round() as u32,
        )
    }

    pub fn last_device(&self) -> Pos2 {
        self.last_device
    }

    pub fn clear_preview(&mut self) {
        self.preview.clear();
    }

    /// Background + drawing (what gets exported).
    pub fn composite_export(&self) -> RgbaImage {
        self.composite_layers(&[&self.background, &self.drawing])
    }

    /// Background + drawing + preview (what the user sees).
    pub fn composite_display(&self) -> RgbaImage {
        self.composite_layers(&[&self.background, &self.drawing, &self.preview])
    }

    fn composite_layers(&self, layers: &[&TiledImage]) -> RgbaImage {
        let (w, h) = self.geometry.pixel_size();
        let mut out = RgbaImage::new(w, h);
        let stride = w as usize * 4;
        let raw: &mut [u8] = out.as_mut();
        raw.par_chunks_mut(stride).enumerate().for_each(|(y, row)| {
            for x in 0..w as usize {
                let mut px = Rgba([0, 0, 0, 0]);
                for layer in layers {
                    px = source_over(px, *layer.get_pixel(x as u32, y as u32));
                }
                row[x * 4..x * 4 + 4].copy_from_slice(&px.0);
            }
        });
        out
    }

    fn resize_surfaces(&mut self) {
        let (w, h) = self.geometry.pixel_size();
        self.background = TiledImage::new(w, h);
        self.drawing = TiledImage::new(w, h);
        self.preview = TiledImage::new(w, h);
    }

    fn paint_default_background(&mut self) {
        let (w, h) = self.geometry.pixel_size();
        self.background.fill(NEUTRAL_FILL);
        // Stroke of width 2 centered on the rectangle (1, 1, w-2, h-2).
        for y in 0..h {
            for x in 0..w {
                let edge = x < BORDER_WIDTH
                    || y < BORDER_WIDTH
                    || x + BORDER_WIDTH >= w
                    || y + BORDER_WIDTH >= h;
                if edge {
                    self.background.put_pixel(x, y, BORDER_COLOR);
                }
            }
        }
    }

    fn paint_image_background(&mut self) {
        let (w, h) = self.geometry.pixel_size();
        self.background.fill(NEUTRAL_FILL);
        let Some(binding) = &self.binding else { return };
        let scaled = if binding.image.dimensions() == (w, h) {
            (*binding.image).clone()
        } else {
            image::imageops::resize(&*binding.image, w, h, image::imageops::FilterType::Triangle)
        };
        for (x, y, px) in scaled.enumerate_pixels() {
            let dst = *self.background.get_pixel(x, y);
            self.background.put_pixel(x, y, source_over(dst, *px));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport(w: f32, h: f32, dpr: f32) -> Viewport {
        Viewport::new(w, h, dpr)
    }

    #[test]
    fn clone_shares_chunks_until_written() {
        let mut a = TiledImage::new_filled(200, 200, Rgba([1, 2, 3, 255]));
        let b = a.clone();
        assert_eq!(a.shared_chunk_count(&b), a.chunk_count());
        a.put_pixel(0, 0, Rgba([9, 9, 9, 255]));
        assert_eq!(a.shared_chunk_count(&b), a.chunk_count() - 1);
        assert_eq!(b.get_pixel(0, 0), &Rgba([1, 2, 3, 255]));
    }

    #[test]
    fn rgba_round_trip_drops_empty_chunks() {
        let mut src = RgbaImage::new(130, 70);
        src.put_pixel(129, 69, Rgba([10, 20, 30, 255]));
        let tiled = TiledImage::from_rgba_image(&src);
        assert_eq!(tiled.chunk_count(), 1);
        assert_eq!(tiled.to_rgba_image(), src);
    }

    #[test]
    fn destination_out_clears_and_source_over_keeps_opaque_color() {
        let red = Rgba([255, 0, 0, 255]);
        assert_eq!(Composite::SourceOver.apply(Rgba([0, 0, 0, 0]), red), red);
        assert_eq!(Composite::DestinationOut.apply(red, Rgba([0, 0, 0, 255])), Rgba([0, 0, 0, 0]));
        let half = Composite::DestinationOut.apply(red, Rgba([0, 0, 0, 128]));
        assert_eq!(half[3], 127);
    }

    #[test]
    fn default_canvas_follows_breakpoints_and_height_cap() {
        let stack = CanvasStack::new(&viewport(1280.0, 1000.0, 1.0)).unwrap();
        assert_eq!(stack.geometry.display_size, Vec2::new(1024.0, 700.0));
        assert_eq!(stack.geometry.pixel_size(), (1024, 700));

        let stack = CanvasStack::new(&viewport(600.0, 2000.0, 2.0)).unwrap();
        assert_eq!(stack.geometry.display_size, Vec2::new(600.0, 600.0));
        assert_eq!(stack.geometry.pixel_size(), (1200, 1200));

        let stack = CanvasStack::new(&viewport(400.0, 900.0, 1.5)).unwrap();
        assert_eq!(stack.geometry.display_size, Vec2::new(400.0, 300.0));
        assert_eq!(stack.geometry.pixel_size(), (600, 450));
    }

    #[test]
    fn default_background_has_border_and_neutral_fill() {
        let stack = CanvasStack::new(&viewport(400.0, 900.0, 1.0)).unwrap();
        assert_eq!(stack.background.get_pixel(0, 0), &BORDER_COLOR);
        assert_eq!(stack.background.get_pixel(1, 150), &BORDER_COLOR);
        assert_eq!(stack.background.get_pixel(2, 2), &NEUTRAL_FILL);
        assert_eq!(stack.background.get_pixel(398, 150), &BORDER_COLOR);
        assert_eq!(stack.background.get_pixel(397, 150), &NEUTRAL_FILL);
        assert_eq!(stack.drawing.chunk_count(), 0);
    }

    #[test]
    fn zero_container_is_rejected() {
        let mut vp = viewport(1280.0, 800.0, 1.0);
        vp.container_size = Vec2::ZERO;
        assert!(matches!(CanvasStack::new(&vp), Err(PaintError::InvalidContainer { .. })));
    }

    #[test]
    fn lock_fits_image_into_container() {
        let mut vp = viewport(1280.0, 800.0, 2.0);
        vp.container_size = Vec2::new(1000.0, 600.0);
        let mut stack = CanvasStack::new(&vp).unwrap();
        let img = Arc::new(RgbaImage::from_pixel(400, 300, Rgba([0, 128, 0, 255])));
        stack.lock_to_image(img, &vp).unwrap();
        let g = stack.geometry;
        assert!(g.locked);
        assert_eq!(g.scale_factor, 2.0);
        assert_eq!(g.display_size, Vec2::new(800.0, 600.0));
        assert_eq!(g.image_offset, Vec2::new(100.0, 0.0));
        assert_eq!(g.pixel_size(), (1600, 1200));
        assert_eq!(stack.background.get_pixel(800, 600), &Rgba([0, 128, 0, 255]));
    }

    #[test]
    fn locked_resize_only_moves_offsets() {
        let mut vp = viewport(1280.0, 800.0, 1.0);
        vp.container_size = Vec2::new(1000.0, 600.0);
        let mut stack = CanvasStack::new(&vp).unwrap();
        stack
            .lock_to_image(Arc::new(RgbaImage::from_pixel(400, 300, Rgba([5, 5, 5, 255]))), &vp)
            .unwrap();
        stack.drawing.put_pixel(3, 3, Rgba([1, 1, 1, 255]));
        let before = stack.geometry;

        vp.container_size = Vec2::new(1200.0, 700.0);
        let outcome = stack.recompute_for_resize(&vp).unwrap();
        assert_eq!(outcome, ResizeOutcome::Recentered);
        assert_eq!(stack.geometry.pixel_size(), before.pixel_size());
        assert_eq!(stack.geometry.display_size, before.display_size);
        assert_eq!(stack.geometry.image_offset, Vec2::new(200.0, 50.0));
        assert_eq!(stack.drawing.get_pixel(3, 3), &Rgba([1, 1, 1, 255]));
    }

    #[test]
    fn unlocked_resize_rebuilds_only_on_pixel_change() {
        let mut stack = CanvasStack::new(&viewport(1280.0, 1200.0, 1.0)).unwrap();
        stack.drawing.put_pixel(3, 3, Rgba([1, 1, 1, 255]));
        let same = stack.recompute_for_resize(&viewport(1300.0, 1200.0, 1.0)).unwrap();
        assert_eq!(same, ResizeOutcome::Recentered);
        assert_eq!(stack.drawing.chunk_count(), 1);

        let changed = stack.recompute_for_resize(&viewport(700.0, 1200.0, 1.0)).unwrap();
        assert_eq!(changed, ResizeOutcome::Reinitialized);
        assert_eq!(stack.geometry.pixel_size(), (700, 600));
        assert_eq!(stack.drawing.chunk_count(), 0);
    }

    #[test]
    fn device_coordinates_scale_clamp_and_remember() {
        let mut vp = viewport(1280.0, 1200.0, 2.0);
        vp.container_origin = Pos2::new(10.0, 20.0);
        vp.container_size = Vec2::new(1024.0, 768.0);
        let mut stack = CanvasStack::new(&vp).unwrap();
        let p = stack.to_device_coordinates(Some(Pos2::new(20.0, 30.0)));
        assert_eq!(p, Pos2::new(20.0, 20.0));
        let clamped = stack.to_device_coordinates(Some(Pos2::new(-50.0, 5000.0)));
        assert_eq!(clamped, Pos2::new(0.0, 1536.0));
        let last = stack.to_device_coordinates(Some(Pos2::new(f32::NAN, 1.0)));
        assert_eq!(last, clamped);
        assert_eq!(stack.to_device_coordinates(None), clamped);
        assert_eq!(stack.cursor_readout(), (0, 1536));
    }
}
