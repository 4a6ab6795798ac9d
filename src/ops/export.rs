//! PNG export of background + drawing.

use image::RgbaImage;

use crate::canvas::CanvasStack;
use crate::error::PaintResult;
use crate::io::{encode_png, rotate_clockwise, rotate_counter_clockwise};
use crate::ops::text::stamp_watermark;

pub const DEFAULT_WATERMARK: &str = "AI色绘设计助手";
const FILE_PREFIX: &str = "AI绘画_";
const ROTATED_PREFIX: &str = "AI绘画_竖图_";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportOrientation {
    /// Portrait drawings are turned clockwise; landscape ones stay as they are.
    Auto,
    /// Always turned counter-clockwise.
    ForceRotated,
}

/// An encoded export ready for the download sink.
#[derive(Clone, Debug)]
pub struct ExportedImage {
    pub png: Vec<u8>,
    pub filename: String,
    pub width: u32,
    pub height: u32,
    pub rotated: bool,
}

/// Composite, orient and watermark. `watermark = None` skips the stamp.
pub fn render_export(
    stack: &CanvasStack,
    orientation: ExportOrientation,
    watermark: Option<&str>,
) -> (RgbaImage, bool) {
    let flat = stack.composite_export();
    let (img, rotated) = match orientation {
        ExportOrientation::Auto if flat.height() > flat.width() => (rotate_clockwise(&flat), true),
        ExportOrientation::Auto => (flat, false),
        ExportOrientation::ForceRotated => (rotate_counter_clockwise(&flat), true),
    };
    let mut img = img;
    if let Some(text) = watermark
        && !stamp_watermark(&mut img, text)
    {
        crate::log_warn!("export: watermark skipped");
    }
    (img, rotated)
}

pub fn export_png(
    stack: &CanvasStack,
    orientation: ExportOrientation,
    watermark: Option<&str>,
    unix_millis: u128,
) -> PaintResult<ExportedImage> {
    let (img, rotated) = render_export(stack, orientation, watermark);
    let png = encode_png(&img)?;
    let filename = export_filename(orientation, unix_millis);
    crate::log_info!(
        "export: {} ({}×{}, {} bytes)",
        filename,
        img.width(),
        img.height(),
        png.len()
    );
    Ok(ExportedImage { png, filename, width: img.width(), height: img.height(), rotated })
}

pub fn export_filename(orientation: ExportOrientation, unix_millis: u128) -> String {
    let prefix = match orientation {
        ExportOrientation::Auto => FILE_PREFIX,
        ExportOrientation::ForceRotated => ROTATED_PREFIX,
    };
    format!("{prefix}{unix_millis}.png")
}

/// Milliseconds since the Unix epoch (0 if the clock is before it).
pub fn unix_millis_now() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}
