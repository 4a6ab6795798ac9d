use image::codecs::png::PngEncoder;
use image::{ImageEncoder, ImageFormat, RgbaImage};
use rfd::FileDialog;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use crate::error::{PaintError, PaintResult};

/// Formats accepted for upload.
pub const UPLOAD_FORMATS: &[ImageFormat] =
    &[ImageFormat::Png, ImageFormat::Jpeg, ImageFormat::WebP, ImageFormat::Bmp];

/// File extensions offered by the upload dialog.
pub const UPLOAD_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "bmp"];

pub const PNG_MIME: &str = "image/png";

// ============================================================================
// DECODE
// ============================================================================

/// Decode uploaded bytes to RGBA. The format is sniffed from the content,
/// never from a file name.
pub fn decode_upload(bytes: &[u8]) -> PaintResult<RgbaImage> {
    let format = image::guess_format(bytes).map_err(|_| PaintError::NotAnImage)?;
    if !UPLOAD_FORMATS.contains(&format) {
        return Err(PaintError::NotAnImage);
    }
    let img = image::load_from_memory_with_format(bytes, format)?.to_rgba8();
    if img.width() == 0 || img.height() == 0 {
        return Err(PaintError::ZeroDimension);
    }
    Ok(img)
}

/// 90° clockwise (import rotation, portrait export).
pub fn rotate_clockwise(img: &RgbaImage) -> RgbaImage {
    image::imageops::rotate90(img)
}

/// 90° counter-clockwise (forced rotated export).
pub fn rotate_counter_clockwise(img: &RgbaImage) -> RgbaImage {
    image::imageops::rotate270(img)
}

/// Read and decode an image file, optionally rotating it on import.
pub fn load_upload_file(path: &Path, rotate: bool) -> PaintResult<RgbaImage> {
    let bytes = std::fs::read(path)?;
    let img = decode_upload(&bytes)?;
    Ok(if rotate { rotate_clockwise(&img) } else { img })
}

// ============================================================================
// ENCODE
// ============================================================================

pub fn encode_png(img: &RgbaImage) -> PaintResult<Vec<u8>> {
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(img.as_raw(), img.width(), img.height(), image::ColorType::Rgba8)
        .map_err(|e| PaintError::Encode(e.to_string()))?;
    Ok(out)
}

/// Encode and write a PNG to disk.
pub fn write_png(img: &RgbaImage, path: &Path) -> PaintResult<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    PngEncoder::new(&mut writer)
        .write_image(img.as_raw(), img.width(), img.height(), image::ColorType::Rgba8)
        .map_err(|e| PaintError::Encode(e.to_string()))?;
    Ok(())
}

// ============================================================================
// DIALOGS & BACKGROUND DECODE (GUI)
// ============================================================================

/// Native dialog for picking a reference image.
pub fn pick_upload_path() -> Option<PathBuf> {
    FileDialog::new()
        .add_filter("Images", UPLOAD_EXTENSIONS)
        .add_filter("All Files", &["*"])
        .pick_file()
}

/// Native dialog for choosing where an export goes.
pub fn pick_save_path(suggested_name: &str) -> Option<PathBuf> {
    FileDialog::new()
        .add_filter("PNG", &["png"])
        .set_file_name(suggested_name)
        .save_file()
}

/// Result of a background decode.
pub struct DecodedUpload {
    pub path: PathBuf,
    pub result: PaintResult<RgbaImage>,
}

/// A decode running on a worker thread. The result is collected on the
/// thread that owns the session.
pub struct PendingUpload {
    receiver: mpsc::Receiver<DecodedUpload>,
}

impl PendingUpload {
    pub fn spawn(path: PathBuf, rotate: bool) -> Self {
        let (sender, receiver) = mpsc::channel();
        std::thread::spawn(move || {
            let result = load_upload_file(&path, rotate);
            if let Err(e) = &result {
                crate::log_warn!("upload: {} failed to decode: {}", path.display(), e);
            }
            let _ = sender.send(DecodedUpload { path, result });
        });
        Self { receiver }
    }

    /// Non-blocking. `Some` once the worker is done (or died).
    pub fn poll(&self) -> Option<DecodedUpload> {
        match self.receiver.try_recv() {
            Ok(done) => Some(done),
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => Some(DecodedUpload {
                path: PathBuf::new(),
                result: Err(PaintError::Decode("decoder thread exited".into())),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn sample() -> RgbaImage {
        let mut img = RgbaImage::from_pixel(4, 2, Rgba([10, 20, 30, 255]));
        img.put_pixel(3, 0, Rgba([200, 0, 0, 255]));
        img
    }

    #[test]
    fn png_bytes_decode() {
        let bytes = encode_png(&sample()).unwrap();
        let back = decode_upload(&bytes).unwrap();
        assert_eq!(back.dimensions(), (4, 2));
        assert_eq!(back.get_pixel(3, 0), &Rgba([200, 0, 0, 255]));
    }

    #[test]
    fn text_is_not_an_image() {
        assert!(matches!(decode_upload(b"hello, world"), Err(PaintError::NotAnImage)));
        assert!(matches!(decode_upload(b""), Err(PaintError::NotAnImage)));
    }

    #[test]
    fn unsupported_formats_are_rejected() {
        assert!(matches!(decode_upload(b"GIF89a\x01\x00\x01\x00"), Err(PaintError::NotAnImage)));
    }

    #[test]
    fn truncated_png_fails_to_decode() {
        let bytes = encode_png(&sample()).unwrap();
        let err = decode_upload(&bytes[..bytes.len() / 2]).unwrap_err();
        assert!(matches!(err, PaintError::Decode(_)));
    }

    #[test]
    fn rotations_swap_dimensions() {
        let img = sample();
        let cw = rotate_clockwise(&img);
        assert_eq!(cw.dimensions(), (2, 4));
        // Top-right pixel ends up bottom-right after a clockwise turn.
        assert_eq!(cw.get_pixel(1, 3), &Rgba([200, 0, 0, 255]));
        let ccw = rotate_counter_clockwise(&img);
        assert_eq!(ccw.get_pixel(0, 0), &Rgba([200, 0, 0, 255]));
    }
}
