use thiserror::Error;

/// Errors surfaced by the paint engine and its front ends.
#[derive(Debug, Error)]
pub enum PaintError {
    #[error("canvas container has no usable size ({width}×{height})")]
    InvalidContainer { width: f32, height: f32 },
    #[error("not an image file")]
    NotAnImage,
    #[error("could not decode image: {0}")]
    Decode(String),
    #[error("image has zero width or height")]
    ZeroDimension,
    #[error("could not encode image: {0}")]
    Encode(String),
    #[error("snapshot of a {width}×{height} surface is empty")]
    EmptySnapshot { width: u32, height: u32 },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("script error: {0}")]
    Script(String),
    #[error("prompt shelf error: {0}")]
    Shelf(String),
}

pub type PaintResult<T> = Result<T, PaintError>;

impl From<image::ImageError> for PaintError {
    fn from(e: image::ImageError) -> Self {
        match e {
            image::ImageError::Unsupported(_) => PaintError::NotAnImage,
            image::ImageError::Encoding(enc) => PaintError::Encode(enc.to_string()),
            other => PaintError::Decode(other.to_string()),
        }
    }
}
