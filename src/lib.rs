//! PromptCanvas: a paint canvas for marking up reference images with named
//! colors and turning the marks into an image-editing prompt.

#![allow(clippy::too_many_arguments)]

#[macro_use]
pub mod i18n;
pub mod logger;

pub mod app;
pub mod canvas;
pub mod cli;
pub mod components;
pub mod error;
pub mod host;
pub mod io;
pub mod ops;
pub mod session;
pub mod settings;
pub mod timer;

pub use error::{PaintError, PaintResult};
pub use session::PaintSession;
