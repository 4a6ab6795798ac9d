pub mod brush;
pub mod export;
pub mod preview;
pub mod prompt;
pub mod scripting;
pub mod text;
