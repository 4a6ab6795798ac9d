use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::canvas::TiledImage;
use crate::components::colors::{Palette, to_hex};
use crate::error::{PaintError, PaintResult};

/// Pixels at or below this alpha are not marks.
const MARK_ALPHA_THRESHOLD: u8 = 128;
/// All three channels above this count as near-white.
const NEAR_WHITE: u8 = 240;

pub const SHELF_CAPACITY: usize = 10;
const SHELF_MAGIC: &str = "PCS1";
/// Characters shown per entry in the shelf list.
const SHELF_PREVIEW_CHARS: usize = 80;

// ============================================================================
// COLOR DETECTION
// ============================================================================

/// A palette color found on the drawing layer.
#[derive(Clone, Debug, PartialEq)]
pub struct UsedColor {
    pub name: String,
    pub hex: String,
    pub is_clear: bool,
}

/// Palette colors present on `drawing`, in order of first appearance in a
/// row-major scan.
pub fn detect_canvas_colors(drawing: &TiledImage, palette: &Palette) -> Vec<UsedColor> {
    let lookup: HashMap<[u8; 3], usize> = palette
        .entries()
        .iter()
        .enumerate()
        .rev()
        .map(|(i, e)| ([e.color.r(), e.color.g(), e.color.b()], i))
        .collect();

    let width = drawing.width();
    // First-seen palette indices per row, merged in row order below.
    let per_row: Vec<Vec<usize>> = (0..drawing.height())
        .into_par_iter()
        .map(|y| {
            let mut seen = Vec::new();
            for x in 0..width {
                let px = drawing.get_pixel(x, y);
                if px[3] <= MARK_ALPHA_THRESHOLD {
                    continue;
                }
                if px[0] > NEAR_WHITE && px[1] > NEAR_WHITE && px[2] > NEAR_WHITE {
                    continue;
                }
                if let Some(&idx) = lookup.get(&[px[0], px[1], px[2]])
                    && !seen.contains(&idx)
                {
                    seen.push(idx);
                }
            }
            seen
        })
        .collect();

    let mut order: Vec<usize> = Vec::new();
    for idx in per_row.into_iter().flatten() {
        if !order.contains(&idx) {
            order.push(idx);
        }
    }

    order
        .into_iter()
        .filter_map(|i| palette.get(i))
        .map(|e| UsedColor {
            name: e.name.clone(),
            hex: e.hex(),
            is_clear: palette.is_clear_color(e.color),
        })
        .collect()
}

// ============================================================================
// PROMPT TEXT
// ============================================================================

/// Prompt text for the detected marks. The clear fragment comes first and
/// appears once. `None` when there are no marks.
pub fn build_prompt(used: &[UsedColor], palette: &Palette) -> Option<String> {
    let mut fragments = Vec::new();
    if used.iter().any(|c| c.is_clear) {
        fragments.push(t!("prompt.clear_region", hex = to_hex(palette.clear_color())));
    }
    for c in used.iter().filter(|c| !c.is_clear) {
        fragments.push(t!("prompt.add_region", hex = c.hex, name = c.name));
    }
    if fragments.is_empty() {
        return None;
    }
    Some(format!(
        "{}{}",
        fragments.join(&t!("prompt.separator")),
        t!("prompt.terminator")
    ))
}

// ============================================================================
// SAVED PROMPT SHELF
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SavedPrompt {
    pub text: String,
    pub saved_at_unix_ms: u64,
}

impl SavedPrompt {
    /// The first 80 characters, with an ellipsis when cut.
    pub fn preview(&self) -> String {
        let mut chars = self.text.chars();
        let head: String = chars.by_ref().take(SHELF_PREVIEW_CHARS).collect();
        if chars.next().is_some() { format!("{head}...") } else { head }
    }
}

#[derive(Serialize, Deserialize)]
struct ShelfFile {
    magic: String,
    prompts: Vec<SavedPrompt>,
}

/// The most recent saved prompts, oldest first.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PromptShelf {
    prompts: VecDeque<SavedPrompt>,
}

impl PromptShelf {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `text` (trimmed). Returns false for an empty prompt.
    pub fn push(&mut self, text: &str, saved_at_unix_ms: u64) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        self.prompts.push_back(SavedPrompt { text: text.to_string(), saved_at_unix_ms });
        while self.prompts.len() > SHELF_CAPACITY {
            self.prompts.pop_front();
        }
        true
    }

    pub fn prompts(&self) -> impl DoubleEndedIterator<Item = &SavedPrompt> + ExactSizeIterator {
        self.prompts.iter()
    }

    pub fn get(&self, index: usize) -> Option<&SavedPrompt> {
        self.prompts.get(index)
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    /// `<data dir>/PromptCanvas/saved_prompts.bin`
    pub fn default_path() -> PathBuf {
        crate::logger::data_dir().join("PromptCanvas").join("saved_prompts.bin")
    }

    pub fn save_to(&self, path: &Path) -> PaintResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = ShelfFile {
            magic: SHELF_MAGIC.to_string(),
            prompts: self.prompts.iter().cloned().collect(),
        };
        let writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(writer, &file).map_err(|e| PaintError::Shelf(e.to_string()))
    }

    pub fn load_from(path: &Path) -> PaintResult<Self> {
        let reader = BufReader::new(File::open(path)?);
        let file: ShelfFile =
            bincode::deserialize_from(reader).map_err(|e| PaintError::Shelf(e.to_string()))?;
        if file.magic != SHELF_MAGIC {
            return Err(PaintError::Shelf(format!("unknown magic '{}'", file.magic)));
        }
        let mut shelf = Self::new();
        for p in file.prompts {
            shelf.push(&p.text, p.saved_at_unix_ms);
        }
        Ok(shelf)
    }

    /// Load from `path`, falling back to an empty shelf.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load_from(path) {
            Ok(shelf) => shelf,
            Err(PaintError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Self::new(),
            Err(e) => {
                crate::log_warn!("prompt shelf: {} unreadable: {}", path.display(), e);
                Self::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::colors::{DEFAULT_CLEAR_HEX, parse_hex};
    use eframe::egui::Color32;
    use image::Rgba;

    fn palette() -> Palette {
        let mut p = Palette::new(parse_hex(DEFAULT_CLEAR_HEX).unwrap());
        p.push("tree", Color32::from_rgb(0x23, 0x3c, 0xdf)).unwrap();
        p.push("lake", Color32::from_rgb(0x10, 0xa0, 0x30)).unwrap();
        p
    }

    fn rgba(c: Color32, a: u8) -> Rgba<u8> {
        Rgba([c.r(), c.g(), c.b(), a])
    }

    #[test]
    fn detection_keeps_first_appearance_order() {
        let p = palette();
        let mut drawing = TiledImage::new(100, 100);
        drawing.put_pixel(50, 10, rgba(p.entries()[2].color, 255));
        drawing.put_pixel(5, 20, rgba(p.entries()[1].color, 255));
        drawing.put_pixel(0, 30, rgba(p.entries()[2].color, 255));
        let used = detect_canvas_colors(&drawing, &p);
        let names: Vec<&str> = used.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["lake", "tree"]);
    }

    #[test]
    fn faint_white_and_unknown_pixels_are_ignored() {
        let p = palette();
        let mut drawing = TiledImage::new(10, 10);
        drawing.put_pixel(0, 0, rgba(p.entries()[1].color, 128));
        drawing.put_pixel(1, 0, Rgba([250, 250, 250, 255]));
        drawing.put_pixel(2, 0, Rgba([1, 2, 3, 255]));
        assert!(detect_canvas_colors(&drawing, &p).is_empty());
        assert_eq!(build_prompt(&[], &p), None);
    }

    #[test]
    fn clear_fragment_leads_the_prompt() {
        crate::i18n::set_language("en");
        let p = palette();
        let used = vec![
            UsedColor { name: "tree".into(), hex: "#233cdf".into(), is_clear: false },
            UsedColor { name: "Clear".into(), hex: "#c42323".into(), is_clear: true },
        ];
        let text = build_prompt(&used, &p).unwrap();
        assert!(text.starts_with(&t!("prompt.clear_region", hex = "#c42323")));
        assert!(text.contains("#233cdf"));
        assert!(text.contains("tree"));
        assert!(text.ends_with(&t!("prompt.terminator")));
    }

    #[test]
    fn shelf_keeps_the_ten_newest() {
        let mut shelf = PromptShelf::new();
        assert!(!shelf.push("   ", 0));
        for i in 0..12 {
            shelf.push(&format!("prompt {i}"), i);
        }
        assert_eq!(shelf.len(), SHELF_CAPACITY);
        assert_eq!(shelf.get(0).map(|p| p.text.as_str()), Some("prompt 2"));

        // Newest first, indices still addressing `get`.
        let listed: Vec<(usize, &str)> =
            shelf.prompts().enumerate().rev().map(|(i, p)| (i, p.text.as_str())).take(2).collect();
        assert_eq!(listed, [(9, "prompt 11"), (8, "prompt 10")]);
    }

    #[test]
    fn shelf_survives_a_save_and_load() {
        let dir = std::env::temp_dir().join(format!("promptcanvas-shelf-{}", uuid::Uuid::new_v4()));
        let path = dir.join("shelf.bin");
        let mut shelf = PromptShelf::new();
        shelf.push("add tree in the #233cdf region.", 1_700_000_000_000);
        shelf.save_to(&path).unwrap();
        assert_eq!(PromptShelf::load_from(&path).unwrap(), shelf);
        let _ = std::fs::remove_dir_all(&dir);
        assert!(PromptShelf::load_or_default(&path).is_empty());
    }

    #[test]
    fn long_prompts_are_cut_in_the_preview() {
        let p = SavedPrompt { text: "x".repeat(81), saved_at_unix_ms: 0 };
        assert_eq!(p.preview().chars().count(), 83);
        let short = SavedPrompt { text: "abc".into(), saved_at_unix_ms: 0 };
        assert_eq!(short.preview(), "abc");
    }
}
