use eframe::egui;
use egui::{Color32, Stroke, Vec2};
use rand::Rng;

pub const DEFAULT_COLOR_HEX: &str = "#233cdf";
pub const DEFAULT_CLEAR_HEX: &str = "#c42323";
/// Pure red is treated as a clear marker alongside the configured clear color.
pub const PURE_RED: Color32 = Color32::from_rgb(0xff, 0x00, 0x00);

const MIN_DISTINCT_DISTANCE: f32 = 150.0;
const MAX_RANDOM_ATTEMPTS: usize = 100;

// ============================================================================
// Palette model
// ============================================================================

/// A named marker color.
#[derive(Clone, Debug, PartialEq)]
pub struct PaletteEntry {
    pub name: String,
    pub color: Color32,
}

impl PaletteEntry {
    pub fn hex(&self) -> String {
        to_hex(self.color)
    }
}

/// Why a color could not be added.
#[derive(Clone, Debug, PartialEq)]
pub enum PaletteRejection {
    EmptyName,
    Duplicate,
}

/// Ordered list of marker colors. Entry 0 is always the reserved clear entry.
#[derive(Clone, Debug)]
pub struct Palette {
    entries: Vec<PaletteEntry>,
    clear_color: Color32,
}

impl Palette {
    pub fn new(clear_color: Color32) -> Self {
        Self {
            entries: vec![PaletteEntry { name: t!("palette.clear"), color: clear_color }],
            clear_color,
        }
    }

    pub fn entries(&self) -> &[PaletteEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&PaletteEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear_color(&self) -> Color32 {
        self.clear_color
    }

    /// Is `color` the reserved clear marker (configured clear color or pure red)?
    pub fn is_clear_color(&self, color: Color32) -> bool {
        same_rgb(color, self.clear_color) || same_rgb(color, PURE_RED)
    }

    pub fn contains_color(&self, color: Color32) -> bool {
        self.entries.iter().any(|e| same_rgb(e.color, color))
    }

    /// Case-insensitive hex lookup (`#AbCdEf`).
    pub fn find_by_hex(&self, hex: &str) -> Option<&PaletteEntry> {
        let wanted = parse_hex(hex)?;
        self.entries.iter().find(|e| same_rgb(e.color, wanted))
    }

    /// Append a named color. Rejects empty names and colors already present.
    pub fn push(&mut self, name: &str, color: Color32) -> Result<usize, PaletteRejection> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PaletteRejection::EmptyName);
        }
        if self.contains_color(color) {
            return Err(PaletteRejection::Duplicate);
        }
        self.entries.push(PaletteEntry { name: name.to_string(), color });
        Ok(self.entries.len() - 1)
    }

    /// Add a generated color under `name`.
    pub fn add_random<R: Rng>(&mut self, name: &str, rng: &mut R) -> Result<usize, PaletteRejection> {
        if name.trim().is_empty() {
            return Err(PaletteRejection::EmptyName);
        }
        let color = self.distinct_random_color(rng);
        self.push(name, color)
    }

    /// A random color at least 150 RGB units from every entry (pure red entries
    /// excepted). Gives up after 100 attempts and returns an unchecked color.
    pub fn distinct_random_color<R: Rng>(&self, rng: &mut R) -> Color32 {
        for _ in 0..MAX_RANDOM_ATTEMPTS {
            let color = random_marker_color(rng);
            if same_rgb(color, PURE_RED) {
                continue;
            }
            let distinct = self
                .entries
                .iter()
                .filter(|e| !same_rgb(e.color, PURE_RED))
                .all(|e| color_distance(color, e.color) >= MIN_DISTINCT_DISTANCE);
            if distinct {
                return color;
            }
        }
        random_marker_color(rng)
    }
}

/// Random saturated mid-lightness color: hue 0–359, saturation 60–89 %, lightness 40–69 %.
pub fn random_marker_color<R: Rng>(rng: &mut R) -> Color32 {
    let hue = rng.gen_range(0..360) as f32;
    let saturation = rng.gen_range(60..90) as f32;
    let lightness = rng.gen_range(40..70) as f32;
    hsl_to_color(hue, saturation, lightness)
}

// -- Colour helpers ---------------------------------------------------

fn same_rgb(a: Color32, b: Color32) -> bool {
    a.r() == b.r() && a.g() == b.g() && a.b() == b.b()
}

/// Euclidean RGB distance.
pub fn color_distance(a: Color32, b: Color32) -> f32 {
    let dr = a.r() as f32 - b.r() as f32;
    let dg = a.g() as f32 - b.g() as f32;
    let db = a.b() as f32 - b.b() as f32;
    (dr * dr + dg * dg + db * db).sqrt()
}

/// `#rrggbb` (lowercase).
pub fn to_hex(c: Color32) -> String {
    format!("#{:02x}{:02x}{:02x}", c.r(), c.g(), c.b())
}

/// Parse `#rrggbb` or `rrggbb`, any case.
pub fn parse_hex(s: &str) -> Option<Color32> {
    let s = s.trim().trim_start_matches('#');
    if s.len() != 6 || !s.is_ascii() {
        return None;
    }
    let r = u8::from_str_radix(&s[0..2], 16).ok()?;
    let g = u8::from_str_radix(&s[2..4], 16).ok()?;
    let b = u8::from_str_radix(&s[4..6], 16).ok()?;
    Some(Color32::from_rgb(r, g, b))
}

/// HSL (degrees, percent, percent) to an opaque color.
pub fn hsl_to_color(h: f32, s: f32, l: f32) -> Color32 {
    let s = s / 100.0;
    let l = l / 100.0;
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = l - c / 2.0;
    let (r, g, b) = match h {
        h if h < 60.0 => (c, x, 0.0),
        h if h < 120.0 => (x, c, 0.0),
        h if h < 180.0 => (0.0, c, x),
        h if h < 240.0 => (0.0, x, c),
        h if h < 300.0 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    Color32::from_rgb(
        ((r + m) * 255.0).round() as u8,
        ((g + m) * 255.0).round() as u8,
        ((b + m) * 255.0).round() as u8,
    )
}

// ============================================================================
// Palette strip widget
// ============================================================================

/// Draw the palette as a row of swatches. Returns the clicked entry index.
pub fn show_palette(ui: &mut egui::Ui, palette: &Palette, current: Color32) -> Option<usize> {
    let mut clicked = None;
    ui.horizontal_wrapped(|ui| {
        for (i, entry) in palette.entries().iter().enumerate() {
            let size = Vec2::new(26.0, 26.0);
            let (rect, resp) = ui.allocate_exact_size(size, egui::Sense::click());
            if ui.is_rect_visible(rect) {
                let p = ui.painter();
                p.rect_filled(rect, 3.0, entry.color);
                let border = if same_rgb(entry.color, current) {
                    Stroke::new(2.0, ui.visuals().selection.stroke.color)
                } else {
                    Stroke::new(1.0, ui.visuals().widgets.noninteractive.bg_stroke.color)
                };
                p.rect_stroke(rect, 3.0, border);
            }
            if resp.on_hover_text(format!("{} {}", entry.name, entry.hex())).clicked() {
                clicked = Some(i);
            }
        }
    });
    clicked
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn hex_parsing_is_case_insensitive() {
        assert_eq!(parse_hex("#C42323"), Some(Color32::from_rgb(0xc4, 0x23, 0x23)));
        assert_eq!(parse_hex("c42323"), parse_hex("#c42323"));
        assert_eq!(parse_hex("#12345"), None);
        assert_eq!(to_hex(Color32::from_rgb(0x23, 0x3c, 0xdf)), DEFAULT_COLOR_HEX);
    }

    #[test]
    fn hsl_primaries() {
        assert_eq!(hsl_to_color(0.0, 100.0, 50.0), Color32::from_rgb(255, 0, 0));
        assert_eq!(hsl_to_color(120.0, 100.0, 50.0), Color32::from_rgb(0, 255, 0));
        assert_eq!(hsl_to_color(240.0, 100.0, 50.0), Color32::from_rgb(0, 0, 255));
    }

    #[test]
    fn palette_starts_with_clear_entry_and_treats_red_as_clear() {
        let p = Palette::new(parse_hex(DEFAULT_CLEAR_HEX).unwrap());
        assert_eq!(p.len(), 1);
        assert!(p.is_clear_color(p.entries()[0].color));
        assert!(p.is_clear_color(PURE_RED));
        assert!(!p.is_clear_color(parse_hex(DEFAULT_COLOR_HEX).unwrap()));
    }

    #[test]
    fn push_rejects_empty_names_and_duplicates() {
        let mut p = Palette::new(PURE_RED);
        assert_eq!(p.push("  ", Color32::BLUE), Err(PaletteRejection::EmptyName));
        assert_eq!(p.push("sky", Color32::BLUE), Ok(1));
        assert_eq!(p.push("sea", Color32::BLUE), Err(PaletteRejection::Duplicate));
        assert_eq!(p.find_by_hex("#0000FF").map(|e| e.name.as_str()), Some("sky"));
    }

    #[test]
    fn random_colors_keep_their_distance() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut p = Palette::new(parse_hex(DEFAULT_CLEAR_HEX).unwrap());
        p.add_random("tree", &mut rng).unwrap();
        p.add_random("cloud", &mut rng).unwrap();
        let new = p.distinct_random_color(&mut rng);
        // With three entries there is plenty of room, so the checked branch wins.
        for e in p.entries() {
            assert!(color_distance(new, e.color) >= MIN_DISTINCT_DISTANCE);
        }
    }
}
