use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use eframe::egui;

use crate::components::colors::{parse_hex, DEFAULT_CLEAR_HEX, DEFAULT_COLOR_HEX};
use crate::components::history::HistoryLimits;
use crate::components::lasso::LassoConfig;

// ═══════════════════════════════════════════════════════════════════════════
// KEYBINDINGS
// ═══════════════════════════════════════════════════════════════════════════

/// A single key combination (modifier flags + optional key + optional text char)
#[derive(Clone, Debug, PartialEq)]
pub struct KeyCombo {
    pub ctrl: bool,
    pub shift: bool,
    /// The egui key (for named keys like B, Z, ArrowUp)
    pub key: Option<egui::Key>,
    /// Text character (for keys not in egui::Key, like [ ])
    pub text_char: Option<String>,
}

impl KeyCombo {
    pub fn key(k: egui::Key) -> Self {
        Self { ctrl: false, shift: false, key: Some(k), text_char: None }
    }
    pub fn ctrl_key(k: egui::Key) -> Self {
        Self { ctrl: true, shift: false, key: Some(k), text_char: None }
    }
    pub fn ctrl_shift_key(k: egui::Key) -> Self {
        Self { ctrl: true, shift: true, key: Some(k), text_char: None }
    }
    pub fn text(s: &str) -> Self {
        Self { ctrl: false, shift: false, key: None, text_char: Some(s.to_string()) }
    }

    /// Does a key press match this combo? Plain (non-ctrl) combos ignore Shift
    /// so a held line-snap modifier does not swallow tool hotkeys.
    pub fn matches_key(&self, key: egui::Key, modifiers: egui::Modifiers) -> bool {
        let ctrl = modifiers.ctrl || modifiers.command;
        if self.key != Some(key) || self.ctrl != ctrl {
            return false;
        }
        (!self.ctrl && !self.shift) || self.shift == modifiers.shift
    }

    pub fn matches_text(&self, text: &str) -> bool {
        self.text_char.as_deref() == Some(text)
    }

    /// Human-readable display string
    pub fn display(&self) -> String {
        let mut parts = Vec::new();
        if self.ctrl { parts.push("Ctrl"); }
        if self.shift { parts.push("Shift"); }
        if let Some(k) = self.key {
            parts.push(key_name(k));
        } else if let Some(ref t) = self.text_char {
            parts.push(t.as_str());
        }
        parts.join("+")
    }

    /// Serialize to config string
    pub fn to_config_string(&self) -> String {
        let mut parts = Vec::new();
        if self.ctrl { parts.push("ctrl".to_string()); }
        if self.shift { parts.push("shift".to_string()); }
        if let Some(k) = self.key {
            parts.push(format!("key:{}", key_name(k)));
        } else if let Some(ref t) = self.text_char {
            parts.push(format!("text:{}", t));
        }
        parts.join("+")
    }

    /// Deserialize from config string
    pub fn from_config_string(s: &str) -> Option<Self> {
        let mut combo = Self { ctrl: false, shift: false, key: None, text_char: None };
        for part in s.split('+') {
            let part = part.trim();
            match part {
                "ctrl" => combo.ctrl = true,
                "shift" => combo.shift = true,
                _ => {
                    if let Some(name) = part.strip_prefix("key:") {
                        combo.key = parse_key_name(name);
                    } else if let Some(text) = part.strip_prefix("text:") {
                        combo.text_char = Some(text.to_string());
                    }
                }
            }
        }
        if combo.key.is_some() || combo.text_char.is_some() {
            Some(combo)
        } else {
            None
        }
    }
}

/// All bindable actions
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BindableAction {
    ToolBrush,
    ToolEraser,
    ToolLine,
    ToolLasso,
    Undo,
    Redo,
    RedoAlt,
    BrushSizeIncrease,
    BrushSizeIncreaseAlt,
    BrushSizeDecrease,
    BrushSizeDecreaseAlt,
}

impl BindableAction {
    pub fn all() -> &'static [BindableAction] {
        use BindableAction::*;
        &[
            ToolBrush, ToolEraser, ToolLine, ToolLasso,
            Undo, Redo, RedoAlt,
            BrushSizeIncrease, BrushSizeIncreaseAlt,
            BrushSizeDecrease, BrushSizeDecreaseAlt,
        ]
    }

    fn from_config_name(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|a| format!("{:?}", a) == name)
    }
}

/// Keybinding map
#[derive(Clone, Debug)]
pub struct KeyBindings {
    pub bindings: HashMap<BindableAction, KeyCombo>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        use BindableAction::*;
        use egui::Key;
        let mut map = HashMap::new();
        map.insert(ToolBrush,            KeyCombo::key(Key::B));
        map.insert(ToolEraser,           KeyCombo::key(Key::E));
        map.insert(ToolLine,             KeyCombo::key(Key::L));
        map.insert(ToolLasso,            KeyCombo::key(Key::O));
        map.insert(Undo,                 KeyCombo::ctrl_key(Key::Z));
        map.insert(Redo,                 KeyCombo::ctrl_key(Key::Y));
        map.insert(RedoAlt,              KeyCombo::ctrl_shift_key(Key::Z));
        map.insert(BrushSizeIncrease,    KeyCombo::key(Key::ArrowUp));
        map.insert(BrushSizeIncreaseAlt, KeyCombo::text("]"));
        map.insert(BrushSizeDecrease,    KeyCombo::key(Key::ArrowDown));
        map.insert(BrushSizeDecreaseAlt, KeyCombo::text("["));
        Self { bindings: map }
    }
}

impl KeyBindings {
    pub fn get(&self, action: BindableAction) -> Option<&KeyCombo> {
        self.bindings.get(&action)
    }

    pub fn set(&mut self, action: BindableAction, combo: KeyCombo) {
        self.bindings.insert(action, combo);
    }

    /// First action bound to this key press.
    pub fn action_for_key(&self, key: egui::Key, modifiers: egui::Modifiers) -> Option<BindableAction> {
        BindableAction::all()
            .iter()
            .copied()
            .find(|a| self.get(*a).is_some_and(|c| c.matches_key(key, modifiers)))
    }

    pub fn action_for_text(&self, text: &str) -> Option<BindableAction> {
        BindableAction::all()
            .iter()
            .copied()
            .find(|a| self.get(*a).is_some_and(|c| c.matches_text(text)))
    }

    /// Serialize all bindings for config file
    pub fn to_config_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for action in BindableAction::all() {
            if let Some(combo) = self.bindings.get(action) {
                lines.push(format!("keybind.{:?}={}", action, combo.to_config_string()));
            }
        }
        lines
    }

    /// Load a single keybind line from config
    pub fn load_config_line(&mut self, action_name: &str, combo_str: &str) {
        if let Some(action) = BindableAction::from_config_name(action_name)
            && let Some(combo) = KeyCombo::from_config_string(combo_str)
        {
            self.bindings.insert(action, combo);
        }
    }
}

/// Convert egui::Key to display / config name
fn key_name(k: egui::Key) -> &'static str {
    match k {
        egui::Key::ArrowDown => "Down",
        egui::Key::ArrowLeft => "Left",
        egui::Key::ArrowRight => "Right",
        egui::Key::ArrowUp => "Up",
        egui::Key::Escape => "Esc",
        egui::Key::Backspace => "Backspace",
        egui::Key::Enter => "Enter",
        egui::Key::Delete => "Delete",
        egui::Key::A => "A", egui::Key::B => "B", egui::Key::C => "C",
        egui::Key::D => "D", egui::Key::E => "E", egui::Key::F => "F",
        egui::Key::G => "G", egui::Key::H => "H", egui::Key::I => "I",
        egui::Key::J => "J", egui::Key::K => "K", egui::Key::L => "L",
        egui::Key::M => "M", egui::Key::N => "N", egui::Key::O => "O",
        egui::Key::P => "P", egui::Key::Q => "Q", egui::Key::R => "R",
        egui::Key::S => "S", egui::Key::T => "T", egui::Key::U => "U",
        egui::Key::V => "V", egui::Key::W => "W", egui::Key::X => "X",
        egui::Key::Y => "Y", egui::Key::Z => "Z",
        _ => "?",
    }
}

/// Parse a key name string back to egui::Key
pub fn parse_key_name(s: &str) -> Option<egui::Key> {
    match s {
        "Down" | "ArrowDown" => Some(egui::Key::ArrowDown),
        "Left" | "ArrowLeft" => Some(egui::Key::ArrowLeft),
        "Right" | "ArrowRight" => Some(egui::Key::ArrowRight),
        "Up" | "ArrowUp" => Some(egui::Key::ArrowUp),
        "Esc" | "Escape" => Some(egui::Key::Escape),
        "Backspace" => Some(egui::Key::Backspace),
        "Enter" => Some(egui::Key::Enter),
        "Delete" => Some(egui::Key::Delete),
        "A" | "a" => Some(egui::Key::A), "B" | "b" => Some(egui::Key::B),
        "C" | "c" => Some(egui::Key::C), "D" | "d" => Some(egui::Key::D),
        "E" | "e" => Some(egui::Key::E), "F" | "f" => Some(egui::Key::F),
        "G" | "g" => Some(egui::Key::G), "H" | "h" => Some(egui::Key::H),
        "I" | "i" => Some(egui::Key::I), "J" | "j" => Some(egui::Key::J),
        "K" | "k" => Some(egui::Key::K), "L" | "l" => Some(egui::Key::L),
        "M" | "m" => Some(egui::Key::M), "N" | "n" => Some(egui::Key::N),
        "O" | "o" => Some(egui::Key::O), "P" | "p" => Some(egui::Key::P),
        "Q" | "q" => Some(egui::Key::Q), "R" | "r" => Some(egui::Key::R),
        "S" | "s" => Some(egui::Key::S), "T" | "t" => Some(egui::Key::T),
        "U" | "u" => Some(egui::Key::U), "V" | "v" => Some(egui::Key::V),
        "W" | "w" => Some(egui::Key::W), "X" | "x" => Some(egui::Key::X),
        "Y" | "y" => Some(egui::Key::Y), "Z" | "z" => Some(egui::Key::Z),
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// PERSISTED SETTINGS
// ═══════════════════════════════════════════════════════════════════════════

/// Settings that persist across sessions.
#[derive(Clone, Debug)]
pub struct PaintSettings {
    /// Language code. Empty string = auto-detect.
    pub language: String,
    pub brush_size: u32,
    pub default_color: String,
    pub clear_color: String,
    /// 0 = use the host's reported device pixel ratio.
    pub device_pixel_ratio: f32,
    pub lasso_min_vertices: usize,
    pub lasso_dedupe_radius: f32,
    pub lasso_close_radius: f32,
    pub lasso_idle_ms: u64,
    pub resize_debounce_ms: u64,
    pub undo_cap: usize,
    pub undo_floor: usize,
    pub redo_cap: usize,
    pub watermark_text: String,
    pub watermark_enabled: bool,
    /// Viewport width at or below which the compact layout applies.
    pub compact_breakpoint: f32,
    pub keybindings: KeyBindings,
}

impl Default for PaintSettings {
    fn default() -> Self {
        Self {
            language: String::new(),
            brush_size: 20,
            default_color: DEFAULT_COLOR_HEX.to_string(),
            clear_color: DEFAULT_CLEAR_HEX.to_string(),
            device_pixel_ratio: 0.0,
            lasso_min_vertices: 3,
            lasso_dedupe_radius: 10.0,
            lasso_close_radius: 10.0,
            lasso_idle_ms: 2800,
            resize_debounce_ms: 250,
            undo_cap: 10,
            undo_floor: 5,
            redo_cap: 5,
            watermark_text: "AI色绘设计助手".to_string(),
            watermark_enabled: true,
            compact_breakpoint: 480.0,
            keybindings: KeyBindings::default(),
        }
    }
}

impl PaintSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/promptcanvas/promptcanvas_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\PromptCanvas\promptcanvas_settings.cfg
    /// On macOS:   ~/Library/Application Support/PromptCanvas/promptcanvas_settings.cfg
    pub(crate) fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("promptcanvas");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("promptcanvas_settings.cfg"));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .ok()?;
            let config_dir = PathBuf::from(appdata).join("PromptCanvas");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("promptcanvas_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
            let config_dir = PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("PromptCanvas");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("promptcanvas_settings.cfg"));
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|d| d.join("promptcanvas_settings.cfg")))
        }
    }

    pub fn to_config_string(&self) -> String {
        let mut content = format!(
            "language={}\n\
             brush_size={}\n\
             default_color={}\n\
             clear_color={}\n\
             device_pixel_ratio={}\n\
             lasso_min_vertices={}\n\
             lasso_dedupe_radius={}\n\
             lasso_close_radius={}\n\
             lasso_idle_ms={}\n\
             resize_debounce_ms={}\n\
             undo_cap={}\n\
             undo_floor={}\n\
             redo_cap={}\n\
             watermark_text={}\n\
             watermark_enabled={}\n\
             compact_breakpoint={}\n",
            self.language,
            self.brush_size,
            self.default_color,
            self.clear_color,
            self.device_pixel_ratio,
            self.lasso_min_vertices,
            self.lasso_dedupe_radius,
            self.lasso_close_radius,
            self.lasso_idle_ms,
            self.resize_debounce_ms,
            self.undo_cap,
            self.undo_floor,
            self.redo_cap,
            self.watermark_text,
            self.watermark_enabled,
            self.compact_breakpoint,
        );
        for line in self.keybindings.to_config_lines() {
            content.push_str(&line);
            content.push('\n');
        }
        content
    }

    /// Parse settings text; unknown keys and unparsable values keep defaults.
    pub fn from_config_str(content: &str) -> Self {
        let d = Self::default();
        let mut s = Self::default();
        for line in content.lines() {
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            match key {
                "language" => s.language = val.to_string(),
                "brush_size" => {
                    s.brush_size = val.parse::<u32>().unwrap_or(d.brush_size).clamp(1, 100);
                }
                "default_color" => {
                    if parse_hex(val).is_some() { s.default_color = val.to_string(); }
                }
                "clear_color" => {
                    if parse_hex(val).is_some() { s.clear_color = val.to_string(); }
                }
                "device_pixel_ratio" => {
                    s.device_pixel_ratio = val.parse().unwrap_or(d.device_pixel_ratio);
                }
                "lasso_min_vertices" => {
                    s.lasso_min_vertices = val.parse::<usize>().unwrap_or(d.lasso_min_vertices).max(3);
                }
                "lasso_dedupe_radius" => {
                    s.lasso_dedupe_radius = val.parse().unwrap_or(d.lasso_dedupe_radius);
                }
                "lasso_close_radius" => {
                    s.lasso_close_radius = val.parse().unwrap_or(d.lasso_close_radius);
                }
                "lasso_idle_ms" => s.lasso_idle_ms = val.parse().unwrap_or(d.lasso_idle_ms),
                "resize_debounce_ms" => {
                    s.resize_debounce_ms = val.parse().unwrap_or(d.resize_debounce_ms);
                }
                "undo_cap" => s.undo_cap = val.parse().unwrap_or(d.undo_cap),
                "undo_floor" => s.undo_floor = val.parse().unwrap_or(d.undo_floor),
                "redo_cap" => s.redo_cap = val.parse().unwrap_or(d.redo_cap),
                "watermark_text" => s.watermark_text = val.to_string(),
                "watermark_enabled" => s.watermark_enabled = val == "true",
                "compact_breakpoint" => {
                    s.compact_breakpoint = val.parse().unwrap_or(d.compact_breakpoint);
                }
                _ => {
                    if let Some(action_name) = key.strip_prefix("keybind.") {
                        s.keybindings.load_config_line(action_name, val);
                    }
                }
            }
        }
        s
    }

    /// Save settings to disk
    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        if let Err(e) = std::fs::write(&path, self.to_config_string()) {
            crate::log_warn!("settings: could not write {}: {}", path.display(), e);
        }
    }

    /// Load settings from disk (returns default if file missing or corrupt)
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else { return Self::default() };
        let Ok(content) = std::fs::read_to_string(&path) else { return Self::default() };
        Self::from_config_str(&content)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// ENGINE CONFIG
// ═══════════════════════════════════════════════════════════════════════════

/// The subset of settings a [`crate::session::PaintSession`] is built with.
#[derive(Clone, Debug)]
pub struct PaintConfig {
    pub brush_size: u32,
    pub default_color: egui::Color32,
    pub clear_color: egui::Color32,
    pub device_pixel_ratio: Option<f32>,
    pub lasso: LassoConfig,
    pub history: HistoryLimits,
    pub resize_debounce: Duration,
    /// `None` disables the export watermark.
    pub watermark: Option<String>,
    pub compact_breakpoint: f32,
    pub keybindings: KeyBindings,
}

impl Default for PaintConfig {
    fn default() -> Self {
        Self::from(&PaintSettings::default())
    }
}

impl From<&PaintSettings> for PaintConfig {
    fn from(s: &PaintSettings) -> Self {
        let fallback_color = egui::Color32::from_rgb(0x23, 0x3c, 0xdf);
        let fallback_clear = egui::Color32::from_rgb(0xc4, 0x23, 0x23);
        Self {
            brush_size: s.brush_size.clamp(1, 100),
            default_color: parse_hex(&s.default_color).unwrap_or(fallback_color),
            clear_color: parse_hex(&s.clear_color).unwrap_or(fallback_clear),
            device_pixel_ratio: (s.device_pixel_ratio > 0.0).then_some(s.device_pixel_ratio),
            lasso: LassoConfig {
                min_vertices: s.lasso_min_vertices.max(3),
                dedupe_radius: s.lasso_dedupe_radius,
                close_radius: s.lasso_close_radius,
                idle_timeout: Duration::from_millis(s.lasso_idle_ms),
            },
            history: HistoryLimits {
                undo_cap: s.undo_cap,
                undo_floor: s.undo_floor,
                redo_cap: s.redo_cap,
            },
            resize_debounce: Duration::from_millis(s.resize_debounce_ms),
            watermark: (s.watermark_enabled && !s.watermark_text.is_empty())
                .then(|| s.watermark_text.clone()),
            compact_breakpoint: s.compact_breakpoint,
            keybindings: s.keybindings.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_survive_a_config_round_trip() {
        let mut s = PaintSettings::default();
        s.brush_size = 42;
        s.lasso_close_radius = 14.0;
        s.watermark_enabled = false;
        s.keybindings.set(BindableAction::ToolLasso, KeyCombo::key(egui::Key::J));
        let parsed = PaintSettings::from_config_str(&s.to_config_string());
        assert_eq!(parsed.brush_size, 42);
        assert_eq!(parsed.lasso_close_radius, 14.0);
        assert!(!parsed.watermark_enabled);
        assert_eq!(
            parsed.keybindings.get(BindableAction::ToolLasso),
            Some(&KeyCombo::key(egui::Key::J))
        );
    }

    #[test]
    fn corrupt_values_fall_back_to_defaults() {
        let parsed = PaintSettings::from_config_str(
            "brush_size=huge\nbrush_size=500\nclear_color=red\nlasso_min_vertices=1\nnonsense",
        );
        assert_eq!(parsed.brush_size, 100);
        assert_eq!(parsed.clear_color, DEFAULT_CLEAR_HEX);
        assert_eq!(parsed.lasso_min_vertices, 3);
    }

    #[test]
    fn ctrl_shift_z_resolves_to_redo_not_undo() {
        let kb = KeyBindings::default();
        let ctrl = egui::Modifiers { ctrl: true, ..Default::default() };
        let ctrl_shift = egui::Modifiers { ctrl: true, shift: true, ..Default::default() };
        assert_eq!(kb.action_for_key(egui::Key::Z, ctrl), Some(BindableAction::Undo));
        assert_eq!(kb.action_for_key(egui::Key::Z, ctrl_shift), Some(BindableAction::RedoAlt));
        assert_eq!(kb.action_for_key(egui::Key::Y, ctrl), Some(BindableAction::Redo));
    }

    #[test]
    fn tool_hotkeys_ignore_shift_but_not_ctrl() {
        let kb = KeyBindings::default();
        let shift = egui::Modifiers { shift: true, ..Default::default() };
        let ctrl = egui::Modifiers { ctrl: true, ..Default::default() };
        assert_eq!(kb.action_for_key(egui::Key::B, shift), Some(BindableAction::ToolBrush));
        assert_eq!(kb.action_for_key(egui::Key::B, ctrl), None);
        assert_eq!(kb.action_for_text("]"), Some(BindableAction::BrushSizeIncreaseAlt));
    }

    #[test]
    fn engine_config_reflects_settings() {
        let mut s = PaintSettings::default();
        s.watermark_enabled = false;
        s.lasso_idle_ms = 1000;
        let cfg = PaintConfig::from(&s);
        assert!(cfg.watermark.is_none());
        assert_eq!(cfg.lasso.idle_timeout, Duration::from_millis(1000));
        assert_eq!(cfg.default_color, egui::Color32::from_rgb(0x23, 0x3c, 0xdf));
        assert_eq!(cfg.device_pixel_ratio, None);
    }
}
