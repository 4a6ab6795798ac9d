use std::sync::Arc;
use std::time::Instant;

use eframe::egui::{Color32, Key, Pos2};
use image::RgbaImage;
use rand::SeedableRng;
use rand::rngs::StdRng;
use uuid::Uuid;

use crate::canvas::{CanvasGeometry, CanvasStack, ResizeOutcome, Viewport};
use crate::components::colors::{Palette, PaletteRejection};
use crate::components::history::{HistoryManager, HistoryOutcome};
use crate::components::lasso::{LassoClick, LassoPop, LassoRejection, LassoSession, shape_name};
use crate::components::tools::{
    CursorStyle, KeyInput, PointerEvent, StrokeAction, Tool, ToolState, TouchEvent, TouchRoute,
};
use crate::error::{PaintError, PaintResult};
use crate::host::{Collaborators, Severity};
use crate::io::{self, PNG_MIME};
use crate::ops::brush::{self, Paint};
use crate::ops::export::{self, ExportOrientation, ExportedImage};
use crate::ops::preview;
use crate::ops::prompt::{self, PromptShelf};
use crate::settings::{BindableAction, PaintConfig};
use crate::timer::{Clock, Debouncer};

pub const MIN_BRUSH_SIZE: u32 = 1;
pub const MAX_BRUSH_SIZE: u32 = 100;

/// One paint engine instance: three layers, tools, lasso, history, palette
/// and prompt state. Sessions share nothing with each other.
pub struct PaintSession {
    pub id: Uuid,
    config: PaintConfig,
    stack: CanvasStack,
    tools: ToolState,
    lasso: LassoSession,
    history: HistoryManager,
    palette: Palette,
    current_color: Color32,
    brush_size: u32,
    viewport: Viewport,
    compact: bool,
    resize: Debouncer<Viewport>,
    collaborators: Collaborators,
    clock: Box<dyn Clock>,
    rng: StdRng,
    prompt: Option<String>,
    shelf: PromptShelf,
    /// Bumped on every visible layer change.
    revision: u64,
}

impl PaintSession {
    pub fn new(
        config: PaintConfig,
        viewport: Viewport,
        collaborators: Collaborators,
        clock: Box<dyn Clock>,
    ) -> PaintResult<Self> {
        let viewport = apply_dpr_override(viewport, &config);
        let stack = match CanvasStack::new(&viewport) {
            Ok(stack) => stack,
            Err(e) => {
                crate::log_err!("session: canvas init failed: {}", e);
                collaborators.notify(&t!("notify.init_failed"), Severity::Error);
                return Err(e);
            }
        };
        let mut history = HistoryManager::new(config.history);
        history.reset_with_baseline(&stack.drawing);

        let session = Self {
            id: Uuid::new_v4(),
            compact: viewport.width <= config.compact_breakpoint,
            tools: ToolState::new(Tool::Brush),
            lasso: LassoSession::new(config.lasso),
            palette: Palette::new(config.clear_color),
            current_color: config.default_color,
            brush_size: config.brush_size.clamp(MIN_BRUSH_SIZE, MAX_BRUSH_SIZE),
            resize: Debouncer::new(config.resize_debounce),
            rng: StdRng::from_entropy(),
            prompt: None,
            shelf: PromptShelf::new(),
            revision: 0,
            config,
            stack,
            history,
            viewport,
            collaborators,
            clock,
        };
        crate::log_info!(
            "session {}: ready, {}×{} px{}",
            session.id,
            session.stack.geometry.pixel_width,
            session.stack.geometry.pixel_height,
            if session.compact { " (compact)" } else { "" }
        );
        Ok(session)
    }

    /// Deterministic color generation (scripts, tests).
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    fn notify(&self, message: &str, severity: Severity) {
        self.collaborators.notify(message, severity);
    }

    fn touch_layers(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn config(&self) -> &PaintConfig {
        &self.config
    }

    pub fn stack(&self) -> &CanvasStack {
        &self.stack
    }

    pub fn geometry(&self) -> &CanvasGeometry {
        &self.stack.geometry
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn tool(&self) -> Tool {
        self.tools.tool()
    }

    pub fn tool_state(&self) -> &ToolState {
        &self.tools
    }

    pub fn cursor(&self) -> CursorStyle {
        self.tools.cursor()
    }

    pub fn lasso(&self) -> &LassoSession {
        &self.lasso
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn current_color(&self) -> Color32 {
        self.current_color
    }

    pub fn brush_size(&self) -> u32 {
        self.brush_size
    }

    pub fn is_compact(&self) -> bool {
        self.compact
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn cursor_readout(&self) -> (u32, u32) {
        self.stack.cursor_readout()
    }

    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    /// Replace the prompt text (user edits in the prompt box).
    pub fn set_prompt(&mut self, text: &str) {
        let text = text.trim();
        self.prompt = (!text.is_empty()).then(|| text.to_string());
    }

    pub fn shelf(&self) -> &PromptShelf {
        &self.shelf
    }

    pub fn replace_shelf(&mut self, shelf: PromptShelf) {
        self.shelf = shelf;
    }

    /// Background + drawing + preview.
    pub fn composite_for_display(&self) -> RgbaImage {
        self.stack.composite_display()
    }

    /// Client position of a device pixel coordinate (inverse of the pointer
    /// mapping).
    pub fn device_to_client(&self, device: Pos2) -> Pos2 {
        let rect = self.stack.geometry.bounding_rect();
        let (pw, ph) = self.stack.geometry.pixel_size();
        Pos2::new(
            rect.min.x + device.x / pw as f32 * rect.width(),
            rect.min.y + device.y / ph as f32 * rect.height(),
        )
    }

    /// Earliest pending timer (lasso idle, resize debounce).
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.lasso.idle_deadline(), self.resize.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    // ========================================================================
    // TOOLS
    // ========================================================================

    /// Switch tools. Rejected in the compact layout for anything but the brush.
    pub fn select_tool(&mut self, tool: Tool) -> bool {
        if self.compact && !tool.available_in_compact() {
            let message = match tool {
                Tool::Eraser => t!("notify.compact_eraser_disabled"),
                _ => t!("notify.compact_tool_disabled", tool = tool.label()),
            };
            self.notify(&message, Severity::Warning);
            return false;
        }
        self.switch_tool(tool);
        let key = self
            .config
            .keybindings
            .get(tool_action(tool))
            .map(|k| k.display())
            .unwrap_or_default();
        self.notify(&t!("notify.tool_selected", tool = tool.label(), key = key), Severity::Info);
        if tool == Tool::Lasso {
            self.notify(
                &t!("notify.lasso_hint", count = self.lasso.config().min_vertices),
                Severity::Info,
            );
        }
        true
    }

    fn switch_tool(&mut self, tool: Tool) {
        self.lasso.cancel();
        if let Some(end) = self.tools.select(tool) {
            self.apply_stroke(end);
        }
        self.stack.clear_preview();
        self.touch_layers();
    }

    pub fn set_brush_size(&mut self, size: u32) {
        self.brush_size = size.clamp(MIN_BRUSH_SIZE, MAX_BRUSH_SIZE);
    }

    /// Step the brush size, notifying when it actually changed.
    pub fn adjust_brush_size(&mut self, delta: i32) -> bool {
        let next = (self.brush_size as i64 + delta as i64)
            .clamp(MIN_BRUSH_SIZE as i64, MAX_BRUSH_SIZE as i64) as u32;
        if next == self.brush_size {
            return false;
        }
        self.brush_size = next;
        self.notify(&t!("notify.brush_size", size = next), Severity::Info);
        true
    }

    // ========================================================================
    // COLORS
    // ========================================================================

    /// Pick a palette entry; switches to the brush.
    pub fn select_color(&mut self, index: usize) -> bool {
        let Some(entry) = self.palette.get(index) else {
            return false;
        };
        self.current_color = entry.color;
        if self.tools.tool() != Tool::Brush {
            self.switch_tool(Tool::Brush);
        }
        true
    }

    /// Set the current color directly (palette membership not required).
    pub fn set_color(&mut self, color: Color32) {
        self.current_color = color;
    }

    pub fn add_random_color(&mut self, name: &str) -> Result<usize, PaletteRejection> {
        match self.palette.add_random(name, &mut self.rng) {
            Ok(index) => {
                self.select_color(index);
                self.notify(&t!("notify.color_added", name = name.trim()), Severity::Success);
                Ok(index)
            }
            Err(PaletteRejection::EmptyName) => {
                self.notify(&t!("notify.color_name_empty"), Severity::Warning);
                Err(PaletteRejection::EmptyName)
            }
            Err(PaletteRejection::Duplicate) => {
                self.notify(&t!("notify.color_exists"), Severity::Warning);
                Err(PaletteRejection::Duplicate)
            }
        }
    }

    // ========================================================================
    // INPUT
    // ========================================================================

    pub fn pointer(&mut self, event: PointerEvent) {
        let action = match event {
            PointerEvent::Down(client) => {
                let p = self.stack.to_device_coordinates(Some(client));
                self.tools.pointer_down(p)
            }
            PointerEvent::Move(client) => {
                let p = self.stack.to_device_coordinates(Some(client));
                self.tools.pointer_move(p)
            }
            PointerEvent::Up(client) | PointerEvent::Leave(client) => {
                let p = self.stack.to_device_coordinates(client);
                self.tools.pointer_up(p)
            }
            PointerEvent::DoubleClick(_) => self.tools.double_click(),
        };
        if let Some(action) = action {
            self.apply_stroke(action);
        }
    }

    pub fn touch(&mut self, event: TouchEvent) {
        match self.tools.route_touch(&event) {
            TouchRoute::Ignore => {}
            TouchRoute::Down(p) => self.pointer(PointerEvent::Down(p)),
            TouchRoute::Move(p) => self.pointer(PointerEvent::Move(p)),
            TouchRoute::Up => self.pointer(PointerEvent::Up(None)),
            TouchRoute::Discard => {
                self.stack.clear_preview();
                self.touch_layers();
            }
        }
    }

    pub fn key(&mut self, input: KeyInput) {
        match input {
            KeyInput::SnapModifier(held) => self.tools.set_snap_held(held),
            KeyInput::Text(text) => {
                if let Some(action) = self.config.keybindings.action_for_text(&text) {
                    self.run_action(action);
                }
            }
            KeyInput::Pressed { key, modifiers } => {
                if self.tools.tool() == Tool::Lasso && self.lasso.is_active() {
                    match key {
                        Key::Enter => {
                            self.complete_lasso();
                            return;
                        }
                        Key::Escape => {
                            self.cancel_lasso();
                            return;
                        }
                        Key::Backspace | Key::Delete => {
                            self.pop_lasso_vertex();
                            return;
                        }
                        _ => {}
                    }
                }
                if let Some(action) = self.config.keybindings.action_for_key(key, modifiers) {
                    self.run_action(action);
                }
            }
        }
    }

    fn run_action(&mut self, action: BindableAction) {
        use BindableAction::*;
        match action {
            ToolBrush => {
                self.select_tool(Tool::Brush);
            }
            ToolEraser => {
                self.select_tool(Tool::Eraser);
            }
            ToolLine => {
                self.select_tool(Tool::Line);
            }
            ToolLasso => {
                self.select_tool(Tool::Lasso);
            }
            Undo => {
                self.undo();
            }
            Redo | RedoAlt => {
                self.redo();
            }
            BrushSizeIncrease | BrushSizeIncreaseAlt => {
                self.adjust_brush_size(1);
            }
            BrushSizeDecrease | BrushSizeDecreaseAlt => {
                self.adjust_brush_size(-1);
            }
        }
    }

    fn stroke_paint(&self) -> Paint {
        match self.tools.tool() {
            Tool::Eraser => Paint::erase(),
            _ => Paint::solid(self.current_color),
        }
    }

    fn apply_stroke(&mut self, action: StrokeAction) {
        let size = self.brush_size as f32;
        match action {
            StrokeAction::Stamp { from, to } => {
                let paint = self.stroke_paint();
                brush::stamp_segment(&mut self.stack.drawing, from, to, size, paint);
            }
            StrokeAction::PreviewLine { from, to } => {
                preview::render_line_preview(&mut self.stack.preview, from, to, size, self.current_color);
            }
            StrokeAction::CommitLine { from, to } => {
                let paint = self.stroke_paint();
                self.stack.clear_preview();
                brush::stroke_line(&mut self.stack.drawing, from, to, size, paint);
                self.history.commit(&self.stack.drawing);
            }
            StrokeAction::EndStroke => {
                self.history.commit(&self.stack.drawing);
            }
            StrokeAction::LassoClick(p) => self.lasso_click(p),
            StrokeAction::LassoCursor(p) => {
                self.lasso.set_cursor(Some(p));
                self.render_lasso_preview();
            }
            StrokeAction::LassoComplete => {
                if self.lasso.is_active() {
                    self.complete_lasso();
                }
            }
        }
        self.touch_layers();
    }

    // ========================================================================
    // LASSO
    // ========================================================================

    fn render_lasso_preview(&mut self) {
        let view = self.lasso.preview(self.current_color);
        preview::render_lasso_preview(&mut self.stack.preview, &view);
    }

    fn lasso_click(&mut self, p: Pos2) {
        let now = self.clock.now();
        let min = self.lasso.config().min_vertices;
        match self.lasso.click(p, now) {
            LassoClick::Started => {
                self.notify(&t!("notify.lasso_started", count = min), Severity::Info);
            }
            LassoClick::Ignored => {}
            LassoClick::Appended { count } if count < min => {
                self.notify(
                    &t!("notify.lasso_need_more", have = count, more = min - count, count = min),
                    Severity::Info,
                );
            }
            LassoClick::Appended { count } => {
                let secs = self.lasso.config().idle_timeout.as_secs_f32();
                self.notify(
                    &t!("notify.lasso_points", count = count, secs = format_secs(secs)),
                    Severity::Info,
                );
            }
            LassoClick::CloseRequested => {
                self.complete_lasso();
                return;
            }
        }
        self.render_lasso_preview();
    }

    /// Fill the lasso polygon onto the drawing layer. A polygon below the
    /// vertex threshold is refused and the session stays open.
    pub fn complete_lasso(&mut self) -> bool {
        match self.lasso.take_polygon() {
            Ok(polygon) => {
                let paint = if self.palette.is_clear_color(self.current_color) {
                    Paint::erase()
                } else {
                    Paint::solid(self.current_color)
                };
                brush::fill_polygon(&mut self.stack.drawing, &polygon, paint);
                self.stack.clear_preview();
                self.history.commit(&self.stack.drawing);
                self.touch_layers();
                self.notify(
                    &t!("notify.lasso_done", shape = shape_name(polygon.len())),
                    Severity::Success,
                );
                true
            }
            Err(LassoRejection::TooFewVertices { required, have }) => {
                self.notify(
                    &t!("notify.lasso_min", count = required, have = have),
                    Severity::Warning,
                );
                false
            }
            Err(LassoRejection::NotActive) => false,
        }
    }

    pub fn cancel_lasso(&mut self) -> bool {
        if !self.lasso.cancel() {
            return false;
        }
        self.stack.clear_preview();
        self.touch_layers();
        self.notify(&t!("notify.lasso_cancelled"), Severity::Info);
        true
    }

    fn pop_lasso_vertex(&mut self) {
        match self.lasso.pop_vertex(self.clock.now()) {
            LassoPop::Removed { remaining } => {
                self.render_lasso_preview();
                self.notify(&t!("notify.lasso_vertex_removed", count = remaining), Severity::Info);
            }
            LassoPop::Ended => {
                self.stack.clear_preview();
                self.notify(&t!("notify.lasso_vertex_removed", count = 0), Severity::Info);
            }
            LassoPop::NotActive => {}
        }
        self.touch_layers();
    }

    // ========================================================================
    // HISTORY
    // ========================================================================

    pub fn undo(&mut self) -> HistoryOutcome {
        let outcome = self.history.undo(&mut self.stack.drawing);
        let (key, severity) = match outcome {
            HistoryOutcome::Undone => ("notify.undone", Severity::Info),
            HistoryOutcome::AtInitialState => ("notify.initial_state", Severity::Info),
            _ => ("notify.nothing_to_undo", Severity::Warning),
        };
        if outcome.mutated() {
            self.touch_layers();
        }
        self.notify(&t!(key), severity);
        outcome
    }

    pub fn redo(&mut self) -> HistoryOutcome {
        let outcome = self.history.redo(&mut self.stack.drawing);
        let (key, severity) = match outcome {
            HistoryOutcome::Redone => ("notify.redone", Severity::Info),
            _ => ("notify.nothing_to_redo", Severity::Warning),
        };
        if outcome.mutated() {
            self.touch_layers();
        }
        self.notify(&t!(key), severity);
        outcome
    }

    /// Erase the drawing layer, keep the background, start history over.
    pub fn clear_canvas(&mut self) {
        self.lasso.cancel();
        self.tools.discard_gesture();
        self.stack.drawing.clear();
        self.stack.clear_preview();
        self.history.reset_with_baseline(&self.stack.drawing);
        self.touch_layers();
        self.notify(&t!("notify.canvas_cleared"), Severity::Success);
    }

    // ========================================================================
    // IMAGES
    // ========================================================================

    /// Decode uploaded bytes and make them the background.
    pub fn upload(&mut self, bytes: &[u8], rotate: bool) -> PaintResult<()> {
        let img = match io::decode_upload(bytes) {
            Ok(img) => img,
            Err(e) => {
                self.report_load_error(&e);
                return Err(e);
            }
        };
        let img = if rotate { io::rotate_clockwise(&img) } else { img };
        self.load_image(img)
    }

    pub fn report_load_error(&self, e: &PaintError) {
        crate::log_warn!("session: image rejected: {}", e);
        let message = match e {
            PaintError::NotAnImage => t!("notify.not_an_image"),
            _ => t!("notify.image_load_failed"),
        };
        self.notify(&message, Severity::Error);
    }

    /// Lock the canvas to `img` and paint it as the background. Drawing,
    /// preview and history start over.
    pub fn load_image(&mut self, img: RgbaImage) -> PaintResult<()> {
        if img.width() == 0 || img.height() == 0 {
            let e = PaintError::ZeroDimension;
            self.report_load_error(&e);
            return Err(e);
        }
        if let Err(e) = self.stack.lock_to_image(Arc::new(img), &self.viewport) {
            self.report_load_error(&e);
            return Err(e);
        }
        self.lasso.cancel();
        self.tools.discard_gesture();
        self.history.reset_with_baseline(&self.stack.drawing);
        self.touch_layers();
        let display = self.stack.geometry.display_size;
        self.notify(
            &t!("notify.image_locked", width = display.x as u32, height = display.y as u32),
            Severity::Success,
        );
        Ok(())
    }

    pub fn save_image(&mut self) -> PaintResult<ExportedImage> {
        self.export(ExportOrientation::Auto)
    }

    pub fn save_rotated_image(&mut self) -> PaintResult<ExportedImage> {
        self.export(ExportOrientation::ForceRotated)
    }

    fn export(&mut self, orientation: ExportOrientation) -> PaintResult<ExportedImage> {
        let watermark = self.config.watermark.as_deref();
        let exported =
            match export::export_png(&self.stack, orientation, watermark, export::unix_millis_now()) {
                Ok(e) => e,
                Err(e) => {
                    crate::log_err!("session: export failed: {}", e);
                    self.notify(&t!("notify.export_failed", error = e), Severity::Error);
                    return Err(e);
                }
            };
        self.collaborators
            .download_file(exported.png.clone(), &exported.filename, PNG_MIME);
        let message = match (orientation, exported.rotated) {
            (ExportOrientation::ForceRotated, _) => t!("notify.rotated_exported"),
            (ExportOrientation::Auto, true) => t!("notify.image_saved_rotated"),
            (ExportOrientation::Auto, false) => t!("notify.image_saved"),
        };
        self.notify(&message, Severity::Success);
        Ok(exported)
    }

    // ========================================================================
    // PROMPTS
    // ========================================================================

    /// Build the prompt from the marks on the drawing layer. Returns the text
    /// shown to the user (the "no marks" hint when nothing was found).
    pub fn generate_prompt(&mut self) -> String {
        let used = prompt::detect_canvas_colors(&self.stack.drawing, &self.palette);
        let text = match prompt::build_prompt(&used, &self.palette) {
            Some(text) => {
                self.prompt = Some(text.clone());
                text
            }
            None => {
                self.prompt = None;
                t!("prompt.no_marks")
            }
        };
        self.notify(&t!("notify.prompt_generated"), Severity::Success);
        text
    }

    /// Hand the prompt to the next stage.
    pub fn optimize_to_ai(&mut self) -> bool {
        let Some(text) = self.prompt.clone() else {
            self.notify(&t!("notify.prompt_missing"), Severity::Warning);
            return false;
        };
        self.collaborators.export_prompt_text(&text);
        self.notify(&t!("notify.prompt_handoff"), Severity::Success);
        true
    }

    pub fn save_prompt(&mut self) -> bool {
        let Some(text) = self.prompt.clone() else {
            self.notify(&t!("notify.prompt_empty"), Severity::Warning);
            return false;
        };
        let at = export::unix_millis_now().min(u64::MAX as u128) as u64;
        self.shelf.push(&text, at);
        self.notify(&t!("notify.prompt_saved"), Severity::Success);
        true
    }

    /// Copy the prompt with `copy` (the host clipboard), reporting the result.
    pub fn copy_prompt_with(&self, copy: impl FnOnce(&str) -> bool) -> bool {
        let Some(text) = self.prompt.as_deref() else {
            self.notify(&t!("notify.prompt_missing"), Severity::Warning);
            return false;
        };
        let copied = copy(text);
        if copied {
            self.notify(&t!("notify.prompt_copied"), Severity::Success);
        } else {
            self.notify(&t!("notify.copy_failed"), Severity::Error);
        }
        copied
    }

    pub fn load_saved_prompt(&mut self, index: usize) -> bool {
        let Some(saved) = self.shelf.get(index) else {
            return false;
        };
        self.prompt = Some(saved.text.clone());
        self.notify(&t!("notify.prompt_loaded"), Severity::Info);
        true
    }

    // ========================================================================
    // TIME & RESIZE
    // ========================================================================

    /// Queue a viewport change; applied after the debounce quiet period.
    pub fn request_resize(&mut self, viewport: Viewport) {
        let now = self.clock.now();
        self.resize.request(viewport, now);
    }

    /// Fire due timers. Call regularly from the host loop.
    pub fn tick(&mut self) {
        let now = self.clock.now();
        if self.lasso.poll_idle(now) {
            crate::log_info!("lasso: idle timeout");
            self.complete_lasso();
        }
        if let Some(viewport) = self.resize.poll(now) {
            self.apply_resize(viewport);
        }
    }

    fn apply_resize(&mut self, viewport: Viewport) {
        let viewport = apply_dpr_override(viewport, &self.config);
        self.viewport = viewport;
        let compact = viewport.width <= self.config.compact_breakpoint;
        if compact != self.compact {
            self.compact = compact;
            crate::log_info!("session: compact layout {}", if compact { "on" } else { "off" });
            if compact && !self.tools.tool().available_in_compact() {
                self.switch_tool(Tool::Brush);
            }
        }
        match self.stack.recompute_for_resize(&viewport) {
            Ok(ResizeOutcome::Recentered) => {}
            Ok(ResizeOutcome::Reinitialized) => {
                self.lasso.cancel();
                self.tools.discard_gesture();
                self.history.reset_with_baseline(&self.stack.drawing);
                self.touch_layers();
            }
            Err(e) => {
                crate::log_err!("session: resize failed: {}", e);
                self.notify(&t!("notify.init_failed"), Severity::Error);
            }
        }
    }
}

fn apply_dpr_override(mut viewport: Viewport, config: &PaintConfig) -> Viewport {
    if let Some(dpr) = config.device_pixel_ratio {
        viewport.device_pixel_ratio = dpr;
    }
    viewport
}

fn tool_action(tool: Tool) -> BindableAction {
    match tool {
        Tool::Brush => BindableAction::ToolBrush,
        Tool::Eraser => BindableAction::ToolEraser,
        Tool::Line => BindableAction::ToolLine,
        Tool::Lasso => BindableAction::ToolLasso,
    }
}

/// `2.8`, `3` (no trailing `.0`).
fn format_secs(secs: f32) -> String {
    let s = format!("{:.1}", secs);
    s.strip_suffix(".0").map(str::to_string).unwrap_or(s)
}
