use eframe::egui;
use eframe::egui::{Color32, Pos2, Rect, Vec2};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::canvas::Viewport;
use crate::components::colors::show_palette;
use crate::components::history::show_history_status;
use crate::components::tools::{KeyInput, PointerEvent, Tool, TouchEvent, TouchPoint};
use crate::host::{Collaborators, DownloadQueue, NotificationLog, PromptMailbox, Severity};
use crate::io::{PendingUpload, pick_save_path, pick_upload_path};
use crate::ops::prompt::PromptShelf;
use crate::session::{MAX_BRUSH_SIZE, MIN_BRUSH_SIZE, PaintSession};
use crate::settings::{PaintConfig, PaintSettings};
use crate::timer::SystemClock;

/// Seconds a toast stays on screen.
const TOAST_SECONDS: f64 = 3.0;
const INITIAL_WINDOW: Vec2 = Vec2::new(1280.0, 800.0);

struct Toast {
    message: String,
    severity: Severity,
    expires_at: f64,
}

pub struct PromptCanvasApp {
    /// `None` when the canvas could not be initialized.
    session: Option<PaintSession>,
    settings: PaintSettings,
    notifications: NotificationLog,
    downloads: DownloadQueue,
    mailbox: PromptMailbox,
    texture: Option<egui::TextureHandle>,
    texture_revision: Option<u64>,
    toasts: Vec<Toast>,
    pending_upload: Option<PendingUpload>,
    rotate_import: bool,
    color_name: String,
    prompt_text: String,
    handed_off: Option<String>,
    last_viewport: Option<Viewport>,
    active_touches: Vec<TouchPoint>,
    shift_held: bool,
    shelf_path: PathBuf,
}

impl PromptCanvasApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let settings = PaintSettings::load();
        let notifications = NotificationLog::new();
        let downloads = DownloadQueue::new();
        let mailbox = PromptMailbox::new();
        let collaborators = Collaborators::none()
            .with_notifier(notifications.clone())
            .with_download_sink(downloads.clone())
            .with_prompt_sink(mailbox.clone());

        let viewport = Viewport::new(
            INITIAL_WINDOW.x,
            INITIAL_WINDOW.y,
            cc.egui_ctx.pixels_per_point(),
        );
        let shelf_path = PromptShelf::default_path();
        let session = PaintSession::new(
            PaintConfig::from(&settings),
            viewport,
            collaborators,
            Box::new(SystemClock),
        )
        .ok()
        .map(|mut s| {
            s.replace_shelf(PromptShelf::load_or_default(&shelf_path));
            s
        });

        Self {
            session,
            settings,
            notifications,
            downloads,
            mailbox,
            texture: None,
            texture_revision: None,
            toasts: Vec::new(),
            pending_upload: None,
            rotate_import: false,
            color_name: String::new(),
            prompt_text: String::new(),
            handed_off: None,
            last_viewport: None,
            active_touches: Vec::new(),
            shift_held: false,
            shelf_path,
        }
    }

    // ========================================================================
    // BACKGROUND WORK
    // ========================================================================

    fn poll_upload(&mut self) {
        let Some(pending) = &self.pending_upload else { return };
        let Some(done) = pending.poll() else { return };
        self.pending_upload = None;
        let Some(session) = self.session.as_mut() else { return };
        match done.result {
            Ok(img) => {
                crate::log_info!("upload: {} decoded", done.path.display());
                let _ = session.load_image(img);
            }
            Err(e) => session.report_load_error(&e),
        }
    }

    /// Offer every finished export to the user.
    fn flush_downloads(&mut self, now: f64) {
        for download in self.downloads.drain() {
            let Some(path) = pick_save_path(&download.filename) else {
                continue;
            };
            match std::fs::write(&path, &download.bytes) {
                Ok(()) => {
                    crate::log_info!("export: wrote {}", path.display());
                }
                Err(e) => {
                    crate::log_err!("export: could not write {}: {}", path.display(), e);
                    self.toasts.push(Toast {
                        message: t!("notify.export_failed", error = e),
                        severity: Severity::Error,
                        expires_at: now + TOAST_SECONDS,
                    });
                }
            }
        }
    }

    fn collect_toasts(&mut self, now: f64) {
        for (message, severity) in self.notifications.drain() {
            self.toasts.push(Toast { message, severity, expires_at: now + TOAST_SECONDS });
        }
        self.toasts.retain(|t| t.expires_at > now);
    }

    fn save_shelf(&self) {
        let Some(session) = &self.session else { return };
        if let Err(e) = session.shelf().save_to(&self.shelf_path) {
            crate::log_warn!("prompt shelf: could not save: {}", e);
        }
    }

    // ========================================================================
    // INPUT
    // ========================================================================

    fn forward_input(&mut self, ctx: &egui::Context, canvas_rect: Rect) {
        let Some(session) = self.session.as_mut() else { return };
        let (events, shift) = ctx.input(|i| (i.events.clone(), i.modifiers.shift));
        let keyboard_free = !ctx.wants_keyboard_input();

        if keyboard_free && shift != self.shift_held {
            self.shift_held = shift;
            session.key(KeyInput::SnapModifier(shift));
        }

        // Touch input also arrives as emulated pointer events.
        let touch_frame = events.iter().any(|e| matches!(e, egui::Event::Touch { .. }));

        for event in events {
            match event {
                egui::Event::Touch { id, phase, pos, .. } => {
                    let point = TouchPoint { id: id.0, pos };
                    let touch = match phase {
                        egui::TouchPhase::Start => {
                            if !canvas_rect.contains(pos) {
                                continue;
                            }
                            self.active_touches.push(point);
                            TouchEvent::Start(self.active_touches.clone())
                        }
                        egui::TouchPhase::Move => {
                            if let Some(t) = self.active_touches.iter_mut().find(|t| t.id == point.id) {
                                t.pos = pos;
                            }
                            TouchEvent::Move(self.active_touches.clone())
                        }
                        egui::TouchPhase::End | egui::TouchPhase::Cancel => {
                            self.active_touches.retain(|t| t.id != point.id);
                            if phase == egui::TouchPhase::End {
                                TouchEvent::End(self.active_touches.clone())
                            } else {
                                TouchEvent::Cancel(self.active_touches.clone())
                            }
                        }
                    };
                    session.touch(touch);
                }
                egui::Event::PointerButton { pos, button: egui::PointerButton::Primary, pressed, .. }
                    if !touch_frame =>
                {
                    if pressed && canvas_rect.contains(pos) {
                        session.pointer(PointerEvent::Down(pos));
                    } else if !pressed {
                        session.pointer(PointerEvent::Up(Some(pos)));
                    }
                }
                egui::Event::PointerMoved(pos) if !touch_frame => {
                    if canvas_rect.contains(pos) {
                        session.pointer(PointerEvent::Move(pos));
                    } else if session.tool_state().pointer().active {
                        // Leaving the surface ends the stroke.
                        session.pointer(PointerEvent::Leave(Some(pos)));
                    }
                }
                egui::Event::PointerGone if !touch_frame => {
                    session.pointer(PointerEvent::Leave(None));
                }
                egui::Event::Key { key, pressed: true, modifiers, .. } if keyboard_free => {
                    session.key(KeyInput::Pressed { key, modifiers });
                }
                egui::Event::Text(text) if keyboard_free => {
                    session.key(KeyInput::Text(text));
                }
                _ => {}
            }
        }
    }

    // ========================================================================
    // PANELS
    // ========================================================================

    fn tools_ui(&mut self, ui: &mut egui::Ui) {
        let Some(session) = self.session.as_mut() else { return };

        ui.horizontal_wrapped(|ui| {
            for &tool in Tool::all() {
                if ui.selectable_label(session.tool() == tool, tool.label()).clicked() {
                    session.select_tool(tool);
                }
            }
        });
        ui.separator();

        ui.label(t!("palette.title"));
        if let Some(index) = show_palette(ui, session.palette(), session.current_color()) {
            session.select_color(index);
        }
        ui.horizontal(|ui| {
            let edit = ui.add(
                egui::TextEdit::singleline(&mut self.color_name)
                    .hint_text(t!("ui.color_name"))
                    .desired_width(120.0),
            );
            let submitted = edit.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
            if (ui.button(t!("ui.add_color")).clicked() || submitted)
                && session.add_random_color(&self.color_name).is_ok()
            {
                self.color_name.clear();
            }
        });
        ui.separator();

        let mut size = session.brush_size();
        ui.horizontal(|ui| {
            ui.label(t!("ui.brush_size"));
            if ui.add(egui::Slider::new(&mut size, MIN_BRUSH_SIZE..=MAX_BRUSH_SIZE)).changed() {
                session.set_brush_size(size);
            }
        });
        ui.separator();

        ui.horizontal_wrapped(|ui| {
            if ui.button(t!("history.undo")).clicked() {
                session.undo();
            }
            if ui.button(t!("history.redo")).clicked() {
                session.redo();
            }
            if ui.button(t!("ui.clear")).clicked() {
                session.clear_canvas();
            }
        });
        show_history_status(ui, session.history());
        ui.separator();

        ui.horizontal_wrapped(|ui| {
            let loading = self.pending_upload.is_some();
            if ui.add_enabled(!loading, egui::Button::new(t!("ui.upload"))).clicked()
                && let Some(path) = pick_upload_path()
            {
                self.pending_upload = Some(PendingUpload::spawn(path, self.rotate_import));
            }
            ui.checkbox(&mut self.rotate_import, t!("ui.rotate_import"));
            if loading {
                ui.spinner();
                ui.label(t!("ui.loading"));
            }
        });
        ui.horizontal_wrapped(|ui| {
            if ui.button(t!("ui.save")).clicked() {
                let _ = session.save_image();
            }
            if ui.button(t!("ui.save_rotated")).clicked() {
                let _ = session.save_rotated_image();
            }
        });
        ui.separator();

        let (x, y) = session.cursor_readout();
        ui.label(t!("ui.cursor", x = x, y = y));

        ui.horizontal(|ui| {
            ui.label(t!("ui.language"));
            let current = crate::i18n::current_language();
            let current_name = crate::i18n::LANGUAGES
                .iter()
                .find(|(code, _)| *code == current)
                .map(|(_, name)| *name)
                .unwrap_or("English");
            egui::ComboBox::from_id_source("language")
                .selected_text(current_name)
                .show_ui(ui, |ui| {
                    for &(code, name) in crate::i18n::LANGUAGES {
                        if ui.selectable_label(code == current, name).clicked() {
                            crate::i18n::set_language(code);
                            self.settings.language = code.to_string();
                            self.settings.save();
                        }
                    }
                });
        });
    }

    fn prompt_ui(&mut self, ui: &mut egui::Ui) {
        let mut shelf_changed = false;
        {
            let Some(session) = self.session.as_mut() else { return };
            ui.horizontal_wrapped(|ui| {
                ui.strong(t!("ui.prompt"));
                if ui.button(t!("ui.generate_prompt")).clicked() {
                    self.prompt_text = session.generate_prompt();
                }
                if ui.button(t!("ui.copy_prompt")).clicked() {
                    session.copy_prompt_with(|text| {
                        arboard::Clipboard::new()
                            .and_then(|mut c| c.set_text(text.to_string()))
                            .map_err(|e| {
                                crate::log_warn!("clipboard: {}", e);
                            })
                            .is_ok()
                    });
                }
                if ui.button(t!("ui.save_prompt")).clicked() && session.save_prompt() {
                    shelf_changed = true;
                }
                if ui.button(t!("ui.optimize")).clicked() {
                    session.optimize_to_ai();
                }
            });
            let edit = ui.add(
                egui::TextEdit::multiline(&mut self.prompt_text)
                    .desired_rows(3)
                    .desired_width(f32::INFINITY),
            );
            if edit.changed() {
                session.set_prompt(&self.prompt_text);
            }

            egui::CollapsingHeader::new(t!("ui.saved_prompts"))
                .default_open(false)
                .show(ui, |ui| {
                    if session.shelf().is_empty() {
                        ui.weak(t!("ui.no_saved_prompts"));
                    }
                    let mut picked = None;
                    for (i, saved) in session.shelf().prompts().enumerate().rev() {
                        if ui.button(saved.preview()).clicked() {
                            picked = Some(i);
                        }
                    }
                    if let Some(i) = picked
                        && session.load_saved_prompt(i)
                    {
                        self.prompt_text = session.prompt().unwrap_or_default().to_string();
                    }
                });
        }
        if shelf_changed {
            self.save_shelf();
        }
    }

    fn canvas_ui(&mut self, ui: &mut egui::Ui) -> Option<Rect> {
        let container = ui.max_rect();
        let Some(session) = self.session.as_mut() else {
            ui.centered_and_justified(|ui| ui.heading(t!("notify.init_failed")));
            return None;
        };

        let screen = ui.ctx().screen_rect();
        let viewport = Viewport {
            width: screen.width(),
            height: screen.height(),
            container_size: container.size(),
            container_origin: container.min,
            device_pixel_ratio: ui.ctx().pixels_per_point(),
        };
        if self.last_viewport != Some(viewport) {
            self.last_viewport = Some(viewport);
            session.request_resize(viewport);
        }

        if self.texture_revision != Some(session.revision()) || self.texture.is_none() {
            let img = session.composite_for_display();
            let size = [img.width() as usize, img.height() as usize];
            let color = egui::ColorImage::from_rgba_unmultiplied(size, img.as_raw());
            match &mut self.texture {
                Some(tex) => tex.set(color, egui::TextureOptions::LINEAR),
                None => {
                    self.texture =
                        Some(ui.ctx().load_texture("canvas", color, egui::TextureOptions::LINEAR));
                }
            }
            self.texture_revision = Some(session.revision());
        }

        let rect = session.geometry().bounding_rect();
        if let Some(tex) = &self.texture {
            let uv = Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0));
            ui.painter().image(tex.id(), rect, uv, Color32::WHITE);
        }
        let response = ui.interact(rect, ui.id().with("canvas_surface"), egui::Sense::click_and_drag());
        if response.hovered() {
            ui.ctx().set_cursor_icon(session.cursor().to_egui());
        }
        if response.double_clicked()
            && let Some(pos) = response.interact_pointer_pos()
        {
            session.pointer(PointerEvent::DoubleClick(pos));
        }
        Some(rect)
    }

    fn toasts_ui(&self, ctx: &egui::Context) {
        if self.toasts.is_empty() {
            return;
        }
        egui::Area::new("toasts")
            .anchor(egui::Align2::CENTER_BOTTOM, Vec2::new(0.0, -24.0))
            .interactable(false)
            .show(ctx, |ui| {
                for toast in &self.toasts {
                    let fill = match toast.severity {
                        Severity::Info => Color32::from_rgb(0x33, 0x33, 0x33),
                        Severity::Success => Color32::from_rgb(0x2e, 0x7d, 0x32),
                        Severity::Warning => Color32::from_rgb(0xef, 0x6c, 0x00),
                        Severity::Error => Color32::from_rgb(0xc6, 0x28, 0x28),
                    };
                    egui::Frame::popup(ui.style()).fill(fill).show(ui, |ui| {
                        ui.colored_label(Color32::WHITE, &toast.message);
                    });
                }
            });
    }

    fn handoff_ui(&mut self, ctx: &egui::Context) {
        if let Some(text) = self.mailbox.take() {
            crate::log_info!("prompt handed off ({} chars)", text.chars().count());
            self.handed_off = Some(text);
        }
        let Some(text) = &self.handed_off else { return };
        let mut open = true;
        egui::Window::new(t!("ui.optimize"))
            .open(&mut open)
            .collapsible(false)
            .resizable(true)
            .show(ctx, |ui| {
                ui.label(text);
            });
        if !open {
            self.handed_off = None;
        }
    }
}

impl eframe::App for PromptCanvasApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = ctx.input(|i| i.time);
        self.poll_upload();

        let compact = self.session.as_ref().is_some_and(|s| s.is_compact());
        if compact {
            egui::TopBottomPanel::top("tools").show(ctx, |ui| self.tools_ui(ui));
        } else {
            egui::SidePanel::left("tools")
                .resizable(false)
                .default_width(260.0)
                .show(ctx, |ui| {
                    egui::ScrollArea::vertical().show(ui, |ui| self.tools_ui(ui));
                });
        }
        egui::TopBottomPanel::bottom("prompt").show(ctx, |ui| self.prompt_ui(ui));

        let mut canvas_rect = None;
        egui::CentralPanel::default().show(ctx, |ui| {
            canvas_rect = self.canvas_ui(ui);
        });
        if let Some(rect) = canvas_rect {
            self.forward_input(ctx, rect);
        }

        if let Some(session) = self.session.as_mut() {
            session.tick();
            if self.texture_revision != Some(session.revision()) {
                ctx.request_repaint();
            }
            if let Some(deadline) = session.next_deadline() {
                ctx.request_repaint_after(deadline.saturating_duration_since(Instant::now()));
            }
        }

        self.flush_downloads(now);
        self.collect_toasts(now);
        self.toasts_ui(ctx);
        self.handoff_ui(ctx);
        if !self.toasts.is_empty() || self.pending_upload.is_some() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }
}
