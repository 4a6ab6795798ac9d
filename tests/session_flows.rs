use std::time::Duration;

use egui::{Pos2, Vec2};
use image::{Rgba, RgbaImage};

use promptcanvas::canvas::Viewport;
use promptcanvas::components::history::HistoryOutcome;
use promptcanvas::components::tools::{PointerEvent, Tool, TouchEvent, TouchPoint};
use promptcanvas::host::{Collaborators, DownloadQueue, NotificationLog, PromptMailbox, Severity};
use promptcanvas::io::{PNG_MIME, encode_png};
use promptcanvas::settings::PaintConfig;
use promptcanvas::timer::ManualClock;
use promptcanvas::{PaintError, PaintSession};

struct Harness {
    session: PaintSession,
    clock: ManualClock,
    notes: NotificationLog,
    downloads: DownloadQueue,
    mailbox: PromptMailbox,
}

fn harness() -> Harness {
    let mut config = PaintConfig::default();
    config.watermark = None;
    let clock = ManualClock::new();
    let notes = NotificationLog::new();
    let downloads = DownloadQueue::new();
    let mailbox = PromptMailbox::new();
    let session = PaintSession::new(
        config,
        Viewport::new(1280.0, 1000.0, 1.0),
        Collaborators::none()
            .with_notifier(notes.clone())
            .with_download_sink(downloads.clone())
            .with_prompt_sink(mailbox.clone()),
        Box::new(clock.clone()),
    )
    .unwrap()
    .with_rng_seed(7);
    Harness { session, clock, notes, downloads, mailbox }
}

impl Harness {
    fn at(&self, x: f32, y: f32) -> Pos2 {
        self.session.device_to_client(Pos2::new(x, y))
    }

    fn click(&mut self, x: f32, y: f32) {
        let p = self.at(x, y);
        self.session.pointer(PointerEvent::Down(p));
        self.session.pointer(PointerEvent::Up(Some(p)));
    }

    fn alpha(&self, x: u32, y: u32) -> u8 {
        self.session.stack().drawing.get_pixel(x, y)[3]
    }

    fn painted_in(&self, x0: u32, y0: u32, x1: u32, y1: u32) -> usize {
        let mut n = 0;
        for y in y0..y1 {
            for x in x0..x1 {
                if self.alpha(x, y) > 0 {
                    n += 1;
                }
            }
        }
        n
    }
}

#[test]
fn single_click_paints_a_brush_sized_square() {
    let mut h = harness();
    h.click(100.0, 100.0);
    assert_eq!(h.painted_in(50, 50, 150, 150), 400);
    assert_eq!(h.alpha(90, 90), 255);
    assert_eq!(h.alpha(109, 109), 255);
    assert_eq!(h.alpha(110, 110), 0);
}

#[test]
fn lasso_triangle_fills_and_clear_color_erases() {
    let mut h = harness();
    h.session.select_tool(Tool::Lasso);
    for (x, y) in [(100.0, 100.0), (400.0, 100.0), (100.0, 400.0)] {
        h.click(x, y);
    }
    // Clicking near the first vertex closes the shape.
    h.click(103.0, 102.0);
    assert!(!h.session.lasso().is_active());
    assert_eq!(h.alpha(150, 150), 255);
    assert_eq!(h.alpha(390, 390), 0);
    assert_eq!(h.session.stack().preview.chunk_count(), 0);

    h.session.select_color(0);
    h.session.select_tool(Tool::Lasso);
    for (x, y) in [(120.0, 120.0), (200.0, 120.0), (120.0, 200.0)] {
        h.click(x, y);
    }
    h.session.complete_lasso();
    assert_eq!(h.alpha(130, 130), 0);
    assert_eq!(h.alpha(300, 110), 255);
}

#[test]
fn idle_lasso_completes_after_timeout() {
    let mut h = harness();
    h.session.select_tool(Tool::Lasso);
    for (x, y) in [(100.0, 100.0), (300.0, 100.0), (200.0, 300.0)] {
        h.click(x, y);
    }
    h.clock.advance(Duration::from_millis(1500));
    h.session.tick();
    assert!(h.session.lasso().is_active());
    h.clock.advance(Duration::from_millis(1300));
    h.session.tick();
    assert!(!h.session.lasso().is_active());
    assert_eq!(h.alpha(200, 150), 255);
    assert_eq!(h.session.history().undo_count(), 2);
}

#[test]
fn undo_and_redo_round_trip() {
    let mut h = harness();
    h.click(50.0, 50.0);
    h.click(200.0, 50.0);
    assert_eq!(h.session.history().undo_count(), 3);

    h.session.undo();
    assert_eq!(h.alpha(200, 50), 0);
    assert_eq!(h.alpha(50, 50), 255);
    h.session.undo();
    assert_eq!(h.alpha(50, 50), 0);
    h.session.undo();
    let (last, severity) = h.notes.last().unwrap();
    assert_eq!(severity, Severity::Info);
    assert_eq!(last, promptcanvas::i18n::translate("notify.initial_state"));

    h.session.redo();
    h.session.redo();
    assert_eq!(h.alpha(200, 50), 255);
    h.session.redo();
    assert_eq!(h.notes.last().unwrap().1, Severity::Warning);

    // A new stroke drops the redo branch.
    h.session.undo();
    h.click(300.0, 300.0);
    assert!(!h.session.history().can_redo());
}

#[test]
fn rejected_upload_leaves_the_canvas_alone() {
    let mut h = harness();
    h.click(60.0, 60.0);
    let geometry = *h.session.geometry();
    let undo_depth = h.session.history().undo_count();

    let err = h.session.upload(b"%PDF-1.7 not a picture", false).unwrap_err();
    assert!(matches!(err, PaintError::NotAnImage));
    assert_eq!(*h.session.geometry(), geometry);
    assert_eq!(h.session.history().undo_count(), undo_depth);
    assert_eq!(h.alpha(60, 60), 255);
    assert_eq!(h.notes.last().unwrap().1, Severity::Error);
}

#[test]
fn uploaded_image_locks_the_canvas_through_resizes() {
    let mut h = harness();
    let img = RgbaImage::from_pixel(600, 400, Rgba([10, 200, 30, 255]));
    h.session.upload(&encode_png(&img).unwrap(), false).unwrap();
    let geometry = *h.session.geometry();
    assert!(geometry.locked);
    assert_eq!(h.session.history().undo_count(), 1);
    h.click(20.0, 20.0);

    let mut smaller = Viewport::new(900.0, 700.0, 1.0);
    smaller.container_size = Vec2::new(900.0, 600.0);
    h.session.request_resize(smaller);
    h.clock.advance(Duration::from_millis(100));
    h.session.request_resize(Viewport::new(1000.0, 800.0, 1.0));
    h.clock.advance(Duration::from_millis(249));
    h.session.tick();
    assert_eq!(h.session.geometry().image_offset, geometry.image_offset);
    h.clock.advance(Duration::from_millis(1));
    h.session.tick();

    let after = h.session.geometry();
    assert_eq!(after.pixel_size(), geometry.pixel_size());
    assert_eq!(after.display_size, geometry.display_size);
    assert_ne!(after.image_offset, geometry.image_offset);
    assert_eq!(h.alpha(20, 20), 255);
}

#[test]
fn scrolling_touch_does_not_paint() {
    let mut h = harness();
    let start = h.at(100.0, 100.0);
    let touch = |pos: Pos2| vec![TouchPoint { id: 3, pos }];
    h.session.select_tool(Tool::Line);
    h.session.touch(TouchEvent::Start(touch(start)));
    h.session.touch(TouchEvent::Move(touch(start + Vec2::new(0.0, 40.0))));
    h.session.touch(TouchEvent::End(vec![]));
    assert_eq!(h.session.stack().drawing.chunk_count(), 0);
    assert_eq!(h.session.stack().preview.chunk_count(), 0);
}

#[test]
fn prompt_hand_off_and_export() {
    let mut h = harness();
    h.session.add_random_color("sofa").unwrap();
    h.click(80.0, 80.0);
    h.session.select_color(0);
    h.click(300.0, 300.0);

    let text = h.session.generate_prompt();
    assert!(text.contains("sofa"));
    assert!(h.session.optimize_to_ai());
    assert_eq!(h.mailbox.take().as_deref(), Some(text.as_str()));

    let exported = h.session.save_image().unwrap();
    let downloads = h.downloads.drain();
    assert_eq!(downloads.len(), 1);
    assert_eq!(downloads[0].mime, PNG_MIME);
    assert_eq!(downloads[0].filename, exported.filename);
    assert!(exported.filename.starts_with("AI绘画_"));
    assert!(!exported.rotated);
}

#[test]
fn line_tool_paints_a_capped_band_once() {
    let mut h = harness();
    h.session.select_tool(Tool::Line);
    h.session.set_brush_size(10);
    let (a, b) = (h.at(0.0, 0.0), h.at(100.0, 0.0));
    h.session.pointer(PointerEvent::Down(a));
    h.session.pointer(PointerEvent::Move(b));
    assert_eq!(h.session.history().undo_count(), 1);
    assert!(h.session.stack().preview.chunk_count() > 0);
    h.session.pointer(PointerEvent::Up(Some(b)));

    assert_eq!(h.session.history().undo_count(), 2);
    assert_eq!(h.session.stack().preview.chunk_count(), 0);
    // Band y ∈ [-5, 5) clipped to the top edge; caps reach x = 105.
    assert_eq!(h.alpha(50, 0), 255);
    assert_eq!(h.alpha(50, 4), 255);
    assert_eq!(h.alpha(104, 4), 255);
    assert_eq!(h.alpha(106, 0), 0);
    assert_eq!(h.alpha(50, 6), 0);
    assert_eq!(h.painted_in(0, 0, 200, 20), 105 * 5);
}

#[test]
fn tool_switch_mid_stroke_commits_the_stroke() {
    let mut h = harness();
    let (a, b) = (h.at(100.0, 100.0), h.at(200.0, 100.0));
    h.session.pointer(PointerEvent::Down(a));
    h.session.pointer(PointerEvent::Move(b));
    assert!(h.session.select_tool(Tool::Line));
    assert_eq!(h.session.history().undo_count(), 2);
    // The release belongs to the finished gesture.
    h.session.pointer(PointerEvent::Up(Some(b)));
    assert_eq!(h.session.history().undo_count(), 2);
    assert_eq!(h.alpha(150, 100), 255);

    assert_eq!(h.session.undo(), HistoryOutcome::Undone);
    assert_eq!(h.alpha(150, 100), 0);
    assert_eq!(h.session.undo(), HistoryOutcome::AtInitialState);
}

#[test]
fn tool_switch_drops_a_pending_line() {
    let mut h = harness();
    let (a, b) = (h.at(100.0, 100.0), h.at(300.0, 100.0));
    h.session.select_tool(Tool::Line);
    h.session.pointer(PointerEvent::Down(a));
    h.session.pointer(PointerEvent::Move(b));
    assert!(h.session.stack().preview.chunk_count() > 0);
    h.session.select_tool(Tool::Brush);
    h.session.pointer(PointerEvent::Up(Some(b)));
    assert_eq!(h.session.stack().preview.chunk_count(), 0);
    assert_eq!(h.session.stack().drawing.chunk_count(), 0);
    assert_eq!(h.session.history().undo_count(), 1);
}
