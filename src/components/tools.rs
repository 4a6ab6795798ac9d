use eframe::egui;
use egui::{Key, Modifiers, Pos2};

/// Vertical travel (client px) between touch moves that marks a gesture as
/// a scroll while nothing has been painted yet.
const TOUCH_SCROLL_THRESHOLD: f32 = 10.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Tool {
    #[default]
    Brush,
    Eraser,
    Line,
    Lasso,
}

impl Tool {
    pub fn label(&self) -> String {
        match self {
            Tool::Brush => t!("tool.brush"),
            Tool::Eraser => t!("tool.eraser"),
            Tool::Line => t!("tool.line"),
            Tool::Lasso => t!("tool.lasso"),
        }
    }

    pub fn all() -> &'static [Tool] {
        &[Tool::Brush, Tool::Eraser, Tool::Line, Tool::Lasso]
    }

    /// Stable lowercase name used by scripts and the CLI.
    pub fn name(&self) -> &'static str {
        match self {
            Tool::Brush => "brush",
            Tool::Eraser => "eraser",
            Tool::Line => "line",
            Tool::Lasso => "lasso",
        }
    }

    pub fn from_name(name: &str) -> Option<Tool> {
        Tool::all()
            .iter()
            .copied()
            .find(|t| t.name().eq_ignore_ascii_case(name.trim()))
    }

    /// The compact (narrow) layout only offers the brush.
    pub fn available_in_compact(&self) -> bool {
        matches!(self, Tool::Brush)
    }

    /// Brush and eraser paint freehand; holding the snap modifier turns
    /// their gesture into a straight line.
    pub fn is_freehand(&self) -> bool {
        matches!(self, Tool::Brush | Tool::Eraser)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CursorStyle {
    #[default]
    Crosshair,
}

impl CursorStyle {
    pub fn to_egui(self) -> egui::CursorIcon {
        match self {
            CursorStyle::Crosshair => egui::CursorIcon::Crosshair,
        }
    }
}

// ============================================================================
// INPUT EVENTS (client coordinates)
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerEvent {
    Down(Pos2),
    Move(Pos2),
    Up(Option<Pos2>),
    Leave(Option<Pos2>),
    DoubleClick(Pos2),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TouchPoint {
    pub id: u64,
    pub pos: Pos2,
}

/// Each variant carries the touches still on the surface after the event.
#[derive(Clone, Debug, PartialEq)]
pub enum TouchEvent {
    Start(Vec<TouchPoint>),
    Move(Vec<TouchPoint>),
    End(Vec<TouchPoint>),
    Cancel(Vec<TouchPoint>),
}

#[derive(Clone, Debug, PartialEq)]
pub enum KeyInput {
    Pressed { key: Key, modifiers: Modifiers },
    /// Printable text (used for `[` / `]`).
    Text(String),
    /// The line-snap modifier (Shift) went down or up.
    SnapModifier(bool),
}

// ============================================================================
// STATE MACHINE
// ============================================================================

/// Drawing work requested by a pointer transition, in device pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StrokeAction {
    Stamp { from: Pos2, to: Pos2 },
    PreviewLine { from: Pos2, to: Pos2 },
    CommitLine { from: Pos2, to: Pos2 },
    /// A freehand stroke ended; snapshot it.
    EndStroke,
    LassoClick(Pos2),
    LassoCursor(Pos2),
    LassoComplete,
}

/// How a touch event maps onto the pointer path.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TouchRoute {
    Ignore,
    Down(Pos2),
    Move(Pos2),
    /// Finish the gesture at the last known coordinate.
    Up,
    /// End the gesture without committing anything.
    Discard,
}

#[derive(Clone, Debug, Default)]
pub struct PointerSession {
    pub active: bool,
    pub last: Option<Pos2>,
    pub line_anchor: Option<Pos2>,
    pub touch_id: Option<u64>,
    pub last_touch_y: Option<f32>,
    pub touch_scrolling: bool,
    /// Freehand painting has begun for this gesture.
    pub painting_started: bool,
}

#[derive(Clone, Debug, Default)]
pub struct ToolState {
    tool: Tool,
    pointer: PointerSession,
    snap_held: bool,
    cursor: CursorStyle,
}

impl ToolState {
    pub fn new(tool: Tool) -> Self {
        Self { tool, ..Default::default() }
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn pointer(&self) -> &PointerSession {
        &self.pointer
    }

    pub fn cursor(&self) -> CursorStyle {
        self.cursor
    }

    pub fn snap_held(&self) -> bool {
        self.snap_held
    }

    pub fn set_snap_held(&mut self, held: bool) {
        self.snap_held = held;
    }

    /// Switch tools. A freehand stroke in flight is ended (the caller must
    /// apply the returned `EndStroke`); a pending line is dropped.
    pub fn select(&mut self, tool: Tool) -> Option<StrokeAction> {
        let p = std::mem::take(&mut self.pointer);
        self.tool = tool;
        self.cursor = CursorStyle::Crosshair;
        (p.active && p.line_anchor.is_none() && p.painting_started).then_some(StrokeAction::EndStroke)
    }

    pub fn is_drawing_line(&self) -> bool {
        self.pointer.line_anchor.is_some()
    }

    pub fn pointer_down(&mut self, pos: Pos2) -> Option<StrokeAction> {
        let p = &mut self.pointer;
        p.last = Some(pos);
        match self.tool {
            Tool::Lasso => Some(StrokeAction::LassoClick(pos)),
            Tool::Line => {
                p.line_anchor = Some(pos);
                p.active = true;
                None
            }
            Tool::Brush | Tool::Eraser if self.snap_held => {
                p.line_anchor = Some(pos);
                p.active = true;
                None
            }
            Tool::Brush | Tool::Eraser => {
                p.active = true;
                p.painting_started = true;
                Some(StrokeAction::Stamp { from: pos, to: pos })
            }
        }
    }

    pub fn pointer_move(&mut self, pos: Pos2) -> Option<StrokeAction> {
        let p = &mut self.pointer;
        if self.tool == Tool::Lasso {
            return Some(StrokeAction::LassoCursor(pos));
        }
        if !p.active {
            return None;
        }
        if let Some(anchor) = p.line_anchor {
            return Some(StrokeAction::PreviewLine { from: anchor, to: pos });
        }
        let from = p.last.replace(pos).unwrap_or(pos);
        Some(StrokeAction::Stamp { from, to: pos })
    }

    /// Pointer released (or left the surface) at `pos`.
    pub fn pointer_up(&mut self, pos: Pos2) -> Option<StrokeAction> {
        let p = std::mem::take(&mut self.pointer);
        if self.tool == Tool::Lasso || !p.active {
            return None;
        }
        match p.line_anchor {
            Some(from) => Some(StrokeAction::CommitLine { from, to: pos }),
            None => Some(StrokeAction::EndStroke),
        }
    }

    pub fn double_click(&mut self) -> Option<StrokeAction> {
        (self.tool == Tool::Lasso).then_some(StrokeAction::LassoComplete)
    }

    /// Forget the gesture without committing it.
    pub fn discard_gesture(&mut self) {
        self.pointer = PointerSession::default();
    }

    /// Bind, filter and scroll-gate touches. Only a single-touch start binds;
    /// later events follow the bound identifier.
    pub fn route_touch(&mut self, event: &TouchEvent) -> TouchRoute {
        match event {
            TouchEvent::Start(touches) => {
                if touches.len() != 1 || self.pointer.touch_id.is_some() {
                    return TouchRoute::Ignore;
                }
                let t = touches[0];
                self.pointer.touch_id = Some(t.id);
                self.pointer.last_touch_y = Some(t.pos.y);
                self.pointer.touch_scrolling = false;
                TouchRoute::Down(t.pos)
            }
            TouchEvent::Move(touches) => {
                let Some(id) = self.pointer.touch_id else {
                    return TouchRoute::Ignore;
                };
                let Some(t) = touches.iter().find(|t| t.id == id) else {
                    return self.finish_touch();
                };
                let painting = self.pointer.painting_started;
                if let Some(last_y) = self.pointer.last_touch_y
                    && (t.pos.y - last_y).abs() > TOUCH_SCROLL_THRESHOLD
                    && !painting
                {
                    self.pointer.touch_scrolling = true;
                }
                self.pointer.last_touch_y = Some(t.pos.y);
                if self.pointer.touch_scrolling && !painting {
                    TouchRoute::Ignore
                } else {
                    TouchRoute::Move(t.pos)
                }
            }
            TouchEvent::End(remaining) | TouchEvent::Cancel(remaining) => {
                let Some(id) = self.pointer.touch_id else {
                    return TouchRoute::Ignore;
                };
                if remaining.iter().any(|t| t.id == id) {
                    return TouchRoute::Ignore;
                }
                self.finish_touch()
            }
        }
    }

    fn finish_touch(&mut self) -> TouchRoute {
        let scrolled_line = self.pointer.touch_scrolling && self.pointer.line_anchor.is_some();
        self.pointer.touch_id = None;
        self.pointer.last_touch_y = None;
        self.pointer.touch_scrolling = false;
        if scrolled_line {
            self.discard_gesture();
            TouchRoute::Discard
        } else {
            TouchRoute::Up
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(id: u64, x: f32, y: f32) -> TouchPoint {
        TouchPoint { id, pos: Pos2::new(x, y) }
    }

    #[test]
    fn brush_click_stamps_then_ends() {
        let mut t = ToolState::new(Tool::Brush);
        let p = Pos2::new(5.0, 5.0);
        assert_eq!(t.pointer_down(p), Some(StrokeAction::Stamp { from: p, to: p }));
        let q = Pos2::new(9.0, 5.0);
        assert_eq!(t.pointer_move(q), Some(StrokeAction::Stamp { from: p, to: q }));
        assert_eq!(t.pointer_up(q), Some(StrokeAction::EndStroke));
        assert_eq!(t.pointer_move(p), None);
    }

    #[test]
    fn snap_modifier_turns_brush_into_a_line() {
        let mut t = ToolState::new(Tool::Eraser);
        t.set_snap_held(true);
        let a = Pos2::new(1.0, 1.0);
        let b = Pos2::new(50.0, 1.0);
        assert_eq!(t.pointer_down(a), None);
        assert_eq!(t.pointer_move(b), Some(StrokeAction::PreviewLine { from: a, to: b }));
        assert_eq!(t.pointer_up(b), Some(StrokeAction::CommitLine { from: a, to: b }));
        assert!(!t.is_drawing_line());
    }

    #[test]
    fn lasso_tracks_the_cursor_without_a_gesture() {
        let mut t = ToolState::new(Tool::Lasso);
        let p = Pos2::new(3.0, 4.0);
        assert_eq!(t.pointer_move(p), Some(StrokeAction::LassoCursor(p)));
        assert_eq!(t.pointer_down(p), Some(StrokeAction::LassoClick(p)));
        assert_eq!(t.pointer_up(p), None);
        assert_eq!(t.double_click(), Some(StrokeAction::LassoComplete));
    }

    #[test]
    fn select_resets_the_line_anchor() {
        let mut t = ToolState::new(Tool::Line);
        t.pointer_down(Pos2::ZERO);
        assert!(t.is_drawing_line());
        assert_eq!(t.select(Tool::Line), None);
        assert!(!t.is_drawing_line());
        assert_eq!(t.pointer_up(Pos2::ZERO), None);
    }

    #[test]
    fn select_ends_a_freehand_stroke_in_flight() {
        let mut t = ToolState::new(Tool::Brush);
        t.pointer_down(Pos2::new(10.0, 10.0));
        t.pointer_move(Pos2::new(20.0, 10.0));
        assert_eq!(t.select(Tool::Line), Some(StrokeAction::EndStroke));
        assert!(!t.pointer().active);
        assert_eq!(t.pointer_up(Pos2::new(30.0, 10.0)), None);
        assert_eq!(t.select(Tool::Brush), None);
    }

    #[test]
    fn leave_mid_stroke_ends_the_gesture() {
        let mut t = ToolState::new(Tool::Brush);
        t.pointer_down(Pos2::new(10.0, 10.0));
        t.pointer_move(Pos2::new(40.0, 10.0));
        assert_eq!(t.pointer_up(Pos2::new(50.0, 10.0)), Some(StrokeAction::EndStroke));
        assert_eq!(t.pointer_move(Pos2::new(60.0, 10.0)), None);

        let mut line = ToolState::new(Tool::Line);
        let a = Pos2::new(5.0, 5.0);
        let edge = Pos2::new(100.0, 5.0);
        line.pointer_down(a);
        assert_eq!(line.pointer_up(edge), Some(StrokeAction::CommitLine { from: a, to: edge }));
    }

    #[test]
    fn second_finger_and_foreign_ids_are_ignored() {
        let mut t = ToolState::new(Tool::Brush);
        assert_eq!(t.route_touch(&TouchEvent::Start(vec![touch(1, 0.0, 0.0), touch(2, 5.0, 5.0)])), TouchRoute::Ignore);
        assert_eq!(t.route_touch(&TouchEvent::Start(vec![touch(7, 10.0, 10.0)])), TouchRoute::Down(Pos2::new(10.0, 10.0)));
        assert_eq!(t.route_touch(&TouchEvent::Start(vec![touch(8, 10.0, 10.0)])), TouchRoute::Ignore);
        assert_eq!(t.route_touch(&TouchEvent::End(vec![touch(7, 10.0, 10.0)])), TouchRoute::Ignore);
        assert_eq!(t.route_touch(&TouchEvent::Move(vec![touch(9, 1.0, 1.0)])), TouchRoute::Up);
        assert_eq!(t.pointer().touch_id, None);
    }

    #[test]
    fn vertical_swipe_before_painting_is_a_scroll() {
        let mut t = ToolState::new(Tool::Line);
        let down = t.route_touch(&TouchEvent::Start(vec![touch(1, 10.0, 10.0)]));
        if let TouchRoute::Down(p) = down {
            t.pointer_down(p);
        }
        assert_eq!(t.route_touch(&TouchEvent::Move(vec![touch(1, 10.0, 40.0)])), TouchRoute::Ignore);
        assert_eq!(t.route_touch(&TouchEvent::Move(vec![touch(1, 20.0, 41.0)])), TouchRoute::Ignore);
        assert_eq!(t.route_touch(&TouchEvent::End(vec![])), TouchRoute::Discard);
        assert!(!t.is_drawing_line());
    }

    #[test]
    fn painting_touch_always_draws() {
        let mut t = ToolState::new(Tool::Brush);
        if let TouchRoute::Down(p) = t.route_touch(&TouchEvent::Start(vec![touch(1, 10.0, 10.0)])) {
            t.pointer_down(p);
        }
        assert_eq!(
            t.route_touch(&TouchEvent::Move(vec![touch(1, 10.0, 80.0)])),
            TouchRoute::Move(Pos2::new(10.0, 80.0))
        );
        assert_eq!(t.route_touch(&TouchEvent::End(vec![])), TouchRoute::Up);
    }

    #[test]
    fn tool_names_round_trip_and_compact_only_allows_brush() {
        for tool in Tool::all() {
            assert_eq!(Tool::from_name(tool.name()), Some(*tool));
        }
        assert_eq!(Tool::from_name(" LASSO "), Some(Tool::Lasso));
        assert!(Tool::Brush.available_in_compact());
        assert!(!Tool::Lasso.available_in_compact());
    }
}
