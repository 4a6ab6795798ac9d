//! Rhai gesture scripts: drive a [`PaintSession`] headlessly with pointer,
//! key and timer calls. Time only moves when the script calls `wait(ms)`.
//!
//! Coordinates are device pixels on the drawing surface.

use rhai::{AST, Dynamic, Engine, EvalAltResult, ImmutableString, Scope};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use eframe::egui::{Modifiers, Pos2};

use crate::components::colors::parse_hex;
use crate::components::tools::{KeyInput, PointerEvent, Tool};
use crate::error::PaintError;
use crate::session::PaintSession;
use crate::settings::parse_key_name;
use crate::timer::ManualClock;

pub type SharedSession = Arc<Mutex<PaintSession>>;

/// Longest single `wait()`.
const MAX_WAIT_MS: i64 = 60_000;

// ============================================================================
// Error type
// ============================================================================

#[derive(Debug, Clone)]
pub struct ScriptError {
    pub message: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl ScriptError {
    fn from_rhai(message: String, pos: rhai::Position) -> Self {
        let line = pos.line().filter(|&l| l > 0);
        let column = pos.position().filter(|&c| c > 0);
        Self { message, line, column }
    }

    /// Message with location context and a hint for the common mistakes.
    pub fn friendly_message(&self) -> String {
        let raw = &self.message;
        let mut parts = Vec::new();
        match (self.line, self.column) {
            (Some(line), Some(col)) => parts.push(format!("Error on line {}, column {}:", line, col)),
            (Some(line), None) => parts.push(format!("Error on line {}:", line)),
            _ => parts.push("Script error:".to_string()),
        }
        let cleaned = raw.split(" (line ").next().unwrap_or(raw);
        if raw.contains("Function not found:") {
            parts.push(format!("  {}", cleaned));
            parts.push(String::new());
            parts.push("  Tip: coordinates may be ints or floats, names are strings:".to_string());
            parts.push("    down(10, 20); tool(\"lasso\"); key(\"Ctrl+Z\");".to_string());
        } else if raw.contains("Too many operations") {
            parts.push("  Script exceeded the maximum operation limit (50 million ops).".to_string());
            parts.push(String::new());
            parts.push("  Tip: check for a loop that never ends.".to_string());
        } else {
            parts.push(format!("  {}", cleaned));
        }
        parts.join("\n")
    }
}

impl std::fmt::Display for ScriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let (Some(line), Some(col)) = (self.line, self.column) {
            write!(f, "Line {}, Col {}: {}", line, col, self.message)
        } else if let Some(line) = self.line {
            write!(f, "Line {}: {}", line, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl From<ScriptError> for PaintError {
    fn from(e: ScriptError) -> Self {
        PaintError::Script(e.to_string())
    }
}

// ============================================================================
// Script context
// ============================================================================

struct ScriptContext {
    session: SharedSession,
    clock: ManualClock,
    console_output: Vec<String>,
}

type SharedContext = Arc<Mutex<ScriptContext>>;

fn with_session<R>(ctx: &SharedContext, f: impl FnOnce(&mut PaintSession) -> R) -> R {
    let lock = ctx.lock().unwrap_or_else(|e| e.into_inner());
    let mut session = lock.session.lock().unwrap_or_else(|e| e.into_inner());
    f(&mut session)
}

// ============================================================================
// Engine construction
// ============================================================================

fn create_engine(ctx: SharedContext) -> Engine {
    let mut engine = Engine::new();

    // Sandbox limits
    engine.set_max_operations(50_000_000);
    engine.set_max_call_levels(64);
    engine.set_max_expr_depths(64, 64);
    engine.set_max_string_size(10_000);
    engine.set_max_array_size(10_000);
    engine.set_max_map_size(1_000);

    register_canvas_api(&mut engine, ctx.clone());
    register_pointer_api(&mut engine, ctx.clone());
    register_tool_api(&mut engine, ctx.clone());
    register_utility_api(&mut engine, ctx);

    engine
}

// ============================================================================
// Canvas info
// ============================================================================

fn register_canvas_api(engine: &mut Engine, ctx: SharedContext) {
    let c = ctx.clone();
    engine.register_fn("width", move || -> i64 {
        with_session(&c, |s| s.geometry().pixel_width as i64)
    });

    let c = ctx.clone();
    engine.register_fn("height", move || -> i64 {
        with_session(&c, |s| s.geometry().pixel_height as i64)
    });

    // pixel(x, y) -> [r, g, b, a] of the drawing layer
    let c = ctx.clone();
    engine.register_fn("pixel", move |x: i64, y: i64| -> rhai::Array {
        with_session(&c, |s| {
            let drawing = &s.stack().drawing;
            if x < 0 || y < 0 || x as u32 >= drawing.width() || y as u32 >= drawing.height() {
                return vec![Dynamic::from(0_i64); 4];
            }
            drawing
                .get_pixel(x as u32, y as u32)
                .0
                .iter()
                .map(|&v| Dynamic::from(v as i64))
                .collect()
        })
    });

    let c = ctx.clone();
    engine.register_fn("undo_depth", move || -> i64 {
        with_session(&c, |s| s.history().undo_count() as i64)
    });

    let c = ctx;
    engine.register_fn("lasso_points", move || -> i64 {
        with_session(&c, |s| s.lasso().len() as i64)
    });
}

// ============================================================================
// Pointer gestures (int and float coordinates)
// ============================================================================

#[derive(Clone, Copy)]
enum Gesture {
    Down,
    Move,
    Up,
    Click,
    DoubleClick,
}

fn gesture(ctx: &SharedContext, kind: Gesture, x: f64, y: f64) {
    with_session(ctx, |s| {
        let p = s.device_to_client(Pos2::new(x as f32, y as f32));
        match kind {
            Gesture::Down => s.pointer(PointerEvent::Down(p)),
            Gesture::Move => s.pointer(PointerEvent::Move(p)),
            Gesture::Up => s.pointer(PointerEvent::Up(Some(p))),
            Gesture::Click => {
                s.pointer(PointerEvent::Down(p));
                s.pointer(PointerEvent::Up(Some(p)));
            }
            Gesture::DoubleClick => s.pointer(PointerEvent::DoubleClick(p)),
        }
    });
}

fn register_pointer_api(engine: &mut Engine, ctx: SharedContext) {
    for (name, kind) in [
        ("down", Gesture::Down),
        ("move_to", Gesture::Move),
        ("up", Gesture::Up),
        ("click", Gesture::Click),
        ("double_click", Gesture::DoubleClick),
    ] {
        let c = ctx.clone();
        engine.register_fn(name, move |x: i64, y: i64| gesture(&c, kind, x as f64, y as f64));
        let c = ctx.clone();
        engine.register_fn(name, move |x: f64, y: f64| gesture(&c, kind, x, y));
    }

    // drag(x0, y0, x1, y1, steps): press, move in even steps, release
    let c = ctx.clone();
    engine.register_fn("drag", move |x0: i64, y0: i64, x1: i64, y1: i64, steps: i64| {
        drag(&c, (x0 as f64, y0 as f64), (x1 as f64, y1 as f64), steps);
    });
    let c = ctx;
    engine.register_fn("drag", move |x0: f64, y0: f64, x1: f64, y1: f64, steps: i64| {
        drag(&c, (x0, y0), (x1, y1), steps);
    });
}

fn drag(ctx: &SharedContext, from: (f64, f64), to: (f64, f64), steps: i64) {
    let steps = steps.clamp(1, 1_000);
    gesture(ctx, Gesture::Down, from.0, from.1);
    for i in 1..=steps {
        let t = i as f64 / steps as f64;
        gesture(
            ctx,
            Gesture::Move,
            from.0 + (to.0 - from.0) * t,
            from.1 + (to.1 - from.1) * t,
        );
    }
    gesture(ctx, Gesture::Up, to.0, to.1);
}

// ============================================================================
// Tools, colors, keys
// ============================================================================

/// `"Ctrl+Shift+Z"`, `"Enter"`, `"["`.
fn parse_key_input(spec: &str) -> Option<KeyInput> {
    let mut modifiers = Modifiers::NONE;
    let mut parts: Vec<&str> = spec.split('+').map(str::trim).collect();
    let last = parts.pop()?;
    for m in parts {
        match m.to_ascii_lowercase().as_str() {
            "ctrl" | "cmd" => modifiers.ctrl = true,
            "shift" => modifiers.shift = true,
            "alt" => modifiers.alt = true,
            _ => return None,
        }
    }
    if modifiers.is_none() && (last == "[" || last == "]") {
        return Some(KeyInput::Text(last.to_string()));
    }
    let key = parse_key_name(last)?;
    Some(KeyInput::Pressed { key, modifiers })
}

fn register_tool_api(engine: &mut Engine, ctx: SharedContext) {
    let c = ctx.clone();
    engine.register_fn("tool", move |name: ImmutableString| -> Result<bool, Box<EvalAltResult>> {
        let tool = Tool::from_name(&name).ok_or_else(|| format!("unknown tool '{}'", name))?;
        Ok(with_session(&c, |s| s.select_tool(tool)))
    });

    // color("#rrggbb"): palette entries switch to the brush, other colors are set as is
    let c = ctx.clone();
    engine.register_fn("color", move |hex: ImmutableString| -> Result<(), Box<EvalAltResult>> {
        let color = parse_hex(&hex).ok_or_else(|| format!("invalid color '{}'", hex))?;
        with_session(&c, |s| {
            let index = s.palette().entries().iter().position(|e| e.color == color);
            match index {
                Some(i) => {
                    s.select_color(i);
                }
                None => s.set_color(color),
            }
        });
        Ok(())
    });

    let c = ctx.clone();
    engine.register_fn("color_index", move |index: i64| -> bool {
        index >= 0 && with_session(&c, |s| s.select_color(index as usize))
    });

    let c = ctx.clone();
    engine.register_fn("add_color", move |name: ImmutableString| -> bool {
        with_session(&c, |s| s.add_random_color(&name).is_ok())
    });

    let c = ctx.clone();
    engine.register_fn("brush_size", move |size: i64| {
        with_session(&c, |s| s.set_brush_size(size.clamp(0, u32::MAX as i64) as u32));
    });

    let c = ctx.clone();
    engine.register_fn("key", move |spec: ImmutableString| -> Result<(), Box<EvalAltResult>> {
        let input = parse_key_input(&spec).ok_or_else(|| format!("unknown key '{}'", spec))?;
        with_session(&c, |s| s.key(input));
        Ok(())
    });

    let c = ctx.clone();
    engine.register_fn("shift", move |held: bool| {
        with_session(&c, |s| s.key(KeyInput::SnapModifier(held)));
    });

    let c = ctx.clone();
    engine.register_fn("undo", move || {
        with_session(&c, |s| {
            s.undo();
        });
    });

    let c = ctx.clone();
    engine.register_fn("redo", move || {
        with_session(&c, |s| {
            s.redo();
        });
    });

    let c = ctx.clone();
    engine.register_fn("clear", move || with_session(&c, |s| s.clear_canvas()));

    let c = ctx.clone();
    engine.register_fn("generate_prompt", move || -> String {
        with_session(&c, |s| s.generate_prompt())
    });

    let c = ctx.clone();
    engine.register_fn("save_prompt", move || -> bool { with_session(&c, |s| s.save_prompt()) });

    let c = ctx;
    engine.register_fn("optimize", move || -> bool { with_session(&c, |s| s.optimize_to_ai()) });
}

// ============================================================================
// Time & console
// ============================================================================

fn register_utility_api(engine: &mut Engine, ctx: SharedContext) {
    // wait(ms): advance the script clock and fire due timers
    let c = ctx.clone();
    engine.register_fn("wait", move |ms: i64| {
        let ms = ms.clamp(0, MAX_WAIT_MS) as u64;
        let lock = c.lock().unwrap_or_else(|e| e.into_inner());
        lock.clock.advance(Duration::from_millis(ms));
        let mut session = lock.session.lock().unwrap_or_else(|e| e.into_inner());
        session.tick();
    });

    let c = ctx;
    engine.on_print(move |msg| {
        let mut lock = c.lock().unwrap_or_else(|e| e.into_inner());
        lock.console_output.push(msg.to_string());
    });
}

// ============================================================================
// Public execution API
// ============================================================================

pub fn compile_script(source: &str) -> Result<AST, ScriptError> {
    let engine = Engine::new();
    engine
        .compile(source)
        .map_err(|e| ScriptError::from_rhai(e.to_string(), e.position()))
}

/// Run `source` against `session`. `clock` must be the clock the session was
/// built with. Returns the lines the script printed.
pub fn run_script(
    session: SharedSession,
    clock: ManualClock,
    source: &str,
) -> Result<Vec<String>, ScriptError> {
    let start = std::time::Instant::now();
    let ctx = Arc::new(Mutex::new(ScriptContext { session, clock, console_output: Vec::new() }));
    let engine = create_engine(ctx.clone());
    let mut scope = Scope::new();

    let ast = engine
        .compile(source)
        .map_err(|e| ScriptError::from_rhai(e.to_string(), e.position()))?;
    engine
        .run_ast_with_scope(&mut scope, &ast)
        .map_err(|e| ScriptError::from_rhai(e.to_string(), e.position()))?;

    drop(engine);
    let lock = ctx.lock().unwrap_or_else(|e| e.into_inner());
    crate::log_info!(
        "script: finished in {} ms, {} console lines",
        start.elapsed().as_millis(),
        lock.console_output.len()
    );
    Ok(lock.console_output.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Viewport;
    use crate::host::Collaborators;
    use crate::settings::PaintConfig;

    fn shared() -> (SharedSession, ManualClock) {
        let clock = ManualClock::new();
        let session = PaintSession::new(
            PaintConfig::default(),
            Viewport::new(1280.0, 1000.0, 1.0),
            Collaborators::none(),
            Box::new(clock.clone()),
        )
        .unwrap();
        (Arc::new(Mutex::new(session)), clock)
    }

    #[test]
    fn click_paints_a_square() {
        let (session, clock) = shared();
        run_script(session.clone(), clock, "brush_size(10); click(50, 50);").unwrap();
        let s = session.lock().unwrap();
        assert_eq!(s.stack().drawing.get_pixel(50, 50)[3], 255);
        assert_eq!(s.stack().drawing.get_pixel(60, 50)[3], 0);
    }

    #[test]
    fn wait_drives_the_lasso_timeout() {
        let (session, clock) = shared();
        let src = r#"
            tool("lasso");
            click(100, 100); click(300, 100); click(100, 300);
            print(lasso_points());
            wait(2800);
            print(lasso_points());
        "#;
        let out = run_script(session.clone(), clock, src).unwrap();
        assert_eq!(out, ["3", "0"]);
        let s = session.lock().unwrap();
        assert_eq!(s.stack().drawing.get_pixel(150, 150)[3], 255);
    }

    #[test]
    fn float_coordinates_and_key_specs() {
        let (session, clock) = shared();
        let src = r#"
            drag(10.5, 10.5, 80.5, 10.5, 7);
            print(undo_depth());
            key("Ctrl+Z");
            print(undo_depth());
            key("]");
        "#;
        let out = run_script(session.clone(), clock, src).unwrap();
        assert_eq!(out, ["2", "1"]);
        assert_eq!(session.lock().unwrap().brush_size(), 21);
    }

    #[test]
    fn errors_carry_a_line_number() {
        let (session, clock) = shared();
        let err = run_script(session, clock, "click(1, 1);\ntool(\"spray\");").unwrap_err();
        assert_eq!(err.line, Some(2));
        assert!(err.message.contains("spray"));
        assert!(parse_key_input("Hyper+Z").is_none());
    }
}
