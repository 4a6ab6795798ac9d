// ============================================================================
// PromptCanvas CLI: headless gesture replay via command-line arguments
// ============================================================================
//
// Usage examples:
//   promptcanvas --input room.jpg --script marks.rhai --output marked.png --prompt
//   promptcanvas -i shots/*.jpg -s marks.rhai --output-dir out/
//   promptcanvas --script doodle.rhai --portrait -o doodle.png
//
// No window is opened in CLI mode. Each input gets its own session, driven by
// the script on a manual clock.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use clap::Parser;

use crate::canvas::Viewport;
use crate::host::{Collaborators, DownloadQueue, NotificationLog, PromptMailbox};
use crate::ops::scripting::run_script;
use crate::session::PaintSession;
use crate::settings::{PaintConfig, PaintSettings};
use crate::timer::ManualClock;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// PromptCanvas headless canvas runner.
///
/// Load a reference image, replay a gesture script, export the result and
/// print the generated prompt.
#[derive(Parser, Debug)]
#[command(
    name = "promptcanvas",
    about = "PromptCanvas headless gesture runner",
    long_about = "Replay Rhai gesture scripts on a paint canvas without opening the\n\
                  window. Inputs are PNG, JPEG, WEBP or BMP reference images; the\n\
                  marked canvas is exported as PNG.\n\n\
                  Example:\n  \
                  promptcanvas --input room.jpg --script marks.rhai --output marked.png --prompt"
)]
pub struct CliArgs {
    /// Reference image(s). Glob patterns accepted (e.g. "shots/*.jpg").
    /// Without inputs the script runs once on the default canvas.
    #[arg(short, long, num_args = 1..)]
    pub input: Vec<String>,

    /// Rhai gesture script run on each canvas.
    #[arg(short, long, value_name = "SCRIPT.rhai")]
    pub script: Option<PathBuf>,

    /// Output PNG path. Only valid for a single canvas.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch runs.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Rotate each input 90° clockwise on import.
    #[arg(long)]
    pub rotate_import: bool,

    /// Export with the forced counter-clockwise rotation.
    #[arg(long)]
    pub portrait: bool,

    /// Print the generated prompt for each canvas.
    #[arg(long)]
    pub prompt: bool,

    /// Skip the export watermark.
    #[arg(long)]
    pub no_watermark: bool,

    /// Simulated window size.
    #[arg(long, default_value_t = 1280.0)]
    pub width: f32,

    #[arg(long, default_value_t = 800.0)]
    pub height: f32,

    /// Language for notifications and prompt text (en, zh-CN).
    #[arg(long, value_name = "CODE")]
    pub lang: Option<String>,

    /// Print notifications, script console output and timing.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Returns `true` when any CLI-mode flag is present in the real process arguments.
    /// Used by `main()` to route before creating an eframe window.
    pub fn is_cli_mode() -> bool {
        std::env::args().any(|a| matches!(a.as_str(), "--input" | "-i" | "--script" | "-s"))
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = every canvas succeeded, `1` = one or more failed.
pub fn run(args: CliArgs) -> ExitCode {
    let settings = PaintSettings::load();
    crate::i18n::init(Some(args.lang.as_deref().unwrap_or(&settings.language)));

    let mut config = PaintConfig::from(&settings);
    if args.no_watermark {
        config.watermark = None;
    }

    let inputs: Vec<Option<PathBuf>> = if args.input.is_empty() {
        vec![None]
    } else {
        let resolved = resolve_inputs(&args.input);
        if resolved.is_empty() {
            eprintln!("error: no input files matched the given pattern(s).");
            return ExitCode::FAILURE;
        }
        resolved.into_iter().map(Some).collect()
    };

    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    let script_source: Option<String> = match &args.script {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(src) => Some(src),
            Err(e) => {
                eprintln!("error: could not read script '{}': {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => None,
    };

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!("error: could not create output directory '{}': {}", dir.display(), e);
        return ExitCode::FAILURE;
    }

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input) in inputs.iter().enumerate() {
        if multi || args.verbose {
            let label = input.as_deref().map(|p| p.display().to_string());
            println!("[{}/{}] {}", idx + 1, total, label.as_deref().unwrap_or("(default canvas)"));
        }
        let file_start = Instant::now();

        match run_one(input.as_deref(), script_source.as_deref(), &config, &args) {
            Ok(written) => {
                if args.verbose || multi {
                    println!(
                        "  → {} ({:.0}ms)",
                        written.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-canvas pipeline
// ============================================================================

fn run_one(
    input: Option<&Path>,
    script: Option<&str>,
    config: &PaintConfig,
    args: &CliArgs,
) -> Result<PathBuf, String> {
    let clock = ManualClock::new();
    let notifications = NotificationLog::new();
    let downloads = DownloadQueue::new();
    let mailbox = PromptMailbox::new();
    let collaborators = Collaborators::none()
        .with_notifier(notifications.clone())
        .with_download_sink(downloads.clone())
        .with_prompt_sink(mailbox);

    let viewport = Viewport::new(args.width, args.height, 1.0);
    let session = PaintSession::new(config.clone(), viewport, collaborators, Box::new(clock.clone()))
        .map_err(|e| format!("canvas init failed: {}", e))?;
    let session = Arc::new(Mutex::new(session));

    // -- Step 1: Load ----------------------------------------------------
    if let Some(path) = input {
        let bytes = std::fs::read(path).map_err(|e| format!("load failed: {}", e))?;
        let mut s = session.lock().unwrap_or_else(|e| e.into_inner());
        s.upload(&bytes, args.rotate_import).map_err(|e| format!("load failed: {}", e))?;
    }

    // -- Step 2: Replay script (optional) --------------------------------
    if let Some(src) = script {
        let console = run_script(session.clone(), clock.clone(), src)
            .map_err(|e| format!("script error: {}", e.friendly_message()))?;
        if args.verbose {
            for line in &console {
                println!("  [script] {}", line);
            }
        }
    }

    let mut s = session.lock().unwrap_or_else(|e| e.into_inner());

    // -- Step 3: Prompt --------------------------------------------------
    if args.prompt {
        println!("{}", s.generate_prompt());
    }

    // -- Step 4: Export --------------------------------------------------
    let exported = if args.portrait { s.save_rotated_image() } else { s.save_image() };
    let exported = exported.map_err(|e| format!("export failed: {}", e))?;
    drop(s);

    if args.verbose {
        for (message, severity) in notifications.drain() {
            println!("  [{:?}] {}", severity, message);
        }
    }

    let download = downloads
        .drain()
        .pop()
        .ok_or_else(|| "export produced no file".to_string())?;
    let output = build_output_path(
        input,
        args.output.as_deref(),
        args.output_dir.as_deref(),
        &exported.filename,
    );
    std::fs::write(&output, &download.bytes)
        .map_err(|e| format!("could not write '{}': {}", output.display(), e))?;
    Ok(output)
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);
        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// Priority:
/// 1. `--output`
/// 2. `--output-dir`, named after the input stem (or the export name)
/// 3. next to the input as `<stem>_marked.png`, else the export name in the
///    working directory
fn build_output_path(
    input: Option<&Path>,
    output: Option<&Path>,
    output_dir: Option<&Path>,
    export_name: &str,
) -> PathBuf {
    if let Some(out) = output {
        return out.to_path_buf();
    }
    let stem = input
        .and_then(|p| p.file_stem())
        .map(|s| s.to_string_lossy().into_owned());

    match (output_dir, stem) {
        (Some(dir), Some(stem)) => dir.join(format!("{}.png", stem)),
        (Some(dir), None) => dir.join(export_name),
        (None, Some(stem)) => {
            let parent = input.and_then(|p| p.parent()).unwrap_or(Path::new("."));
            parent.join(format!("{}_marked.png", stem))
        }
        (None, None) => PathBuf::from(export_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_path_priorities() {
        let input = Path::new("shots/room.jpg");
        assert_eq!(
            build_output_path(Some(input), Some(Path::new("x.png")), None, "AI绘画_1.png"),
            PathBuf::from("x.png")
        );
        assert_eq!(
            build_output_path(Some(input), None, Some(Path::new("out")), "AI绘画_1.png"),
            PathBuf::from("out/room.png")
        );
        assert_eq!(
            build_output_path(Some(input), None, None, "AI绘画_1.png"),
            PathBuf::from("shots/room_marked.png")
        );
        assert_eq!(build_output_path(None, None, None, "AI绘画_1.png"), PathBuf::from("AI绘画_1.png"));
    }

    #[test]
    fn cli_args_parse() {
        let args = CliArgs::parse_from([
            "promptcanvas", "-i", "a.png", "b.png", "-s", "m.rhai", "--output-dir", "out", "--portrait",
        ]);
        assert_eq!(args.input, ["a.png", "b.png"]);
        assert!(args.portrait);
        assert!(!args.prompt);
        assert_eq!(args.width, 1280.0);
    }
}
