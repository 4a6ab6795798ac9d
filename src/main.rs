// GUI-subsystem binary on Windows: CLI mode writes through the parent console
// when one is attached.
#![windows_subsystem = "windows"]

use eframe::egui;
use promptcanvas::app::PromptCanvasApp;
use promptcanvas::{cli, i18n, logger};

fn main() -> Result<(), eframe::Error> {
    // -- CLI / headless mode ---------------------------------------------
    if cli::CliArgs::is_cli_mode() {
        use clap::Parser;
        let args = cli::CliArgs::parse();
        logger::echo_to_stderr(args.verbose);
        let code = cli::run(args);
        std::process::exit(if code == std::process::ExitCode::SUCCESS {
            0
        } else {
            1
        });
    }

    // -- GUI mode -----------------------------------------------------

    // Initialize session log (overwrites previous session log)
    logger::init();

    let settings = promptcanvas::settings::PaintSettings::load();
    i18n::init(Some(&settings.language));

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([360.0, 480.0])
            .with_title("PromptCanvas"),
        ..Default::default()
    };

    eframe::run_native(
        "PromptCanvas",
        options,
        Box::new(|cc| Box::new(PromptCanvasApp::new(cc))),
    )
}
