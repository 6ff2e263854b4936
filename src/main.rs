mod app;

use app::TrackerApp;
use eframe::egui;
use iss_tracker::config::{default_config_path, TrackerConfig};

fn main() -> eframe::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = TrackerConfig::load_or_default(&default_config_path());

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1200.0, 1000.0]),
        ..Default::default()
    };

    eframe::run_native(
        "ISS Tracker",
        options,
        Box::new(move |_cc| Ok(Box::new(TrackerApp::new(config)))),
    )
}
