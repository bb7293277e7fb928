//! Main application entry point.

use clap::Parser;
use sketchsync_app::{App, AppConfig};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Starting SketchSync");

    let config = AppConfig::parse();
    if let Err(e) = App::new(config).and_then(App::run) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
