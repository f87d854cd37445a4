// src/main.rs
mod app;
mod ui;

use anyhow::{anyhow, Result};
use eframe::egui;
use gesture_control::capture::NokhwaFactory;
use gesture_control::data::CsvActionLog;
use gesture_control::{AppConfig, Collaborators, Pipeline};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_pipeline(config: &AppConfig) -> Result<Pipeline> {
    let actions = config.action_table();
    let log = CsvActionLog::open(config.action_log_path())?;
    info!(path = %log.path().display(), "recording actions");

    let parts = Collaborators {
        capture: Arc::new(NokhwaFactory),
        estimator: config.estimator.build()?,
        dispatcher: config.dispatcher(actions.clone()),
        log: Arc::new(log),
    };

    Ok(Pipeline::new(parts, actions, config.pipeline_config()))
}

fn main() -> Result<()> {
    let config = AppConfig::load()?;
    init_tracing(&config.log_level);

    if let Ok(p) = std::env::current_exe() {
        info!("running from {}", p.display());
    }

    let pipeline = build_pipeline(&config)?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 820.0])
            .with_min_inner_size([960.0, 640.0]),
        centered: true,
        ..Default::default()
    };

    eframe::run_native(
        "Gesture Control",
        options,
        Box::new(move |cc| {
            cc.egui_ctx.set_visuals(ui::create_visuals());
            Box::new(app::GestureControlApp::new(cc, pipeline))
        }),
    )
    .map_err(|e| anyhow!("dashboard failed: {e}"))
}
