use anyhow::anyhow;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use chunk_lens::app::ExplorerApp;
use chunk_lens::config::{Args, ExplorerConfig};

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn main() -> anyhow::Result<()> {
    init_logging();

    let config = ExplorerConfig::from(Args::parse());
    tracing::info!(data_dir = %config.data_dir.display(), "starting chunk-lens");

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([1440.0, 920.0]),
        ..Default::default()
    };

    eframe::run_native(
        "chunk-lens",
        options,
        Box::new(move |cc| Ok(Box::new(ExplorerApp::new(cc, config)))),
    )
    .map_err(|error| anyhow!("failed to run the explorer window: {error}"))
}
