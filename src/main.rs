// Hide console window in release builds (Windows GUI app)
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod app;
mod channel;
mod config;
mod ui;
mod updater;
mod util;

use std::time::Duration;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::channel::UpdateCommand;
use crate::config::Config;
use crate::updater::Coordinator;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "lumen=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Lumen {}", env!("CARGO_PKG_VERSION"));

    let config = Config::load().unwrap_or_else(|e| {
        tracing::warn!("Failed to load configuration, using defaults: {}", e);
        Config::default()
    });

    let (coordinator_end, surface_end) = channel::channel();
    // Retained so we can hand the coordinator a shutdown after the window closes
    let shutdown_commands = surface_end.command_sender();

    let viewport = egui::ViewportBuilder::default()
        .with_inner_size([900.0, 670.0])
        .with_min_inner_size([600.0, 400.0])
        .with_title("Lumen");

    let native_options = eframe::NativeOptions {
        viewport,
        persist_window: true,
        ..Default::default()
    };

    let updates_config = config.updates.clone();
    eframe::run_native(
        "Lumen",
        native_options,
        Box::new(move |cc| {
            let coordinator =
                Coordinator::new(coordinator_end, updates_config, Some(cc.egui_ctx.clone()))?;
            tokio::spawn(coordinator.run());
            Ok(Box::new(app::LumenApp::new(cc, &config, surface_end)))
        }),
    )
    .map_err(|e| anyhow::anyhow!("Failed to run application: {}", e))?;

    // Window closed. Let the coordinator finish up (it installs a staged
    // update here when auto_install_on_quit is set).
    let (ack_tx, ack_rx) = tokio::sync::oneshot::channel();
    if shutdown_commands
        .send(UpdateCommand::Shutdown { ack: ack_tx })
        .is_ok()
    {
        let _ = tokio::time::timeout(Duration::from_secs(2), ack_rx).await;
    }

    Ok(())
}
