//! The update coordinator.
//!
//! Owns the lifecycle state machine and all update side effects. Runs as
//! a background tokio task: it consumes commands from the surface and
//! events from its own check/download tasks, and pushes status messages
//! back over the update channel. The surface never mutates update state.

use tokio::sync::mpsc;

use crate::channel::{CoordinatorEndpoint, SurfaceMessage, UpdateCommand};
use crate::config::{ShowNotificationOn, UpdatesConfig};

use super::lifecycle::{Effect, Lifecycle};
use super::{download, install, FeedClient, UpdateError, UpdaterEvent};

pub struct Coordinator {
    lifecycle: Lifecycle,
    feed: FeedClient,
    config: UpdatesConfig,
    endpoint: CoordinatorEndpoint,
    /// Sender handed to spawned check/download tasks
    events_tx: mpsc::UnboundedSender<UpdaterEvent>,
    events_rx: mpsc::UnboundedReceiver<UpdaterEvent>,
    /// Repaint/close handle into the UI; absent in headless tests
    egui_ctx: Option<egui::Context>,
}

impl Coordinator {
    pub fn new(
        endpoint: CoordinatorEndpoint,
        config: UpdatesConfig,
        egui_ctx: Option<egui::Context>,
    ) -> Result<Self, UpdateError> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Ok(Self {
            lifecycle: Lifecycle::new(&config),
            feed: FeedClient::new()?,
            config,
            endpoint,
            events_tx,
            events_rx,
            egui_ctx,
        })
    }

    /// Run the coordinator until the surface disconnects or a shutdown
    /// command arrives.
    pub async fn run(mut self) {
        if self.config.show_notification_on == ShowNotificationOn::Always {
            self.push(SurfaceMessage::Show);
        }

        // One timed check shortly after startup, so the UI is up first.
        // Development builds skip it entirely.
        let mut startup_pending = self.config.check_on_startup && !self.config.dev_mode();
        let startup_check = tokio::time::sleep(self.config.startup_check_delay());
        tokio::pin!(startup_check);

        loop {
            tokio::select! {
                _ = &mut startup_check, if startup_pending => {
                    startup_pending = false;
                    tracing::info!("Running startup update check");
                    self.begin_check();
                }
                command = self.endpoint.commands.recv() => {
                    match command {
                        Some(command) => {
                            if self.handle_command(command) {
                                break;
                            }
                        }
                        // Surface endpoint dropped; nothing left to serve
                        None => break,
                    }
                }
                Some(event) = self.events_rx.recv() => {
                    self.handle_event(event);
                }
            }
        }

        tracing::debug!("Update coordinator stopped");
    }

    /// Handle one surface command. Returns true when the loop should end.
    fn handle_command(&mut self, command: UpdateCommand) -> bool {
        match command {
            UpdateCommand::CheckForUpdates { reply } => {
                let outcome = if self.config.dev_mode() {
                    tracing::debug!("Skipping update check in development mode");
                    Ok(())
                } else if self.config.feed_url.is_empty() {
                    Err("no update feed configured".to_string())
                } else {
                    self.begin_check();
                    Ok(())
                };
                let _ = reply.send(outcome);
            }
            UpdateCommand::QuitAndInstall => self.quit_and_install(),
            UpdateCommand::GetVersion { reply } => {
                let _ = reply.send(env!("CARGO_PKG_VERSION").to_string());
            }
            UpdateCommand::Shutdown { ack } => {
                if self.config.auto_install_on_quit {
                    if let Some(staged) = self.lifecycle.take_staged() {
                        tracing::info!("Installing staged update {} on quit", staged.version);
                        if let Err(e) = install::launch_installer(&staged) {
                            tracing::error!("Install on quit failed: {}", e);
                        }
                    }
                }
                let _ = ack.send(());
                return true;
            }
        }
        false
    }

    /// Apply the staged update and close the application.
    ///
    /// Strictly gated on a previously downloaded update; otherwise this is
    /// a logged no-op, not an error.
    fn quit_and_install(&mut self) {
        let Some(staged) = self.lifecycle.take_staged() else {
            tracing::info!("Install requested: {}", UpdateError::InstallSkipped);
            return;
        };

        match install::launch_installer(&staged) {
            Ok(()) => {
                if let Some(ctx) = &self.egui_ctx {
                    ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    ctx.request_repaint();
                }
            }
            Err(e) => {
                tracing::error!("Failed to launch installer: {}", e);
                self.handle_event(UpdaterEvent::Error(e.to_string()));
            }
        }
    }

    /// Start a check cycle unless one is already in flight
    fn begin_check(&mut self) {
        if self.lifecycle.is_checking() {
            tracing::debug!(
                "Update check already in flight (status {:?}), ignoring",
                self.lifecycle.status()
            );
            return;
        }
        if self.config.feed_url.is_empty() {
            tracing::warn!("No update feed configured, skipping check");
            return;
        }

        // Transition before spawning, so a second command arriving while
        // the task has not run yet still hits the in-flight guard above.
        self.handle_event(UpdaterEvent::Checking);

        let client = self.feed.clone();
        let url = self.config.feed_url.clone();
        let events = self.events_tx.clone();

        tokio::spawn(async move {
            let event = match client.check(&url).await {
                Ok(Some(manifest)) => UpdaterEvent::Available(manifest),
                Ok(None) => UpdaterEvent::NotAvailable,
                Err(e) => UpdaterEvent::Error(e.to_string()),
            };
            let _ = events.send(event);
        });
    }

    /// Feed one lifecycle event through the state machine and execute the
    /// resulting effects.
    fn handle_event(&mut self, event: UpdaterEvent) {
        for effect in self.lifecycle.handle_event(event) {
            match effect {
                Effect::ShowSurface => self.push(SurfaceMessage::Show),
                Effect::Publish(status) => {
                    self.push(SurfaceMessage::StatusLine(status.status_line()));
                    self.push(SurfaceMessage::Status(status));
                }
                Effect::DismissSurfaceAfter(delay) => {
                    self.push(SurfaceMessage::DismissAfter(delay));
                }
                Effect::StartDownload(manifest) => self.start_download(manifest),
                Effect::ReadyToInstall => self.push(SurfaceMessage::ReadyToInstall),
            }
        }
    }

    fn start_download(&mut self, manifest: super::UpdateManifest) {
        tracing::info!("Starting download: {}", manifest.url);
        let client = self.feed.client().clone();
        let events = self.events_tx.clone();

        tokio::spawn(async move {
            let event = match download::download_package(client, manifest, events.clone()).await {
                Ok(staged) => UpdaterEvent::Downloaded(staged),
                Err(e) => UpdaterEvent::Error(e.to_string()),
            };
            let _ = events.send(event);
        });
    }

    fn push(&self, message: SurfaceMessage) {
        let _ = self.endpoint.messages.send(message);
        if let Some(ctx) = &self.egui_ctx {
            ctx.request_repaint();
        }
    }

    #[cfg(test)]
    fn event_injector(&self) -> mpsc::UnboundedSender<UpdaterEvent> {
        self.events_tx.clone()
    }
}
