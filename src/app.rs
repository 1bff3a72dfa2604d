use std::time::Instant;

use eframe::egui;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

use crate::channel::{SurfaceEndpoint, SurfaceMessage};
use crate::config::Config;
use crate::ui::{render_notification, NotificationAction, NotificationModel};

/// Main application shell
pub struct LumenApp {
    /// Surface side of the update channel
    surface: SurfaceEndpoint,
    /// Derived view state of the update notification
    notification: NotificationModel,
    /// Status message for the status bar
    status_message: String,
    /// Application version reported by the coordinator
    app_version: String,
    /// Pending reply to the startup version query
    version_reply: Option<oneshot::Receiver<String>>,
    /// Pending reply to a manual check command
    check_reply: Option<oneshot::Receiver<Result<(), String>>>,
}

impl LumenApp {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        config: &Config,
        surface: SurfaceEndpoint,
    ) -> Self {
        let version_reply = Some(surface.get_version());

        Self {
            surface,
            notification: NotificationModel::new(config.updates.dismiss_delay()),
            status_message: "Ready".to_string(),
            app_version: String::new(),
            version_reply,
            check_reply: None,
        }
    }

    /// Issue a manual update check unless one is already pending
    fn request_check(&mut self) {
        if self.check_reply.is_some() {
            return;
        }
        self.check_reply = Some(self.surface.check_for_updates());
        self.notification.mark_check_issued();
    }

    /// Poll pending command replies without blocking
    fn poll_replies(&mut self) {
        if let Some(rx) = &mut self.version_reply {
            match rx.try_recv() {
                Ok(version) => {
                    self.app_version = version;
                    self.version_reply = None;
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Closed) => {
                    tracing::warn!("Version query went unanswered");
                    self.version_reply = None;
                }
            }
        }

        if let Some(rx) = &mut self.check_reply {
            match rx.try_recv() {
                Ok(outcome) => {
                    if let Err(e) = outcome {
                        tracing::error!("Update check rejected: {}", e);
                        self.status_message = format!("Update check failed: {}", e);
                    }
                    self.notification.check_resolved();
                    self.check_reply = None;
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Closed) => {
                    self.notification.check_resolved();
                    self.check_reply = None;
                }
            }
        }
    }

    /// Drain pushed update messages into the notification model
    fn drain_messages(&mut self, now: Instant) {
        while let Ok(message) = self.surface.try_recv() {
            if let SurfaceMessage::StatusLine(text) = &message {
                self.status_message = text.clone();
            }
            self.notification.apply(message, now);
        }
    }
}

impl eframe::App for LumenApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();

        self.poll_replies();
        self.drain_messages(now);
        self.notification.tick(now);

        // Keep repainting until a pending dismiss timer fires
        if let Some(deadline) = self.notification.dismiss_deadline() {
            ctx.request_repaint_after(deadline.saturating_duration_since(now));
        }

        // Status bar at bottom
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(&self.status_message);
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.add_space(16.0);
            ui.vertical_centered(|ui| {
                ui.heading("Lumen");
                ui.add_space(4.0);
                if self.app_version.is_empty() {
                    ui.label("Current version: ...");
                } else {
                    ui.label(format!("Current version: v{}", self.app_version));
                }

                ui.add_space(16.0);
                let check_pending = self.check_reply.is_some();
                if ui
                    .add_enabled(!check_pending, egui::Button::new("Check for updates"))
                    .clicked()
                {
                    self.request_check();
                }
            });
        });

        match render_notification(&self.notification, ctx) {
            Some(NotificationAction::Install) => self.surface.quit_and_install(),
            Some(NotificationAction::Retry) => self.request_check(),
            None => {}
        }
    }
}
