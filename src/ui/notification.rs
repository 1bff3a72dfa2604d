//! The update notification surface.
//!
//! A pure-view component: [`NotificationModel`] derives everything it
//! renders from the messages pushed over the update channel plus two
//! local flags (retry-in-flight, dismiss deadline). It switches on
//! message tags only; the status line text is display-only. It never
//! mutates update state, it just issues commands back to the coordinator.

use std::time::{Duration, Instant};

use eframe::egui::{self, RichText};

use crate::channel::SurfaceMessage;
use crate::updater::{DownloadProgress, UpdateStatus};
use crate::util::format_size;

/// User interactions the notification surface can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationAction {
    /// Apply the downloaded update and restart
    Install,
    /// Re-issue a check after a failure
    Retry,
}

/// View state of the notification surface, derived from channel messages
pub struct NotificationModel {
    /// Status line to display
    message: String,
    /// Progress of the in-flight download, if any
    progress: Option<DownloadProgress>,
    /// Error text from the last failure
    error_text: Option<String>,
    /// Whether the install control is revealed
    can_install: bool,
    /// A manual check was issued and has not been answered yet
    retry_in_flight: bool,
    /// Whether the surface is revealed at all
    visible: bool,
    /// When to auto-dismiss the notification
    dismiss_at: Option<Instant>,
    /// Delay applied when a failure arms the dismiss timer
    dismiss_delay: Duration,
}

impl NotificationModel {
    pub fn new(dismiss_delay: Duration) -> Self {
        Self {
            message: String::new(),
            progress: None,
            error_text: None,
            can_install: false,
            retry_in_flight: false,
            visible: false,
            dismiss_at: None,
            dismiss_delay,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn progress(&self) -> Option<&DownloadProgress> {
        self.progress.as_ref()
    }

    pub fn progress_percent(&self) -> f32 {
        self.progress.map(|p| p.percent).unwrap_or(0.0)
    }

    pub fn error_text(&self) -> Option<&str> {
        self.error_text.as_deref()
    }

    pub fn can_install(&self) -> bool {
        self.can_install
    }

    pub fn retry_enabled(&self) -> bool {
        !self.retry_in_flight
    }

    pub fn dismiss_deadline(&self) -> Option<Instant> {
        self.dismiss_at
    }

    /// Whether the surface has anything to show
    pub fn is_visible(&self) -> bool {
        self.visible && (!self.message.is_empty() || self.can_install)
    }

    /// Record that a manual check was issued; the retry control stays
    /// disabled until the command is answered.
    pub fn mark_check_issued(&mut self) {
        self.retry_in_flight = true;
    }

    /// The check command was answered (accepted or rejected)
    pub fn check_resolved(&mut self) {
        self.retry_in_flight = false;
    }

    /// Apply one pushed message to the view state
    pub fn apply(&mut self, message: SurfaceMessage, now: Instant) {
        match message {
            SurfaceMessage::Status(status) => self.apply_status(status, now),
            SurfaceMessage::StatusLine(text) => {
                self.message = text;
            }
            SurfaceMessage::ReadyToInstall => {
                self.can_install = true;
                self.visible = true;
            }
            SurfaceMessage::Show => {
                self.visible = true;
            }
            SurfaceMessage::DismissAfter(delay) => {
                self.dismiss_at = Some(now + delay);
            }
        }
    }

    fn apply_status(&mut self, status: UpdateStatus, now: Instant) {
        self.message = status.status_line();

        match status {
            UpdateStatus::Idle => {
                self.progress = None;
                self.error_text = None;
                self.can_install = false;
                self.dismiss_at = None;
            }
            UpdateStatus::Checking => {
                self.error_text = None;
                self.dismiss_at = None;
            }
            UpdateStatus::Available { .. } => {
                self.error_text = None;
                self.progress = None;
                self.dismiss_at = None;
                self.retry_in_flight = false;
            }
            UpdateStatus::Downloading(progress) => {
                self.progress = Some(progress);
                self.error_text = None;
                self.dismiss_at = None;
                self.retry_in_flight = false;
            }
            UpdateStatus::Downloaded { .. } => {
                self.can_install = true;
                self.dismiss_at = None;
                self.retry_in_flight = false;
            }
            UpdateStatus::UpToDate => {
                self.progress = None;
                self.retry_in_flight = false;
                // Dismiss timing comes from the coordinator's DismissAfter
            }
            UpdateStatus::Failed { message } => {
                self.progress = None;
                self.error_text = Some(message);
                self.retry_in_flight = false;
                self.dismiss_at = Some(now + self.dismiss_delay);
            }
        }
    }

    /// Expire the dismiss timer. Returns true when the surface was cleared.
    pub fn tick(&mut self, now: Instant) -> bool {
        let expired = self.dismiss_at.is_some_and(|at| now >= at);
        if expired {
            self.message.clear();
            self.progress = None;
            self.error_text = None;
            self.visible = false;
            self.dismiss_at = None;
        }
        expired
    }
}

/// Render the notification surface as a toast anchored bottom-right.
///
/// Returns the action the user took this frame, if any.
pub fn render_notification(
    model: &NotificationModel,
    ctx: &egui::Context,
) -> Option<NotificationAction> {
    if !model.is_visible() {
        return None;
    }

    let mut action = None;

    egui::Area::new(egui::Id::new("update_notification"))
        .anchor(egui::Align2::RIGHT_BOTTOM, [-16.0, -16.0])
        .order(egui::Order::Foreground)
        .show(ctx, |ui| {
            egui::Frame::popup(&ctx.style()).show(ui, |ui| {
                ui.set_max_width(300.0);
                ui.label(RichText::new("Software Update").strong());
                ui.add_space(4.0);

                if model.error_text().is_some() {
                    ui.colored_label(egui::Color32::RED, model.message());
                } else if !model.message().is_empty() {
                    ui.label(model.message());
                }

                if model.progress_percent() > 0.0 {
                    if let Some(progress) = model.progress() {
                        ui.add_space(4.0);
                        ui.add(
                            egui::ProgressBar::new(progress.percent / 100.0).show_percentage(),
                        );
                        ui.label(
                            RichText::new(format!(
                                "{} / {}",
                                format_size(progress.transferred),
                                format_size(progress.total)
                            ))
                            .size(11.0),
                        );
                    }
                }

                if model.error_text().is_some() {
                    ui.add_space(4.0);
                    if ui
                        .add_enabled(model.retry_enabled(), egui::Button::new("Retry"))
                        .clicked()
                    {
                        action = Some(NotificationAction::Retry);
                    }
                }

                if model.can_install() {
                    ui.add_space(4.0);
                    if ui.button("Install and Restart").clicked() {
                        action = Some(NotificationAction::Install);
                    }
                }
            });
        });

    action
}
