//! Pure state machine for the update lifecycle.
//!
//! Consumes one event or command at a time and returns the side effects
//! to run. No IO happens here; the coordinator executes the effects.
//! Keeping this synchronous makes every transition directly testable.

use std::time::Duration;

use crate::config::{ShowNotificationOn, UpdatesConfig};

use super::{DownloadProgress, StagedUpdate, UpdateManifest, UpdateStatus, UpdaterEvent};

/// Side effects requested by a transition, in execution order
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Reveal the notification surface
    ShowSurface,
    /// Publish the new status to the surface
    Publish(UpdateStatus),
    /// Hide the notification surface after the delay
    DismissSurfaceAfter(Duration),
    /// Begin downloading the offered update
    StartDownload(UpdateManifest),
    /// Announce that the staged update can be installed
    ReadyToInstall,
}

/// The update lifecycle state machine
pub struct Lifecycle {
    status: UpdateStatus,
    staged: Option<StagedUpdate>,
    auto_download: bool,
    show_on: ShowNotificationOn,
    dismiss_delay: Duration,
}

impl Lifecycle {
    pub fn new(config: &UpdatesConfig) -> Self {
        Self {
            status: UpdateStatus::Idle,
            staged: None,
            auto_download: config.auto_download,
            show_on: config.show_notification_on,
            dismiss_delay: config.dismiss_delay(),
        }
    }

    pub fn status(&self) -> &UpdateStatus {
        &self.status
    }

    /// Take the staged update for installation. Returns `None` when no
    /// `Downloaded` event has been reached; install must then be a no-op.
    pub fn take_staged(&mut self) -> Option<StagedUpdate> {
        self.staged.take()
    }

    /// Whether a check is currently in flight
    pub fn is_checking(&self) -> bool {
        matches!(self.status, UpdateStatus::Checking)
    }

    /// Consume one lifecycle event and return the effects to run.
    ///
    /// Every accepted event publishes exactly one status message. Events
    /// that are meaningless in the current state are dropped with a warning
    /// rather than corrupting the state.
    pub fn handle_event(&mut self, event: UpdaterEvent) -> Vec<Effect> {
        match event {
            UpdaterEvent::Checking => self.on_checking(),
            UpdaterEvent::Available(manifest) => self.on_available(manifest),
            UpdaterEvent::NotAvailable => self.on_not_available(),
            UpdaterEvent::Progress(progress) => self.on_progress(progress),
            UpdaterEvent::Downloaded(staged) => self.on_downloaded(staged),
            UpdaterEvent::Error(message) => self.on_error(message),
        }
    }

    fn on_checking(&mut self) -> Vec<Effect> {
        // At most one in-flight check; a repeat is dropped silently.
        if self.is_checking() {
            return Vec::new();
        }

        self.status = UpdateStatus::Checking;

        let mut effects = Vec::new();
        if matches!(
            self.show_on,
            ShowNotificationOn::Checking | ShowNotificationOn::Always
        ) {
            effects.push(Effect::ShowSurface);
        }
        effects.push(Effect::Publish(self.status.clone()));
        effects
    }

    fn on_available(&mut self, manifest: UpdateManifest) -> Vec<Effect> {
        if !self.is_checking() {
            tracing::warn!(
                "Ignoring 'available' event in state {:?}",
                self.status
            );
            return Vec::new();
        }

        self.status = UpdateStatus::Available {
            version: manifest.version.clone(),
        };

        let mut effects = vec![Effect::ShowSurface, Effect::Publish(self.status.clone())];
        if self.auto_download {
            effects.push(Effect::StartDownload(manifest));
        }
        effects
    }

    fn on_not_available(&mut self) -> Vec<Effect> {
        if !self.is_checking() {
            tracing::warn!(
                "Ignoring 'not-available' event in state {:?}",
                self.status
            );
            return Vec::new();
        }

        self.status = UpdateStatus::UpToDate;
        vec![
            Effect::Publish(self.status.clone()),
            Effect::DismissSurfaceAfter(self.dismiss_delay),
        ]
    }

    fn on_progress(&mut self, progress: DownloadProgress) -> Vec<Effect> {
        match &self.status {
            UpdateStatus::Available { .. } => {
                // First progress event starts a fresh download run.
                self.status = UpdateStatus::Downloading(progress);
                vec![Effect::ShowSurface, Effect::Publish(self.status.clone())]
            }
            UpdateStatus::Downloading(previous) => {
                // Progress never goes backwards within a run.
                let clamped = if progress.percent < previous.percent {
                    tracing::warn!(
                        "Download progress went backwards ({:.1}% -> {:.1}%), clamping",
                        previous.percent,
                        progress.percent
                    );
                    *previous
                } else {
                    progress
                };
                self.status = UpdateStatus::Downloading(clamped);
                vec![Effect::Publish(self.status.clone())]
            }
            other => {
                tracing::warn!("Ignoring progress event in state {:?}", other);
                Vec::new()
            }
        }
    }

    fn on_downloaded(&mut self, staged: StagedUpdate) -> Vec<Effect> {
        match self.status {
            UpdateStatus::Available { .. } | UpdateStatus::Downloading(_) => {
                self.status = UpdateStatus::Downloaded {
                    version: staged.version.clone(),
                };
                self.staged = Some(staged);
                vec![
                    Effect::Publish(self.status.clone()),
                    Effect::ReadyToInstall,
                ]
            }
            ref other => {
                tracing::warn!("Ignoring 'downloaded' event in state {:?}", other);
                Vec::new()
            }
        }
    }

    fn on_error(&mut self, message: String) -> Vec<Effect> {
        self.status = UpdateStatus::Failed {
            message: message.clone(),
        };
        vec![Effect::ShowSurface, Effect::Publish(self.status.clone())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lifecycle() -> Lifecycle {
        Lifecycle::new(&UpdatesConfig::default())
    }

    fn lifecycle_with(mutate: impl FnOnce(&mut UpdatesConfig)) -> Lifecycle {
        let mut config = UpdatesConfig::default();
        mutate(&mut config);
        Lifecycle::new(&config)
    }

    fn manifest(version: &str) -> UpdateManifest {
        UpdateManifest {
            version: version.to_string(),
            url: format!("https://example.com/lumen-{}.zip", version),
            size: 1000,
            notes: None,
        }
    }

    fn staged(version: &str) -> StagedUpdate {
        StagedUpdate {
            version: version.to_string(),
            package_path: format!("/tmp/lumen-{}.zip", version).into(),
        }
    }

    /// One publish per accepted event, in the order of the transition table.
    #[test]
    fn test_full_download_cycle() {
        let mut lifecycle = lifecycle_with(|c| c.auto_download = false);

        let effects = lifecycle.handle_event(UpdaterEvent::Checking);
        assert_eq!(effects, vec![Effect::Publish(UpdateStatus::Checking)]);

        let effects = lifecycle.handle_event(UpdaterEvent::Available(manifest("2.0.0")));
        assert_eq!(
            effects,
            vec![
                Effect::ShowSurface,
                Effect::Publish(UpdateStatus::Available {
                    version: "2.0.0".to_string()
                }),
            ]
        );

        let effects =
            lifecycle.handle_event(UpdaterEvent::Progress(DownloadProgress::from_bytes(
                500, 1000,
            )));
        assert_eq!(
            effects,
            vec![
                Effect::ShowSurface,
                Effect::Publish(UpdateStatus::Downloading(DownloadProgress::from_bytes(
                    500, 1000
                ))),
            ]
        );

        let effects =
            lifecycle.handle_event(UpdaterEvent::Progress(DownloadProgress::from_bytes(
                1000, 1000,
            )));
        assert_eq!(
            effects,
            vec![Effect::Publish(UpdateStatus::Downloading(
                DownloadProgress::from_bytes(1000, 1000)
            ))]
        );

        let effects = lifecycle.handle_event(UpdaterEvent::Downloaded(staged("2.0.0")));
        assert_eq!(
            effects,
            vec![
                Effect::Publish(UpdateStatus::Downloaded {
                    version: "2.0.0".to_string()
                }),
                Effect::ReadyToInstall,
            ]
        );
        assert_eq!(lifecycle.take_staged(), Some(staged("2.0.0")));
    }

    #[test]
    fn test_repeat_check_is_dropped() {
        let mut lifecycle = lifecycle();
        assert!(!lifecycle.handle_event(UpdaterEvent::Checking).is_empty());
        // Second check while already checking: no transition, no publish
        assert!(lifecycle.handle_event(UpdaterEvent::Checking).is_empty());
        assert!(lifecycle.is_checking());
    }

    #[test]
    fn test_up_to_date_schedules_dismiss() {
        let mut lifecycle = lifecycle();
        lifecycle.handle_event(UpdaterEvent::Checking);
        let effects = lifecycle.handle_event(UpdaterEvent::NotAvailable);
        assert_eq!(
            effects,
            vec![
                Effect::Publish(UpdateStatus::UpToDate),
                Effect::DismissSurfaceAfter(Duration::from_secs(3)),
            ]
        );
    }

    #[test]
    fn test_error_reported_from_any_phase() {
        for setup in [
            vec![UpdaterEvent::Checking],
            vec![
                UpdaterEvent::Checking,
                UpdaterEvent::Available(manifest("2.0.0")),
            ],
            vec![
                UpdaterEvent::Checking,
                UpdaterEvent::Available(manifest("2.0.0")),
                UpdaterEvent::Progress(DownloadProgress::from_bytes(100, 1000)),
            ],
        ] {
            let mut lifecycle = lifecycle_with(|c| c.auto_download = false);
            for event in setup {
                lifecycle.handle_event(event);
            }
            let effects = lifecycle.handle_event(UpdaterEvent::Error("network down".to_string()));
            assert_eq!(
                effects,
                vec![
                    Effect::ShowSurface,
                    Effect::Publish(UpdateStatus::Failed {
                        message: "network down".to_string()
                    }),
                ]
            );
        }
    }

    #[test]
    fn test_progress_is_monotonic_within_a_run() {
        let mut lifecycle = lifecycle_with(|c| c.auto_download = false);
        lifecycle.handle_event(UpdaterEvent::Checking);
        lifecycle.handle_event(UpdaterEvent::Available(manifest("2.0.0")));
        lifecycle.handle_event(UpdaterEvent::Progress(DownloadProgress::from_bytes(
            600, 1000,
        )));

        // A regressing report is clamped to the previous value
        let effects = lifecycle.handle_event(UpdaterEvent::Progress(
            DownloadProgress::from_bytes(400, 1000),
        ));
        assert_eq!(
            effects,
            vec![Effect::Publish(UpdateStatus::Downloading(
                DownloadProgress::from_bytes(600, 1000)
            ))]
        );
    }

    #[test]
    fn test_progress_resets_between_runs() {
        let mut lifecycle = lifecycle_with(|c| c.auto_download = false);
        lifecycle.handle_event(UpdaterEvent::Checking);
        lifecycle.handle_event(UpdaterEvent::Available(manifest("2.0.0")));
        lifecycle.handle_event(UpdaterEvent::Progress(DownloadProgress::from_bytes(
            900, 1000,
        )));
        lifecycle.handle_event(UpdaterEvent::Error("connection reset".to_string()));

        // New cycle: progress starts over from what the new run reports
        lifecycle.handle_event(UpdaterEvent::Checking);
        lifecycle.handle_event(UpdaterEvent::Available(manifest("2.0.1")));
        let effects = lifecycle.handle_event(UpdaterEvent::Progress(
            DownloadProgress::from_bytes(100, 1000),
        ));
        assert_eq!(
            effects,
            vec![
                Effect::ShowSurface,
                Effect::Publish(UpdateStatus::Downloading(DownloadProgress::from_bytes(
                    100, 1000
                ))),
            ]
        );
    }

    #[test]
    fn test_auto_download_issues_download_effect() {
        let mut lifecycle = lifecycle_with(|c| c.auto_download = true);
        lifecycle.handle_event(UpdaterEvent::Checking);
        let effects = lifecycle.handle_event(UpdaterEvent::Available(manifest("2.0.0")));
        assert!(matches!(effects.last(), Some(Effect::StartDownload(m)) if m.version == "2.0.0"));
    }

    #[test]
    fn test_install_gated_on_downloaded() {
        let mut lifecycle = lifecycle();
        assert!(lifecycle.take_staged().is_none());

        lifecycle.handle_event(UpdaterEvent::Checking);
        lifecycle.handle_event(UpdaterEvent::Available(manifest("2.0.0")));
        lifecycle.handle_event(UpdaterEvent::Downloaded(staged("2.0.0")));
        assert_eq!(lifecycle.take_staged(), Some(staged("2.0.0")));
        // Taking it again without a new download is a no-op
        assert!(lifecycle.take_staged().is_none());
    }

    #[test]
    fn test_surface_shown_on_checking_when_configured() {
        let mut lifecycle =
            lifecycle_with(|c| c.show_notification_on = ShowNotificationOn::Checking);
        let effects = lifecycle.handle_event(UpdaterEvent::Checking);
        assert_eq!(
            effects,
            vec![
                Effect::ShowSurface,
                Effect::Publish(UpdateStatus::Checking),
            ]
        );
    }

    #[test]
    fn test_stray_events_are_dropped() {
        let mut lifecycle = lifecycle();
        // Progress before any check
        assert!(lifecycle
            .handle_event(UpdaterEvent::Progress(DownloadProgress::from_bytes(1, 2)))
            .is_empty());
        // Downloaded before any check
        assert!(lifecycle
            .handle_event(UpdaterEvent::Downloaded(staged("2.0.0")))
            .is_empty());
        // Not-available outside a check
        assert!(lifecycle.handle_event(UpdaterEvent::NotAvailable).is_empty());
        assert_eq!(lifecycle.status(), &UpdateStatus::Idle);
    }
}
