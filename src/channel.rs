//! The update channel: the asynchronous message boundary between the
//! background update coordinator and the notification surface.
//!
//! Messages are tagged variants, not free text. The surface switches on
//! the tag; the human-readable line travels alongside for display only.
//! Delivery is per-channel FIFO, at most once (tokio mpsc semantics).

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use crate::updater::UpdateStatus;

/// Commands the surface can issue to the coordinator
#[derive(Debug)]
pub enum UpdateCommand {
    /// Start a check cycle. Replies once the check has been accepted
    /// (or rejected up front); results arrive later as pushed messages.
    CheckForUpdates {
        reply: oneshot::Sender<Result<(), String>>,
    },
    /// Apply the staged update and exit. Guarded no-op if nothing is staged.
    QuitAndInstall,
    /// Ask for the running application version
    GetVersion {
        reply: oneshot::Sender<String>,
    },
    /// The app is shutting down; install silently if so configured
    Shutdown {
        ack: oneshot::Sender<()>,
    },
}

/// Messages the coordinator pushes to the surface
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceMessage {
    /// Structured status change
    Status(UpdateStatus),
    /// Display text for the status line
    StatusLine(String),
    /// A downloaded update is ready; reveal the install control
    ReadyToInstall,
    /// Reveal the notification surface
    Show,
    /// Hide the notification surface after the given delay
    DismissAfter(Duration),
}

/// Coordinator-side endpoint: receives commands, pushes messages
pub struct CoordinatorEndpoint {
    pub commands: mpsc::UnboundedReceiver<UpdateCommand>,
    pub messages: mpsc::UnboundedSender<SurfaceMessage>,
}

/// Surface-side endpoint: issues commands, drains pushed messages
pub struct SurfaceEndpoint {
    commands: mpsc::UnboundedSender<UpdateCommand>,
    messages: mpsc::UnboundedReceiver<SurfaceMessage>,
}

/// Create a connected endpoint pair
pub fn channel() -> (CoordinatorEndpoint, SurfaceEndpoint) {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (message_tx, message_rx) = mpsc::unbounded_channel();

    (
        CoordinatorEndpoint {
            commands: command_rx,
            messages: message_tx,
        },
        SurfaceEndpoint {
            commands: command_tx,
            messages: message_rx,
        },
    )
}

impl SurfaceEndpoint {
    /// Drain one pushed message without blocking
    pub fn try_recv(&mut self) -> Result<SurfaceMessage, mpsc::error::TryRecvError> {
        self.messages.try_recv()
    }

    /// Wait for the next pushed message
    #[cfg(test)]
    pub async fn recv(&mut self) -> Option<SurfaceMessage> {
        self.messages.recv().await
    }

    /// Issue a check command; the receiver resolves with the outcome
    pub fn check_for_updates(&self) -> oneshot::Receiver<Result<(), String>> {
        let (reply, rx) = oneshot::channel();
        let _ = self.commands.send(UpdateCommand::CheckForUpdates { reply });
        rx
    }

    /// Issue the install command
    pub fn quit_and_install(&self) {
        let _ = self.commands.send(UpdateCommand::QuitAndInstall);
    }

    /// Ask the coordinator for the application version
    pub fn get_version(&self) -> oneshot::Receiver<String> {
        let (reply, rx) = oneshot::channel();
        let _ = self.commands.send(UpdateCommand::GetVersion { reply });
        rx
    }

    /// Clone of the raw command sender, for shutdown handling in main
    pub fn command_sender(&self) -> mpsc::UnboundedSender<UpdateCommand> {
        self.commands.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::updater::DownloadProgress;

    #[tokio::test]
    async fn test_messages_arrive_in_order() {
        let (coordinator, mut surface) = channel();

        let sent = vec![
            SurfaceMessage::Status(UpdateStatus::Checking),
            SurfaceMessage::StatusLine("Checking for updates...".to_string()),
            SurfaceMessage::Status(UpdateStatus::Downloading(DownloadProgress::from_bytes(
                1, 2,
            ))),
            SurfaceMessage::ReadyToInstall,
        ];
        for message in &sent {
            coordinator.messages.send(message.clone()).unwrap();
        }

        let mut received = Vec::new();
        while let Ok(message) = surface.try_recv() {
            received.push(message);
        }
        assert_eq!(received, sent);
    }

    #[tokio::test]
    async fn test_command_reply_roundtrip() {
        let (mut coordinator, surface) = channel();

        let reply_rx = surface.get_version();
        match coordinator.commands.recv().await.unwrap() {
            UpdateCommand::GetVersion { reply } => {
                reply.send("1.2.3".to_string()).unwrap();
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert_eq!(reply_rx.await.unwrap(), "1.2.3");
    }
}
