//! Auto-update subsystem.
//!
//! This module handles:
//! - Checking a remote release feed for a newer version
//! - Downloading the update package with progress tracking
//! - Staging the package and launching the installer on request
//!
//! The [`coordinator`] owns the whole lifecycle; the UI only ever sees
//! [`crate::channel::SurfaceMessage`]s derived from [`UpdateStatus`].

pub mod coordinator;
pub mod download;
pub mod feed;
pub mod install;
pub mod lifecycle;

use std::path::PathBuf;

use thiserror::Error;

use crate::util::format_size;

pub use coordinator::Coordinator;
pub use feed::{FeedClient, UpdateManifest};

/// Errors that can occur during update operations
#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("Update check failed: {0}")]
    CheckFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("No update has been downloaded yet")]
    InstallSkipped,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Progress of a single download run
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DownloadProgress {
    /// Completion percentage, 0.0 - 100.0
    pub percent: f32,
    /// Bytes received so far
    pub transferred: u64,
    /// Expected total bytes (0 if the server didn't say)
    pub total: u64,
}

impl DownloadProgress {
    /// Build progress from byte counts, deriving the percentage
    pub fn from_bytes(transferred: u64, total: u64) -> Self {
        let percent = if total == 0 {
            0.0
        } else {
            (transferred as f64 / total as f64 * 100.0) as f32
        };
        Self {
            percent,
            transferred,
            total,
        }
    }
}

/// A fully downloaded update, ready to install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedUpdate {
    /// Version the package upgrades to
    pub version: String,
    /// Path of the staged installer package
    pub package_path: PathBuf,
}

/// Current state of the update lifecycle.
///
/// Owned exclusively by the coordinator. The notification surface only
/// ever receives copies over the channel and derives its view from them.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum UpdateStatus {
    #[default]
    Idle,
    Checking,
    Available {
        version: String,
    },
    Downloading(DownloadProgress),
    Downloaded {
        version: String,
    },
    UpToDate,
    Failed {
        message: String,
    },
}

impl UpdateStatus {
    /// Human-readable status line shown in the notification surface.
    ///
    /// The wording is part of the UI contract; tests pin it down.
    pub fn status_line(&self) -> String {
        match self {
            UpdateStatus::Idle => "Ready".to_string(),
            UpdateStatus::Checking => "Checking for updates...".to_string(),
            UpdateStatus::Available { version } => {
                format!("Update available: {}", version)
            }
            UpdateStatus::Downloading(progress) => format!(
                "Downloaded {:.1}% ({}/{})",
                progress.percent,
                format_size(progress.transferred),
                format_size(progress.total),
            ),
            UpdateStatus::Downloaded { version } => {
                format!("Update downloaded. Version: {}. Click to install.", version)
            }
            UpdateStatus::UpToDate => "Already on the latest version.".to_string(),
            UpdateStatus::Failed { message } => format!("Update error: {}.", message),
        }
    }
}

/// Lifecycle events reported by the feed and download tasks
#[derive(Debug, Clone)]
pub enum UpdaterEvent {
    /// A check has started
    Checking,
    /// The feed offers a newer version
    Available(UpdateManifest),
    /// The feed has nothing newer than the running version
    NotAvailable,
    /// Download progress for the in-flight update
    Progress(DownloadProgress),
    /// The update package has been staged on disk
    Downloaded(StagedUpdate),
    /// Any failure from check or download
    Error(String),
}
