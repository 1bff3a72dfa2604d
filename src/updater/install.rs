//! Applying a staged update.
//!
//! Installation itself is the installer package's job; we only hand the
//! staged file to the OS and get out of the way. No rollback handling.

use super::{StagedUpdate, UpdateError};

/// Launch the staged installer package.
///
/// The caller is responsible for quitting the application afterwards so
/// the installer can replace the running binary.
pub fn launch_installer(staged: &StagedUpdate) -> Result<(), UpdateError> {
    if !staged.package_path.exists() {
        return Err(UpdateError::DownloadFailed(format!(
            "staged package missing: {}",
            staged.package_path.display()
        )));
    }

    tracing::info!(
        "Launching installer for {}: {}",
        staged.version,
        staged.package_path.display()
    );
    open::that_detached(&staged.package_path)?;

    Ok(())
}
