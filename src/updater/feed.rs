//! Release feed client.
//!
//! The feed is a single JSON manifest describing the latest release.
//! A check fetches it and compares the advertised version against the
//! running build; anything not strictly newer counts as up to date.

use semver::Version;
use serde::Deserialize;

use super::UpdateError;

/// User agent for feed requests
const USER_AGENT: &str = concat!("Lumen/", env!("CARGO_PKG_VERSION"));

/// The latest-release manifest served by the update feed
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UpdateManifest {
    /// Version of the offered release
    pub version: String,
    /// Download URL of the installer package
    pub url: String,
    /// Package size in bytes, if the feed knows it
    #[serde(default)]
    pub size: u64,
    /// Optional release notes
    #[serde(default)]
    pub notes: Option<String>,
}

/// HTTP client for the release feed
#[derive(Clone)]
pub struct FeedClient {
    client: reqwest::Client,
}

impl FeedClient {
    pub fn new() -> Result<Self, UpdateError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self { client })
    }

    /// Get a reference to the underlying HTTP client
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Fetch the manifest and decide whether it offers an update.
    ///
    /// Returns `Ok(Some(manifest))` when the feed version is newer than the
    /// running build, `Ok(None)` when we are already up to date.
    pub async fn check(&self, feed_url: &str) -> Result<Option<UpdateManifest>, UpdateError> {
        let response = self
            .client
            .get(feed_url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| UpdateError::CheckFailed(format!("feed unreachable: {}", e)))?;

        if !response.status().is_success() {
            return Err(UpdateError::CheckFailed(format!(
                "feed returned {}",
                response.status()
            )));
        }

        let manifest: UpdateManifest = response
            .json()
            .await
            .map_err(|e| UpdateError::CheckFailed(format!("invalid manifest: {}", e)))?;

        let current = env!("CARGO_PKG_VERSION");
        if is_newer(&manifest.version, current)? {
            tracing::info!(
                "Update available: {} (running {})",
                manifest.version,
                current
            );
            if let Some(notes) = &manifest.notes {
                tracing::debug!("Release notes: {}", notes);
            }
            Ok(Some(manifest))
        } else {
            tracing::info!("Already on the latest version ({})", current);
            Ok(None)
        }
    }
}

/// Compare two semantic version strings, tolerating a leading `v`
fn is_newer(remote: &str, current: &str) -> Result<bool, UpdateError> {
    let parse = |s: &str| {
        Version::parse(s.trim_start_matches('v'))
            .map_err(|e| UpdateError::CheckFailed(format!("bad version '{}': {}", s, e)))
    };
    Ok(parse(remote)? > parse(current)?)
}
