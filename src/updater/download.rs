//! Streaming download of the update package.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use super::{DownloadProgress, StagedUpdate, UpdateError, UpdateManifest, UpdaterEvent};

/// Minimum time between progress events
const PROGRESS_INTERVAL: Duration = Duration::from_millis(250);

/// Download the package described by the manifest into the staging
/// directory, emitting progress events along the way.
///
/// Writes to a `.part` temporary file, then renames on success.
pub async fn download_package(
    client: reqwest::Client,
    manifest: UpdateManifest,
    events: mpsc::UnboundedSender<UpdaterEvent>,
) -> Result<StagedUpdate, UpdateError> {
    let download_start = Instant::now();
    let dest_path = staging_dir()?.join(package_filename(&manifest));

    let response = client
        .get(&manifest.url)
        .send()
        .await
        .map_err(|e| UpdateError::DownloadFailed(format!("connect failed: {}", e)))?;

    if !response.status().is_success() {
        return Err(UpdateError::DownloadFailed(format!(
            "server returned {}",
            response.status()
        )));
    }

    // Prefer the response's own length; the feed's size field is advisory
    let total = response.content_length().unwrap_or(manifest.size);

    let temp_path = dest_path.with_extension("part");
    let mut file = tokio::fs::File::create(&temp_path).await?;

    let mut stream = response.bytes_stream();
    let mut transferred: u64 = 0;
    let mut last_report = Instant::now();

    let streamed: Result<(), UpdateError> = async {
        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|e| UpdateError::DownloadFailed(format!("stream error: {}", e)))?;
            file.write_all(&chunk).await?;
            transferred += chunk.len() as u64;

            if last_report.elapsed() >= PROGRESS_INTERVAL {
                let _ = events.send(UpdaterEvent::Progress(DownloadProgress::from_bytes(
                    transferred,
                    total,
                )));
                last_report = Instant::now();
            }
        }
        file.sync_all().await?;
        Ok(())
    }
    .await;
    drop(file);

    if let Err(e) = streamed {
        discard_partial(&temp_path).await;
        return Err(e);
    }

    if let Err(e) = tokio::fs::rename(&temp_path, &dest_path).await {
        discard_partial(&temp_path).await;
        return Err(e.into());
    }

    // Final progress event so the surface lands on 100%
    let _ = events.send(UpdaterEvent::Progress(DownloadProgress::from_bytes(
        transferred,
        if total == 0 { transferred } else { total },
    )));

    tracing::info!(
        "Download complete: {:.1} MB in {:.1}s",
        transferred as f32 / 1_000_000.0,
        download_start.elapsed().as_secs_f32()
    );

    Ok(StagedUpdate {
        version: manifest.version,
        package_path: dest_path,
    })
}

/// Remove a leftover `.part` file after a failed download
async fn discard_partial(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::warn!(
            "Could not remove partial download {}: {}",
            path.display(),
            e
        );
    }
}

/// Directory where downloaded packages are staged
pub fn staging_dir() -> Result<PathBuf, UpdateError> {
    let dirs = directories::ProjectDirs::from("com", "lumen", "Lumen").ok_or_else(|| {
        UpdateError::DownloadFailed("could not determine data directory".to_string())
    })?;

    let staging = dirs.data_dir().join("updates");
    std::fs::create_dir_all(&staging)?;

    Ok(staging)
}

/// Derive a local filename from the manifest URL
fn package_filename(manifest: &UpdateManifest) -> String {
    manifest
        .url
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .map(|name| name.to_string())
        .unwrap_or_else(|| format!("lumen-{}.pkg", manifest.version))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(url: &str) -> UpdateManifest {
        UpdateManifest {
            version: "2.0.0".to_string(),
            url: url.to_string(),
            size: 0,
            notes: None,
        }
    }

    #[test]
    fn test_package_filename_from_url() {
        let m = manifest("https://releases.example.com/lumen-2.0.0-x64.zip");
        assert_eq!(package_filename(&m), "lumen-2.0.0-x64.zip");
    }

    #[test]
    fn test_package_filename_fallback() {
        let m = manifest("https://releases.example.com/download/");
        assert_eq!(package_filename(&m), "lumen-2.0.0.pkg");
    }

    #[test]
    fn test_staging_dir_creation() {
        let dir = staging_dir().unwrap();
        assert!(dir.exists());
        assert!(dir.is_dir());
    }

    #[tokio::test]
    async fn test_discard_partial_removes_file() {
        let path = std::env::temp_dir().join("lumen-download-test.part");
        tokio::fs::write(&path, b"half a package").await.unwrap();

        discard_partial(&path).await;
        assert!(!path.exists());
    }
}
