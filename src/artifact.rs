use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use futures::StreamExt;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::header::CONTENT_DISPOSITION;
use sanitize_filename::sanitize;
use tokio::{
    fs::{self, OpenOptions},
    io::AsyncWriteExt,
};
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::{
    api::{DownloadHandle, HttpBackend},
    error::ClientError,
    rate_window::RateWindow,
    render::human_size,
};

/// Pull the file name out of a `Content-Disposition` header.
pub fn disposition_filename(header: &str) -> Option<String> {
    lazy_static! {
        static ref RE: Regex = Regex::new(r#"filename\*?=(?:UTF-8'')?"?([^";]+)"?"#).unwrap();
    }
    RE.captures(header)
        .and_then(|v| v.get(1))
        .map(|v| v.as_str().trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Pick a safe local name: the hint, then the server's name, then the id.
fn final_filename(hint: Option<&str>, disposition: Option<String>, handle: &DownloadHandle) -> String {
    let name = hint
        .map(str::to_string)
        .filter(|name| !name.trim().is_empty())
        .or(disposition)
        .unwrap_or_else(|| handle.to_string());
    let name = sanitize(name);
    if name.is_empty() {
        sanitize(handle.as_str())
    } else {
        name
    }
}

/// Stream a finished download into `dir`, returning where it ended up.
#[tracing::instrument(level = "info", skip(backend))]
pub async fn save_artifact(
    backend: &HttpBackend,
    handle: &DownloadHandle,
    filename_hint: Option<&str>,
    dir: &Path,
) -> Result<PathBuf, ClientError> {
    let url = backend.artifact_url(handle);
    let response = backend.authorize(backend.client().get(&url)).send().await?;
    if response.status() == reqwest::StatusCode::NOT_FOUND {
        return Err(ClientError::ArtifactNotFound(url));
    }
    let response = response.error_for_status()?;

    let disposition = response
        .headers()
        .get(CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .and_then(disposition_filename);
    let target = dir.join(final_filename(filename_hint, disposition, handle));
    let temporary = dir.join(format!(".{}.tmp", Ulid::new()));
    info!("Saving {} to {}", url, target.display());

    let total = response.content_length();
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temporary)
        .await?;

    let written = async {
        let mut progress: u64 = 0;
        let mut last_update = Instant::now();
        let mut pending = 0u64;
        let mut rate = RateWindow::new(Duration::from_secs(60));

        let mut bytes = response.bytes_stream();
        while let Some(chunk) = bytes.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            progress += chunk.len() as u64;
            pending += chunk.len() as u64;

            let elapsed = last_update.elapsed();
            if elapsed >= Duration::from_secs(1) {
                rate.record(pending, elapsed);
                debug!(
                    "Saved {} of {} at {}",
                    human_size(progress as f64, ""),
                    total
                        .map(|total| human_size(total as f64, ""))
                        .unwrap_or_else(|| "?".to_string()),
                    human_size(rate.rate(), "/s")
                );
                last_update = Instant::now();
                pending = 0;
            }
        }

        // Data must be on disk before the file shows up under its real name
        file.flush().await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&temporary, &target).await?;
        Ok::<u64, ClientError>(progress)
    }
    .await;

    match written {
        Ok(progress) => {
            info!("Saved {} ({})", target.display(), human_size(progress as f64, ""));
            Ok(target)
        }
        Err(err) => {
            warn!("Saving {} failed, removing {}", url, temporary.display());
            let _ = fs::remove_file(&temporary).await;
            Err(err)
        }
    }
}
