//! Artifact download with progress tracking.
//!
//! Downloads stream into a caller-chosen staging path. A transfer that ends
//! before `Content-Length` bytes arrived is an acquisition failure, never a
//! silently truncated artifact. `file://` URLs are copied from disk, which is how
//! local formula files and tests point at prebuilt artifacts.

use crate::error::{InstallError, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Shared HTTP client
pub fn client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .user_agent(concat!("kefir/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Download `url` to `dest`, returning the number of bytes written
pub async fn fetch(client: &reqwest::Client, url: &str, dest: &Path, label: &str) -> Result<u64> {
    if let Some(local) = url.strip_prefix("file://") {
        tracing::debug!("copying {} -> {}", local, dest.display());
        return fs::copy(local, dest).await.map_err(|e| {
            InstallError::Acquisition(format!("Failed to read {}: {}", local, e))
        });
    }

    tracing::debug!("downloading {}", url);
    let mut response = client
        .get(url)
        .send()
        .await
        .map_err(|e| InstallError::Acquisition(format!("Failed to request {}: {}", url, e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(InstallError::Acquisition(format!(
            "Download of {} failed: HTTP {}",
            url, status
        )));
    }

    let expected_len = response.content_length();
    let pb = progress_bar(label, expected_len);

    let mut file = fs::File::create(dest)
        .await
        .map_err(|e| InstallError::Acquisition(format!("Failed to create {}: {}", dest.display(), e)))?;
    let mut downloaded: u64 = 0;

    loop {
        let chunk = response.chunk().await.map_err(|e| {
            InstallError::Acquisition(format!("Download of {} interrupted: {}", url, e))
        })?;
        let Some(chunk) = chunk else { break };
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;
        pb.set_position(downloaded);
    }

    file.flush().await?;
    file.sync_all().await?;

    if let Some(expected) = expected_len
        && downloaded != expected
    {
        pb.abandon_with_message(format!("✗ {}", label));
        return Err(InstallError::Acquisition(format!(
            "Incomplete download of {}: got {} of {} bytes",
            url, downloaded, expected
        )));
    }

    pb.finish_with_message(format!("✓ {}", label));
    Ok(downloaded)
}

fn progress_bar(label: &str, len: Option<u64>) -> ProgressBar {
    if !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(len.unwrap_or(0));
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_message(format!("⬇ {}", label));
    pb
}
