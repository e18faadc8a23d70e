//! Post-install smoke test of the installed collector binary.

use crate::error::{InstallError, Result};
use serde::Serialize;
use std::io::ErrorKind;
use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;

/// Substring the collector's `--help` must contain (documents the listening port)
pub const HELP_MARKER: &str = "Port to listen on";

/// How long one `--version`/`--help` run may take before it counts as a failure
pub const CHECK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcceptanceReport {
    pub version_output: String,
    pub help_output: String,
}

/// Run `--version` and `--help` against `binary` and check their output.
///
/// `version_banner` is the expected `"{name} v{version}"` string. Output is
/// stdout and stderr combined, since flag-parsing binaries commonly print usage to
/// stderr. Exit status is deliberately not checked: `--help` may exit non-zero.
pub async fn accept(binary: &Path, version_banner: &str) -> Result<AcceptanceReport> {
    accept_within(binary, version_banner, CHECK_TIMEOUT).await
}

/// [`accept`] with an explicit per-run time limit. A run that exceeds it is killed.
pub async fn accept_within(
    binary: &Path,
    version_banner: &str,
    limit: Duration,
) -> Result<AcceptanceReport> {
    let version_output = run(binary, "--version", limit).await?;
    if !version_output.contains(version_banner) {
        return Err(InstallError::Acceptance {
            check: "--version".to_string(),
            expected: version_banner.to_string(),
            output: version_output,
        });
    }

    let help_output = run(binary, "--help", limit).await?;
    if !help_output.contains(HELP_MARKER) {
        return Err(InstallError::Acceptance {
            check: "--help".to_string(),
            expected: HELP_MARKER.to_string(),
            output: help_output,
        });
    }

    tracing::debug!("acceptance passed for {}", binary.display());
    Ok(AcceptanceReport {
        version_output,
        help_output,
    })
}

async fn run(binary: &Path, flag: &str, limit: Duration) -> Result<String> {
    let failed = |output: String| InstallError::Acceptance {
        check: flag.to_string(),
        expected: "a runnable binary".to_string(),
        output,
    };

    let output = match tokio::time::timeout(limit, spawn(binary, flag)).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return Err(failed(format!("failed to run {}: {}", binary.display(), e))),
        Err(_) => {
            return Err(failed(format!(
                "{} {} did not exit within {:?}",
                binary.display(),
                flag,
                limit
            )));
        }
    };

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    Ok(combined)
}

/// A just-renamed binary can briefly report ETXTBSY while a forked sibling
/// still holds the write descriptor
async fn spawn(binary: &Path, flag: &str) -> std::io::Result<Output> {
    let mut attempts = 0;
    loop {
        let result = Command::new(binary)
            .arg(flag)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await;
        match result {
            Err(e) if e.kind() == ErrorKind::ExecutableFileBusy && attempts < 5 => {
                attempts += 1;
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            other => return other,
        }
    }
}
