//! SHA-256 integrity verification.
//!
//! Verification only reports. It never deletes, repairs or re-downloads; the
//! installer decides what to do with a failed artifact.

use crate::error::{InstallError, Result};
use crate::formula::Checksum;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Outcome of a successful verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Verification {
    Passed { sha256: String },
    /// The source declared `no_check`; nothing was compared
    Waived,
}

/// Stream a file through SHA-256 and return the lowercase hex digest
pub fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0; 8192];

    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

pub fn sha256_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Check `path` against the declared checksum.
///
/// # Errors
///
/// [`InstallError::Integrity`] when the digests differ, [`InstallError::Acquisition`]
/// when the staged file cannot be read.
pub fn verify_file(path: &Path, expected: &Checksum, artifact: &str) -> Result<Verification> {
    let Some(expected) = expected.as_hex() else {
        tracing::debug!("checksum waived for {}", artifact);
        return Ok(Verification::Waived);
    };

    let actual = sha256_file(path).map_err(|e| {
        InstallError::Acquisition(format!("Failed to read {}: {}", path.display(), e))
    })?;
    if !digests_equal(&actual, expected) {
        return Err(InstallError::Integrity {
            artifact: artifact.to_string(),
            expected: expected.to_string(),
            actual,
        });
    }

    tracing::debug!("verified {} ({})", artifact, actual);
    Ok(Verification::Passed { sha256: actual })
}

/// Compare two hex digests without exiting at the first differing byte
fn digests_equal(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    let len = a.len().max(b.len());
    let mut diff = a.len() ^ b.len();
    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        diff |= usize::from(x ^ y);
    }
    diff == 0
}
