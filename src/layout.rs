//! Installation layout under a Homebrew-style prefix.
//!
//! ```text
//! {prefix}/
//!   Cellar/sqlite-otel-collector/0.8.0/
//!     bin/sqlite-otel-collector        # canonical binary
//!     INSTALL_RECEIPT.json
//!   bin/sqlite-otel-collector          # symlink -> ../Cellar/.../bin/sqlite-otel-collector
//!   var/lib/sqlite-otel-collector/     # service working directory
//!   var/log/sqlite-otel-collector.log  # stdout + stderr
//!   var/kefir/sqlite-otel-collector.lock
//! ```

use crate::formula::Formula;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Detect the install prefix on this system
pub fn detect_prefix() -> PathBuf {
    for var in ["KEFIR_PREFIX", "HOMEBREW_PREFIX"] {
        if let Some(prefix) = std::env::var_os(var).filter(|v| !v.is_empty()) {
            return PathBuf::from(prefix);
        }
    }

    // Detect by architecture
    #[cfg(all(target_os = "macos", target_arch = "aarch64"))]
    {
        PathBuf::from("/opt/homebrew")
    }
    #[cfg(not(all(target_os = "macos", target_arch = "aarch64")))]
    {
        PathBuf::from("/usr/local")
    }
}

/// Every path the installer touches, anchored to one prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallationLayout {
    pub prefix: PathBuf,
    /// Versioned keg: `Cellar/{name}/{version}`
    pub keg: PathBuf,
    /// Canonical binary path inside the keg
    pub binary: PathBuf,
    /// Executable-search-path link to the canonical binary
    pub linked_binary: PathBuf,
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub log_file: PathBuf,
    pub lock_file: PathBuf,
    pub receipt: PathBuf,
}

impl InstallationLayout {
    pub fn new(prefix: impl Into<PathBuf>, formula: &Formula) -> Self {
        let prefix = prefix.into();
        let name = &formula.name;
        let keg = prefix.join("Cellar").join(name).join(&formula.version);
        let log_dir = prefix.join("var/log");

        Self {
            binary: keg.join("bin").join(name),
            receipt: keg.join("INSTALL_RECEIPT.json"),
            linked_binary: prefix.join("bin").join(name),
            data_dir: prefix.join("var/lib").join(name),
            log_file: log_dir.join(format!("{}.log", name)),
            lock_file: prefix.join("var/kefir").join(format!("{}.lock", name)),
            log_dir,
            keg,
            prefix,
        }
    }

    /// Link target for `linked_binary`, relative to the prefix's `bin/`
    pub fn relative_link_target(&self) -> PathBuf {
        let rel = self
            .binary
            .strip_prefix(&self.prefix)
            .unwrap_or(&self.binary);
        Path::new("..").join(rel)
    }
}
