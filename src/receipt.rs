//! Install receipt written into the keg.
//!
//! ```text
//! {prefix}/Cellar/sqlite-otel-collector/0.8.0/
//!   INSTALL_RECEIPT.json     # how this binary got here
//!   bin/sqlite-otel-collector
//! ```
//!
//! The receipt records which strategy and artifact produced the installed binary so
//! a later `kefir info` can tell a pinned release from a development build.

use crate::error::Result;
use crate::formula::{Checksum, StrategyKind};
use crate::platform::Platform;
use crate::resolve::ArtifactSource;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallReceipt {
    pub formula: String,
    pub version: String,
    pub strategy: StrategyKind,
    pub platform: Platform,
    pub source_url: String,
    /// Declared digest of the fetched artifact (`no_check` for branch builds)
    pub source_sha256: Checksum,
    /// Digest of the binary as installed
    pub binary_sha256: String,
    pub installed_by: String,
    /// RFC 3339
    pub time: String,
}

impl InstallReceipt {
    pub fn new(formula: &str, version: &str, source: &ArtifactSource, binary_sha256: String) -> Self {
        Self {
            formula: formula.to_string(),
            version: version.to_string(),
            strategy: source.strategy,
            platform: source.platform,
            source_url: source.url().to_string(),
            source_sha256: source.checksum.clone(),
            binary_sha256,
            installed_by: format!("kefir/{}", env!("CARGO_PKG_VERSION")),
            time: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn read(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn write(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
    }

    pub fn is_development(&self) -> bool {
        self.strategy == StrategyKind::SourceBuildBranch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::Formula;
    use crate::resolve::{Strategy, resolve};
    use tempfile::TempDir;

    #[test]
    fn test_write_and_read() {
        let temp = TempDir::new().unwrap();
        let formula = crate::formula::release_fixture();
        let source = resolve(
            &formula,
            "linux-arm".parse().unwrap(),
            &Strategy::PrebuiltRelease,
        )
        .unwrap();
        let receipt = InstallReceipt::new(&formula.name, &formula.version, &source, "ab".repeat(32));

        let path = temp.path().join("INSTALL_RECEIPT.json");
        receipt.write(&path).unwrap();
        let back = InstallReceipt::read(&path).unwrap();

        assert_eq!(back, receipt);
        assert_eq!(back.platform.to_string(), "linux-arm");
        assert!(!back.is_development());
        assert!(chrono::DateTime::parse_from_rfc3339(&back.time).is_ok());
    }

    #[test]
    fn test_branch_receipt_marks_no_check() {
        let formula = Formula::builtin().unwrap();
        let source = resolve(
            &formula,
            "linux-amd64".parse().unwrap(),
            &Strategy::SourceBuildBranch { branch: None },
        )
        .unwrap();
        let receipt = InstallReceipt::new(&formula.name, &formula.version, &source, String::new());
        let json = serde_json::to_string(&receipt).unwrap();
        assert!(json.contains("\"source_sha256\":\"no_check\""));
        assert!(receipt.is_development());
    }
}
