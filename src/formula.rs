//! The formula: one data table describing every way to obtain the collector.
//!
//! Rather than three near-duplicate definitions (branch build, tagged build,
//! prebuilt release), a formula is a single table of [`ArtifactEntry`] rows keyed
//! by `(strategy, platform, tag)`. Source strategies are platform-independent and
//! leave `platform` empty; prebuilt rows carry exactly one platform each.
//!
//! The table compiled into the binary lives in `formula/sqlite-otel-collector.json`.
//! It only lists the development branch, whose checksum is waived. Release rows need
//! published digests and come from a file of the same shape loaded at runtime
//! (`--formula` / `KEFIR_FORMULA`):
//!
//! ```json
//! {
//!   "name": "sqlite-otel-collector",
//!   "version": "0.8.0",
//!   "build": { "command": ["make", "build-native"], "env": { "CGO_ENABLED": "1" }, "executable": "sqlite-otel" },
//!   "artifacts": [
//!     { "strategy": "source-build-branch", "url": ".../refs/heads/{branch}.tar.gz", "sha256": "no_check" },
//!     { "strategy": "source-build-tag", "tag": "v0.8.0", "url": ".../refs/tags/v0.8.0.tar.gz", "sha256": "<64 hex>" },
//!     { "strategy": "prebuilt-release", "platform": "darwin-arm64", "url": ".../sqlite-otel-darwin-arm64", "sha256": "<64 hex>" }
//!   ]
//! }
//! ```

use crate::error::{InstallError, Result};
use crate::platform::{Arch, Os, Platform};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;

const BUILTIN_FORMULA: &str = include_str!("../formula/sqlite-otel-collector.json");

/// Marker used in place of a digest for unpinned development sources
pub const NO_CHECK: &str = "no_check";

/// How the collector binary is obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// Build from an unpinned development branch; integrity check waived
    SourceBuildBranch,
    /// Build from a released source tarball with a declared checksum
    SourceBuildTag,
    /// Download a precompiled binary for an exact platform
    PrebuiltRelease,
}

impl StrategyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::SourceBuildBranch => "source-build-branch",
            StrategyKind::SourceBuildTag => "source-build-tag",
            StrategyKind::PrebuiltRelease => "prebuilt-release",
        }
    }

    pub fn is_source_build(self) -> bool {
        !matches!(self, StrategyKind::PrebuiltRelease)
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared SHA-256 of an artifact, or an explicit waiver
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Checksum {
    /// Lowercase hexadecimal SHA-256
    Sha256(String),
    /// Verification explicitly waived (`no_check`)
    Unverified,
}

impl Checksum {
    /// Parse a declared digest. Accepts 64 hex characters (normalized to
    /// lowercase) or the literal `no_check`.
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        if value == NO_CHECK {
            return Ok(Checksum::Unverified);
        }
        if value.len() != 64 || !value.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(InstallError::Formula(format!(
                "sha256 must be 64 hex characters or `{}`, got {:?}",
                NO_CHECK, value
            )));
        }
        Ok(Checksum::Sha256(value.to_ascii_lowercase()))
    }

    pub fn is_verified(&self) -> bool {
        matches!(self, Checksum::Sha256(_))
    }

    pub fn as_hex(&self) -> Option<&str> {
        match self {
            Checksum::Sha256(hex) => Some(hex),
            Checksum::Unverified => None,
        }
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Checksum::Sha256(hex) => f.write_str(hex),
            Checksum::Unverified => f.write_str(NO_CHECK),
        }
    }
}

impl TryFrom<String> for Checksum {
    type Error = InstallError;

    fn try_from(value: String) -> Result<Self> {
        Checksum::parse(&value)
    }
}

impl From<Checksum> for String {
    fn from(checksum: Checksum) -> Self {
        checksum.to_string()
    }
}

/// Command that turns an unpacked source tree into the collector executable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRecipe {
    /// Program and arguments, run from the source root
    pub command: Vec<String>,
    /// Environment required for native (SQLite) linkage, e.g. `CGO_ENABLED=1`
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// File name of the produced executable
    pub executable: String,
}

/// One row of the artifact table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub strategy: StrategyKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Download location; branch rows may contain a `{branch}` placeholder
    pub url: String,
    pub sha256: Checksum,
}

impl ArtifactEntry {
    /// Last path segment of the URL (e.g. `sqlite-otel-darwin-arm64`)
    pub fn file_name(&self) -> &str {
        self.url.rsplit('/').next().unwrap_or(&self.url)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Formula {
    /// Canonical binary name the executable is installed under
    pub name: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub homepage: String,
    #[serde(default)]
    pub license: String,
    pub version: String,
    #[serde(default = "default_head_branch")]
    pub head_branch: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    pub build: BuildRecipe,
    pub artifacts: Vec<ArtifactEntry>,
}

fn default_head_branch() -> String {
    "main".to_string()
}

impl Formula {
    /// The formula compiled into this binary
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_FORMULA)
    }

    /// Read and validate a formula file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            InstallError::Formula(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        let formula: Formula = serde_json::from_str(contents)?;
        formula.validate()?;
        Ok(formula)
    }

    /// Tag a `SourceBuildTag` request defaults to
    pub fn default_tag(&self) -> String {
        format!("v{}", self.version)
    }

    /// What `--version` of a correctly installed binary must contain
    pub fn version_banner(&self) -> String {
        format!("{} v{}", self.name, self.version)
    }

    /// Check the table invariants: every row except the branch build carries a
    /// digest, keys are unique, and no prebuilt row targets an impossible platform.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.name.contains('/') {
            return Err(InstallError::Formula(format!(
                "invalid formula name {:?}",
                self.name
            )));
        }
        if self.version.is_empty() {
            return Err(InstallError::Formula("version is empty".to_string()));
        }
        if self.build.command.is_empty() || self.build.executable.is_empty() {
            return Err(InstallError::Formula(
                "build needs a command and an executable name".to_string(),
            ));
        }
        if self.build.env.is_empty() {
            return Err(InstallError::Formula(
                "build env must enable native linkage (e.g. CGO_ENABLED=1)".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for entry in &self.artifacts {
            let key = (entry.strategy, entry.platform, entry.tag.clone());
            if !seen.insert(key) {
                return Err(InstallError::Formula(format!(
                    "duplicate {} entry for {}",
                    entry.strategy,
                    entry
                        .platform
                        .map(|p| p.to_string())
                        .or_else(|| entry.tag.clone())
                        .unwrap_or_else(|| "source".to_string())
                )));
            }
            if entry.url.is_empty() {
                return Err(InstallError::Formula(format!(
                    "{} entry has no url",
                    entry.strategy
                )));
            }

            match entry.strategy {
                StrategyKind::SourceBuildBranch => {
                    if entry.sha256 != Checksum::Unverified {
                        return Err(InstallError::Formula(format!(
                            "branch builds are unpinned; sha256 must be `{}`",
                            NO_CHECK
                        )));
                    }
                    if entry.platform.is_some() {
                        return Err(InstallError::Formula(
                            "source entries are platform-independent".to_string(),
                        ));
                    }
                }
                StrategyKind::SourceBuildTag => {
                    if !entry.sha256.is_verified() {
                        return Err(InstallError::Formula(
                            "tagged source entries require a sha256".to_string(),
                        ));
                    }
                    if entry.tag.as_deref().is_none_or(str::is_empty) {
                        return Err(InstallError::Formula(
                            "tagged source entries require a tag".to_string(),
                        ));
                    }
                    if entry.platform.is_some() {
                        return Err(InstallError::Formula(
                            "source entries are platform-independent".to_string(),
                        ));
                    }
                }
                StrategyKind::PrebuiltRelease => {
                    if !entry.sha256.is_verified() {
                        return Err(InstallError::Formula(format!(
                            "prebuilt entry {} requires a sha256",
                            entry.url
                        )));
                    }
                    match entry.platform {
                        None => {
                            return Err(InstallError::Formula(format!(
                                "prebuilt entry {} has no platform",
                                entry.url
                            )));
                        }
                        Some(p) if p.os() == Os::MacOs && p.arch() == Arch::Arm32 => {
                            return Err(InstallError::Formula(
                                "no 32-bit ARM macOS target exists".to_string(),
                            ));
                        }
                        Some(_) => {}
                    }
                }
            }
        }
        Ok(())
    }
}

/// Formula with a tag row and one prebuilt row per platform, for tests.
/// Digests are derived from the row names, not from real release assets.
#[cfg(test)]
pub(crate) fn release_fixture() -> Formula {
    use crate::verify::sha256_bytes;

    let mut formula = Formula::builtin().expect("built-in formula");
    let repo = "https://github.com/RedShiftVelocity/sqlite-otel";
    formula.artifacts.push(ArtifactEntry {
        strategy: StrategyKind::SourceBuildTag,
        platform: None,
        tag: Some("v0.8.0".to_string()),
        url: format!("{}/archive/refs/tags/v0.8.0.tar.gz", repo),
        sha256: Checksum::Sha256(sha256_bytes(b"v0.8.0.tar.gz")),
    });
    for platform in Platform::ALL {
        let asset = format!("sqlite-otel-{}", platform);
        formula.artifacts.push(ArtifactEntry {
            strategy: StrategyKind::PrebuiltRelease,
            platform: Some(platform),
            tag: None,
            url: format!("{}/releases/download/v0.8.0/{}", repo, asset),
            sha256: Checksum::Sha256(sha256_bytes(asset.as_bytes())),
        });
    }
    formula.validate().expect("fixture formula");
    formula
}
