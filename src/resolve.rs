//! Artifact resolution: `(platform, strategy)` → exactly one [`ArtifactSource`].
//!
//! Resolution is pure. It never touches the network or the filesystem, and it never
//! falls back from one strategy to another: a `PrebuiltRelease` request for a
//! platform without a release fails even though a source build would work.

use crate::error::{InstallError, Result};
use crate::formula::{ArtifactEntry, BuildRecipe, Checksum, Formula, StrategyKind};
use crate::platform::Platform;
use serde::Serialize;

/// A caller's acquisition request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// Build from a development branch (defaults to the formula's head branch)
    SourceBuildBranch { branch: Option<String> },
    /// Build from a tagged source tarball (defaults to `v{version}`)
    SourceBuildTag { tag: Option<String> },
    /// Download the precompiled binary for the target platform
    PrebuiltRelease,
}

impl Strategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::SourceBuildBranch { .. } => StrategyKind::SourceBuildBranch,
            Strategy::SourceBuildTag { .. } => StrategyKind::SourceBuildTag,
            Strategy::PrebuiltRelease => StrategyKind::PrebuiltRelease,
        }
    }
}

/// Where the binary comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Location {
    /// The artifact is the executable itself
    Download { url: String },
    /// The artifact is a source tarball that must be built
    Build {
        archive_url: String,
        recipe: BuildRecipe,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactSource {
    pub strategy: StrategyKind,
    pub platform: Platform,
    pub location: Location,
    /// Absent (`no_check`) only for branch builds
    pub checksum: Checksum,
    /// Name the downloaded artifact is staged and cached under
    pub file_name: String,
}

impl ArtifactSource {
    /// URL of the bytes that get fetched and verified
    pub fn url(&self) -> &str {
        match &self.location {
            Location::Download { url } => url,
            Location::Build { archive_url, .. } => archive_url,
        }
    }

    /// Development sources are unpinned and skip verification
    pub fn is_development(&self) -> bool {
        self.strategy == StrategyKind::SourceBuildBranch
    }
}

/// Resolve the single artifact source for `platform` under `strategy`.
///
/// # Errors
///
/// Returns [`InstallError::Resolution`] when the formula has no row for the
/// request (unlisted platform, unknown tag, no development branch source) or when
/// a row that must be pinned carries no digest.
pub fn resolve(formula: &Formula, platform: Platform, strategy: &Strategy) -> Result<ArtifactSource> {
    let source = match strategy {
        Strategy::SourceBuildBranch { branch } => {
            let branch = branch.as_deref().unwrap_or(&formula.head_branch);
            validate_ref(branch)?;
            let entry = find(formula, |e| e.strategy == StrategyKind::SourceBuildBranch)
                .ok_or_else(|| {
                    InstallError::Resolution(format!(
                        "{} has no development branch source",
                        formula.name
                    ))
                })?;
            ArtifactSource {
                strategy: StrategyKind::SourceBuildBranch,
                platform,
                location: Location::Build {
                    archive_url: entry.url.replace("{branch}", branch),
                    recipe: formula.build.clone(),
                },
                checksum: Checksum::Unverified,
                file_name: format!("{}--{}.tar.gz", formula.name, branch.replace('/', "-")),
            }
        }
        Strategy::SourceBuildTag { tag } => {
            let tag = tag.clone().unwrap_or_else(|| formula.default_tag());
            validate_ref(&tag)?;
            let entry = find(formula, |e| {
                e.strategy == StrategyKind::SourceBuildTag && e.tag.as_deref() == Some(tag.as_str())
            })
            .ok_or_else(|| {
                InstallError::Resolution(format!(
                    "no checksummed source tarball of {} for tag {} (load a formula file that lists it with --formula)",
                    formula.name, tag
                ))
            })?;
            ArtifactSource {
                strategy: StrategyKind::SourceBuildTag,
                platform,
                location: Location::Build {
                    archive_url: entry.url.clone(),
                    recipe: formula.build.clone(),
                },
                checksum: entry.sha256.clone(),
                file_name: format!("{}--{}.tar.gz", formula.name, tag),
            }
        }
        Strategy::PrebuiltRelease => {
            let entry = find(formula, |e| {
                e.strategy == StrategyKind::PrebuiltRelease && e.platform == Some(platform)
            })
            .ok_or_else(|| {
                InstallError::Resolution(format!(
                    "no prebuilt release of {} for {} (load a formula file that lists it with --formula)",
                    formula.name, platform
                ))
            })?;
            ArtifactSource {
                strategy: StrategyKind::PrebuiltRelease,
                platform,
                location: Location::Download {
                    url: entry.url.clone(),
                },
                checksum: entry.sha256.clone(),
                file_name: entry.file_name().to_string(),
            }
        }
    };

    if !source.is_development() && !source.checksum.is_verified() {
        return Err(InstallError::Resolution(format!(
            "{} source for {} declares no sha256",
            source.strategy, platform
        )));
    }

    Ok(source)
}

fn find(formula: &Formula, pred: impl Fn(&ArtifactEntry) -> bool) -> Option<&ArtifactEntry> {
    formula.artifacts.iter().find(|e| pred(e))
}

/// Reject refs that could escape a URL path segment
fn validate_ref(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name.contains("..")
        || name.starts_with('/')
        || name.chars().any(|c| c.is_whitespace() || c == '?' || c == '#');
    if bad {
        return Err(InstallError::Resolution(format!("invalid git ref: {:?}", name)));
    }
    Ok(())
}
