pub mod cache;
pub mod info;
pub mod install;
pub mod resolve;
pub mod services;
pub mod verify;

use anyhow::{Context as _, Result, bail};
use clap::{Args, ValueEnum};
use kefir::{Formula, InstallationLayout, Platform, Strategy};
use std::path::{Path, PathBuf};

/// Everything a command needs: the formula in use and where it installs
pub struct Context {
    pub formula: Formula,
    pub prefix: PathBuf,
    pub layout: InstallationLayout,
}

impl Context {
    pub fn new(prefix: Option<PathBuf>, formula_path: Option<&Path>) -> Result<Self> {
        let formula = match formula_path {
            Some(path) => Formula::load(path)
                .with_context(|| format!("Failed to load formula {}", path.display()))?,
            None => Formula::builtin().context("Built-in formula is invalid")?,
        };
        let prefix = prefix.unwrap_or_else(kefir::layout::detect_prefix);
        let layout = InstallationLayout::new(&prefix, &formula);
        tracing::debug!("prefix {}, formula {} {}", prefix.display(), formula.name, formula.version);

        Ok(Self {
            formula,
            prefix,
            layout,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
    /// Download the prebuilt release binary
    Prebuilt,
    /// Build from the tagged source release
    Tag,
    /// Build from a development branch (unverified)
    Branch,
}

/// Which artifact to pick, shared by `install` and `resolve`
#[derive(Debug, Clone, Args)]
pub struct Selector {
    /// Acquisition strategy
    #[arg(long, value_enum, default_value_t = StrategyArg::Prebuilt)]
    pub strategy: StrategyArg,

    /// Source tag for `--strategy tag` (default: v{version})
    #[arg(long)]
    pub tag: Option<String>,

    /// Branch for `--strategy branch` (default: the formula's head branch)
    #[arg(long)]
    pub branch: Option<String>,

    /// Target platform, e.g. darwin-arm64 or linux-arm (default: this host)
    #[arg(long)]
    pub platform: Option<String>,
}

impl Selector {
    pub fn platform(&self) -> Result<Platform> {
        Ok(match &self.platform {
            Some(tag) => tag.parse()?,
            None => Platform::detect()?,
        })
    }

    /// The caller's explicit choice; a `--tag` or `--branch` that doesn't belong
    /// to the chosen strategy is an error rather than a hint to switch
    pub fn strategy(&self) -> Result<Strategy> {
        match self.strategy {
            StrategyArg::Prebuilt => {
                if self.tag.is_some() || self.branch.is_some() {
                    bail!("--tag/--branch only apply to source strategies");
                }
                Ok(Strategy::PrebuiltRelease)
            }
            StrategyArg::Tag => {
                if self.branch.is_some() {
                    bail!("--branch requires --strategy branch");
                }
                Ok(Strategy::SourceBuildTag {
                    tag: self.tag.clone(),
                })
            }
            StrategyArg::Branch => {
                if self.tag.is_some() {
                    bail!("--tag requires --strategy tag");
                }
                Ok(Strategy::SourceBuildBranch {
                    branch: self.branch.clone(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selector(strategy: StrategyArg, tag: Option<&str>, branch: Option<&str>) -> Selector {
        Selector {
            strategy,
            tag: tag.map(String::from),
            branch: branch.map(String::from),
            platform: Some("linux-arm".to_string()),
        }
    }

    #[test]
    fn test_selector_maps_strategies() {
        assert_eq!(
            selector(StrategyArg::Prebuilt, None, None).strategy().unwrap(),
            Strategy::PrebuiltRelease
        );
        assert_eq!(
            selector(StrategyArg::Tag, Some("v0.8.0"), None).strategy().unwrap(),
            Strategy::SourceBuildTag {
                tag: Some("v0.8.0".to_string())
            }
        );
        assert_eq!(
            selector(StrategyArg::Branch, None, None).strategy().unwrap(),
            Strategy::SourceBuildBranch { branch: None }
        );
    }

    #[test]
    fn test_selector_rejects_mismatched_refs() {
        assert!(selector(StrategyArg::Prebuilt, Some("v0.8.0"), None).strategy().is_err());
        assert!(selector(StrategyArg::Tag, None, Some("main")).strategy().is_err());
        assert!(selector(StrategyArg::Branch, Some("v0.8.0"), None).strategy().is_err());
    }

    #[test]
    fn test_selector_platform() {
        let p = selector(StrategyArg::Prebuilt, None, None).platform().unwrap();
        assert_eq!(p.to_string(), "linux-arm");
    }
}
