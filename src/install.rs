//! The install pipeline.
//!
//! ```text
//! resolve ─▶ lock ─▶ acquire (download | download + build) ─▶ verify
//!         ─▶ place (atomic rename) ─▶ link ─▶ receipt ─▶ prepare dirs
//!         ─▶ service descriptor ─▶ acceptance
//! ```
//!
//! Every stage runs once, in order, on the calling task. Any error ends the attempt;
//! nothing is retried. Acquisition happens in a staging directory inside the prefix
//! so the final move onto the canonical path is a same-filesystem `rename`: an
//! interrupted or failed install leaves the previous binary (or no binary) in place,
//! never a partial one.

use crate::acceptance::{self, AcceptanceReport};
use crate::build;
use crate::cache;
use crate::download;
use crate::error::{InstallError, Result};
use crate::formula::Formula;
use crate::layout::InstallationLayout;
use crate::platform::{Os, Platform};
use crate::prepare;
use crate::receipt::InstallReceipt;
use crate::resolve::{self, ArtifactSource, Location, Strategy};
use crate::services::{self, ServiceDescriptor};
use crate::verify::{self, Verification};
use fs2::FileExt;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::os::unix::fs::{PermissionsExt, symlink};
use std::path::{Path, PathBuf};
use std::time::Instant;

const BINARY_MODE: u32 = 0o755;

/// What to install and how
#[derive(Debug, Clone)]
pub struct InstallRequest {
    pub platform: Platform,
    pub strategy: Strategy,
    /// Run the `--version`/`--help` smoke test after placing the binary
    pub run_acceptance: bool,
    /// Write the supervisor definition into this directory
    pub service_dir: Option<PathBuf>,
}

/// Result of a successful install
#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub formula: String,
    pub version: String,
    pub source: ArtifactSource,
    pub verification: Verification,
    pub layout: InstallationLayout,
    pub binary_sha256: String,
    pub service: ServiceDescriptor,
    pub service_file: Option<PathBuf>,
    pub acceptance: Option<AcceptanceReport>,
    /// Time taken (milliseconds)
    pub time_ms: u64,
}

pub struct Installer {
    formula: Formula,
    layout: InstallationLayout,
    client: reqwest::Client,
    cache_dir: Option<PathBuf>,
}

impl Installer {
    pub fn new(formula: Formula, prefix: impl Into<PathBuf>) -> Result<Self> {
        let layout = InstallationLayout::new(prefix, &formula);
        Ok(Self {
            formula,
            layout,
            client: download::client()?,
            cache_dir: Some(cache::cache_dir()),
        })
    }

    /// Use a different download cache, or none
    pub fn with_cache_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.cache_dir = dir;
        self
    }

    pub fn formula(&self) -> &Formula {
        &self.formula
    }

    pub fn layout(&self) -> &InstallationLayout {
        &self.layout
    }

    pub fn resolve(&self, platform: Platform, strategy: &Strategy) -> Result<ArtifactSource> {
        resolve::resolve(&self.formula, platform, strategy)
    }

    /// Receipt of the currently installed version, if any
    pub fn receipt(&self) -> Option<InstallReceipt> {
        InstallReceipt::read(&self.layout.receipt).ok()
    }

    /// Service definition for the installed binary
    pub fn service(&self) -> ServiceDescriptor {
        ServiceDescriptor::for_layout(&self.layout, &self.formula.name)
    }

    /// Run the whole pipeline.
    ///
    /// # Errors
    ///
    /// Resolution errors happen before any side effect. Acquisition and integrity
    /// errors leave the canonical binary path exactly as it was. Placement errors
    /// name the path under the prefix that could not be written. Directory and
    /// acceptance errors happen after the binary was placed; the install must be
    /// treated as broken.
    pub async fn install(&self, request: &InstallRequest) -> Result<InstallReport> {
        let start = Instant::now();
        let source = self.resolve(request.platform, &request.strategy)?;
        // Supervisor definitions follow the host, whatever platform was installed
        let service_os = match &request.service_dir {
            Some(_) => Some(Os::detect()?),
            None => None,
        };

        if source.is_development() {
            tracing::warn!(
                "{} is a development build from an unpinned branch; its checksum is not verified",
                source.url()
            );
        }
        tracing::info!(
            "installing {} {} via {} for {}",
            self.formula.name,
            self.formula.version,
            source.strategy,
            source.platform
        );

        let prefix = self.layout.prefix.clone();
        fs::create_dir_all(&prefix).map_err(placement(&prefix))?;
        let lock_path = self.layout.lock_file.clone();
        let _lock = blocking(move || lock(&lock_path)).await?;

        let staging = tempfile::Builder::new()
            .prefix(".kefir-staging-")
            .tempdir_in(&prefix)
            .map_err(|e| {
                InstallError::Acquisition(format!(
                    "Failed to create a staging directory in {}: {}",
                    prefix.display(),
                    e
                ))
            })?;
        let (artifact, verification) = self.acquire(&source, staging.path()).await?;

        let binary = self.layout.binary.clone();
        let binary_sha256 = blocking(move || {
            place_binary(&artifact, &binary)?;
            verify::sha256_file(&binary).map_err(placement(&binary))
        })
        .await?;
        if let Err(e) = staging.close() {
            tracing::warn!("could not remove staging directory: {}", e);
        }

        link_binary(&self.layout)?;
        InstallReceipt::new(
            &self.formula.name,
            &self.formula.version,
            &source,
            binary_sha256.clone(),
        )
        .write(&self.layout.receipt)
        .map_err(placement(&self.layout.receipt))?;

        prepare::prepare(&self.layout)?;

        let service = self.service();
        let service_file = match (&request.service_dir, service_os) {
            (Some(dir), Some(os)) => Some(
                services::register(&service, os, dir).map_err(|e| match e {
                    InstallError::Io(source) => InstallError::Placement {
                        path: dir.clone(),
                        source,
                    },
                    other => other,
                })?,
            ),
            _ => None,
        };

        let acceptance = if request.run_acceptance {
            Some(acceptance::accept(&self.layout.binary, &self.formula.version_banner()).await?)
        } else {
            None
        };

        Ok(InstallReport {
            formula: self.formula.name.clone(),
            version: self.formula.version.clone(),
            source,
            verification,
            layout: self.layout.clone(),
            binary_sha256,
            service,
            service_file,
            acceptance,
            time_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Produce the executable inside `staging`
    async fn acquire(&self, source: &ArtifactSource, staging: &Path) -> Result<(PathBuf, Verification)> {
        let (fetched, verification) = self.fetch_verified(source, staging).await?;

        match &source.location {
            Location::Download { .. } => Ok((fetched, verification)),
            Location::Build { recipe, .. } => {
                let work_dir = staging.join("src");
                let recipe = recipe.clone();
                let executable = blocking(move || {
                    let root = build::unpack_source(&fetched, &work_dir)?;
                    build::run_build(&root, &recipe)
                })
                .await?;
                Ok((executable, verification))
            }
        }
    }

    /// Fetch (or reuse from cache) the artifact bytes and verify them
    async fn fetch_verified(&self, source: &ArtifactSource, staging: &Path) -> Result<(PathBuf, Verification)> {
        let dest = staging.join(&source.file_name);

        let cached = match &self.cache_dir {
            Some(dir) => {
                let (dir, name, checksum) = (dir.clone(), source.file_name.clone(), source.checksum.clone());
                blocking(move || Ok(cache::lookup(&dir, &name, &checksum))).await?
            }
            None => None,
        };

        if let Some(hit) = &cached {
            tracing::info!("using cached {}", hit.display());
            fs::copy(hit, &dest).map_err(|e| {
                InstallError::Acquisition(format!("Failed to copy {}: {}", hit.display(), e))
            })?;
        } else {
            download::fetch(&self.client, source.url(), &dest, &source.file_name).await?;
        }

        let (path, checksum, name) = (dest.clone(), source.checksum.clone(), source.file_name.clone());
        let verification = blocking(move || verify::verify_file(&path, &checksum, &name)).await?;

        if cached.is_none()
            && let Some(cache_dir) = &self.cache_dir
        {
            cache::store(cache_dir, &source.file_name, &dest, &source.checksum);
        }
        Ok((dest, verification))
    }
}

/// Run blocking filesystem or process work off the async worker threads
async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| InstallError::Io(std::io::Error::other(e)))?
}

fn placement(path: &Path) -> impl FnOnce(std::io::Error) -> InstallError + '_ {
    move |source| InstallError::Placement {
        path: path.to_path_buf(),
        source,
    }
}

/// Hold an exclusive lock for the duration of an install
fn lock(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(placement(parent))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(path)
        .map_err(placement(path))?;

    if file.try_lock_exclusive().is_err() {
        tracing::warn!("another install holds {}, waiting", path.display());
        file.lock_exclusive().map_err(placement(path))?;
    }
    Ok(file)
}

/// Copy `artifact` next to `dest` and rename it into place
fn place_binary(artifact: &Path, dest: &Path) -> Result<()> {
    let parent = dest
        .parent()
        .ok_or_else(|| InstallError::Acquisition(format!("invalid binary path {}", dest.display())))?;
    fs::create_dir_all(parent).map_err(placement(parent))?;

    let tmp = tempfile::NamedTempFile::new_in(parent).map_err(placement(parent))?;
    let write = || -> std::io::Result<()> {
        fs::copy(artifact, tmp.path())?;
        fs::set_permissions(tmp.path(), fs::Permissions::from_mode(BINARY_MODE))?;
        tmp.as_file().sync_all()
    };
    write().map_err(placement(dest))?;
    tmp.persist(dest).map_err(|e| placement(dest)(e.error))?;

    tracing::debug!("placed {}", dest.display());
    Ok(())
}

/// Point `{prefix}/bin/{name}` at the keg binary, replacing a stale link.
/// A regular file in the way is left alone.
fn link_binary(layout: &InstallationLayout) -> Result<()> {
    let link = &layout.linked_binary;
    let target = layout.relative_link_target();

    if let Ok(meta) = link.symlink_metadata() {
        if !meta.file_type().is_symlink() {
            tracing::warn!("{} exists and is not a symlink; not linking", link.display());
            return Ok(());
        }
        if fs::read_link(link).ok().as_deref() == Some(target.as_path()) {
            return Ok(());
        }
    }

    let bin_dir = link
        .parent()
        .ok_or_else(|| InstallError::Acquisition(format!("invalid link path {}", link.display())))?;
    fs::create_dir_all(bin_dir).map_err(placement(bin_dir))?;

    let name = link.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let tmp_link = bin_dir.join(format!(".{}.kefir-link", name));
    let _ = fs::remove_file(&tmp_link);
    symlink(&target, &tmp_link).map_err(placement(&tmp_link))?;
    fs::rename(&tmp_link, link).map_err(placement(link))?;
    Ok(())
}
