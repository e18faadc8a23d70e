//! Post-install preparation of runtime directories.

use crate::error::{InstallError, Result};
use crate::layout::InstallationLayout;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

const DIR_MODE: u32 = 0o755;

/// Ensure the data and log directories exist and are owner-writable.
///
/// Safe to call repeatedly: existing directories are left in place (their mode is
/// only widened to include owner write if it was missing).
pub fn prepare(layout: &InstallationLayout) -> Result<()> {
    ensure_dir(&layout.data_dir)?;
    ensure_dir(&layout.log_dir)?;
    Ok(())
}

fn ensure_dir(path: &Path) -> Result<()> {
    let directory_error = |source| InstallError::Directory {
        path: path.to_path_buf(),
        source,
    };

    if !path.is_dir() {
        tracing::debug!("creating {}", path.display());
        fs::create_dir_all(path).map_err(directory_error)?;
        fs::set_permissions(path, fs::Permissions::from_mode(DIR_MODE)).map_err(directory_error)?;
        return Ok(());
    }

    let mut perms = fs::metadata(path).map_err(directory_error)?.permissions();
    if perms.mode() & 0o200 == 0 {
        perms.set_mode(perms.mode() | 0o700);
        fs::set_permissions(path, perms).map_err(directory_error)?;
    }
    Ok(())
}
