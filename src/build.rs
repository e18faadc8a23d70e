//! Building the collector from a source tarball.
//!
//! The tarball (GitHub archive layout: one top-level `{repo}-{ref}/` directory) is
//! unpacked into the staging area, the recipe's command runs from the source root
//! with the native-linkage environment set, and the produced executable is located.

use crate::error::{InstallError, Result};
use crate::formula::BuildRecipe;
use flate2::read::GzDecoder;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use tar::Archive;
use walkdir::WalkDir;

/// How much of a failing build's stderr is kept in the error
const STDERR_TAIL_LINES: usize = 20;

/// Unpack `archive` under `work_dir` and return the source root
pub fn unpack_source(archive: &Path, work_dir: &Path) -> Result<PathBuf> {
    let io_error = |path: &Path, e: std::io::Error| {
        InstallError::Acquisition(format!("Failed to access {}: {}", path.display(), e))
    };
    fs::create_dir_all(work_dir).map_err(|e| io_error(work_dir, e))?;

    let file = fs::File::open(archive).map_err(|e| io_error(archive, e))?;
    let mut tarball = Archive::new(GzDecoder::new(file));
    tarball.unpack(work_dir).map_err(|e| {
        InstallError::Acquisition(format!(
            "Failed to unpack {}: {}",
            archive.display(),
            e
        ))
    })?;

    // Archive contains a single {repo}-{ref}/ directory, or loose files
    let entries: Vec<PathBuf> = fs::read_dir(work_dir)
        .map_err(|e| io_error(work_dir, e))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .collect();

    match entries.as_slice() {
        [] => Err(InstallError::Acquisition(format!(
            "Source archive {} is empty",
            archive.display()
        ))),
        [single] if single.is_dir() => Ok(single.clone()),
        _ => Ok(work_dir.to_path_buf()),
    }
}

/// Run the build recipe in `source_root` and return the produced executable
pub fn run_build(source_root: &Path, recipe: &BuildRecipe) -> Result<PathBuf> {
    let (program, args) = recipe
        .command
        .split_first()
        .ok_or_else(|| InstallError::Acquisition("Empty build command".to_string()))?;
    let command_line = recipe.command.join(" ");

    tracing::info!(
        "building in {} with `{}` ({})",
        source_root.display(),
        command_line,
        recipe
            .env
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ")
    );

    let output = Command::new(program)
        .args(args)
        .envs(&recipe.env)
        .current_dir(source_root)
        .output()
        .map_err(|e| InstallError::Acquisition(format!("Failed to run `{}`: {}", command_line, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let lines: Vec<&str> = stderr.lines().collect();
        let tail = lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n");
        return Err(InstallError::Acquisition(format!(
            "`{}` failed ({}):\n{}",
            command_line, output.status, tail
        )));
    }

    find_executable(source_root, &recipe.executable)
}

/// Locate the built executable: the source root first, then anywhere below it
fn find_executable(source_root: &Path, name: &str) -> Result<PathBuf> {
    let direct = source_root.join(name);
    if is_executable(&direct) {
        return Ok(direct);
    }

    WalkDir::new(source_root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == name)
        .map(|entry| entry.into_path())
        .find(|path| is_executable(path))
        .ok_or_else(|| {
            InstallError::Acquisition(format!(
                "Build succeeded but produced no `{}` executable in {}",
                name,
                source_root.display()
            ))
        })
}

fn is_executable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}
