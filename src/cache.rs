//! Download cache for verified artifacts.
//!
//! Only artifacts with a declared digest are cached, and a cache hit is reused only
//! after re-verifying it. An entry that doesn't match is left alone: the declared
//! digest may be the wrong one, and a verified download replaces the entry anyway.
//! Unpinned branch tarballs always come from the network.

use crate::formula::Checksum;
use crate::verify;
use std::fs;
use std::path::{Path, PathBuf};

/// Get the cache directory (~/.cache/kefir/ or equivalent)
pub fn cache_dir() -> PathBuf {
    if let Some(cache_home) = std::env::var_os("XDG_CACHE_HOME") {
        PathBuf::from(cache_home).join("kefir")
    } else if let Some(home) = std::env::var_os("HOME") {
        PathBuf::from(home).join(".cache/kefir")
    } else {
        PathBuf::from(".cache/kefir")
    }
}

/// Return a cached copy of `file_name` if its digest still matches
pub fn lookup(dir: &Path, file_name: &str, checksum: &Checksum) -> Option<PathBuf> {
    let expected = checksum.as_hex()?;
    let path = dir.join(file_name);
    if !path.is_file() {
        return None;
    }

    match verify::sha256_file(&path) {
        Ok(actual) if actual == expected => Some(path),
        Ok(_) => {
            tracing::debug!("cache entry {} does not match, ignoring", path.display());
            None
        }
        Err(e) => {
            tracing::debug!("unreadable cache entry {}: {}", path.display(), e);
            None
        }
    }
}

/// Copy a verified artifact into the cache. Failures are logged, not returned:
/// a cold cache never breaks an install.
pub fn store(dir: &Path, file_name: &str, artifact: &Path, checksum: &Checksum) {
    if !checksum.is_verified() {
        return;
    }

    let result = fs::create_dir_all(dir).and_then(|_| {
        let tmp = tempfile::NamedTempFile::new_in(dir)?;
        fs::copy(artifact, tmp.path())?;
        tmp.persist(dir.join(file_name)).map_err(|e| e.error)?;
        Ok(())
    });

    if let Err(e) = result {
        tracing::warn!("could not cache {}: {}", file_name, e);
    }
}

/// Remove every cached artifact
pub fn clear(dir: &Path) -> std::io::Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            fs::remove_file(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_store_then_lookup() {
        let temp = TempDir::new().unwrap();
        let cache = temp.path().join("cache");
        let artifact = temp.path().join("a");
        fs::write(&artifact, "payload").unwrap();
        let checksum = Checksum::parse(&verify::sha256_bytes(b"payload")).unwrap();

        assert!(lookup(&cache, "a", &checksum).is_none());
        store(&cache, "a", &artifact, &checksum);
        assert_eq!(lookup(&cache, "a", &checksum), Some(cache.join("a")));
    }

    #[test]
    fn test_mismatched_entry_is_kept() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a"), "payload").unwrap();
        let wrong = Checksum::parse(&verify::sha256_bytes(b"other")).unwrap();

        assert!(lookup(temp.path(), "a", &wrong).is_none());
        assert_eq!(fs::read_to_string(temp.path().join("a")).unwrap(), "payload");
    }

    #[test]
    fn test_store_replaces_mismatched_entry() {
        let temp = TempDir::new().unwrap();
        let cache = temp.path().join("cache");
        fs::create_dir_all(&cache).unwrap();
        fs::write(cache.join("a"), "old").unwrap();
        let artifact = temp.path().join("a");
        fs::write(&artifact, "payload").unwrap();
        let checksum = Checksum::parse(&verify::sha256_bytes(b"payload")).unwrap();

        assert!(lookup(&cache, "a", &checksum).is_none());
        store(&cache, "a", &artifact, &checksum);
        assert_eq!(lookup(&cache, "a", &checksum), Some(cache.join("a")));
    }

    #[test]
    fn test_unverified_never_cached() {
        let temp = TempDir::new().unwrap();
        let cache = temp.path().join("cache");
        let artifact = temp.path().join("a");
        fs::write(&artifact, "payload").unwrap();

        store(&cache, "a", &artifact, &Checksum::Unverified);
        assert!(!cache.join("a").exists());
        assert!(lookup(&cache, "a", &Checksum::Unverified).is_none());
    }

    #[test]
    fn test_clear() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a"), "1").unwrap();
        fs::write(temp.path().join("b"), "2").unwrap();
        assert_eq!(clear(temp.path()).unwrap(), 2);
        assert_eq!(clear(&temp.path().join("missing")).unwrap(), 0);
    }
}
