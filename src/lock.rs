//! Advisory lock for editing one container file.
//!
//! The library never locks on its own (a `Map` assumes one writer); the CLI
//! takes this lock around open+save so two edits of the same file serialise.
//!
//! Lock file path: <container>.lock
//! Lock is released on Drop.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

pub struct LockGuard {
    file: File,
    path: PathBuf,
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

pub fn lock_file_path(container: &Path) -> PathBuf {
    let name = container
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "map".to_string());
    container.with_file_name(format!("{name}.lock"))
}

fn open_lock_file(container: &Path) -> Result<(File, PathBuf)> {
    let path = lock_file_path(container);
    let f = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(&path)
        .with_context(|| format!("open lock file {}", path.display()))?;
    Ok((f, path))
}

/// Blocks until acquired.
pub fn acquire_exclusive_lock(container: &Path) -> Result<LockGuard> {
    let (file, path) = open_lock_file(container)?;
    file.lock_exclusive()
        .with_context(|| format!("lock_exclusive {}", path.display()))?;
    Ok(LockGuard { file, path })
}

/// Err if someone else holds it.
pub fn try_acquire_exclusive_lock(container: &Path) -> Result<LockGuard> {
    let (file, path) = open_lock_file(container)?;
    file.try_lock_exclusive()
        .with_context(|| format!("try_lock_exclusive failed: {}", path.display()))?;
    Ok(LockGuard { file, path })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_path_sits_next_to_container() {
        assert_eq!(
            lock_file_path(Path::new("/srv/maps/world.umap")),
            PathBuf::from("/srv/maps/world.umap.lock")
        );
    }

    #[test]
    fn second_try_lock_fails_until_release() {
        let dir = std::env::temp_dir().join(format!(
            "mftest-lock-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let container = dir.join("world.umap");

        let g = acquire_exclusive_lock(&container).unwrap();
        assert!(try_acquire_exclusive_lock(&container).is_err());
        drop(g);
        let g2 = try_acquire_exclusive_lock(&container).unwrap();
        assert_eq!(g2.path(), lock_file_path(&container).as_path());
        drop(g2);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
