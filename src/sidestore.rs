//! sidestore — хранилище исходников скриптов рядом с контейнером.
//!
//! Keys are package paths such as `/User/Lua/NewScript`. `FsSourceStore`
//! maps `/User/<rel>` to `<root>/<rel>.lua`.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::consts::{PKG_USER_PREFIX, SOURCE_EXT};
use crate::error::MapError;

pub trait SourceStore {
    /// `Ok(None)` when no source exists for the key.
    fn read(&self, key: &str) -> Result<Option<String>>;
    fn write(&mut self, key: &str, text: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct FsSourceStore {
    pub root: PathBuf,
}

impl FsSourceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store rooted next to a container file.
    pub fn beside(container: &Path) -> Self {
        let root = container
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self { root }
    }

    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        let rel = key.strip_prefix(PKG_USER_PREFIX).ok_or_else(|| {
            MapError::format(format!("source key {key:?} is not under {PKG_USER_PREFIX}"))
        })?;
        let rel = Path::new(rel);
        if rel.as_os_str().is_empty()
            || rel
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(MapError::format(format!("source key {key:?} is not a plain relative path")).into());
        }
        Ok(self.root.join(rel).with_extension(SOURCE_EXT))
    }
}

impl SourceStore for FsSourceStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path)
            .with_context(|| format!("read source {}", path.display()))?;
        Ok(Some(text))
    }

    fn write(&mut self, key: &str, text: &str) -> Result<()> {
        let path = self.path_for(key)?;
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)
                    .with_context(|| format!("create source dir {}", dir.display()))?;
            }
        }
        fs::write(&path, text).with_context(|| format!("write source {}", path.display()))?;
        Ok(())
    }
}

/// In-memory store for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct MemorySourceStore {
    pub files: HashMap<String, String>,
}

impl MemorySourceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SourceStore for MemorySourceStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.files.get(key).cloned())
    }

    fn write(&mut self, key: &str, text: &str) -> Result<()> {
        self.files.insert(key.to_string(), text.to_string());
        Ok(())
    }
}
