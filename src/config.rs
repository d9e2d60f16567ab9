//! Centralized configuration and builder for MapForge.
//!
//! - MapConfig::from_env() reads the MF_* variables; Default is env-free.
//! - MapBuilder starts from env (or from defaults) and produces a MapConfig.
//!
//! Env:
//! - MF_MODEL_ROOT_CLASS — class tag of the model root (default LuaDataModel)
//! - MF_SOURCE_DIR       — root of script sources (default: container's directory)
//! - MF_WRITE_SOURCES    — write script sources on save (default true)
//! - MF_VERIFY_CRC       — check container CRC on open (default true)

use std::fmt;
use std::path::PathBuf;

use crate::consts::CLASS_DATA_MODEL;

#[derive(Clone, Debug)]
pub struct MapConfig {
    /// Class tag that marks the tree entry point among root pointers.
    pub model_root_class: String,

    /// Explicit side-store root; None means "next to the container file".
    pub source_dir: Option<PathBuf>,

    /// Whether save writes companion source files.
    pub write_sources: bool,

    /// Whether open verifies the container trailer CRC.
    pub verify_crc: bool,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            model_root_class: CLASS_DATA_MODEL.to_string(),
            source_dir: None,
            write_sources: true,
            verify_crc: true,
        }
    }
}

#[inline]
fn env_flag(v: &str) -> bool {
    let s = v.trim().to_ascii_lowercase();
    s == "1" || s == "true" || s == "yes" || s == "on"
}

impl MapConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("MF_MODEL_ROOT_CLASS") {
            let s = v.trim();
            if !s.is_empty() {
                cfg.model_root_class = s.to_string();
            }
        }

        if let Ok(v) = std::env::var("MF_SOURCE_DIR") {
            let s = v.trim();
            if !s.is_empty() {
                cfg.source_dir = Some(PathBuf::from(s));
            }
        }

        if let Ok(v) = std::env::var("MF_WRITE_SOURCES") {
            cfg.write_sources = env_flag(&v);
        }

        if let Ok(v) = std::env::var("MF_VERIFY_CRC") {
            cfg.verify_crc = env_flag(&v);
        }

        cfg
    }

    pub fn with_model_root_class<S: Into<String>>(mut self, class: S) -> Self {
        self.model_root_class = class.into();
        self
    }

    pub fn with_source_dir<P: Into<PathBuf>>(mut self, dir: Option<P>) -> Self {
        self.source_dir = dir.map(Into::into);
        self
    }

    pub fn with_write_sources(mut self, on: bool) -> Self {
        self.write_sources = on;
        self
    }

    pub fn with_verify_crc(mut self, on: bool) -> Self {
        self.verify_crc = on;
        self
    }
}

impl fmt::Display for MapConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MapConfig {{ model_root_class: {}, source_dir: {}, write_sources: {}, verify_crc: {} }}",
            self.model_root_class,
            self.source_dir
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "default(<container dir>)".to_string()),
            self.write_sources,
            self.verify_crc,
        )
    }
}

/// Builder that produces a MapConfig; `Map::builder()` returns one.
#[derive(Clone, Debug)]
pub struct MapBuilder {
    cfg: MapConfig,
}

impl Default for MapBuilder {
    fn default() -> Self {
        Self {
            cfg: MapConfig::from_env(),
        }
    }
}

impl MapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a clean default (without reading env).
    pub fn from_default() -> Self {
        Self {
            cfg: MapConfig::default(),
        }
    }

    pub fn model_root_class<S: Into<String>>(mut self, class: S) -> Self {
        self.cfg.model_root_class = class.into();
        self
    }

    pub fn source_dir<P: Into<PathBuf>>(mut self, dir: Option<P>) -> Self {
        self.cfg.source_dir = dir.map(Into::into);
        self
    }

    pub fn write_sources(mut self, on: bool) -> Self {
        self.cfg.write_sources = on;
        self
    }

    pub fn verify_crc(mut self, on: bool) -> Self {
        self.cfg.verify_crc = on;
        self
    }

    pub fn build(self) -> MapConfig {
        self.cfg
    }
}
