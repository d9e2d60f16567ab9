//! map — контейнер: таблицы + дерево экземпляров + open/save.
//!
//! Layout:
//! - mod.rs   — `Map`, open/flush/save entry points
//! - load.rs  — building the tree from the record table
//! - save.rs  — `SaveOrchestrator`: allocate, rewire, unlink
//! - check.rs — reachability report over the record table
//!
//! Save works on a copy of the session state and commits it only after the
//! file has been written, so a failed save leaves the `Map` as it was.

pub mod check;
pub mod load;
pub mod save;

pub use check::CheckReport;
pub use save::{SaveOrchestrator, SaveReport};

use anyhow::{bail, Result};
use log::info;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::class::ClassRegistry;
use crate::config::{MapBuilder, MapConfig};
use crate::instance::{InstanceId, MapTree, TreeDump};
use crate::names::NameAllocator;
use crate::package::{
    baseplate, read_map_file, write_map_file, BinaryCodec, RecordCodec, Tables,
};
use crate::resolver::{PackageIndex, RecordId};
use crate::sidestore::{FsSourceStore, SourceStore};

/// Everything a save mutates.
#[derive(Debug, Clone)]
pub(crate) struct MapState {
    pub(crate) tables: Tables,
    pub(crate) tree: MapTree,
    pub(crate) names: NameAllocator,
    /// class tag -> descriptor reference (resolved or created)
    pub(crate) classes: HashMap<String, PackageIndex>,
}

#[derive(Debug)]
pub struct Map {
    state: MapState,
    level: Option<RecordId>,
    cfg: MapConfig,
    path: Option<PathBuf>,
}

impl Map {
    pub fn builder() -> MapBuilder {
        MapBuilder::new()
    }

    /// Open with configuration from env.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_config(path, MapConfig::from_env())
    }

    pub fn open_with_config(path: &Path, cfg: MapConfig) -> Result<Self> {
        let codec = BinaryCodec::new(cfg.verify_crc);
        let tables = read_map_file(path, &codec)?;
        let store = source_store_for(&cfg, path);
        let mut map = Self::from_tables_with_registry(tables, cfg, ClassRegistry::new(), &store)?;
        map.path = Some(path.to_path_buf());
        info!(
            "open {}: records={}, externals={}, instances={}",
            path.display(),
            map.state.tables.records.len(),
            map.state.tables.externals.len(),
            map.state.tree.len()
        );
        Ok(map)
    }

    /// Build from already decoded tables (no file involved).
    pub fn from_tables(tables: Tables, cfg: MapConfig, store: &dyn SourceStore) -> Result<Self> {
        Self::from_tables_with_registry(tables, cfg, ClassRegistry::new(), store)
    }

    pub fn from_tables_with_registry(
        tables: Tables,
        cfg: MapConfig,
        registry: ClassRegistry,
        store: &dyn SourceStore,
    ) -> Result<Self> {
        let loaded = load::load_tree(&tables, &cfg.model_root_class, registry, store)?;
        Ok(Self {
            state: MapState {
                tables,
                tree: loaded.tree,
                names: NameAllocator::new(),
                classes: HashMap::new(),
            },
            level: loaded.level,
            cfg,
            path: None,
        })
    }

    // -------------------- accessors --------------------

    pub fn root(&self) -> InstanceId {
        self.state.tree.root()
    }

    pub fn tree(&self) -> &MapTree {
        &self.state.tree
    }

    pub fn tree_mut(&mut self) -> &mut MapTree {
        &mut self.state.tree
    }

    /// Read-only view; records change only through `flush`/`save`.
    pub fn tables(&self) -> &Tables {
        &self.state.tables
    }

    pub fn config(&self) -> &MapConfig {
        &self.cfg
    }

    /// Path the map was opened from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn level(&self) -> Option<RecordId> {
        self.level
    }

    pub fn dump(&self) -> Option<TreeDump> {
        TreeDump::capture(&self.state.tree, self.root())
    }

    // -------------------- save --------------------

    /// Run the save algorithm on a copy of the state.
    fn prepare(&self, store: &mut dyn SourceStore) -> Result<(MapState, SaveReport)> {
        let mut next = self.state.clone();
        let report = SaveOrchestrator::new(&mut next, self.level, store, self.cfg.write_sources).run()?;
        Ok((next, report))
    }

    /// Flush the tree into the tables without serializing.
    pub fn flush(&mut self, store: &mut dyn SourceStore) -> Result<SaveReport> {
        let (next, report) = self.prepare(store)?;
        self.state = next;
        Ok(report)
    }

    /// Flush and write to `path` with the default codec, sources next to it
    /// (or under `source_dir`).
    pub fn save(&mut self, path: &Path) -> Result<SaveReport> {
        let codec = BinaryCodec::new(self.cfg.verify_crc);
        let mut store = source_store_for(&self.cfg, path);
        self.save_with(path, &codec, &mut store)
    }

    pub fn save_with(
        &mut self,
        path: &Path,
        codec: &dyn RecordCodec,
        store: &mut dyn SourceStore,
    ) -> Result<SaveReport> {
        let (next, report) = self.prepare(store)?;
        let bytes = codec.encode(&next.tables)?;
        write_map_file(path, &bytes)?;
        self.state = next;
        info!(
            "save {}: records={}, allocated={}, renamed={}, unlinked={}, roots_removed={}",
            path.display(),
            report.records,
            report.allocated,
            report.renamed,
            report.unlinked,
            report.roots_removed
        );
        Ok(report)
    }

    /// Records not reachable from the root pointers (see `check`).
    pub fn unreachable_records(&self) -> Vec<RecordId> {
        self.check().unreachable
    }

    pub fn check(&self) -> CheckReport {
        check::check_tables(&self.state.tables, self.level)
    }
}

/// Write a fresh baseplate container. Refuses to overwrite an existing file.
pub fn init_map(path: &Path, model_root_class: &str) -> Result<()> {
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    let tables = baseplate(model_root_class);
    let bytes = BinaryCodec::default().encode(&tables)?;
    write_map_file(path, &bytes)?;
    info!(
        "init {}: baseplate with model root {}",
        path.display(),
        model_root_class
    );
    Ok(())
}

fn source_store_for(cfg: &MapConfig, container: &Path) -> FsSourceStore {
    match &cfg.source_dir {
        Some(dir) => FsSourceStore::new(dir.clone()),
        None => FsSourceStore::beside(container),
    }
}
