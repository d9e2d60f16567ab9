//! load — построение дерева экземпляров из таблицы записей.
//!
//! Entry point is the first root pointer whose record's class resolves to the
//! model-root class. From there the child-list field is followed recursively.
//! A visited record without class information aborts the load; so does a
//! record reached twice (the child lists would form a cycle).

use anyhow::Result;
use log::{debug, warn};
use std::collections::HashSet;

use crate::class::ClassRegistry;
use crate::consts::{CLASS_LEVEL, FIELD_CHILDREN, FIELD_LUA_CODE, FIELD_ROOT_COMPONENT};
use crate::error::{MapError, TreeResult};
use crate::instance::{InstanceId, MapTree};
use crate::package::{FieldValue, Tables};
use crate::resolver::{RecordId, Target};
use crate::sidestore::SourceStore;

pub(crate) struct Loaded {
    pub(crate) tree: MapTree,
    pub(crate) level: Option<RecordId>,
}

/// Class tag of a record, through its class descriptor.
pub fn class_name(tables: &Tables, rec: RecordId) -> TreeResult<Option<String>> {
    let r = tables.record(rec);
    Ok(match tables.resolve(r.class)? {
        None => None,
        Some(Target::External(e)) => Some(tables.external(e).object_name.render()),
        Some(Target::Record(c)) => Some(tables.record(c).name.render()),
    })
}

/// Side-store key of a script record: the package that owns its LuaCode ref.
pub fn source_key(tables: &Tables, rec: RecordId) -> TreeResult<Option<String>> {
    let code = match tables.record(rec).get(FIELD_LUA_CODE).and_then(FieldValue::as_object) {
        Some(idx) => idx,
        None => return Ok(None),
    };
    let code = match tables.resolve_external(code)? {
        Some(e) => e,
        None => return Ok(None),
    };
    let pkg = match tables.resolve_external(tables.external(code).outer)? {
        Some(p) => p,
        None => return Ok(None),
    };
    Ok(Some(tables.external(pkg).object_name.render()))
}

/// First record whose class is `Level` (outer of new actors).
pub fn find_level(tables: &Tables) -> TreeResult<Option<RecordId>> {
    for i in 0..tables.records.len() {
        let id = RecordId(i);
        if class_name(tables, id)?.as_deref() == Some(CLASS_LEVEL) {
            return Ok(Some(id));
        }
    }
    Ok(None)
}

fn find_model_root(tables: &Tables, model_root_class: &str) -> TreeResult<Option<RecordId>> {
    for idx in &tables.roots {
        let rec = match tables.resolve(*idx)? {
            Some(Target::Record(r)) => r,
            other => {
                warn!("load: root pointer {} is not a record ({:?}), skipped", idx, other);
                continue;
            }
        };
        if class_name(tables, rec)?.as_deref() == Some(model_root_class) {
            return Ok(Some(rec));
        }
    }
    Ok(None)
}

pub(crate) fn load_tree(
    tables: &Tables,
    model_root_class: &str,
    registry: ClassRegistry,
    store: &dyn SourceStore,
) -> Result<Loaded> {
    let root_rec = find_model_root(tables, model_root_class)?.ok_or_else(|| {
        MapError::format(format!(
            "container has no root pointer to a {model_root_class} record"
        ))
    })?;
    let level = find_level(tables)?;

    let mut tree = MapTree::with_root(
        registry,
        model_root_class,
        root_rec,
        tables.record(root_rec).name.clone(),
    );
    let mut seen = HashSet::new();
    seen.insert(root_rec);

    let root = tree.root();
    bind_behaviour(tables, &mut tree, root, root_rec, store)?;
    load_children(tables, &mut tree, root, root_rec, store, &mut seen)?;

    debug!(
        "load: model root #{} with {} instance(s), level={:?}",
        root_rec.0,
        tree.len(),
        level.map(|l| l.0)
    );
    Ok(Loaded { tree, level })
}

fn load_children(
    tables: &Tables,
    tree: &mut MapTree,
    parent: InstanceId,
    parent_rec: RecordId,
    store: &dyn SourceStore,
    seen: &mut HashSet<RecordId>,
) -> Result<()> {
    let items = match tables.record(parent_rec).get(FIELD_CHILDREN) {
        Some(FieldValue::Array(items)) => items,
        _ => return Ok(()),
    };

    for item in items {
        let idx = match item.as_object() {
            Some(i) => i,
            None => continue,
        };
        let child_rec = match tables.resolve(idx)? {
            Some(Target::Record(r)) => r,
            _ => {
                warn!(
                    "load: child {} of record #{} is not a record, skipped",
                    idx, parent_rec.0
                );
                continue;
            }
        };
        if !seen.insert(child_rec) {
            return Err(MapError::format(format!(
                "record #{} is reachable twice through child lists",
                child_rec.0
            ))
            .into());
        }

        let class = class_name(tables, child_rec)?.ok_or_else(|| {
            MapError::format(format!("record #{} has no class type", child_rec.0))
        })?;
        let name = tables.record(child_rec).name.clone();
        let child = tree.attach_loaded(parent, &class, child_rec, name);
        bind_behaviour(tables, tree, child, child_rec, store)?;
        load_children(tables, tree, child, child_rec, store, seen)?;
    }
    Ok(())
}

/// Capability-specific state: scene-root sub-record, script source.
fn bind_behaviour(
    tables: &Tables,
    tree: &mut MapTree,
    id: InstanceId,
    rec: RecordId,
    store: &dyn SourceStore,
) -> Result<()> {
    let caps = match tree.get(id) {
        Some(n) => n.capabilities(),
        None => return Ok(()),
    };

    if caps.has_scene_root {
        let comp = tables
            .record(rec)
            .get(FIELD_ROOT_COMPONENT)
            .and_then(FieldValue::as_object)
            .ok_or_else(|| {
                MapError::format(format!(
                    "record #{} has no {} field",
                    rec.0, FIELD_ROOT_COMPONENT
                ))
            })?;
        let comp = tables.resolve_record(comp)?.ok_or_else(|| {
            MapError::format(format!("record #{} has a null {}", rec.0, FIELD_ROOT_COMPONENT))
        })?;
        tree.node_mut(id).scene_root = Some(comp);
    }

    if caps.has_source {
        if let Some(key) = source_key(tables, rec)? {
            match store.read(&key)? {
                Some(text) => tree.node_mut(id).source = Some(text),
                None => warn!("load: no source file for {} (record #{})", key, rec.0),
            }
        }
    }
    Ok(())
}
