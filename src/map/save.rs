//! save — сброс дерева в таблицу записей.
//!
//! Per instance, top-down:
//! 1. bind: unbound instances get a fresh record (class descriptor first,
//!    then the name, then capability sub-resources), appended to the record
//!    table and to the root pointers;
//! 2. name: a pending override is allocated and written (`Name`, `ActorLabel`);
//! 3. parent: the parent's reference goes into `Parent`.
//!
//! Bottom-up, once every child is flushed: the child references go into
//! `LuaChildren`, or the field is removed when there are none.
//!
//! Then every record in the pending-unlink registry loses `Parent` and
//! `LuaChildren` (payload stays: untracked records may still point at it),
//! and root pointers to unlinked records are dropped. Nothing is deleted or
//! renumbered. A bound record attached again after such an unlink gets its
//! root pointer back on the next save.

use anyhow::Result;
use log::debug;
use std::collections::BTreeMap;

use crate::consts::{
    CLASS_LUA_CODE, CLASS_SCENE_COMPONENT, FIELD_ACTOR_GUID, FIELD_ACTOR_LABEL, FIELD_CHILDREN,
    FIELD_COLLISION, FIELD_HIDDEN, FIELD_LUA_CODE, FIELD_MOBILITY, FIELD_NAME, FIELD_PARENT,
    FIELD_ROOT_COMPONENT, KIND_CLASS, KIND_PACKAGE, PKG_CORE_UOBJECT, PKG_LUA_API,
    PKG_LUA_MACHINE, PKG_USER_LUA,
};
use crate::error::MapError;
use crate::instance::InstanceId;
use crate::package::{ExternalRef, FieldValue, QualifiedName, Record};
use crate::resolver::{PackageIndex, RecordId, Target};
use crate::sidestore::SourceStore;

use super::load::source_key;
use super::MapState;

/// Counters for one save.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveReport {
    /// Records in the table after the save.
    pub records: usize,
    /// Records appended for newly created instances (sub-records included).
    pub allocated: usize,
    /// Pending name overrides materialised.
    pub renamed: usize,
    /// Records stripped of their tree links.
    pub unlinked: usize,
    pub roots_removed: usize,
    /// Root pointers put back for records that were unlinked earlier and are
    /// attached again.
    pub roots_restored: usize,
    pub sources_written: usize,
}

pub struct SaveOrchestrator<'a> {
    state: &'a mut MapState,
    level: Option<RecordId>,
    store: &'a mut dyn SourceStore,
    write_sources: bool,
    report: SaveReport,
}

impl<'a> SaveOrchestrator<'a> {
    pub(crate) fn new(
        state: &'a mut MapState,
        level: Option<RecordId>,
        store: &'a mut dyn SourceStore,
        write_sources: bool,
    ) -> Self {
        Self {
            state,
            level,
            store,
            write_sources,
            report: SaveReport::default(),
        }
    }

    pub fn run(mut self) -> Result<SaveReport> {
        let root = self.state.tree.root();
        self.visit(root, None)?;

        let unlinked = self.state.tree.take_pending_unlink();
        self.unlink(&unlinked)?;

        self.report.records = self.state.tables.records.len();
        Ok(self.report)
    }

    fn visit(&mut self, id: InstanceId, parent_rec: Option<RecordId>) -> Result<RecordId> {
        let (mounted, locked, bound) = match self.state.tree.get(id) {
            Some(n) => (n.is_mounted(), n.is_locked(), n.record()),
            None => {
                return Err(MapError::format(format!("instance #{} does not exist", id.0)).into())
            }
        };
        if !mounted || locked {
            return Err(MapError::format(format!(
                "instance #{} has no container binding",
                id.0
            ))
            .into());
        }

        let rec = match bound {
            Some(r) => {
                if r.0 >= self.state.tables.records.len() {
                    return Err(MapError::format(format!(
                        "instance #{} is bound to missing record #{}",
                        id.0, r.0
                    ))
                    .into());
                }
                self.ensure_root(r);
                r
            }
            None => self.allocate(id)?,
        };

        if let Some(base) = self.state.tree.node_mut(id).name_override.take() {
            let q = self.state.names.allocate(&self.state.tables, &base);
            apply_name(self.state.tables.record_mut(rec), &q);
            self.state.tree.node_mut(id).bound_name = Some(q);
            self.report.renamed += 1;
        }

        if let Some(p) = parent_rec {
            self.state
                .tables
                .record_mut(rec)
                .set(FIELD_PARENT, FieldValue::Object(p.into()));
        }

        self.write_source(id, rec)?;

        let kids = self.state.tree.children(id);
        let mut refs = Vec::with_capacity(kids.len());
        for k in kids {
            let kr = self.visit(k, Some(rec))?;
            refs.push(FieldValue::Object(kr.into()));
        }
        let r = self.state.tables.record_mut(rec);
        if refs.is_empty() {
            r.remove(FIELD_CHILDREN);
        } else {
            r.set(FIELD_CHILDREN, FieldValue::Array(refs));
        }
        Ok(rec)
    }

    fn ensure_root(&mut self, rec: RecordId) {
        let idx = PackageIndex::from(rec);
        if !self.state.tables.roots.contains(&idx) {
            self.state.tables.roots.push(idx);
            self.report.roots_restored += 1;
            debug!("save: restored root pointer to record #{}", rec.0);
        }
    }

    fn write_source(&mut self, id: InstanceId, rec: RecordId) -> Result<()> {
        if !self.write_sources {
            return Ok(());
        }
        let text = match self.state.tree.get(id) {
            Some(n) if n.capabilities().has_source => n.source().unwrap_or_default().to_string(),
            _ => return Ok(()),
        };
        if let Some(key) = source_key(&self.state.tables, rec)? {
            self.store.write(&key, &text)?;
            self.report.sources_written += 1;
        }
        Ok(())
    }

    /// Class descriptor for `class`: an existing CoreUObject-class external
    /// ref with that name, or a new one under `/Script/LuaAPI`.
    fn ensure_class(&mut self, class: &str) -> Result<PackageIndex> {
        if let Some(idx) = self.state.classes.get(class) {
            return Ok(*idx);
        }
        let tables = &mut self.state.tables;
        let found = tables.externals.iter().position(|e| {
            e.class_package == PKG_CORE_UOBJECT
                && e.class_name == KIND_CLASS
                && e.object_name.number == 0
                && e.object_name.base == class
        });
        let idx = match found {
            Some(slot) => PackageIndex::from_external(slot),
            None => {
                let api = tables
                    .externals
                    .iter()
                    .position(|e| e.class_name == KIND_PACKAGE && e.object_name.base == PKG_LUA_API);
                let api = match api {
                    Some(slot) => PackageIndex::from_external(slot),
                    None => tables.push_external(ExternalRef::new(
                        PKG_CORE_UOBJECT,
                        KIND_PACKAGE,
                        PackageIndex::NULL,
                        QualifiedName::plain(PKG_LUA_API),
                    )),
                };
                let idx = tables.push_external(ExternalRef::new(
                    PKG_CORE_UOBJECT,
                    KIND_CLASS,
                    api,
                    QualifiedName::plain(class),
                ));
                debug!("save: new class descriptor {} for {}", idx, class);
                idx
            }
        };
        self.state.classes.insert(class.to_string(), idx);
        Ok(idx)
    }

    /// Append a record (and sub-resources) for an unbound instance and bind it.
    fn allocate(&mut self, id: InstanceId) -> Result<RecordId> {
        let (class, caps) = match self.state.tree.get(id) {
            Some(n) => (n.class().to_string(), n.capabilities()),
            None => {
                return Err(MapError::format(format!("instance #{} does not exist", id.0)).into())
            }
        };

        let class_idx = self.ensure_class(&class)?;
        let comp_class = if caps.has_scene_root {
            Some(self.ensure_class(CLASS_SCENE_COMPONENT)?)
        } else {
            None
        };

        // override is consumed here, not allocated a second time in visit()
        let base = self
            .state
            .tree
            .node_mut(id)
            .name_override
            .take()
            .unwrap_or_else(|| class.clone());
        let outer = self.level.map(PackageIndex::from).unwrap_or(PackageIndex::NULL);

        let mut scene_root = None;
        if let Some(comp_class) = comp_class {
            let comp_name = self
                .state
                .names
                .allocate(&self.state.tables, FIELD_ROOT_COMPONENT);
            // the owning record lands right after the component
            let owner = PackageIndex::from_record(self.state.tables.records.len() + 1);
            let comp = self
                .state
                .tables
                .push_record(Record::new(comp_class, owner, comp_name));
            scene_root = Some(comp);
            self.report.allocated += 1;
        }

        let name = self.state.names.allocate(&self.state.tables, &base);
        let mut rec = Record::new(class_idx, outer, name.clone())
            .with_field(FIELD_NAME, FieldValue::Str(name.render()))
            .with_field(FIELD_ACTOR_LABEL, FieldValue::Str(name.render()))
            .with_field(FIELD_ACTOR_GUID, FieldValue::Guid(rand::random::<[u8; 16]>()))
            .with_field(FIELD_HIDDEN, FieldValue::Bool(true))
            .with_field(FIELD_COLLISION, FieldValue::Bool(false));
        if let Some(comp) = scene_root {
            rec.set(FIELD_ROOT_COMPONENT, FieldValue::Object(comp));
            rec.set(FIELD_MOBILITY, FieldValue::Bool(true));
        }
        let idx = self.state.tables.push_record(rec);
        self.state.tables.roots.push(idx);
        let rid = self
            .state
            .tables
            .resolve_record(idx)?
            .ok_or_else(|| MapError::format("appended record resolved to null"))?;
        self.report.allocated += 1;

        if caps.has_source {
            let pkg_name = self
                .state
                .names
                .allocate(&self.state.tables, &format!("{}{}", PKG_USER_LUA, name));
            let pkg = self.state.tables.push_external(ExternalRef::new(
                PKG_CORE_UOBJECT,
                KIND_PACKAGE,
                PackageIndex::NULL,
                pkg_name,
            ));
            let code_name = self.state.names.allocate(&self.state.tables, &name.base);
            let code = self.state.tables.push_external(ExternalRef::new(
                PKG_LUA_MACHINE,
                CLASS_LUA_CODE,
                pkg,
                code_name,
            ));
            self.state
                .tables
                .record_mut(rid)
                .set(FIELD_LUA_CODE, FieldValue::Object(code));
        }

        let scene_root_id = match scene_root {
            Some(c) => self.state.tables.resolve_record(c)?,
            None => None,
        };
        let node = self.state.tree.node_mut(id);
        node.record = Some(rid);
        node.bound_name = Some(name.clone());
        node.scene_root = scene_root_id;
        debug!("save: allocated record #{} {} ({})", rid.0, name, class);
        Ok(rid)
    }

    fn unlink(&mut self, unlinked: &BTreeMap<RecordId, InstanceId>) -> Result<()> {
        for (rec, inst) in unlinked {
            if rec.0 >= self.state.tables.records.len() {
                return Err(MapError::format(format!(
                    "pending unlink of missing record #{} (instance #{})",
                    rec.0, inst.0
                ))
                .into());
            }
            let r = self.state.tables.record_mut(*rec);
            r.remove(FIELD_PARENT);
            r.remove(FIELD_CHILDREN);
            debug!("save: unlinked record #{} {} (instance #{})", rec.0, r.name, inst.0);
        }
        self.report.unlinked = unlinked.len();

        let tables = &self.state.tables;
        let kept: Vec<PackageIndex> = tables
            .roots
            .iter()
            .copied()
            .filter(|idx| match tables.resolve(*idx) {
                Ok(Some(Target::Record(r))) => !unlinked.contains_key(&r),
                _ => true,
            })
            .collect();
        self.report.roots_removed = self.state.tables.roots.len() - kept.len();
        self.state.tables.roots = kept;
        Ok(())
    }
}

fn apply_name(rec: &mut Record, q: &QualifiedName) {
    rec.name = q.clone();
    rec.set(FIELD_NAME, FieldValue::Str(q.render()));
    rec.set(FIELD_ACTOR_LABEL, FieldValue::Str(q.render()));
}
