//! MapTree — арена экземпляров и структурные операции.
//!
//! Every mutation validates first and mutates second: a rejected call leaves
//! the tree exactly as it was. Cycle checks walk the ancestor chain of the
//! new parent (cost ~ depth).

use std::collections::BTreeMap;

use log::debug;

use crate::class::ClassRegistry;
use crate::error::{MapError, TreeResult};
use crate::package::QualifiedName;
use crate::resolver::RecordId;

use super::{Instance, InstanceId};

#[derive(Debug, Clone)]
pub struct MapTree {
    nodes: Vec<Instance>,
    root: InstanceId,
    registry: ClassRegistry,
    /// record index -> instance that used to own it (detached or destroyed)
    pending_unlink: BTreeMap<RecordId, InstanceId>,
}

impl MapTree {
    /// Tree with a bound, mounted root (used by the loader).
    pub(crate) fn with_root(
        registry: ClassRegistry,
        class: &str,
        record: RecordId,
        name: QualifiedName,
    ) -> Self {
        let caps = registry.lookup(class);
        let mut root = Instance::bound(class, caps, record, name);
        root.mounted = true;
        Self {
            nodes: vec![root],
            root: InstanceId(0),
            registry,
            pending_unlink: BTreeMap::new(),
        }
    }

    /// Append a loaded child under `parent` (no checks; loader only).
    pub(crate) fn attach_loaded(
        &mut self,
        parent: InstanceId,
        class: &str,
        record: RecordId,
        name: QualifiedName,
    ) -> InstanceId {
        let caps = self.registry.lookup(class);
        let mut inst = Instance::bound(class, caps, record, name);
        inst.parent = Some(parent);
        inst.mounted = self.nodes[parent.0].mounted;
        let id = InstanceId(self.nodes.len());
        self.nodes.push(inst);
        self.nodes[parent.0].children.push(id);
        id
    }

    pub(crate) fn node_mut(&mut self, id: InstanceId) -> &mut Instance {
        &mut self.nodes[id.0]
    }

    pub(crate) fn pending_unlink(&self) -> &BTreeMap<RecordId, InstanceId> {
        &self.pending_unlink
    }

    pub(crate) fn take_pending_unlink(&mut self) -> BTreeMap<RecordId, InstanceId> {
        std::mem::take(&mut self.pending_unlink)
    }

    // -------------------- queries --------------------

    pub fn root(&self) -> InstanceId {
        self.root
    }

    pub fn registry(&self) -> &ClassRegistry {
        &self.registry
    }

    /// Register extra class tags after load.
    pub fn registry_mut(&mut self) -> &mut ClassRegistry {
        &mut self.registry
    }

    pub fn get(&self, id: InstanceId) -> Option<&Instance> {
        self.nodes.get(id.0)
    }

    fn node(&self, id: InstanceId) -> TreeResult<&Instance> {
        self.nodes
            .get(id.0)
            .ok_or_else(|| MapError::structural(format!("unknown instance #{}", id.0)))
    }

    /// Number of arena slots (destroyed instances included).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn class_of(&self, id: InstanceId) -> Option<&str> {
        self.get(id).map(Instance::class)
    }

    pub fn parent(&self, id: InstanceId) -> Option<InstanceId> {
        self.get(id).and_then(Instance::parent)
    }

    pub fn name(&self, id: InstanceId) -> Option<String> {
        self.get(id).and_then(Instance::display_name)
    }

    /// Snapshot of the immediate children.
    pub fn children(&self, id: InstanceId) -> Vec<InstanceId> {
        self.get(id).map(|n| n.children.clone()).unwrap_or_default()
    }

    /// Pre-order snapshot of every descendant (not including `id`).
    pub fn descendants(&self, id: InstanceId) -> Vec<InstanceId> {
        let mut out = Vec::new();
        let mut stack: Vec<InstanceId> = self.children(id).into_iter().rev().collect();
        while let Some(cur) = stack.pop() {
            out.push(cur);
            if let Some(n) = self.get(cur) {
                stack.extend(n.children.iter().rev().copied());
            }
        }
        out
    }

    /// True when `ancestor` is `other` or on its parent chain.
    pub fn is_ancestor_of(&self, ancestor: InstanceId, other: InstanceId) -> bool {
        let mut cur = Some(other);
        while let Some(c) = cur {
            if c == ancestor {
                return true;
            }
            cur = self.parent(c);
        }
        false
    }

    pub fn find_first_child(&self, id: InstanceId, name: &str) -> Option<InstanceId> {
        self.get(id)?
            .children
            .iter()
            .copied()
            .find(|c| self.name(*c).as_deref() == Some(name))
    }

    pub fn find_first_child_of_class(&self, id: InstanceId, class: &str) -> Option<InstanceId> {
        self.get(id)?
            .children
            .iter()
            .copied()
            .find(|c| self.class_of(*c) == Some(class))
    }

    /// First descendant (pre-order) with this display name.
    pub fn find_first_descendant(&self, id: InstanceId, name: &str) -> Option<InstanceId> {
        self.descendants(id)
            .into_iter()
            .find(|d| self.name(*d).as_deref() == Some(name))
    }

    // -------------------- mutations --------------------

    /// New unbound, detached instance of a creatable class.
    pub fn create(&mut self, class: &str) -> TreeResult<InstanceId> {
        let caps = self.registry.lookup(class);
        if !caps.creatable {
            return Err(MapError::structural(format!(
                "class {class:?} cannot be created"
            )));
        }
        let id = InstanceId(self.nodes.len());
        self.nodes.push(Instance::fresh(class, caps));
        debug!("tree: created #{} ({})", id.0, class);
        Ok(id)
    }

    /// Move `id` under `new_parent` (or detach it with `None`).
    pub fn set_parent(&mut self, id: InstanceId, new_parent: Option<InstanceId>) -> TreeResult<()> {
        let node = self.node(id)?;
        if node.locked {
            return Err(MapError::structural(format!(
                "instance #{} is locked (destroyed) and cannot be reparented",
                id.0
            )));
        }
        if id == self.root {
            return Err(MapError::structural("the model root cannot be reparented"));
        }
        if let Some(p) = new_parent {
            if p == id {
                return Err(MapError::structural(format!(
                    "instance #{} cannot be its own parent",
                    id.0
                )));
            }
            let parent = self.node(p)?;
            if parent.locked {
                return Err(MapError::structural(format!(
                    "instance #{} is locked (destroyed) and cannot take children",
                    p.0
                )));
            }
            if self.is_ancestor_of(id, p) {
                return Err(MapError::structural(format!(
                    "parenting #{} under its descendant #{} would create a cycle",
                    id.0, p.0
                )));
            }
        }
        if node.parent == new_parent {
            return Ok(());
        }

        self.relink(id, new_parent);
        Ok(())
    }

    /// Lock `id`, detach it and destroy its subtree. Idempotent.
    pub fn destroy(&mut self, id: InstanceId) -> TreeResult<()> {
        let node = self.node(id)?;
        if id == self.root {
            return Err(MapError::structural("the model root cannot be destroyed"));
        }
        if node.locked {
            return Ok(());
        }
        self.destroy_subtree(id);
        Ok(())
    }

    fn destroy_subtree(&mut self, id: InstanceId) {
        self.relink(id, None);
        self.nodes[id.0].locked = true;
        // relink(child, None) pops it from our list
        while let Some(&child) = self.nodes[id.0].children.first() {
            self.destroy_subtree(child);
        }
        debug!("tree: destroyed #{} ({})", id.0, self.nodes[id.0].class);
    }

    /// Unchecked move; keeps children lists, the unlink registry and the
    /// mounted flag consistent.
    fn relink(&mut self, id: InstanceId, new_parent: Option<InstanceId>) {
        if let Some(old) = self.nodes[id.0].parent.take() {
            self.nodes[old.0].children.retain(|c| *c != id);
        }
        if let Some(p) = new_parent {
            self.nodes[p.0].children.push(id);
            self.nodes[id.0].parent = Some(p);
        }

        let mounted = new_parent.map(|p| self.nodes[p.0].mounted).unwrap_or(false);
        self.set_mounted(id, mounted);
    }

    /// Mounting clears the whole subtree from the unlink registry. Unmounting
    /// registers the moved node plus every bound node whose parent has no
    /// record (its `Parent` field would otherwise keep pointing at the old
    /// place).
    fn set_mounted(&mut self, id: InstanceId, mounted: bool) {
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            let n = &mut self.nodes[cur.0];
            n.mounted = mounted;
            stack.extend(n.children.iter().copied());
            let (rec, parent) = (n.record, n.parent);

            let rec = match rec {
                Some(r) => r,
                None => continue,
            };
            if mounted {
                self.pending_unlink.remove(&rec);
            } else {
                let parent_bound = parent
                    .map(|p| self.nodes[p.0].record.is_some())
                    .unwrap_or(false);
                if cur == id || !parent_bound {
                    self.pending_unlink.insert(rec, cur);
                }
            }
        }
    }

    /// Set or clear (empty string) the display-name override.
    pub fn set_name(&mut self, id: InstanceId, name: &str) -> TreeResult<()> {
        let node = self.node(id)?;
        if node.locked {
            return Err(MapError::structural(format!(
                "instance #{} is locked (destroyed) and cannot be renamed",
                id.0
            )));
        }
        self.nodes[id.0].name_override = if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        };
        Ok(())
    }

    pub fn source(&self, id: InstanceId) -> Option<&str> {
        self.get(id).and_then(Instance::source)
    }

    /// Replace the script text of a source-bearing instance.
    pub fn set_source(&mut self, id: InstanceId, text: &str) -> TreeResult<()> {
        let node = self.node(id)?;
        if !node.caps.has_source {
            return Err(MapError::structural(format!(
                "class {:?} has no source",
                node.class
            )));
        }
        if node.locked {
            return Err(MapError::structural(format!(
                "instance #{} is locked (destroyed)",
                id.0
            )));
        }
        self.nodes[id.0].source = Some(text.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> MapTree {
        MapTree::with_root(
            ClassRegistry::new(),
            "LuaDataModel",
            RecordId(0),
            QualifiedName::plain("DataModel"),
        )
    }

    fn shape(t: &MapTree) -> Vec<(usize, Option<usize>, Vec<usize>)> {
        (0..t.len())
            .map(|i| {
                let n = t.get(InstanceId(i)).unwrap();
                (
                    i,
                    n.parent().map(|p| p.0),
                    n.children().iter().map(|c| c.0).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn ancestor_is_reflexive_and_cycles_are_rejected() {
        let mut t = tree();
        let root = t.root();
        let a = t.create("LuaFolder").unwrap();
        let b = t.create("LuaFolder").unwrap();
        let c = t.create("LuaScript").unwrap();
        t.set_parent(a, Some(root)).unwrap();
        t.set_parent(b, Some(a)).unwrap();
        t.set_parent(c, Some(b)).unwrap();

        for id in [root, a, b, c] {
            assert!(t.is_ancestor_of(id, id));
        }
        assert!(t.is_ancestor_of(a, c));
        assert!(!t.is_ancestor_of(c, a));

        let before = shape(&t);
        assert!(t.set_parent(a, Some(c)).unwrap_err().is_structural());
        assert!(t.set_parent(a, Some(b)).unwrap_err().is_structural());
        assert!(t.set_parent(a, Some(a)).unwrap_err().is_structural());
        assert_eq!(shape(&t), before);
    }

    #[test]
    fn reparent_moves_between_children_lists_and_mounts() {
        let mut t = tree();
        let root = t.root();
        let a = t.create("LuaFolder").unwrap();
        let b = t.create("LuaFolder").unwrap();
        let s = t.create("LuaScript").unwrap();
        assert!(!t.get(s).unwrap().is_mounted());

        t.set_parent(s, Some(a)).unwrap();
        assert!(!t.get(s).unwrap().is_mounted());
        t.set_parent(a, Some(root)).unwrap();
        assert!(t.get(s).unwrap().is_mounted());

        t.set_parent(b, Some(root)).unwrap();
        t.set_parent(s, Some(b)).unwrap();
        assert!(t.children(a).is_empty());
        assert_eq!(t.children(b), vec![s]);
        assert_eq!(t.parent(s), Some(b));

        t.set_parent(b, None).unwrap();
        assert!(!t.get(s).unwrap().is_mounted());
        assert_eq!(t.children(root), vec![a]);
    }

    #[test]
    fn destroy_locks_subtree_and_removes_from_ancestors() {
        let mut t = tree();
        let root = t.root();
        let a = t.create("LuaFolder").unwrap();
        let b = t.create("LuaFolder").unwrap();
        let c = t.create("LuaScript").unwrap();
        t.set_parent(a, Some(root)).unwrap();
        t.set_parent(b, Some(a)).unwrap();
        t.set_parent(c, Some(b)).unwrap();

        t.destroy(b).unwrap();
        assert!(t.children(a).is_empty());
        assert_eq!(t.descendants(root), vec![a]);
        for id in [b, c] {
            let n = t.get(id).unwrap();
            assert!(n.is_locked());
            assert!(n.parent().is_none());
            assert!(n.children().is_empty());
        }

        assert!(t.set_parent(b, Some(root)).unwrap_err().is_structural());
        assert!(t.set_parent(c, Some(root)).unwrap_err().is_structural());
        let fresh = t.create("LuaFolder").unwrap();
        assert!(t.set_parent(fresh, Some(b)).unwrap_err().is_structural());
        assert!(t.set_name(b, "x").unwrap_err().is_structural());
        t.destroy(b).unwrap();
        assert!(t.destroy(root).unwrap_err().is_structural());
    }

    #[test]
    fn bound_detach_registers_unlink_and_reattach_clears_it() {
        let mut t = tree();
        let root = t.root();
        let a = t.attach_loaded(root, "LuaFolder", RecordId(3), QualifiedName::plain("A"));
        let b = t.attach_loaded(a, "LuaScript", RecordId(5), QualifiedName::plain("B"));

        t.set_parent(a, None).unwrap();
        assert_eq!(t.pending_unlink().get(&RecordId(3)), Some(&a));
        t.set_parent(a, Some(root)).unwrap();
        assert!(t.pending_unlink().is_empty());

        t.destroy(a).unwrap();
        assert_eq!(t.pending_unlink().len(), 2);
        assert_eq!(t.pending_unlink().get(&RecordId(5)), Some(&b));
    }

    #[test]
    fn bound_node_under_detached_parent_stays_registered_until_mounted() {
        let mut t = tree();
        let root = t.root();
        let a = t.attach_loaded(root, "LuaFolder", RecordId(3), QualifiedName::plain("A"));
        let fresh = t.create("LuaFolder").unwrap();

        t.set_parent(a, Some(fresh)).unwrap();
        assert!(!t.get(a).unwrap().is_mounted());
        assert_eq!(t.pending_unlink().get(&RecordId(3)), Some(&a));

        t.set_parent(fresh, Some(root)).unwrap();
        assert!(t.get(a).unwrap().is_mounted());
        assert!(t.pending_unlink().is_empty());
    }

    #[test]
    fn queries_scan_children_in_order() {
        let mut t = tree();
        let root = t.root();
        let ws = t.attach_loaded(root, "LuaWorkspace", RecordId(1), QualifiedName::plain("Workspace"));
        let f1 = t.create("LuaFolder").unwrap();
        let f2 = t.create("LuaFolder").unwrap();
        t.set_parent(f1, Some(ws)).unwrap();
        t.set_parent(f2, Some(ws)).unwrap();
        t.set_name(f2, "Target").unwrap();

        assert_eq!(t.find_first_child_of_class(root, "LuaWorkspace"), Some(ws));
        assert_eq!(t.find_first_child_of_class(ws, "LuaFolder"), Some(f1));
        assert_eq!(t.find_first_child(ws, "Target"), Some(f2));
        assert_eq!(t.find_first_child(root, "Target"), None);
        assert_eq!(t.find_first_descendant(root, "Target"), Some(f2));
        assert_eq!(t.name(ws).as_deref(), Some("Workspace"));
        assert_eq!(t.name(f1), None);
        assert_eq!(t.descendants(root), vec![ws, f1, f2]);
    }

    #[test]
    fn create_respects_registry_and_source_capability() {
        let mut t = tree();
        assert!(t.create("LuaDataModel").unwrap_err().is_structural());
        let f = t.create("LuaFolder").unwrap();
        assert!(t.set_source(f, "x").unwrap_err().is_structural());
        let s = t.create("LuaModuleScript").unwrap();
        assert_eq!(t.source(s), Some(""));
        t.set_source(s, "return {}").unwrap();
        assert_eq!(t.source(s), Some("return {}"));
    }

    #[test]
    fn tags_registered_on_a_live_tree_become_creatable() {
        let mut t = tree();
        assert!(t.create("LuaCustomScript").is_err());
        t.registry_mut()
            .register("LuaCustomScript", crate::class::Capabilities::SCRIPT);
        let s = t.create("LuaCustomScript").unwrap();
        assert_eq!(t.source(s), Some(""));
        assert!(t.registry().is_creatable("LuaCustomScript"));
    }

    #[test]
    fn loaded_name_falls_back_to_record_name() {
        let t = tree();
        // корень загружен без override: имя берётся из квалифицированного имени записи
        assert_eq!(t.name(t.root()).as_deref(), Some("DataModel"));
    }
}
