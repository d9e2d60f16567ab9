//! instance — узлы дерева в памяти (арена + индексы).
//!
//! Layout:
//! - mod.rs  — `Instance`, `InstanceId`
//! - tree.rs — `MapTree`: parenting, destroy, queries, pending-unlink registry
//! - dump.rs — serde view of a subtree (CLI, tests)
//!
//! While unsaved the tree is the source of truth: `children` order is the
//! order written to the child-list field on save.

pub mod dump;
pub mod tree;

pub use dump::TreeDump;
pub use tree::MapTree;

use crate::class::Capabilities;
use crate::package::QualifiedName;
use crate::resolver::RecordId;

/// Handle into a `MapTree` arena. Only meaningful for the tree that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceId(pub usize);

#[derive(Debug, Clone)]
pub struct Instance {
    pub(crate) class: String,
    pub(crate) caps: Capabilities,
    /// Pending display-name override, consumed by the next save.
    pub(crate) name_override: Option<String>,
    /// Qualified name of the bound record as last loaded/saved.
    pub(crate) bound_name: Option<QualifiedName>,
    pub(crate) parent: Option<InstanceId>,
    pub(crate) children: Vec<InstanceId>,
    pub(crate) record: Option<RecordId>,
    pub(crate) locked: bool,
    /// Reachable from the model root (the container binding).
    pub(crate) mounted: bool,
    /// Script text for `has_source` classes.
    pub(crate) source: Option<String>,
    /// Scene-root component record for `has_scene_root` classes.
    pub(crate) scene_root: Option<RecordId>,
}

impl Instance {
    pub(crate) fn fresh(class: &str, caps: Capabilities) -> Self {
        Self {
            class: class.to_string(),
            caps,
            name_override: None,
            bound_name: None,
            parent: None,
            children: Vec::new(),
            record: None,
            locked: false,
            mounted: false,
            source: if caps.has_source {
                Some(String::new())
            } else {
                None
            },
            scene_root: None,
        }
    }

    pub(crate) fn bound(class: &str, caps: Capabilities, record: RecordId, name: QualifiedName) -> Self {
        let mut i = Self::fresh(class, caps);
        i.record = Some(record);
        i.bound_name = Some(name);
        i
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn capabilities(&self) -> Capabilities {
        self.caps
    }

    pub fn parent(&self) -> Option<InstanceId> {
        self.parent
    }

    pub fn children(&self) -> &[InstanceId] {
        &self.children
    }

    pub fn record(&self) -> Option<RecordId> {
        self.record
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn scene_root(&self) -> Option<RecordId> {
        self.scene_root
    }

    /// Override if set, else the bound record's name.
    pub fn display_name(&self) -> Option<String> {
        match &self.name_override {
            Some(n) if !n.is_empty() => Some(n.clone()),
            _ => self.bound_name.as_ref().map(QualifiedName::render),
        }
    }

    pub fn has_pending_name(&self) -> bool {
        self.name_override.is_some()
    }
}
