//! class — реестр тегов классов и их возможностей.
//!
//! Behaviour is a small closed set of capabilities attached to a generic
//! instance, selected by the string class tag. New script-like tags are added
//! with `register` and need no change in the tree or save code.

use std::collections::HashMap;

use crate::consts::{CLASS_FOLDER, CLASS_LOCAL_SCRIPT, CLASS_MODULE_SCRIPT, CLASS_SCRIPT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// May be created in memory and allocated at save.
    pub creatable: bool,
    /// Carries a companion source file (LuaCode chain).
    pub has_source: bool,
    /// Owns a scene-root component sub-record.
    pub has_scene_root: bool,
}

impl Capabilities {
    pub const GENERIC: Capabilities = Capabilities {
        creatable: false,
        has_source: false,
        has_scene_root: false,
    };

    pub const FOLDER: Capabilities = Capabilities {
        creatable: true,
        has_source: false,
        has_scene_root: true,
    };

    pub const SCRIPT: Capabilities = Capabilities {
        creatable: true,
        has_source: true,
        has_scene_root: false,
    };
}

#[derive(Debug, Clone)]
pub struct ClassRegistry {
    by_tag: HashMap<String, Capabilities>,
}

impl Default for ClassRegistry {
    fn default() -> Self {
        let mut r = Self {
            by_tag: HashMap::new(),
        };
        r.register(CLASS_FOLDER, Capabilities::FOLDER);
        r.register(CLASS_SCRIPT, Capabilities::SCRIPT);
        r.register(CLASS_LOCAL_SCRIPT, Capabilities::SCRIPT);
        r.register(CLASS_MODULE_SCRIPT, Capabilities::SCRIPT);
        r
    }
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a tag.
    pub fn register(&mut self, tag: impl Into<String>, caps: Capabilities) {
        self.by_tag.insert(tag.into(), caps);
    }

    /// Unknown tags are generic (loadable, not creatable).
    pub fn lookup(&self, tag: &str) -> Capabilities {
        self.by_tag.get(tag).copied().unwrap_or(Capabilities::GENERIC)
    }

    pub fn is_creatable(&self, tag: &str) -> bool {
        self.lookup(tag).creatable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_and_extension() {
        let mut r = ClassRegistry::new();
        assert!(r.lookup("LuaFolder").has_scene_root);
        assert!(r.lookup("LuaModuleScript").has_source);
        assert!(!r.is_creatable("LuaDataModel"));
        assert_eq!(r.lookup("Whatever"), Capabilities::GENERIC);

        r.register("LuaServerScript", Capabilities::SCRIPT);
        assert!(r.lookup("LuaServerScript").has_source);
        assert!(r.is_creatable("LuaServerScript"));
    }
}
