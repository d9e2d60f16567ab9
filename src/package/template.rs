//! Minimal "baseplate" container: a level, a model root and one workspace.

use crate::consts::{
    CLASS_LEVEL, CLASS_WORKSPACE, FIELD_CHILDREN, FIELD_NAME, FIELD_PARENT, KIND_CLASS,
    KIND_PACKAGE, PKG_CORE_UOBJECT, PKG_LUA_API,
};
use crate::resolver::PackageIndex;

use super::{ExternalRef, FieldValue, QualifiedName, Record, Tables};

const PKG_ENGINE: &str = "/Script/Engine";

/// Tables of an empty world whose model root has class `model_root_class`.
pub fn baseplate(model_root_class: &str) -> Tables {
    let mut t = Tables::new();

    let engine = t.push_external(ExternalRef::new(
        PKG_CORE_UOBJECT,
        KIND_PACKAGE,
        PackageIndex::NULL,
        QualifiedName::plain(PKG_ENGINE),
    ));
    let level_cls = t.push_external(ExternalRef::new(
        PKG_CORE_UOBJECT,
        KIND_CLASS,
        engine,
        QualifiedName::plain(CLASS_LEVEL),
    ));
    let lua_api = t.push_external(ExternalRef::new(
        PKG_CORE_UOBJECT,
        KIND_PACKAGE,
        PackageIndex::NULL,
        QualifiedName::plain(PKG_LUA_API),
    ));
    let root_cls = t.push_external(ExternalRef::new(
        PKG_CORE_UOBJECT,
        KIND_CLASS,
        lua_api,
        QualifiedName::plain(model_root_class),
    ));
    let ws_cls = t.push_external(ExternalRef::new(
        PKG_CORE_UOBJECT,
        KIND_CLASS,
        lua_api,
        QualifiedName::plain(CLASS_WORKSPACE),
    ));

    let level = t.push_record(Record::new(
        level_cls,
        PackageIndex::NULL,
        QualifiedName::plain("PersistentLevel"),
    ));
    // model root = records[1], workspace = records[2]
    let root_ref = PackageIndex::from_record(1);
    let ws_ref = PackageIndex::from_record(2);

    t.push_record(
        Record::new(root_cls, level, QualifiedName::plain("DataModel"))
            .with_field(FIELD_NAME, FieldValue::Str("DataModel".into()))
            .with_field(
                FIELD_CHILDREN,
                FieldValue::Array(vec![FieldValue::Object(ws_ref)]),
            ),
    );
    t.push_record(
        Record::new(ws_cls, level, QualifiedName::plain("Workspace"))
            .with_field(FIELD_NAME, FieldValue::Str("Workspace".into()))
            .with_field(FIELD_PARENT, FieldValue::Object(root_ref)),
    );

    t.roots.push(root_ref);
    t.roots.push(ws_ref);
    t
}
