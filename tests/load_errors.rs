use anyhow::Result;
use std::fs;
use std::path::PathBuf;

use MapForge::consts::FIELD_CHILDREN;
use MapForge::{
    baseplate, write_map_file, BinaryCodec, FieldValue, Map, MapConfig, MapError,
    MemorySourceStore, PackageIndex, QualifiedName, Record, RecordCodec,
};

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("mftest-load-{}-{}-{}", prefix, pid, t))
}

fn map_error(e: &anyhow::Error) -> MapError {
    e.downcast_ref::<MapError>()
        .cloned()
        .unwrap_or_else(|| panic!("expected MapError, got {e:?}"))
}

#[test]
fn no_model_root_is_a_format_error() {
    let store = MemorySourceStore::new();
    let err = Map::from_tables(baseplate("SomethingElse"), MapConfig::default(), &store).unwrap_err();
    assert!(map_error(&err).is_format(), "{err:?}");
}

#[test]
fn configured_model_root_class_is_honoured() -> Result<()> {
    let store = MemorySourceStore::new();
    let cfg = MapConfig::default().with_model_root_class("SomethingElse");
    let map = Map::from_tables(baseplate("SomethingElse"), cfg, &store)?;
    assert_eq!(map.tree().class_of(map.root()), Some("SomethingElse"));
    Ok(())
}

#[test]
fn out_of_range_child_is_an_invalid_reference() {
    let mut t = baseplate("LuaDataModel");
    t.records[1].set(
        FIELD_CHILDREN,
        FieldValue::Array(vec![FieldValue::Object(PackageIndex::new(42))]),
    );
    let store = MemorySourceStore::new();
    let err = Map::from_tables(t, MapConfig::default(), &store).unwrap_err();
    match map_error(&err) {
        MapError::InvalidReference { value, .. } => assert_eq!(value, 42),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn child_without_class_is_a_format_error() {
    let mut t = baseplate("LuaDataModel");
    let orphan = t.push_record(Record::new(
        PackageIndex::NULL,
        PackageIndex::NULL,
        QualifiedName::plain("NoClass"),
    ));
    t.records[2].set(FIELD_CHILDREN, FieldValue::Array(vec![FieldValue::Object(orphan)]));
    let store = MemorySourceStore::new();
    let err = Map::from_tables(t, MapConfig::default(), &store).unwrap_err();
    assert!(map_error(&err).is_format(), "{err:?}");
}

#[test]
fn child_list_cycle_is_a_format_error() {
    let mut t = baseplate("LuaDataModel");
    // Workspace lists the model root as its own child
    t.records[2].set(
        FIELD_CHILDREN,
        FieldValue::Array(vec![FieldValue::Object(PackageIndex::from_record(1))]),
    );
    let store = MemorySourceStore::new();
    let err = Map::from_tables(t, MapConfig::default(), &store).unwrap_err();
    assert!(map_error(&err).is_format(), "{err:?}");
}

#[test]
fn corrupt_crc_is_rejected_unless_disabled() -> Result<()> {
    let root = unique_root("crc");
    fs::create_dir_all(&root)?;
    let path = root.join("world.umap");

    let mut bytes = BinaryCodec::default().encode(&baseplate("LuaDataModel"))?;
    let n = bytes.len();
    bytes[n - 1] ^= 0xFF; // трейлер
    write_map_file(&path, &bytes)?;

    let err = Map::open_with_config(&path, MapConfig::default()).unwrap_err();
    assert!(map_error(&err).is_format(), "{err:?}");

    let map = Map::open_with_config(&path, MapConfig::default().with_verify_crc(false))?;
    assert_eq!(map.tables().records.len(), 3);

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn truncated_file_is_a_format_error() -> Result<()> {
    let root = unique_root("trunc");
    fs::create_dir_all(&root)?;
    let path = root.join("world.umap");

    let bytes = BinaryCodec::default().encode(&baseplate("LuaDataModel"))?;
    write_map_file(&path, &bytes[..bytes.len() / 2])?;

    let err = Map::open_with_config(&path, MapConfig::default().with_verify_crc(false)).unwrap_err();
    assert!(map_error(&err).is_format(), "{err:?}");

    let _ = fs::remove_dir_all(&root);
    Ok(())
}
