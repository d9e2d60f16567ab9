use anyhow::Result;
use std::fs;
use std::path::PathBuf;

use MapForge::consts::{CLASS_FOLDER, CLASS_WORKSPACE, FIELD_CHILDREN, FIELD_PARENT};
use MapForge::{init_map, FieldValue, Map, MapConfig, PackageIndex};

#[test]
fn smoke_init_add_save_reopen() -> Result<()> {
    let root = unique_root("smoke");
    fs::create_dir_all(&root)?;
    let path = root.join("world.umap");

    // 1) init
    init_map(&path, "LuaDataModel")?;
    assert!(init_map(&path, "LuaDataModel").is_err(), "init must not overwrite");

    // 2) два каталога под Workspace
    {
        let mut map = Map::open_with_config(&path, MapConfig::default())?;
        assert_eq!(map.tables().records.len(), 3);
        let ws = map
            .tree()
            .find_first_child_of_class(map.root(), CLASS_WORKSPACE)
            .expect("baseplate has a workspace");

        let tree = map.tree_mut();
        let a = tree.create(CLASS_FOLDER)?;
        tree.set_name(a, "NewFolder")?;
        tree.set_parent(a, Some(ws))?;
        let b = tree.create(CLASS_FOLDER)?;
        tree.set_name(b, "NewFolder")?;
        tree.set_parent(b, Some(ws))?;

        let rep = map.save(&path)?;
        // folder + scene-root component each
        assert_eq!(rep.allocated, 4);
        assert_eq!(rep.records, 7);
        assert_eq!(rep.unlinked, 0);
        assert_eq!(map.tree().name(a).as_deref(), Some("NewFolder"));
        assert_eq!(map.tree().name(b).as_deref(), Some("NewFolder1"));
    }

    // 3) reopen: дерево и поля записей
    {
        let map = Map::open_with_config(&path, MapConfig::default())?;
        let ws = map
            .tree()
            .find_first_child_of_class(map.root(), CLASS_WORKSPACE)
            .expect("workspace after reopen");
        let kids = map.tree().children(ws);
        assert_eq!(kids.len(), 2);
        let first = map
            .tree()
            .find_first_child_of_class(ws, CLASS_FOLDER)
            .expect("folder after reopen");
        assert_eq!(first, kids[0]);
        assert_eq!(map.tree().name(kids[0]).as_deref(), Some("NewFolder"));
        assert_eq!(map.tree().name(kids[1]).as_deref(), Some("NewFolder1"));

        let ws_rec = map.tree().get(ws).and_then(|n| n.record()).expect("bound");
        let t = map.tables();
        match t.record(ws_rec).get(FIELD_CHILDREN) {
            Some(FieldValue::Array(items)) => assert_eq!(items.len(), 2),
            other => panic!("workspace child list: {other:?}"),
        }
        for k in kids {
            let node = map.tree().get(k).expect("node");
            let rec = node.record().expect("bound");
            assert_eq!(
                t.record(rec).get(FIELD_PARENT),
                Some(&FieldValue::Object(PackageIndex::from(ws_rec)))
            );
            assert!(node.scene_root().is_some(), "folder owns a scene root");
            assert!(!t.record(rec).has(FIELD_CHILDREN), "empty child list is removed");
        }
        assert!(map.check().unreachable.is_empty());
    }

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn second_session_continues_suffixes() -> Result<()> {
    let root = unique_root("suffix");
    fs::create_dir_all(&root)?;
    let path = root.join("world.umap");
    init_map(&path, "LuaDataModel")?;

    for _ in 0..2 {
        let mut map = Map::open_with_config(&path, MapConfig::default())?;
        let ws = map
            .tree()
            .find_first_child_of_class(map.root(), CLASS_WORKSPACE)
            .expect("workspace");
        let tree = map.tree_mut();
        let f = tree.create(CLASS_FOLDER)?;
        tree.set_name(f, "Box")?;
        tree.set_parent(f, Some(ws))?;
        map.save(&path)?;
    }

    let map = Map::open_with_config(&path, MapConfig::default())?;
    let names: Vec<String> = map
        .tree()
        .descendants(map.root())
        .into_iter()
        .filter_map(|d| map.tree().name(d))
        .collect();
    assert_eq!(names, vec!["Workspace", "Box", "Box1"]);

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn literal_numbered_name_does_not_collide_with_suffix() -> Result<()> {
    let root = unique_root("literal");
    fs::create_dir_all(&root)?;
    let path = root.join("world.umap");
    init_map(&path, "LuaDataModel")?;

    {
        let mut map = Map::open_with_config(&path, MapConfig::default())?;
        let ws = map
            .tree()
            .find_first_child_of_class(map.root(), CLASS_WORKSPACE)
            .expect("workspace");
        let tree = map.tree_mut();
        for label in ["Part1", "Part", "Part"] {
            let f = tree.create(CLASS_FOLDER)?;
            tree.set_name(f, label)?;
            tree.set_parent(f, Some(ws))?;
        }
        map.save(&path)?;
    }

    let map = Map::open_with_config(&path, MapConfig::default())?;
    let ws = map
        .tree()
        .find_first_child_of_class(map.root(), CLASS_WORKSPACE)
        .expect("workspace");
    let names: Vec<String> = map
        .tree()
        .children(ws)
        .into_iter()
        .filter_map(|k| map.tree().name(k))
        .collect();
    assert_eq!(names, vec!["Part1", "Part", "Part2"]);

    let mut seen = std::collections::HashSet::new();
    for n in map.tables().names() {
        assert!(seen.insert(n.to_string().to_lowercase()), "duplicate name {n}");
    }

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("mftest-{}-{}-{}", prefix, pid, t))
}
