use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;

use MapForge::consts::{CLASS_SCRIPT, CLASS_WORKSPACE};
use MapForge::{init_map, Map, MapConfig};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    let base = std::env::temp_dir();
    base.join(format!("mftest-builder-{prefix}-{pid}-{t}-{id}"))
}

#[test]
fn builder_source_dir_redirects_side_store() -> Result<()> {
    let root = unique_root("srcdir");
    fs::create_dir_all(&root)?;
    let path = root.join("world.umap");
    let src = root.join("scripts");
    init_map(&path, "LuaDataModel")?;

    // Конфиг с отдельным каталогом исходников
    let cfg = Map::builder()
        .source_dir(Some(&src))
        .write_sources(true)
        .build();
    assert_eq!(cfg.source_dir.as_deref(), Some(src.as_path()));

    {
        let mut map = Map::open_with_config(&path, cfg.clone())?;
        assert_eq!(map.config().source_dir, cfg.source_dir);
        assert_eq!(map.path(), Some(path.as_path()));

        let ws = map
            .tree()
            .find_first_child_of_class(map.root(), CLASS_WORKSPACE)
            .expect("workspace");
        let tree = map.tree_mut();
        let s = tree.create(CLASS_SCRIPT)?;
        tree.set_name(s, "Main")?;
        tree.set_source(s, "print(1)")?;
        tree.set_parent(s, Some(ws))?;
        map.save(&path)?;
    }

    assert_eq!(fs::read_to_string(src.join("Lua").join("Main.lua"))?, "print(1)");
    assert!(!root.join("Lua").exists(), "default location must stay unused");

    // без source_dir текст не найдётся (файла рядом с контейнером нет)
    let plain = Map::open_with_config(&path, MapConfig::default())?;
    let s = plain
        .tree()
        .find_first_descendant(plain.root(), "Main")
        .expect("script");
    assert_eq!(plain.tree().source(s), Some(""));

    let with_dir = Map::open_with_config(&path, cfg)?;
    let s = with_dir
        .tree()
        .find_first_descendant(with_dir.root(), "Main")
        .expect("script");
    assert_eq!(with_dir.tree().source(s), Some("print(1)"));

    let _ = fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn builder_model_root_class_matches_init() -> Result<()> {
    let root = unique_root("rootclass");
    fs::create_dir_all(&root)?;
    let path = root.join("world.umap");
    init_map(&path, "GameRoot")?;

    assert!(Map::open_with_config(&path, MapConfig::default()).is_err());

    let cfg = Map::builder().model_root_class("GameRoot").build();
    let map = Map::open_with_config(&path, cfg)?;
    assert_eq!(map.tree().class_of(map.root()), Some("GameRoot"));
    assert!(map.level().is_some());

    let _ = fs::remove_dir_all(&root);
    Ok(())
}
