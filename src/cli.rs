use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::MapConfig;
use crate::consts::{CLASS_DATA_MODEL, CLASS_WORKSPACE};
use crate::instance::InstanceId;
use crate::lock::acquire_exclusive_lock;
use crate::map::{init_map, Map, SaveReport};

#[derive(Parser, Debug)]
#[command(
    name = "mapforge",
    version,
    about = "Edit the scripted instance tree inside a map container",
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Write an empty world (level, model root, workspace)
    Init {
        #[arg(long)]
        path: PathBuf,
        #[arg(long, default_value = CLASS_DATA_MODEL)]
        model_root_class: String,
    },
    /// Print the instance tree
    Tree {
        #[arg(long)]
        path: PathBuf,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Create an instance and save
    Add {
        #[arg(long)]
        path: PathBuf,
        /// Output container (defaults to --path)
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        class: String,
        #[arg(long)]
        name: Option<String>,
        /// Parent: first child of the model root with this class
        #[arg(long, default_value = CLASS_WORKSPACE)]
        under_class: String,
        /// Initial script source (source-bearing classes only)
        #[arg(long)]
        source: Option<String>,
    },
    /// Rename the first descendant with this name and save
    Rename {
        #[arg(long)]
        path: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        find: String,
        #[arg(long)]
        name: String,
    },
    /// Destroy the first descendant with this name and save
    Rm {
        #[arg(long)]
        path: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        find: String,
    },
    /// Reachability report over the record table
    Check {
        #[arg(long)]
        path: PathBuf,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Init {
            path,
            model_root_class,
        } => {
            init_map(&path, &model_root_class)?;
            println!("Initialized map at {}", path.display());
        }
        Cmd::Tree { path, json } => cmd_tree(&path, json)?,
        Cmd::Add {
            path,
            out,
            class,
            name,
            under_class,
            source,
        } => {
            let out = out.unwrap_or_else(|| path.clone());
            let rep = cmd_add(
                &path,
                &out,
                &class,
                name.as_deref(),
                &under_class,
                source.as_deref(),
            )?;
            print_save(&out, &rep);
        }
        Cmd::Rename {
            path,
            out,
            find,
            name,
        } => {
            let out = out.unwrap_or_else(|| path.clone());
            let rep = cmd_rename(&path, &out, &find, &name)?;
            print_save(&out, &rep);
        }
        Cmd::Rm { path, out, find } => {
            let out = out.unwrap_or_else(|| path.clone());
            let rep = cmd_rm(&path, &out, &find)?;
            print_save(&out, &rep);
        }
        Cmd::Check { path, json } => cmd_check(&path, json)?,
    }
    Ok(())
}

fn print_save(out: &Path, rep: &SaveReport) {
    println!("Saved {}", out.display());
    println!("  records        = {}", rep.records);
    println!("  allocated      = {}", rep.allocated);
    println!("  renamed        = {}", rep.renamed);
    println!("  unlinked       = {}", rep.unlinked);
    println!("  roots_removed  = {}", rep.roots_removed);
    println!("  roots_restored = {}", rep.roots_restored);
    println!("  sources        = {}", rep.sources_written);
}

fn open(path: &Path) -> Result<Map> {
    Map::open_with_config(path, MapConfig::from_env())
}

fn find(map: &Map, name: &str) -> Result<InstanceId> {
    map.tree()
        .find_first_descendant(map.root(), name)
        .ok_or_else(|| anyhow!("no instance named {:?}", name))
}

pub fn cmd_tree(path: &Path, json: bool) -> Result<()> {
    let map = open(path)?;
    let dump = map
        .dump()
        .ok_or_else(|| anyhow!("map has no model root instance"))?;
    if json {
        println!("{}", serde_json::to_string_pretty(&dump)?);
    } else {
        print!("{}", dump.render());
    }
    Ok(())
}

/// Create `class` under the first model-root child of class `under_class`
/// (or the root itself), then save to `out`.
pub fn cmd_add(
    path: &Path,
    out: &Path,
    class: &str,
    name: Option<&str>,
    under_class: &str,
    source: Option<&str>,
) -> Result<SaveReport> {
    let _lock = acquire_exclusive_lock(out)?;
    let mut map = open(path)?;
    let root = map.root();
    let parent = map
        .tree()
        .find_first_child_of_class(root, under_class)
        .unwrap_or(root);

    let tree = map.tree_mut();
    let id = tree.create(class)?;
    if let Some(n) = name {
        tree.set_name(id, n)?;
    }
    if let Some(text) = source {
        tree.set_source(id, text)?;
    }
    tree.set_parent(id, Some(parent))?;

    map.save(out)
}

pub fn cmd_rename(path: &Path, out: &Path, find_name: &str, new_name: &str) -> Result<SaveReport> {
    let _lock = acquire_exclusive_lock(out)?;
    let mut map = open(path)?;
    let id = find(&map, find_name)?;
    map.tree_mut().set_name(id, new_name)?;
    map.save(out)
}

pub fn cmd_rm(path: &Path, out: &Path, find_name: &str) -> Result<SaveReport> {
    let _lock = acquire_exclusive_lock(out)?;
    let mut map = open(path)?;
    let id = find(&map, find_name)?;
    map.tree_mut().destroy(id)?;
    map.save(out)
}

pub fn cmd_check(path: &Path, json: bool) -> Result<()> {
    let map = open(path)?;
    let rep = map.check();
    if json {
        println!("{}", serde_json::to_string_pretty(&rep)?);
        return Ok(());
    }
    println!("Map at {}", path.display());
    println!("  records      = {}", rep.records);
    println!("  externals    = {}", rep.externals);
    println!("  roots        = {}", rep.roots);
    println!("  reachable    = {}", rep.reachable);
    println!("  unreachable  = {}", rep.unreachable.len());
    println!("  invalid_refs = {}", rep.invalid_refs);
    for r in &rep.unreachable {
        let rec = map.tables().record(*r);
        println!("    #{} {}", r.0, rec.name);
    }
    Ok(())
}
