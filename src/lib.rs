#![allow(non_snake_case)]

// Базовые модули
pub mod consts;
pub mod error;
pub mod config;

// Таблицы контейнера и ссылки между ними
pub mod package; // src/package/{mod,value,codec,template}.rs
pub mod resolver;
pub mod names;

// Дерево экземпляров
pub mod class;
pub mod instance; // src/instance/{mod,tree,dump}.rs

// Исходники скриптов рядом с контейнером
pub mod sidestore;

// open / save / check
pub mod map; // src/map/{mod,load,save,check}.rs

// Блокировка файла контейнера (CLI)
pub mod lock;

pub mod cli;

// Удобные реэкспорты
pub use class::{Capabilities, ClassRegistry};
pub use config::{MapBuilder, MapConfig};
pub use error::{MapError, TreeResult};
pub use lock::{acquire_exclusive_lock, try_acquire_exclusive_lock, LockGuard};
pub use instance::{Instance, InstanceId, MapTree, TreeDump};
pub use map::{init_map, CheckReport, Map, SaveReport};
pub use names::NameAllocator;
pub use package::{
    baseplate, read_map_file, write_map_file, BinaryCodec, ExternalRef, Field, FieldValue,
    QualifiedName, Record, RecordCodec, Tables,
};
pub use resolver::{reference_of, ExternalId, PackageIndex, RecordId, Target};
pub use sidestore::{FsSourceStore, MemorySourceStore, SourceStore};
