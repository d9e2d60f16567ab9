//! Общие константы: формат контейнера, имена полей записей, имена классов и пакетов.

// -------- Container file --------
pub const MAP_MAGIC: &[u8; 8] = b"MFMAP001";
pub const MAP_VERSION: u32 = 1;
pub const MAP_HDR_SIZE: usize = 16; // [magic8][ver u32][flags u32]
pub const MAP_TRAILER_SIZE: usize = 4; // crc32 u32

// Value tags inside a record field (u8).
pub const TAG_NONE: u8 = 0;
pub const TAG_BOOL: u8 = 1;
pub const TAG_INT: u8 = 2;
pub const TAG_FLOAT: u8 = 3;
pub const TAG_STR: u8 = 4;
pub const TAG_NAME: u8 = 5;
pub const TAG_OBJECT: u8 = 6;
pub const TAG_ARRAY: u8 = 7;
pub const TAG_GUID: u8 = 8;
pub const TAG_BYTES: u8 = 9;

// -------- Record fields the tree layer reads or writes --------
pub const FIELD_NAME: &str = "Name";
pub const FIELD_ACTOR_LABEL: &str = "ActorLabel";
pub const FIELD_PARENT: &str = "Parent";
pub const FIELD_CHILDREN: &str = "LuaChildren";
pub const FIELD_ROOT_COMPONENT: &str = "RootComponent";
pub const FIELD_LUA_CODE: &str = "LuaCode";
pub const FIELD_ACTOR_GUID: &str = "ActorGuid";
pub const FIELD_HIDDEN: &str = "bHidden";
pub const FIELD_COLLISION: &str = "bActorEnableCollision";
pub const FIELD_MOBILITY: &str = "EnabledMobility";

// -------- Classes --------
pub const CLASS_DATA_MODEL: &str = "LuaDataModel";
pub const CLASS_WORKSPACE: &str = "LuaWorkspace";
pub const CLASS_FOLDER: &str = "LuaFolder";
pub const CLASS_SCRIPT: &str = "LuaScript";
pub const CLASS_LOCAL_SCRIPT: &str = "LuaLocalScript";
pub const CLASS_MODULE_SCRIPT: &str = "LuaModuleScript";
pub const CLASS_SCENE_COMPONENT: &str = "SceneComponent";
pub const CLASS_LEVEL: &str = "Level";
pub const CLASS_LUA_CODE: &str = "LuaCode";

// Descriptor kinds used by external references.
pub const KIND_CLASS: &str = "Class";
pub const KIND_PACKAGE: &str = "Package";

// -------- Packages --------
pub const PKG_CORE_UOBJECT: &str = "/Script/CoreUObject";
pub const PKG_LUA_API: &str = "/Script/LuaAPI";
pub const PKG_LUA_MACHINE: &str = "/Script/LuaMachine";
pub const PKG_USER_PREFIX: &str = "/User/";
pub const PKG_USER_LUA: &str = "/User/Lua/";

// -------- Side store --------
pub const SOURCE_EXT: &str = "lua";
