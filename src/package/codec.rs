// src/package/codec.rs — MapForge container v1
//
// Формат файла (LE):
// MAGIC8 = "MFMAP001"
// u32 version = 1
// u32 flags   = 0 (reserved)
// u32 external_count, externals...
//     [str class_package][str class_name][i32 outer][qname object_name]
// u32 record_count, records...
//     [i32 class][i32 outer][qname name][u32 field_count][field...]
//     field = [str name][u8 tag][payload]
// u32 root_count, i32 roots...
// u32 crc32 (crc32fast по всем предыдущим байтам)
//
// str   = [u32 len][utf8]
// qname = [str base][u32 number]
//
// Политика:
// - Запись атомарная: tmp + sync_all + rename, затем fsync каталога (best-effort).
// - Любая структурная ошибка при чтении — MapError::Format; усечённый файл тоже.

use anyhow::{Context, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher as Crc32;
#[cfg(unix)]
use std::fs::File;
use std::fs::{self, OpenOptions};
use std::io::{Cursor, Read, Write};
use std::path::Path;

use crate::consts::{
    MAP_HDR_SIZE, MAP_MAGIC, MAP_TRAILER_SIZE, MAP_VERSION, TAG_ARRAY, TAG_BOOL, TAG_BYTES,
    TAG_FLOAT, TAG_GUID, TAG_INT, TAG_NAME, TAG_NONE, TAG_OBJECT, TAG_STR,
};
use crate::error::{MapError, TreeResult};
use crate::resolver::PackageIndex;

use super::{ExternalRef, Field, FieldValue, QualifiedName, Record, Tables};

// Nested arrays deeper than this are treated as corruption.
const MAX_VALUE_DEPTH: usize = 64;

/// Decodes/encodes raw container bytes into tables.
pub trait RecordCodec {
    fn decode(&self, bytes: &[u8]) -> Result<Tables>;
    fn encode(&self, tables: &Tables) -> Result<Vec<u8>>;
}

/// Default codec for the MFMAP001 container.
#[derive(Debug, Clone, Copy)]
pub struct BinaryCodec {
    pub verify_crc: bool,
}

impl Default for BinaryCodec {
    fn default() -> Self {
        Self { verify_crc: true }
    }
}

impl BinaryCodec {
    pub fn new(verify_crc: bool) -> Self {
        Self { verify_crc }
    }
}

impl RecordCodec for BinaryCodec {
    fn decode(&self, bytes: &[u8]) -> Result<Tables> {
        Ok(decode_tables(bytes, self.verify_crc)?)
    }

    fn encode(&self, tables: &Tables) -> Result<Vec<u8>> {
        encode_tables(tables)
    }
}

// -------------------- decode --------------------

struct Reader<'a> {
    cur: Cursor<&'a [u8]>,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self {
            cur: Cursor::new(buf),
        }
    }

    fn pos(&self) -> u64 {
        self.cur.position()
    }

    fn remaining(&self) -> usize {
        let len = self.cur.get_ref().len() as u64;
        len.saturating_sub(self.cur.position()) as usize
    }

    fn truncated(&self, what: &str) -> MapError {
        MapError::format(format!("truncated container while reading {what} at offset {}", self.pos()))
    }

    fn u8(&mut self, what: &str) -> TreeResult<u8> {
        self.cur.read_u8().map_err(|_| self.truncated(what))
    }

    fn u32(&mut self, what: &str) -> TreeResult<u32> {
        self.cur
            .read_u32::<LittleEndian>()
            .map_err(|_| self.truncated(what))
    }

    fn i32(&mut self, what: &str) -> TreeResult<i32> {
        self.cur
            .read_i32::<LittleEndian>()
            .map_err(|_| self.truncated(what))
    }

    fn i64(&mut self, what: &str) -> TreeResult<i64> {
        self.cur
            .read_i64::<LittleEndian>()
            .map_err(|_| self.truncated(what))
    }

    fn f64(&mut self, what: &str) -> TreeResult<f64> {
        self.cur
            .read_f64::<LittleEndian>()
            .map_err(|_| self.truncated(what))
    }

    /// Length-prefixed count, sanity-checked against the bytes left.
    fn count(&mut self, what: &str, min_item: usize) -> TreeResult<usize> {
        let n = self.u32(what)? as usize;
        if n.saturating_mul(min_item.max(1)) > self.remaining() {
            return Err(MapError::format(format!(
                "{what} count {n} exceeds remaining {} bytes",
                self.remaining()
            )));
        }
        Ok(n)
    }

    fn bytes(&mut self, len: usize, what: &str) -> TreeResult<Vec<u8>> {
        if len > self.remaining() {
            return Err(self.truncated(what));
        }
        let mut buf = vec![0u8; len];
        self.cur.read_exact(&mut buf).map_err(|_| self.truncated(what))?;
        Ok(buf)
    }

    fn string(&mut self, what: &str) -> TreeResult<String> {
        let len = self.u32(what)? as usize;
        let raw = self.bytes(len, what)?;
        String::from_utf8(raw)
            .map_err(|_| MapError::format(format!("{what} is not valid UTF-8")))
    }

    fn qname(&mut self, what: &str) -> TreeResult<QualifiedName> {
        let base = self.string(what)?;
        let number = self.u32(what)?;
        Ok(QualifiedName::new(base, number))
    }

    fn index(&mut self, what: &str) -> TreeResult<PackageIndex> {
        Ok(PackageIndex::new(self.i32(what)?))
    }

    fn value(&mut self, depth: usize) -> TreeResult<FieldValue> {
        if depth > MAX_VALUE_DEPTH {
            return Err(MapError::format("field value nesting too deep"));
        }
        let tag = self.u8("value tag")?;
        let v = match tag {
            TAG_NONE => FieldValue::None,
            TAG_BOOL => FieldValue::Bool(self.u8("bool")? != 0),
            TAG_INT => FieldValue::Int(self.i64("int")?),
            TAG_FLOAT => FieldValue::Float(self.f64("float")?),
            TAG_STR => FieldValue::Str(self.string("str")?),
            TAG_NAME => FieldValue::Name(self.qname("name")?),
            TAG_OBJECT => FieldValue::Object(self.index("object")?),
            TAG_ARRAY => {
                let n = self.count("array", 1)?;
                let mut items = Vec::with_capacity(n);
                for _ in 0..n {
                    items.push(self.value(depth + 1)?);
                }
                FieldValue::Array(items)
            }
            TAG_GUID => {
                let raw = self.bytes(16, "guid")?;
                let mut g = [0u8; 16];
                g.copy_from_slice(&raw);
                FieldValue::Guid(g)
            }
            TAG_BYTES => {
                let len = self.u32("bytes")? as usize;
                FieldValue::Bytes(self.bytes(len, "bytes")?)
            }
            other => {
                return Err(MapError::format(format!(
                    "unknown value tag {} at offset {}",
                    other,
                    self.pos() - 1
                )))
            }
        };
        Ok(v)
    }
}

fn decode_tables(bytes: &[u8], verify_crc: bool) -> TreeResult<Tables> {
    if bytes.len() < MAP_HDR_SIZE + MAP_TRAILER_SIZE {
        return Err(MapError::format(format!(
            "container too short ({} bytes)",
            bytes.len()
        )));
    }
    if &bytes[..8] != MAP_MAGIC {
        return Err(MapError::format(format!(
            "bad container magic (expected {:?}, got {:?})",
            MAP_MAGIC,
            &bytes[..8]
        )));
    }

    let body_len = bytes.len() - MAP_TRAILER_SIZE;
    if verify_crc {
        let mut tail = &bytes[body_len..];
        let stored = tail
            .read_u32::<LittleEndian>()
            .map_err(|_| MapError::format("missing crc trailer"))?;
        let calc = crc_of(&bytes[..body_len]);
        if stored != calc {
            return Err(MapError::format(format!(
                "container CRC mismatch (stored={stored:#010x}, calc={calc:#010x})"
            )));
        }
    }

    let mut r = Reader::new(&bytes[..body_len]);
    r.cur.set_position(8);
    let version = r.u32("version")?;
    if version != MAP_VERSION {
        return Err(MapError::format(format!(
            "unsupported container version {version} (expected {MAP_VERSION})"
        )));
    }
    let _flags = r.u32("flags")?;

    let mut t = Tables::new();

    // externals: 2 строки + outer + qname => минимум 4+4+4+4+4 байт
    let n_ext = r.count("external count", 20)?;
    t.externals.reserve(n_ext);
    for _ in 0..n_ext {
        let class_package = r.string("external class package")?;
        let class_name = r.string("external class name")?;
        let outer = r.index("external outer")?;
        let object_name = r.qname("external object name")?;
        t.externals.push(ExternalRef {
            class_package,
            class_name,
            outer,
            object_name,
        });
    }

    let n_rec = r.count("record count", 20)?;
    t.records.reserve(n_rec);
    for _ in 0..n_rec {
        let class = r.index("record class")?;
        let outer = r.index("record outer")?;
        let name = r.qname("record name")?;
        let n_fields = r.count("field count", 5)?;
        let mut fields = Vec::with_capacity(n_fields);
        for _ in 0..n_fields {
            let fname = r.string("field name")?;
            let value = r.value(0)?;
            fields.push(Field::new(fname, value));
        }
        t.records.push(Record {
            class,
            outer,
            name,
            fields,
        });
    }

    let n_roots = r.count("root count", 4)?;
    t.roots.reserve(n_roots);
    for _ in 0..n_roots {
        t.roots.push(r.index("root")?);
    }

    if r.remaining() != 0 {
        return Err(MapError::format(format!(
            "{} trailing bytes after root list",
            r.remaining()
        )));
    }
    Ok(t)
}

// -------------------- encode --------------------

fn put_str(out: &mut Vec<u8>, s: &str) -> Result<()> {
    out.write_u32::<LittleEndian>(s.len() as u32)?;
    out.write_all(s.as_bytes())?;
    Ok(())
}

fn put_qname(out: &mut Vec<u8>, q: &QualifiedName) -> Result<()> {
    put_str(out, &q.base)?;
    out.write_u32::<LittleEndian>(q.number)?;
    Ok(())
}

fn put_value(out: &mut Vec<u8>, v: &FieldValue) -> Result<()> {
    match v {
        FieldValue::None => out.write_u8(TAG_NONE)?,
        FieldValue::Bool(b) => {
            out.write_u8(TAG_BOOL)?;
            out.write_u8(if *b { 1 } else { 0 })?;
        }
        FieldValue::Int(i) => {
            out.write_u8(TAG_INT)?;
            out.write_i64::<LittleEndian>(*i)?;
        }
        FieldValue::Float(f) => {
            out.write_u8(TAG_FLOAT)?;
            out.write_f64::<LittleEndian>(*f)?;
        }
        FieldValue::Str(s) => {
            out.write_u8(TAG_STR)?;
            put_str(out, s)?;
        }
        FieldValue::Name(q) => {
            out.write_u8(TAG_NAME)?;
            put_qname(out, q)?;
        }
        FieldValue::Object(p) => {
            out.write_u8(TAG_OBJECT)?;
            out.write_i32::<LittleEndian>(p.raw())?;
        }
        FieldValue::Array(items) => {
            out.write_u8(TAG_ARRAY)?;
            out.write_u32::<LittleEndian>(items.len() as u32)?;
            for it in items {
                put_value(out, it)?;
            }
        }
        FieldValue::Guid(g) => {
            out.write_u8(TAG_GUID)?;
            out.write_all(g)?;
        }
        FieldValue::Bytes(b) => {
            out.write_u8(TAG_BYTES)?;
            out.write_u32::<LittleEndian>(b.len() as u32)?;
            out.write_all(b)?;
        }
    }
    Ok(())
}

fn encode_tables(t: &Tables) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(MAP_HDR_SIZE + 64 * (t.records.len() + t.externals.len()));
    out.write_all(MAP_MAGIC)?;
    out.write_u32::<LittleEndian>(MAP_VERSION)?;
    out.write_u32::<LittleEndian>(0)?; // flags

    out.write_u32::<LittleEndian>(t.externals.len() as u32)?;
    for e in &t.externals {
        put_str(&mut out, &e.class_package)?;
        put_str(&mut out, &e.class_name)?;
        out.write_i32::<LittleEndian>(e.outer.raw())?;
        put_qname(&mut out, &e.object_name)?;
    }

    out.write_u32::<LittleEndian>(t.records.len() as u32)?;
    for rec in &t.records {
        out.write_i32::<LittleEndian>(rec.class.raw())?;
        out.write_i32::<LittleEndian>(rec.outer.raw())?;
        put_qname(&mut out, &rec.name)?;
        out.write_u32::<LittleEndian>(rec.fields.len() as u32)?;
        for f in &rec.fields {
            put_str(&mut out, &f.name)?;
            put_value(&mut out, &f.value)?;
        }
    }

    out.write_u32::<LittleEndian>(t.roots.len() as u32)?;
    for r in &t.roots {
        out.write_i32::<LittleEndian>(r.raw())?;
    }

    let crc = crc_of(&out);
    out.write_u32::<LittleEndian>(crc)?;
    Ok(out)
}

#[inline]
fn crc_of(buf: &[u8]) -> u32 {
    let mut h = Crc32::new();
    h.update(buf);
    h.finalize()
}

// -------------------- files --------------------

#[cfg(unix)]
fn fsync_dir(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            let dir = File::open(parent)?;
            dir.sync_all()?;
        }
    }
    Ok(())
}
#[cfg(not(unix))]
fn fsync_dir(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Read and decode a container file.
pub fn read_map_file(path: &Path, codec: &dyn RecordCodec) -> Result<Tables> {
    let bytes = fs::read(path).with_context(|| format!("read container {}", path.display()))?;
    codec
        .decode(&bytes)
        .with_context(|| format!("decode container {}", path.display()))
}

/// Write container bytes via tmp+rename.
pub fn write_map_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "map".to_string());
    let tmp = path.with_file_name(format!("{file_name}.tmp"));
    let _ = fs::remove_file(&tmp); // best-effort

    let mut f = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&tmp)
        .with_context(|| format!("open container tmp {}", tmp.display()))?;
    f.write_all(bytes)
        .with_context(|| format!("write container tmp {}", tmp.display()))?;
    f.sync_all()?;
    drop(f);

    fs::rename(&tmp, path)
        .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    let _ = fsync_dir(path);
    Ok(())
}
