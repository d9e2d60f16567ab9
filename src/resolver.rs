//! resolver — знаковые позиционные ссылки.
//!
//! value > 0  -> record table, slot value-1
//! value < 0  -> external table, slot -value-1
//! value == 0 -> null
//!
//! All cross-references go through `PackageIndex`; raw integers are never
//! indexed into the tables directly.

use serde::Serialize;
use std::fmt;

use crate::error::{MapError, TreeResult};
use crate::package::Tables;

/// Slot in the record table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RecordId(pub usize);

/// Slot in the external-reference table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExternalId(pub usize);

/// What a non-null reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Record(RecordId),
    External(ExternalId),
}

/// Signed positional reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PackageIndex(i32);

impl PackageIndex {
    pub const NULL: PackageIndex = PackageIndex(0);

    #[inline]
    pub fn new(raw: i32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn raw(self) -> i32 {
        self.0
    }

    #[inline]
    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn is_record(self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub fn is_external(self) -> bool {
        self.0 < 0
    }

    pub fn from_record(slot: usize) -> Self {
        Self(slot as i32 + 1)
    }

    pub fn from_external(slot: usize) -> Self {
        Self(-(slot as i32) - 1)
    }
}

impl fmt::Display for PackageIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<RecordId> for PackageIndex {
    fn from(id: RecordId) -> Self {
        PackageIndex::from_record(id.0)
    }
}

impl From<ExternalId> for PackageIndex {
    fn from(id: ExternalId) -> Self {
        PackageIndex::from_external(id.0)
    }
}

impl From<Target> for PackageIndex {
    fn from(t: Target) -> Self {
        match t {
            Target::Record(r) => r.into(),
            Target::External(e) => e.into(),
        }
    }
}

/// Inverse of `resolve`: the reference a record stores to point at `target`.
#[inline]
pub fn reference_of(target: impl Into<PackageIndex>) -> PackageIndex {
    target.into()
}

impl Tables {
    /// Resolve against both tables. Out-of-range is `InvalidReference`.
    pub fn resolve(&self, idx: PackageIndex) -> TreeResult<Option<Target>> {
        let v = idx.raw();
        if v == 0 {
            return Ok(None);
        }
        if v > 0 {
            let slot = (v - 1) as usize;
            if slot >= self.records.len() {
                return Err(MapError::invalid_ref(
                    v,
                    format!("record slot {} out of range (len={})", slot, self.records.len()),
                ));
            }
            Ok(Some(Target::Record(RecordId(slot))))
        } else {
            // -(i32::MIN) overflows; i64 keeps it honest
            let slot = (-(v as i64) - 1) as usize;
            if slot >= self.externals.len() {
                return Err(MapError::invalid_ref(
                    v,
                    format!(
                        "external slot {} out of range (len={})",
                        slot,
                        self.externals.len()
                    ),
                ));
            }
            Ok(Some(Target::External(ExternalId(slot))))
        }
    }

    /// Resolve, requiring the record table (null allowed).
    pub fn resolve_record(&self, idx: PackageIndex) -> TreeResult<Option<RecordId>> {
        match self.resolve(idx)? {
            None => Ok(None),
            Some(Target::Record(r)) => Ok(Some(r)),
            Some(Target::External(_)) => Err(MapError::invalid_ref(
                idx.raw(),
                "expected a record, got an external reference",
            )),
        }
    }

    /// Resolve, requiring the external table (null allowed).
    pub fn resolve_external(&self, idx: PackageIndex) -> TreeResult<Option<ExternalId>> {
        match self.resolve(idx)? {
            None => Ok(None),
            Some(Target::External(e)) => Ok(Some(e)),
            Some(Target::Record(_)) => Err(MapError::invalid_ref(
                idx.raw(),
                "expected an external reference, got a record",
            )),
        }
    }

    pub fn record(&self, id: RecordId) -> &crate::package::Record {
        &self.records[id.0]
    }

    pub fn record_mut(&mut self, id: RecordId) -> &mut crate::package::Record {
        &mut self.records[id.0]
    }

    pub fn external(&self, id: ExternalId) -> &crate::package::ExternalRef {
        &self.externals[id.0]
    }
}
