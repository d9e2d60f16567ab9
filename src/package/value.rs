//! Field values and qualified names stored inside records.

use std::fmt;

use crate::resolver::PackageIndex;

/// Case folding used for every name comparison (labels are not ASCII-only).
#[inline]
pub fn fold_name(s: &str) -> String {
    s.to_lowercase()
}

/// Base label plus numeric disambiguator. Number 0 renders as the bare label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedName {
    pub base: String,
    pub number: u32,
}

impl QualifiedName {
    pub fn new(base: impl Into<String>, number: u32) -> Self {
        Self {
            base: base.into(),
            number,
        }
    }

    pub fn plain(base: impl Into<String>) -> Self {
        Self::new(base, 0)
    }

    /// Case-insensitive match on the base label only.
    #[inline]
    pub fn has_base(&self, base: &str) -> bool {
        fold_name(&self.base) == fold_name(base)
    }

    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.number == 0 {
            write!(f, "{}", self.base)
        } else {
            write!(f, "{}{}", self.base, self.number)
        }
    }
}

/// Opaque-to-the-tree value of a record field. Only `Object` and `Array`
/// of `Object` carry references the tree layer follows.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Name(QualifiedName),
    Object(PackageIndex),
    Array(Vec<FieldValue>),
    Guid([u8; 16]),
    Bytes(Vec<u8>),
}

impl FieldValue {
    pub fn as_object(&self) -> Option<PackageIndex> {
        match self {
            FieldValue::Object(p) => Some(*p),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Every positional reference inside this value (arrays included).
    pub fn collect_refs(&self, out: &mut Vec<PackageIndex>) {
        match self {
            FieldValue::Object(p) => out.push(*p),
            FieldValue::Array(items) => {
                for it in items {
                    it.collect_refs(out);
                }
            }
            _ => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub value: FieldValue,
}

impl Field {
    pub fn new(name: impl Into<String>, value: FieldValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}
