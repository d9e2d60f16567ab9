//! package — таблицы контейнера: записи (records), внешние ссылки (externals)
//! и список корневых указателей (roots).
//!
//! Таблицы — это арены: записи никогда не удаляются и не перенумеровываются,
//! поэтому индекс записи стабилен в пределах одного цикла open/save.
//! Перекрёстные ссылки — только через `PackageIndex` (см. resolver).

pub mod codec;
pub mod template;
pub mod value;

pub use codec::{read_map_file, write_map_file, BinaryCodec, RecordCodec};
pub use template::baseplate;
pub use value::{fold_name, Field, FieldValue, QualifiedName};

use crate::resolver::PackageIndex;

/// One slot of the owned record table.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Class descriptor (usually an external ref).
    pub class: PackageIndex,
    /// Owning object (the level for actors, the actor for sub-objects).
    pub outer: PackageIndex,
    pub name: QualifiedName,
    pub fields: Vec<Field>,
}

impl Record {
    pub fn new(class: PackageIndex, outer: PackageIndex, name: QualifiedName) -> Self {
        Self {
            class,
            outer,
            name,
            fields: Vec::new(),
        }
    }

    /// First field with this name.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }

    pub fn has(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    /// Replace the first field with this name in place, or append it.
    pub fn set(&mut self, name: &str, value: FieldValue) {
        match self.fields.iter_mut().find(|f| f.name == name) {
            Some(f) => f.value = value,
            None => self.fields.push(Field::new(name, value)),
        }
    }

    /// Remove every field with this name. Returns how many were removed.
    pub fn remove(&mut self, name: &str) -> usize {
        let before = self.fields.len();
        self.fields.retain(|f| f.name != name);
        before - self.fields.len()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn with_field(mut self, name: &str, value: FieldValue) -> Self {
        self.set(name, value);
        self
    }
}

/// Read-only dependency descriptor outside the record table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalRef {
    pub class_package: String,
    pub class_name: String,
    pub outer: PackageIndex,
    pub object_name: QualifiedName,
}

impl ExternalRef {
    pub fn new(
        class_package: impl Into<String>,
        class_name: impl Into<String>,
        outer: PackageIndex,
        object_name: QualifiedName,
    ) -> Self {
        Self {
            class_package: class_package.into(),
            class_name: class_name.into(),
            outer,
            object_name,
        }
    }
}

/// Decoded container: the two arenas plus the root-pointer list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tables {
    pub externals: Vec<ExternalRef>,
    pub records: Vec<Record>,
    pub roots: Vec<PackageIndex>,
}

impl Tables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record, returning its positional reference.
    pub fn push_record(&mut self, rec: Record) -> PackageIndex {
        self.records.push(rec);
        PackageIndex::from_record(self.records.len() - 1)
    }

    /// Append an external ref, returning its positional reference.
    pub fn push_external(&mut self, ext: ExternalRef) -> PackageIndex {
        self.externals.push(ext);
        PackageIndex::from_external(self.externals.len() - 1)
    }

    /// Every qualified name materialised in either table.
    pub fn names(&self) -> impl Iterator<Item = &QualifiedName> {
        self.records
            .iter()
            .map(|r| &r.name)
            .chain(self.externals.iter().map(|e| &e.object_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_set_replaces_in_place_and_remove_strips_all() {
        let mut r = Record::new(PackageIndex::NULL, PackageIndex::NULL, QualifiedName::new("A", 0));
        r.set("x", FieldValue::Int(1));
        r.set("y", FieldValue::Bool(true));
        r.set("x", FieldValue::Int(2));
        assert_eq!(r.fields().len(), 2);
        assert_eq!(r.fields()[0].name, "x");
        assert_eq!(r.get("x"), Some(&FieldValue::Int(2)));

        r.fields.push(Field::new("y", FieldValue::Bool(false)));
        assert_eq!(r.remove("y"), 2);
        assert!(!r.has("y"));
        assert_eq!(r.remove("missing"), 0);
    }

    #[test]
    fn push_returns_signed_positions() {
        let mut t = Tables::new();
        let e = t.push_external(ExternalRef::new(
            "/Script/CoreUObject",
            "Class",
            PackageIndex::NULL,
            QualifiedName::new("Thing", 0),
        ));
        let r = t.push_record(Record::new(e, PackageIndex::NULL, QualifiedName::new("Thing", 1)));
        assert_eq!(e.raw(), -1);
        assert_eq!(r.raw(), 1);
        assert_eq!(t.names().count(), 2);
    }
}
