//! names — выдача уникальных квалифицированных имён (base + число).
//!
//! Uniqueness is checked against both tables, case-insensitively, on the
//! rendered name: a literal "Part1" blocks suffix 1 for base "Part". The
//! cache only remembers where to resume scanning; the tables stay the source
//! of truth, so allocations within one session never collide even though
//! nothing here is transactional against outside edits of the tables.

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::package::{fold_name, QualifiedName, Tables};

#[derive(Debug, Default, Clone)]
pub struct NameAllocator {
    // folded base label -> next suffix to try
    next: HashMap<String, u32>,
}

impl NameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Produce a name for `base` whose rendering no record or external ref
    /// currently uses.
    pub fn allocate(&mut self, tables: &Tables, base: &str) -> QualifiedName {
        let key = fold_name(base);
        let mut same_base = 0u32;
        let used: HashSet<String> = tables
            .names()
            .inspect(|n| {
                if n.has_base(base) {
                    same_base += 1;
                }
            })
            .map(|n| fold_name(&n.render()))
            .collect();

        let mut n = self.next.get(&key).copied().unwrap_or(same_base);
        while used.contains(&fold_name(&QualifiedName::new(base, n).render())) {
            n += 1;
        }
        self.next.insert(key, n + 1);

        let q = QualifiedName::new(base, n);
        debug!("names: allocated {} (base={}, suffix={})", q, base, n);
        q
    }
}
