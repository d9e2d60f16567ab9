//! check — отчёт о достижимости записей.
//!
//! Unlinked records are never reclaimed, so their payloads accumulate. This
//! walks every Object reference starting from the root pointers (and the
//! level record) and lists the records nothing reachable points at.
//! Out-of-range references are counted, not followed.

use serde::Serialize;
use std::collections::VecDeque;

use crate::package::Tables;
use crate::resolver::{PackageIndex, RecordId, Target};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    pub records: usize,
    pub externals: usize,
    pub roots: usize,
    pub reachable: usize,
    pub unreachable: Vec<RecordId>,
    pub invalid_refs: usize,
}

pub fn check_tables(tables: &Tables, level: Option<RecordId>) -> CheckReport {
    let n = tables.records.len();
    let mut seen = vec![false; n];
    let mut queue: VecDeque<RecordId> = VecDeque::new();
    let mut invalid = 0usize;

    let mut push = |idx: PackageIndex, seen: &mut Vec<bool>, queue: &mut VecDeque<RecordId>| {
        match tables.resolve(idx) {
            Ok(Some(Target::Record(r))) => {
                if !seen[r.0] {
                    seen[r.0] = true;
                    queue.push_back(r);
                }
            }
            Ok(_) => {}
            Err(_) => invalid += 1,
        }
    };

    for idx in &tables.roots {
        push(*idx, &mut seen, &mut queue);
    }
    if let Some(l) = level {
        push(l.into(), &mut seen, &mut queue);
    }

    let mut refs = Vec::new();
    while let Some(r) = queue.pop_front() {
        refs.clear();
        for f in tables.record(r).fields() {
            f.value.collect_refs(&mut refs);
        }
        for idx in &refs {
            push(*idx, &mut seen, &mut queue);
        }
    }

    let unreachable: Vec<RecordId> = (0..n).filter(|i| !seen[*i]).map(RecordId).collect();
    CheckReport {
        records: n,
        externals: tables.externals.len(),
        roots: tables.roots.len(),
        reachable: n - unreachable.len(),
        unreachable,
        invalid_refs: invalid,
    }
}
