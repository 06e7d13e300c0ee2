//! Diff between the last validated collection and the next one.

use std::collections::{HashMap, HashSet};

use crate::model::{Record, RecordId};

/// How a collection changed, keyed by record id.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct CollectionDiff {
    pub added: HashSet<RecordId>,
    pub removed: HashSet<RecordId>,
    /// Changed field names of records present on both sides.
    pub changed: HashMap<RecordId, Vec<String>>,
}

impl CollectionDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    /// Returns true if `id` was removed or had one of its changed fields
    /// accepted by `affects`.
    pub fn touches<F>(&self, id: RecordId, affects: F) -> bool
    where
        F: Fn(&[String]) -> bool,
    {
        self.removed.contains(&id) || self.changed.get(&id).is_some_and(|f| affects(f))
    }
}

/// Compare `prev` and `next` by record id.
pub(crate) fn reconcile(prev: &[Record], next: &[Record]) -> CollectionDiff {
    let before: HashMap<RecordId, &Record> = prev.iter().map(|r| (r.id(), r)).collect();
    let after: HashSet<RecordId> = next.iter().map(Record::id).collect();

    let mut diff = CollectionDiff::default();
    for record in next {
        match before.get(&record.id()) {
            None => {
                diff.added.insert(record.id());
            }
            Some(old) => {
                let changed = record.changed_fields(old);
                if !changed.is_empty() {
                    diff.changed.insert(record.id(), changed);
                }
            }
        }
    }
    diff.removed = before.into_keys().filter(|id| !after.contains(id)).collect();
    diff
}
