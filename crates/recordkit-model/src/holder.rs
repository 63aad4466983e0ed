//! Per-instance model state.

use std::collections::BTreeSet;

use recordkit_core::Value;

/// Which fields a model selects and writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FieldFilter {
    #[default]
    All,
    Include(BTreeSet<usize>),
    Exclude(BTreeSet<usize>),
}

/// Flags, change set and field filter of one model value.
///
/// Fields are referred to by their index in the entity's field table.
#[derive(Debug, Clone, Default)]
pub struct ModelHolder {
    pub(crate) dirty: bool,
    pub(crate) entity: bool,
    pub(crate) readonly: bool,
    pub(crate) update_key: bool,
    changes: BTreeSet<usize>,
    filter: FieldFilter,
    /// Field values as of the last successful load or write.
    synced: Option<Vec<Value>>,
}

impl ModelHolder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Modified since the last successful operation.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Known to mirror a database row.
    pub fn is_entity(&self) -> bool {
        self.entity
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    pub fn is_update_key(&self) -> bool {
        self.update_key
    }

    pub(crate) fn mark_changed(&mut self, index: usize) {
        self.changes.insert(index);
        self.dirty = true;
    }

    pub fn is_changed(&self, index: usize) -> bool {
        self.changes.contains(&index)
    }

    /// Changed, and different from the value last read or written.
    pub fn is_modified(&self, index: usize, value: &Value) -> bool {
        if !self.is_changed(index) {
            return false;
        }
        match &self.synced {
            Some(values) => values.get(index) != Some(value),
            None => true,
        }
    }

    pub(crate) fn sync(&mut self, values: Vec<Value>) {
        self.synced = Some(values);
    }

    pub(crate) fn unsync(&mut self) {
        self.synced = None;
    }

    /// Indexes of changed fields in field-table order.
    pub fn changes(&self) -> impl Iterator<Item = usize> + '_ {
        self.changes.iter().copied()
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    pub(crate) fn clear_changes(&mut self) {
        self.changes.clear();
    }

    pub(crate) fn retain_changes(&mut self, keep: impl FnMut(&usize) -> bool) {
        self.changes.retain(keep);
    }

    pub fn filter(&self) -> &FieldFilter {
        &self.filter
    }

    /// Restrict to `fields`. Replaces any exclusion.
    pub(crate) fn include(&mut self, fields: BTreeSet<usize>) {
        self.filter = FieldFilter::Include(fields);
    }

    /// Skip `fields`. Replaces any inclusion.
    pub(crate) fn exclude(&mut self, fields: BTreeSet<usize>) {
        self.filter = FieldFilter::Exclude(fields);
    }

    pub(crate) fn clear_filter(&mut self) {
        self.filter = FieldFilter::All;
    }

    pub fn is_selected(&self, index: usize) -> bool {
        match &self.filter {
            FieldFilter::All => true,
            FieldFilter::Include(set) => set.contains(&index),
            FieldFilter::Exclude(set) => !set.contains(&index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_changed_sets_dirty() {
        let mut h = ModelHolder::new();
        assert!(!h.is_dirty());
        h.mark_changed(2);
        h.mark_changed(0);
        assert!(h.is_dirty());
        assert_eq!(h.changes().collect::<Vec<_>>(), vec![0, 2]);
        h.clear_changes();
        assert!(!h.has_changes());
        assert!(h.is_dirty());
    }

    #[test]
    fn test_modified_compares_with_synced_values() {
        let mut h = ModelHolder::new();
        h.mark_changed(0);
        assert!(h.is_modified(0, &Value::from(1)));
        assert!(!h.is_modified(1, &Value::from(1)));

        h.sync(vec![Value::from(1), Value::Null]);
        assert!(!h.is_modified(0, &Value::from(1)));
        assert!(h.is_modified(0, &Value::from(2)));

        h.unsync();
        assert!(h.is_modified(0, &Value::from(1)));
    }

    #[test]
    fn test_filters_replace_each_other() {
        let mut h = ModelHolder::new();
        h.include([1, 2].into_iter().collect());
        assert!(h.is_selected(1));
        assert!(!h.is_selected(0));
        h.exclude([1].into_iter().collect());
        assert!(!h.is_selected(1));
        assert!(h.is_selected(0));
        assert!(h.is_selected(2));
        h.clear_filter();
        assert_eq!(h.filter(), &FieldFilter::All);
    }
}
