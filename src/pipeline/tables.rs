use std::collections::BTreeMap;

use crate::normalize::{Record, Table};

/// Normalized output of one run, grouped by destination table.
///
/// Only tables whose resource was selected are present; a selected resource
/// that produced no rows is present and empty.
#[derive(Debug, Clone, Default)]
pub struct Tables {
    tables: BTreeMap<Table, Vec<Record>>,
}

impl Tables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, table: Table, records: Vec<Record>) {
        debug_assert!(records.iter().all(|r| r.table() == table));
        self.tables.entry(table).or_default().extend(records);
    }

    pub fn get(&self, table: Table) -> Option<&[Record]> {
        self.tables.get(&table).map(Vec::as_slice)
    }

    pub fn contains(&self, table: Table) -> bool {
        self.tables.contains_key(&table)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Table, &[Record])> {
        self.tables.iter().map(|(table, rows)| (*table, rows.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn total_rows(&self) -> usize {
        self.tables.values().map(Vec::len).sum()
    }
}
