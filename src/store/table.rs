use std::collections::HashMap;

use dashmap::DashMap;
use uuid::Uuid;

pub trait Row: Clone + Send + Sync + 'static {
    fn key(&self) -> Uuid;
}

/// Committed rows of one table.
pub struct Table<V> {
    rows: DashMap<Uuid, V>,
}

impl<V: Row> Table<V> {
    pub fn new() -> Self {
        Self {
            rows: DashMap::new(),
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<V> {
        self.rows.get(id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn scan(&self, mut pred: impl FnMut(&V) -> bool) -> Vec<V> {
        self.rows
            .iter()
            .filter(|entry| pred(entry.value()))
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub(super) fn stage(&self) -> Staged<'_, V> {
        Staged {
            table: self,
            writes: HashMap::new(),
        }
    }
}

impl<V: Row> Default for Table<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Transaction-local view of a table: reads see staged writes first.
pub struct Staged<'a, V> {
    table: &'a Table<V>,
    writes: HashMap<Uuid, V>,
}

impl<V: Row> Staged<'_, V> {
    pub fn get(&self, id: &Uuid) -> Option<V> {
        match self.writes.get(id) {
            Some(row) => Some(row.clone()),
            None => self.table.get(id),
        }
    }

    pub fn put(&mut self, row: V) {
        self.writes.insert(row.key(), row);
    }

    pub fn scan(&self, mut pred: impl FnMut(&V) -> bool) -> Vec<V> {
        let mut rows: Vec<V> = self
            .table
            .rows
            .iter()
            .filter_map(|entry| {
                let row = self.writes.get(entry.key()).unwrap_or(entry.value());
                pred(row).then(|| row.clone())
            })
            .collect();

        rows.extend(
            self.writes
                .values()
                .filter(|row| !self.table.rows.contains_key(&row.key()) && pred(row))
                .cloned(),
        );
        rows
    }

    pub fn count(&self, pred: impl FnMut(&V) -> bool) -> usize {
        self.scan(pred).len()
    }

    pub(super) fn written(&self) -> impl Iterator<Item = &V> {
        self.writes.values()
    }

    pub(super) fn apply(self) {
        for (id, row) in self.writes {
            self.table.rows.insert(id, row);
        }
    }
}
