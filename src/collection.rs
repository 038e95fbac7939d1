//! Ordered, uniquely keyed mirror of one backend table.
//!
//! The front of the collection is the most recent row. Position is display
//! order only; the invariant that matters is one row per key.

use crate::{
    backend::changes::{ChangeEvent, ChangeKind},
    model::{Keyed, RecordId},
};
use std::collections::HashSet;

/// What applying an event did to the collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applied {
    Inserted,
    Replaced,
    Removed,
    Unchanged,
}

#[derive(Clone, Debug)]
pub struct Collection<T> {
    rows: Vec<T>,
    limit: Option<usize>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            limit: None,
        }
    }
}

impl<T: Keyed + Clone> Collection<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A collection that keeps at most `limit` rows, evicting from the tail.
    #[must_use]
    pub fn bounded(limit: usize) -> Self {
        Self {
            rows: Vec::new(),
            limit: Some(limit),
        }
    }

    /// Replaces every row with a fresh fetch. Later duplicates of a key are
    /// dropped so the first (newest) copy wins.
    pub fn reset(&mut self, rows: Vec<T>) {
        let mut seen = HashSet::new();
        self.rows = rows
            .into_iter()
            .filter(|row| seen.insert(row.key().clone()))
            .collect();
        self.enforce_limit();
    }

    /// Applies one change event.
    ///
    /// Insert of an existing key replaces it in place, so redelivered events
    /// are idempotent. Update of a missing key falls back to Insert. Delete
    /// of a missing key is a no-op. Events without a row for Insert/Update
    /// leave the collection untouched.
    pub fn apply(&mut self, event: ChangeEvent<T>) -> Applied {
        match event.kind {
            ChangeKind::Insert | ChangeKind::Update => match event.record {
                Some(record) => self.upsert(record),
                None => Applied::Unchanged,
            },
            ChangeKind::Delete => self.remove(&event.key),
        }
    }

    /// Replaces the row with the same key in place or prepends a new one.
    pub fn upsert(&mut self, record: T) -> Applied {
        if let Some(slot) = self.rows.iter_mut().find(|row| row.key() == record.key()) {
            *slot = record;
            return Applied::Replaced;
        }
        self.rows.insert(0, record);
        self.enforce_limit();
        Applied::Inserted
    }

    pub fn remove(&mut self, key: &RecordId) -> Applied {
        match self.rows.iter().position(|row| row.key() == key) {
            Some(index) => {
                self.rows.remove(index);
                Applied::Removed
            }
            None => Applied::Unchanged,
        }
    }

    #[must_use]
    pub fn get(&self, key: &RecordId) -> Option<&T> {
        self.rows.iter().find(|row| row.key() == key)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.rows.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    fn enforce_limit(&mut self) {
        if let Some(limit) = self.limit {
            self.rows.truncate(limit);
        }
    }
}

impl<'a, T> IntoIterator for &'a Collection<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
