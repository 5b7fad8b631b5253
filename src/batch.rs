// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Per-transaction change accumulator.
//!
//! A [`ChangeBatch`] holds at most one entry per (lowercased owner name,
//! record type, action). Scheduling the same key again merges the values
//! into the existing entry. Entries are submitted in the order they were
//! first scheduled.

use crate::provider::{Change, ChangeAction, ResourceRecordSet};
use hickory_proto::rr::RecordType;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BatchKey {
    name: String,
    record_type: RecordType,
    action: ChangeAction,
}

impl BatchKey {
    fn new(name: &str, record_type: RecordType, action: ChangeAction) -> Self {
        Self {
            name: name.to_ascii_lowercase(),
            record_type,
            action,
        }
    }
}

#[derive(Debug, Clone)]
struct BatchEntry {
    key: BatchKey,
    name: String,
    ttl: u32,
    values: Vec<String>,
}

/// Ordered, deduplicated set of record set changes.
#[derive(Debug, Clone, Default)]
pub struct ChangeBatch {
    entries: Vec<BatchEntry>,
    index: HashMap<BatchKey, usize>,
}

impl ChangeBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Add `values` to the entry for (`name`, `record_type`, `action`).
    ///
    /// A new entry takes `ttl`; an existing entry keeps its TTL and gains any
    /// values it does not already hold.
    pub fn schedule<I>(
        &mut self,
        action: ChangeAction,
        name: &str,
        record_type: RecordType,
        ttl: u32,
        values: I,
    ) where
        I: IntoIterator<Item = String>,
    {
        let key = BatchKey::new(name, record_type, action);
        let position = match self.index.get(&key) {
            Some(&position) => position,
            None => {
                self.entries.push(BatchEntry {
                    key: key.clone(),
                    name: name.to_string(),
                    ttl,
                    values: Vec::new(),
                });
                let position = self.entries.len() - 1;
                self.index.insert(key, position);
                position
            }
        };

        let entry = &mut self.entries[position];
        for value in values {
            if !entry.values.contains(&value) {
                entry.values.push(value);
            }
        }
    }

    /// Replace the TTL and values of the `CREATE` entry for (`name`,
    /// `record_type`), creating it at the end of the batch if absent.
    pub fn restate(&mut self, name: &str, record_type: RecordType, ttl: u32, values: &[String]) {
        let key = BatchKey::new(name, record_type, ChangeAction::Create);
        if let Some(&position) = self.index.get(&key) {
            let entry = &mut self.entries[position];
            entry.ttl = ttl;
            entry.values.clear();
        }
        self.schedule(
            ChangeAction::Create,
            name,
            record_type,
            ttl,
            values.iter().cloned(),
        );
    }

    /// Remove the entry for (`name`, `record_type`, `action`), if any.
    pub fn withdraw(&mut self, action: ChangeAction, name: &str, record_type: RecordType) {
        let key = BatchKey::new(name, record_type, action);
        if let Some(position) = self.index.remove(&key) {
            self.entries.remove(position);
            for (offset, entry) in self.entries.iter().enumerate().skip(position) {
                self.index.insert(entry.key.clone(), offset);
            }
        }
    }

    /// Changes in submission order.
    #[must_use]
    pub fn changes(&self) -> Vec<Change> {
        self.entries
            .iter()
            .map(|entry| Change {
                action: entry.key.action,
                rrset: ResourceRecordSet {
                    name: entry.name.clone(),
                    record_type: entry.key.record_type,
                    ttl: entry.ttl,
                    values: entry.values.clone(),
                },
            })
            .collect()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }
}

#[cfg(test)]
#[path = "batch_tests.rs"]
mod batch_tests;
