// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory provider.
//!
//! Applies change batches with the same rules as the hosted API: a `DELETE`
//! must match the stored TTL and values exactly, a `CREATE` must not collide
//! with an existing set, and a batch either applies completely or not at all.
//! Every accepted batch is recorded so tests can assert on what was sent.

use super::{Change, ChangeAction, ChangeInfo, DnsProvider, ResourceRecordSet};
use crate::constants::CHANGE_STATUS_PENDING;
use crate::dns_errors::ProviderError;
use hickory_proto::rr::RecordType;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

const MEMORY_ENDPOINT: &str = "memory://provider";

type RecordKey = (String, String, RecordType);

/// Provider state kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    records: Mutex<HashMap<RecordKey, ResourceRecordSet>>,
    batches: Mutex<Vec<(String, Vec<Change>)>>,
    statuses: Mutex<HashMap<String, Vec<String>>>,
    reads: AtomicUsize,
    next_change: AtomicUsize,
    pending_on_submit: AtomicBool,
    fail_reads: AtomicBool,
}

fn record_key(zone_id: &str, name: &str, record_type: RecordType) -> RecordKey {
    (
        zone_id.to_string(),
        name.trim_end_matches('.').to_ascii_lowercase(),
        record_type,
    )
}

fn rejected(reason: String) -> ProviderError {
    ProviderError::UnexpectedHttpResponse {
        endpoint: MEMORY_ENDPOINT.to_string(),
        status_code: 400,
        reason,
    }
}

impl MemoryProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record set directly, bypassing batch rules.
    pub fn insert(&self, zone_id: &str, rrset: ResourceRecordSet) {
        if let Ok(mut records) = self.records.lock() {
            records.insert(record_key(zone_id, &rrset.name, rrset.record_type), rrset);
        }
    }

    /// Stored record set, read without counting as a provider read.
    #[must_use]
    pub fn rrset(
        &self,
        zone_id: &str,
        name: &str,
        record_type: RecordType,
    ) -> Option<ResourceRecordSet> {
        self.records
            .lock()
            .ok()
            .and_then(|records| records.get(&record_key(zone_id, name, record_type)).cloned())
    }

    /// Every accepted batch, oldest first.
    #[must_use]
    pub fn batches(&self) -> Vec<(String, Vec<Change>)> {
        self.batches.lock().map(|b| b.clone()).unwrap_or_default()
    }

    /// Number of `get_rrset` calls served.
    #[must_use]
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Report new changes as `PENDING` instead of `INSYNC`.
    pub fn set_pending_on_submit(&self, pending: bool) {
        self.pending_on_submit.store(pending, Ordering::SeqCst);
    }

    /// Make every `get_rrset` fail.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Script status answers for `change_id`, in order; the last one repeats.
    ///
    /// Unscripted changes keep reporting the status they were submitted with.
    pub fn script_status(&self, change_id: &str, statuses: &[&str]) {
        if let Ok(mut scripted) = self.statuses.lock() {
            scripted.insert(
                change_id.to_string(),
                statuses.iter().rev().map(|s| (*s).to_string()).collect(),
            );
        }
    }

    fn apply(
        records: &mut HashMap<RecordKey, ResourceRecordSet>,
        zone_id: &str,
        change: &Change,
    ) -> Result<(), ProviderError> {
        let key = record_key(zone_id, &change.rrset.name, change.rrset.record_type);
        match change.action {
            ChangeAction::Create => {
                if records.contains_key(&key) {
                    return Err(rejected(format!(
                        "Tried to create resource record set {} type {} but it already exists",
                        change.rrset.name, change.rrset.record_type
                    )));
                }
                records.insert(key, change.rrset.clone());
            }
            ChangeAction::Delete => {
                let matches = records.get(&key).is_some_and(|existing| {
                    existing.ttl == change.rrset.ttl
                        && existing.values.len() == change.rrset.values.len()
                        && change.rrset.values.iter().all(|v| existing.values.contains(v))
                });
                if !matches {
                    return Err(rejected(format!(
                        "Tried to delete resource record set {} type {} but the values provided do not match the current values",
                        change.rrset.name, change.rrset.record_type
                    )));
                }
                records.remove(&key);
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl DnsProvider for MemoryProvider {
    async fn get_rrset(
        &self,
        zone_id: &str,
        name: &str,
        record_type: RecordType,
    ) -> Result<Option<ResourceRecordSet>, ProviderError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(ProviderError::HttpConnectionFailed {
                endpoint: MEMORY_ENDPOINT.to_string(),
                reason: "reads disabled".to_string(),
            });
        }
        Ok(self.rrset(zone_id, name, record_type))
    }

    async fn submit(&self, zone_id: &str, changes: &[Change]) -> Result<ChangeInfo, ProviderError> {
        let mut records = self
            .records
            .lock()
            .map_err(|e| rejected(format!("store poisoned: {e}")))?;

        let mut staged = records.clone();
        for change in changes {
            Self::apply(&mut staged, zone_id, change)?;
        }
        *records = staged;
        drop(records);

        if let Ok(mut batches) = self.batches.lock() {
            batches.push((zone_id.to_string(), changes.to_vec()));
        }

        let id = format!("C{}", self.next_change.fetch_add(1, Ordering::SeqCst) + 1);
        let status = if self.pending_on_submit.load(Ordering::SeqCst) {
            CHANGE_STATUS_PENDING
        } else {
            "INSYNC"
        };
        if let Ok(mut statuses) = self.statuses.lock() {
            statuses
                .entry(id.clone())
                .or_insert_with(|| vec![status.to_string()]);
        }
        Ok(ChangeInfo {
            id,
            status: status.to_string(),
        })
    }

    async fn change_status(&self, change_id: &str) -> Result<ChangeInfo, ProviderError> {
        let mut statuses = self
            .statuses
            .lock()
            .map_err(|e| rejected(format!("store poisoned: {e}")))?;
        let Some(script) = statuses.get_mut(change_id) else {
            return Err(ProviderError::UnexpectedHttpResponse {
                endpoint: MEMORY_ENDPOINT.to_string(),
                status_code: 404,
                reason: format!("NoSuchChange: {change_id}"),
            });
        };
        let status = if script.len() > 1 {
            script.pop().unwrap_or_default()
        } else {
            script.last().cloned().unwrap_or_default()
        };
        Ok(ChangeInfo {
            id: change_id.to_string(),
            status,
        })
    }
}
