// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Hosted DNS provider contract.
//!
//! The provider stores the authoritative zone data. nsbridge only ever reads
//! one record set at a time and writes ordered batches of whole-set
//! `CREATE`/`DELETE` changes; a `DELETE` must name the exact TTL and values
//! the provider holds.
//!
//! Implementations:
//! - [`http::HttpProvider`] - Route 53-shaped JSON API over HTTPS
//! - [`memory::MemoryProvider`] - in-process store with the same change
//!   semantics, used by tests

pub mod http;
pub mod memory;

use crate::constants::CHANGE_STATUS_PENDING;
use crate::dns_errors::ProviderError;
use hickory_proto::rr::RecordType;
use serde::{Deserialize, Serialize};

/// A record set as the provider stores it.
///
/// Values are presentation-format rdata strings; they are compared as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecordSet {
    /// Fully qualified owner name
    pub name: String,
    /// Record type
    pub record_type: RecordType,
    /// TTL in seconds
    pub ttl: u32,
    /// Record values, without duplicates
    pub values: Vec<String>,
}

/// Change action for one record set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeAction {
    Create,
    Delete,
}

impl ChangeAction {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a change batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub action: ChangeAction,
    pub rrset: ResourceRecordSet,
}

/// Status of a submitted change batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeInfo {
    /// Provider change identifier, without any `/change/` prefix
    pub id: String,
    /// Provider status string (`PENDING`, `INSYNC`, ...)
    pub status: String,
}

impl ChangeInfo {
    /// Whether the provider is still propagating the change.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status.eq_ignore_ascii_case(CHANGE_STATUS_PENDING)
    }
}

/// Operations nsbridge needs from a hosted DNS provider.
#[async_trait::async_trait]
pub trait DnsProvider: Send + Sync {
    /// Current record set for exactly (`name`, `record_type`), if any.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if the provider cannot be queried.
    async fn get_rrset(
        &self,
        zone_id: &str,
        name: &str,
        record_type: RecordType,
    ) -> Result<Option<ResourceRecordSet>, ProviderError>;

    /// Apply `changes` atomically, in order.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if the batch is rejected or the call fails.
    async fn submit(&self, zone_id: &str, changes: &[Change]) -> Result<ChangeInfo, ProviderError>;

    /// Current status of a previously submitted change.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if the provider cannot be queried.
    async fn change_status(&self, change_id: &str) -> Result<ChangeInfo, ProviderError>;
}

/// Compare two owner names the way DNS does: ASCII case-insensitive, with
/// the trailing dot optional and `\052` standing for `*`.
#[must_use]
pub fn same_owner(left: &str, right: &str) -> bool {
    fn canonical(name: &str) -> String {
        name.trim_end_matches('.')
            .replace("\\052", "*")
            .to_ascii_lowercase()
    }
    canonical(left) == canonical(right)
}
