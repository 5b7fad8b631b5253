// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Dynamic update (RFC 2136) translation.
//!
//! The provider only accepts whole-set `CREATE` and `DELETE` changes, so a
//! single record addition or deletion becomes a read of the current set
//! followed by a `DELETE` of that set and a `CREATE` of the merged result.
//! Singleton types (SOA, CNAME, DNAME, NXT, NSEC) skip the read.
//!
//! Within one transaction each (name, type) is read at most once. The
//! translator keeps the set as it will look after the batch applies, so
//! later records see the effect of earlier ones: the `DELETE` entry always
//! names the set as read from the provider and the `CREATE` entry is
//! restated to the tracked set.
//!
//! The same primitives ([`UpdateTranslator::add`], [`UpdateTranslator::delete`],
//! [`UpdateTranslator::submit`]) replay IXFR increments.

use crate::batch::ChangeBatch;
use crate::context::{Context, ZoneContext};
use crate::dns_errors::UpdateError;
use crate::metrics::record_batch;
use crate::pending::PendingChanges;
use crate::provider::{ChangeAction, ChangeInfo, DnsProvider, ResourceRecordSet};
use crate::rrset::{is_meta_type, is_singleton, is_transfer_or_mailbox_type, rdata_to_text};
use hickory_proto::op::Message;
use hickory_proto::rr::{DNSClass, Name, Record, RecordType};
use std::collections::HashMap;
use tracing::{debug, info};

/// Input path a translator serves; used as a metrics label.
pub const PATH_UPDATE: &str = "update";

/// Input path label for IXFR increments.
pub const PATH_IXFR: &str = "ixfr";

#[derive(Debug, Clone, Default)]
struct TrackedSet {
    /// The set as the provider holds it
    original: Option<ResourceRecordSet>,
    /// The set as it will be once the batch applies
    working: Vec<String>,
    ttl: u32,
}

impl From<Option<ResourceRecordSet>> for TrackedSet {
    fn from(original: Option<ResourceRecordSet>) -> Self {
        let (working, ttl) = original
            .as_ref()
            .map(|rrset| (rrset.values.clone(), rrset.ttl))
            .unwrap_or_default();
        Self {
            original,
            working,
            ttl,
        }
    }
}

/// Accumulates one transaction's changes against one provider zone.
pub struct UpdateTranslator<'a> {
    provider: &'a dyn DnsProvider,
    pending: &'a PendingChanges,
    zone: ZoneContext,
    delete_ttl: Option<u32>,
    path: &'static str,
    batch: ChangeBatch,
    tracked: HashMap<(String, RecordType), TrackedSet>,
}

impl<'a> UpdateTranslator<'a> {
    #[must_use]
    pub fn new(
        provider: &'a dyn DnsProvider,
        pending: &'a PendingChanges,
        zone: ZoneContext,
        delete_ttl: Option<u32>,
        path: &'static str,
    ) -> Self {
        Self {
            provider,
            pending,
            zone,
            delete_ttl,
            path,
            batch: ChangeBatch::new(),
            tracked: HashMap::new(),
        }
    }

    #[must_use]
    pub fn zone(&self) -> &ZoneContext {
        &self.zone
    }

    /// Changes scheduled so far.
    #[must_use]
    pub fn batch(&self) -> &ChangeBatch {
        &self.batch
    }

    /// Take the tracked state for (`owner`, `record_type`) out of the
    /// overlay, reading the provider the first time it is touched.
    async fn take_tracked(
        &mut self,
        owner: &str,
        record_type: RecordType,
    ) -> Result<((String, RecordType), TrackedSet), UpdateError> {
        let key = (owner.to_ascii_lowercase(), record_type);
        if let Some(set) = self.tracked.remove(&key) {
            return Ok((key, set));
        }
        let original = self
            .provider
            .get_rrset(&self.zone.zone_id, owner, record_type)
            .await?;
        debug!(
            zone = %self.zone.zone,
            name = owner,
            record_type = %record_type,
            found = original.is_some(),
            "Read current record set"
        );
        Ok((key, TrackedSet::from(original)))
    }

    /// Schedule the addition of one record.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Provider`] if the current set cannot be read.
    pub async fn add(
        &mut self,
        name: &Name,
        record_type: RecordType,
        ttl: u32,
        value: String,
    ) -> Result<(), UpdateError> {
        let owner = name.to_string();
        if is_singleton(record_type) {
            self.batch
                .schedule(ChangeAction::Create, &owner, record_type, ttl, [value]);
            return Ok(());
        }

        let (key, mut set) = self.take_tracked(&owner, record_type).await?;
        if let Some(original) = &set.original {
            self.batch.schedule(
                ChangeAction::Delete,
                &owner,
                record_type,
                original.ttl,
                original.values.iter().cloned(),
            );
        }
        if !set.working.contains(&value) {
            set.working.push(value);
        }
        set.ttl = ttl;
        self.batch.restate(&owner, record_type, set.ttl, &set.working);
        self.tracked.insert(key, set);
        Ok(())
    }

    /// Schedule the deletion of one record.
    ///
    /// `ttl` is only used when there is no current set to take the TTL from.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Provider`] if the current set cannot be read.
    pub async fn delete(
        &mut self,
        name: &Name,
        record_type: RecordType,
        ttl: u32,
        value: String,
    ) -> Result<(), UpdateError> {
        let owner = name.to_string();
        if is_singleton(record_type) {
            self.batch
                .schedule(ChangeAction::Delete, &owner, record_type, ttl, [value]);
            return Ok(());
        }

        let (key, mut set) = self.take_tracked(&owner, record_type).await?;
        let touched = if let Some(original) = &set.original {
            self.batch.schedule(
                ChangeAction::Delete,
                &owner,
                record_type,
                original.ttl,
                original.values.iter().cloned(),
            );
            true
        } else if set.working.contains(&value) {
            true
        } else {
            // nothing known about this value; the provider may reject it
            self.batch
                .schedule(ChangeAction::Delete, &owner, record_type, ttl, [value.clone()]);
            false
        };

        if touched {
            set.working.retain(|v| v != &value);
            if set.working.is_empty() {
                self.batch
                    .withdraw(ChangeAction::Create, &owner, record_type);
            } else {
                self.batch.restate(&owner, record_type, set.ttl, &set.working);
            }
        }
        self.tracked.insert(key, set);
        Ok(())
    }

    /// TTL of the live record set, or the configured fallback.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::ServFail`] when neither is available and
    /// [`UpdateError::Provider`] if the read fails.
    pub async fn live_ttl(&mut self, name: &Name, record_type: RecordType) -> Result<u32, UpdateError> {
        let owner = name.to_string();
        let (key, set) = self.take_tracked(&owner, record_type).await?;
        let live = set.original.as_ref().map(|original| original.ttl);
        self.tracked.insert(key, set);

        live.or(self.delete_ttl).ok_or_else(|| {
            UpdateError::ServFail(format!(
                "no TTL available to delete {owner} {record_type}: no live record set and no delete_ttl configured"
            ))
        })
    }

    /// Submit the accumulated batch and start a new transaction.
    ///
    /// The batch and the read overlay are cleared whatever the outcome. An
    /// empty batch is not sent. In dry-run mode the batch is logged only.
    /// A change the provider reports as pending is handed to the pending
    /// change queue.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Provider`] if the provider rejects the batch.
    pub async fn submit(&mut self) -> Result<Option<ChangeInfo>, UpdateError> {
        let changes = self.batch.changes();
        self.batch.clear();
        self.tracked.clear();

        if changes.is_empty() {
            debug!(zone = %self.zone.zone, "Empty change batch, nothing to submit");
            return Ok(None);
        }

        if self.zone.dry_run {
            for change in &changes {
                info!(
                    zone = %self.zone.zone,
                    action = %change.action,
                    name = %change.rrset.name,
                    record_type = %change.rrset.record_type,
                    ttl = change.rrset.ttl,
                    values = ?change.rrset.values,
                    "Dry run, not submitting change"
                );
            }
            record_batch(self.path, "dry_run");
            return Ok(None);
        }

        let info = match self.provider.submit(&self.zone.zone_id, &changes).await {
            Ok(info) => info,
            Err(e) => {
                record_batch(self.path, "error");
                return Err(e.into());
            }
        };
        record_batch(self.path, "submitted");
        info!(
            zone = %self.zone.zone,
            zone_id = %self.zone.zone_id,
            changes = changes.len(),
            change_id = %info.id,
            status = %info.status,
            "Submitted change batch"
        );

        if info.is_pending() {
            self.pending.offer(info.id.clone());
        }
        Ok(Some(info))
    }

    /// Translate one update-section record.
    ///
    /// # Errors
    ///
    /// Returns the [`UpdateError`] that aborts the transaction.
    pub async fn apply_update_record(&mut self, record: &Record) -> Result<(), UpdateError> {
        let name = record.name();
        let record_type = record.record_type();
        if !self.zone.zone.zone_of(name) {
            return Err(UpdateError::NotZone {
                name: name.to_string(),
                zone: self.zone.zone.to_string(),
            });
        }

        match record.dns_class() {
            DNSClass::IN => {
                if is_meta_type(record_type) {
                    return Err(UpdateError::FormErr(format!(
                        "cannot add records of type {record_type}"
                    )));
                }
                let Some(rdata) = record.data() else {
                    return Err(UpdateError::FormErr(format!(
                        "addition of {name} {record_type} carries no data"
                    )));
                };
                self.add(name, record_type, record.ttl(), rdata_to_text(rdata))
                    .await
            }
            DNSClass::ANY => {
                if record.ttl() != 0 || is_transfer_or_mailbox_type(record_type) {
                    return Err(UpdateError::FormErr(format!(
                        "illegal class ANY record {name} {record_type} ttl {}",
                        record.ttl()
                    )));
                }
                Err(UpdateError::Refused(format!(
                    "deleting {name} {record_type} as a whole is not supported"
                )))
            }
            DNSClass::NONE => {
                if record.ttl() != 0 || is_meta_type(record_type) {
                    return Err(UpdateError::FormErr(format!(
                        "illegal class NONE record {name} {record_type} ttl {}",
                        record.ttl()
                    )));
                }
                let Some(rdata) = record.data() else {
                    return Err(UpdateError::FormErr(format!(
                        "deletion of {name} {record_type} carries no data"
                    )));
                };
                let ttl = self.live_ttl(name, record_type).await?;
                self.delete(name, record_type, ttl, rdata_to_text(rdata))
                    .await
            }
            other => Err(UpdateError::FormErr(format!(
                "record {name} {record_type} has unsupported class {other}"
            ))),
        }
    }
}

/// Handle one UPDATE message end to end.
///
/// Returns the number of changes submitted (zero for an empty update or a
/// dry run).
///
/// # Errors
///
/// Returns the [`UpdateError`] whose response code answers the request.
pub async fn process_update(ctx: &Context, message: &Message) -> Result<usize, UpdateError> {
    let [question] = message.queries() else {
        return Err(UpdateError::FormErr(format!(
            "zone section must hold exactly one entry, found {}",
            message.queries().len()
        )));
    };
    if question.query_type() != RecordType::SOA || question.query_class() != DNSClass::IN {
        return Err(UpdateError::FormErr(format!(
            "zone section must be class IN type SOA, found {} {}",
            question.query_class(),
            question.query_type()
        )));
    }
    if !message.answers().is_empty() {
        return Err(UpdateError::ServFail(format!(
            "{} prerequisite records present, prerequisites are not supported",
            message.answers().len()
        )));
    }

    let zone = question.name();
    let Some(zone_context) = ctx.zone_context(zone) else {
        return Err(UpdateError::NotAuth(format!("zone {zone} is not hosted here")));
    };
    if message.name_servers().is_empty() {
        debug!(zone = %zone, "Update carries no changes");
        return Ok(0);
    }

    let mut translator = UpdateTranslator::new(
        ctx.provider.as_ref(),
        &ctx.pending,
        zone_context,
        ctx.config.delete_ttl,
        PATH_UPDATE,
    );
    for record in message.name_servers() {
        translator.apply_update_record(record).await?;
    }
    let scheduled = translator.batch().len();
    let submitted = translator.submit().await?;
    Ok(submitted.map_or(0, |_| scheduled))
}

#[cfg(test)]
#[path = "update_tests.rs"]
mod update_tests;
