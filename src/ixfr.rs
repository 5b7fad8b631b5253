// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Incremental zone transfer replay.
//!
//! An IXFR answer (RFC 1995) is a flat record stream:
//!
//! ```text
//! SOA(new)  SOA(s0) deletions... SOA(s1) additions...  SOA(s1) deletions... SOA(s2) additions...  SOA(new)
//! ```
//!
//! Every SOA after the first is a marker. Odd markers open a deletion step,
//! even markers open an addition step, and the marker itself is applied in
//! the mode it opens. An increment ends at the next deletion marker; its
//! changes are submitted to the provider as one batch. The deletion marker
//! carrying the master's serial terminates the transfer.
//!
//! Increments already submitted stay applied if the transfer fails later.

use crate::context::{Context, ZoneContext};
use crate::dns_errors::ZoneTransferError;
use crate::metrics::record_transfer;
use crate::provider::DnsProvider;
use crate::rrset::{rdata_to_text, soa_serial};
use crate::update::{UpdateTranslator, PATH_IXFR};
use crate::xfr::{IxfrClient, XfrSource};
use hickory_proto::rr::{Name, RData, Record, RecordType};
use tracing::{debug, error, info, warn};

/// How a transfer ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IxfrOutcome {
    /// The master answered with a single SOA: either the zone is current or
    /// the master cannot serve increments. Nothing was applied.
    AxfrFallback { serial: u32 },
    /// Every increment up to `to_serial` was submitted.
    Applied {
        from_serial: u32,
        to_serial: u32,
        increments: usize,
        records: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Delete,
    Add,
}

/// State of one transfer replay.
pub struct IxfrSession<'a> {
    translator: UpdateTranslator<'a>,
    local_serial: u32,
    remote_serial: u32,
    tracked_serial: u32,
    markers: usize,
    mode: Mode,
    records: usize,
    increments: usize,
    finished: bool,
}

fn soa_of(record: &Record) -> Option<u32> {
    match record.data() {
        Some(RData::SOA(soa)) if record.record_type() == RecordType::SOA => Some(soa.serial()),
        _ => None,
    }
}

impl<'a> IxfrSession<'a> {
    #[must_use]
    pub fn new(translator: UpdateTranslator<'a>, local_serial: u32) -> Self {
        Self {
            translator,
            local_serial,
            remote_serial: 0,
            tracked_serial: local_serial,
            markers: 0,
            mode: Mode::Delete,
            records: 0,
            increments: 0,
            finished: false,
        }
    }

    fn zone(&self) -> String {
        self.translator.zone().zone.to_string()
    }

    fn protocol(&self, reason: String) -> ZoneTransferError {
        ZoneTransferError::Protocol {
            zone: self.zone(),
            record: self.records,
            reason,
        }
    }

    async fn apply(&mut self, record: &Record) -> Result<(), ZoneTransferError> {
        let name = record.name();
        if !self.translator.zone().zone.zone_of(name) {
            return Err(self.protocol(format!("{name} is outside the zone")));
        }
        let Some(rdata) = record.data() else {
            return Err(self.protocol(format!(
                "{name} {} carries no data",
                record.record_type()
            )));
        };
        let value = rdata_to_text(rdata);
        match self.mode {
            Mode::Delete => {
                self.translator
                    .delete(name, record.record_type(), record.ttl(), value)
                    .await?;
            }
            Mode::Add => {
                self.translator
                    .add(name, record.record_type(), record.ttl(), value)
                    .await?;
            }
        }
        Ok(())
    }

    async fn submit_increment(&mut self, next_serial: u32) -> Result<(), ZoneTransferError> {
        let info = self.translator.submit().await?;
        self.increments += 1;
        info!(
            zone = %self.zone(),
            from_serial = self.tracked_serial,
            to_serial = next_serial,
            change_id = info.as_ref().map_or("-", |i| i.id.as_str()),
            "Applied IXFR increment"
        );
        self.tracked_serial = next_serial;
        Ok(())
    }

    /// Feed the next record of the stream.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneTransferError::Protocol`] if the stream layout is
    /// violated, or the error of a failed read or submit.
    pub async fn step(&mut self, record: &Record) -> Result<(), ZoneTransferError> {
        self.records += 1;
        if self.finished {
            warn!(
                zone = %self.zone(),
                record = self.records,
                name = %record.name(),
                record_type = %record.record_type(),
                "Ignoring record after the terminating SOA"
            );
            return Ok(());
        }

        let serial = soa_of(record);
        match self.records {
            1 => {
                let Some(serial) = serial else {
                    return Err(self.protocol("first record is not an SOA".to_string()));
                };
                self.remote_serial = serial;
                Ok(())
            }
            2 => {
                let Some(serial) = serial else {
                    return Err(self.protocol("second record is not an SOA".to_string()));
                };
                if serial != self.local_serial {
                    return Err(self.protocol(format!(
                        "transfer starts at serial {serial}, local serial is {}",
                        self.local_serial
                    )));
                }
                self.markers = 1;
                self.mode = Mode::Delete;
                self.apply(record).await
            }
            _ => {
                let Some(serial) = serial else {
                    return self.apply(record).await;
                };
                self.markers += 1;
                if self.markers % 2 == 0 {
                    self.mode = Mode::Add;
                    return self.apply(record).await;
                }

                if serial != self.tracked_serial {
                    self.submit_increment(serial).await?;
                }
                if serial == self.remote_serial {
                    self.finished = true;
                    return Ok(());
                }
                self.mode = Mode::Delete;
                self.apply(record).await
            }
        }
    }

    /// Replay every message `source` yields until the terminating SOA.
    ///
    /// A stream that ends after its first record, however the master split
    /// its messages, is an AXFR fallback.
    ///
    /// # Errors
    ///
    /// Returns the first transport, TSIG, protocol or provider error; a
    /// stream that ends early is [`ZoneTransferError::Incomplete`].
    pub async fn run(mut self, source: &mut dyn XfrSource) -> Result<IxfrOutcome, ZoneTransferError> {
        while !self.finished {
            let message = match source.next_message().await {
                Ok(Some(records)) => records,
                Ok(None) if self.records == 1 => return Ok(self.fallback()),
                Ok(None) => return Err(self.incomplete()),
                Err(e) if self.records == 1 => {
                    debug!(zone = %self.zone(), error = %e, "Transfer stream ended after a single SOA");
                    return Ok(self.fallback());
                }
                Err(e) => return Err(e),
            };
            for record in &message {
                self.step(record).await?;
            }
        }

        Ok(IxfrOutcome::Applied {
            from_serial: self.local_serial,
            to_serial: self.remote_serial,
            increments: self.increments,
            records: self.records,
        })
    }

    fn fallback(&self) -> IxfrOutcome {
        info!(
            zone = %self.zone(),
            local_serial = self.local_serial,
            remote_serial = self.remote_serial,
            "Master answered with a single SOA (zone current or AXFR fallback), nothing applied"
        );
        IxfrOutcome::AxfrFallback {
            serial: self.remote_serial,
        }
    }

    fn incomplete(&self) -> ZoneTransferError {
        ZoneTransferError::Incomplete {
            zone: self.zone(),
            records: self.records,
            remote_serial: self.remote_serial,
        }
    }
}

/// Serial of the zone's apex SOA as the provider holds it.
///
/// # Errors
///
/// Returns [`ZoneTransferError::LocalSerial`] if there is no parseable SOA
/// and [`ZoneTransferError::Provider`] if the read fails.
pub async fn local_serial(
    provider: &dyn DnsProvider,
    zone: &ZoneContext,
) -> Result<u32, ZoneTransferError> {
    let apex = zone.zone.to_string();
    let Some(soa) = provider
        .get_rrset(&zone.zone_id, &apex, RecordType::SOA)
        .await?
    else {
        return Err(ZoneTransferError::LocalSerial {
            zone: apex,
            reason: "no SOA record set at the apex".to_string(),
        });
    };

    soa.values
        .first()
        .and_then(|value| soa_serial(value))
        .ok_or_else(|| ZoneTransferError::LocalSerial {
            zone: apex,
            reason: format!("unparseable SOA value {:?}", soa.values),
        })
}

/// Pull and replay an incremental transfer of `zone` from its master.
///
/// # Errors
///
/// Returns [`ZoneTransferError`] when the zone is not configured for
/// transfers or the transfer fails.
pub async fn transfer(ctx: &Context, zone: &Name) -> Result<IxfrOutcome, ZoneTransferError> {
    let Some(zone_context) = ctx.zone_context(zone) else {
        return Err(ZoneTransferError::NoHostedZone {
            zone: zone.to_string(),
        });
    };
    let Some(master) = ctx.master(zone) else {
        return Err(ZoneTransferError::NoMaster {
            zone: zone.to_string(),
        });
    };

    let serial = local_serial(ctx.provider.as_ref(), &zone_context).await?;
    let signer = ctx.keys.get(master.ip()).cloned();
    debug!(
        zone = %zone,
        master = %master,
        local_serial = serial,
        "Starting IXFR"
    );

    let mut client = IxfrClient::connect(zone.clone(), master, serial, signer).await?;
    let translator = UpdateTranslator::new(
        ctx.provider.as_ref(),
        &ctx.pending,
        zone_context,
        ctx.config.delete_ttl,
        PATH_IXFR,
    );
    IxfrSession::new(translator, serial).run(&mut client).await
}

/// Run [`transfer`], logging and counting the outcome.
pub async fn run_transfer(ctx: &Context, zone: &Name) {
    match transfer(ctx, zone).await {
        Ok(IxfrOutcome::AxfrFallback { serial }) => {
            record_transfer("axfr_fallback");
            debug!(zone = %zone, serial = serial, "IXFR finished without changes");
        }
        Ok(IxfrOutcome::Applied {
            from_serial,
            to_serial,
            increments,
            records,
        }) => {
            record_transfer("applied");
            info!(
                zone = %zone,
                from_serial = from_serial,
                to_serial = to_serial,
                increments = increments,
                records = records,
                "IXFR complete"
            );
        }
        Err(e) => {
            record_transfer(e.kind());
            error!(zone = %zone, error = %e, "IXFR failed");
        }
    }
}

#[cfg(test)]
#[path = "ixfr_tests.rs"]
mod ixfr_tests;
