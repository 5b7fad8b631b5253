// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for all request workers.
//!
//! Every worker receives an `Arc<Context>` that contains:
//! - The validated configuration (zone tables, delete TTL, dry-run flag)
//! - The provider client
//! - The per-peer TSIG key table
//! - The producer side of the pending change queue
//!
//! Nothing in the context is mutated after startup.

use crate::config::Config;
use crate::pending::PendingChanges;
use crate::provider::DnsProvider;
use crate::tsig::KeyTable;
use hickory_proto::rr::Name;
use std::net::SocketAddr;
use std::sync::Arc;

/// Shared context passed to all workers.
#[derive(Clone)]
pub struct Context {
    /// Validated configuration
    pub config: Arc<Config>,

    /// Hosted DNS provider
    pub provider: Arc<dyn DnsProvider>,

    /// TSIG keys by peer address
    pub keys: KeyTable,

    /// Producer handle for change status tracking
    pub pending: PendingChanges,
}

/// Zone an update or transfer is applied to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneContext {
    /// Zone apex
    pub zone: Name,
    /// Provider zone identifier
    pub zone_id: String,
    /// Log batches instead of submitting them
    pub dry_run: bool,
}

impl Context {
    #[must_use]
    pub fn new(
        config: Config,
        provider: Arc<dyn DnsProvider>,
        keys: KeyTable,
        pending: PendingChanges,
    ) -> Self {
        Self {
            config: Arc::new(config),
            provider,
            keys,
            pending,
        }
    }

    /// Resolve the provider zone for `zone`, if it is hosted here.
    #[must_use]
    pub fn zone_context(&self, zone: &Name) -> Option<ZoneContext> {
        self.config.hosted_zone_id(zone).map(|zone_id| ZoneContext {
            zone: zone.clone(),
            zone_id: zone_id.to_string(),
            dry_run: self.config.server.dry_run,
        })
    }

    /// Transfer master for `zone`, if configured.
    #[must_use]
    pub fn master(&self, zone: &Name) -> Option<SocketAddr> {
        self.config.master(zone)
    }
}
