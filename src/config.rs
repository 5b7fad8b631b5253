// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Configuration file loading and validation.
//!
//! The configuration is a YAML document. Zone tables (`hosted_zones`,
//! `masters`) are keyed by zone name; keys are normalized at load time so
//! lookups are case-insensitive and tolerate a missing or extra trailing dot.

use crate::constants::{
    DEFAULT_PENDING_QUEUE_CAPACITY, DEFAULT_POLL_INTERVAL_SECS, DEFAULT_PROVIDER_TIMEOUT_SECS,
    DEFAULT_WORKER_COUNT, DNS_PORT,
};
use crate::dns_errors::ConfigError;
use crate::tsig::{KeyTable, TsigKeyData};
use hickory_proto::rr::Name;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Listener and worker settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Provider API settings.
    pub provider: ProviderConfig,

    /// Pending change queue settings.
    #[serde(default)]
    pub pending: PendingConfig,

    /// TTL used for specific-record deletions when the provider holds no
    /// record set to take the live TTL from.
    #[serde(default)]
    pub delete_ttl: Option<u32>,

    /// Zone name to provider zone identifier.
    #[serde(default)]
    pub hosted_zones: HashMap<String, String>,

    /// Zone name to transfer master (`ip` or `ip:port`).
    #[serde(default)]
    pub masters: HashMap<String, String>,

    /// Peer IP address to TSIG key.
    #[serde(default)]
    pub tsig: HashMap<String, TsigKeyData>,
}

/// UDP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// UDP listen address (default: 0.0.0.0:53).
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// Number of workers sharing the socket.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Log change batches instead of submitting them.
    #[serde(default)]
    pub dry_run: bool,

    /// Address for the Prometheus endpoint; disabled when absent.
    #[serde(default)]
    pub metrics_listen: Option<SocketAddr>,
}

/// Provider API connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the provider API.
    pub endpoint: String,

    /// Bearer token sent with every request.
    #[serde(default)]
    pub token: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
}

/// Pending change tracking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingConfig {
    /// Queue capacity; change IDs beyond it are dropped.
    #[serde(default = "default_pending_capacity")]
    pub capacity: usize,

    /// Seconds between status polls.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            workers: default_workers(),
            dry_run: false,
            metrics_listen: None,
        }
    }
}

impl Default for PendingConfig {
    fn default() -> Self {
        Self {
            capacity: default_pending_capacity(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

impl PendingConfig {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Config {
    /// Load, normalize and validate a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, or if
    /// any value fails validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&content, &path.display().to_string())
    }

    /// Parse, normalize and validate configuration from a YAML string.
    ///
    /// `origin` names the source in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if parsing or validation fails.
    pub fn from_yaml(content: &str, origin: &str) -> Result<Self, ConfigError> {
        let mut config: Self =
            serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
                path: origin.to_string(),
                source,
            })?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    fn normalize(&mut self) {
        self.hosted_zones = std::mem::take(&mut self.hosted_zones)
            .into_iter()
            .map(|(zone, id)| (normalize_zone_name(&zone), id.trim().to_string()))
            .collect();
        self.masters = std::mem::take(&mut self.masters)
            .into_iter()
            .map(|(zone, master)| (normalize_zone_name(&zone), master.trim().to_string()))
            .collect();
    }

    /// Check value ranges and formats.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.workers == 0 {
            return Err(invalid("server.workers", "must be at least 1"));
        }
        if self.pending.capacity == 0 {
            return Err(invalid("pending.capacity", "must be at least 1"));
        }
        if self.pending.poll_interval_secs == 0 {
            return Err(invalid("pending.poll_interval_secs", "must be at least 1"));
        }
        url::Url::parse(&self.provider.endpoint)
            .map_err(|e| invalid("provider.endpoint", &format!("not a valid URL: {e}")))?;

        for (zone, id) in &self.hosted_zones {
            if id.is_empty() {
                return Err(invalid(
                    &format!("hosted_zones.{zone}"),
                    "zone identifier is empty",
                ));
            }
        }
        for (zone, master) in &self.masters {
            parse_master_address(master)
                .map_err(|reason| invalid(&format!("masters.{zone}"), &reason))?;
        }

        KeyTable::from_config(&self.tsig)?;
        Ok(())
    }

    /// Provider zone identifier for `zone`.
    #[must_use]
    pub fn hosted_zone_id(&self, zone: &Name) -> Option<&str> {
        self.hosted_zones
            .get(&normalize_zone_name(&zone.to_string()))
            .map(String::as_str)
    }

    /// Transfer master for `zone`.
    #[must_use]
    pub fn master(&self, zone: &Name) -> Option<SocketAddr> {
        self.masters
            .get(&normalize_zone_name(&zone.to_string()))
            .and_then(|master| parse_master_address(master).ok())
    }
}

/// Lowercase a zone name and strip its trailing dot.
#[must_use]
pub fn normalize_zone_name(name: &str) -> String {
    name.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// Parse `ip`, `ip:port` or `[v6]:port`; the port defaults to 53.
///
/// # Errors
///
/// Returns a description of the problem when the address does not parse.
pub fn parse_master_address(value: &str) -> Result<SocketAddr, String> {
    if let Ok(addr) = value.parse::<SocketAddr>() {
        return Ok(addr);
    }
    value
        .parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, DNS_PORT))
        .map_err(|e| format!("'{value}' is not an address: {e}"))
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

// Default value functions for serde.
fn default_listen() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DNS_PORT)
}

const fn default_workers() -> usize {
    DEFAULT_WORKER_COUNT
}

const fn default_provider_timeout() -> u64 {
    DEFAULT_PROVIDER_TIMEOUT_SECS
}

const fn default_pending_capacity() -> usize {
    DEFAULT_PENDING_QUEUE_CAPACITY
}

const fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
