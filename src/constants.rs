// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for nsbridge.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// DNS Protocol Constants
// ============================================================================

/// Standard DNS port for queries, notifies and zone transfers
pub const DNS_PORT: u16 = 53;

/// Largest UDP datagram accepted from a peer
pub const MAX_UDP_MESSAGE_SIZE: usize = 65_535;

/// TSIG fudge time in seconds (allows for clock skew)
pub const TSIG_FUDGE_TIME_SECS: u64 = 300;

/// NXT record type code (RFC 2535, obsolete but still a singleton)
pub const RR_TYPE_NXT: u16 = 30;

/// DNAME record type code (RFC 6672)
pub const RR_TYPE_DNAME: u16 = 39;

/// MAILB meta query type code
pub const RR_TYPE_MAILB: u16 = 253;

/// MAILA meta query type code
pub const RR_TYPE_MAILA: u16 = 254;

// ============================================================================
// Provider API Constants
// ============================================================================

/// Default timeout for a single provider HTTP request
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 30;

/// Change status reported by the provider while a change is propagating
pub const CHANGE_STATUS_PENDING: &str = "PENDING";

/// Prefix the provider puts in front of change identifiers
pub const CHANGE_ID_PREFIX: &str = "/change/";

/// Comment attached to every submitted change batch
pub const CHANGE_BATCH_COMMENT: &str = "nsbridge";

// ============================================================================
// Server Constants
// ============================================================================

/// Default number of workers reading from the shared socket
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// Number of worker threads for the Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

/// Default configuration file path
pub const DEFAULT_CONFIG_PATH: &str = "nsbridge.yaml";

// ============================================================================
// Pending Change Constants
// ============================================================================

/// Default capacity of the pending change queue
pub const DEFAULT_PENDING_QUEUE_CAPACITY: usize = 1000;

/// Default interval between change status polls (2 seconds)
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;

// ============================================================================
// Zone Transfer Constants
// ============================================================================

/// Timeout for connecting to a transfer master
pub const XFR_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Timeout for one transfer request, response stream included
pub const XFR_REQUEST_TIMEOUT_SECS: u64 = 60;

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Path for Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Path for the liveness endpoint
pub const HEALTH_SERVER_PATH: &str = "/healthz";
