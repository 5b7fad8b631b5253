// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for nsbridge.
//!
//! This module provides specialized error types for:
//! - Provider HTTP API operations (record set reads, change batches, change status)
//! - Dynamic update translation (each variant maps to a DNS response code)
//! - TSIG authentication failures
//! - Incremental zone transfers from a master
//! - Configuration loading
//!
//! Errors scoped to one request or one transfer never stop the serving loop;
//! only [`ConfigError`] is fatal, and only at startup.

use hickory_proto::op::ResponseCode;
use thiserror::Error;

/// Errors that can occur while talking to the hosted DNS provider API.
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    /// HTTP connection failed (network unreachable, connection refused)
    #[error("HTTP connection to {endpoint} failed: {reason}")]
    HttpConnectionFailed {
        /// The URL that couldn't be reached
        endpoint: String,
        /// Reason for the connection failure
        reason: String,
    },

    /// HTTP request timeout
    #[error("HTTP request to {endpoint} timed out after {timeout_ms}ms")]
    HttpRequestTimeout {
        /// The URL that timed out
        endpoint: String,
        /// Timeout duration in milliseconds
        timeout_ms: u64,
    },

    /// The provider answered with a non-success HTTP status
    ///
    /// A rejected change batch (for example deleting a record set whose values
    /// don't match) surfaces here with the provider's error body as the reason.
    #[error("Unexpected HTTP response from {endpoint}: {status_code} {reason}")]
    UnexpectedHttpResponse {
        /// The URL that returned the unexpected response
        endpoint: String,
        /// HTTP status code
        status_code: u16,
        /// Response body or error message
        reason: String,
    },

    /// The provider answered 2xx but the body could not be understood
    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponse {
        /// The URL that returned the body
        endpoint: String,
        /// What was wrong with it
        reason: String,
    },

    /// A record set the provider returned could not be interpreted
    #[error("Invalid record data for '{name}' ({record_type}): {reason}")]
    InvalidRecordData {
        /// Owner name of the record set
        name: String,
        /// Record type of the record set
        record_type: String,
        /// Explanation of what is invalid
        reason: String,
    },
}

impl ProviderError {
    /// Short label used for metrics and log fields.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::HttpConnectionFailed { .. } => "connection",
            Self::HttpRequestTimeout { .. } => "timeout",
            Self::UnexpectedHttpResponse { .. } => "http_status",
            Self::InvalidResponse { .. } => "invalid_response",
            Self::InvalidRecordData { .. } => "invalid_record",
        }
    }
}

/// Errors related to TSIG (Transaction Signature) authentication.
#[derive(Error, Debug, Clone)]
pub enum TsigError {
    /// The message was signed with a key that is not configured for the peer
    #[error("TSIG key '{key_name}' from {peer} is not known")]
    UnknownKey {
        /// The peer address
        peer: String,
        /// The key name found in the TSIG record
        key_name: String,
    },

    /// The MAC did not verify
    #[error("TSIG verification failed for {peer} with key '{key_name}': {reason}")]
    BadSignature {
        /// The peer address
        peer: String,
        /// The TSIG key name that was used
        key_name: String,
        /// Reason reported by the verifier
        reason: String,
    },

    /// The signature time is outside the fudge window
    #[error("TSIG time from {peer} out of range: signed at {signed_at}, now {now}")]
    BadTime {
        /// The peer address
        peer: String,
        /// Time the peer claims it signed the message
        signed_at: u64,
        /// Local time
        now: u64,
    },

    /// A key is configured for the peer but the message carried no TSIG record
    #[error("No TSIG record from {peer}, but a key is configured")]
    MissingSignature {
        /// The peer address
        peer: String,
    },

    /// Invalid TSIG key data in the configuration
    #[error("Invalid TSIG key data for '{key_name}': {reason}")]
    InvalidTsigKeyData {
        /// The key name (or peer address) of the bad entry
        key_name: String,
        /// Explanation of what is invalid
        reason: String,
    },

    /// Signing an outgoing message failed
    #[error("TSIG signing with key '{key_name}' failed: {reason}")]
    SigningFailed {
        /// The key used for signing
        key_name: String,
        /// Reason reported by the signer
        reason: String,
    },
}

/// Errors produced while translating one dynamic update transaction.
///
/// Every variant maps onto exactly one DNS response code; see
/// [`UpdateError::response_code`].
#[derive(Error, Debug, Clone)]
pub enum UpdateError {
    /// Malformed update: bad question, illegal class/type/TTL combination
    #[error("malformed update: {0}")]
    FormErr(String),

    /// Record owner name outside the update zone
    #[error("name '{name}' is not within zone '{zone}'")]
    NotZone {
        /// Offending owner name
        name: String,
        /// The zone from the question section
        zone: String,
    },

    /// Well-formed request for something this server does not do
    #[error("unsupported update: {0}")]
    Refused(String),

    /// Zone is not served here
    #[error("not authoritative: {0}")]
    NotAuth(String),

    /// Server-side failure: prerequisites, missing TTL, unusable provider data
    #[error("server failure: {0}")]
    ServFail(String),

    /// Provider API call failed
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl UpdateError {
    /// DNS response code returned to the update client.
    #[must_use]
    pub fn response_code(&self) -> ResponseCode {
        match self {
            Self::FormErr(_) => ResponseCode::FormErr,
            Self::NotZone { .. } => ResponseCode::NotZone,
            Self::Refused(_) => ResponseCode::Refused,
            Self::NotAuth(_) => ResponseCode::NotAuth,
            Self::ServFail(_) | Self::Provider(_) => ResponseCode::ServFail,
        }
    }
}

/// Errors related to incremental zone transfer operations.
///
/// Transfers are not request/response exchanges with the notifier, so these
/// errors are only ever logged; the next NOTIFY is the retry path.
#[derive(Error, Debug, Clone)]
pub enum ZoneTransferError {
    /// No provider zone ID configured for the zone
    #[error("no hosted zone configured for '{zone}'")]
    NoHostedZone {
        /// The notified zone
        zone: String,
    },

    /// No transfer master configured for the zone
    #[error("no master configured for '{zone}'")]
    NoMaster {
        /// The notified zone
        zone: String,
    },

    /// The provider holds no usable SOA for the zone
    #[error("cannot determine local serial for '{zone}': {reason}")]
    LocalSerial {
        /// The zone
        zone: String,
        /// Why the serial is unavailable
        reason: String,
    },

    /// Connection or transfer stream failed, TSIG verification included
    #[error("Zone transfer for '{zone}' from {master} failed: {reason}")]
    TransferFailed {
        /// The zone being transferred
        zone: String,
        /// The master address
        master: String,
        /// Reason for the transfer failure
        reason: String,
    },

    /// Master answered with an error rcode
    #[error("Zone transfer for '{zone}' refused by {master}: {rcode}")]
    TransferRefused {
        /// The zone being transferred
        zone: String,
        /// The master that refused
        master: String,
        /// Response code from the master
        rcode: String,
    },

    /// The record stream violates the IXFR layout
    #[error("IXFR protocol error for '{zone}' at record {record}: {reason}")]
    Protocol {
        /// The zone being transferred
        zone: String,
        /// 1-based record number in the stream
        record: usize,
        /// What was wrong
        reason: String,
    },

    /// The stream ended before the terminating SOA
    #[error("IXFR for '{zone}' ended after {records} records without reaching serial {remote_serial}")]
    Incomplete {
        /// The zone being transferred
        zone: String,
        /// Records seen
        records: usize,
        /// Serial the master advertised
        remote_serial: u32,
    },

    /// Provider failure while applying or submitting an increment
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// An increment could not be translated
    #[error(transparent)]
    Update(#[from] UpdateError),
}

impl ZoneTransferError {
    /// Short label used for the transfer outcome metric.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoHostedZone { .. } | Self::NoMaster { .. } => "not_configured",
            Self::LocalSerial { .. } => "local_serial",
            Self::TransferFailed { .. } => "transport",
            Self::TransferRefused { .. } => "refused",
            Self::Protocol { .. } | Self::Incomplete { .. } => "protocol",
            Self::Provider(_) | Self::Update(_) => "provider",
        }
    }
}

/// Errors raised while loading or validating the configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read
    #[error("cannot read config file {path}: {source}")]
    Read {
        /// Path of the file
        path: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid YAML for the expected schema
    #[error("cannot parse config file {path}: {source}")]
    Parse {
        /// Path of the file
        path: String,
        /// Underlying YAML error
        #[source]
        source: serde_yaml::Error,
    },

    /// A value is present but unusable
    #[error("invalid configuration value for '{field}': {reason}")]
    Invalid {
        /// Dotted path of the offending field
        field: String,
        /// Explanation of what is invalid
        reason: String,
    },

    /// A TSIG entry is unusable
    #[error(transparent)]
    Tsig(#[from] TsigError),
}

#[cfg(test)]
#[path = "dns_errors_tests.rs"]
mod dns_errors_tests;
