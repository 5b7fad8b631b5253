// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # nsbridge - DNS UPDATE and IXFR front end for hosted DNS APIs
//!
//! nsbridge lets standard DNS tooling drive a hosted DNS provider that only
//! exposes an HTTP change-batch API. It listens for DNS messages over UDP and
//! translates them into whole-record-set `CREATE`/`DELETE` batches:
//!
//! - **UPDATE** (RFC 2136) messages become one atomic batch per message.
//! - **NOTIFY** triggers an incremental zone transfer (RFC 1995) from the
//!   zone's configured master; each increment becomes one batch.
//! - **QUERY** is answered with an empty success reply.
//!
//! Requests may be authenticated per peer address with TSIG (RFC 8945).
//!
//! ## Modules
//!
//! - [`gateway`] - Decode, authenticate and dispatch one datagram
//! - [`update`] - Record-level changes to record-set batches
//! - [`ixfr`] - IXFR stream replay, one batch per increment
//! - [`xfr`] - TCP transfer client
//! - [`provider`] - Provider API trait, HTTP and in-memory implementations
//! - [`pending`] - Tracking of changes the provider reports as pending
//! - [`server`] - UDP workers
//! - [`config`] - YAML configuration
//!
//! ## Example
//!
//! ```rust,no_run
//! use nsbridge::config::Config;
//! use std::path::Path;
//!
//! let config = Config::load(Path::new("nsbridge.yaml")).unwrap();
//! println!("{} hosted zones", config.hosted_zones.len());
//! ```

pub mod batch;
pub mod config;
pub mod constants;
pub mod context;
pub mod dns_errors;
pub mod gateway;
pub mod ixfr;
pub mod metrics;
pub mod pending;
pub mod provider;
pub mod rrset;
pub mod server;
pub mod tsig;
pub mod update;
pub mod xfr;
