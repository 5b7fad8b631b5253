// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for nsbridge.
//!
//! This module provides metrics collection with the namespace prefix `nsbridge_`.
//!
//! # Metrics Categories
//!
//! - **Request Metrics** - Inbound DNS messages by opcode and response code
//! - **Provider Metrics** - Change batch submissions and API latency
//! - **Pending Change Metrics** - Queue drops and status polls
//! - **Transfer Metrics** - IXFR pulls and applied increments
//!
//! When `server.metrics_listen` is configured, [`serve_metrics`] exposes the
//! registry over HTTP.
//!
//! # Example
//!
//! ```rust,no_run
//! use nsbridge::metrics::record_request;
//!
//! record_request("update", "noerror");
//! ```

use crate::constants::{HEALTH_SERVER_PATH, METRICS_SERVER_PATH};
use axum::{http::StatusCode, routing::get, Router};
use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::net::SocketAddr;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{error, info};

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all nsbridge metrics
const METRICS_NAMESPACE: &str = "nsbridge";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Request Metrics
// ============================================================================

/// Total number of inbound DNS messages answered or dropped
///
/// Labels:
/// - `opcode`: lowercase DNS opcode (`query`, `notify`, `update`, `other`) or `unknown`
/// - `rcode`: lowercase response code sent (`noerror`, `notauth`, ...) or `dropped`
pub static REQUESTS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_requests_total"),
        "Total number of inbound DNS messages by opcode and response code",
    );
    let counter = CounterVec::new(opts, &["opcode", "rcode"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Provider Metrics
// ============================================================================

/// Total number of change batches handed to the provider
///
/// Labels:
/// - `path`: Input path that produced the batch (`update`, `ixfr`)
/// - `outcome`: `submitted`, `dry_run` or `error`
pub static PROVIDER_BATCHES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_provider_batches_total"),
        "Total number of change batches by input path and outcome",
    );
    let counter = CounterVec::new(opts, &["path", "outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of provider API calls in seconds
///
/// Labels:
/// - `operation`: `get_rrset`, `submit` or `change_status`
pub static PROVIDER_REQUEST_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_provider_request_duration_seconds"),
        "Duration of provider API calls in seconds by operation",
    )
    .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]);
    let histogram = HistogramVec::new(opts, &["operation"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

// ============================================================================
// Pending Change Metrics
// ============================================================================

/// Total number of change IDs dropped because the pending queue was full
///
/// Labels:
/// - `source`: `submit` or `requeue`
pub static PENDING_DROPPED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_pending_dropped_total"),
        "Total number of pending change IDs dropped on a full queue",
    );
    let counter = CounterVec::new(opts, &["source"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of change status polls
///
/// Labels:
/// - `result`: `pending`, `terminal` or `error`
pub static CHANGE_POLLS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_change_polls_total"),
        "Total number of change status polls by result",
    );
    let counter = CounterVec::new(opts, &["result"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Transfer Metrics
// ============================================================================

/// Total number of IXFR pulls by outcome
///
/// Labels:
/// - `outcome`: `applied`, `up_to_date`, or an error kind
pub static TRANSFERS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_transfers_total"),
        "Total number of incremental transfers by outcome",
    );
    let counter = CounterVec::new(opts, &["outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record an inbound message and the response code it was answered with
///
/// # Arguments
/// * `opcode` - Lowercase DNS opcode of the request, as `gateway::opcode_label` renders it
/// * `rcode` - Lowercase response code sent back, or `dropped`
pub fn record_request(opcode: &str, rcode: &str) {
    REQUESTS_TOTAL.with_label_values(&[opcode, rcode]).inc();
}

/// Record a change batch outcome
///
/// # Arguments
/// * `path` - `update` or `ixfr`
/// * `outcome` - `submitted`, `dry_run` or `error`
pub fn record_batch(path: &str, outcome: &str) {
    PROVIDER_BATCHES_TOTAL
        .with_label_values(&[path, outcome])
        .inc();
}

/// Record the duration of one provider API call
pub fn record_provider_call(operation: &str, duration: Duration) {
    PROVIDER_REQUEST_DURATION_SECONDS
        .with_label_values(&[operation])
        .observe(duration.as_secs_f64());
}

/// Record a change ID dropped on a full pending queue
pub fn record_pending_dropped(source: &str) {
    PENDING_DROPPED_TOTAL.with_label_values(&[source]).inc();
}

/// Record one change status poll
pub fn record_change_poll(result: &str) {
    CHANGE_POLLS_TOTAL.with_label_values(&[result]).inc();
}

/// Record the outcome of one IXFR pull
pub fn record_transfer(outcome: &str) {
    TRANSFERS_TOTAL.with_label_values(&[outcome]).inc();
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Returns
/// Prometheus-formatted metrics as a String
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}

async fn metrics_handler() -> Result<String, (StatusCode, String)> {
    gather_metrics().map_err(|e| {
        error!(error = %e, "Failed to gather metrics");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })
}

/// Router serving the metrics and liveness endpoints.
pub fn metrics_router() -> Router {
    Router::new()
        .route(METRICS_SERVER_PATH, get(metrics_handler))
        .route(HEALTH_SERVER_PATH, get(|| async { "ok" }))
}

/// Serve [`metrics_router`] on `addr` until the process exits.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound or the server fails.
pub async fn serve_metrics(addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, path = METRICS_SERVER_PATH, "Metrics endpoint listening");
    axum::serve(listener, metrics_router()).await?;
    Ok(())
}
