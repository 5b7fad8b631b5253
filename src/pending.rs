// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Pending change tracking.
//!
//! Submitted change IDs whose status is still `PENDING` go into a bounded
//! queue. Producers never block: when the queue is full the ID is dropped
//! with a warning. A single [`ChangePoller`] owns the receiving end and
//! polls the provider until each change reaches a terminal status.
//!
//! Tracking is purely observational; nothing is retried or rolled back.

use crate::metrics::{record_change_poll, record_pending_dropped};
use crate::provider::DnsProvider;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tracing::{debug, info, warn};

/// Producer handle for the pending change queue.
#[derive(Debug, Clone)]
pub struct PendingChanges {
    sender: mpsc::Sender<String>,
}

/// Create the queue with room for `capacity` change IDs.
#[must_use]
pub fn pending_queue(capacity: usize) -> (PendingChanges, mpsc::Receiver<String>) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (PendingChanges { sender }, receiver)
}

impl PendingChanges {
    /// Queue a change ID for polling. Returns `false` if it was dropped.
    pub fn offer(&self, change_id: String) -> bool {
        self.offer_from(change_id, "submit")
    }

    fn offer_from(&self, change_id: String, source: &str) -> bool {
        match self.sender.try_send(change_id) {
            Ok(()) => true,
            Err(TrySendError::Full(change_id)) => {
                warn!(
                    change_id = %change_id,
                    source = source,
                    "Pending change queue full, not tracking change"
                );
                record_pending_dropped(source);
                false
            }
            Err(TrySendError::Closed(change_id)) => {
                warn!(change_id = %change_id, "Pending change queue closed, not tracking change");
                record_pending_dropped(source);
                false
            }
        }
    }
}

/// Result of one poller iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing was queued.
    Idle,
    /// The change is still propagating and was queued again (or dropped if
    /// the queue had filled up meanwhile).
    StillPending(String),
    /// The change reached a terminal status and is no longer tracked.
    Completed { change_id: String, status: String },
    /// The status query failed; the change is no longer tracked.
    Failed(String),
    /// Every producer is gone.
    Closed,
}

/// Single consumer of the pending change queue.
pub struct ChangePoller {
    provider: Arc<dyn DnsProvider>,
    receiver: mpsc::Receiver<String>,
    requeue: PendingChanges,
    interval: Duration,
}

impl ChangePoller {
    #[must_use]
    pub fn new(
        provider: Arc<dyn DnsProvider>,
        receiver: mpsc::Receiver<String>,
        requeue: PendingChanges,
        interval: Duration,
    ) -> Self {
        Self {
            provider,
            receiver,
            requeue,
            interval,
        }
    }

    /// Take one change ID off the queue, if any, and query its status.
    pub async fn poll_once(&mut self) -> PollOutcome {
        let change_id = match self.receiver.try_recv() {
            Ok(change_id) => change_id,
            Err(TryRecvError::Empty) => return PollOutcome::Idle,
            Err(TryRecvError::Disconnected) => return PollOutcome::Closed,
        };

        match self.provider.change_status(&change_id).await {
            Ok(info) if info.is_pending() => {
                debug!(change_id = %change_id, status = %info.status, "Change still pending");
                record_change_poll("pending");
                self.requeue.offer_from(change_id.clone(), "requeue");
                PollOutcome::StillPending(change_id)
            }
            Ok(info) => {
                info!(change_id = %change_id, status = %info.status, "Change complete");
                record_change_poll("terminal");
                PollOutcome::Completed {
                    change_id,
                    status: info.status,
                }
            }
            Err(e) => {
                warn!(
                    change_id = %change_id,
                    error = %e,
                    "Failed to query change status, no longer tracking change"
                );
                record_change_poll("error");
                PollOutcome::Failed(change_id)
            }
        }
    }

    /// Poll until the queue is closed, waiting `interval` after every
    /// iteration so neither an empty queue nor a single pending change
    /// turns into a busy loop.
    pub async fn run(mut self) {
        info!(interval_secs = self.interval.as_secs(), "Change status poller started");
        loop {
            if self.poll_once().await == PollOutcome::Closed {
                info!("Pending change queue closed, poller exiting");
                return;
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}

#[cfg(test)]
#[path = "pending_tests.rs"]
mod pending_tests;
