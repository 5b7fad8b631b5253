// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! UDP serving loop.
//!
//! All workers share one socket. Each worker handles a datagram end to end
//! (including any zone transfer a NOTIFY triggers) before it receives the
//! next one, so the worker count bounds concurrency.

use crate::constants::MAX_UDP_MESSAGE_SIZE;
use crate::gateway::Gateway;
use crate::ixfr::run_transfer;
use anyhow::{Context as _, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::{debug, error, info, warn};

/// Bound listener plus the workers that will serve it.
pub struct Server {
    socket: Arc<UdpSocket>,
    gateway: Gateway,
    workers: usize,
}

impl Server {
    /// Bind the UDP socket.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn bind(listen: SocketAddr, gateway: Gateway, workers: usize) -> Result<Self> {
        let socket = UdpSocket::bind(listen)
            .await
            .with_context(|| format!("failed to bind UDP socket on {listen}"))?;
        Ok(Self {
            socket: Arc::new(socket),
            gateway,
            workers: workers.max(1),
        })
    }

    /// Address the socket is bound to.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot report its address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Spawn the workers and wait on them.
    ///
    /// Workers never exit on their own, so this only returns if one panics.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first worker that stopped.
    pub async fn run(self) -> Result<()> {
        let address = self.local_addr()?;
        info!(address = %address, workers = self.workers, "Serving DNS over UDP");

        let handles: Vec<_> = (0..self.workers)
            .map(|id| {
                tokio::spawn(worker(
                    id,
                    Arc::clone(&self.socket),
                    self.gateway.clone(),
                ))
            })
            .collect();

        let (result, index, _remaining) = futures::future::select_all(handles).await;
        match result {
            Ok(()) => anyhow::bail!("worker {index} exited unexpectedly"),
            Err(e) => {
                error!(worker = index, error = %e, "CRITICAL: worker stopped");
                Err(e).context(format!("worker {index} stopped"))
            }
        }
    }
}

async fn worker(id: usize, socket: Arc<UdpSocket>, gateway: Gateway) {
    debug!(worker = id, "Worker started");
    let mut buf = vec![0u8; MAX_UDP_MESSAGE_SIZE];
    loop {
        let (len, peer) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                warn!(worker = id, error = %e, "Failed to receive datagram");
                continue;
            }
        };
        debug!(worker = id, peer = %peer, len = len, "Received datagram");

        let handled = gateway.handle(&buf[..len], peer).await;
        if let Some(reply) = handled.reply {
            if let Err(e) = socket.send_to(&reply, peer).await {
                warn!(worker = id, peer = %peer, error = %e, "Failed to send reply");
            }
        }
        if let Some(transfer) = handled.transfer {
            run_transfer(gateway.context(), &transfer.zone).await;
        }
    }
}
