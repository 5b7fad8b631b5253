// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! IXFR client over TCP.
//!
//! Requests one incremental transfer (RFC 1995) from the zone's master with
//! `hickory-client` and yields the answer records of each response message
//! in turn. When a key is configured for the master, the client signs the
//! request and verifies the TSIG chain on the responses.

use crate::constants::{XFR_CONNECT_TIMEOUT_SECS, XFR_REQUEST_TIMEOUT_SECS};
use crate::dns_errors::ZoneTransferError;
use futures::stream::{BoxStream, StreamExt};
use hickory_client::client::{AsyncClient, ClientHandle, Signer};
use hickory_client::tcp::TcpClientStream;
use hickory_proto::iocompat::AsyncIoTokioAsStd;
use hickory_proto::op::ResponseCode;
use hickory_proto::rr::dnssec::tsig::TSigner;
use hickory_proto::rr::rdata::SOA;
use hickory_proto::rr::{Name, Record};
use hickory_proto::xfer::DnsResponse;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream as TokioTcpStream;
use tracing::{debug, warn};

/// A stream of transfer response messages.
#[async_trait::async_trait]
pub trait XfrSource: Send {
    /// Answer records of the next response message, or `None` once the
    /// transfer stream has ended.
    async fn next_message(&mut self) -> Result<Option<Vec<Record>>, ZoneTransferError>;
}

/// SOA advertised in the IXFR request; only the serial is meaningful.
#[must_use]
pub fn request_soa(zone: &Name, local_serial: u32) -> SOA {
    SOA::new(zone.clone(), zone.clone(), local_serial, 0, 0, 0, 0)
}

/// An open incremental transfer from one master.
pub struct IxfrClient {
    zone: Name,
    master: SocketAddr,
    responses: BoxStream<'static, Result<DnsResponse, String>>,
    // request handle; the exchange stays open while it lives
    _client: AsyncClient,
}

impl IxfrClient {
    /// Connect to `master` and send the transfer request for `zone`,
    /// starting after `local_serial`.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneTransferError::TransferFailed`] if the connection
    /// cannot be established.
    pub async fn connect(
        zone: Name,
        master: SocketAddr,
        local_serial: u32,
        signer: Option<TSigner>,
    ) -> Result<Self, ZoneTransferError> {
        let signed = signer.is_some();
        let (stream, sender) = TcpClientStream::<AsyncIoTokioAsStd<TokioTcpStream>>::with_timeout(
            master,
            Duration::from_secs(XFR_CONNECT_TIMEOUT_SECS),
        );
        let signer = signer.map(|signer| Arc::new(Signer::from(signer)));
        let (mut client, background) = AsyncClient::with_timeout(
            stream,
            sender,
            Duration::from_secs(XFR_REQUEST_TIMEOUT_SECS),
            signer,
        )
        .await
        .map_err(|e| ZoneTransferError::TransferFailed {
            zone: zone.to_string(),
            master: master.to_string(),
            reason: format!("connect: {e}"),
        })?;

        let exchange_zone = zone.clone();
        tokio::spawn(async move {
            if let Err(e) = background.await {
                warn!(zone = %exchange_zone, master = %master, error = %e, "Transfer connection closed with an error");
            }
        });

        let responses = client
            .zone_transfer(zone.clone(), Some(request_soa(&zone, local_serial)))
            .map(|response| response.map_err(|e| e.to_string()))
            .boxed();

        debug!(
            zone = %zone,
            master = %master,
            local_serial = local_serial,
            signed = signed,
            "Sent IXFR request"
        );

        Ok(Self {
            zone,
            master,
            responses,
            _client: client,
        })
    }
}

#[async_trait::async_trait]
impl XfrSource for IxfrClient {
    async fn next_message(&mut self) -> Result<Option<Vec<Record>>, ZoneTransferError> {
        let response = match self.responses.next().await {
            None => return Ok(None),
            Some(Ok(response)) => response,
            Some(Err(reason)) => {
                return Err(ZoneTransferError::TransferFailed {
                    zone: self.zone.to_string(),
                    master: self.master.to_string(),
                    reason,
                })
            }
        };

        if response.response_code() != ResponseCode::NoError {
            return Err(ZoneTransferError::TransferRefused {
                zone: self.zone.to_string(),
                master: self.master.to_string(),
                rcode: response.response_code().to_string(),
            });
        }

        let answers = response.answers().to_vec();
        debug!(
            zone = %self.zone,
            master = %self.master,
            records = answers.len(),
            "Received IXFR message"
        );
        Ok(Some(answers))
    }
}

#[cfg(test)]
#[path = "xfr_tests.rs"]
mod xfr_tests;
