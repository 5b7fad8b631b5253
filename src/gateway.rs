// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Request handling for one inbound datagram.
//!
//! The gateway authenticates the request against the peer's TSIG key,
//! dispatches on opcode and builds the reply. A NOTIFY yields a
//! [`TransferRequest`] which the worker runs after the acknowledgment has
//! been sent.

use crate::context::Context;
use crate::dns_errors::TsigError;
use crate::metrics::record_request;
use crate::tsig::{message_tsig, sign_response, verify_signed};
use crate::update::process_update;
use hickory_proto::op::{Header, Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::{DNSClass, Name, RecordType};
use hickory_proto::serialize::binary::{BinDecodable, BinDecoder};
use std::fmt::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Zone to pull once the NOTIFY acknowledgment is on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub zone: Name,
}

/// Result of handling one datagram.
#[derive(Debug, Default)]
pub struct Handled {
    /// Encoded reply; `None` when the datagram is dropped.
    pub reply: Option<Vec<u8>>,
    pub transfer: Option<TransferRequest>,
}

impl Handled {
    fn dropped() -> Self {
        Self::default()
    }

    fn reply(bytes: Option<Vec<u8>>) -> Self {
        Self {
            reply: bytes,
            transfer: None,
        }
    }
}

/// Metrics label for an opcode.
#[must_use]
pub fn opcode_label(op_code: OpCode) -> &'static str {
    match op_code {
        OpCode::Query => "query",
        OpCode::Notify => "notify",
        OpCode::Update => "update",
        _ => "other",
    }
}

/// Metrics label for a response code.
#[must_use]
pub fn rcode_label(rcode: ResponseCode) -> &'static str {
    match rcode {
        ResponseCode::NoError => "noerror",
        ResponseCode::FormErr => "formerr",
        ResponseCode::ServFail => "servfail",
        ResponseCode::NXDomain => "nxdomain",
        ResponseCode::NotImp => "notimp",
        ResponseCode::Refused => "refused",
        ResponseCode::NotAuth => "notauth",
        ResponseCode::NotZone => "notzone",
        _ => "other",
    }
}

fn hex_dump(raw: &[u8]) -> String {
    let mut out = String::with_capacity(raw.len() * 3);
    for (i, byte) in raw.iter().enumerate() {
        if i > 0 {
            out.push(if i % 16 == 0 { '\n' } else { ' ' });
        }
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Reply skeleton echoing the request's ID, opcode and question.
fn reply_to(request: &Message, rcode: ResponseCode) -> Message {
    let mut reply = Message::new();
    reply
        .set_id(request.id())
        .set_message_type(MessageType::Response)
        .set_op_code(request.op_code())
        .set_response_code(rcode);
    for query in request.queries() {
        reply.add_query(query.clone());
    }
    reply
}

/// Reply built from the header and question section only, for requests
/// rejected before the full message can be trusted.
fn question_only_reply(raw: &[u8], rcode: ResponseCode) -> Option<Message> {
    let mut decoder = BinDecoder::new(raw);
    let header = Header::read(&mut decoder).ok()?;

    let mut reply = Message::new();
    reply
        .set_id(header.id())
        .set_message_type(MessageType::Response)
        .set_op_code(header.op_code())
        .set_response_code(rcode);
    for _ in 0..header.query_count() {
        match Query::read(&mut decoder) {
            Ok(query) => {
                reply.add_query(query);
            }
            Err(_) => break,
        }
    }
    Some(reply)
}

fn encode(reply: &Message, peer: SocketAddr) -> Option<Vec<u8>> {
    match reply.to_vec() {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            error!(peer = %peer, error = %e, "Failed to encode reply");
            None
        }
    }
}

/// Stateless request handler shared by all workers.
#[derive(Clone)]
pub struct Gateway {
    ctx: Arc<Context>,
}

impl Gateway {
    #[must_use]
    pub fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    #[must_use]
    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }

    fn not_auth(raw: &[u8], opcode: &'static str, peer: SocketAddr) -> Handled {
        record_request(opcode, rcode_label(ResponseCode::NotAuth));
        let bytes = question_only_reply(raw, ResponseCode::NotAuth)
            .and_then(|reply| encode(&reply, peer));
        Handled::reply(bytes)
    }

    /// Handle one datagram from `peer`.
    pub async fn handle(&self, raw: &[u8], peer: SocketAddr) -> Handled {
        let message = match Message::from_vec(raw) {
            Ok(message) => message,
            Err(e) => {
                warn!(peer = %peer, error = %e, len = raw.len(), "Dropping undecodable message");
                debug!(peer = %peer, "Undecodable message:\n{}", hex_dump(raw));
                record_request("unknown", "dropped");
                return Handled::dropped();
            }
        };
        let opcode = opcode_label(message.op_code());

        if message.message_type() == MessageType::Response {
            debug!(peer = %peer, id = message.id(), "Dropping unsolicited response");
            record_request(opcode, "dropped");
            return Handled::dropped();
        }

        let peer_label = peer.to_string();
        let signer = self.ctx.keys.get(peer.ip());
        let request_mac = match (signer, message_tsig(&message)) {
            (Some(signer), Some((key_name, _))) => {
                match verify_signed(signer, raw, key_name, None, true, &peer_label) {
                    Ok(mac) => Some(mac),
                    Err(e) => {
                        warn!(peer = %peer, error = %e, "TSIG verification failed");
                        return Self::not_auth(raw, opcode, peer);
                    }
                }
            }
            (Some(signer), None) => {
                let e = TsigError::MissingSignature {
                    peer: peer_label.clone(),
                };
                warn!(peer = %peer, key_name = %signer.signer_name(), error = %e, "Rejecting request");
                return Self::not_auth(raw, opcode, peer);
            }
            (None, Some((key_name, _))) => {
                warn!(peer = %peer, key_name = %key_name, "Signed request from a peer with no configured key");
                return Self::not_auth(raw, opcode, peer);
            }
            (None, None) => None,
        };

        if message.response_code() != ResponseCode::NoError {
            debug!(
                peer = %peer,
                rcode = %message.response_code(),
                "Request carries a non-success response code"
            );
            record_request(opcode, rcode_label(ResponseCode::FormErr));
            return Handled::reply(encode(&reply_to(&message, ResponseCode::FormErr), peer));
        }

        let (mut reply, transfer) = match message.op_code() {
            OpCode::Query => (self.query(&message), None),
            OpCode::Notify => self.notify(&message, peer),
            OpCode::Update => (self.update(&message, peer).await, None),
            other => {
                debug!(peer = %peer, op_code = ?other, "Unsupported opcode");
                (reply_to(&message, ResponseCode::NotImp), None)
            }
        };

        if let (Some(signer), Some(mac)) = (signer, request_mac.as_deref()) {
            if let Err(e) = sign_response(&mut reply, signer, mac) {
                error!(peer = %peer, error = %e, "Failed to sign reply, sending it unsigned");
            }
        }

        record_request(opcode, rcode_label(reply.response_code()));
        Handled {
            reply: encode(&reply, peer),
            transfer,
        }
    }

    fn query(&self, message: &Message) -> Message {
        if message.queries().len() != 1 {
            return reply_to(message, ResponseCode::ServFail);
        }
        reply_to(message, ResponseCode::NoError)
    }

    fn notify(&self, message: &Message, peer: SocketAddr) -> (Message, Option<TransferRequest>) {
        let [question] = message.queries() else {
            warn!(peer = %peer, count = message.queries().len(), "NOTIFY must carry exactly one question");
            return (reply_to(message, ResponseCode::ServFail), None);
        };
        if question.query_class() != DNSClass::IN || question.query_type() != RecordType::SOA {
            warn!(
                peer = %peer,
                class = %question.query_class(),
                record_type = %question.query_type(),
                "NOTIFY question must be class IN type SOA"
            );
            return (reply_to(message, ResponseCode::ServFail), None);
        }
        if !message.authoritative() {
            info!(peer = %peer, zone = %question.name(), "NOTIFY without the AA bit");
        }

        let mut reply = reply_to(message, ResponseCode::NoError);
        reply.set_authoritative(true);

        let zone = question.name().clone();
        if self.ctx.zone_context(&zone).is_none() {
            error!(peer = %peer, zone = %zone, "NOTIFY for a zone with no hosted zone configured");
            return (reply, None);
        }
        if self.ctx.master(&zone).is_none() {
            error!(peer = %peer, zone = %zone, "NOTIFY for a zone with no master configured");
            return (reply, None);
        }

        info!(peer = %peer, zone = %zone, "NOTIFY received, scheduling IXFR");
        (reply, Some(TransferRequest { zone }))
    }

    async fn update(&self, message: &Message, peer: SocketAddr) -> Message {
        let zone = message
            .queries()
            .first()
            .map(|q| q.name().to_string())
            .unwrap_or_default();
        match process_update(&self.ctx, message).await {
            Ok(changes) => {
                info!(peer = %peer, zone = %zone, changes = changes, "Update applied");
                reply_to(message, ResponseCode::NoError)
            }
            Err(e) => {
                warn!(
                    peer = %peer,
                    zone = %zone,
                    rcode = rcode_label(e.response_code()),
                    error = %e,
                    "Update rejected"
                );
                reply_to(message, e.response_code())
            }
        }
    }
}

#[cfg(test)]
#[path = "gateway_tests.rs"]
mod gateway_tests;
