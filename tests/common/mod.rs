// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common test utilities for integration tests

#![allow(dead_code)]

use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::{Name, RecordType};
use nsbridge::config::Config;
use nsbridge::context::Context;
use nsbridge::gateway::Gateway;
use nsbridge::pending::{pending_queue, ChangePoller};
use nsbridge::provider::DnsProvider;
use nsbridge::server::Server;
use nsbridge::tsig::KeyTable;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;

pub const SECRET: &str = "dGVzdHNlY3JldHRlc3RzZWNyZXR0ZXN0c2VjcmV0MTI=";

/// Build a configuration listening on an ephemeral loopback port.
pub fn config(endpoint: &str, extra: &str) -> Config {
    let yaml = format!(
        "server:\n  listen: \"127.0.0.1:0\"\n  workers: 2\nprovider:\n  endpoint: \"{endpoint}\"\npending:\n  poll_interval_secs: 1\nhosted_zones:\n  example.com: Z1\n{extra}"
    );
    Config::from_yaml(&yaml, "integration").expect("valid test configuration")
}

/// Start workers and the change poller; returns the bound address.
pub async fn start(config: Config, provider: Arc<dyn DnsProvider>) -> SocketAddr {
    let keys = KeyTable::from_config(&config.tsig).expect("valid TSIG keys");
    let (pending, receiver) = pending_queue(config.pending.capacity);
    let poller = ChangePoller::new(
        provider.clone(),
        receiver,
        pending.clone(),
        Duration::from_millis(20),
    );
    tokio::spawn(poller.run());

    let listen = config.server.listen;
    let workers = config.server.workers;
    let ctx = Arc::new(Context::new(config, provider, keys, pending));
    let server = Server::bind(listen, Gateway::new(ctx), workers)
        .await
        .expect("bind test socket");
    let addr = server.local_addr().expect("bound address");
    tokio::spawn(server.run());
    addr
}

pub fn name(s: &str) -> Name {
    Name::from_str(s).expect("valid name")
}

/// An UPDATE for `zone` with an empty update section.
pub fn update(zone: &str, id: u16) -> Message {
    let mut message = Message::new();
    message
        .set_id(id)
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Update);
    message.add_query(Query::query(name(zone), RecordType::SOA));
    message
}

/// Send `raw` and wait for the reply datagram.
pub async fn exchange_raw(server: SocketAddr, raw: &[u8]) -> Option<Vec<u8>> {
    let socket = UdpSocket::bind("127.0.0.1:0").await.expect("client socket");
    socket.send_to(raw, server).await.expect("send request");

    let mut buf = vec![0u8; 4096];
    match tokio::time::timeout(Duration::from_secs(2), socket.recv_from(&mut buf)).await {
        Ok(Ok((len, _))) => Some(buf[..len].to_vec()),
        _ => None,
    }
}

/// Send `message` and decode the reply.
pub async fn exchange(server: SocketAddr, message: &Message) -> Message {
    let raw = message.to_vec().expect("encode request");
    let reply = exchange_raw(server, &raw).await.expect("a reply");
    Message::from_vec(&reply).expect("decodable reply")
}
