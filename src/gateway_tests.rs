// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Tests for request authentication and opcode dispatch.

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::context::Context;
    use crate::gateway::*;
    use crate::pending::pending_queue;
    use crate::provider::memory::MemoryProvider;
    use crate::tsig::{
        create_tsig_signer, message_tsig, unix_now, verify_signed, KeyTable, TsigAlgorithmName,
        TsigKeyData,
    };
    use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
    use hickory_proto::rr::dnssec::tsig::TSigner;
    use hickory_proto::rr::rdata::A;
    use hickory_proto::rr::{Name, RData, Record, RecordType};
    use std::net::{Ipv4Addr, SocketAddr};
    use std::str::FromStr;
    use std::sync::Arc;

    const SECRET: &str = "dGVzdHNlY3JldHRlc3RzZWNyZXR0ZXN0c2VjcmV0MTI=";
    const OTHER_SECRET: &str = "b3RoZXJzZWNyZXRvdGhlcnNlY3JldG90aGVyc2VjcmU=";

    fn config() -> Config {
        Config::from_yaml(
            &format!(
                r#"
provider:
  endpoint: "http://127.0.0.1:8080"
hosted_zones:
  example.com: Z1
  example.net: Z2
masters:
  example.com: 192.0.2.53
tsig:
  127.0.0.1:
    name: update-key.
    algorithm: hmac-sha256
    secret: "{SECRET}"
"#
            ),
            "test",
        )
        .unwrap()
    }

    fn gateway() -> (Gateway, Arc<MemoryProvider>) {
        let config = config();
        let keys = KeyTable::from_config(&config.tsig).unwrap();
        let provider = Arc::new(MemoryProvider::new());
        let (pending, _receiver) = pending_queue(8);
        let ctx = Context::new(config, provider.clone(), keys, pending);
        (Gateway::new(Arc::new(ctx)), provider)
    }

    fn keyed_peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn open_peer() -> SocketAddr {
        "127.0.0.2:40000".parse().unwrap()
    }

    fn signer(secret: &str) -> TSigner {
        create_tsig_signer(&TsigKeyData {
            name: "update-key.".to_string(),
            algorithm: TsigAlgorithmName::HmacSha256,
            secret: secret.to_string(),
        })
        .unwrap()
    }

    fn name(s: &str) -> Name {
        Name::from_str(s).unwrap()
    }

    fn request(op_code: OpCode, zone: &str, record_type: RecordType) -> Message {
        let mut message = Message::new();
        message
            .set_id(1234)
            .set_message_type(MessageType::Query)
            .set_op_code(op_code);
        message.add_query(Query::query(name(zone), record_type));
        message
    }

    fn add_update() -> Message {
        let mut message = request(OpCode::Update, "example.com.", RecordType::SOA);
        message.add_name_server(Record::from_rdata(
            name("www.example.com."),
            300,
            RData::A(A(Ipv4Addr::new(192, 0, 2, 1))),
        ));
        message
    }

    fn sign(message: &mut Message, signer: &TSigner) -> Vec<u8> {
        let now = u32::try_from(unix_now()).unwrap();
        message.finalize(signer, now).unwrap();
        message.to_vec().unwrap()
    }

    fn decode(handled: &Handled) -> Message {
        Message::from_vec(handled.reply.as_ref().expect("a reply")).unwrap()
    }

    #[tokio::test]
    async fn test_garbage_is_dropped() {
        let (gateway, _provider) = gateway();
        let handled = gateway.handle(&[0x12, 0x34, 0x01], open_peer()).await;
        assert!(handled.reply.is_none());
        assert!(handled.transfer.is_none());
    }

    #[tokio::test]
    async fn test_responses_are_dropped() {
        let (gateway, _provider) = gateway();
        let mut message = request(OpCode::Query, "example.com.", RecordType::A);
        message.set_message_type(MessageType::Response);
        let handled = gateway.handle(&message.to_vec().unwrap(), open_peer()).await;
        assert!(handled.reply.is_none());
    }

    #[tokio::test]
    async fn test_query_gets_empty_success() {
        let (gateway, _provider) = gateway();
        let message = request(OpCode::Query, "www.example.com.", RecordType::A);

        let handled = gateway.handle(&message.to_vec().unwrap(), open_peer()).await;
        let reply = decode(&handled);
        assert_eq!(reply.id(), 1234);
        assert_eq!(reply.message_type(), MessageType::Response);
        assert_eq!(reply.response_code(), ResponseCode::NoError);
        assert!(reply.answers().is_empty());
        assert_eq!(reply.queries().len(), 1);
    }

    #[tokio::test]
    async fn test_query_without_question_is_servfail() {
        let (gateway, _provider) = gateway();
        let mut message = Message::new();
        message.set_id(7).set_op_code(OpCode::Query);

        let handled = gateway.handle(&message.to_vec().unwrap(), open_peer()).await;
        assert_eq!(decode(&handled).response_code(), ResponseCode::ServFail);
    }

    #[tokio::test]
    async fn test_unsupported_opcode_is_notimp() {
        let (gateway, _provider) = gateway();
        let message = request(OpCode::Status, "example.com.", RecordType::SOA);

        let handled = gateway.handle(&message.to_vec().unwrap(), open_peer()).await;
        assert_eq!(decode(&handled).response_code(), ResponseCode::NotImp);
    }

    #[tokio::test]
    async fn test_request_with_error_rcode_is_formerr() {
        let (gateway, provider) = gateway();
        let mut message = add_update();
        message.set_response_code(ResponseCode::ServFail);

        let handled = gateway.handle(&message.to_vec().unwrap(), open_peer()).await;
        assert_eq!(decode(&handled).response_code(), ResponseCode::FormErr);
        assert!(provider.batches().is_empty());
    }

    #[tokio::test]
    async fn test_notify_acks_and_requests_transfer() {
        let (gateway, _provider) = gateway();
        let mut message = request(OpCode::Notify, "example.com.", RecordType::SOA);
        message.set_authoritative(true);

        let handled = gateway.handle(&message.to_vec().unwrap(), open_peer()).await;
        let reply = decode(&handled);
        assert_eq!(reply.response_code(), ResponseCode::NoError);
        assert!(reply.authoritative());
        assert_eq!(
            handled.transfer,
            Some(TransferRequest {
                zone: name("example.com.")
            })
        );
    }

    #[tokio::test]
    async fn test_notify_without_master_acks_only() {
        let (gateway, _provider) = gateway();
        let message = request(OpCode::Notify, "example.net.", RecordType::SOA);

        let handled = gateway.handle(&message.to_vec().unwrap(), open_peer()).await;
        assert_eq!(decode(&handled).response_code(), ResponseCode::NoError);
        assert!(handled.transfer.is_none());
    }

    #[tokio::test]
    async fn test_notify_with_bad_question_is_servfail() {
        let (gateway, _provider) = gateway();
        let message = request(OpCode::Notify, "example.com.", RecordType::A);

        let handled = gateway.handle(&message.to_vec().unwrap(), open_peer()).await;
        assert_eq!(decode(&handled).response_code(), ResponseCode::ServFail);
        assert!(handled.transfer.is_none());
    }

    #[tokio::test]
    async fn test_unsigned_update_from_open_peer_is_applied() {
        let (gateway, provider) = gateway();

        let handled = gateway
            .handle(&add_update().to_vec().unwrap(), open_peer())
            .await;
        let reply = decode(&handled);
        assert_eq!(reply.response_code(), ResponseCode::NoError);
        assert!(message_tsig(&reply).is_none());
        assert_eq!(provider.batches().len(), 1);
    }

    #[tokio::test]
    async fn test_unsigned_update_from_keyed_peer_is_notauth() {
        let (gateway, provider) = gateway();

        let handled = gateway
            .handle(&add_update().to_vec().unwrap(), keyed_peer())
            .await;
        let reply = decode(&handled);
        assert_eq!(reply.response_code(), ResponseCode::NotAuth);
        assert_eq!(reply.id(), 1234);
        assert_eq!(reply.queries()[0].name(), &name("example.com."));
        assert!(provider.batches().is_empty());
        assert_eq!(provider.reads(), 0, "never reaches opcode dispatch");
    }

    #[tokio::test]
    async fn test_signed_update_gets_signed_reply() {
        let (gateway, provider) = gateway();
        let signer = signer(SECRET);
        let mut message = add_update();
        let raw = sign(&mut message, &signer);
        let request_mac = message_tsig(&message).unwrap().1.mac().to_vec();

        let handled = gateway.handle(&raw, keyed_peer()).await;
        let bytes = handled.reply.clone().unwrap();
        let reply = decode(&handled);
        assert_eq!(reply.response_code(), ResponseCode::NoError);
        assert_eq!(provider.batches().len(), 1);

        let (key_name, _) = message_tsig(&reply).expect("reply is signed");
        assert!(verify_signed(&signer, &bytes, key_name, Some(&request_mac), true, "test").is_ok());
    }

    #[tokio::test]
    async fn test_wrong_secret_is_notauth() {
        let (gateway, provider) = gateway();
        let mut message = add_update();
        let raw = sign(&mut message, &signer(OTHER_SECRET));

        let handled = gateway.handle(&raw, keyed_peer()).await;
        let reply = decode(&handled);
        assert_eq!(reply.response_code(), ResponseCode::NotAuth);
        assert!(message_tsig(&reply).is_none());
        assert!(provider.batches().is_empty());
    }

    #[tokio::test]
    async fn test_stale_signature_is_notauth() {
        let (gateway, provider) = gateway();
        let mut message = add_update();
        let signed_at = u32::try_from(unix_now() - 3600).unwrap();
        message.finalize(&signer(SECRET), signed_at).unwrap();
        let raw = message.to_vec().unwrap();

        let handled = gateway.handle(&raw, keyed_peer()).await;
        let reply = decode(&handled);
        assert_eq!(reply.response_code(), ResponseCode::NotAuth);
        assert!(provider.batches().is_empty());
        assert_eq!(provider.reads(), 0);
    }

    #[tokio::test]
    async fn test_signed_update_from_open_peer_is_notauth() {
        let (gateway, provider) = gateway();
        let mut message = add_update();
        let raw = sign(&mut message, &signer(SECRET));

        let handled = gateway.handle(&raw, open_peer()).await;
        assert_eq!(decode(&handled).response_code(), ResponseCode::NotAuth);
        assert!(provider.batches().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_update_carries_rcode() {
        let (gateway, provider) = gateway();
        let mut message = request(OpCode::Update, "example.com.", RecordType::SOA);
        message.add_name_server(Record::from_rdata(
            name("www.example.org."),
            300,
            RData::A(A(Ipv4Addr::new(192, 0, 2, 1))),
        ));

        let handled = gateway.handle(&message.to_vec().unwrap(), open_peer()).await;
        assert_eq!(decode(&handled).response_code(), ResponseCode::NotZone);
        assert!(provider.batches().is_empty());
    }

    #[test]
    fn test_labels() {
        assert_eq!(opcode_label(OpCode::Update), "update");
        assert_eq!(opcode_label(OpCode::Status), "other");
        assert_eq!(rcode_label(ResponseCode::NotAuth), "notauth");
        assert_eq!(rcode_label(ResponseCode::YXDomain), "other");
    }
}
