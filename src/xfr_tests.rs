// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Tests for the TCP IXFR client against a scripted master.

#[cfg(test)]
mod tests {
    use crate::tsig::{create_tsig_signer, message_tsig, sign_response, TsigAlgorithmName, TsigKeyData};
    use crate::xfr::*;
    use hickory_proto::op::{Message, MessageType, OpCode, ResponseCode};
    use hickory_proto::rr::dnssec::tsig::TSigner;
    use hickory_proto::rr::rdata::{A, SOA};
    use hickory_proto::rr::{Name, RData, Record, RecordType};
    use std::net::{Ipv4Addr, SocketAddr};
    use std::str::FromStr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    const SECRET: &str = "dGVzdHNlY3JldHRlc3RzZWNyZXR0ZXN0c2VjcmV0MTI=";

    fn zone() -> Name {
        Name::from_str("example.com.").unwrap()
    }

    fn signer() -> TSigner {
        create_tsig_signer(&TsigKeyData {
            name: "xfr-key.".to_string(),
            algorithm: TsigAlgorithmName::HmacSha256,
            secret: SECRET.to_string(),
        })
        .unwrap()
    }

    fn soa(serial: u32) -> Record {
        Record::from_rdata(
            zone(),
            3600,
            RData::SOA(SOA::new(
                Name::from_str("ns1.example.com.").unwrap(),
                Name::from_str("hostmaster.example.com.").unwrap(),
                serial,
                7200,
                900,
                1_209_600,
                300,
            )),
        )
    }

    fn a(owner: &str, ip: [u8; 4]) -> Record {
        Record::from_rdata(
            Name::from_str(owner).unwrap(),
            300,
            RData::A(A(Ipv4Addr::from(ip))),
        )
    }

    fn response_to(request: &Message, answers: Vec<Record>) -> Message {
        let mut response = Message::new();
        response
            .set_id(request.id())
            .set_message_type(MessageType::Response)
            .set_op_code(OpCode::Query);
        for query in request.queries() {
            response.add_query(query.clone());
        }
        response.insert_answers(answers);
        response
    }

    /// Accept one connection, hand the decoded request to `respond` and
    /// write back every message it returns. Yields the request.
    async fn master<F>(respond: F) -> (SocketAddr, JoinHandle<Message>)
    where
        F: FnOnce(&Message) -> Vec<Message> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let length = stream.read_u16().await.unwrap();
            let mut buf = vec![0u8; usize::from(length)];
            stream.read_exact(&mut buf).await.unwrap();
            let request = Message::from_vec(&buf).unwrap();

            for response in respond(&request) {
                let bytes = response.to_vec().unwrap();
                let length = u16::try_from(bytes.len()).unwrap();
                stream.write_all(&length.to_be_bytes()).await.unwrap();
                stream.write_all(&bytes).await.unwrap();
            }
            stream.flush().await.unwrap();
            request
        });
        (addr, handle)
    }

    #[test]
    fn test_request_soa_carries_local_serial() {
        let soa = request_soa(&zone(), 42);
        assert_eq!(soa.serial(), 42);
        assert_eq!(soa.mname(), &zone());
    }

    #[tokio::test]
    async fn test_request_advertises_local_serial() {
        let (addr, handle) = master(|request| {
            vec![response_to(
                request,
                vec![soa(3), soa(2), soa(3), a("www.example.com.", [192, 0, 2, 1]), soa(3)],
            )]
        })
        .await;

        let mut client = IxfrClient::connect(zone(), addr, 2, None).await.unwrap();
        let records = client.next_message().await.unwrap().unwrap();
        assert_eq!(records.len(), 5);

        let request = handle.await.unwrap();
        assert_eq!(request.queries().len(), 1);
        assert_eq!(request.queries()[0].query_type(), RecordType::IXFR);
        assert_eq!(request.queries()[0].name(), &zone());
        let advertised = request
            .name_servers()
            .iter()
            .find_map(|record| match record.data() {
                Some(RData::SOA(soa)) => Some(soa.serial()),
                _ => None,
            });
        assert_eq!(advertised, Some(2));
        assert!(message_tsig(&request).is_none());
    }

    #[tokio::test]
    async fn test_unsigned_multi_message_transfer() {
        let (addr, _handle) = master(|request| {
            let first = response_to(request, vec![soa(3), soa(2)]);
            let mut second = response_to(
                request,
                vec![soa(3), a("www.example.com.", [192, 0, 2, 1]), soa(3)],
            );
            second.take_queries();
            vec![first, second]
        })
        .await;

        let mut client = IxfrClient::connect(zone(), addr, 2, None).await.unwrap();
        let first = client.next_message().await.unwrap().unwrap();
        assert_eq!(first.len(), 2);
        let second = client.next_message().await.unwrap().unwrap();
        assert_eq!(second.len(), 3);
        assert!(client.next_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_error_rcode_yields_no_records() {
        let (addr, _handle) = master(|request| {
            let mut response = response_to(request, Vec::new());
            response.set_response_code(ResponseCode::NotAuth);
            vec![response]
        })
        .await;

        let mut client = IxfrClient::connect(zone(), addr, 2, None).await.unwrap();
        let outcome = client.next_message().await;
        assert!(
            !matches!(outcome, Ok(Some(_))),
            "a refused transfer yields no records: {outcome:?}"
        );
    }

    #[tokio::test]
    async fn test_signed_transfer_verifies() {
        let (addr, handle) = master(|request| {
            let request_mac = message_tsig(request).unwrap().1.mac().to_vec();
            let mut response = response_to(
                request,
                vec![soa(3), soa(2), soa(3), a("www.example.com.", [192, 0, 2, 1]), soa(3)],
            );
            sign_response(&mut response, &signer(), &request_mac).unwrap();
            vec![response]
        })
        .await;

        let mut client = IxfrClient::connect(zone(), addr, 2, Some(signer()))
            .await
            .unwrap();
        let records = client.next_message().await.unwrap().unwrap();
        assert_eq!(records.len(), 5);

        let request = handle.await.unwrap();
        let (key_name, _) = message_tsig(&request).expect("request is signed");
        assert_eq!(key_name, &Name::from_str("xfr-key.").unwrap());
    }

    #[tokio::test]
    async fn test_unsigned_response_rejected_when_key_configured() {
        let (addr, _handle) = master(|request| vec![response_to(request, vec![soa(3), soa(2)])]).await;

        let mut client = IxfrClient::connect(zone(), addr, 2, Some(signer()))
            .await
            .unwrap();
        let err = client.next_message().await.err().unwrap();
        assert_eq!(err.kind(), "transport");
    }

    #[tokio::test]
    async fn test_connect_failure_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = IxfrClient::connect(zone(), addr, 2, None)
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), "transport");
    }
}
