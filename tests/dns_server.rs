use dns_challenge_crab::dns::tsig::{SignedMessage, TsigAlgorithm, TsigKey};
use dns_challenge_crab::{Config, DynTxtStore, InMemoryTxtStore, SharedClock, SystemClock};
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::timeout;
use trust_dns_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use trust_dns_proto::rr::rdata::TXT;
use trust_dns_proto::rr::{DNSClass, Name, RData, Record, RecordType};

const CONFIG: &str = r#"{
    "domain": "Acme.Example.COM",
    "ns_domain": "ns1.example.com",
    "ns_admin": "dns-admin@example.com",
    "tsig_key_name": "acme-update",
    "tsig_secret": "c2VjcmV0LWtleS1mb3ItdGhlLWludGVncmF0aW9uLXRlc3Q=",
    "tsig_algorithm": "hmac-sha256",
    "listen_addr": "127.0.0.1:0",
    "dns_tcp_timeout": 2
}"#;

const CHALLENGE: &str = "_acme-challenge.acme.example.com.";

struct TestServer {
    udp: SocketAddr,
    tcp: SocketAddr,
    txt_store: DynTxtStore,
}

async fn start_server() -> TestServer {
    let config = Arc::new(Config::try_from_reader(CONFIG.as_bytes()).unwrap());
    let clock: SharedClock = Arc::new(SystemClock);
    let txt_store: DynTxtStore = Arc::new(InMemoryTxtStore::new(clock.clone()));
    let server = dns_challenge_crab::new_dns(config, txt_store.clone(), clock)
        .await
        .unwrap();
    let udp = server.udp_local_addr().unwrap();
    let tcp = server.tcp_local_addr().unwrap();
    tokio::spawn(server.block_until_done());
    TestServer {
        udp,
        tcp,
        txt_store,
    }
}

fn tsig_key() -> TsigKey {
    TsigKey::new(
        Name::from_str("acme-update.").unwrap(),
        TsigAlgorithm::HmacSha256,
        b"secret-key-for-the-integration-test".to_vec(),
    )
}

fn query(id: u16, name: &str, query_type: RecordType) -> Vec<u8> {
    let mut message = Message::new();
    message
        .set_id(id)
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .add_query(Query::query(Name::from_str(name).unwrap(), query_type));
    message.to_vec().unwrap()
}

fn update(id: u16, zone: &str, record: Record) -> Message {
    let mut message = Message::new();
    message
        .set_id(id)
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Update)
        .add_query(Query::query(Name::from_str(zone).unwrap(), RecordType::SOA))
        .add_name_server(record);
    message
}

fn txt(value: &str, class: DNSClass) -> Record {
    let mut record = Record::from_rdata(
        Name::from_str(CHALLENGE).unwrap(),
        if class == DNSClass::IN { 60 } else { 0 },
        RData::TXT(TXT::new(vec![value.to_string()])),
    );
    record.set_dns_class(class);
    record
}

fn signed(key: &TsigKey, message: &Message) -> Vec<u8> {
    key.sign(message.to_vec().unwrap(), None, OffsetDateTime::now_utc())
        .unwrap()
}

async fn exchange_udp(server: SocketAddr, request: &[u8]) -> Vec<u8> {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    socket.send_to(request, server).await.unwrap();
    let mut buf = vec![0u8; 4096];
    let len = timeout(Duration::from_secs(5), socket.recv(&mut buf))
        .await
        .unwrap()
        .unwrap();
    buf.truncate(len);
    buf
}

async fn exchange_tcp(stream: &mut TcpStream, request: &[u8]) -> Vec<u8> {
    stream
        .write_u16(u16::try_from(request.len()).unwrap())
        .await
        .unwrap();
    stream.write_all(request).await.unwrap();
    let len = timeout(Duration::from_secs(5), stream.read_u16())
        .await
        .unwrap()
        .unwrap();
    let mut response = vec![0u8; usize::from(len)];
    stream.read_exact(&mut response).await.unwrap();
    response
}

fn txt_answer(message: &Message) -> Option<String> {
    message.answers().iter().find_map(|record| match record.data() {
        Some(RData::TXT(txt)) => Some(
            txt.txt_data()
                .iter()
                .map(|s| String::from_utf8_lossy(s).into_owned())
                .collect(),
        ),
        _ => None,
    })
}

#[tokio::test]
async fn udp_set_query_delete_query() {
    let server = start_server().await;
    let key = tsig_key();

    let response = Message::from_vec(
        &exchange_udp(server.udp, &query(1, CHALLENGE, RecordType::TXT)).await,
    )
    .unwrap();
    assert_eq!(response.id(), 1);
    assert!(response.authoritative());
    assert_eq!(response.response_code(), ResponseCode::NoError);
    assert!(response.answers().is_empty());
    assert_eq!(response.name_servers()[0].rr_type(), RecordType::SOA);

    let add = update(2, "acme.example.com.", txt("udp-token", DNSClass::IN));
    let raw = exchange_udp(server.udp, &signed(&key, &add)).await;
    assert_eq!(
        Message::from_vec(&raw).unwrap().response_code(),
        ResponseCode::NoError
    );
    assert_eq!(server.txt_store.get_txt().as_deref(), Some("udp-token"));

    let response = Message::from_vec(
        &exchange_udp(server.udp, &query(3, CHALLENGE, RecordType::TXT)).await,
    )
    .unwrap();
    assert_eq!(txt_answer(&response).as_deref(), Some("udp-token"));
    assert_eq!(response.answers()[0].ttl(), 60);

    let delete = update(4, "acme.example.com.", txt("udp-token", DNSClass::NONE));
    let raw = exchange_udp(server.udp, &signed(&key, &delete)).await;
    assert_eq!(
        Message::from_vec(&raw).unwrap().response_code(),
        ResponseCode::NoError
    );

    let response = Message::from_vec(
        &exchange_udp(server.udp, &query(5, CHALLENGE, RecordType::TXT)).await,
    )
    .unwrap();
    assert_eq!(txt_answer(&response), None);
    assert_eq!(server.txt_store.get_txt(), None);
}

#[tokio::test]
async fn tcp_serves_several_messages_per_connection() {
    let server = start_server().await;
    let key = tsig_key();
    let mut stream = TcpStream::connect(server.tcp).await.unwrap();

    let request = query(10, "acme.example.com.", RecordType::SOA);
    let response = Message::from_vec(&exchange_tcp(&mut stream, &request).await).unwrap();
    assert_eq!(response.response_code(), ResponseCode::NoError);
    assert_eq!(response.answers()[0].rr_type(), RecordType::SOA);

    let add = update(11, "acme.example.com.", txt("tcp-token", DNSClass::IN));
    let raw = signed(&key, &add);
    let request_mac = SignedMessage::extract(&raw).unwrap().unwrap().mac().to_vec();
    let response = exchange_tcp(&mut stream, &raw).await;
    let signed_response = SignedMessage::extract(&response).unwrap().unwrap();
    assert_eq!(
        key.verify_response(&signed_response, &request_mac, OffsetDateTime::now_utc()),
        Ok(())
    );

    let request = query(12, CHALLENGE, RecordType::TXT);
    let response = Message::from_vec(&exchange_tcp(&mut stream, &request).await).unwrap();
    assert_eq!(txt_answer(&response).as_deref(), Some("tcp-token"));
}

#[tokio::test]
async fn outside_zone_is_refused() {
    let server = start_server().await;

    let response = Message::from_vec(
        &exchange_udp(server.udp, &query(20, "www.example.org.", RecordType::A)).await,
    )
    .unwrap();

    assert_eq!(response.response_code(), ResponseCode::Refused);
}

#[tokio::test]
async fn unknown_name_in_zone_is_nxdomain() {
    let server = start_server().await;

    let response = Message::from_vec(
        &exchange_udp(server.udp, &query(21, "www.acme.example.com.", RecordType::A)).await,
    )
    .unwrap();

    assert_eq!(response.response_code(), ResponseCode::NXDomain);
    assert_eq!(response.name_servers()[0].rr_type(), RecordType::SOA);
}

#[tokio::test]
async fn unsigned_update_is_refused() {
    let server = start_server().await;
    let add = update(30, "acme.example.com.", txt("nope", DNSClass::IN));

    let response =
        Message::from_vec(&exchange_udp(server.udp, &add.to_vec().unwrap()).await).unwrap();

    assert_eq!(response.response_code(), ResponseCode::Refused);
    assert_eq!(server.txt_store.get_txt(), None);
}

#[tokio::test]
async fn update_with_wrong_secret_is_notauth() {
    let server = start_server().await;
    let wrong = TsigKey::new(
        Name::from_str("acme-update.").unwrap(),
        TsigAlgorithm::HmacSha256,
        b"not-the-configured-secret".to_vec(),
    );
    let add = update(31, "acme.example.com.", txt("forged", DNSClass::IN));

    let response =
        Message::from_vec(&exchange_udp(server.udp, &signed(&wrong, &add)).await).unwrap();

    assert_eq!(response.response_code(), ResponseCode::NotAuth);
    assert_eq!(server.txt_store.get_txt(), None);
}

#[tokio::test]
async fn update_for_other_zone_is_refused() {
    let server = start_server().await;
    let add = update(32, "example.com.", txt("elsewhere", DNSClass::IN));

    let response =
        Message::from_vec(&exchange_udp(server.udp, &signed(&tsig_key(), &add)).await).unwrap();

    assert_eq!(response.response_code(), ResponseCode::Refused);
    assert_eq!(server.txt_store.get_txt(), None);
}
