//! Fixtures shared by the DNS unit tests.

use crate::dns::tsig::{TsigAlgorithm, TsigKey};
use crate::dns::Zone;
use std::str::FromStr;
use time::OffsetDateTime;
use trust_dns_proto::op::{Message, MessageType, OpCode, Query};
use trust_dns_proto::rr::rdata::TXT;
use trust_dns_proto::rr::{DNSClass, Name, RData, Record, RecordType};

pub(crate) const ZONE: &str = "example.com.";
pub(crate) const CHALLENGE: &str = "_acme-challenge.example.com.";
pub(crate) const KEY_NAME: &str = "acme-update.";
pub(crate) const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

pub(crate) fn name(name: &str) -> Name {
    Name::from_str(name).unwrap()
}

pub(crate) fn zone() -> Zone {
    Zone::new(
        &name(ZONE),
        name("ns1.example.com."),
        name("hostmaster.example.com."),
    )
    .unwrap()
}

pub(crate) fn tsig_key() -> TsigKey {
    tsig_key_named(KEY_NAME)
}

pub(crate) fn tsig_key_named(key_name: &str) -> TsigKey {
    TsigKey::new(name(key_name), TsigAlgorithm::HmacSha512, SECRET.to_vec())
}

pub(crate) fn query_message(qname: &str, query_type: RecordType) -> Message {
    let mut message = Message::new();
    message
        .set_id(1234)
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .add_query(Query::query(name(qname), query_type));
    message
}

pub(crate) fn update_message(zone: &str, records: Vec<Record>) -> Message {
    let mut message = Message::new();
    message
        .set_id(4321)
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Update)
        .add_query(Query::query(name(zone), RecordType::SOA))
        .add_name_servers(records);
    message
}

pub(crate) fn sign(key: &TsigKey, message: &Message) -> Vec<u8> {
    key.sign(message.to_vec().unwrap(), None, OffsetDateTime::now_utc())
        .unwrap()
}

pub(crate) fn add_txt(value: &str) -> Record {
    Record::from_rdata(
        name(CHALLENGE),
        60,
        RData::TXT(TXT::new(vec![value.to_string()])),
    )
}

pub(crate) fn delete_txt(value: &str) -> Record {
    let mut record = Record::from_rdata(
        name(CHALLENGE),
        0,
        RData::TXT(TXT::new(vec![value.to_string()])),
    );
    record.set_dns_class(DNSClass::NONE);
    record
}

pub(crate) fn delete_rrset(rr_type: RecordType) -> Record {
    let mut record = Record::with(name(CHALLENGE), rr_type, 0);
    record.set_dns_class(DNSClass::ANY);
    record
}

pub(crate) fn txt_value(record: &Record) -> String {
    match record.data() {
        Some(RData::TXT(txt)) => txt
            .txt_data()
            .iter()
            .map(|s| String::from_utf8_lossy(s).into_owned())
            .collect(),
        other => panic!("expected TXT rdata, got {other:?}"),
    }
}

/// Encode an update of `records` followed by a TXT add of `value` whose class is replaced with
/// the raw `class` value, which the codec may not be able to represent.
pub(crate) fn update_with_last_class(records: Vec<Record>, value: &str, class: u16) -> Vec<u8> {
    let mut records = records;
    records.push(add_txt(value));
    let mut raw = update_message(ZONE, records).to_vec().unwrap();
    // class, ttl, rdlength, then one character-string
    let class_at = raw.len() - (1 + value.len()) - 2 - 4 - 2;
    assert_eq!(raw[class_at..class_at + 2], [0, 1]);
    raw[class_at..class_at + 2].copy_from_slice(&class.to_be_bytes());
    raw
}
