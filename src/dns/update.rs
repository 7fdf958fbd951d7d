//! [RFC 2136] dynamic updates of the challenge TXT record.
//!
//! Updates must be signed with the configured TSIG key. They may only touch the
//! `_acme-challenge` name, and only its TXT record:
//!
//! | class  | RFC 2136 meaning  | accepted types | effect                   |
//! |--------|-------------------|----------------|--------------------------|
//! | `IN`   | add to an RRset   | `TXT`          | replace the stored value |
//! | `NONE` | delete an RR      | `TXT`          | clear the stored value   |
//! | `ANY`  | delete an RRset   | `TXT`, `ANY`   | clear the stored value   |
//!
//! Any other class is refused, including class values the message codec can't represent.
//!
//! Entries are applied in order. The first entry that fails stops processing and decides the
//! response code; entries before it stay applied.
//!
//! [RFC 2136]: https://www.rfc-editor.org/rfc/rfc2136

use crate::dns::tsig::{SignedMessage, TsigKey};
use crate::dns::{Response, Zone};
use crate::txt_store::TxtStore;
use time::OffsetDateTime;
use trust_dns_client::rr::LowerName;
use trust_dns_proto::op::{Header, Message, Query, ResponseCode};
use trust_dns_proto::rr::{DNSClass, Name, RData, Record, RecordType};
use trust_dns_proto::serialize::binary::{BinDecodable, BinDecoder};

/// What an update section entry asks for, by its class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UpdateAction {
    Add,
    DeleteRecord,
    DeleteRrset,
    Unsupported(DNSClass),
}

impl From<DNSClass> for UpdateAction {
    fn from(class: DNSClass) -> Self {
        match class {
            DNSClass::IN => Self::Add,
            DNSClass::NONE => Self::DeleteRecord,
            DNSClass::ANY => Self::DeleteRrset,
            other => Self::Unsupported(other),
        }
    }
}

/// An update section entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum UpdateEntry {
    Record(Record),
    /// An entry with a class value [`DNSClass`] has no variant for.
    UnknownClass { name: Name, class: u16 },
}

fn unsigned_reply(request: &Message, code: ResponseCode) -> Response {
    Response::unsigned(reply(request, code))
}

fn signed_reply(request: &Message, code: ResponseCode, request_mac: &[u8]) -> Response {
    Response {
        message: reply(request, code),
        request_mac: Some(request_mac.to_vec()),
    }
}

fn reply(request: &Message, code: ResponseCode) -> Message {
    let mut header = Header::response_from_request(request.header());
    header.set_response_code(code);
    let mut response = Message::new();
    response.set_header(header);
    response.add_queries(request.queries().iter().cloned());
    response
}

/// Authenticate and apply an `UPDATE` request.
///
/// `raw` must be the wire bytes `request` was decoded from; the TSIG MAC covers them.
pub(crate) fn process(
    zone: &Zone,
    tsig_key: &TsigKey,
    txt_store: &dyn TxtStore,
    request: &Message,
    raw: &[u8],
    now: OffsetDateTime,
) -> Response {
    let entries: Vec<UpdateEntry> = request
        .name_servers()
        .iter()
        .cloned()
        .map(UpdateEntry::Record)
        .collect();
    process_entries(zone, tsig_key, txt_store, request, &entries, raw, now)
}

/// Authenticate and apply an `UPDATE` request that failed to decode because one of its update
/// entries has a class value the codec doesn't know.
///
/// Returns `None` if `raw` is undecodable for any other reason.
pub(crate) fn process_undecodable(
    zone: &Zone,
    tsig_key: &TsigKey,
    txt_store: &dyn TxtStore,
    raw: &[u8],
    now: OffsetDateTime,
) -> Option<Response> {
    let (request, entries) = decode_with_unknown_classes(raw)?;
    Some(process_entries(
        zone, tsig_key, txt_store, &request, &entries, raw, now,
    ))
}

fn process_entries(
    zone: &Zone,
    tsig_key: &TsigKey,
    txt_store: &dyn TxtStore,
    request: &Message,
    entries: &[UpdateEntry],
    raw: &[u8],
    now: OffsetDateTime,
) -> Response {
    let signed = match SignedMessage::extract(raw) {
        Ok(Some(signed)) => signed,
        Ok(None) => {
            tracing::warn!("update {} refused: not TSIG signed", request.id());
            return unsigned_reply(request, ResponseCode::Refused);
        }
        Err(err) => {
            tracing::warn!("update {} rejected: {err}", request.id());
            return unsigned_reply(request, ResponseCode::FormErr);
        }
    };

    if !tsig_key.matches_name(signed.key_name()) {
        tracing::warn!(
            "update {} rejected: unknown TSIG key \"{}\"",
            request.id(),
            signed.key_name()
        );
        return unsigned_reply(request, ResponseCode::NotAuth);
    }

    if let Err(err) = tsig_key.verify_request(&signed, now) {
        tracing::warn!("update {} rejected: {err}", request.id());
        return unsigned_reply(request, ResponseCode::NotAuth);
    }

    let code = apply(zone, txt_store, request, entries);
    signed_reply(request, code, signed.mac())
}

/// Walk a message by hand, keeping its header, zone section and update section. Only succeeds
/// when at least one update entry has an unknown class.
fn decode_with_unknown_classes(raw: &[u8]) -> Option<(Message, Vec<UpdateEntry>)> {
    let mut decoder = BinDecoder::new(raw);
    let header = Header::read(&mut decoder).ok()?;
    let (zones, prerequisites, updates) = (
        header.query_count(),
        header.answer_count(),
        header.name_server_count(),
    );
    let mut request = Message::new();
    request.set_header(header);
    for _ in 0..zones {
        request.add_query(Query::read(&mut decoder).ok()?);
    }

    // Prerequisites aren't evaluated.
    for _ in 0..prerequisites {
        read_entry(raw, &mut decoder)?;
    }
    let mut entries = Vec::with_capacity(usize::from(updates));
    for _ in 0..updates {
        entries.push(read_entry(raw, &mut decoder)?);
    }

    entries
        .iter()
        .any(|entry| matches!(entry, UpdateEntry::UnknownClass { .. }))
        .then_some((request, entries))
}

fn read_entry(raw: &[u8], decoder: &mut BinDecoder<'_>) -> Option<UpdateEntry> {
    let start = decoder.index();
    let name = Name::read(decoder).ok()?;
    // type
    decoder.read_u16().ok()?;
    let class = decoder.read_u16().ok()?.unverified();
    // ttl
    decoder.read_u32().ok()?;
    let rdlength = decoder.read_u16().ok()?.unverified();
    decoder.read_slice(usize::from(rdlength)).ok()?;

    if DNSClass::from_u16(class).is_err() {
        return Some(UpdateEntry::UnknownClass { name, class });
    }
    let mut record_decoder = BinDecoder::new(raw);
    record_decoder.read_slice(start).ok()?;
    Record::read(&mut record_decoder)
        .ok()
        .map(UpdateEntry::Record)
}

fn apply(
    zone: &Zone,
    txt_store: &dyn TxtStore,
    request: &Message,
    entries: &[UpdateEntry],
) -> ResponseCode {
    match request.queries() {
        [zone_entry] if LowerName::from(zone_entry.name()) == *zone.apex() => {}
        zones => {
            tracing::warn!(
                "update {} refused: zone section {:?} is not \"{}\"",
                request.id(),
                zones.iter().map(|q| q.name().to_string()).collect::<Vec<_>>(),
                zone.apex()
            );
            return ResponseCode::Refused;
        }
    }

    for entry in entries {
        let applied = match entry {
            UpdateEntry::Record(record) => apply_record(zone, txt_store, record),
            UpdateEntry::UnknownClass { name, class } => {
                tracing::warn!("update refused: unsupported class {class} for \"{name}\"");
                Err(ResponseCode::Refused)
            }
        };
        if let Err(code) = applied {
            return code;
        }
    }
    ResponseCode::NoError
}

fn apply_record(
    zone: &Zone,
    txt_store: &dyn TxtStore,
    record: &Record,
) -> Result<(), ResponseCode> {
    let name = LowerName::from(record.name());
    if name != *zone.challenge_name() {
        tracing::warn!(
            "update refused: wrong name \"{name}\", expected \"{}\"",
            zone.challenge_name()
        );
        return Err(ResponseCode::Refused);
    }

    let rr_type = record.rr_type();
    match UpdateAction::from(record.dns_class()) {
        UpdateAction::Add => {
            if rr_type != RecordType::TXT {
                tracing::warn!("update refused: can't add {rr_type} record");
                return Err(ResponseCode::Refused);
            }
            let bytes = match record.data() {
                Some(RData::TXT(txt)) if !txt.txt_data().is_empty() => txt.txt_data().concat(),
                _ => {
                    tracing::warn!("update rejected: TXT record without data");
                    return Err(ResponseCode::FormErr);
                }
            };
            let Ok(value) = String::from_utf8(bytes) else {
                tracing::warn!("update rejected: TXT data is not UTF-8");
                return Err(ResponseCode::FormErr);
            };
            txt_store.set_txt(value);
            tracing::info!("update: set \"{name}\" TXT");
        }
        UpdateAction::DeleteRecord => {
            if rr_type != RecordType::TXT {
                tracing::warn!("update refused: can't delete {rr_type} record");
                return Err(ResponseCode::Refused);
            }
            txt_store.delete_txt();
            tracing::info!("update: deleted \"{name}\" TXT");
        }
        UpdateAction::DeleteRrset => {
            if !matches!(rr_type, RecordType::TXT | RecordType::ANY) {
                tracing::warn!("update refused: can't delete {rr_type} RRset");
                return Err(ResponseCode::Refused);
            }
            txt_store.delete_txt();
            tracing::info!("update: deleted \"{name}\" {rr_type} RRset");
        }
        UpdateAction::Unsupported(class) => {
            tracing::warn!("update refused: unsupported class {class}");
            return Err(ResponseCode::Refused);
        }
    }
    Ok(())
}
