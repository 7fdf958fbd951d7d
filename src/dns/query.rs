//! Authoritative answers for the single served zone.

use crate::dns::Zone;
use crate::txt_store::TxtStore;
use trust_dns_client::rr::LowerName;
use trust_dns_proto::op::{Header, Message, ResponseCode};
use trust_dns_proto::rr::{Record, RecordType};

/// Outcome of looking up a name and type in the zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Lookup {
    /// The name is outside of the zone.
    Refused,
    /// The name and type exist.
    Answer(Vec<Record>),
    /// The name exists, but not with the requested type.
    NoData,
    /// The name doesn't exist in the zone.
    NxDomain,
}

pub(crate) fn lookup(
    zone: &Zone,
    txt_store: &dyn TxtStore,
    name: &LowerName,
    query_type: RecordType,
) -> Lookup {
    if !zone.contains(name) {
        return Lookup::Refused;
    }

    if name == zone.apex() {
        return match query_type {
            RecordType::SOA => Lookup::Answer(vec![zone.soa_record()]),
            RecordType::ANY => Lookup::Answer(vec![zone.soa_record(), zone.ns_record()]),
            RecordType::NS => Lookup::Answer(vec![zone.ns_record()]),
            _ => Lookup::NoData,
        };
    }

    if name == zone.challenge_name() {
        return match query_type {
            RecordType::TXT | RecordType::ANY => txt_store
                .get_txt()
                .map_or(Lookup::NoData, |value| {
                    Lookup::Answer(vec![zone.txt_record(&value)])
                }),
            _ => Lookup::NoData,
        };
    }

    Lookup::NxDomain
}

/// Build the authoritative response to a `QUERY` request. Only the first question is answered.
pub(crate) fn respond(zone: &Zone, txt_store: &dyn TxtStore, request: &Message) -> Message {
    let mut header = Header::response_from_request(request.header());
    header.set_authoritative(true);
    let mut response = Message::new();
    response.set_header(header);

    let Some(query) = request.queries().first() else {
        tracing::debug!("query {} has no question", request.id());
        response.set_response_code(ResponseCode::FormErr);
        return response;
    };
    response.add_query(query.clone());

    let name = LowerName::from(query.name());
    let query_type = query.query_type();
    match lookup(zone, txt_store, &name, query_type) {
        Lookup::Refused => {
            tracing::debug!("refused query for \"{name}\" {query_type}: outside of zone");
            response.set_response_code(ResponseCode::Refused);
        }
        Lookup::Answer(records) => {
            tracing::debug!("answering \"{name}\" {query_type} with {} records", records.len());
            response.add_answers(records);
        }
        Lookup::NoData => {
            tracing::debug!("no {query_type} data for \"{name}\"");
            response.add_name_server(zone.soa_record());
        }
        Lookup::NxDomain => {
            tracing::debug!("NXDOMAIN for \"{name}\"");
            response.set_response_code(ResponseCode::NXDomain);
            response.add_name_server(zone.soa_record());
        }
    }
    response
}
