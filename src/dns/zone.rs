use crate::error::Error;
use trust_dns_client::rr::LowerName;
use trust_dns_proto::rr::rdata::{SOA, TXT};
use trust_dns_proto::rr::{Name, RData, Record};

/// First label of the only dynamic name in the zone.
pub const CHALLENGE_LABEL: &str = "_acme-challenge";

/// TTL for the challenge TXT answer.
pub const TXT_TTL: u32 = 60;
/// TTL for the synthesized apex SOA and NS records.
pub const APEX_TTL: u32 = 3_600;

/// Longest TXT character-string on the wire.
const MAX_CHARACTER_STRING: usize = 255;

// The zone never changes, so the serial never has to.
const SOA_SERIAL: u32 = 1;
const SOA_REFRESH: i32 = 86_400;
const SOA_RETRY: i32 = 7_200;
const SOA_EXPIRE: i32 = 3_600_000;
// Also the negative caching TTL for NXDOMAIN/NODATA answers.
const SOA_MINIMUM: u32 = 60;

/// The single zone served: its apex, the name server and mailbox advertised in the SOA, and the
/// derived `_acme-challenge` name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zone {
    apex: LowerName,
    challenge: LowerName,
    ns_domain: Name,
    ns_admin: Name,
}

impl Zone {
    /// Build a zone rooted at `apex`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DNSError`] if the challenge name can't be formed below `apex` (e.g. it
    /// would exceed the maximum name length).
    pub fn new(apex: &Name, ns_domain: Name, ns_admin: Name) -> Result<Self, Error> {
        let challenge = Name::from_ascii(CHALLENGE_LABEL)?.append_domain(apex)?;
        Ok(Zone {
            apex: apex.into(),
            challenge: challenge.into(),
            ns_domain,
            ns_admin,
        })
    }

    #[must_use]
    pub fn apex(&self) -> &LowerName {
        &self.apex
    }

    #[must_use]
    pub fn challenge_name(&self) -> &LowerName {
        &self.challenge
    }

    /// Whether `name` is the apex or any name below it.
    #[must_use]
    pub fn contains(&self, name: &LowerName) -> bool {
        self.apex.zone_of(name)
    }

    #[must_use]
    pub fn soa_record(&self) -> Record {
        let soa_rdata = RData::SOA(SOA::new(
            self.ns_domain.clone(),
            self.ns_admin.clone(),
            SOA_SERIAL,
            SOA_REFRESH,
            SOA_RETRY,
            SOA_EXPIRE,
            SOA_MINIMUM,
        ));
        Record::from_rdata((&self.apex).into(), APEX_TTL, soa_rdata)
    }

    #[must_use]
    pub fn ns_record(&self) -> Record {
        Record::from_rdata(
            (&self.apex).into(),
            APEX_TTL,
            RData::NS(self.ns_domain.clone()),
        )
    }

    /// The challenge TXT record holding `value`, split into as many character-strings as needed.
    #[must_use]
    pub fn txt_record(&self, value: &str) -> Record {
        let mut strings: Vec<&[u8]> = value.as_bytes().chunks(MAX_CHARACTER_STRING).collect();
        if strings.is_empty() {
            strings.push(&[]);
        }
        Record::from_rdata(
            (&self.challenge).into(),
            TXT_TTL,
            RData::TXT(TXT::from_bytes(strings)),
        )
    }
}
