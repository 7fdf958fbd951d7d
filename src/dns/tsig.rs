//! Secret Key Transaction Authentication for DNS (TSIG), as specified by [RFC 8945].
//!
//! Requests are verified from their raw wire bytes: [`SignedMessage::extract`] locates the TSIG RR
//! at the end of the additional section and [`TsigKey::verify_request`] checks its MAC. Responses
//! are signed by appending a freshly computed TSIG RR to an already encoded message with
//! [`TsigKey::sign`], passing the request MAC so the reply is bound to the request it answers.
//!
//! Only HMAC-SHA256 and HMAC-SHA512 are supported.
//!
//! [RFC 8945]: https://datatracker.ietf.org/doc/html/rfc8945

use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use lazy_static::lazy_static;
use sha2::{Sha256, Sha512};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use trust_dns_proto::op::{Header, Query};
use trust_dns_proto::rr::{Name, Record};
use trust_dns_proto::serialize::binary::{BinDecodable, BinDecoder};

const TSIG_TYPE: u16 = 250;
const CLASS_ANY: u16 = 255;

const ID_END: usize = 2;
const ARCOUNT_START: usize = 10;
const ARCOUNT_END: usize = 12;

/// Allowed clock skew (seconds) between signer and verifier.
pub const DEFAULT_FUDGE: u16 = 300;

lazy_static! {
    static ref HMAC_SHA256_NAME: Name = Name::from_ascii("hmac-sha256.").unwrap();
    static ref HMAC_SHA512_NAME: Name = Name::from_ascii("hmac-sha512.").unwrap();
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TsigError {
    #[error("malformed TSIG record")]
    Malformed,
    #[error("TSIG key or algorithm not recognized")]
    BadKey,
    #[error("TSIG signature does not verify")]
    BadSig,
    #[error("TSIG time signed {time_signed} is outside {now} \u{b1} {fudge}s")]
    BadTime { time_signed: u64, now: i64, fudge: u16 },
    #[error("message too large to sign")]
    TooLarge,
}

/// A supported TSIG HMAC algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TsigAlgorithm {
    HmacSha256,
    HmacSha512,
}

impl TsigAlgorithm {
    /// The algorithm name used on the wire.
    #[must_use]
    pub fn name(self) -> &'static Name {
        match self {
            Self::HmacSha256 => &HMAC_SHA256_NAME,
            Self::HmacSha512 => &HMAC_SHA512_NAME,
        }
    }

    #[must_use]
    pub fn from_name(name: &Name) -> Option<Self> {
        [Self::HmacSha256, Self::HmacSha512]
            .into_iter()
            .find(|alg| alg.name() == name)
    }

    fn output_size(self) -> usize {
        match self {
            Self::HmacSha256 => <Hmac<Sha256> as hmac::digest::OutputSizeUser>::output_size(),
            Self::HmacSha512 => <Hmac<Sha512> as hmac::digest::OutputSizeUser>::output_size(),
        }
    }

    fn mac(self, key: &[u8], data: &[&[u8]]) -> Result<Vec<u8>, TsigError> {
        match self {
            Self::HmacSha256 => compute::<Hmac<Sha256>>(key, data),
            Self::HmacSha512 => compute::<Hmac<Sha512>>(key, data),
        }
    }

    fn verify(self, key: &[u8], data: &[&[u8]], tag: &[u8]) -> Result<(), TsigError> {
        match self {
            Self::HmacSha256 => verify_truncated::<Hmac<Sha256>>(key, data, tag),
            Self::HmacSha512 => verify_truncated::<Hmac<Sha512>>(key, data, tag),
        }
    }
}

impl FromStr for TsigAlgorithm {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_end_matches('.').to_ascii_lowercase().as_str() {
            "hmac-sha256" => Ok(Self::HmacSha256),
            "hmac-sha512" => Ok(Self::HmacSha512),
            _ => Err(()),
        }
    }
}

impl fmt::Display for TsigAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn keyed<M: Mac + KeyInit>(key: &[u8], data: &[&[u8]]) -> Result<M, TsigError> {
    let mut mac = <M as KeyInit>::new_from_slice(key).map_err(|_| TsigError::BadKey)?;
    for part in data {
        mac.update(part);
    }
    Ok(mac)
}

fn compute<M: Mac + KeyInit>(key: &[u8], data: &[&[u8]]) -> Result<Vec<u8>, TsigError> {
    Ok(keyed::<M>(key, data)?.finalize().into_bytes().to_vec())
}

fn verify_truncated<M: Mac + KeyInit>(
    key: &[u8],
    data: &[&[u8]],
    tag: &[u8],
) -> Result<(), TsigError> {
    keyed::<M>(key, data)?
        .verify_truncated_left(tag)
        .map_err(|_| TsigError::BadSig)
}

/// The fields of a TSIG RR read from a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TsigRecord {
    pub key_name: Name,
    pub algorithm: Name,
    pub time_signed: u64,
    pub fudge: u16,
    pub mac: Vec<u8>,
    pub original_id: u16,
    pub error: u16,
    pub other: Vec<u8>,
}

/// A wire message whose last additional record is a TSIG RR.
#[derive(Debug, Clone)]
pub struct SignedMessage<'a> {
    message: &'a [u8],
    tsig_start: usize,
    record: TsigRecord,
}

impl<'a> SignedMessage<'a> {
    /// Find the TSIG RR of a wire message.
    ///
    /// Returns `Ok(None)` when the message has no TSIG RR as its final record.
    ///
    /// # Errors
    ///
    /// Returns [`TsigError::Malformed`] when the message can't be walked, or when its final record
    /// claims to be a TSIG RR but doesn't parse as one.
    pub fn extract(message: &'a [u8]) -> Result<Option<Self>, TsigError> {
        let mut decoder = BinDecoder::new(message);
        let header = Header::read(&mut decoder).map_err(|_| TsigError::Malformed)?;
        if header.additional_count() == 0 {
            return Ok(None);
        }
        for _ in 0..header.query_count() {
            Query::read(&mut decoder).map_err(|_| TsigError::Malformed)?;
        }
        let preceding = u32::from(header.answer_count())
            + u32::from(header.name_server_count())
            + u32::from(header.additional_count())
            - 1;
        for _ in 0..preceding {
            Record::read(&mut decoder).map_err(|_| TsigError::Malformed)?;
        }

        let tsig_start = decoder.index();
        let key_name = Name::read(&mut decoder).map_err(|_| TsigError::Malformed)?;
        if read_u16(&mut decoder)? != TSIG_TYPE {
            return Ok(None);
        }
        if read_u16(&mut decoder)? != CLASS_ANY || read_u32(&mut decoder)? != 0 {
            return Err(TsigError::Malformed);
        }
        let rdlength = usize::from(read_u16(&mut decoder)?);
        let rdata_start = decoder.index();

        let algorithm = Name::read(&mut decoder).map_err(|_| TsigError::Malformed)?;
        let time_high = u64::from(read_u16(&mut decoder)?);
        let time_low = u64::from(read_u32(&mut decoder)?);
        let fudge = read_u16(&mut decoder)?;
        let mac_size = usize::from(read_u16(&mut decoder)?);
        let mac = read_vec(&mut decoder, mac_size)?;
        let original_id = read_u16(&mut decoder)?;
        let error = read_u16(&mut decoder)?;
        let other_len = usize::from(read_u16(&mut decoder)?);
        let other = read_vec(&mut decoder, other_len)?;

        if decoder.index() - rdata_start != rdlength || decoder.index() != message.len() {
            return Err(TsigError::Malformed);
        }

        Ok(Some(Self {
            message,
            tsig_start,
            record: TsigRecord {
                key_name,
                algorithm,
                time_signed: (time_high << 32) | time_low,
                fudge,
                mac,
                original_id,
                error,
                other,
            },
        }))
    }

    #[must_use]
    pub fn record(&self) -> &TsigRecord {
        &self.record
    }

    #[must_use]
    pub fn key_name(&self) -> &Name {
        &self.record.key_name
    }

    #[must_use]
    pub fn mac(&self) -> &[u8] {
        &self.record.mac
    }

    /// The message bytes as they were before signing: without the TSIG RR, with the ARCOUNT
    /// decremented and the original message ID restored.
    fn unsigned_message(&self) -> Vec<u8> {
        let mut unsigned = self.message[..self.tsig_start].to_vec();
        unsigned[..ID_END].copy_from_slice(&self.record.original_id.to_be_bytes());
        let arcount = u16::from_be_bytes([
            unsigned[ARCOUNT_START],
            unsigned[ARCOUNT_START + 1],
        ]);
        unsigned[ARCOUNT_START..ARCOUNT_END]
            .copy_from_slice(&arcount.saturating_sub(1).to_be_bytes());
        unsigned
    }
}

fn read_u16(decoder: &mut BinDecoder<'_>) -> Result<u16, TsigError> {
    decoder
        .read_u16()
        .map(|v| v.unverified())
        .map_err(|_| TsigError::Malformed)
}

fn read_u32(decoder: &mut BinDecoder<'_>) -> Result<u32, TsigError> {
    decoder
        .read_u32()
        .map(|v| v.unverified())
        .map_err(|_| TsigError::Malformed)
}

fn read_vec(decoder: &mut BinDecoder<'_>, len: usize) -> Result<Vec<u8>, TsigError> {
    decoder
        .read_vec(len)
        .map(|v| v.unverified())
        .map_err(|_| TsigError::Malformed)
}

/// Uncompressed, lowercased wire form of a name, as fed to the MAC.
#[allow(clippy::cast_possible_truncation)]
fn canonical_wire(name: &Name) -> Vec<u8> {
    let mut wire = Vec::new();
    for label in name.iter() {
        wire.push(label.len() as u8);
        wire.extend(label.iter().map(u8::to_ascii_lowercase));
    }
    wire.push(0);
    wire
}

fn time_signed_bytes(time_signed: u64) -> [u8; 6] {
    let bytes = time_signed.to_be_bytes();
    [bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7]]
}

/// A named shared secret used to verify requests and sign responses.
#[derive(Clone, PartialEq, Eq)]
pub struct TsigKey {
    name: Name,
    algorithm: TsigAlgorithm,
    secret: Vec<u8>,
    fudge: u16,
}

impl fmt::Debug for TsigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TsigKey")
            .field("name", &self.name)
            .field("algorithm", &self.algorithm)
            .field("fudge", &self.fudge)
            .finish_non_exhaustive()
    }
}

impl TsigKey {
    #[must_use]
    pub fn new(name: Name, algorithm: TsigAlgorithm, secret: Vec<u8>) -> Self {
        Self {
            name: name.to_lowercase(),
            algorithm,
            secret,
            fudge: DEFAULT_FUDGE,
        }
    }

    #[must_use]
    pub fn name(&self) -> &Name {
        &self.name
    }

    #[must_use]
    pub fn algorithm(&self) -> TsigAlgorithm {
        self.algorithm
    }

    /// Whether a TSIG RR owner name refers to this key.
    #[must_use]
    pub fn matches_name(&self, key_name: &Name) -> bool {
        self.name == *key_name
    }

    /// Verify the MAC and time of a signed request.
    ///
    /// # Errors
    ///
    /// Returns [`TsigError::BadKey`] for a different key name or algorithm,
    /// [`TsigError::BadSig`] if the MAC doesn't verify, and [`TsigError::BadTime`] if the
    /// signature is outside of its fudge window.
    pub fn verify_request(
        &self,
        signed: &SignedMessage<'_>,
        now: OffsetDateTime,
    ) -> Result<(), TsigError> {
        self.verify(signed, None, now)
    }

    /// Verify the MAC and time of a signed response to a request that carried `request_mac`.
    ///
    /// # Errors
    ///
    /// As for [`TsigKey::verify_request`].
    pub fn verify_response(
        &self,
        signed: &SignedMessage<'_>,
        request_mac: &[u8],
        now: OffsetDateTime,
    ) -> Result<(), TsigError> {
        self.verify(signed, Some(request_mac), now)
    }

    fn verify(
        &self,
        signed: &SignedMessage<'_>,
        request_mac: Option<&[u8]>,
        now: OffsetDateTime,
    ) -> Result<(), TsigError> {
        let record = signed.record();
        if !self.matches_name(&record.key_name)
            || TsigAlgorithm::from_name(&record.algorithm) != Some(self.algorithm)
        {
            return Err(TsigError::BadKey);
        }

        let output_size = self.algorithm.output_size();
        let min_size = 10_usize.max((output_size + 1) / 2);
        if record.mac.len() > output_size || record.mac.len() < min_size {
            return Err(TsigError::BadSig);
        }

        let prior = PriorMac::new(request_mac)?;
        let unsigned = signed.unsigned_message();
        let variables = self.variables(
            &record.algorithm,
            record.time_signed,
            record.fudge,
            record.error,
            &record.other,
        );
        let mut data: Vec<&[u8]> = prior.parts();
        data.push(&unsigned);
        data.push(&variables);
        self.algorithm.verify(&self.secret, &data, &record.mac)?;

        let now = now.unix_timestamp();
        let skew = i128::from(now) - i128::from(record.time_signed);
        if skew.abs() > i128::from(record.fudge) {
            return Err(TsigError::BadTime {
                time_signed: record.time_signed,
                now,
                fudge: record.fudge,
            });
        }
        Ok(())
    }

    /// Append a TSIG RR to an encoded, unsigned message.
    ///
    /// `request_mac` is the MAC of the request being answered, or `None` when signing a request.
    ///
    /// # Errors
    ///
    /// Returns [`TsigError::Malformed`] if `message` is shorter than a DNS header and
    /// [`TsigError::TooLarge`] if it already has the maximum number of additional records.
    pub fn sign(
        &self,
        mut message: Vec<u8>,
        request_mac: Option<&[u8]>,
        now: OffsetDateTime,
    ) -> Result<Vec<u8>, TsigError> {
        if message.len() < ARCOUNT_END {
            return Err(TsigError::Malformed);
        }
        let time_signed = u64::try_from(now.unix_timestamp()).unwrap_or_default();
        let algorithm = self.algorithm.name();
        let variables = self.variables(algorithm, time_signed, self.fudge, 0, &[]);

        let prior = PriorMac::new(request_mac)?;
        let mut data: Vec<&[u8]> = prior.parts();
        data.push(&message);
        data.push(&variables);
        let mac = self.algorithm.mac(&self.secret, &data)?;

        let mut rdata = canonical_wire(algorithm);
        rdata.extend_from_slice(&time_signed_bytes(time_signed));
        rdata.extend_from_slice(&self.fudge.to_be_bytes());
        rdata.extend_from_slice(
            &u16::try_from(mac.len())
                .map_err(|_| TsigError::TooLarge)?
                .to_be_bytes(),
        );
        rdata.extend_from_slice(&mac);
        rdata.extend_from_slice(&message[..ID_END]);
        rdata.extend_from_slice(&0_u16.to_be_bytes());
        rdata.extend_from_slice(&0_u16.to_be_bytes());

        let arcount = u16::from_be_bytes([message[ARCOUNT_START], message[ARCOUNT_START + 1]])
            .checked_add(1)
            .ok_or(TsigError::TooLarge)?;
        message[ARCOUNT_START..ARCOUNT_END].copy_from_slice(&arcount.to_be_bytes());

        message.extend_from_slice(&canonical_wire(&self.name));
        message.extend_from_slice(&TSIG_TYPE.to_be_bytes());
        message.extend_from_slice(&CLASS_ANY.to_be_bytes());
        message.extend_from_slice(&0_u32.to_be_bytes());
        message.extend_from_slice(
            &u16::try_from(rdata.len())
                .map_err(|_| TsigError::TooLarge)?
                .to_be_bytes(),
        );
        message.extend_from_slice(&rdata);
        Ok(message)
    }

    /// The TSIG variables of RFC 8945 section 4.3.3.
    fn variables(
        &self,
        algorithm: &Name,
        time_signed: u64,
        fudge: u16,
        error: u16,
        other: &[u8],
    ) -> Vec<u8> {
        let mut vars = canonical_wire(&self.name);
        vars.extend_from_slice(&CLASS_ANY.to_be_bytes());
        vars.extend_from_slice(&0_u32.to_be_bytes());
        vars.extend_from_slice(&canonical_wire(algorithm));
        vars.extend_from_slice(&time_signed_bytes(time_signed));
        vars.extend_from_slice(&fudge.to_be_bytes());
        vars.extend_from_slice(&error.to_be_bytes());
        vars.extend_from_slice(&u16::try_from(other.len()).unwrap_or(u16::MAX).to_be_bytes());
        vars.extend_from_slice(other);
        vars
    }
}

/// The request MAC prefix of a response MAC computation.
struct PriorMac<'a> {
    len: [u8; 2],
    mac: Option<&'a [u8]>,
}

impl<'a> PriorMac<'a> {
    fn new(mac: Option<&'a [u8]>) -> Result<Self, TsigError> {
        let len = match mac {
            Some(mac) => u16::try_from(mac.len()).map_err(|_| TsigError::TooLarge)?,
            None => 0,
        };
        Ok(Self {
            len: len.to_be_bytes(),
            mac,
        })
    }

    fn parts(&self) -> Vec<&[u8]> {
        match self.mac {
            Some(mac) => vec![&self.len[..], mac],
            None => vec![],
        }
    }
}
