//! Error types.

use crate::dns::tsig::TsigError;
use trust_dns_proto::error::ProtoError;

/// Error enumerates the possible DNS Challenge Crab error states.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Returned when a name in the [`Config`][crate::config::Config] can't be parsed as a DNS
    /// name.
    #[error("invalid DNS name \"{0}\"")]
    InvalidName(String, #[source] ProtoError),

    /// Returned when the [`Config::tsig_secret`][crate::config::Config::tsig_secret] isn't valid
    /// standard BASE64. The server refuses to start rather than failing each update.
    #[error("TSIG secret is not valid base64")]
    InvalidTsigSecret(#[from] base64::DecodeError),

    /// Returned when the [`Config::tsig_secret`][crate::config::Config::tsig_secret] decodes to
    /// zero bytes.
    #[error("TSIG secret is empty")]
    EmptyTsigSecret,

    /// Returned when the [`Config::tsig_algorithm`][crate::config::Config::tsig_algorithm] isn't
    /// one of the supported HMAC algorithms.
    #[error("unsupported TSIG algorithm \"{0}\"")]
    UnsupportedTsigAlgorithm(String),

    /// Returned when signing a response with the configured TSIG key fails.
    #[error("TSIG error")]
    Tsig(#[from] TsigError),

    /// Returned when a generic IO error occurs.
    #[error("an IO error occurred")]
    IO(#[from] std::io::Error),

    /// Returned when [trying to load a `Config`][crate::config::Config::try_from_file] fails due
    /// to invalid JSON content.
    #[error("invalid JSON")]
    InvalidJSON(#[from] serde_json::Error),

    /// Returned when the DNS server encounters a generic DNS protocol error.
    #[error("DNS error")]
    DNSError(#[from] ProtoError),
}
