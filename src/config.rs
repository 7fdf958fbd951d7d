use crate::dns::tsig::{TsigAlgorithm, TsigKey};
use crate::dns::Zone;
use crate::error::Error;
use base64::engine::general_purpose;
use base64::Engine;
use serde::{Deserialize, Deserializer};
use serde_with::{serde_as, DurationSeconds};
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufReader, Read};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use trust_dns_client::rr::LowerName;
use trust_dns_proto::rr::Name;

pub type SharedConfig = Arc<Config>;

#[serde_as]
#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    /// Zone apex. The challenge record is served at `_acme-challenge.<domain>`.
    #[serde(deserialize_with = "deserialize_fqdn")]
    pub domain: LowerName,
    /// Name server advertised in the apex SOA and NS records.
    #[serde(deserialize_with = "deserialize_fqdn")]
    pub ns_domain: LowerName,
    /// SOA responsible mailbox, either as `user@example.com` or `user.example.com`.
    /// Defaults to `hostmaster.<domain>`.
    #[serde(default)]
    pub ns_admin: Option<String>,
    #[serde(deserialize_with = "deserialize_fqdn")]
    pub tsig_key_name: LowerName,
    /// Standard BASE64 encoded shared secret.
    pub tsig_secret: String,
    #[serde(default = "default_tsig_algorithm")]
    pub tsig_algorithm: String,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_dns_tcp_timeout")]
    pub dns_tcp_timeout: Duration,
    /// When set, an HTTP health endpoint is served on this address.
    #[serde(default)]
    pub health_bind_addr: Option<SocketAddr>,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_health_timeout")]
    pub health_timeout: Duration,
}

fn default_tsig_algorithm() -> String {
    "hmac-sha512".to_string()
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 53))
}

fn default_dns_tcp_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_health_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Parse `name` as a fully qualified name, appending the trailing `.` if it's missing.
///
/// # Errors
///
/// Returns [`Error::InvalidName`] if `name` isn't a valid DNS name.
pub fn parse_fqdn(name: &str) -> Result<Name, Error> {
    let name = name.trim();
    let fqdn = if name.ends_with('.') {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("{name}."))
    };
    Name::from_ascii(fqdn.as_ref()).map_err(|err| Error::InvalidName(fqdn.into_owned(), err))
}

fn deserialize_fqdn<'de, D>(deserializer: D) -> Result<LowerName, D::Error>
where
    D: Deserializer<'de>,
{
    let name = String::deserialize(deserializer)?;
    parse_fqdn(&name)
        .map(LowerName::from)
        .map_err(serde::de::Error::custom)
}

impl Config {
    pub fn try_from_file(p: impl AsRef<Path>) -> Result<Self, Error> {
        let f = File::open(p)?;
        Self::try_from_reader(BufReader::new(f))
    }

    pub fn try_from_reader(reader: impl Read) -> Result<Self, Error> {
        let conf: Config = serde_json::from_reader(reader)?;
        // Surface bad names and secrets now rather than on the first request.
        conf.zone()?;
        conf.tsig_key()?;
        Ok(conf)
    }

    pub fn zone(&self) -> Result<Zone, Error> {
        Zone::new(
            &(&self.domain).into(),
            (&self.ns_domain).into(),
            self.ns_admin()?,
        )
    }

    pub fn tsig_key(&self) -> Result<TsigKey, Error> {
        let algorithm: TsigAlgorithm = self
            .tsig_algorithm
            .parse()
            .map_err(|()| Error::UnsupportedTsigAlgorithm(self.tsig_algorithm.clone()))?;
        let secret = general_purpose::STANDARD.decode(self.tsig_secret.trim())?;
        if secret.is_empty() {
            return Err(Error::EmptyTsigSecret);
        }
        Ok(TsigKey::new(
            (&self.tsig_key_name).into(),
            algorithm,
            secret,
        ))
    }

    pub fn ns_admin(&self) -> Result<Name, Error> {
        match &self.ns_admin {
            Some(ns_admin) => parse_fqdn(&Self::sanitized_ns_admin(ns_admin)),
            None => Ok(Name::from_ascii("hostmaster")?.append_domain(&(&self.domain).into())?),
        }
    }

    fn sanitized_ns_admin(ns_admin: &str) -> Cow<str> {
        match ns_admin.split_once('@') {
            Some((user, domain)) => {
                let user = user.replace('.', "\\.");
                Cow::Owned(format!("{user}.{domain}"))
            }
            _ => Cow::Borrowed(ns_admin),
        }
    }
}
