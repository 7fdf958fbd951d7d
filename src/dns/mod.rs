//! Authoritative DNS server for a single ACME challenge zone.
//!
//! # Zone Contents
//!
//! DNS Challenge Crab is authoritative for exactly one zone,
//! [`Config::domain`][`crate::config::Config::domain`], and serves:
//!
//! * a `SOA` record at the apex, built from
//!   [`Config::ns_domain`][`crate::config::Config::ns_domain`] and
//!   [`Config::ns_admin`][`crate::config::Config::ns_admin`] with a fixed serial,
//! * a `NS` record at the apex pointing at
//!   [`Config::ns_domain`][`crate::config::Config::ns_domain`],
//! * a `TXT` record at `_acme-challenge.<domain>`, if a [RFC-8555][RFC-8555] [DNS-01] challenge
//!   response value has been provisioned with a dynamic update and hasn't expired.
//!
//! E.g. with config:
//! ```json
//! {
//!   "domain": "acme.example.com",
//!   "ns_domain": "ns1.example.com",
//!   "ns_admin": "dns-admin@example.com",
//!   ...
//! }
//! ```
//!
//! A `SOA` query for `acme.example.com` would return:
//! ```bash
//! ❯ dig @127.0.0.1 -p 5353 acme.example.com +short SOA
//! ns1.example.com. dns-admin.example.com. 1 86400 7200 3600000 60
//! ```
//!
//! Every other name below the apex is `NXDOMAIN`, names that exist but lack the requested type get
//! an empty `NOERROR` answer, and the apex `SOA` is placed in the authority section of both.
//! Queries for names outside of the zone are `REFUSED`. All answers are authoritative.
//!
//! # Dynamic Updates
//!
//! The challenge `TXT` record is managed with [RFC 2136][RFC-2136] updates signed with the
//! configured [TSIG][RFC-8945] key, e.g. with `nsupdate`:
//!
//! ```bash
//! ❯ nsupdate -y hmac-sha512:acme-update:$SECRET <<EOF
//! server 127.0.0.1 5353
//! zone acme.example.com
//! update add _acme-challenge.acme.example.com 60 TXT "LPsIwTo7o8BoG0-vjCyGQGBWSVIPxI-i_X336eUOQZo"
//! send
//! EOF
//! ```
//!
//! Afterwards a `TXT` query for `_acme-challenge.acme.example.com` returns the value for up to
//! ten minutes, or until it's deleted with `update delete`. See [`update`] for the accepted
//! update forms and their response codes.
//!
//! [RFC-8555]: https://www.rfc-editor.org/rfc/rfc8555
//! [DNS-01]: https://www.rfc-editor.org/rfc/rfc8555#section-8.4
//! [RFC-2136]: https://www.rfc-editor.org/rfc/rfc2136
//! [RFC-8945]: https://www.rfc-editor.org/rfc/rfc8945

mod handlers;
mod query;
pub mod server;
#[cfg(test)]
mod testing;
pub mod tsig;
pub mod update;
mod zone;

pub use handlers::Handler;
pub use server::new;
pub use zone::Zone;

use trust_dns_proto::op::Message;

/// A response message, and the request MAC to TSIG sign it with, if any.
#[derive(Debug)]
pub(crate) struct Response {
    pub message: Message,
    pub request_mac: Option<Vec<u8>>,
}

impl Response {
    pub(crate) fn unsigned(message: Message) -> Self {
        Self {
            message,
            request_mac: None,
        }
    }
}
