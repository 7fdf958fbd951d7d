//! DNS Challenge Crab
//!
//! A minimal authoritative DNS server for a single zone whose only dynamic content is the
//! [RFC-8555][RFC-8555] [DNS-01] challenge `TXT` record at `_acme-challenge.<domain>`.
//!
//! ACME clients provision and remove the challenge response with [RFC-2136][RFC-2136] dynamic
//! updates authenticated by a shared [TSIG][RFC-8945] key, e.g. with `nsupdate` or any ACME client
//! that supports the `rfc2136` DNS provider. Works with all authoritative DNS hosting providers that
//! support NS delegation or CNAME records.
//!
//! [RFC-8555]: https://www.rfc-editor.org/rfc/rfc8555
//! [DNS-01]: https://www.rfc-editor.org/rfc/rfc8555#section-8.4
//! [RFC-2136]: https://www.rfc-editor.org/rfc/rfc2136
//! [RFC-8945]: https://www.rfc-editor.org/rfc/rfc8945
//!
#![warn(clippy::pedantic)]

pub mod api;
pub mod clock;
pub mod config;
pub mod dns;
pub mod error;
pub mod txt_store;

pub use api::new as new_http;
pub use clock::{ManualClock, SharedClock, SystemClock};
pub use config::{Config, SharedConfig};
pub use dns::new as new_dns;
pub use txt_store::{DynTxtStore, InMemoryTxtStore, TxtStore};
