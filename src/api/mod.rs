//! Optional HTTP health endpoint.
//!
//! Only started when [`Config::health_bind_addr`][`crate::config::Config::health_bind_addr`] is
//! set. The challenge token is never exposed over HTTP; it's only managed with signed DNS updates.
//!
//! # API Endpoints
//!
//! ## `/healthcheck` (GET)
//!
//!   Returns HTTP 200 (OK) and the JSON body `{"ok":"healthy"}` when the service is operational.

mod routes;
pub mod server;

pub use server::new;
