//! Dynamic TXT record storage.
//!
//! Holds at most one [RFC-8555][RFC-8555] [DNS-01] challenge response value, served for the
//! `_acme-challenge` name of the configured zone. A stored value lives for [`RECORD_TTL`] after it
//! was last set and is treated as absent once that has passed. Nothing sweeps expired values, they
//! are simply ignored on read.
//!
//! The only implementation is [`memory::InMemoryTxtStore`]. It is not durable across restarts.
//!
//! [RFC-8555]: https://www.rfc-editor.org/rfc/rfc8555
//! [DNS-01]: https://www.rfc-editor.org/rfc/rfc8555#section-8.4

use std::sync::Arc;
use time::Duration;

pub mod memory;

#[allow(clippy::module_name_repetitions)]
pub use memory::InMemoryTxtStore;

/// How long a value stays visible after [`TxtStore::set_txt`].
pub const RECORD_TTL: Duration = Duration::minutes(10);

/// `DynTxtStore` is a type alias for a [`TxtStore`] that can be shared by all of the concurrently
/// running DNS handlers. Implementations coordinate readers and writers internally.
#[allow(clippy::module_name_repetitions)]
pub type DynTxtStore = Arc<dyn TxtStore + Send + Sync>;

/// A trait describing storage of a single [RFC-8555][RFC-8555] [DNS-01] challenge response value.
///
/// [RFC-8555]: https://www.rfc-editor.org/rfc/rfc8555
/// [DNS-01]: https://www.rfc-editor.org/rfc/rfc8555#section-8.4
pub trait TxtStore {
    /// Get the current TXT value, if one is set and hasn't expired.
    fn get_txt(&self) -> Option<String>;

    /// Replace the TXT value, restarting its [`RECORD_TTL`].
    fn set_txt(&self, value: String);

    /// Remove the TXT value. Removing from an empty store is not an error.
    fn delete_txt(&self);
}
