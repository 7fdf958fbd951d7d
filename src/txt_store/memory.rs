use crate::clock::{SharedClock, SystemClock};
use crate::txt_store::{TxtStore, RECORD_TTL};
use std::sync::{Arc, PoisonError, RwLock};
use time::OffsetDateTime;

#[derive(Debug, Clone)]
struct TxtRecord {
    value: String,
    expires_at: OffsetDateTime,
}

/// An in-memory [`TxtStore`]. Reads share a [`RwLock`], writes take it exclusively.
#[derive(Debug)]
pub struct InMemoryTxtStore {
    record: RwLock<Option<TxtRecord>>,
    clock: SharedClock,
}

impl InMemoryTxtStore {
    #[must_use]
    pub fn new(clock: SharedClock) -> Self {
        Self {
            record: RwLock::default(),
            clock,
        }
    }
}

impl Default for InMemoryTxtStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl TxtStore for InMemoryTxtStore {
    fn get_txt(&self) -> Option<String> {
        let record = self.record.read().unwrap_or_else(PoisonError::into_inner);
        match record.as_ref() {
            None => {
                tracing::debug!("TXT value requested, but none is set");
                None
            }
            Some(record) if self.clock.now() >= record.expires_at => {
                tracing::debug!("TXT value requested, but it expired at {}", record.expires_at);
                None
            }
            Some(record) => Some(record.value.clone()),
        }
    }

    fn set_txt(&self, value: String) {
        let expires_at = self.clock.now() + RECORD_TTL;
        let mut record = self.record.write().unwrap_or_else(PoisonError::into_inner);
        *record = Some(TxtRecord { value, expires_at });
    }

    fn delete_txt(&self) {
        let mut record = self.record.write().unwrap_or_else(PoisonError::into_inner);
        *record = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use time::Duration;

    fn store_with_clock() -> (InMemoryTxtStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        (InMemoryTxtStore::new(clock.clone()), clock)
    }

    #[test]
    fn empty_store_has_no_value() {
        let store = InMemoryTxtStore::default();
        assert_eq!(store.get_txt(), None);
    }

    #[test]
    fn set_then_get() {
        let store = InMemoryTxtStore::default();
        store.set_txt("test-token".to_string());
        assert_eq!(store.get_txt().as_deref(), Some("test-token"));
    }

    #[test]
    fn set_overwrites() {
        let store = InMemoryTxtStore::default();
        store.set_txt("first".to_string());
        store.set_txt("second".to_string());
        assert_eq!(store.get_txt().as_deref(), Some("second"));
    }

    #[test]
    fn delete_clears_value() {
        let store = InMemoryTxtStore::default();
        store.set_txt("to-delete".to_string());
        store.delete_txt();
        assert_eq!(store.get_txt(), None);
    }

    #[test]
    fn delete_on_empty_store_is_a_noop() {
        let store = InMemoryTxtStore::default();
        store.delete_txt();
        store.delete_txt();
        assert_eq!(store.get_txt(), None);
    }

    #[test]
    fn value_expires_lazily() {
        let (store, clock) = store_with_clock();
        store.set_txt("expiring".to_string());

        clock.advance(RECORD_TTL - Duration::seconds(1));
        assert_eq!(store.get_txt().as_deref(), Some("expiring"));

        clock.advance(Duration::seconds(1));
        assert_eq!(store.get_txt(), None);
    }

    #[test]
    fn set_restarts_expiry() {
        let (store, clock) = store_with_clock();
        store.set_txt("first".to_string());
        clock.advance(Duration::minutes(9));
        store.set_txt("second".to_string());
        clock.advance(Duration::minutes(9));
        assert_eq!(store.get_txt().as_deref(), Some("second"));
    }

    #[test]
    fn concurrent_readers_and_writers() {
        let store = Arc::new(InMemoryTxtStore::default());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for j in 0..100 {
                        if (i + j) % 3 == 0 {
                            store.set_txt(format!("token-{i}-{j}"));
                        } else if (i + j) % 7 == 0 {
                            store.delete_txt();
                        } else if let Some(value) = store.get_txt() {
                            assert!(value.starts_with("token-"));
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
