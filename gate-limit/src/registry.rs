use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use quanta::Instant;

/// Per-client limiter state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClientRecord {
    /// Requests left in the current window. Never below 1 once stored.
    pub remaining: u32,
    /// When the current window began, re-anchored on every forwarded request.
    pub window_start: Instant,
}

impl ClientRecord {
    pub fn fresh(max_requests: u32, now: Instant) -> Self {
        Self {
            remaining: max_requests,
            window_start: now,
        }
    }

    /// Whether `now` still falls inside the window anchored at
    /// `window_start`. A window end past the clock's range never closes.
    pub fn is_within(&self, now: Instant, window: Duration) -> bool {
        self.window_start
            .checked_add(window)
            .is_none_or(|end| now < end)
    }
}

/// Mapping from client identity to [`ClientRecord`].
///
/// Owned by a single gate. Records are created on first use and overwritten
/// on expiry; nothing removes them unless [`Registry::retain`] is called, so
/// the map grows with the number of distinct clients seen.
#[derive(Debug)]
pub struct Registry<K>
where
    K: Eq + Hash,
{
    records: DashMap<K, ClientRecord>,
}

impl<K> Default for Registry<K>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            records: DashMap::new(),
        }
    }
}

impl<K> Registry<K>
where
    K: Eq + Hash + Clone,
{
    /// Run `update` against the client's slot while holding its entry lock.
    ///
    /// `update` receives `None` when the client has no record yet and
    /// returns the record to store (or `None` to leave the slot as it is)
    /// together with its own result. Concurrent calls for the same key are
    /// serialized.
    pub fn update<T>(
        &self,
        key: &K,
        update: impl FnOnce(Option<ClientRecord>) -> (Option<ClientRecord>, T),
    ) -> T {
        match self.records.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let (next, out) = update(Some(*occupied.get()));
                if let Some(record) = next {
                    occupied.insert(record);
                }
                out
            }
            Entry::Vacant(vacant) => {
                let (next, out) = update(None);
                if let Some(record) = next {
                    vacant.insert(record);
                }
                out
            }
        }
    }
}

impl<K> Registry<K>
where
    K: Eq + Hash,
{
    pub fn get(&self, key: &K) -> Option<ClientRecord> {
        self.records.get(key).map(|r| *r)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Keep only the records for which `keep` returns true.
    pub fn retain(&self, mut keep: impl FnMut(&K, &ClientRecord) -> bool) {
        self.records.retain(|k, r| keep(k, r));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use quanta::Clock;

    #[test]
    fn it_creates_and_overwrites_records() {
        let (clock, _mock) = Clock::mock();
        let registry = Registry::<&str>::default();

        let created = registry.update(&"a", |current| {
            assert!(current.is_none());
            (Some(ClientRecord::fresh(3, clock.now())), true)
        });
        assert!(created);
        assert_eq!(registry.get(&"a").map(|r| r.remaining), Some(3));

        registry.update(&"a", |current| {
            let mut record = current.unwrap();
            record.remaining -= 1;
            (Some(record), ())
        });
        assert_eq!(registry.get(&"a").map(|r| r.remaining), Some(2));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn declining_to_store_leaves_slot_untouched() {
        let registry = Registry::<u8>::default();

        registry.update(&1, |_| (None, ()));

        assert!(registry.is_empty());
        assert!(registry.get(&1).is_none());
    }

    #[test]
    fn inspection_does_not_need_clone_keys() {
        #[derive(Debug, PartialEq, Eq, Hash)]
        struct Session(u64);

        let registry = Registry::<Session>::default();

        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(registry.get(&Session(1)).is_none());
        registry.retain(|_, _| false);
        assert!(format!("{registry:?}").starts_with("Registry"));
    }

    #[test]
    fn windows_past_the_clock_range_never_close() {
        let (clock, mock) = Clock::mock();
        let record = ClientRecord::fresh(1, clock.now());

        assert!(record.is_within(clock.now(), Duration::from_millis(u64::MAX)));
        mock.increment(Duration::from_secs(1));
        assert!(!record.is_within(clock.now(), Duration::from_secs(1)));
        assert!(record.is_within(clock.now(), Duration::from_millis(1001)));
    }

    #[test]
    fn retain_drops_records() {
        let (clock, _mock) = Clock::mock();
        let registry = Registry::<u8>::default();
        for key in 0..4 {
            registry.update(&key, |_| (Some(ClientRecord::fresh(1, clock.now())), ()));
        }

        registry.retain(|k, _| k % 2 == 0);

        assert_eq!(registry.len(), 2);
        assert!(registry.get(&1).is_none());
        assert!(registry.get(&2).is_some());
    }
}
