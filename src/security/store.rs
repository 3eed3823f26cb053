//! Rate-limit state storage.
//!
//! Each key owns one [`ClientEntry`]: a hit counter and the instant its
//! window lapses. Windows are fixed, not sliding. A request arriving at or
//! after `expires_at` opens a fresh window with zero hits.

use std::fmt;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

/// Hit counter for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientEntry {
    pub hits: u32,
    pub expires_at: Instant,
}

impl ClientEntry {
    fn open(now: Instant, window: Duration) -> Self {
        Self {
            hits: 0,
            expires_at: now + window,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Outcome of checking a key before the request runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The request may proceed. `window` identifies the window a later
    /// [`ThrottleStore::record_hit`] applies to.
    Allowed { window: Instant },
    /// The key is at its limit until the window lapses.
    Rejected { retry_after: Duration },
}

/// Owned storage for per-key counters.
///
/// Implementations must make `admit` atomic per key. A shared store for
/// multiple processes can be plugged in through this trait.
pub trait ThrottleStore: Send + Sync + fmt::Debug {
    /// Open or reuse the window for `key` and decide whether a request may
    /// proceed. Never increments.
    fn admit(&self, key: &str, limit: u32, window: Duration, now: Instant) -> Admission;

    /// Count one hit against `key` if its window is still the one the request
    /// was admitted in. Returns whether the hit was counted.
    fn record_hit(&self, key: &str, window: Instant) -> bool;

    fn entry(&self, key: &str) -> Option<ClientEntry>;

    /// Number of tracked keys, expired or not.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry whose window has lapsed. Returns how many went.
    fn purge_expired(&self, now: Instant) -> usize;
}

/// In-process store backed by a sharded concurrent map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, ClientEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ThrottleStore for MemoryStore {
    fn admit(&self, key: &str, limit: u32, window: Duration, now: Instant) -> Admission {
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| ClientEntry::open(now, window));

        if entry.is_expired(now) {
            *entry = ClientEntry::open(now, window);
        }

        if entry.hits >= limit {
            Admission::Rejected {
                retry_after: entry.expires_at.saturating_duration_since(now),
            }
        } else {
            Admission::Allowed {
                window: entry.expires_at,
            }
        }
    }

    fn record_hit(&self, key: &str, window: Instant) -> bool {
        match self.entries.get_mut(key) {
            Some(mut entry) if entry.expires_at == window => {
                entry.hits = entry.hits.saturating_add(1);
                true
            }
            _ => false,
        }
    }

    fn entry(&self, key: &str) -> Option<ClientEntry> {
        self.entries.get(key).map(|entry| *entry)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn purge_expired(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }
}
