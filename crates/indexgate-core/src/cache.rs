//! Per-symbol freshness cache for realtime snapshots.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use time::OffsetDateTime;

use crate::clock::Clock;
use crate::fetch::Unavailable;
use crate::{RealtimeSnapshot, SnapshotStatus, Symbol};

/// Default lifetime of a `live` snapshot.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Default lifetime of a `stale-fallback` snapshot.
pub const DEFAULT_FALLBACK_TTL: Duration = Duration::from_secs(60);

/// Stored snapshot and the instant it was fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub snapshot: RealtimeSnapshot,
    pub fetched_at: OffsetDateTime,
}

#[derive(Debug, Default)]
struct SlotState {
    entry: Option<CacheEntry>,
    last_failure: Option<Unavailable>,
}

/// One symbol's slot. `refreshes` counts completed refresh attempts so a
/// caller that queued behind a refresh can tell it already happened.
#[derive(Debug, Default)]
struct Slot {
    state: tokio::sync::Mutex<SlotState>,
    refreshes: AtomicU64,
}

/// Thread-safe snapshot cache with single-flight refresh.
///
/// The outer map lock is held only to find or create a slot. Each slot has
/// its own async mutex, so a slow refresh for one symbol never blocks
/// another symbol.
#[derive(Clone)]
pub struct FreshnessCache {
    slots: Arc<Mutex<HashMap<Symbol, Arc<Slot>>>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    fallback_ttl: Duration,
}

impl std::fmt::Debug for FreshnessCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FreshnessCache")
            .field("ttl", &self.ttl)
            .field("fallback_ttl", &self.fallback_ttl)
            .finish_non_exhaustive()
    }
}

impl FreshnessCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
            clock,
            ttl: DEFAULT_TTL,
            fallback_ttl: DEFAULT_FALLBACK_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_fallback_ttl(mut self, fallback_ttl: Duration) -> Self {
        self.fallback_ttl = fallback_ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn fallback_ttl(&self) -> Duration {
        self.fallback_ttl
    }

    /// Return the stored snapshot if it is still fresh, otherwise run `fetch`.
    ///
    /// - A successful fetch replaces the entry, stamped with the clock's now.
    /// - A failed fetch leaves any previous entry untouched and is returned.
    /// - Callers that were waiting on the slot while another caller refreshed
    ///   it get that refresh's outcome instead of calling upstream again.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        symbol: &Symbol,
        fetch: F,
    ) -> Result<RealtimeSnapshot, Unavailable>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<RealtimeSnapshot, Unavailable>>,
    {
        let slot = self.slot(symbol);
        let seen_refreshes = slot.refreshes.load(Ordering::Acquire);
        let mut state = slot.state.lock().await;

        if let Some(entry) = &state.entry {
            if self.is_fresh(entry) {
                tracing::debug!(%symbol, status = %entry.snapshot.status, "cache hit");
                return Ok(entry.snapshot.clone());
            }
        }

        if slot.refreshes.load(Ordering::Acquire) != seen_refreshes {
            if let Some(failure) = &state.last_failure {
                tracing::debug!(%symbol, "reusing failure from concurrent refresh");
                return Err(failure.clone());
            }
        }

        tracing::debug!(%symbol, "cache miss, refreshing");
        let outcome = fetch().await;
        match &outcome {
            Ok(snapshot) => {
                state.entry = Some(CacheEntry {
                    snapshot: snapshot.clone(),
                    fetched_at: self.clock.now_utc(),
                });
                state.last_failure = None;
            }
            Err(failure) => {
                state.last_failure = Some(failure.clone());
            }
        }
        slot.refreshes.fetch_add(1, Ordering::Release);

        outcome
    }

    /// Stored entry for `symbol` regardless of age.
    pub async fn peek(&self, symbol: &Symbol) -> Option<CacheEntry> {
        let slot = self.existing_slot(symbol)?;
        let state = slot.state.lock().await;
        state.entry.clone()
    }

    /// Number of symbols holding an entry, fresh or not.
    pub async fn len(&self) -> usize {
        let slots: Vec<Arc<Slot>> = self
            .lock_slots()
            .values()
            .cloned()
            .collect();

        let mut count = 0;
        for slot in slots {
            if slot.state.lock().await.entry.is_some() {
                count += 1;
            }
        }
        count
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn is_fresh(&self, entry: &CacheEntry) -> bool {
        let ttl = match entry.snapshot.status {
            SnapshotStatus::Live => self.ttl,
            SnapshotStatus::StaleFallback => self.fallback_ttl,
        };
        let age = self.clock.now_utc() - entry.fetched_at;
        age < ttl
    }

    fn slot(&self, symbol: &Symbol) -> Arc<Slot> {
        let mut slots = self.lock_slots();
        Arc::clone(slots.entry(symbol.clone()).or_default())
    }

    fn existing_slot(&self, symbol: &Symbol) -> Option<Arc<Slot>> {
        self.lock_slots().get(symbol).cloned()
    }

    fn lock_slots(&self) -> std::sync::MutexGuard<'_, HashMap<Symbol, Arc<Slot>>> {
        self.slots.lock().expect("cache slot map lock is not poisoned")
    }
}
