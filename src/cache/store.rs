//! In-memory cache entry store with tag invalidation and subscriber-scoped
//! retention.
//!
//! The store is a plain constructible object; tests build as many
//! independent instances as they like. All operations are synchronous and
//! in-memory; the lock is never held across an await point.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::CacheConfig;

use super::key::CacheKey;

/// Label connecting mutations to the queries they may invalidate.
/// Many-to-many: a query may provide several tags, a mutation may
/// invalidate several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
  FundRequest,
  SharedExpense,
  Fund,
  FundSubscription,
  KycStatus,
}

/// A materialized query result handed back by `lookup`.
#[derive(Debug, Clone)]
pub struct CachedValue {
  pub value: serde_json::Value,
  pub cached_at: DateTime<Utc>,
  /// True when the entry was invalidated by a mutation or outlived the
  /// stale time. Stale values may be shown but must trigger a refetch.
  pub stale: bool,
}

struct Slot {
  value: serde_json::Value,
  tags: Vec<Tag>,
  cached_at: DateTime<Utc>,
  invalidated: bool,
}

#[derive(Default)]
struct EntryState {
  slot: Option<Slot>,
  subscribers: usize,
  /// Set while no subscriber is attached; entry is dropped once elapsed.
  evict_at: Option<Instant>,
  /// Bumped on eviction and on tag invalidation so an in-flight fetch
  /// that started against an older incarnation cannot write its result.
  generation: u64,
  /// Fetches currently in flight against this generation. The record is
  /// pruned only once this reaches zero.
  pending: usize,
  /// Tags the pending fetch will register, so a mutation can supersede a
  /// result that has not landed yet.
  pending_tags: Vec<Tag>,
}

pub struct CacheStore {
  entries: Mutex<HashMap<CacheKey, EntryState>>,
  retention: Duration,
  stale_time: Duration,
}

impl CacheStore {
  pub fn new(config: &CacheConfig) -> Self {
    Self {
      entries: Mutex::new(HashMap::new()),
      retention: config.retention(),
      stale_time: config.stale_time(),
    }
  }

  /// Look up the entry for `key`, sweeping expired entries first.
  pub fn lookup(&self, key: &CacheKey) -> Option<CachedValue> {
    let mut entries = self.lock();
    Self::sweep(&mut entries, Instant::now());

    let state = entries.get(key)?;
    let slot = state.slot.as_ref()?;
    let aged = Utc::now() - slot.cached_at
      > chrono::Duration::from_std(self.stale_time).unwrap_or(chrono::Duration::MAX);

    Some(CachedValue {
      value: slot.value.clone(),
      cached_at: slot.cached_at,
      stale: slot.invalidated || aged,
    })
  }

  /// Snapshot the write generation for `key` before a fetch goes to the
  /// network, and record the fetch as pending so the bookkeeping survives
  /// until `insert` or `abandon` releases it.
  pub fn begin_fetch(&self, key: &CacheKey, tags: &[Tag]) -> u64 {
    let mut entries = self.lock();
    let state = entries.entry(key.clone()).or_default();
    state.pending += 1;
    state.pending_tags = tags.to_vec();
    state.generation
  }

  /// Store a fetched result. Returns false (and discards the value) if the
  /// entry was evicted, reset, or invalidated since `generation` was
  /// snapshotted by `begin_fetch`.
  pub fn insert(
    &self,
    key: &CacheKey,
    value: serde_json::Value,
    tags: &[Tag],
    generation: u64,
  ) -> bool {
    let mut entries = self.lock();
    let state = entries.entry(key.clone()).or_default();
    state.pending = state.pending.saturating_sub(1);
    if state.pending == 0 {
      state.pending_tags.clear();
    }

    if state.generation != generation {
      let prune = state.slot.is_none() && state.subscribers == 0 && state.pending == 0;
      debug!(key = %key, "discarding fetch result for superseded entry");
      if prune {
        entries.remove(key);
      }
      return false;
    }

    state.slot = Some(Slot {
      value,
      tags: tags.to_vec(),
      cached_at: Utc::now(),
      invalidated: false,
    });
    if state.subscribers == 0 {
      state.evict_at = Some(Instant::now() + self.retention);
    }
    true
  }

  /// Release a pending fetch that produced no value (transport or server
  /// failure). Drops the record when nothing else references it.
  pub fn abandon(&self, key: &CacheKey) {
    let mut entries = self.lock();
    if let Some(state) = entries.get_mut(key) {
      state.pending = state.pending.saturating_sub(1);
      if state.pending == 0 {
        state.pending_tags.clear();
      }
      let prune = state.slot.is_none() && state.subscribers == 0 && state.pending == 0;
      if prune {
        entries.remove(key);
      }
    }
  }

  /// Mark every entry whose tag set intersects `tags` as stale. Called by
  /// mutations strictly after their success response is observed. Entries
  /// with a matching fetch still in flight get their generation bumped so
  /// the pre-mutation response cannot land as fresh.
  pub fn invalidate(&self, tags: &[Tag]) -> usize {
    let mut entries = self.lock();
    let mut count = 0;

    for (key, state) in entries.iter_mut() {
      let mut hit = false;
      if let Some(slot) = state.slot.as_mut() {
        if !slot.invalidated && slot.tags.iter().any(|t| tags.contains(t)) {
          slot.invalidated = true;
          count += 1;
          hit = true;
        }
      }
      if hit || (state.pending > 0 && state.pending_tags.iter().any(|t| tags.contains(t))) {
        state.generation += 1;
        debug!(key = %key, "cache entry invalidated by tag");
      }
    }

    count
  }

  /// Attach a subscriber: the entry is pinned until the last one leaves.
  pub fn subscribe(&self, key: &CacheKey) {
    let mut entries = self.lock();
    let state = entries.entry(key.clone()).or_default();
    state.subscribers += 1;
    state.evict_at = None;
  }

  /// Detach a subscriber. When the count reaches zero a cached value is
  /// kept for the retention window to survive quick re-navigation; a
  /// record with no value and no pending fetch is dropped outright.
  pub fn unsubscribe(&self, key: &CacheKey) {
    let mut entries = self.lock();
    if let Some(state) = entries.get_mut(key) {
      state.subscribers = state.subscribers.saturating_sub(1);
      if state.subscribers == 0 {
        state.evict_at = Some(Instant::now() + self.retention);
        let prune = state.slot.is_none() && state.pending == 0;
        if prune {
          entries.remove(key);
        }
      }
    }
  }

  /// Number of active subscribers for `key`.
  pub fn subscriber_count(&self, key: &CacheKey) -> usize {
    self.lock().get(key).map(|s| s.subscribers).unwrap_or(0)
  }

  /// Whether a value is currently stored for `key`.
  pub fn contains(&self, key: &CacheKey) -> bool {
    let mut entries = self.lock();
    Self::sweep(&mut entries, Instant::now());
    entries.get(key).is_some_and(|s| s.slot.is_some())
  }

  /// Number of live records, bookkeeping included.
  pub fn len(&self) -> usize {
    let mut entries = self.lock();
    Self::sweep(&mut entries, Instant::now());
    entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Drop expired values. A bookkeeping record outlives its value only
  /// while a fetch dispatched before the eviction is still in flight (its
  /// bumped generation is what discards the late write); everything else
  /// is removed so the map does not grow with every key ever queried.
  fn sweep(entries: &mut HashMap<CacheKey, EntryState>, now: Instant) {
    entries.retain(|key, state| {
      if state.subscribers == 0
        && state.slot.is_some()
        && state.evict_at.map(|at| at <= now).unwrap_or(false)
      {
        state.slot = None;
        state.evict_at = None;
        state.generation += 1;
        debug!(key = %key, "evicting unsubscribed cache entry");
      }
      state.slot.is_some() || state.subscribers > 0 || state.pending > 0
    });
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, EntryState>> {
    self.entries.lock().unwrap_or_else(|e| e.into_inner())
  }
}
