//! Fetch orchestration over the cache store.
//!
//! The engine owns the cache-first discipline: a fresh entry is returned
//! without touching the network, a stale or missing entry triggers a
//! fetch, and concurrent dispatches for one key share a single in-flight
//! request. Mutations funnel through `mutate` so tag invalidation is
//! applied strictly after a success response and never on failure.

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::broadcast;
use tracing::debug;

use crate::config::CacheConfig;
use crate::error::{ClientError, Result};

use super::key::CacheKey;
use super::store::{CacheStore, CachedValue, Tag};

/// Boxed fetch future handed to the engine by a resource family.
pub type FetchFuture = BoxFuture<'static, Result<Value>>;

type FetchResult = std::result::Result<Value, ClientError>;

pub struct CacheEngine {
  store: CacheStore,
  inflight: Mutex<HashMap<CacheKey, broadcast::Sender<FetchResult>>>,
}

enum Dispatch {
  /// Fresh value found while deciding; no network needed.
  Hit(Value),
  /// Another dispatch already owns the fetch; wait on its result.
  Attach(broadcast::Receiver<FetchResult>),
  /// This dispatch owns the fetch for the snapshotted generation.
  Fetch(u64),
}

impl CacheEngine {
  pub fn new(config: &CacheConfig) -> Self {
    Self {
      store: CacheStore::new(config),
      inflight: Mutex::new(HashMap::new()),
    }
  }

  /// Execute a query with caching, coalescing, and tag registration.
  ///
  /// `force` skips the fresh-hit shortcut (explicit refetch); it still
  /// attaches to an existing in-flight request rather than duplicating it.
  pub async fn query<F>(&self, key: &CacheKey, tags: &[Tag], force: bool, fetcher: F) -> Result<Value>
  where
    F: FnOnce() -> FetchFuture,
  {
    if !force {
      if let Some(CachedValue { value, stale: false, .. }) = self.store.lookup(key) {
        debug!(key = %key, "cache hit");
        return Ok(value);
      }
    }

    match self.begin_dispatch(key, tags, force) {
      Dispatch::Hit(value) => Ok(value),
      Dispatch::Attach(mut rx) => {
        debug!(key = %key, "attaching to in-flight request");
        match rx.recv().await {
          Ok(result) => result,
          // Sender dropped without publishing: the owning dispatch went
          // away before completing.
          Err(_) => Err(ClientError::Network("in-flight request was dropped".into())),
        }
      }
      Dispatch::Fetch(generation) => {
        debug!(key = %key, "fetching from network");
        let result = fetcher().await;
        self.finish_dispatch(key, tags, generation, result.clone());
        result
      }
    }
  }

  /// Query and decode the cached JSON into a typed value.
  pub async fn query_as<T, F>(&self, key: &CacheKey, tags: &[Tag], force: bool, fetcher: F) -> Result<T>
  where
    T: DeserializeOwned,
    F: FnOnce() -> FetchFuture,
  {
    let value = self.query(key, tags, force, fetcher).await?;
    serde_json::from_value(value).map_err(|e| ClientError::Decode(e.to_string()))
  }

  /// Run a mutation; on success (and only then) invalidate `tags`.
  pub async fn mutate<F>(&self, tags: &[Tag], op: F) -> Result<Value>
  where
    F: FnOnce() -> FetchFuture,
  {
    let result = op().await?;
    let invalidated = self.store.invalidate(tags);
    debug!(count = invalidated, "mutation succeeded, entries invalidated");
    Ok(result)
  }

  /// Run a mutation and decode its response body.
  pub async fn mutate_as<T, F>(&self, tags: &[Tag], op: F) -> Result<T>
  where
    T: DeserializeOwned,
    F: FnOnce() -> FetchFuture,
  {
    let value = self.mutate(tags, op).await?;
    serde_json::from_value(value).map_err(|e| ClientError::Decode(e.to_string()))
  }

  /// Current cached value for `key`, stale or not. Used by the handle
  /// layer to keep the previous data visible while revalidating.
  pub fn peek(&self, key: &CacheKey) -> Option<CachedValue> {
    self.store.lookup(key)
  }

  pub fn invalidate(&self, tags: &[Tag]) -> usize {
    self.store.invalidate(tags)
  }

  pub fn subscribe(&self, key: &CacheKey) {
    self.store.subscribe(key);
  }

  pub fn unsubscribe(&self, key: &CacheKey) {
    self.store.unsubscribe(key);
  }

  pub fn subscriber_count(&self, key: &CacheKey) -> usize {
    self.store.subscriber_count(key)
  }

  /// Number of live cache records, bookkeeping included.
  pub fn entry_count(&self) -> usize {
    self.store.len()
  }

  /// Decide, under the in-flight lock, whether this dispatch waits,
  /// fetches, or can be served from an entry that landed in the meantime.
  fn begin_dispatch(&self, key: &CacheKey, tags: &[Tag], force: bool) -> Dispatch {
    let mut inflight = self.lock_inflight();

    if let Some(tx) = inflight.get(key) {
      return Dispatch::Attach(tx.subscribe());
    }

    // No owner: re-check the store, a just-finished fetch may have
    // published between our first lookup and taking this lock.
    if !force {
      if let Some(CachedValue { value, stale: false, .. }) = self.store.lookup(key) {
        return Dispatch::Hit(value);
      }
    }

    let generation = self.store.begin_fetch(key, tags);
    let (tx, _rx) = broadcast::channel(1);
    inflight.insert(key.clone(), tx);
    Dispatch::Fetch(generation)
  }

  /// Publish a finished fetch: write to the store (success only, and only
  /// if the entry's generation still matches) and fan out to waiters.
  fn finish_dispatch(&self, key: &CacheKey, tags: &[Tag], generation: u64, result: FetchResult) {
    let mut inflight = self.lock_inflight();

    match &result {
      Ok(value) => {
        self.store.insert(key, value.clone(), tags, generation);
      }
      Err(_) => self.store.abandon(key),
    }

    if let Some(tx) = inflight.remove(key) {
      // No waiters is fine.
      let _ = tx.send(result);
    }
  }

  fn lock_inflight(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, broadcast::Sender<FetchResult>>> {
    self.inflight.lock().unwrap_or_else(|e| e.into_inner())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Arc;
  use std::time::Duration;

  fn engine() -> Arc<CacheEngine> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    Arc::new(CacheEngine::new(&CacheConfig::default()))
  }

  fn key(op: &'static str, page: u64) -> CacheKey {
    CacheKey::new("funds", op, &json!({"page": page, "limit": 10})).unwrap()
  }

  fn counting_fetcher(
    counter: &Arc<AtomicU32>,
    value: Value,
    delay: Duration,
  ) -> impl Fn() -> FetchFuture {
    let counter = counter.clone();
    move || -> FetchFuture {
      counter.fetch_add(1, Ordering::SeqCst);
      let value = value.clone();
      Box::pin(async move {
        tokio::time::sleep(delay).await;
        Ok(value)
      })
    }
  }

  #[tokio::test]
  async fn concurrent_dispatches_share_one_request() {
    let engine = engine();
    let calls = Arc::new(AtomicU32::new(0));
    let k = key("list", 1);
    let fetcher = counting_fetcher(&calls, json!(["f1", "f2"]), Duration::from_millis(50));

    let (a, b) = tokio::join!(
      engine.query(&k, &[Tag::Fund], false, &fetcher),
      engine.query(&k, &[Tag::Fund], false, &fetcher),
    );

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(a.unwrap(), json!(["f1", "f2"]));
    assert_eq!(b.unwrap(), json!(["f1", "f2"]));
  }

  #[tokio::test]
  async fn fresh_entry_is_served_without_network() {
    let engine = engine();
    let calls = Arc::new(AtomicU32::new(0));
    let k = key("list", 1);
    let fetcher = counting_fetcher(&calls, json!(["f1"]), Duration::ZERO);

    engine.query(&k, &[Tag::Fund], false, &fetcher).await.unwrap();
    engine.query(&k, &[Tag::Fund], false, &fetcher).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn force_refetch_bypasses_fresh_entry() {
    let engine = engine();
    let calls = Arc::new(AtomicU32::new(0));
    let k = key("list", 1);
    let fetcher = counting_fetcher(&calls, json!(["f1"]), Duration::ZERO);

    engine.query(&k, &[Tag::Fund], false, &fetcher).await.unwrap();
    engine.query(&k, &[Tag::Fund], true, &fetcher).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn tag_invalidation_forces_refetch() {
    let engine = engine();
    let calls = Arc::new(AtomicU32::new(0));
    let k = key("subscriptions", 1);
    let fetcher = counting_fetcher(&calls, json!(["s1"]), Duration::ZERO);

    engine
      .query(&k, &[Tag::FundSubscription], false, &fetcher)
      .await
      .unwrap();

    engine
      .mutate(&[Tag::FundSubscription], || {
        Box::pin(async { Ok(json!({"id": "sub-2"})) })
      })
      .await
      .unwrap();

    engine
      .query(&k, &[Tag::FundSubscription], false, &fetcher)
      .await
      .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn failed_mutation_does_not_invalidate() {
    let engine = engine();
    let calls = Arc::new(AtomicU32::new(0));
    let k = key("subscriptions", 1);
    let fetcher = counting_fetcher(&calls, json!(["s1"]), Duration::ZERO);

    engine
      .query(&k, &[Tag::FundSubscription], false, &fetcher)
      .await
      .unwrap();

    let err = engine
      .mutate(&[Tag::FundSubscription], || {
        Box::pin(async {
          Err(ClientError::Status {
            status: 422,
            body: json!({"error": "insufficient funds"}),
          })
        })
      })
      .await
      .unwrap_err();
    assert_eq!(err.status(), Some(422));

    engine
      .query(&k, &[Tag::FundSubscription], false, &fetcher)
      .await
      .unwrap();

    // cached value still valid, no refetch happened
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn fetch_errors_are_not_cached() {
    let engine = engine();
    let calls = Arc::new(AtomicU32::new(0));
    let k = key("list", 1);

    let failing = {
      let calls = calls.clone();
      move || -> FetchFuture {
        calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Err(ClientError::Network("connection refused".into())) })
      }
    };

    assert!(engine.query(&k, &[Tag::Fund], false, &failing).await.is_err());
    assert!(engine.query(&k, &[Tag::Fund], false, &failing).await.is_err());

    // each dispatch hit the network; nothing was stored, and no
    // bookkeeping record is left behind either
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(engine.peek(&k).is_none());
    assert_eq!(engine.entry_count(), 0);
  }

  #[tokio::test]
  async fn invalidation_mid_flight_keeps_the_response_out_of_the_cache() {
    let engine = engine();
    let k = key("subscriptions", 1);

    let slow = || -> FetchFuture {
      Box::pin(async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(json!(["pre-mutation"]))
      })
    };

    let task = {
      let engine = engine.clone();
      let k = k.clone();
      tokio::spawn(async move { engine.query(&k, &[Tag::FundSubscription], false, slow).await })
    };

    // let the fetch take ownership, then invalidate while it is in flight
    tokio::time::sleep(Duration::from_millis(10)).await;
    engine.invalidate(&[Tag::FundSubscription]);

    // the caller still gets the response, but it predates the mutation
    // and must not be cached as fresh
    let value = task.await.unwrap().unwrap();
    assert_eq!(value, json!(["pre-mutation"]));
    assert!(engine.peek(&k).is_none());
  }

  #[tokio::test]
  async fn waiters_observe_the_owners_error() {
    let engine = engine();
    let k = key("list", 1);

    let failing = || -> FetchFuture {
      Box::pin(async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Err(ClientError::Network("unreachable".into()))
      })
    };

    let (a, b) = tokio::join!(
      engine.query(&k, &[Tag::Fund], false, failing),
      engine.query(&k, &[Tag::Fund], false, failing),
    );

    assert!(a.unwrap_err().is_network());
    assert!(b.unwrap_err().is_network());
  }

  #[tokio::test]
  async fn argument_order_lands_on_the_same_entry() {
    let engine = engine();
    let calls = Arc::new(AtomicU32::new(0));
    let fetcher = counting_fetcher(&calls, json!(["f1"]), Duration::ZERO);

    let a = CacheKey::new("funds", "list", &json!({"page": 1, "limit": 10})).unwrap();
    let b = CacheKey::new("funds", "list", &json!({"limit": 10, "page": 1})).unwrap();

    engine.query(&a, &[Tag::Fund], false, &fetcher).await.unwrap();
    engine.query(&b, &[Tag::Fund], false, &fetcher).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  /// End-to-end flow: list funds, subscribe, then see the refreshed
  /// subscription list despite it having been cached.
  #[tokio::test]
  async fn subscription_flow_returns_fresh_list_after_mutation() {
    let engine = engine();

    let funds_key = CacheKey::new("funds", "list", &json!({"page": 1, "limit": 10})).unwrap();
    let subs_key = CacheKey::new(
      "funds",
      "my_subscriptions",
      &json!({"user_id": "u1", "page": 1, "limit": 10}),
    )
    .unwrap();

    let funds = engine
      .query(&funds_key, &[Tag::Fund], false, || {
        Box::pin(async { Ok(json!([{"id": "f1", "name": "Index One"}])) })
      })
      .await
      .unwrap();
    assert_eq!(funds.as_array().unwrap().len(), 1);

    // backend state the scripted fetcher reads from
    let subscriptions = Arc::new(Mutex::new(vec![json!({"id": "s0", "fund_id": "f0"})]));

    let subs_fetcher = {
      let subscriptions = subscriptions.clone();
      move || -> FetchFuture {
        let snapshot = subscriptions.lock().unwrap().clone();
        Box::pin(async move { Ok(Value::Array(snapshot)) })
      }
    };

    let first = engine
      .query(&subs_key, &[Tag::FundSubscription], false, &subs_fetcher)
      .await
      .unwrap();
    assert_eq!(first.as_array().unwrap().len(), 1);

    engine
      .mutate(&[Tag::FundSubscription], || {
        let subscriptions = subscriptions.clone();
        Box::pin(async move {
          let created = json!({"id": "s1", "fund_id": "f1", "currency": "CAD"});
          subscriptions.lock().unwrap().push(created.clone());
          Ok(created)
        })
      })
      .await
      .unwrap();

    let second = engine
      .query(&subs_key, &[Tag::FundSubscription], false, &subs_fetcher)
      .await
      .unwrap();
    let ids: Vec<&str> = second
      .as_array()
      .unwrap()
      .iter()
      .map(|s| s["id"].as_str().unwrap())
      .collect();
    assert_eq!(ids, vec!["s0", "s1"]);
  }
}
