//! Per-call-site query handle: the data/loading/error contract the UI
//! consumes.
//!
//! A `QueryHandle<T>` wraps one fetch definition and tracks its state
//! across the host's event loop. Call `poll()` on every tick: it starts
//! the fetch once the skip condition allows it, drains the completion
//! channel, and drives the optional polling interval. The previous data
//! stays visible while a refetch is in flight, so an invalidation never
//! produces a flash of missing data.
//!
//! # Example
//!
//! ```ignore
//! let mut funds = QueryHandle::new(move |force| {
//!     let api = api.clone();
//!     Box::pin(async move { api.get_funds_forced(1, 10, force).await })
//! });
//!
//! // In the event loop tick
//! if funds.poll() {
//!     // state changed, re-render
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use crate::cache::{CacheEngine, CacheKey};
use crate::error::ClientError;

/// Reported state of a query, derived from the handle's fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
  /// Not started: skipped, or never polled.
  Idle,
  /// A request is in flight and no earlier data exists.
  Loading,
  /// Data is available (possibly while a background refetch runs).
  Success,
  /// The last fetch failed.
  Error,
}

type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T, ClientError>> + Send>>;

/// Fetch factory. The `bool` argument is the force flag: `true` bypasses
/// the fresh-cache shortcut (explicit refetch, polling tick).
type FetcherFn<T> = Box<dyn Fn(bool) -> BoxFuture<T> + Send + Sync>;

/// Keeps the cache entry pinned while this call site is alive.
struct Subscription {
  engine: Arc<CacheEngine>,
  key: CacheKey,
}

impl Drop for Subscription {
  fn drop(&mut self) {
    self.engine.unsubscribe(&self.key);
  }
}

pub struct QueryHandle<T> {
  fetcher: FetcherFn<T>,
  data: Option<T>,
  error: Option<ClientError>,
  loading: bool,
  skip: bool,
  receiver: Option<mpsc::UnboundedReceiver<Result<T, ClientError>>>,
  fetched_at: Option<Instant>,
  poll_interval: Option<Duration>,
  subscription: Option<Subscription>,
}

impl<T: Send + 'static> QueryHandle<T> {
  /// Create a handle around a fetch factory. The factory usually closes
  /// over a resource-family client and routes through the cache engine.
  pub fn new<F, Fut>(fetcher: F) -> Self
  where
    F: Fn(bool) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ClientError>> + Send + 'static,
  {
    Self {
      fetcher: Box::new(move |force| Box::pin(fetcher(force))),
      data: None,
      error: None,
      loading: false,
      skip: false,
      receiver: None,
      fetched_at: None,
      poll_interval: None,
      subscription: None,
    }
  }

  /// Declare the query but hold it idle until the condition is lifted.
  pub fn with_skip(mut self, skip: bool) -> Self {
    self.skip = skip;
    self
  }

  /// Refetch on a fixed interval while this handle is alive. Polling
  /// stops the moment the handle is dropped.
  pub fn with_poll_interval(mut self, interval: Duration) -> Self {
    self.poll_interval = Some(interval);
    self
  }

  /// Pin the underlying cache entry for this handle's lifetime; the
  /// entry becomes eligible for eviction once the last handle drops.
  pub fn with_subscription(mut self, engine: Arc<CacheEngine>, key: CacheKey) -> Self {
    engine.subscribe(&key);
    self.subscription = Some(Subscription { engine, key });
    self
  }

  /// Re-evaluate the skip condition. Flipping to `true` cancels any
  /// in-flight fetch; flipping to `false` lets the next `poll()` start
  /// exactly one request.
  pub fn set_skip(&mut self, skip: bool) {
    if skip && !self.skip {
      self.receiver = None;
      self.loading = false;
    }
    self.skip = skip;
  }

  pub fn status(&self) -> QueryStatus {
    if self.loading && self.data.is_none() {
      QueryStatus::Loading
    } else if self.error.is_some() {
      QueryStatus::Error
    } else if self.data.is_some() {
      QueryStatus::Success
    } else {
      QueryStatus::Idle
    }
  }

  /// Current data, kept visible during background refetches.
  pub fn data(&self) -> Option<&T> {
    self.data.as_ref()
  }

  pub fn error(&self) -> Option<&ClientError> {
    self.error.as_ref()
  }

  /// True while any request is in flight, including revalidation.
  pub fn is_fetching(&self) -> bool {
    self.loading
  }

  pub fn is_idle(&self) -> bool {
    self.status() == QueryStatus::Idle
  }

  /// Force a refetch, bypassing the fresh-cache shortcut.
  pub fn refetch(&mut self) {
    if self.skip {
      return;
    }
    self.receiver = None;
    self.start_fetch(true);
  }

  /// Drive the query one step. Returns `true` if observable state
  /// changed. Call on every event-loop tick.
  pub fn poll(&mut self) -> bool {
    if self.skip {
      return false;
    }

    // First poll after creation or un-skip: start fetching.
    if self.receiver.is_none() && self.data.is_none() && self.error.is_none() && !self.loading {
      self.start_fetch(false);
      return true;
    }

    let mut changed = self.drain();

    // A mutation may have invalidated the entry this handle is pinned
    // to; revalidate eagerly while keeping the current data visible.
    // Skipped after a failed fetch so errors stay with the caller
    // instead of turning into a retry loop.
    if !self.loading && self.data.is_some() && self.error.is_none() && self.entry_is_stale() {
      self.start_fetch(true);
      changed = true;
    }

    // Polling interval: refetch once the data is old enough and nothing
    // is currently in flight.
    if let (Some(interval), Some(at), false) = (self.poll_interval, self.fetched_at, self.loading)
    {
      if at.elapsed() >= interval {
        self.start_fetch(true);
        changed = true;
      }
    }

    changed
  }

  fn entry_is_stale(&self) -> bool {
    self
      .subscription
      .as_ref()
      .and_then(|s| s.engine.peek(&s.key))
      .map(|cached| cached.stale)
      .unwrap_or(false)
  }

  fn drain(&mut self) -> bool {
    let receiver = match &mut self.receiver {
      Some(rx) => rx,
      None => return false,
    };

    match receiver.try_recv() {
      Ok(Ok(data)) => {
        self.data = Some(data);
        self.error = None;
        self.loading = false;
        self.fetched_at = Some(Instant::now());
        self.receiver = None;
        true
      }
      Ok(Err(error)) => {
        // Previous data is kept; the caller decides what to show.
        self.error = Some(error);
        self.loading = false;
        self.fetched_at = Some(Instant::now());
        self.receiver = None;
        true
      }
      Err(mpsc::error::TryRecvError::Empty) => false,
      Err(mpsc::error::TryRecvError::Disconnected) => {
        self.error = Some(ClientError::Network("query was cancelled".into()));
        self.loading = false;
        self.receiver = None;
        true
      }
    }
  }

  fn start_fetch(&mut self, force: bool) {
    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);
    self.loading = true;
    self.error = None;

    let future = (self.fetcher)(force);
    tokio::spawn(async move {
      let result = future.await;
      // Receiver may have been dropped (skip, refetch, handle drop).
      let _ = tx.send(result);
    });
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for QueryHandle<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("QueryHandle")
      .field("loading", &self.loading)
      .field("data", &self.data)
      .field("error", &self.error)
      .field("skip", &self.skip)
      .finish_non_exhaustive()
  }
}
