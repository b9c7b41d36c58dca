//! Realtime collection sources and caller identity.
//!
//! A source delivers a full snapshot of every matching document each time the
//! underlying set changes. The engine depends only on these traits; concrete
//! backends (e.g. `ridefeed-store-sqlite`) and test fakes implement them.

use std::sync::{
  Arc, Mutex, PoisonError,
  atomic::{AtomicBool, Ordering},
};

use tokio::sync::mpsc;

use crate::{
  Result,
  post::{PostStatus, RawDocument},
};

// ─── Query ───────────────────────────────────────────────────────────────────

/// Sort order a source should apply to each snapshot. The engine re-sorts
/// regardless, so this is only a hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderHint {
  #[default]
  UpdatedAtDesc,
  Unordered,
}

/// Server-side narrowing applied by a source to a subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceQuery {
  pub status:     Option<PostStatus>,
  pub owner_id:   Option<String>,
  pub order_hint: OrderHint,
}

impl SourceQuery {
  /// All open listings.
  pub fn open() -> Self { Self { status: Some(PostStatus::Open), ..Self::default() } }

  /// Every listing owned by `owner_id`.
  pub fn owned_by(owner_id: impl Into<String>) -> Self {
    Self { owner_id: Some(owner_id.into()), ..Self::default() }
  }
}

// ─── Events & subscription handle ────────────────────────────────────────────

/// One delivery from a source.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
  /// The complete current result set.
  Snapshot(Vec<RawDocument>),
  /// The subscription failed; no further events follow.
  Failed(String),
}

type CancelFn = Box<dyn FnOnce() + Send>;

struct ReleaseInner {
  released: AtomicBool,
  cancel:   Mutex<Option<CancelFn>>,
}

/// Detaches the source-side listener of one [`Subscription`].
///
/// Shared between the subscription and every handle taken from it with
/// [`Subscription::release_handle`], so whoever owns the session can release
/// it while the receiving half lives elsewhere (e.g. inside a task).
#[derive(Clone)]
pub struct SubscriptionRelease {
  inner: Arc<ReleaseInner>,
}

impl SubscriptionRelease {
  fn new(cancel: CancelFn) -> Self {
    Self {
      inner: Arc::new(ReleaseInner {
        released: AtomicBool::new(false),
        cancel:   Mutex::new(Some(cancel)),
      }),
    }
  }

  /// Run the source's release hook. Idempotent; the hook runs at most once
  /// across all handles.
  pub fn release(&self) {
    if self.inner.released.swap(true, Ordering::AcqRel) {
      return;
    }
    let cancel = self.inner.cancel.lock().unwrap_or_else(PoisonError::into_inner).take();
    if let Some(cancel) = cancel {
      cancel();
    }
  }

  pub fn is_released(&self) -> bool { self.inner.released.load(Ordering::Acquire) }
}

/// A live subscription to one source.
///
/// Events arrive on an unbounded channel fed by the source. Unsubscribing
/// runs the source's release hook exactly once; dropping the handle
/// unsubscribes.
pub struct Subscription {
  events:  mpsc::UnboundedReceiver<SourceEvent>,
  release: SubscriptionRelease,
}

impl Subscription {
  /// Pair a receiver with the hook that detaches the source-side listener.
  pub fn new(
    events: mpsc::UnboundedReceiver<SourceEvent>,
    cancel: impl FnOnce() + Send + 'static,
  ) -> Self {
    Self { events, release: SubscriptionRelease::new(Box::new(cancel)) }
  }

  /// Open a channel and return the sending half alongside the subscription.
  pub fn channel(
    cancel: impl FnOnce() + Send + 'static,
  ) -> (mpsc::UnboundedSender<SourceEvent>, Self) {
    let (tx, rx) = mpsc::unbounded_channel();
    (tx, Self::new(rx, cancel))
  }

  /// A handle that releases this subscription from outside.
  pub fn release_handle(&self) -> SubscriptionRelease { self.release.clone() }

  /// Wait for the next event. Returns `None` once released (from here or
  /// through a [`SubscriptionRelease`]) or once the source has dropped its
  /// sender. Events buffered at release time are never returned.
  pub async fn next(&mut self) -> Option<SourceEvent> {
    if self.is_cancelled() {
      return None;
    }
    let event = self.events.recv().await;
    if self.is_cancelled() { None } else { event }
  }

  pub fn is_cancelled(&self) -> bool { self.release.is_released() }

  /// Stop delivery. Idempotent; events already buffered are discarded.
  pub fn unsubscribe(&mut self) {
    self.events.close();
    while self.events.try_recv().is_ok() {}
    self.release.release();
  }
}

impl Drop for Subscription {
  fn drop(&mut self) { self.unsubscribe(); }
}

impl std::fmt::Debug for Subscription {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Subscription")
      .field("cancelled", &self.is_cancelled())
      .finish_non_exhaustive()
  }
}

// ─── Traits ──────────────────────────────────────────────────────────────────

/// One live-updating collection of listings of a single kind.
///
/// `subscribe` must not block: the first snapshot is delivered
/// asynchronously through the returned [`Subscription`].
pub trait CollectionSource: Send + Sync {
  fn subscribe(&self, query: SourceQuery) -> Result<Subscription>;
}

impl<T: CollectionSource + ?Sized> CollectionSource for Arc<T> {
  fn subscribe(&self, query: SourceQuery) -> Result<Subscription> { (**self).subscribe(query) }
}

/// Supplies the authenticated caller, if any.
pub trait IdentityProvider: Send + Sync {
  fn current_uid(&self) -> Option<String>;
}

/// A fixed identity, e.g. from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(pub Option<String>);

impl IdentityProvider for StaticIdentity {
  fn current_uid(&self) -> Option<String> { self.0.clone() }
}
