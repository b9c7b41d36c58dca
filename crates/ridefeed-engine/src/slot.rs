//! The single "current feed state" slot observed by the presentation layer.
//!
//! Backed by a [`watch`] channel, so observers only ever see the latest
//! value. Every session publishes through a [`Publisher`] stamped with the
//! generation it was opened under; opening or closing a session advances the
//! generation, and publishes from an older generation are dropped. The check
//! and the send happen under one lock, so a late emission from a replaced
//! session can never overwrite a state produced by its successor.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ridefeed_core::feed::FeedState;
use tokio::sync::watch;

struct SlotInner {
  generation: u64,
  tx:         watch::Sender<FeedState>,
}

/// Shared publication slot for one consumer context.
#[derive(Clone)]
pub struct FeedSlot {
  inner: Arc<Mutex<SlotInner>>,
}

impl FeedSlot {
  /// A slot holding `Loading` until a session publishes.
  pub fn new() -> Self {
    let (tx, _rx) = watch::channel(FeedState::Loading);
    Self { inner: Arc::new(Mutex::new(SlotInner { generation: 0, tx })) }
  }

  fn lock(&self) -> MutexGuard<'_, SlotInner> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Observe the slot. The receiver starts at the current value.
  pub fn subscribe(&self) -> watch::Receiver<FeedState> { self.lock().tx.subscribe() }

  /// The most recently published state.
  pub fn current(&self) -> FeedState { self.lock().tx.borrow().clone() }

  /// Start a new generation and publish `Loading` for it. Every previously
  /// issued publisher goes stale.
  pub fn begin(&self) -> Publisher {
    let mut inner = self.lock();
    inner.generation += 1;
    inner.tx.send_replace(FeedState::Loading);
    Publisher { slot: self.clone(), generation: inner.generation }
  }

  fn publish_if_current(&self, generation: u64, state: FeedState) -> bool {
    let inner = self.lock();
    if inner.generation != generation {
      return false;
    }
    inner.tx.send_replace(state);
    true
  }

  fn retire(&self, generation: u64) {
    let mut inner = self.lock();
    if inner.generation == generation {
      inner.generation += 1;
    }
  }

  fn is_current(&self, generation: u64) -> bool { self.lock().generation == generation }
}

impl Default for FeedSlot {
  fn default() -> Self { Self::new() }
}

/// Write access to a [`FeedSlot`] for one generation.
#[derive(Clone)]
pub struct Publisher {
  slot:       FeedSlot,
  generation: u64,
}

impl Publisher {
  /// Publish `state` unless this generation has been superseded or retired.
  /// Returns whether the state was published.
  pub fn publish(&self, state: FeedState) -> bool {
    self.slot.publish_if_current(self.generation, state)
  }

  /// Stop this generation from publishing without replacing it. Idempotent.
  pub fn retire(&self) { self.slot.retire(self.generation) }

  pub fn is_current(&self) -> bool { self.slot.is_current(self.generation) }
}
