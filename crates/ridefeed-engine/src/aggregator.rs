//! [`FeedAggregator`] — the presentation-facing side of the feed.
//!
//! One aggregator serves one consumer context (a screen, an API instance). It
//! owns at most one [`ScopeSession`] at a time and a single observable feed
//! state. Changing scope swaps sessions; changing filter criteria only
//! re-filters the snapshots the current session already holds.

use std::sync::{Mutex, MutexGuard, PoisonError};

use ridefeed_core::{
  feed::{FeedState, Scope},
  filter::FilterCriteria,
};
use tokio::sync::watch;
use tracing::debug;

use crate::{
  session::{ScopeSession, SessionDeps},
  slot::FeedSlot,
};

pub struct FeedAggregator {
  deps:     SessionDeps,
  slot:     FeedSlot,
  criteria: watch::Sender<FilterCriteria>,
  session:  Mutex<Option<ScopeSession>>,
}

impl FeedAggregator {
  /// An aggregator with no open session; the feed reads `Loading` until a
  /// scope is set.
  pub fn new(deps: SessionDeps) -> Self {
    let (criteria, _rx) = watch::channel(FilterCriteria::default());
    Self { deps, slot: FeedSlot::new(), criteria, session: Mutex::new(None) }
  }

  fn session(&self) -> MutexGuard<'_, Option<ScopeSession>> {
    self.session.lock().unwrap_or_else(PoisonError::into_inner)
  }

  // ── Observation ─────────────────────────────────────────────────────────

  /// Observe the feed. Only the latest state is retained; a slow observer
  /// may skip intermediate states but never sees an older one after a newer.
  pub fn subscribe(&self) -> watch::Receiver<FeedState> { self.slot.subscribe() }

  pub fn state(&self) -> FeedState { self.slot.current() }

  /// The scope of the open session, if any.
  pub fn scope(&self) -> Option<Scope> {
    self.session().as_ref().filter(|s| !s.is_closed()).map(ScopeSession::scope)
  }

  pub fn filter_criteria(&self) -> FilterCriteria { self.criteria.borrow().clone() }

  /// The caller identity sessions resolve `Mine` against.
  pub fn caller_uid(&self) -> Option<String> { self.deps.identity.current_uid() }

  // ── Commands ────────────────────────────────────────────────────────────

  /// Make `scope` the active scope. A no-op if that scope's session is
  /// already open; otherwise the previous session is closed before the new
  /// one is opened.
  ///
  /// Must be called from within a Tokio runtime.
  pub fn set_scope(&self, scope: Scope) {
    let mut current = self.session();
    if current.as_ref().is_some_and(|s| s.scope() == scope && !s.is_closed()) {
      return;
    }
    self.swap(&mut current, scope);
  }

  /// Re-open the current scope from scratch, re-subscribing both sources.
  /// Does nothing if no scope has been set.
  pub fn retry(&self) {
    let mut current = self.session();
    if let Some(scope) = current.as_ref().map(ScopeSession::scope) {
      debug!(%scope, "retrying scope session");
      self.swap(&mut current, scope);
    }
  }

  /// Replace the filter criteria. Applies to `Browse` only; the held
  /// snapshots are re-filtered without re-subscribing.
  pub fn set_filter_criteria(&self, criteria: FilterCriteria) {
    debug!(active = criteria.active_count(), "filter criteria updated");
    self.criteria.send_replace(criteria);
  }

  pub fn clear_filters(&self) { self.set_filter_criteria(FilterCriteria::default()); }

  /// Close the open session, if any. Idempotent. The last published state
  /// stays readable.
  pub fn close(&self) {
    if let Some(mut session) = self.session().take() {
      session.close();
    }
  }

  /// [`close`](Self::close) and wait until both subscriptions are released.
  pub async fn shutdown(&self) {
    let session = self.session().take();
    if let Some(mut session) = session {
      session.close_and_wait().await;
    }
  }

  fn swap(&self, current: &mut Option<ScopeSession>, scope: Scope) {
    if let Some(mut old) = current.take() {
      old.close();
    }
    *current = Some(ScopeSession::open(
      scope,
      &self.deps,
      &self.slot,
      self.criteria.subscribe(),
    ));
  }
}

impl Drop for FeedAggregator {
  fn drop(&mut self) { self.close(); }
}
