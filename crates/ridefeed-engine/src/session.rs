//! Scope sessions: one subscription pair and one combination pipeline.
//!
//! A session is opened for a single [`Scope`], subscribes once to each source
//! with that scope's query, and runs a task that feeds both subscriptions and
//! the filter criteria into a [`CombinationEngine`]. Closing retires the
//! session's publisher, releases both subscriptions at the source, then
//! stops the task.

use std::sync::Arc;

use ridefeed_core::{
  Error,
  feed::{FeedState, Scope},
  filter::FilterCriteria,
  post::PostKind,
  source::{
    CollectionSource, IdentityProvider, SourceEvent, SourceQuery, Subscription,
    SubscriptionRelease,
  },
};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, warn};

use crate::{
  combine::{CombinationEngine, ScopeFilter},
  slot::{FeedSlot, Publisher},
};

// ─── Dependencies ────────────────────────────────────────────────────────────

/// Everything a session needs from the outside world, injected so sessions
/// can run against fakes.
#[derive(Clone)]
pub struct SessionDeps {
  pub offers:   Arc<dyn CollectionSource>,
  pub requests: Arc<dyn CollectionSource>,
  pub identity: Arc<dyn IdentityProvider>,
}

impl SessionDeps {
  fn source(&self, kind: PostKind) -> &dyn CollectionSource {
    match kind {
      PostKind::Offer => self.offers.as_ref(),
      PostKind::Request => self.requests.as_ref(),
    }
  }

  /// Resolve `scope` against the current caller.
  fn resolve(&self, scope: Scope) -> Result<(ScopeFilter, SourceQuery), Error> {
    match scope {
      Scope::Browse => Ok((ScopeFilter::Browse, SourceQuery::open())),
      Scope::Mine => {
        let uid = self.identity.current_uid().ok_or(Error::IdentityUnavailable)?;
        Ok((ScopeFilter::Mine { owner_id: uid.clone() }, SourceQuery::owned_by(uid)))
      }
    }
  }

  fn subscribe_pair(&self, query: &SourceQuery) -> Result<(Subscription, Subscription), Error> {
    let offers = self.source(PostKind::Offer).subscribe(query.clone())?;
    // On failure here `offers` drops, which unsubscribes it.
    let requests = self.source(PostKind::Request).subscribe(query.clone())?;
    Ok((offers, requests))
  }
}

// ─── Session ─────────────────────────────────────────────────────────────────

/// Handle to one open scope.
///
/// Must be opened from within a Tokio runtime. Dropping the handle closes
/// the session.
pub struct ScopeSession {
  scope:     Scope,
  publisher: Publisher,
  releases:  Vec<SubscriptionRelease>,
  task:      Option<JoinHandle<()>>,
}

impl ScopeSession {
  /// Open `scope`, publishing `Loading` immediately.
  ///
  /// If the caller's identity is needed but missing, or a source refuses the
  /// subscription, the error state is published right away and the session
  /// holds no subscriptions.
  pub fn open(
    scope: Scope,
    deps: &SessionDeps,
    slot: &FeedSlot,
    criteria: watch::Receiver<FilterCriteria>,
  ) -> Self {
    let publisher = slot.begin();
    debug!(%scope, "opening scope session");

    let started = deps.resolve(scope).and_then(|(filter, query)| {
      let (offers, requests) = deps.subscribe_pair(&query)?;
      Ok((filter, offers, requests))
    });

    let mut releases = Vec::new();
    let task = match started {
      Ok((filter, offers, requests)) => {
        releases.extend([offers.release_handle(), requests.release_handle()]);
        let pipeline = Pipeline {
          engine: CombinationEngine::new(filter),
          publisher: publisher.clone(),
          offers,
          requests,
          criteria,
        };
        Some(tokio::spawn(pipeline.run()))
      }
      Err(err) => {
        warn!(%scope, error = %err, "scope session failed to start");
        publisher.publish(FeedState::from(&err));
        None
      }
    };

    Self { scope, publisher, releases, task }
  }

  pub fn scope(&self) -> Scope { self.scope }

  /// Whether the session has been closed.
  pub fn is_closed(&self) -> bool { !self.publisher.is_current() }

  /// Whether the pipeline task is still delivering.
  pub fn is_running(&self) -> bool {
    self.task.as_ref().is_some_and(|t| !t.is_finished())
  }

  /// Stop publishing and release both subscriptions. Idempotent.
  ///
  /// Both source-side listeners are detached before this returns. Anything
  /// the pipeline produces afterwards is discarded, even if it was already
  /// computed.
  pub fn close(&mut self) {
    self.detach();
    if let Some(task) = self.task.take() {
      debug!(scope = %self.scope, "closing scope session");
      task.abort();
    }
  }

  /// [`close`](Self::close), then wait until the pipeline task has been
  /// dropped.
  pub async fn close_and_wait(&mut self) {
    self.detach();
    if let Some(task) = self.task.take() {
      task.abort();
      let _ = task.await;
    }
  }

  fn detach(&self) {
    self.publisher.retire();
    for release in &self.releases {
      release.release();
    }
  }
}

impl Drop for ScopeSession {
  fn drop(&mut self) { self.close(); }
}

// ─── Pipeline task ───────────────────────────────────────────────────────────

/// State owned by a session's task. It is the only user of the engine, so
/// the two held snapshots are never read half-updated.
struct Pipeline {
  engine:    CombinationEngine,
  publisher: Publisher,
  offers:    Subscription,
  requests:  Subscription,
  criteria:  watch::Receiver<FilterCriteria>,
}

enum Input {
  Source(PostKind, Option<SourceEvent>),
  CriteriaChanged,
  CriteriaGone,
}

impl Pipeline {
  async fn run(mut self) {
    let scope = self.engine.filter().scope();
    let mut follow_criteria = scope == Scope::Browse;

    loop {
      let input = tokio::select! {
        ev = self.offers.next() => Input::Source(PostKind::Offer, ev),
        ev = self.requests.next() => Input::Source(PostKind::Request, ev),
        changed = self.criteria.changed(), if follow_criteria => match changed {
          Ok(()) => Input::CriteriaChanged,
          Err(_) => Input::CriteriaGone,
        },
      };

      match input {
        Input::Source(kind, Some(SourceEvent::Snapshot(docs))) => {
          debug!(%scope, %kind, count = docs.len(), "snapshot received");
          self.engine.accept(kind, &docs);
        }
        Input::Source(kind, Some(SourceEvent::Failed(cause))) => {
          warn!(%scope, %kind, %cause, "source subscription failed");
          self.fail(Error::SourceSubscription(cause));
          break;
        }
        Input::Source(_, None) if !self.publisher.is_current() => break,
        Input::Source(kind, None) => {
          warn!(%scope, %kind, "source closed without error");
          self.fail(Error::SourceSubscription(format!("{kind} source closed")));
          break;
        }
        Input::CriteriaChanged => {}
        Input::CriteriaGone => {
          follow_criteria = false;
          continue;
        }
      }

      if !self.recompute() {
        debug!(%scope, "session superseded; stopping");
        break;
      }
    }
  }

  /// Publish the feed for the held snapshots. Returns `false` once this
  /// session's publisher is stale.
  fn recompute(&mut self) -> bool {
    let criteria = self.criteria.borrow_and_update().clone();
    match self.engine.compute(&criteria) {
      Some(state) => self.publisher.publish(state),
      None => self.publisher.is_current(),
    }
  }

  /// A failure in either source fails the whole feed. Both subscriptions
  /// are released before the error is published.
  fn fail(&mut self, err: Error) {
    self.offers.unsubscribe();
    self.requests.unsubscribe();
    self.publisher.publish(FeedState::from(&err));
  }
}
