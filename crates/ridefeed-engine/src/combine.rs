//! The stream combination step.
//!
//! Holds the latest snapshot from each of the two sources and recomputes the
//! whole feed from them on every change. No incremental state is kept, so a
//! missed or reordered delivery corrects itself on the next snapshot.

use std::cmp::Ordering;

use chrono::{Local, NaiveDate, TimeZone};
use ridefeed_core::{
  feed::{FeedState, Scope},
  filter::FilterCriteria,
  post::{PostKind, PostRecord, RawDocument},
};

// ─── Scope filter ────────────────────────────────────────────────────────────

/// A [`Scope`] resolved against the caller's identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeFilter {
  /// Open listings from every owner; user criteria apply.
  Browse,
  /// Listings owned by `owner_id`, any status; user criteria do not apply.
  Mine { owner_id: String },
}

impl ScopeFilter {
  pub fn scope(&self) -> Scope {
    match self {
      Self::Browse => Scope::Browse,
      Self::Mine { .. } => Scope::Mine,
    }
  }

  fn admits(&self, post: &PostRecord) -> bool {
    match self {
      Self::Browse => post.is_open(),
      // Sources already narrow by owner; re-checked so a misbehaving source
      // cannot leak someone else's listing into "mine".
      Self::Mine { owner_id } => post.owner_id == *owner_id,
    }
  }

  fn honours_criteria(&self) -> bool { matches!(self, Self::Browse) }
}

// ─── Pure combination ────────────────────────────────────────────────────────

/// Feed order: most recently updated first, then `id` ascending, then offers
/// before requests. The secondary keys make the order total.
pub fn feed_order(a: &PostRecord, b: &PostRecord) -> Ordering {
  b.updated_at_millis
    .cmp(&a.updated_at_millis)
    .then_with(|| a.id.cmp(&b.id))
    .then_with(|| a.kind.cmp(&b.kind))
}

/// Merge, scope-filter, criteria-filter and sort two mapped snapshots, using
/// an explicit calendar for date-range criteria.
pub fn combine_on<Tz: TimeZone>(
  filter: &ScopeFilter,
  offers: &[PostRecord],
  requests: &[PostRecord],
  criteria: &FilterCriteria,
  today: NaiveDate,
  tz: &Tz,
) -> Vec<PostRecord> {
  let apply_criteria = filter.honours_criteria() && criteria.is_active();
  let mut merged: Vec<PostRecord> = offers
    .iter()
    .chain(requests)
    .filter(|p| filter.admits(p))
    .filter(|p| !apply_criteria || criteria.matches_on(p, today, tz))
    .cloned()
    .collect();
  merged.sort_by(feed_order);
  merged
}

/// [`combine_on`] against the local clock and time zone.
pub fn combine(
  filter: &ScopeFilter,
  offers: &[PostRecord],
  requests: &[PostRecord],
  criteria: &FilterCriteria,
) -> Vec<PostRecord> {
  combine_on(filter, offers, requests, criteria, Local::now().date_naive(), &Local)
}

/// Map one raw snapshot from the `kind` collection.
pub fn map_snapshot(kind: PostKind, docs: &[RawDocument]) -> Vec<PostRecord> {
  docs.iter().map(|d| PostRecord::from_raw(kind, d)).collect()
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// Latest mapped snapshot per source for one scope.
///
/// Not shared: the owning session task is its only user, which keeps the two
/// snapshots consistent with each other.
#[derive(Debug)]
pub struct CombinationEngine {
  filter:   ScopeFilter,
  offers:   Option<Vec<PostRecord>>,
  requests: Option<Vec<PostRecord>>,
}

impl CombinationEngine {
  pub fn new(filter: ScopeFilter) -> Self { Self { filter, offers: None, requests: None } }

  pub fn filter(&self) -> &ScopeFilter { &self.filter }

  /// Replace the held snapshot for `kind`.
  pub fn accept(&mut self, kind: PostKind, docs: &[RawDocument]) {
    let mapped = Some(map_snapshot(kind, docs));
    match kind {
      PostKind::Offer => self.offers = mapped,
      PostKind::Request => self.requests = mapped,
    }
  }

  /// Both sources have delivered at least once.
  pub fn is_ready(&self) -> bool { self.offers.is_some() && self.requests.is_some() }

  /// The feed for the held snapshots, or `None` until both sources have
  /// delivered.
  pub fn compute(&self, criteria: &FilterCriteria) -> Option<FeedState> {
    let (offers, requests) = (self.offers.as_deref()?, self.requests.as_deref()?);
    Some(FeedState::from_items(combine(&self.filter, offers, requests, criteria)))
  }
}
