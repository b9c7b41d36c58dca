//! Handlers for `/feed` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/feed` | Current feed state, scope and criteria |
//! | `PUT`    | `/feed/scope` | Body: `{"scope":"browse"\|"mine"}` |
//! | `PUT`    | `/feed/filter` | Body: filter criteria |
//! | `DELETE` | `/feed/filter` | Clear all criteria |
//! | `POST`   | `/feed/retry` | Re-open the current scope |
//!
//! Every handler responds with the feed as it stands after the command.
//! Scope changes and retries usually answer `loading`; poll `GET /feed` for
//! the result.

use axum::{Json, extract::State};
use ridefeed_core::{
  feed::{FeedState, Scope},
  filter::{DateRange, FilterCriteria},
};
use ridefeed_engine::FeedAggregator;
use serde::{Deserialize, Serialize};

use crate::ApiState;

/// Response body for every feed endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedView {
  /// `null` until a scope has been set.
  pub scope:          Option<Scope>,
  pub filter:         FilterCriteria,
  pub active_filters: usize,
  #[serde(flatten)]
  pub state:          FeedState,
}

impl FeedView {
  pub fn of(feed: &FeedAggregator) -> Self {
    let filter = feed.filter_criteria();
    Self {
      scope: feed.scope(),
      active_filters: filter.active_count(),
      filter,
      state: feed.state(),
    }
  }
}

// ─── Read ────────────────────────────────────────────────────────────────────

/// `GET /feed`
pub async fn get_feed<S>(State(app): State<ApiState<S>>) -> Json<FeedView> {
  Json(FeedView::of(&app.feed))
}

// ─── Scope ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ScopeBody {
  pub scope: Scope,
}

/// `PUT /feed/scope` — body: `{"scope":"mine"}`
pub async fn set_scope<S>(
  State(app): State<ApiState<S>>,
  Json(body): Json<ScopeBody>,
) -> Json<FeedView> {
  app.feed.set_scope(body.scope);
  Json(FeedView::of(&app.feed))
}

/// `POST /feed/retry`
pub async fn retry<S>(State(app): State<ApiState<S>>) -> Json<FeedView> {
  app.feed.retry();
  Json(FeedView::of(&app.feed))
}

// ─── Filter ──────────────────────────────────────────────────────────────────

/// Criteria as submitted. Blank text counts as unset.
#[derive(Debug, Default, Deserialize)]
pub struct FilterBody {
  #[serde(default)]
  pub origin:      Option<String>,
  #[serde(default)]
  pub destination: Option<String>,
  #[serde(default)]
  pub date_range:  Option<DateRange>,
}

/// `PUT /feed/filter` — body: `{"origin":"..","destination":"..","date_range":{"kind":"this_week"}}`
pub async fn set_filter<S>(
  State(app): State<ApiState<S>>,
  Json(body): Json<FilterBody>,
) -> Json<FeedView> {
  app
    .feed
    .set_filter_criteria(FilterCriteria::new(body.origin, body.destination, body.date_range));
  Json(FeedView::of(&app.feed))
}

/// `DELETE /feed/filter`
pub async fn clear_filter<S>(State(app): State<ApiState<S>>) -> Json<FeedView> {
  app.feed.clear_filters();
  Json(FeedView::of(&app.feed))
}
