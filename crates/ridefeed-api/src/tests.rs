//! End-to-end API tests over an in-memory store and a live aggregator.

use std::{sync::Arc, time::Duration};

use axum::{
  Router,
  body::{Body, to_bytes},
  http::{Method, Request, StatusCode},
};
use ridefeed_core::{
  feed::{FeedState, Scope},
  post::PostKind,
  source::StaticIdentity,
};
use ridefeed_engine::{FeedAggregator, SessionDeps};
use ridefeed_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt as _;

use crate::{api_router, feed::FeedView};

struct App {
  router: Router,
  feed:   Arc<FeedAggregator>,
}

async fn app(caller: Option<&str>) -> App {
  let store = SqliteStore::open_in_memory().await.expect("in-memory store");
  let deps = SessionDeps {
    offers:   Arc::new(store.collection(PostKind::Offer)),
    requests: Arc::new(store.collection(PostKind::Request)),
    identity: Arc::new(StaticIdentity(caller.map(str::to_owned))),
  };
  let feed = Arc::new(FeedAggregator::new(deps));
  feed.set_scope(Scope::Browse);
  App { router: api_router(feed.clone(), Arc::new(store)), feed }
}

async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
  let builder = Request::builder().method(method).uri(uri);
  let request = match body {
    Some(v) => builder
      .header("content-type", "application/json")
      .body(Body::from(v.to_string()))
      .unwrap(),
    None => builder.body(Body::empty()).unwrap(),
  };
  let response = router.clone().oneshot(request).await.unwrap();
  let status = response.status();
  let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
  let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
  (status, value)
}

/// Wait until the feed leaves `Loading` and satisfies `pred`.
async fn settled(feed: &FeedAggregator, pred: impl FnMut(&FeedState) -> bool) -> FeedState {
  let mut rx = feed.subscribe();
  tokio::time::timeout(Duration::from_secs(2), rx.wait_for(pred))
    .await
    .expect("timed out waiting for feed")
    .expect("feed closed")
    .clone()
}

fn is_success(state: &FeedState) -> bool { matches!(state, FeedState::Success { .. }) }

fn new_offer(from: &str) -> Value {
  json!({
    "kind": "offer",
    "origin": from,
    "destination": "Omaha",
    "scheduled_at": 1_715_774_400_000_i64,
    "seats": 2,
    "price_per_seat": 10.0
  })
}

// ─── Feed ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn feed_reports_empty_then_created_posts() {
  let app = app(Some("u1")).await;
  settled(&app.feed, |s| *s == FeedState::Empty).await;

  let (status, body) = send(&app.router, Method::GET, "/feed", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["state"], "empty");
  assert_eq!(body["scope"], "browse");
  assert_eq!(body["active_filters"], 0);

  let (status, created) = send(&app.router, Method::POST, "/posts", Some(new_offer("Lincoln"))).await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(created["kind"], "offer");

  settled(&app.feed, is_success).await;
  let (_, body) = send(&app.router, Method::GET, "/feed", None).await;
  let view: FeedView = serde_json::from_value(body).unwrap();
  let items = view.state.items();
  assert_eq!(items.len(), 1);
  assert_eq!(items[0].id, created["id"].as_str().unwrap());
  assert_eq!(items[0].owner_id, "u1");
}

#[tokio::test]
async fn filter_narrows_and_clear_restores() {
  let app = app(Some("u1")).await;
  send(&app.router, Method::POST, "/posts", Some(new_offer("Lincoln"))).await;
  settled(&app.feed, is_success).await;

  let (status, body) = send(
    &app.router,
    Method::PUT,
    "/feed/filter",
    Some(json!({ "origin": "  kearney ", "destination": "" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["filter"]["origin"], "kearney");
  assert_eq!(body["active_filters"], 1);
  settled(&app.feed, |s| *s == FeedState::Empty).await;

  let (_, body) = send(&app.router, Method::DELETE, "/feed/filter", None).await;
  assert_eq!(body["active_filters"], 0);
  settled(&app.feed, is_success).await;
}

#[tokio::test]
async fn mine_scope_without_identity_is_not_retryable() {
  let app = app(None).await;
  let (status, body) =
    send(&app.router, Method::PUT, "/feed/scope", Some(json!({ "scope": "mine" }))).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["state"], "error");
  assert_eq!(body["message"], "User not authenticated");
  assert_eq!(body["retryable"], false);
}

#[tokio::test]
async fn mine_scope_shows_closed_posts() {
  let app = app(Some("u1")).await;
  let (_, created) = send(&app.router, Method::POST, "/posts", Some(new_offer("Lincoln"))).await;
  let id = created["id"].as_str().unwrap().to_owned();

  let (status, _) = send(&app.router, Method::POST, &format!("/posts/offer/{id}/close"), None).await;
  assert_eq!(status, StatusCode::NO_CONTENT);

  send(&app.router, Method::PUT, "/feed/scope", Some(json!({ "scope": "mine" }))).await;
  let state = settled(&app.feed, is_success).await;
  assert_eq!(state.items()[0].id, id);

  send(&app.router, Method::PUT, "/feed/scope", Some(json!({ "scope": "browse" }))).await;
  settled(&app.feed, |s| *s == FeedState::Empty).await;
}

#[tokio::test]
async fn retry_reopens_current_scope() {
  let app = app(Some("u1")).await;
  settled(&app.feed, |s| *s == FeedState::Empty).await;

  let (status, body) = send(&app.router, Method::POST, "/feed/retry", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["scope"], "browse");
  settled(&app.feed, |s| *s == FeedState::Empty).await;
}

// ─── Posts ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_without_identity_is_unauthorized() {
  let app = app(None).await;
  let (status, body) = send(&app.router, Method::POST, "/posts", Some(new_offer("Lincoln"))).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
  assert!(body["error"].is_string());

  let mut explicit = new_offer("Lincoln");
  explicit["owner_id"] = json!("u9");
  let (status, _) = send(&app.router, Method::POST, "/posts", Some(explicit)).await;
  assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn invalid_post_is_bad_request() {
  let app = app(Some("u1")).await;
  let mut body = new_offer("Lincoln");
  body["price_per_seat"] = json!(5000.0);
  let (status, err) = send(&app.router, Method::POST, "/posts", Some(body)).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(err["error"].as_str().unwrap().contains("between 0 and 1000"));
}

#[tokio::test]
async fn patch_updates_and_missing_is_not_found() {
  let app = app(Some("u1")).await;
  let (_, created) = send(&app.router, Method::POST, "/posts", Some(new_offer("Lincoln"))).await;
  let id = created["id"].as_str().unwrap().to_owned();

  let (status, _) = send(
    &app.router,
    Method::PATCH,
    &format!("/posts/offer/{id}"),
    Some(json!({ "origin": "Kearney" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  let state = settled(&app.feed, |s| s.items().first().is_some_and(|p| p.origin == "Kearney")).await;
  assert_eq!(state.items().len(), 1);

  let (status, _) =
    send(&app.router, Method::PATCH, &format!("/posts/request/{id}"), Some(json!({ "seats": 1 }))).await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let (status, _) = send(&app.router, Method::PATCH, &format!("/posts/offer/{id}"), Some(json!({}))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}
