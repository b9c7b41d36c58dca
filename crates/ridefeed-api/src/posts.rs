//! Handlers for `/posts` endpoints, the listing write path.
//!
//! | Method  | Path | Notes |
//! |---------|------|-------|
//! | `POST`  | `/posts` | Body: new listing; `owner_id` defaults to the caller |
//! | `PATCH` | `/posts/{kind}/{id}` | Partial edit; 404 if not found |
//! | `POST`  | `/posts/{kind}/{id}/close` | Mark closed; 404 if not found |
//!
//! Writes do not touch the feed directly. Open subscriptions pick them up
//! and the feed recomputes.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use ridefeed_core::{
  post::{GeoPoint, PostKind},
  store::{NewPost, PostPatch, PostStore},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::{ApiState, error::ApiError};

// ─── Create ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub kind:           PostKind,
  /// Defaults to the caller's identity.
  #[serde(default)]
  pub owner_id:       Option<String>,
  pub origin:         String,
  pub destination:    String,
  pub scheduled_at:   i64,
  pub seats:          u32,
  #[serde(default)]
  pub price_per_seat: Option<f64>,
  #[serde(default)]
  pub max_budget:     Option<f64>,
  #[serde(default)]
  pub pickup:         Option<GeoPoint>,
  #[serde(default)]
  pub dropoff:        Option<GeoPoint>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Created {
  pub kind: PostKind,
  pub id:   String,
}

/// `POST /posts`
pub async fn create<S>(
  State(app): State<ApiState<S>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PostStore,
{
  let owner_id = body
    .owner_id
    .or_else(|| app.feed.caller_uid())
    .ok_or_else(|| ApiError::Unauthorized("User not authenticated".into()))?;

  let input = NewPost {
    price_per_seat: body.price_per_seat,
    max_budget: body.max_budget,
    pickup: body.pickup,
    dropoff: body.dropoff,
    ..NewPost::new(body.kind, owner_id, body.origin, body.destination, body.scheduled_at, body.seats)
  };
  let id = app.store.create_post(input).await.map_err(ApiError::from_store)?;
  debug!(kind = %body.kind, %id, "post created via api");
  Ok((StatusCode::CREATED, Json(Created { kind: body.kind, id })))
}

// ─── Update ──────────────────────────────────────────────────────────────────

/// `PATCH /posts/{kind}/{id}` — body: any subset of
/// `{"origin","destination","scheduled_at","seats","status"}`
pub async fn update<S>(
  State(app): State<ApiState<S>>,
  Path((kind, id)): Path<(PostKind, String)>,
  Json(patch): Json<PostPatch>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PostStore,
{
  if patch.is_empty() {
    return Err(ApiError::BadRequest("patch has no fields".into()));
  }
  app
    .store
    .update_post(kind, id.clone(), patch)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(json!({ "kind": kind, "id": id })))
}

// ─── Close ───────────────────────────────────────────────────────────────────

/// `POST /posts/{kind}/{id}/close`
pub async fn close<S>(
  State(app): State<ApiState<S>>,
  Path((kind, id)): Path<(PostKind, String)>,
) -> Result<StatusCode, ApiError>
where
  S: PostStore,
{
  app.store.close_post(kind, id).await.map_err(ApiError::from_store)?;
  Ok(StatusCode::NO_CONTENT)
}
