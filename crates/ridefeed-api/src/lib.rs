//! JSON REST API for the ride feed.
//!
//! Exposes an axum [`Router`] over one [`FeedAggregator`] (the read side) and
//! any [`ridefeed_core::store::PostStore`] (the write side). Auth, TLS, and
//! transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", ridefeed_api::api_router(feed.clone(), store.clone()))
//! ```

pub mod error;
pub mod feed;
pub mod posts;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, patch, post, put},
};
use ridefeed_core::store::PostStore;
use ridefeed_engine::FeedAggregator;

pub use error::ApiError;

/// Shared handler state.
pub struct ApiState<S> {
  pub feed:  Arc<FeedAggregator>,
  pub store: Arc<S>,
}

impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self { Self { feed: self.feed.clone(), store: self.store.clone() } }
}

/// Build a fully-materialised API router.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(feed: Arc<FeedAggregator>, store: Arc<S>) -> Router<()>
where
  S: PostStore + 'static,
{
  Router::new()
    // Feed
    .route("/feed", get(feed::get_feed::<S>))
    .route("/feed/scope", put(feed::set_scope::<S>))
    .route("/feed/filter", put(feed::set_filter::<S>).delete(feed::clear_filter::<S>))
    .route("/feed/retry", post(feed::retry::<S>))
    // Posts
    .route("/posts", post(posts::create::<S>))
    .route("/posts/{kind}/{id}", patch(posts::update::<S>))
    .route("/posts/{kind}/{id}/close", post(posts::close::<S>))
    .with_state(ApiState { feed, store })
}

#[cfg(test)]
mod tests;
