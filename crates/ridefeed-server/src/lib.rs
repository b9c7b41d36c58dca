//! Wiring for the `ridefeed` binary: configuration, the aggregator over a
//! SQLite store, and the HTTP router.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use axum::Router;
use ridefeed_core::{feed::Scope, post::PostKind, source::StaticIdentity};
use ridefeed_engine::{FeedAggregator, SessionDeps};
use ridefeed_store_sqlite::SqliteStore;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime configuration, layered from defaults, an optional TOML file and
/// `RIDEFEED_*` environment variables.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ServerConfig {
  pub host:          String,
  pub port:          u16,
  pub store_path:    PathBuf,
  /// The signed-in user. Without one, the `mine` scope reports an
  /// unauthenticated error and posts need an explicit owner.
  #[serde(default)]
  pub caller_uid:    Option<String>,
  pub initial_scope: Scope,
}

impl ServerConfig {
  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

/// Read configuration from `path` (if it exists) and the environment.
pub fn load_config(path: &Path) -> Result<ServerConfig, config::ConfigError> {
  let mut cfg: ServerConfig = config::Config::builder()
    .set_default("host", "127.0.0.1")?
    .set_default("port", 8080)?
    .set_default("store_path", "~/.local/share/ridefeed/ridefeed.db")?
    .set_default("initial_scope", "browse")?
    .add_source(config::File::from(path).required(false))
    .add_source(config::Environment::with_prefix("RIDEFEED"))
    .build()?
    .try_deserialize()?;
  cfg.store_path = expand_tilde(&cfg.store_path);
  Ok(cfg)
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Assembly ────────────────────────────────────────────────────────────────

/// Session dependencies reading both collections of `store`.
pub fn session_deps(store: &SqliteStore, caller_uid: Option<String>) -> SessionDeps {
  SessionDeps {
    offers:   Arc::new(store.collection(PostKind::Offer)),
    requests: Arc::new(store.collection(PostKind::Request)),
    identity: Arc::new(StaticIdentity(caller_uid)),
  }
}

/// An aggregator over `store` with `scope` already open.
///
/// Must be called from within a Tokio runtime.
pub fn open_feed(store: &SqliteStore, cfg: &ServerConfig, scope: Scope) -> Arc<FeedAggregator> {
  let feed = Arc::new(FeedAggregator::new(session_deps(store, cfg.caller_uid.clone())));
  feed.set_scope(scope);
  feed
}

/// The full HTTP application with request tracing.
pub fn router(feed: Arc<FeedAggregator>, store: Arc<SqliteStore>) -> Router {
  Router::new()
    .merge(ridefeed_api::api_router(feed, store))
    .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests;
