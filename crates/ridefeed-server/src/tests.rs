//! Configuration and wiring tests.

use std::{path::PathBuf, sync::Arc};

use axum::{
  body::{Body, to_bytes},
  http::{Request, StatusCode},
};
use ridefeed_core::feed::Scope;
use ridefeed_store_sqlite::SqliteStore;
use tower::ServiceExt as _;

use crate::{ServerConfig, expand_tilde, load_config, open_feed, router};

fn temp_config(contents: &str) -> PathBuf {
  let path = std::env::temp_dir().join(format!("ridefeed-{}.toml", uuid::Uuid::new_v4()));
  std::fs::write(&path, contents).unwrap();
  path
}

fn test_config() -> ServerConfig {
  ServerConfig {
    host:          "127.0.0.1".into(),
    port:          0,
    store_path:    ":memory:".into(),
    caller_uid:    Some("u1".into()),
    initial_scope: Scope::Browse,
  }
}

// ─── Configuration ───────────────────────────────────────────────────────────

#[test]
fn missing_file_uses_defaults() {
  let path = std::env::temp_dir().join("ridefeed-does-not-exist.toml");
  let cfg = load_config(&path).unwrap();
  assert_eq!(cfg.port, 8080);
  assert_eq!(cfg.initial_scope, Scope::Browse);
  assert!(cfg.store_path.ends_with("ridefeed.db"));
}

#[test]
fn file_values_override_defaults() {
  let path = temp_config(
    r#"
host = "0.0.0.0"
port = 9100
store_path = "/var/lib/ridefeed/feed.db"
caller_uid = "driver-7"
initial_scope = "mine"
"#,
  );
  let cfg = load_config(&path).unwrap();
  std::fs::remove_file(&path).ok();

  assert_eq!(cfg.address(), "0.0.0.0:9100");
  assert_eq!(cfg.store_path, PathBuf::from("/var/lib/ridefeed/feed.db"));
  assert_eq!(cfg.caller_uid.as_deref(), Some("driver-7"));
  assert_eq!(cfg.initial_scope, Scope::Mine);
}

#[test]
fn tilde_expands_to_home() {
  let Ok(home) = std::env::var("HOME") else { return };
  assert_eq!(expand_tilde("~/x.db".as_ref()), PathBuf::from(home).join("x.db"));
  assert_eq!(expand_tilde("/abs/x.db".as_ref()), PathBuf::from("/abs/x.db"));
}

// ─── Wiring ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn router_serves_feed() {
  let store = SqliteStore::open_in_memory().await.unwrap();
  let cfg = test_config();
  let feed = open_feed(&store, &cfg, cfg.initial_scope);
  let app = router(feed.clone(), Arc::new(store));

  let response = app
    .oneshot(Request::builder().uri("/feed").body(Body::empty()).unwrap())
    .await
    .unwrap();
  assert_eq!(response.status(), StatusCode::OK);

  let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
  let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
  assert_eq!(body["scope"], "browse");
  feed.shutdown().await;
}
