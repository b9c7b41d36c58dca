//! [`SqliteStore`] — the SQLite implementation of [`PostStore`], and
//! [`SqliteCollection`], its realtime [`CollectionSource`] per collection.

use std::path::Path;

use chrono::Utc;
use ridefeed_core::{
  post::{PostKind, RawDocument},
  source::{CollectionSource, SourceEvent, SourceQuery, Subscription},
  store::{NewPost, PostPatch, PostStore},
};
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  listen::{Listeners, get_document, query_snapshot},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A listing store backed by a single SQLite file.
///
/// Cloning is cheap: the connection and the listener registry are both
/// reference-counted, so clones observe each other's writes.
#[derive(Clone)]
pub struct SqliteStore {
  conn:      tokio_rusqlite::Connection,
  listeners: Listeners,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn).await
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn).await
  }

  async fn init(conn: tokio_rusqlite::Connection) -> Result<Self> {
    conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(Self { conn, listeners: Listeners::default() })
  }

  /// The realtime source for `kind`'s collection.
  pub fn collection(&self, kind: PostKind) -> SqliteCollection {
    SqliteCollection { store: self.clone(), kind }
  }

  /// Fetch one listing as stored.
  pub async fn get(&self, kind: PostKind, id: impl Into<String>) -> Result<Option<RawDocument>> {
    let id = id.into();
    let doc = self
      .conn
      .call(move |conn| {
        let fields = get_document(conn, kind, &id)?;
        Ok(fields.map(|f| RawDocument::new(id, f)))
      })
      .await?;
    Ok(doc)
  }

  /// One-off query with the same semantics as a subscription's snapshots.
  pub async fn snapshot(&self, kind: PostKind, query: SourceQuery) -> Result<Vec<RawDocument>> {
    let docs = self.conn.call(move |conn| Ok(query_snapshot(conn, kind, &query)?)).await?;
    Ok(docs)
  }

  /// Fail every live subscription on `kind`'s collection with `message`, as
  /// a dropped connection would. The listeners are detached. Returns how many
  /// subscriptions were failed.
  pub async fn fail_listeners(&self, kind: PostKind, message: impl Into<String>) -> Result<usize> {
    let message = message.into();
    let listeners = self.listeners.clone();
    let failed = self.conn.call(move |_| Ok(listeners.fail(kind, &message))).await?;
    warn!(%kind, failed, "failed live subscriptions");
    Ok(failed)
  }

  /// Number of live subscriptions across both collections.
  pub fn listener_count(&self) -> usize { self.listeners.count() }

  /// Insert or replace `body` under (`kind`, `id`) and notify listeners.
  ///
  /// `body` is stored as given; no fields are added.
  pub async fn put_raw(
    &self,
    kind: PostKind,
    id: impl Into<String>,
    body: Map<String, Value>,
  ) -> Result<()> {
    let id = id.into();
    let body = Value::Object(body).to_string();
    let listeners = self.listeners.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO documents (collection, doc_id, body) VALUES (?1, ?2, ?3)",
          rusqlite::params![kind.collection(), id, body],
        )?;
        listeners.notify(conn, kind);
        Ok(())
      })
      .await?;
    Ok(())
  }
}

fn now_millis() -> i64 { Utc::now().timestamp_millis() }

// ─── PostStore impl ──────────────────────────────────────────────────────────

impl PostStore for SqliteStore {
  type Error = Error;

  async fn create_post(&self, input: NewPost) -> Result<String> {
    input.validate()?;

    let id = Uuid::new_v4().to_string();
    let kind = input.kind;
    let now = now_millis();
    let mut fields = input.to_fields();
    fields.insert("createdAt".into(), now.into());
    fields.insert("updatedAt".into(), now.into());

    self.put_raw(kind, id.clone(), fields).await?;
    debug!(%kind, %id, "post created");
    Ok(id)
  }

  async fn update_post(&self, kind: PostKind, id: String, patch: PostPatch) -> Result<()> {
    patch.validate()?;

    let changes = patch.to_fields();
    let listeners = self.listeners.clone();
    let doc_id = id.clone();

    let found = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let Some(mut body) = get_document(&tx, kind, &doc_id)? else {
          return Ok(false);
        };
        body.extend(changes);
        body.insert("updatedAt".into(), now_millis().into());
        tx.execute(
          "UPDATE documents SET body = ?3 WHERE collection = ?1 AND doc_id = ?2",
          rusqlite::params![kind.collection(), doc_id, Value::Object(body).to_string()],
        )?;
        tx.commit()?;
        listeners.notify(conn, kind);
        Ok(true)
      })
      .await?;

    if !found {
      return Err(ridefeed_core::Error::PostNotFound { kind, id }.into());
    }
    debug!(%kind, %id, "post updated");
    Ok(())
  }
}

// ─── Realtime source ─────────────────────────────────────────────────────────

/// Live view of one collection of a [`SqliteStore`].
#[derive(Clone)]
pub struct SqliteCollection {
  store: SqliteStore,
  kind:  PostKind,
}

impl SqliteCollection {
  pub fn kind(&self) -> PostKind { self.kind }
}

impl CollectionSource for SqliteCollection {
  /// Register a listener and schedule delivery of the current snapshot.
  ///
  /// Must be called from within a Tokio runtime.
  fn subscribe(&self, query: SourceQuery) -> ridefeed_core::Result<Subscription> {
    let runtime = tokio::runtime::Handle::try_current()
      .map_err(|e| ridefeed_core::Error::SourceSubscription(e.to_string()))?;

    let (tx, rx) = mpsc::unbounded_channel();
    let listeners = self.store.listeners.clone();
    let id = listeners.register(self.kind, query, tx.clone());

    let conn = self.store.conn.clone();
    let initial = listeners.clone();
    runtime.spawn(async move {
      let delivered = conn.call(move |conn| {
        initial.deliver_initial(conn, id);
        Ok(())
      });
      if let Err(err) = delivered.await {
        warn!(id, error = %err, "initial snapshot failed");
        let _ = tx.send(SourceEvent::Failed(err.to_string()));
      }
    });

    Ok(Subscription::new(rx, move || listeners.remove(id)))
  }
}
