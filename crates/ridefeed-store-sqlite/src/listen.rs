//! Live listener registry and snapshot queries.
//!
//! Everything here runs on the database thread, inside a
//! [`tokio_rusqlite::Connection::call`]. Since that thread executes calls one
//! at a time, snapshots reach each listener in commit order.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ridefeed_core::{
  post::{PostKind, PostStatus, RawDocument},
  source::{OrderHint, SourceEvent, SourceQuery},
};
use rusqlite::types::Type;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::schema::STATUS_EXPR;

// ─── Registry ────────────────────────────────────────────────────────────────

struct Listener {
  id:    u64,
  kind:  PostKind,
  query: SourceQuery,
  tx:    mpsc::UnboundedSender<SourceEvent>,
}

#[derive(Default)]
struct Registry {
  next_id: u64,
  entries: Vec<Listener>,
}

/// Shared handle to the registry. Cloned into database calls and into each
/// subscription's release hook.
#[derive(Clone, Default)]
pub(crate) struct Listeners {
  inner: Arc<Mutex<Registry>>,
}

impl Listeners {
  fn lock(&self) -> MutexGuard<'_, Registry> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub(crate) fn register(
    &self,
    kind: PostKind,
    query: SourceQuery,
    tx: mpsc::UnboundedSender<SourceEvent>,
  ) -> u64 {
    let mut reg = self.lock();
    reg.next_id += 1;
    let id = reg.next_id;
    reg.entries.push(Listener { id, kind, query, tx });
    debug!(id, %kind, "listener registered");
    id
  }

  pub(crate) fn remove(&self, id: u64) {
    let mut reg = self.lock();
    reg.entries.retain(|l| l.id != id);
    debug!(id, "listener removed");
  }

  pub(crate) fn count(&self) -> usize { self.lock().entries.len() }

  /// Send the current snapshot to listener `id` only.
  pub(crate) fn deliver_initial(&self, conn: &rusqlite::Connection, id: u64) {
    let reg = self.lock();
    if let Some(listener) = reg.entries.iter().find(|l| l.id == id) {
      deliver(conn, listener);
    }
  }

  /// Re-run every `kind` listener's query and send the results. Listeners
  /// whose subscription has gone away are dropped.
  pub(crate) fn notify(&self, conn: &rusqlite::Connection, kind: PostKind) {
    let mut reg = self.lock();
    reg.entries.retain(|l| !l.tx.is_closed());
    for listener in reg.entries.iter().filter(|l| l.kind == kind) {
      deliver(conn, listener);
    }
  }

  /// Send `Failed` to every `kind` listener and forget them. Returns how
  /// many were failed.
  pub(crate) fn fail(&self, kind: PostKind, message: &str) -> usize {
    let mut reg = self.lock();
    let (failed, kept): (Vec<_>, Vec<_>) =
      std::mem::take(&mut reg.entries).into_iter().partition(|l| l.kind == kind);
    reg.entries = kept;
    for listener in &failed {
      let _ = listener.tx.send(SourceEvent::Failed(message.to_owned()));
    }
    failed.len()
  }
}

fn deliver(conn: &rusqlite::Connection, listener: &Listener) {
  let event = match query_snapshot(conn, listener.kind, &listener.query) {
    Ok(docs) => SourceEvent::Snapshot(docs),
    Err(err) => {
      warn!(id = listener.id, kind = %listener.kind, error = %err, "snapshot query failed");
      SourceEvent::Failed(err.to_string())
    }
  };
  let _ = listener.tx.send(event);
}

// ─── Queries ─────────────────────────────────────────────────────────────────

/// Every document in `kind`'s collection matching `query`.
pub(crate) fn query_snapshot(
  conn: &rusqlite::Connection,
  kind: PostKind,
  query: &SourceQuery,
) -> rusqlite::Result<Vec<RawDocument>> {
  let mut sql = format!(
    "SELECT doc_id, body FROM documents
     WHERE collection = ?1
       AND (?2 IS NULL OR ({STATUS_EXPR}) = ?2)
       AND (?3 IS NULL OR json_extract(body, '$.ownerUid') = ?3)"
  );
  if query.order_hint == OrderHint::UpdatedAtDesc {
    sql.push_str(" ORDER BY json_extract(body, '$.updatedAt') DESC");
  }

  let status = query.status.map(PostStatus::as_str);
  let mut stmt = conn.prepare(&sql)?;
  stmt
    .query_map(
      rusqlite::params![kind.collection(), status, query.owner_id],
      |row| {
        let id: String = row.get(0)?;
        let body: String = row.get(1)?;
        Ok(RawDocument::new(id, decode_body(&body)?))
      },
    )?
    .collect()
}

/// Fetch one document body by id.
pub(crate) fn get_document(
  conn: &rusqlite::Connection,
  kind: PostKind,
  id: &str,
) -> rusqlite::Result<Option<Map<String, Value>>> {
  use rusqlite::OptionalExtension as _;

  let body: Option<String> = conn
    .query_row(
      "SELECT body FROM documents WHERE collection = ?1 AND doc_id = ?2",
      rusqlite::params![kind.collection(), id],
      |row| row.get(0),
    )
    .optional()?;
  body.as_deref().map(decode_body).transpose()
}

fn decode_body(body: &str) -> rusqlite::Result<Map<String, Value>> {
  serde_json::from_str(body)
    .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))
}
