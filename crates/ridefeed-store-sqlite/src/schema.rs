//! SQL schema for the listing store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- One row per listing. `body` is the JSON document as clients see it;
-- `doc_id` is not repeated inside it.
CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,   -- 'offers' | 'requests'
    doc_id     TEXT NOT NULL,
    body       TEXT NOT NULL,
    PRIMARY KEY (collection, doc_id)
);

CREATE INDEX IF NOT EXISTS documents_owner_idx
    ON documents(collection, json_extract(body, '$.ownerUid'));

PRAGMA user_version = 1;
";

/// SQL expression folding a document's raw `status` into `'open'` or
/// `'closed'`. Missing or null means open; only the string `"open"` (any
/// case) is open otherwise.
pub const STATUS_EXPR: &str = "
CASE
  WHEN json_type(body, '$.status') IS NULL
    OR json_type(body, '$.status') = 'null'
    OR (json_type(body, '$.status') = 'text'
        AND lower(trim(json_extract(body, '$.status'))) = 'open')
  THEN 'open'
  ELSE 'closed'
END";
