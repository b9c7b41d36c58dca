//! Error types for `ridefeed-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A realtime source could not be subscribed to, or reported a transport
  /// failure after subscribing.
  #[error("source subscription failed: {0}")]
  SourceSubscription(String),

  /// No authenticated caller was available when one was required.
  #[error("no authenticated caller")]
  IdentityUnavailable,

  #[error("post not found: {kind} {id}")]
  PostNotFound { kind: crate::post::PostKind, id: String },

  #[error("invalid post: {0}")]
  InvalidPost(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  /// Whether re-opening the session from scratch may succeed.
  pub fn is_retryable(&self) -> bool {
    matches!(self, Self::SourceSubscription(_))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
