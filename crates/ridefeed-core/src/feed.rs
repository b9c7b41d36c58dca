//! The published feed: scopes and the four-state publication contract.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, post::PostRecord};

/// The logical subset of listings a session is responsible for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
  /// Everyone's open listings; subject to user filter criteria.
  Browse,
  /// The caller's own listings regardless of status.
  Mine,
}

impl fmt::Display for Scope {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Browse => "browse",
      Self::Mine => "mine",
    })
  }
}

/// Parses the serialized names (`browse`, `mine`), ignoring case and
/// surrounding whitespace.
impl FromStr for Scope {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Error> {
    let name = serde_json::Value::String(s.trim().to_ascii_lowercase());
    Ok(serde_json::from_value(name)?)
  }
}

/// What the presentation layer renders.
///
/// `Loading` is only ever the first state of a freshly opened session. Every
/// later state is a full recomputation, so any state may follow any other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FeedState {
  Loading,
  Empty,
  Error { message: String, retryable: bool },
  Success { items: Vec<PostRecord> },
}

impl FeedState {
  /// `Empty` for no items, otherwise `Success`.
  pub fn from_items(items: Vec<PostRecord>) -> Self {
    if items.is_empty() {
      Self::Empty
    } else {
      Self::Success { items }
    }
  }

  pub fn is_loading(&self) -> bool { matches!(self, Self::Loading) }

  pub fn items(&self) -> &[PostRecord] {
    match self {
      Self::Success { items } => items,
      _ => &[],
    }
  }
}

impl From<&Error> for FeedState {
  fn from(err: &Error) -> Self {
    let message = match err {
      Error::SourceSubscription(_) => "Failed to load posts. Please check your connection.".to_owned(),
      Error::IdentityUnavailable => "User not authenticated".to_owned(),
      other => other.to_string(),
    };
    Self::Error { message, retryable: err.is_retryable() }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn scope_parses_its_own_display_names() {
    for scope in [Scope::Browse, Scope::Mine] {
      assert_eq!(scope.to_string().parse::<Scope>().unwrap(), scope);
    }
    assert_eq!(" MINE ".parse::<Scope>().unwrap(), Scope::Mine);
    assert!(matches!("everyone".parse::<Scope>(), Err(Error::Serialization(_))));
  }

  #[test]
  fn source_failures_are_retryable() {
    let state = FeedState::from(&Error::SourceSubscription("socket closed".into()));
    assert!(matches!(state, FeedState::Error { retryable: true, .. }));
  }

  #[test]
  fn missing_identity_is_not_retryable() {
    let state = FeedState::from(&Error::IdentityUnavailable);
    assert_eq!(
      state,
      FeedState::Error { message: "User not authenticated".into(), retryable: false }
    );
  }

  #[test]
  fn serialises_with_state_tag() {
    let json = serde_json::to_value(FeedState::Empty).unwrap();
    assert_eq!(json, serde_json::json!({ "state": "empty" }));
  }
}
