//! Timestamp normalization.
//!
//! Documents written by different clients over time carry points in time in
//! several shapes: epoch milliseconds as integers or floats, numeric strings,
//! and the store's native timestamp object. Everything downstream compares a
//! single `i64` of epoch milliseconds, produced here.

use serde_json::{Map, Value};

/// The closed set of raw representations [`normalize`] understands.
#[derive(Debug, Clone, Copy, PartialEq)]
enum RawInstant<'a> {
  Integer(i64),
  Float(f64),
  Text(&'a str),
  /// A native timestamp object carrying whole seconds since the epoch.
  Seconds(i64),
  Unrecognised,
}

impl<'a> RawInstant<'a> {
  fn classify(raw: &'a Value) -> Self {
    match raw {
      Value::Number(n) => {
        if let Some(i) = n.as_i64() {
          Self::Integer(i)
        } else if let Some(u) = n.as_u64() {
          Self::Integer(i64::try_from(u).unwrap_or(i64::MAX))
        } else if let Some(f) = n.as_f64() {
          Self::Float(f)
        } else {
          Self::Unrecognised
        }
      }
      Value::String(s) => Self::Text(s),
      Value::Object(obj) => seconds_field(obj).map_or(Self::Unrecognised, Self::Seconds),
      _ => Self::Unrecognised,
    }
  }

  fn to_millis(self) -> i64 {
    match self {
      Self::Integer(i) => i,
      Self::Float(f) if f.is_finite() => f.trunc() as i64,
      Self::Float(_) => 0,
      Self::Text(s) => s.trim().parse::<i64>().unwrap_or(0),
      Self::Seconds(secs) => secs.saturating_mul(1000),
      Self::Unrecognised => 0,
    }
  }
}

/// `seconds` is the field name used by the client SDK object, `_seconds` the
/// one used when the same object is serialised to JSON by the admin SDK.
fn seconds_field(obj: &Map<String, Value>) -> Option<i64> {
  ["seconds", "_seconds"]
    .iter()
    .find_map(|key| obj.get(*key).and_then(Value::as_i64))
}

/// Convert any supported raw representation of a point in time into epoch
/// milliseconds.
///
/// Never fails: `null`, missing values and unrecognised shapes all yield `0`,
/// and negative instants are clamped to `0`.
pub fn normalize(raw: &Value) -> i64 { RawInstant::classify(raw).to_millis().max(0) }

/// [`normalize`] over an optional field lookup.
pub fn normalize_opt(raw: Option<&Value>) -> i64 { raw.map_or(0, normalize) }
