//! Post records: the unified, source-agnostic view of one listing.
//!
//! Offers and requests live in separate collections and have drifted apart in
//! field naming over time. Every downstream component sees only
//! [`PostRecord`], built from a [`RawDocument`] by [`PostRecord::from_raw`].
//! A record is never mutated; a changed document produces a new record.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::timestamp::normalize_opt;

// ─── Kind & status ───────────────────────────────────────────────────────────

/// Which collection a listing came from.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PostKind {
  /// A driver offering seats.
  Offer,
  /// A rider looking for a ride.
  Request,
}

impl PostKind {
  /// The value stored in a document's `type` field.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Offer => "offer",
      Self::Request => "request",
    }
  }

  /// Name of the backing collection.
  pub fn collection(self) -> &'static str {
    match self {
      Self::Offer => "offers",
      Self::Request => "requests",
    }
  }
}

impl fmt::Display for PostKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
  Open,
  Closed,
}

impl PostStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Open => "open",
      Self::Closed => "closed",
    }
  }

  /// Documents written before `status` existed are open; any value other
  /// than `"open"` (`"closed"`, `"matched"`, `"cancelled"`, …) is closed.
  fn from_raw(raw: Option<&Value>) -> Self {
    match raw {
      None | Some(Value::Null) => Self::Open,
      Some(Value::String(s)) if s.trim().eq_ignore_ascii_case("open") => Self::Open,
      Some(_) => Self::Closed,
    }
  }
}

// ─── Raw documents ───────────────────────────────────────────────────────────

/// One document exactly as a realtime source delivered it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
  /// Source-assigned id, unique within its collection.
  pub id:     String,
  pub fields: Map<String, Value>,
}

impl RawDocument {
  pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
    Self { id: id.into(), fields }
  }

  /// Build from a JSON value; non-object values yield an empty field map.
  pub fn from_value(id: impl Into<String>, value: Value) -> Self {
    let fields = match value {
      Value::Object(map) => map,
      _ => Map::new(),
    };
    Self::new(id, fields)
  }

  fn get(&self, key: &str) -> Option<&Value> { self.fields.get(key) }

  /// First non-null value among `keys`.
  fn first(&self, keys: &[&str]) -> Option<&Value> {
    keys.iter().find_map(|k| self.get(k).filter(|v| !v.is_null()))
  }

  fn text(&self, keys: &[&str]) -> String {
    keys
      .iter()
      .find_map(|k| self.get(k).and_then(Value::as_str))
      .unwrap_or_default()
      .to_owned()
  }

  fn opt_text(&self, key: &str) -> Option<String> {
    self.get(key).and_then(Value::as_str).map(str::to_owned)
  }

  fn opt_bool(&self, key: &str) -> Option<bool> { self.get(key).and_then(Value::as_bool) }

  fn non_negative(&self, key: &str) -> Option<f64> {
    self
      .get(key)
      .and_then(Value::as_f64)
      .filter(|f| f.is_finite() && *f >= 0.0)
  }
}

// ─── Matching attributes ─────────────────────────────────────────────────────

/// A latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
  pub latitude:  f64,
  pub longitude: f64,
}

impl GeoPoint {
  fn from_raw(raw: &Value) -> Option<Self> {
    let obj = raw.as_object()?;
    let coord = |plain: &str, underscored: &str| {
      obj
        .get(plain)
        .or_else(|| obj.get(underscored))
        .and_then(Value::as_f64)
    };
    Some(Self {
      latitude:  coord("latitude", "_latitude")?,
      longitude: coord("longitude", "_longitude")?,
    })
  }
}

/// Attributes used by the downstream ride-matching feature. The aggregator
/// never interprets them; they are carried through unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchingAttributes {
  /// Offer start location or request pickup location.
  pub pickup:             Option<GeoPoint>,
  /// Offer end location or request dropoff location.
  pub dropoff:            Option<GeoPoint>,
  /// Whether smoking is acceptable to the poster.
  pub smoking_ok:         Option<bool>,
  /// Whether pets are acceptable to the poster.
  pub pets_ok:            Option<bool>,
  pub music_preference:   Option<String>,
  pub conversation_level: Option<String>,
  /// Requests only.
  pub max_budget:         Option<f64>,
  /// Offers only.
  pub driver_rating:      Option<f64>,
}

impl MatchingAttributes {
  fn from_raw(kind: PostKind, doc: &RawDocument) -> Self {
    let point = |key: &str| doc.get(key).and_then(GeoPoint::from_raw);
    let (pickup, dropoff, smoking_ok, pets_ok) = match kind {
      PostKind::Offer => (
        point("startLocation"),
        point("endLocation"),
        doc.opt_bool("allowsSmoking"),
        doc.opt_bool("allowsPets"),
      ),
      PostKind::Request => (
        point("pickupLocation"),
        point("dropoffLocation"),
        doc.opt_bool("needsNonSmoking").map(|b| !b),
        doc.opt_bool("needsNoPets").map(|b| !b),
      ),
    };

    Self {
      pickup,
      dropoff,
      smoking_ok,
      pets_ok,
      music_preference: doc.opt_text("musicPreference"),
      conversation_level: doc.opt_text("conversationLevel"),
      max_budget: match kind {
        PostKind::Request => doc.non_negative("maxBudget"),
        PostKind::Offer => None,
      },
      driver_rating: match kind {
        PostKind::Offer => doc.non_negative("driverRating"),
        PostKind::Request => None,
      },
    }
  }
}

// ─── PostRecord ──────────────────────────────────────────────────────────────

/// The unified view of one offer or request.
///
/// Identity is `(kind, id)`: ids are only unique within one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
  pub id:                  String,
  pub kind:                PostKind,
  pub owner_id:            String,
  pub origin:              String,
  pub destination:         String,
  /// Departure time in epoch millis; `0` when absent.
  pub scheduled_at_millis: i64,
  pub seat_count:          Option<u32>,
  pub status:              PostStatus,
  /// Last edit in epoch millis; the feed's ordering key.
  pub updated_at_millis:   i64,
  pub created_at_millis:   i64,
  /// Price per seat; offers only.
  pub price:               Option<f64>,
  pub matching:            MatchingAttributes,
}

impl PostRecord {
  /// Map a raw document from the `kind` collection.
  ///
  /// Total: missing or malformed fields degrade to defaults and the record is
  /// still produced.
  pub fn from_raw(kind: PostKind, doc: &RawDocument) -> Self {
    let scheduled = match normalize_opt(doc.get("dateTime")) {
      0 => normalize_opt(doc.get("timeMillis")),
      t => t,
    };

    Self {
      id: doc.id.clone(),
      kind,
      owner_id: doc.text(&["ownerUid"]),
      origin: doc.text(&["from", "origin"]),
      destination: doc.text(&["to", "destination"]),
      scheduled_at_millis: scheduled,
      seat_count: doc
        .get("seats")
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok()),
      status: PostStatus::from_raw(doc.first(&["status"])),
      updated_at_millis: normalize_opt(doc.get("updatedAt")),
      created_at_millis: normalize_opt(doc.get("createdAt")),
      price: match kind {
        PostKind::Offer => doc.non_negative("pricePerSeat"),
        PostKind::Request => None,
      },
      matching: MatchingAttributes::from_raw(kind, doc),
    }
  }

  pub fn is_open(&self) -> bool { self.status == PostStatus::Open }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn doc(value: Value) -> RawDocument { RawDocument::from_value("d1", value) }

  #[test]
  fn maps_offer_fields() {
    let raw = doc(json!({
      "type": "offer",
      "ownerUid": "u1",
      "from": "Campus",
      "to": "Airport",
      "dateTime": { "seconds": 1_700_000_000 },
      "seats": 3,
      "status": "open",
      "updatedAt": 200,
      "pricePerSeat": 12.5,
      "allowsSmoking": false,
      "startLocation": { "latitude": 40.8, "longitude": -96.7 },
    }));

    let post = PostRecord::from_raw(PostKind::Offer, &raw);
    assert_eq!(post.id, "d1");
    assert_eq!(post.kind, PostKind::Offer);
    assert_eq!(post.owner_id, "u1");
    assert_eq!(post.origin, "Campus");
    assert_eq!(post.destination, "Airport");
    assert_eq!(post.scheduled_at_millis, 1_700_000_000_000);
    assert_eq!(post.seat_count, Some(3));
    assert!(post.is_open());
    assert_eq!(post.updated_at_millis, 200);
    assert_eq!(post.price, Some(12.5));
    assert_eq!(post.matching.smoking_ok, Some(false));
    assert_eq!(
      post.matching.pickup,
      Some(GeoPoint { latitude: 40.8, longitude: -96.7 })
    );
  }

  #[test]
  fn request_preferences_are_inverted() {
    let raw = doc(json!({
      "needsNonSmoking": true,
      "needsNoPets": false,
      "maxBudget": 20.0,
      "pricePerSeat": 99.0,
      "pickupLocation": { "_latitude": 1.0, "_longitude": 2.0 },
    }));

    let post = PostRecord::from_raw(PostKind::Request, &raw);
    assert_eq!(post.matching.smoking_ok, Some(false));
    assert_eq!(post.matching.pets_ok, Some(true));
    assert_eq!(post.matching.max_budget, Some(20.0));
    assert_eq!(post.matching.pickup, Some(GeoPoint { latitude: 1.0, longitude: 2.0 }));
    assert_eq!(post.price, None);
  }

  #[test]
  fn empty_document_degrades_to_defaults() {
    let post = PostRecord::from_raw(PostKind::Request, &doc(json!({})));
    assert_eq!(post.owner_id, "");
    assert_eq!(post.origin, "");
    assert_eq!(post.scheduled_at_millis, 0);
    assert_eq!(post.updated_at_millis, 0);
    assert_eq!(post.seat_count, None);
    assert_eq!(post.status, PostStatus::Open);
    assert_eq!(post.matching, MatchingAttributes::default());
  }

  #[test]
  fn legacy_field_names_are_accepted() {
    let raw = doc(json!({
      "origin": "Dorms",
      "destination": "Downtown",
      "timeMillis": 5000,
      "updatedAt": "7000",
    }));

    let post = PostRecord::from_raw(PostKind::Offer, &raw);
    assert_eq!(post.origin, "Dorms");
    assert_eq!(post.destination, "Downtown");
    assert_eq!(post.scheduled_at_millis, 5000);
    assert_eq!(post.updated_at_millis, 7000);
  }

  #[test]
  fn status_other_than_open_is_closed() {
    for raw_status in [json!("closed"), json!("matched"), json!(3)] {
      let post = PostRecord::from_raw(PostKind::Offer, &doc(json!({ "status": raw_status })));
      assert_eq!(post.status, PostStatus::Closed);
    }
    let post = PostRecord::from_raw(PostKind::Offer, &doc(json!({ "status": "OPEN" })));
    assert_eq!(post.status, PostStatus::Open);
  }

  #[test]
  fn negative_seats_and_price_are_dropped() {
    let raw = doc(json!({ "seats": -1, "pricePerSeat": -3.0 }));
    let post = PostRecord::from_raw(PostKind::Offer, &raw);
    assert_eq!(post.seat_count, None);
    assert_eq!(post.price, None);
  }

  #[test]
  fn non_object_document_has_no_fields() {
    let raw = RawDocument::from_value("x", json!("garbage"));
    assert!(raw.fields.is_empty());
    let post = PostRecord::from_raw(PostKind::Offer, &raw);
    assert_eq!(post.id, "x");
  }
}
