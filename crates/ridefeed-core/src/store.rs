//! The `PostStore` trait: the write path for listings.
//!
//! The aggregator itself never writes. This trait is used by the post
//! creation and editing surfaces, and is implemented by storage backends
//! (e.g. `ridefeed-store-sqlite`) alongside their [`CollectionSource`]s.
//!
//! [`CollectionSource`]: crate::source::CollectionSource

use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
  Error, Result,
  post::{GeoPoint, PostKind, PostStatus},
};

// ─── Input types ─────────────────────────────────────────────────────────────

/// Input to [`PostStore::create_post`].
///
/// `status`, `createdAt` and `updatedAt` are always set by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPost {
  pub kind:            PostKind,
  pub owner_id:        String,
  pub origin:          String,
  pub destination:     String,
  /// Departure time in epoch millis.
  pub scheduled_at:    i64,
  pub seats:           u32,
  /// Offers only.
  #[serde(default)]
  pub price_per_seat:  Option<f64>,
  /// Requests only.
  #[serde(default)]
  pub max_budget:      Option<f64>,
  #[serde(default)]
  pub pickup:          Option<GeoPoint>,
  #[serde(default)]
  pub dropoff:         Option<GeoPoint>,
}

impl NewPost {
  /// Convenience constructor with all optional fields unset.
  pub fn new(
    kind: PostKind,
    owner_id: impl Into<String>,
    origin: impl Into<String>,
    destination: impl Into<String>,
    scheduled_at: i64,
    seats: u32,
  ) -> Self {
    Self {
      kind,
      owner_id: owner_id.into(),
      origin: origin.into(),
      destination: destination.into(),
      scheduled_at,
      seats,
      price_per_seat: None,
      max_budget: None,
      pickup: None,
      dropoff: None,
    }
  }

  /// Reject input the creation form would not have let through.
  pub fn validate(&self) -> Result<()> {
    if self.owner_id.trim().is_empty() {
      return Err(Error::InvalidPost("owner is required".into()));
    }
    if self.origin.trim().is_empty() {
      return Err(Error::InvalidPost("origin is required".into()));
    }
    if self.destination.trim().is_empty() {
      return Err(Error::InvalidPost("destination is required".into()));
    }
    if self.seats == 0 {
      return Err(Error::InvalidPost("seats must be at least 1".into()));
    }
    let money = [("price", self.price_per_seat), ("budget", self.max_budget)];
    for (name, value) in money {
      if let Some(v) = value
        && !(0.0..=1000.0).contains(&v)
      {
        return Err(Error::InvalidPost(format!("{name} must be between 0 and 1000")));
      }
    }
    Ok(())
  }

  /// The document body written to the collection, minus store-assigned
  /// timestamps.
  pub fn to_fields(&self) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("type".into(), self.kind.as_str().into());
    fields.insert("ownerUid".into(), self.owner_id.clone().into());
    fields.insert("from".into(), self.origin.clone().into());
    fields.insert("to".into(), self.destination.clone().into());
    fields.insert("dateTime".into(), self.scheduled_at.into());
    fields.insert("seats".into(), self.seats.into());
    fields.insert("status".into(), PostStatus::Open.as_str().into());

    let point = |p: GeoPoint| serde_json::json!({ "latitude": p.latitude, "longitude": p.longitude });
    let (pickup_key, dropoff_key) = match self.kind {
      PostKind::Offer => ("startLocation", "endLocation"),
      PostKind::Request => ("pickupLocation", "dropoffLocation"),
    };
    if let Some(p) = self.pickup {
      fields.insert(pickup_key.into(), point(p));
    }
    if let Some(p) = self.dropoff {
      fields.insert(dropoff_key.into(), point(p));
    }
    match self.kind {
      PostKind::Offer => {
        if let Some(price) = self.price_per_seat {
          fields.insert("pricePerSeat".into(), price.into());
        }
      }
      PostKind::Request => {
        if let Some(budget) = self.max_budget {
          fields.insert("maxBudget".into(), budget.into());
        }
      }
    }
    fields
  }
}

/// Partial edit for [`PostStore::update_post`]. Unset fields are untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostPatch {
  pub origin:       Option<String>,
  pub destination:  Option<String>,
  pub scheduled_at: Option<i64>,
  pub seats:        Option<u32>,
  pub status:       Option<PostStatus>,
}

impl PostPatch {
  pub fn is_empty(&self) -> bool { *self == Self::default() }

  /// Same rules as [`NewPost::validate`] for the fields being changed.
  pub fn validate(&self) -> Result<()> {
    let texts = [("origin", &self.origin), ("destination", &self.destination)];
    for (name, value) in texts {
      if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
        return Err(Error::InvalidPost(format!("{name} must not be blank")));
      }
    }
    if self.seats == Some(0) {
      return Err(Error::InvalidPost("seats must be at least 1".into()));
    }
    Ok(())
  }

  pub fn to_fields(&self) -> Map<String, Value> {
    let mut fields = Map::new();
    if let Some(v) = &self.origin {
      fields.insert("from".into(), v.clone().into());
    }
    if let Some(v) = &self.destination {
      fields.insert("to".into(), v.clone().into());
    }
    if let Some(v) = self.scheduled_at {
      fields.insert("dateTime".into(), v.into());
    }
    if let Some(v) = self.seats {
      fields.insert("seats".into(), v.into());
    }
    if let Some(v) = self.status {
      fields.insert("status".into(), v.as_str().into());
    }
    fields
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the listing write path.
///
/// Every write refreshes `updatedAt` so the feed's recency ordering stays
/// correct.
pub trait PostStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Append a new open listing and return its document id.
  fn create_post(
    &self,
    input: NewPost,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + '_;

  /// Merge `patch` into an existing listing.
  fn update_post(
    &self,
    kind: PostKind,
    id: String,
    patch: PostPatch,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Mark a listing closed; it drops out of every browse feed.
  fn close_post(
    &self,
    kind: PostKind,
    id: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_ {
    self.update_post(
      kind,
      id,
      PostPatch { status: Some(PostStatus::Closed), ..PostPatch::default() },
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn validate_rejects_blank_fields_and_zero_seats() {
    let ok = NewPost::new(PostKind::Offer, "u1", "A", "B", 1, 2);
    assert!(ok.validate().is_ok());

    let mut bad = ok.clone();
    bad.origin = "  ".into();
    assert!(matches!(bad.validate(), Err(Error::InvalidPost(_))));

    let mut bad = ok.clone();
    bad.seats = 0;
    assert!(bad.validate().is_err());

    let mut bad = ok;
    bad.price_per_seat = Some(1500.0);
    assert!(bad.validate().is_err());
  }

  #[test]
  fn fields_use_kind_specific_names() {
    let mut offer = NewPost::new(PostKind::Offer, "u1", "A", "B", 10, 3);
    offer.price_per_seat = Some(8.0);
    offer.max_budget = Some(9.0);
    let fields = offer.to_fields();
    assert_eq!(fields["type"], "offer");
    assert_eq!(fields["status"], "open");
    assert_eq!(fields["pricePerSeat"], 8.0);
    assert!(!fields.contains_key("maxBudget"));

    let mut request = NewPost::new(PostKind::Request, "u1", "A", "B", 10, 1);
    request.pickup = Some(GeoPoint { latitude: 1.0, longitude: 2.0 });
    let fields = request.to_fields();
    assert_eq!(fields["pickupLocation"]["latitude"], 1.0);
  }

  #[test]
  fn patch_only_writes_set_fields() {
    let patch = PostPatch { seats: Some(4), ..PostPatch::default() };
    let fields = patch.to_fields();
    assert_eq!(fields.len(), 1);
    assert_eq!(fields["seats"], 4);
  }

  #[test]
  fn patch_validation_only_checks_set_fields() {
    assert!(PostPatch::default().validate().is_ok());
    assert!(PostPatch::default().is_empty());

    let blank = PostPatch { destination: Some(" ".into()), ..PostPatch::default() };
    assert!(matches!(blank.validate(), Err(Error::InvalidPost(_))));

    let zero = PostPatch { seats: Some(0), ..PostPatch::default() };
    assert!(zero.validate().is_err());
  }
}
